use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading server-sent events from a chunk stream.
///
/// Only the `data` field is surfaced. Multiple `data` lines of one event
/// are joined with a line feed, comment lines and other fields (`event`,
/// `id`, `retry`) are skipped.
pub struct Sse {
    buf: String,
    pending: Vec<u8>,
    chunks: Chunks,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: String::new(),
            pending: Vec::new(),
            chunks,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Events already buffered are returned before reading more.
            if let Some(event) = self.try_parse_event() {
                return Ok(Some(event));
            }

            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                if !self.pending.is_empty() {
                    return Err(Error::InvalidPayload);
                }
                return Ok(None);
            };

            // A chunk boundary may split a multi-byte character, keep the
            // incomplete tail until the next chunk arrives.
            self.pending.extend_from_slice(&bytes);
            let valid_up_to = match str::from_utf8(&self.pending) {
                Ok(s) => s.len(),
                Err(err) if err.error_len().is_none() => err.valid_up_to(),
                Err(_) => return Err(Error::InvalidPayload),
            };
            let tail = self.pending.split_off(valid_up_to);
            let head = std::mem::replace(&mut self.pending, tail);
            // The prefix was validated just above.
            self.buf.push_str(
                str::from_utf8(&head).map_err(|_| Error::InvalidPayload)?,
            );
            if self.buf.contains('\r') {
                self.buf = self.buf.replace("\r\n", "\n");
            }
        }
    }

    fn try_parse_event(&mut self) -> Option<String> {
        loop {
            // event         = *( comment / field ) end-of-line
            // field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
            // comment       = colon *any-char end-of-line
            let eol_idx = self.buf.find("\n\n")?;
            let block: String = self.buf.drain(0..eol_idx + 2).collect();

            let mut data: Option<String> = None;
            for line in block.lines() {
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                let (name, value) = match line.split_once(':') {
                    Some((name, value)) => {
                        (name, value.strip_prefix(' ').unwrap_or(value))
                    }
                    None => (line, ""),
                };
                if name != "data" {
                    trace!("skipping sse field: {name}");
                    continue;
                }
                match &mut data {
                    Some(data) => {
                        data.push('\n');
                        data.push_str(value);
                    }
                    None => data = Some(value.to_owned()),
                }
            }

            // Blocks without data (keep-alive comments) are not events.
            if data.is_some() {
                return data;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn sse_from(chunks: &[&'static [u8]]) -> Sse {
        let chunks = Chunks::from_vec_deque(
            chunks.iter().map(|c| Bytes::from_static(*c)).collect(),
        );
        Sse::new(chunks)
    }

    #[tokio::test]
    async fn test_normal_events() {
        let mut sse = sse_from(&[b"data: hello\n\n", b"data: bye\n\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "bye");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_many_events_in_one_chunk() {
        let mut sse = sse_from(&[b"data: one\n\ndata: two\n\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "one");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "two");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_quirk_streaming() {
        let mut sse = sse_from(&[b"data:", b" hello\r\n", b"\r\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_split_utf8() {
        let mut sse = sse_from(&[b"data: \xF0\x9F", b"\x9B\xA0\n\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "\u{1F6E0}");
    }

    #[tokio::test]
    async fn test_comments_and_fields() {
        let mut sse = sse_from(&[
            b": keep-alive\n\n",
            b"event: message\nid: 1\ndata: first\ndata: second\n\n",
        ]);
        assert_eq!(
            sse.next_event().await.unwrap().unwrap(),
            "first\nsecond"
        );
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_data() {
        let mut sse = sse_from(&[b"data: \xFF\xFE\n\n"]);
        assert_eq!(sse.next_event().await.unwrap_err(), Error::InvalidPayload);

        // An incomplete event at the end of the stream is dropped.
        let mut sse = sse_from(&[b"data: hello\n"]);
        assert_eq!(sse.next_event().await.unwrap(), None);
    }
}
