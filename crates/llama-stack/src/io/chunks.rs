#[cfg(test)]
use std::collections::VecDeque;
use std::fmt::{self, Display};

use bytes::Bytes;
use reqwest::Response;

/// The body broke off before its end.
#[derive(Debug, PartialEq, Eq)]
pub struct Error {
    message: String,
    received: usize,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (after {} bytes)", self.message, self.received)
    }
}

enum Source {
    Response(Response),
    #[cfg(test)]
    Queue(VecDeque<Bytes>),
}

/// The body of a streamed turn, read chunk by chunk.
pub struct Chunks {
    source: Source,
    received: usize,
}

impl Chunks {
    pub fn from_response(response: Response) -> Self {
        Self {
            source: Source::Response(response),
            received: 0,
        }
    }

    #[cfg(test)]
    pub fn from_vec_deque(queue: VecDeque<Bytes>) -> Self {
        Self {
            source: Source::Queue(queue),
            received: 0,
        }
    }

    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        let chunk = match &mut self.source {
            Source::Response(response) => {
                response.chunk().await.map_err(|err| Error {
                    message: err.to_string(),
                    received: self.received,
                })?
            }
            #[cfg(test)]
            Source::Queue(queue) => queue.pop_front(),
        };
        match &chunk {
            Some(chunk) => self.received += chunk.len(),
            None => trace!("body ended after {} bytes", self.received),
        }
        Ok(chunk)
    }
}
