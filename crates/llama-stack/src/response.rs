use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use insight_agent_backend::{ErrorKind, StepEvent, TurnResponse};
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::{Sse, SseError};
use crate::proto::{self, TurnStreamChunk};

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<StepEvent>, Sse), Error>;

pin_project! {
    /// The event stream of a turn submitted to a Llama Stack server.
    pub struct LlamaStackResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
        // Events of a turn that was not streamed.
        completed: VecDeque<StepEvent>,
    }
}

impl LlamaStackResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        Self {
            next_event_fut: Some(Box::pin(next_event(sse))),
            completed: VecDeque::new(),
        }
    }

    #[inline]
    pub fn from_events(events: Vec<StepEvent>) -> Self {
        Self {
            next_event_fut: None,
            completed: events.into(),
        }
    }
}

impl TurnResponse for LlamaStackResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<StepEvent>, Self::Error>> {
        let this = self.project();
        if let Some(event) = this.completed.pop_front() {
            return Poll::Ready(Ok(Some(event)));
        }
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, sse) = match ready!(next_event_fut.as_mut().poll(cx)) {
            Ok((Some(event), sse)) => (event, sse),
            Ok((None, _)) => {
                *this.next_event_fut = None;
                return Poll::Ready(Ok(None));
            }
            Err(err) => {
                *this.next_event_fut = None;
                return Poll::Ready(Err(err));
            }
        };

        // Nothing is read after an in-band error, otherwise the stream may
        // still have more data to pull.
        *this.next_event_fut = if matches!(event, StepEvent::StreamError(_)) {
            None
        } else {
            Some(Box::pin(next_event(sse)))
        };

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(mut sse: Sse) -> NextEvent {
    loop {
        let data = match sse.next_event().await {
            Ok(Some(data)) => data,
            Ok(None) => return Ok((None, sse)),
            Err(SseError::ChunksError(err)) => {
                return Err(Error::new(
                    format!("turn stream broke off: {err}"),
                    ErrorKind::Unavailable,
                ));
            }
            Err(SseError::InvalidPayload) => {
                return Err(Error::new(
                    "turn stream is not valid UTF-8",
                    ErrorKind::InvalidResponse,
                ));
            }
        };
        trace!("got sse event: {data}");
        if data == "[DONE]" {
            return Ok((None, sse));
        }

        let chunk = serde_json::from_str::<TurnStreamChunk>(&data).map_err(
            |err| {
                Error::new(
                    format!("malformed turn chunk: {err}"),
                    ErrorKind::InvalidResponse,
                )
            },
        )?;
        if let Some(event) = proto::step_event(chunk) {
            return Ok((Some(event), sse));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;
    use insight_agent_backend::{BackendError, StepKind};

    use super::*;
    use crate::io::Chunks;

    async fn collect_events(
        resp: LlamaStackResponse,
    ) -> (Vec<StepEvent>, Option<Error>) {
        let mut resp = pin!(resp);
        let mut events = vec![];
        loop {
            match poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await {
                Ok(Some(event)) => events.push(event),
                Ok(None) => return (events, None),
                Err(err) => return (events, Some(err)),
            }
        }
    }

    fn response_from(chunks: Vec<Bytes>) -> LlamaStackResponse {
        let sse = Sse::new(Chunks::from_vec_deque(chunks.into()));
        LlamaStackResponse::from_sse(sse)
    }

    #[tokio::test]
    async fn test_fixture_events() {
        let resp = response_from(vec![Bytes::from_static(include_bytes!(
            "../fixtures/turn_stream.txt"
        ))]);
        let (events, err) = collect_events(resp).await;
        assert!(err.is_none());

        let text: String = events
            .iter()
            .filter_map(|event| match event {
                StepEvent::GenerationProgress(Some(text)) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "Let me look that up.ACME has 2 open opportunities.");

        let completed: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                StepEvent::StepComplete(kind) => Some(*kind),
                _ => None,
            })
            .collect();
        assert_eq!(
            completed,
            [
                StepKind::Inference,
                StepKind::ToolExecution,
                StepKind::Inference
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_error_ends_stream() {
        let resp = response_from(vec![
            Bytes::from_static(
                b"data: {\"error\": {\"message\": \"model overloaded\"}}\n\n",
            ),
            Bytes::from_static(
                b"data: {\"event\": {\"payload\": {\"event_type\": \"step_complete\", \"step_type\": \"inference\"}}}\n\n",
            ),
        ]);
        let (events, err) = collect_events(resp).await;
        assert!(err.is_none());
        assert_eq!(
            events,
            vec![StepEvent::StreamError("model overloaded".to_owned())]
        );
    }

    #[tokio::test]
    async fn test_malformed_chunk() {
        let resp = response_from(vec![Bytes::from_static(b"data: {oops\n\n")]);
        let (events, err) = collect_events(resp).await;
        assert!(events.is_empty());
        assert_eq!(err.unwrap().kind(), ErrorKind::InvalidResponse);

        let resp = response_from(vec![Bytes::from_static(b"data: \xFF\n\n")]);
        let (_, err) = collect_events(resp).await;
        assert_eq!(err.unwrap().kind(), ErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn test_completed_events() {
        let resp = LlamaStackResponse::from_events(vec![
            StepEvent::text("Hi"),
            StepEvent::StepComplete(StepKind::Inference),
        ]);
        let (events, err) = collect_events(resp).await;
        assert!(err.is_none());
        assert_eq!(events.len(), 2);
    }
}
