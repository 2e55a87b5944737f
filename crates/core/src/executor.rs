use std::collections::VecDeque;
use std::future::poll_fn;
use std::pin::{Pin, pin};

use insight_agent_backend::{
    Backend, ErrorKind, StepEvent, TurnRequest, TurnResponse,
};
use tracing::Instrument;

use crate::{Error, Session};

/// Submits user messages to a session and exposes the resulting events.
#[derive(Clone, Copy, Debug)]
pub struct TurnExecutor<'b, B> {
    backend: &'b B,
}

impl<'b, B: Backend> TurnExecutor<'b, B> {
    /// Creates an executor submitting turns to `backend`.
    #[inline]
    pub fn new(backend: &'b B) -> Self {
        Self { backend }
    }

    /// Submits `message` as a new turn of `session`.
    ///
    /// In streaming mode, the events are pulled from the backend as the
    /// returned sequence is consumed, and this method never fails: a turn
    /// the backend refuses, or a broken connection, shows up as a single
    /// [`StepEvent::StreamError`] ending the sequence.
    ///
    /// Otherwise the whole response is received before this method
    /// returns, and any failure is reported as [`Error::Backend`].
    ///
    /// The returned sequence borrows the session, so the next turn can
    /// only be submitted once it is dropped.
    pub async fn execute<'s>(
        &self,
        session: &'s mut Session,
        message: &str,
        stream: bool,
    ) -> Result<TurnEvents<'s, B::Response>, Error> {
        let req = TurnRequest {
            agent_id: session.agent_id().clone(),
            session_id: session.id().clone(),
            message: message.to_owned(),
            stream,
        };
        let span = debug_span!("turn", session = %req.session_id, stream);
        let resp_or_err = self.backend.create_turn(&req).instrument(span).await;
        session.begin_turn(message);

        if stream {
            let mut events = TurnEvents {
                session,
                response: None,
                buffered: VecDeque::new(),
                recording: true,
            };
            match resp_or_err {
                Ok(resp) => events.response = Some(Box::pin(resp)),
                Err(err) => {
                    error!("failed to submit the turn: {err}");
                    events
                        .buffered
                        .push_back(StepEvent::StreamError(err.to_string()));
                }
            }
            return Ok(events);
        }

        let resp = resp_or_err.map_err(Error::from_backend)?;
        let events = drain(resp).await.map_err(Error::from_backend)?;
        for event in &events {
            session.record_event(event);
            if let StepEvent::StreamError(payload) = event {
                warn!("turn failed: {payload}");
                return Err(Error::Backend {
                    kind: ErrorKind::Other,
                    message: payload.clone(),
                });
            }
        }
        Ok(TurnEvents {
            session,
            response: None,
            buffered: events.into(),
            recording: false,
        })
    }
}

async fn drain<R: TurnResponse>(resp: R) -> Result<Vec<StepEvent>, R::Error> {
    let mut resp = pin!(resp);
    let mut events = vec![];
    while let Some(event) =
        poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await?
    {
        events.push(event);
    }
    trace!("received {} events", events.len());
    Ok(events)
}

/// The events of a submitted turn, in emission order.
///
/// The sequence can only be consumed once. It ends after the turn
/// completes, or right after a [`StepEvent::StreamError`].
pub struct TurnEvents<'s, R> {
    session: &'s mut Session,
    response: Option<Pin<Box<R>>>,
    buffered: VecDeque<StepEvent>,
    recording: bool,
}

impl<'s, R: TurnResponse> TurnEvents<'s, R> {
    /// Returns the next event, or `None` if the sequence has ended.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. No event is lost when the returned
    /// future is dropped before completion.
    pub async fn next_event(&mut self) -> Option<StepEvent> {
        let event = match self.buffered.pop_front() {
            Some(event) => event,
            None => self.poll_response().await?,
        };
        trace!("got an event: {event:?}");

        if let StepEvent::StreamError(_) = &event {
            self.response = None;
            self.buffered.clear();
        }
        if self.recording {
            self.session.record_event(&event);
        }
        Some(event)
    }

    async fn poll_response(&mut self) -> Option<StepEvent> {
        let response = self.response.as_mut()?;
        match poll_fn(|cx| response.as_mut().poll_next_event(cx)).await {
            Ok(Some(event)) => Some(event),
            Ok(None) => {
                self.response = None;
                None
            }
            Err(err) => {
                error!("the turn is interrupted: {err}");
                self.response = None;
                Some(StepEvent::StreamError(err.to_string()))
            }
        }
    }

    /// Returns the session this turn belongs to.
    #[inline]
    pub fn session(&self) -> &Session {
        self.session
    }

    /// Returns the session this turn belongs to, for appending to its
    /// history once the sequence has been consumed.
    #[inline]
    pub fn into_session(self) -> &'s mut Session {
        self.session
    }
}
