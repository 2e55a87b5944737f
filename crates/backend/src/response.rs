use std::pin::Pin;
use std::task::{self, Poll};

use crate::error::BackendError;
use crate::event::StepEvent;

/// The event stream of a submitted turn.
pub trait TurnResponse: Sized + Send + 'static {
    /// The error type that may be returned by the backend.
    type Error: BackendError;

    /// Attempts to pull out the next event from the turn.
    ///
    /// # Return value
    ///
    /// There are several possible return values, each indicating a
    /// distinct response state:
    ///
    /// - `Poll::Pending` means that this turn is still waiting for the
    ///   next event. Implementations will ensure that the current task
    ///   will be notified when the next event may be ready.
    /// - `Poll::Ready(Ok(Some(event)))` means the turn has an event to
    ///   deliver, and may produce further events on subsequent
    ///   `poll_next_event` calls.
    /// - `Poll::Ready(Ok(None))` means the turn has completed.
    /// - `Poll::Ready(Err(error))` means the transport failed while
    ///   receiving the turn. Failures the backend reports in-band are
    ///   delivered as [`StepEvent::StreamError`] instead.
    ///
    /// Calling this method after completion should always return `None`.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<StepEvent>, Self::Error>>;
}
