//! Turns step events into the text shown to the user.

use std::fmt::{self, Display, Formatter};

use insight_agent_backend::{StepEvent, StepKind, TurnResponse};

use crate::TurnEvents;

/// Shown in place of a completed tool execution.
pub const TOOL_MARKER: &str = " 🛠 ";

/// A piece of displayable output.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Fragment {
    /// Text generated by the model.
    Text(String),
    /// The backend finished running a tool.
    ToolMarker,
    /// The turn failed. Nothing follows this fragment.
    Error(String),
}

impl Fragment {
    /// Returns `true` if this fragment ends the turn.
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Fragment::Error(_))
    }
}

impl Display for Fragment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Fragment::Text(text) => f.write_str(text),
            Fragment::ToolMarker => f.write_str(TOOL_MARKER),
            Fragment::Error(payload) => {
                write!(f, "Error occurred in the backend: {payload}")
            }
        }
    }
}

/// Maps one event to its displayable fragment, if it has one.
pub fn reduce_event(event: StepEvent) -> Option<Fragment> {
    match event {
        StepEvent::GenerationProgress(Some(delta)) if !delta.is_empty() => {
            Some(Fragment::Text(delta))
        }
        StepEvent::GenerationProgress(_) => None,
        StepEvent::StepComplete(StepKind::ToolExecution) => {
            Some(Fragment::ToolMarker)
        }
        // Internal steps have nothing to show.
        StepEvent::StepComplete(
            StepKind::Inference | StepKind::ShieldCall | StepKind::MemoryRetrieval,
        ) => None,
        StepEvent::StreamError(payload) => Some(Fragment::Error(payload)),
    }
}

/// Reduces a sequence of events that is already available.
///
/// The sequence is not consumed beyond the first stream error.
pub fn reduce<I>(events: I) -> Reduced<I::IntoIter>
where
    I: IntoIterator<Item = StepEvent>,
{
    Reduced {
        events: Some(events.into_iter()),
    }
}

/// An iterator over the fragments of an event sequence.
///
/// See [`reduce`] for details.
#[derive(Clone, Debug)]
pub struct Reduced<I> {
    events: Option<I>,
}

impl<I: Iterator<Item = StepEvent>> Iterator for Reduced<I> {
    type Item = Fragment;

    fn next(&mut self) -> Option<Fragment> {
        let fragment = self.events.as_mut()?.find_map(reduce_event);
        if fragment.as_ref().is_none_or(Fragment::is_error) {
            self.events = None;
        }
        fragment
    }
}

/// Concatenates fragments into the final message of a turn.
pub fn concat<'a, I>(fragments: I) -> String
where
    I: IntoIterator<Item = &'a Fragment>,
{
    fragments.into_iter().map(ToString::to_string).collect()
}

/// The fragments of a running turn, produced as its events arrive.
pub struct Fragments<'s, R> {
    events: TurnEvents<'s, R>,
    ended: bool,
}

impl<'s, R: TurnResponse> Fragments<'s, R> {
    /// Creates the fragment sequence of a turn.
    #[inline]
    pub fn new(events: TurnEvents<'s, R>) -> Self {
        Self {
            events,
            ended: false,
        }
    }

    /// Returns the next fragment, or `None` if the turn has ended.
    pub async fn next_fragment(&mut self) -> Option<Fragment> {
        if self.ended {
            return None;
        }
        while let Some(event) = self.events.next_event().await {
            if let Some(fragment) = reduce_event(event) {
                self.ended = fragment.is_error();
                return Some(fragment);
            }
        }
        self.ended = true;
        None
    }

    /// Consumes the remaining fragments and returns the final message.
    ///
    /// `on_fragment` is called with every fragment, in order.
    pub async fn collect_message<F>(&mut self, mut on_fragment: F) -> String
    where
        F: FnMut(&Fragment),
    {
        let mut message = String::new();
        while let Some(fragment) = self.next_fragment().await {
            on_fragment(&fragment);
            message.push_str(&fragment.to_string());
        }
        message
    }

    /// Returns the underlying event sequence.
    #[inline]
    pub fn into_events(self) -> TurnEvents<'s, R> {
        self.events
    }
}
