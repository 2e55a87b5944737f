use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// The kind of a step in a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// The model generated text or tool calls.
    Inference,
    /// The backend ran one or more tools.
    ToolExecution,
    /// A safety shield inspected the input or output.
    ShieldCall,
    /// The backend retrieved documents for the model.
    MemoryRetrieval,
}

impl Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Inference => write!(f, "inference"),
            StepKind::ToolExecution => write!(f, "tool_execution"),
            StepKind::ShieldCall => write!(f, "shield_call"),
            StepKind::MemoryRetrieval => write!(f, "memory_retrieval"),
        }
    }
}

/// An event emitted while a turn is running.
///
/// Events are delivered in emission order, and are never revised or
/// retracted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StepEvent {
    /// A step made progress, optionally with a text delta.
    GenerationProgress(Option<String>),
    /// A step has been completed.
    StepComplete(StepKind),
    /// The stream reported a failure. Nothing follows this event.
    StreamError(String),
}

impl StepEvent {
    /// Creates a progress event carrying a text delta.
    #[inline]
    pub fn text<S: Into<String>>(delta: S) -> Self {
        StepEvent::GenerationProgress(Some(delta.into()))
    }
}
