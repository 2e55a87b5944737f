use insight_agent_backend::{StepEvent, StepKind};
use serde::{Deserialize, Serialize};

/// The events in a preset turn.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "event")]
    Event(StepEvent),
    /// The connection breaks at this point, the turn yields an error.
    #[serde(rename = "transport_failure")]
    TransportFailure,
}

impl PresetEvent {
    /// A progress event with a text delta.
    #[inline]
    pub fn text<S: Into<String>>(delta: S) -> Self {
        PresetEvent::Event(StepEvent::text(delta))
    }

    /// A progress event without any text.
    #[inline]
    pub fn progress() -> Self {
        PresetEvent::Event(StepEvent::GenerationProgress(None))
    }

    /// A step completion event.
    #[inline]
    pub fn complete(kind: StepKind) -> Self {
        PresetEvent::Event(StepEvent::StepComplete(kind))
    }

    /// An in-band stream error.
    #[inline]
    pub fn stream_error<S: Into<String>>(payload: S) -> Self {
        PresetEvent::Event(StepEvent::StreamError(payload.into()))
    }
}

/// The preset response for a submitted turn.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetTurn {
    /// Events in this turn.
    pub events: Vec<PresetEvent>,
    /// If set, submitting the turn fails before any event is produced.
    #[serde(default)]
    pub rejected: bool,
}

impl PresetTurn {
    /// Creates a `PresetTurn` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            rejected: false,
        }
    }

    /// Creates a `PresetTurn` that the backend refuses to run.
    #[inline]
    pub fn rejected() -> Self {
        Self {
            events: vec![],
            rejected: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_deserialize() {
        let turn = PresetTurn::with_events([
            PresetEvent::text("Let me check the CRM."),
            PresetEvent::complete(StepKind::Inference),
            PresetEvent::complete(StepKind::ToolExecution),
            PresetEvent::TransportFailure,
        ]);

        let serialized = serde_json::to_string(&turn).unwrap();
        let deserialized: PresetTurn =
            serde_json::from_str(&serialized).unwrap();

        assert_eq!(turn, deserialized);
    }
}
