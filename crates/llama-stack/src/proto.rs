use insight_agent_backend::{AgentConfig, StepEvent, StepKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct CreateAgentResponse {
    pub agent_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// One `data` payload of a streamed turn.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TurnStreamChunk {
    pub event: Option<TurnStreamEvent>,
    pub error: Option<StreamErrorBody>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TurnStreamEvent {
    pub payload: EventPayload,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct StreamErrorBody {
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventPayload {
    StepProgress {
        step_type: StepKind,
        delta: Delta,
    },
    StepComplete {
        step_type: StepKind,
    },
    // `turn_start`, `step_start`, `turn_complete`, `turn_awaiting_input`.
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Delta {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

/// A completed turn, returned when streaming is off.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Turn {
    pub steps: Vec<Step>,
    pub output_message: Option<CompletionMessage>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Step {
    pub step_type: StepKind,
    pub model_response: Option<CompletionMessage>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CompletionMessage {
    #[serde(default)]
    pub content: Value,
}

impl CompletionMessage {
    /// Flattens the message content into text.
    ///
    /// Content is either a plain string or a list of typed items, of
    /// which only text items are kept.
    fn text(&self) -> Option<String> {
        let text = match &self.content {
            Value::String(text) => text.clone(),
            Value::Array(items) => items
                .iter()
                .filter(|item| item["type"] == "text")
                .filter_map(|item| item["text"].as_str())
                .collect(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CreateAgentRequest<'a> {
    pub agent_config: &'a AgentConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CreateSessionRequest<'a> {
    pub session_name: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct UserMessage {
    role: &'static str,
    content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CreateTurnRequest {
    messages: Vec<UserMessage>,
    stream: bool,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_turn_request(message: &str, stream: bool) -> CreateTurnRequest {
    CreateTurnRequest {
        messages: vec![UserMessage {
            role: "user",
            content: message.to_owned(),
        }],
        stream,
    }
}

/// Maps a streamed chunk to a step event.
///
/// Returns `None` for bookkeeping events that carry nothing for the
/// caller (turn and step starts, turn completion).
pub fn step_event(chunk: TurnStreamChunk) -> Option<StepEvent> {
    if let Some(error) = chunk.error {
        let message = error
            .message
            .unwrap_or_else(|| "unknown stream error".to_owned());
        return Some(StepEvent::StreamError(message));
    }
    let Some(event) = chunk.event else {
        return Some(StepEvent::StreamError(
            "stream chunk carries neither an event nor an error".to_owned(),
        ));
    };
    match event.payload {
        EventPayload::StepProgress { delta, .. } => match delta {
            Delta::Text { text } => {
                Some(StepEvent::GenerationProgress(Some(text)))
            }
            Delta::Other => Some(StepEvent::GenerationProgress(None)),
        },
        EventPayload::StepComplete { step_type } => {
            Some(StepEvent::StepComplete(step_type))
        }
        EventPayload::Other => None,
    }
}

/// Replays a completed turn as the events a stream would have carried.
pub fn turn_events(turn: Turn) -> Vec<StepEvent> {
    let mut events = Vec::with_capacity(turn.steps.len() * 2);
    for step in turn.steps {
        if step.step_type == StepKind::Inference {
            let text = step.model_response.as_ref().and_then(|m| m.text());
            events.push(StepEvent::GenerationProgress(text));
        }
        events.push(StepEvent::StepComplete(step.step_type));
    }
    // Without steps, the output message is the only content we have.
    if events.is_empty() {
        let text = turn.output_message.as_ref().and_then(|m| m.text());
        if text.is_some() {
            events.push(StepEvent::GenerationProgress(text));
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn chunk(value: Value) -> TurnStreamChunk {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_step_event() {
        let progress = chunk(json!({
            "event": { "payload": {
                "event_type": "step_progress",
                "step_type": "inference",
                "step_id": "s1",
                "delta": { "type": "text", "text": "Hello" }
            }}
        }));
        assert_eq!(step_event(progress), Some(StepEvent::text("Hello")));

        let tool_call = chunk(json!({
            "event": { "payload": {
                "event_type": "step_progress",
                "step_type": "inference",
                "step_id": "s1",
                "delta": {
                    "type": "tool_call",
                    "tool_call": "{\"account\": \"ACME\"}",
                    "parse_status": "in_progress"
                }
            }}
        }));
        assert_eq!(
            step_event(tool_call),
            Some(StepEvent::GenerationProgress(None))
        );

        let complete = chunk(json!({
            "event": { "payload": {
                "event_type": "step_complete",
                "step_type": "tool_execution",
                "step_id": "s2",
                "step_details": { "step_type": "tool_execution" }
            }}
        }));
        assert_eq!(
            step_event(complete),
            Some(StepEvent::StepComplete(StepKind::ToolExecution))
        );

        let start = chunk(json!({
            "event": { "payload": { "event_type": "turn_start", "turn_id": "t1" } }
        }));
        assert_eq!(step_event(start), None);

        let error = chunk(json!({ "error": { "message": "model overloaded" } }));
        assert_eq!(
            step_event(error),
            Some(StepEvent::StreamError("model overloaded".to_owned()))
        );
    }

    #[test]
    fn test_turn_events() {
        let turn: Turn = serde_json::from_value(json!({
            "turn_id": "t1",
            "steps": [
                {
                    "step_type": "inference",
                    "model_response": { "role": "assistant", "content": "" }
                },
                { "step_type": "tool_execution", "tool_calls": [] },
                {
                    "step_type": "inference",
                    "model_response": {
                        "role": "assistant",
                        "content": [{ "type": "text", "text": "Done." }]
                    }
                }
            ],
            "output_message": { "role": "assistant", "content": "Done." }
        }))
        .unwrap();

        assert_eq!(
            turn_events(turn),
            vec![
                StepEvent::GenerationProgress(None),
                StepEvent::StepComplete(StepKind::Inference),
                StepEvent::StepComplete(StepKind::ToolExecution),
                StepEvent::text("Done."),
                StepEvent::StepComplete(StepKind::Inference),
            ]
        );
    }

    #[test]
    fn test_create_turn_request() {
        let req = create_turn_request("Review the opportunities", true);
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "messages": [{ "role": "user", "content": "Review the opportunities" }],
                "stream": true
            })
        );
    }
}
