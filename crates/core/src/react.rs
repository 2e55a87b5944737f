//! Structured output of reasoning-and-acting agents.
//!
//! Such an agent answers every turn with one JSON document: a thought,
//! then either a tool call to make or the final answer.

use insight_agent_backend::ResponseFormat;
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step of reasoning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReActOutput {
    /// What the model thinks about the current state.
    pub thought: String,
    /// The tool call to make next, if any.
    pub action: Option<ReActAction>,
    /// The final answer, once no more tool calls are needed.
    pub answer: Option<String>,
}

/// A tool call requested by the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReActAction {
    /// The tool to call.
    pub tool_name: String,
    /// The arguments of the call.
    pub tool_params: Vec<ReActParam>,
}

/// A named tool argument.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReActParam {
    /// The parameter name.
    pub name: String,
    /// The argument, of any JSON type.
    pub value: Value,
}

impl ReActOutput {
    /// Extracts the output from an assistant message.
    ///
    /// Tool markers and other text around the JSON document are ignored.
    pub fn parse(message: &str) -> Option<Self> {
        let start = message.find('{')?;
        let end = message.rfind('}')?;
        if end < start {
            return None;
        }
        match serde_json::from_str(&message[start..=end]) {
            Ok(output) => Some(output),
            Err(err) => {
                debug!("not a reasoning step: {err}");
                None
            }
        }
    }
}

/// Returns the response format constraining the model to [`ReActOutput`].
pub fn response_format() -> ResponseFormat {
    ResponseFormat::JsonSchema {
        json_schema: schema_for!(ReActOutput).to_value(),
    }
}
