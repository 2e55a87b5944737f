use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How the model picks the next token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SamplingStrategy {
    /// Always picks the most likely token.
    #[default]
    Greedy,
    /// Nucleus sampling.
    TopP {
        /// Sampling temperature, `0` or above.
        temperature: f64,
        /// Cumulative probability cut-off, in `(0, 1]`.
        top_p: f64,
    },
}

/// Sampling parameters of an agent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    /// The sampling strategy.
    pub strategy: SamplingStrategy,
    /// The maximum number of tokens to generate per inference step.
    pub max_tokens: u32,
}

/// Whether the model may call tools on its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// The model decides.
    #[default]
    Auto,
    /// The model must call a tool.
    Required,
    /// The model must not call any tool.
    None,
}

/// How the agent instructions combine with the system prompt the backend
/// generates for tools.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemMessageBehavior {
    /// The instructions are appended to the generated prompt.
    #[default]
    Append,
    /// The instructions replace the generated prompt.
    Replace,
}

/// Tool related settings of an agent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolConfig {
    /// The tool choice policy.
    pub tool_choice: ToolChoice,
    /// See [`SystemMessageBehavior`].
    #[serde(default)]
    pub system_message_behavior: SystemMessageBehavior,
}

/// Constrains the shape of what the model generates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// The output is a JSON document valid against the schema.
    JsonSchema {
        /// The JSON schema.
        json_schema: Value,
    },
    /// The output follows a BNF grammar.
    Grammar {
        /// The grammar.
        bnf: Value,
    },
}

/// A reference to a tool group enabled for an agent.
///
/// Most tool groups are referenced by their bare identifier. Tool groups
/// that need extra arguments (the retrieval tool and its knowledge
/// sources) are referenced in the structured form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolRef {
    /// A bare tool group identifier.
    Name(String),
    /// A tool group identifier with arguments.
    WithArgs {
        /// The tool group identifier.
        name: String,
        /// Arguments passed to the tool group.
        args: Map<String, Value>,
    },
}

impl ToolRef {
    /// Returns the tool group identifier.
    #[inline]
    pub fn name(&self) -> &str {
        match self {
            ToolRef::Name(name) => name,
            ToolRef::WithArgs { name, .. } => name,
        }
    }

    /// Returns the arguments, if any.
    #[inline]
    pub fn args(&self) -> Option<&Map<String, Value>> {
        match self {
            ToolRef::Name(_) => None,
            ToolRef::WithArgs { args, .. } => Some(args),
        }
    }
}

impl From<&str> for ToolRef {
    #[inline]
    fn from(name: &str) -> Self {
        ToolRef::Name(name.to_owned())
    }
}

impl From<String> for ToolRef {
    #[inline]
    fn from(name: String) -> Self {
        ToolRef::Name(name)
    }
}

/// An ordered list of tool groups enabled for an agent.
///
/// The order carries no meaning for the backend, but is kept for display.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolSelection(pub Vec<ToolRef>);

impl ToolSelection {
    /// Returns an iterator over the tool references.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, ToolRef> {
        self.0.iter()
    }

    /// Returns an iterator over the tool group identifiers.
    #[inline]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(ToolRef::name)
    }

    /// Returns `true` if the tool group is part of this selection.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.names().any(|n| n == name)
    }

    /// Returns the number of selected tool groups.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no tool group is selected.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Into<ToolRef>> FromIterator<T> for ToolSelection {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Describes an agent to be created by the backend.
///
/// Two configurations are equal iff all of their fields are equal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// The generation-capable model identifier.
    pub model: String,
    /// The system instructions.
    pub instructions: String,
    /// Enabled tool groups.
    pub toolgroups: ToolSelection,
    /// Tool related settings.
    pub tool_config: ToolConfig,
    /// Sampling parameters.
    pub sampling_params: SamplingParams,
    /// Shields applied to user input.
    pub input_shields: Vec<String>,
    /// Shields applied to model output.
    pub output_shields: Vec<String>,
    /// Upper bound of inference steps in one turn, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_infer_iters: Option<u32>,
    /// Structured output constraint, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    /// Whether the backend should persist sessions.
    pub enable_session_persistence: bool,
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Returns the identifier as a string slice.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

define_id! {
    /// The backend identifier of an agent.
    AgentId
}

define_id! {
    /// The backend identifier of a session.
    SessionId
}

/// A request to run one turn in a session.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TurnRequest {
    /// The agent owning the session.
    pub agent_id: AgentId,
    /// The session to append the turn to.
    pub session_id: SessionId,
    /// The user message.
    pub message: String,
    /// Whether events should be streamed as they are produced.
    pub stream: bool,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_serialize_config() {
        let mut args = Map::new();
        args.insert("vector_db_ids".to_owned(), json!(["docs-1"]));
        let config = AgentConfig {
            model: "llama3.2:3b".to_owned(),
            instructions: "Be helpful.".to_owned(),
            toolgroups: ToolSelection(vec![
                ToolRef::from("mcp::crm"),
                ToolRef::WithArgs {
                    name: "builtin::rag".to_owned(),
                    args,
                },
            ]),
            tool_config: ToolConfig::default(),
            sampling_params: SamplingParams {
                strategy: SamplingStrategy::TopP {
                    temperature: 1.0,
                    top_p: 0.9,
                },
                max_tokens: 512,
            },
            input_shields: vec![],
            output_shields: vec![],
            max_infer_iters: None,
            response_format: None,
            enable_session_persistence: false,
        };

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "llama3.2:3b",
                "instructions": "Be helpful.",
                "toolgroups": [
                    "mcp::crm",
                    { "name": "builtin::rag", "args": { "vector_db_ids": ["docs-1"] } }
                ],
                "tool_config": {
                    "tool_choice": "auto",
                    "system_message_behavior": "append"
                },
                "sampling_params": {
                    "strategy": { "type": "top_p", "temperature": 1.0, "top_p": 0.9 },
                    "max_tokens": 512
                },
                "input_shields": [],
                "output_shields": [],
                "enable_session_persistence": false
            })
        );

        let back: AgentConfig = serde_json::from_value(value).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_structured_output_config() {
        let value = json!({
            "model": "llama3.2:3b",
            "instructions": "You are a helpful assistant",
            "toolgroups": ["mcp::pdf"],
            "tool_config": {
                "tool_choice": "auto",
                "system_message_behavior": "replace"
            },
            "sampling_params": {
                "strategy": { "type": "top_p", "temperature": 1.0, "top_p": 0.9 },
                "max_tokens": 9000
            },
            "input_shields": [],
            "output_shields": [],
            "max_infer_iters": 2,
            "response_format": {
                "type": "json_schema",
                "json_schema": { "type": "object" }
            },
            "enable_session_persistence": false
        });
        let config: AgentConfig = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(
            config.tool_config.system_message_behavior,
            SystemMessageBehavior::Replace
        );
        assert_eq!(config.max_infer_iters, Some(2));
        assert_eq!(
            config.response_format,
            Some(ResponseFormat::JsonSchema {
                json_schema: json!({ "type": "object" })
            })
        );
        assert_eq!(serde_json::to_value(&config).unwrap(), value);

        // Older payloads leave the new settings out.
        let tool_config: ToolConfig =
            serde_json::from_value(json!({ "tool_choice": "required" })).unwrap();
        assert_eq!(
            tool_config.system_message_behavior,
            SystemMessageBehavior::Append
        );
    }

    #[test]
    fn test_tool_selection() {
        let selection: ToolSelection =
            ["mcp::crm", "builtin::rag"].into_iter().collect();
        assert_eq!(selection.len(), 2);
        assert!(selection.contains("builtin::rag"));
        assert!(!selection.contains("mcp::pdf"));
        assert_eq!(
            selection.names().collect::<Vec<_>>(),
            ["mcp::crm", "builtin::rag"]
        );
    }
}
