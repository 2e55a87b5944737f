use serde::{Deserialize, Serialize};

/// What a model is able to do.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// A generation-capable language model.
    Llm,
    /// An embedding-only model.
    Embedding,
    /// Anything else the backend may report.
    #[default]
    #[serde(other)]
    Other,
}

/// A model registered in the backend.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelInfo {
    /// The model identifier, used when creating agents.
    pub identifier: String,
    /// The provider serving this model.
    #[serde(default)]
    pub provider_id: String,
    /// The capability of this model.
    #[serde(default, alias = "api_model_type")]
    pub model_type: ModelType,
}

impl ModelInfo {
    /// Returns `true` if the model can generate text.
    #[inline]
    pub fn is_llm(&self) -> bool {
        self.model_type == ModelType::Llm
    }
}

/// A tool group registered in the backend.
///
/// The identifier is namespaced as `<category>::<name>`, e.g. `mcp::crm`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolGroupInfo {
    /// The tool group identifier.
    pub identifier: String,
    /// The provider hosting this tool group.
    #[serde(default)]
    pub provider_id: String,
}

/// A single tool within a tool group.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolInfo {
    /// The tool identifier.
    pub identifier: String,
    /// Human readable description of the tool.
    #[serde(default)]
    pub description: String,
    /// The tool group this tool belongs to.
    #[serde(default)]
    pub toolgroup_id: String,
}

/// A knowledge-source collection usable by the retrieval tool.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorDbInfo {
    /// The collection identifier.
    pub identifier: String,
    /// The embedding model used to index this collection.
    #[serde(default)]
    pub embedding_model: String,
}

/// A safety shield registered in the backend.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShieldInfo {
    /// The shield identifier.
    pub identifier: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_model_type() {
        let model: ModelInfo = serde_json::from_value(json!({
            "identifier": "llama3.2:3b",
            "provider_id": "ollama",
            "model_type": "llm",
        }))
        .unwrap();
        assert!(model.is_llm());

        let model: ModelInfo = serde_json::from_value(json!({
            "identifier": "all-MiniLM-L6-v2",
            "api_model_type": "embedding",
        }))
        .unwrap();
        assert_eq!(model.model_type, ModelType::Embedding);
        assert!(!model.is_llm());

        let model: ModelInfo = serde_json::from_value(json!({
            "identifier": "whisper",
            "model_type": "speech",
        }))
        .unwrap();
        assert_eq!(model.model_type, ModelType::Other);
    }
}
