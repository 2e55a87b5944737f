use insight_agent_backend::{
    AgentConfig, ModelInfo, ResponseFormat, SamplingParams, SamplingStrategy,
    SystemMessageBehavior, ToolChoice, ToolConfig, ToolRef, ToolSelection,
};
use serde_json::{Map, Value};

use crate::ConfigurationError;
use crate::react;
use crate::toolgroup::RAG_TOOL_GROUP;

/// The instructions used when none are given.
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful assistant.";

/// The token bound used when none is given.
pub const DEFAULT_MAX_TOKENS: u32 = 9000;

/// [`AgentConfig`] builder.
///
/// The builder is created from the model catalog of the backend, so that
/// the chosen model can be checked against the generation-capable ones.
#[derive(Clone, Debug)]
pub struct AgentConfigBuilder {
    generation_models: Vec<String>,
    model: Option<String>,
    instructions: String,
    tool_groups: Vec<String>,
    vector_dbs: Vec<String>,
    tool_choice: ToolChoice,
    system_message_behavior: SystemMessageBehavior,
    strategy: SamplingStrategy,
    max_tokens: u32,
    shields: Vec<String>,
    max_infer_iters: Option<u32>,
    response_format: Option<ResponseFormat>,
}

impl AgentConfigBuilder {
    /// Creates a builder over the model catalog.
    ///
    /// Embedding and other non-generation models are dropped here.
    pub fn with_models<'a, I>(catalog: I) -> Self
    where
        I: IntoIterator<Item = &'a ModelInfo>,
    {
        let generation_models = catalog
            .into_iter()
            .filter(|model| model.is_llm())
            .map(|model| model.identifier.clone())
            .collect();
        Self {
            generation_models,
            model: None,
            instructions: DEFAULT_INSTRUCTIONS.to_owned(),
            tool_groups: vec![],
            vector_dbs: vec![],
            tool_choice: ToolChoice::Auto,
            system_message_behavior: SystemMessageBehavior::Append,
            strategy: SamplingStrategy::Greedy,
            max_tokens: DEFAULT_MAX_TOKENS,
            shields: vec![],
            max_infer_iters: None,
            response_format: None,
        }
    }

    /// Returns the generation-capable models of the catalog.
    #[inline]
    pub fn generation_models(&self) -> &[String] {
        &self.generation_models
    }

    /// Sets the model. Without it, the first generation-capable model is
    /// used.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the system instructions.
    #[inline]
    pub fn with_instructions<S: Into<String>>(mut self, instructions: S) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Sets the enabled tool groups, in display order.
    #[inline]
    pub fn with_tool_groups<I, S>(mut self, tool_groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tool_groups = tool_groups.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the knowledge sources used by the retrieval tool group.
    #[inline]
    pub fn with_vector_dbs<I, S>(mut self, vector_dbs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vector_dbs = vector_dbs.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the tool choice policy.
    #[inline]
    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = tool_choice;
        self
    }

    /// Sets the sampling strategy.
    #[inline]
    pub fn with_sampling_strategy(mut self, strategy: SamplingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the maximum number of tokens per inference step.
    #[inline]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the shields applied to both input and output.
    #[inline]
    pub fn with_shields<I, S>(mut self, shields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shields = shields.into_iter().map(Into::into).collect();
        self
    }

    /// Bounds the number of inference steps in one turn.
    #[inline]
    pub fn with_max_infer_iters(mut self, max_infer_iters: u32) -> Self {
        self.max_infer_iters = Some(max_infer_iters);
        self
    }

    /// Sets whether the instructions replace the server's default system
    /// message instead of being appended to it.
    #[inline]
    pub fn with_system_message_behavior(
        mut self,
        behavior: SystemMessageBehavior,
    ) -> Self {
        self.system_message_behavior = behavior;
        self
    }

    /// Constrains every model output to the given format.
    #[inline]
    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    /// Turns the agent into a reasoning-and-acting one.
    ///
    /// Outputs are constrained to [`ReActOutput`] and the instructions
    /// replace the default system message.
    ///
    /// [`ReActOutput`]: crate::react::ReActOutput
    pub fn with_react_output(self) -> Self {
        self.with_response_format(react::response_format())
            .with_system_message_behavior(SystemMessageBehavior::Replace)
    }

    /// Builds the configuration.
    pub fn build(self) -> Result<AgentConfig, ConfigurationError> {
        let Some(default_model) = self.generation_models.first() else {
            return Err(ConfigurationError::NoGenerationModel);
        };
        let model = match self.model {
            Some(model) if self.generation_models.contains(&model) => model,
            Some(model) => return Err(ConfigurationError::UnknownModel(model)),
            None => default_model.clone(),
        };

        validate_strategy(&self.strategy)?;

        let mut toolgroups = Vec::with_capacity(self.tool_groups.len());
        for (idx, name) in self.tool_groups.iter().enumerate() {
            if self.tool_groups[..idx].contains(name) {
                return Err(ConfigurationError::DuplicateToolGroup(
                    name.clone(),
                ));
            }
            toolgroups.push(tool_ref(name, &self.vector_dbs));
        }

        debug!("building agent config for {model} with {toolgroups:?}");

        Ok(AgentConfig {
            model,
            instructions: self.instructions,
            toolgroups: ToolSelection(toolgroups),
            tool_config: ToolConfig {
                tool_choice: self.tool_choice,
                system_message_behavior: self.system_message_behavior,
            },
            sampling_params: SamplingParams {
                strategy: self.strategy,
                max_tokens: self.max_tokens,
            },
            input_shields: self.shields.clone(),
            output_shields: self.shields,
            max_infer_iters: self.max_infer_iters,
            enable_session_persistence: false,
            response_format: self.response_format,
        })
    }
}

/// The retrieval tool group takes its knowledge sources as arguments, an
/// empty list included. Other tool groups are referenced by name.
fn tool_ref(name: &str, vector_dbs: &[String]) -> ToolRef {
    if name != RAG_TOOL_GROUP {
        return ToolRef::Name(name.to_owned());
    }
    if vector_dbs.is_empty() {
        warn!("retrieval is enabled without any knowledge source");
    }
    let mut args = Map::new();
    args.insert(
        "vector_db_ids".to_owned(),
        Value::Array(vector_dbs.iter().cloned().map(Value::String).collect()),
    );
    ToolRef::WithArgs {
        name: name.to_owned(),
        args,
    }
}

fn validate_strategy(
    strategy: &SamplingStrategy,
) -> Result<(), ConfigurationError> {
    let SamplingStrategy::TopP { temperature, top_p } = *strategy else {
        return Ok(());
    };
    if !temperature.is_finite() || temperature < 0.0 {
        return Err(ConfigurationError::InvalidSampling(format!(
            "temperature must be a non-negative number, got {temperature}"
        )));
    }
    if !(top_p > 0.0 && top_p <= 1.0) {
        return Err(ConfigurationError::InvalidSampling(format!(
            "top_p must be in (0, 1], got {top_p}"
        )));
    }
    Ok(())
}
