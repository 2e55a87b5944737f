use std::mem;

use insight_agent_backend::{
    AgentConfig, Backend, ModelInfo, SamplingStrategy, ToolChoice,
    ToolSelection, VectorDbInfo,
};
use insight_agent_core::conversation::{Item, Role};
use insight_agent_core::toolgroup::{self, ResolvedToolGroups};
use insight_agent_core::{
    AgentConfigBuilder, DEFAULT_INSTRUCTIONS, DEFAULT_MAX_TOKENS, Error,
    Fragment, Fragments, SessionCache, TurnExecutor,
};

const GREETING: &str =
    "Enter the details of the customer analysis you want to perform";

/// What the user picked for the agent.
///
/// Any change to the settings starts a new conversation.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaygroundSettings {
    /// The generation model, or `None` for the first one available.
    pub model: Option<String>,
    /// Selected tool group identifiers, in display order.
    pub tool_groups: Vec<String>,
    /// Knowledge sources for the retrieval tool group.
    pub vector_dbs: Vec<String>,
    /// The sampling strategy.
    pub strategy: SamplingStrategy,
    /// The token bound per inference step.
    pub max_tokens: u32,
    /// The agent instructions.
    pub instructions: String,
    /// Whether the model must, may or must not call tools.
    pub tool_choice: ToolChoice,
    /// The bound on inference steps per turn, or `None` for the server's.
    pub max_infer_iters: Option<u32>,
    /// Whether answers are structured reasoning steps.
    pub react: bool,
}

impl Default for PlaygroundSettings {
    fn default() -> Self {
        Self {
            model: None,
            tool_groups: vec![],
            vector_dbs: vec![],
            strategy: SamplingStrategy::Greedy,
            max_tokens: DEFAULT_MAX_TOKENS,
            instructions: DEFAULT_INSTRUCTIONS.to_owned(),
            tool_choice: ToolChoice::Auto,
            max_infer_iters: None,
            react: false,
        }
    }
}

/// A chat playground, like a window that displays messages and has a
/// sidebar of settings.
///
/// The playground keeps a snapshot of the backend catalog, and holds the
/// agent and session for the current settings.
pub struct Playground<B> {
    backend: B,
    models: Vec<ModelInfo>,
    tool_groups: ResolvedToolGroups,
    shields: Vec<String>,
    settings: PlaygroundSettings,
    cache: SessionCache,
}

impl<B: Backend> Playground<B> {
    /// Fetches the catalog of `backend` and creates a playground over it.
    ///
    /// All connectors are selected initially.
    pub async fn load(backend: B) -> Result<Self, Error> {
        let models = backend.list_models().await.map_err(Error::from_backend)?;
        let tool_groups = backend
            .list_tool_groups()
            .await
            .map_err(Error::from_backend)?;
        let shields = backend
            .list_shields()
            .await
            .map_err(Error::from_backend)?;
        let tool_groups =
            toolgroup::resolve(tool_groups.into_iter().map(|g| g.identifier));
        debug!(
            "loaded {} models, {} connectors, {} builtins",
            models.len(),
            tool_groups.connectors().len(),
            tool_groups.builtins().len()
        );

        let settings = PlaygroundSettings {
            tool_groups: tool_groups
                .connectors()
                .iter()
                .map(|d| d.identifier().to_owned())
                .collect(),
            ..Default::default()
        };
        Ok(Self {
            backend,
            models,
            tool_groups,
            shields: shields.into_iter().map(|s| s.identifier).collect(),
            settings,
            cache: SessionCache::new(),
        })
    }

    /// Returns the identifiers of the generation-capable models.
    pub fn models(&self) -> Vec<&str> {
        self.models
            .iter()
            .filter(|model| model.is_llm())
            .map(|model| model.identifier.as_str())
            .collect()
    }

    /// Returns the tool groups of the backend.
    #[inline]
    pub fn tool_groups(&self) -> &ResolvedToolGroups {
        &self.tool_groups
    }

    /// Returns the shields applied to every agent.
    #[inline]
    pub fn shields(&self) -> &[String] {
        &self.shields
    }

    /// Returns the current settings.
    #[inline]
    pub fn settings(&self) -> &PlaygroundSettings {
        &self.settings
    }

    /// Applies new settings.
    ///
    /// Returns `true` if the settings changed, in which case the agent and
    /// the conversation are dropped.
    pub fn reconfigure(&mut self, settings: PlaygroundSettings) -> bool {
        if settings == self.settings {
            return false;
        }
        info!("settings changed, starting a new conversation");
        self.cache = mem::take(&mut self.cache).invalidate();
        self.settings = settings;
        true
    }

    /// Lists the knowledge sources of the backend.
    pub async fn vector_dbs(&self) -> Result<Vec<VectorDbInfo>, Error> {
        let vector_dbs = self
            .backend
            .list_vector_dbs()
            .await
            .map_err(Error::from_backend)?;
        if vector_dbs.is_empty() {
            warn!("no knowledge sources available");
        }
        Ok(vector_dbs)
    }

    /// Lists the tools the selected tool groups bring in.
    pub async fn active_tools(&self) -> Result<Vec<String>, Error> {
        let selection = self
            .settings
            .tool_groups
            .iter()
            .map(String::as_str)
            .collect::<ToolSelection>();
        toolgroup::active_tools(&self.backend, &selection).await
    }

    /// Builds the agent configuration for the current settings.
    pub fn agent_config(&self) -> Result<AgentConfig, Error> {
        let settings = &self.settings;
        let mut builder = AgentConfigBuilder::with_models(&self.models)
            .with_instructions(&settings.instructions)
            .with_tool_groups(&settings.tool_groups)
            .with_vector_dbs(&settings.vector_dbs)
            .with_sampling_strategy(settings.strategy)
            .with_max_tokens(settings.max_tokens)
            .with_tool_choice(settings.tool_choice)
            .with_shields(&self.shields);
        if let Some(model) = &settings.model {
            builder = builder.with_model(model);
        }
        if let Some(max_infer_iters) = settings.max_infer_iters {
            builder = builder.with_max_infer_iters(max_infer_iters);
        }
        if settings.react {
            builder = builder.with_react_output();
        }
        Ok(builder.build()?)
    }

    /// Sends a message and streams the answer.
    ///
    /// `on_fragment` is called with every piece of the answer as it
    /// arrives. Both the message and the full answer are appended to the
    /// history, even if the turn fails midway.
    pub async fn send_message<F>(
        &mut self,
        message: &str,
        on_fragment: F,
    ) -> Result<String, Error>
    where
        F: FnMut(&Fragment),
    {
        let config = self.agent_config()?;
        let handle = self.cache.get_or_create(&self.backend, &config).await?;
        let session = handle.session(&self.backend).await?;
        session.append_message(Role::User, message);

        let events = TurnExecutor::new(&self.backend)
            .execute(session, message, true)
            .await?;
        let mut fragments = Fragments::new(events);
        let answer = fragments.collect_message(on_fragment).await;

        let session = fragments.into_events().into_session();
        session.append_message(Role::Assistant, answer.as_str());
        Ok(answer)
    }

    /// Sends every non-blank line of `text` as its own message, in order.
    ///
    /// Returns the answers. Stops at the first message that cannot be
    /// sent.
    pub async fn send_prompts<F>(
        &mut self,
        text: &str,
        mut on_fragment: F,
    ) -> Result<Vec<String>, Error>
    where
        F: FnMut(&Fragment),
    {
        let mut answers = vec![];
        for prompt in split_prompts(text) {
            answers.push(self.send_message(prompt, &mut on_fragment).await?);
        }
        Ok(answers)
    }

    /// Returns the opening message shown before the conversation.
    #[inline]
    pub fn greeting(&self) -> &str {
        GREETING
    }

    /// Returns the conversation history of the current session.
    pub fn history(&self) -> &[Item] {
        self.cache
            .current()
            .and_then(|handle| handle.current_session())
            .map(|session| session.conversation().items())
            .unwrap_or_default()
    }
}

/// Splits a multi-line input into prompts, skipping blank lines.
pub fn split_prompts(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use insight_agent_backend::{
        ModelType, ResponseFormat, StepKind, SystemMessageBehavior, ToolRef,
    };
    use insight_agent_core::ReActOutput;
    use insight_agent_test_backend::{PresetEvent, PresetTurn, TestBackend};

    use super::*;

    fn backend() -> TestBackend {
        let mut backend = TestBackend::default();
        backend.add_model("all-minilm", ModelType::Embedding);
        backend.add_model("llama3.2:3b", ModelType::Llm);
        backend.add_model("granite3.3:8b", ModelType::Llm);
        backend.add_tool_group("mcp::crm");
        backend.add_tool_group("builtin::rag");
        backend.add_tool_group("mcp::pdf");
        backend.add_tool("mcp::crm", "find_opportunities");
        backend.add_tool("mcp::crm", "find_support_cases");
        backend.add_tool("mcp::pdf", "create_pdf");
        backend.add_vector_db("sales-playbooks");
        backend.add_shield("llama-guard");
        backend
    }

    #[tokio::test]
    async fn test_load() {
        let playground = Playground::load(backend()).await.unwrap();
        assert_eq!(playground.models(), ["llama3.2:3b", "granite3.3:8b"]);
        assert_eq!(playground.tool_groups().connectors().len(), 2);
        assert_eq!(playground.settings().tool_groups, ["mcp::crm", "mcp::pdf"]);
        assert_eq!(playground.shields(), ["llama-guard"]);
        assert!(playground.history().is_empty());

        let tools = playground.active_tools().await.unwrap();
        assert_eq!(
            tools,
            [
                "crm:find_opportunities",
                "crm:find_support_cases",
                "pdf:create_pdf"
            ]
        );
        let vector_dbs = playground.vector_dbs().await.unwrap();
        assert_eq!(vector_dbs[0].identifier, "sales-playbooks");
    }

    #[tokio::test]
    async fn test_unavailable_backend() {
        let mut backend = backend();
        backend.set_unavailable(true);
        let err = Playground::load(backend).await.err().unwrap();
        assert!(!err.is_configuration());
    }

    #[tokio::test]
    async fn test_send_message() {
        let backend = backend();
        backend.add_turn(PresetTurn::with_events([
            PresetEvent::text("ACME has "),
            PresetEvent::complete(StepKind::Inference),
            PresetEvent::complete(StepKind::ToolExecution),
            PresetEvent::text("2 open opportunities."),
        ]));
        backend.add_turn(PresetTurn::with_events([
            PresetEvent::text("Generating"),
            PresetEvent::stream_error("tool crashed"),
        ]));
        let mut playground = Playground::load(backend.clone()).await.unwrap();

        let mut fragments = vec![];
        let answer = playground
            .send_message("Review ACME", |f| fragments.push(f.clone()))
            .await
            .unwrap();
        assert_eq!(answer, "ACME has  🛠 2 open opportunities.");
        assert_eq!(fragments.len(), 3);

        let answer = playground
            .send_message("Make a PDF", |_| {})
            .await
            .unwrap();
        assert_eq!(
            answer,
            "GeneratingError occurred in the backend: tool crashed"
        );

        let history = playground.history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].role(), Role::User);
        assert_eq!(history[0].transcript(), "Review ACME");
        assert_eq!(history[3].role(), Role::Assistant);
        assert_eq!(history[3].transcript(), answer);

        // One agent and one session for the whole conversation.
        assert_eq!(backend.created_agents().len(), 1);
        assert_eq!(backend.created_sessions().len(), 1);
        let agent = &backend.created_agents()[0];
        assert_eq!(agent.model, "llama3.2:3b");
        assert_eq!(agent.input_shields, ["llama-guard"]);
        assert_eq!(agent.output_shields, ["llama-guard"]);
    }

    #[tokio::test]
    async fn test_reconfigure() {
        let backend = backend();
        backend.add_turn(PresetTurn::with_events([PresetEvent::text("Hi")]));
        backend.add_turn(PresetTurn::with_events([PresetEvent::text("Hi")]));
        let mut playground = Playground::load(backend.clone()).await.unwrap();
        playground.send_message("Hello", |_| {}).await.unwrap();

        let settings = playground.settings().clone();
        assert!(!playground.reconfigure(settings.clone()));
        assert_eq!(playground.history().len(), 2);

        let settings = PlaygroundSettings {
            model: Some("granite3.3:8b".to_owned()),
            tool_groups: vec!["mcp::crm".to_owned(), "builtin::rag".to_owned()],
            vector_dbs: vec!["sales-playbooks".to_owned()],
            ..settings
        };
        assert!(playground.reconfigure(settings));
        assert!(playground.history().is_empty());

        playground.send_message("Hello", |_| {}).await.unwrap();
        let agents = backend.created_agents();
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[1].model, "granite3.3:8b");
        let rag = agents[1].toolgroups.iter().nth(1).unwrap();
        assert_eq!(rag.name(), "builtin::rag");
        assert!(matches!(rag, ToolRef::WithArgs { .. }));
        assert_eq!(backend.created_sessions().len(), 2);
    }

    #[tokio::test]
    async fn test_react_settings() {
        let backend = backend();
        backend.add_turn(PresetTurn::with_events([PresetEvent::text(
            r#"{"thought": "Nothing to do.", "action": null, "answer": "Hi"}"#,
        )]));
        let mut playground = Playground::load(backend.clone()).await.unwrap();
        let settings = PlaygroundSettings {
            tool_groups: vec!["mcp::pdf".to_owned()],
            strategy: SamplingStrategy::TopP {
                temperature: 1.0,
                top_p: 0.9,
            },
            tool_choice: ToolChoice::Required,
            max_infer_iters: Some(2),
            react: true,
            ..playground.settings().clone()
        };
        assert!(playground.reconfigure(settings));

        let answer = playground.send_message("Hello", |_| {}).await.unwrap();
        let output = ReActOutput::parse(&answer).unwrap();
        assert_eq!(output.answer.as_deref(), Some("Hi"));

        let agent = &backend.created_agents()[0];
        assert_eq!(agent.max_infer_iters, Some(2));
        assert_eq!(agent.tool_config.tool_choice, ToolChoice::Required);
        assert_eq!(
            agent.tool_config.system_message_behavior,
            SystemMessageBehavior::Replace
        );
        assert!(matches!(
            agent.response_format,
            Some(ResponseFormat::JsonSchema { .. })
        ));
    }

    #[tokio::test]
    async fn test_configuration_error() {
        let mut playground = Playground::load(backend()).await.unwrap();
        let settings = PlaygroundSettings {
            model: Some("all-minilm".to_owned()),
            ..Default::default()
        };
        playground.reconfigure(settings);
        let err = playground.send_message("Hello", |_| {}).await.unwrap_err();
        assert!(err.is_configuration());
        assert!(playground.history().is_empty());
    }

    #[tokio::test]
    async fn test_no_generation_model() {
        let mut backend = TestBackend::default();
        backend.add_model("all-minilm", ModelType::Embedding);
        let mut playground = Playground::load(backend.clone()).await.unwrap();
        assert!(playground.models().is_empty());

        let err = playground.send_message("Hello", |_| {}).await.unwrap_err();
        assert!(err.is_configuration());
        assert!(backend.created_agents().is_empty());
        assert!(backend.created_sessions().is_empty());
    }

    #[tokio::test]
    async fn test_send_prompts() {
        let backend = backend();
        backend.add_turn(PresetTurn::with_events([PresetEvent::text("One")]));
        backend.add_turn(PresetTurn::with_events([PresetEvent::text("Two")]));
        let mut playground = Playground::load(backend.clone()).await.unwrap();

        let mut count = 0;
        let answers = playground
            .send_prompts("Review ACME\n\n   \nSummarize it\n", |_| count += 1)
            .await
            .unwrap();
        assert_eq!(answers, ["One", "Two"]);
        assert_eq!(count, 2);
        let messages = backend
            .turn_requests()
            .into_iter()
            .map(|req| req.message)
            .collect::<Vec<_>>();
        assert_eq!(messages, ["Review ACME", "Summarize it"]);
    }
}
