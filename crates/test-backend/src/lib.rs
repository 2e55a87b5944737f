//! A local fake backend for testing purpose.

mod preset;

use std::collections::{HashMap, VecDeque};
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use insight_agent_backend::{
    AgentConfig, AgentId, Backend, BackendError, ErrorKind, ModelInfo,
    ModelType, SessionId, ShieldInfo, StepEvent, ToolGroupInfo, ToolInfo,
    TurnRequest, TurnResponse, VectorDbInfo,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl BackendError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestTurnResponse {
    events: Vec<PresetEvent>,
    event_idx: usize,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl TurnResponse for TestTurnResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<StepEvent>, Self::Error>> {
        let this = self.get_mut();

        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;

            let Some(preset) = this.events.get(this.event_idx) else {
                // In case this method is called after completion.
                return Poll::Ready(Ok(None));
            };
            this.event_idx += 1;
            return match preset {
                PresetEvent::Event(event) => Poll::Ready(Ok(Some(event.clone()))),
                PresetEvent::TransportFailure => {
                    // Nothing can be read after a broken connection.
                    this.event_idx = this.events.len();
                    Poll::Ready(Err(Error {
                        message: "connection reset",
                        kind: ErrorKind::Unavailable,
                    }))
                }
            };
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

#[derive(Default)]
struct State {
    turn_script: VecDeque<PresetTurn>,
    created_agents: Vec<AgentConfig>,
    created_sessions: Vec<(AgentId, String)>,
    turn_requests: Vec<TurnRequest>,
}

/// A local fake backend for testing purpose.
///
/// Before submitting turns, you need to setup the turn script, which is
/// how the backend should respond to each submitted turn, in submission
/// order. If there are no enough turns in the script, an error will be
/// returned.
///
/// Cloned backends share the script and the recorded calls, so a test
/// can hand a clone to the code under test and inspect the original.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestBackend {
    models: Vec<ModelInfo>,
    tool_groups: Vec<ToolGroupInfo>,
    tools: HashMap<String, Vec<ToolInfo>>,
    vector_dbs: Vec<VectorDbInfo>,
    shields: Vec<ShieldInfo>,
    unavailable: bool,
    delay: Option<Duration>,
    state: Arc<Mutex<State>>,
}

impl TestBackend {
    #[inline]
    pub fn add_model(&mut self, identifier: &str, model_type: ModelType) {
        self.models.push(ModelInfo {
            identifier: identifier.to_owned(),
            provider_id: "test".to_owned(),
            model_type,
        });
    }

    #[inline]
    pub fn add_tool_group(&mut self, identifier: &str) {
        self.tool_groups.push(ToolGroupInfo {
            identifier: identifier.to_owned(),
            provider_id: "test".to_owned(),
        });
    }

    #[inline]
    pub fn add_tool(&mut self, toolgroup_id: &str, identifier: &str) {
        self.tools
            .entry(toolgroup_id.to_owned())
            .or_default()
            .push(ToolInfo {
                identifier: identifier.to_owned(),
                description: String::new(),
                toolgroup_id: toolgroup_id.to_owned(),
            });
    }

    #[inline]
    pub fn add_vector_db(&mut self, identifier: &str) {
        self.vector_dbs.push(VectorDbInfo {
            identifier: identifier.to_owned(),
            embedding_model: "test-embedding".to_owned(),
        });
    }

    #[inline]
    pub fn add_shield(&mut self, identifier: &str) {
        self.shields.push(ShieldInfo {
            identifier: identifier.to_owned(),
        });
    }

    #[inline]
    pub fn add_turn(&self, preset: PresetTurn) {
        self.state().turn_script.push_back(preset);
    }

    /// Makes every catalog query fail.
    #[inline]
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns the configurations of all agents created so far.
    pub fn created_agents(&self) -> Vec<AgentConfig> {
        self.state().created_agents.clone()
    }

    /// Returns the agent and name of all sessions created so far.
    pub fn created_sessions(&self) -> Vec<(AgentId, String)> {
        self.state().created_sessions.clone()
    }

    /// Returns all submitted turns.
    pub fn turn_requests(&self) -> Vec<TurnRequest> {
        self.state().turn_requests.clone()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn catalog<T: Clone>(&self, items: &[T]) -> Result<Vec<T>, Error> {
        if self.unavailable {
            return Err(Error {
                message: "backend is unavailable",
                kind: ErrorKind::Unavailable,
            });
        }
        Ok(items.to_vec())
    }
}

impl Backend for TestBackend {
    type Error = crate::Error;
    type Response = TestTurnResponse;

    fn list_models(
        &self,
    ) -> impl Future<Output = Result<Vec<ModelInfo>, Self::Error>> + Send + 'static
    {
        ready(self.catalog(&self.models))
    }

    fn list_tool_groups(
        &self,
    ) -> impl Future<Output = Result<Vec<ToolGroupInfo>, Self::Error>>
    + Send
    + 'static {
        ready(self.catalog(&self.tool_groups))
    }

    fn list_tools(
        &self,
        toolgroup_id: &str,
    ) -> impl Future<Output = Result<Vec<ToolInfo>, Self::Error>> + Send + 'static
    {
        let result = match self.tools.get(toolgroup_id) {
            Some(tools) => self.catalog(tools),
            None if self.unavailable => self.catalog(&[]),
            None => Ok(vec![]),
        };
        ready(result)
    }

    fn list_vector_dbs(
        &self,
    ) -> impl Future<Output = Result<Vec<VectorDbInfo>, Self::Error>>
    + Send
    + 'static {
        ready(self.catalog(&self.vector_dbs))
    }

    fn list_shields(
        &self,
    ) -> impl Future<Output = Result<Vec<ShieldInfo>, Self::Error>> + Send + 'static
    {
        ready(self.catalog(&self.shields))
    }

    fn create_agent(
        &self,
        config: &AgentConfig,
    ) -> impl Future<Output = Result<AgentId, Self::Error>> + Send + 'static
    {
        let mut state = self.state();
        state.created_agents.push(config.clone());
        let id = AgentId(format!("agent:{}", state.created_agents.len()));
        ready(Ok(id))
    }

    fn create_session(
        &self,
        agent_id: &AgentId,
        session_name: &str,
    ) -> impl Future<Output = Result<SessionId, Self::Error>> + Send + 'static
    {
        let mut state = self.state();
        let known_agent = (1..=state.created_agents.len())
            .any(|n| agent_id.as_str() == format!("agent:{n}"));
        if !known_agent {
            return ready(Err(Error {
                message: "no such agent",
                kind: ErrorKind::NotFound,
            }));
        }
        state
            .created_sessions
            .push((agent_id.clone(), session_name.to_owned()));
        let id = SessionId(format!("session:{}", state.created_sessions.len()));
        ready(Ok(id))
    }

    fn create_turn(
        &self,
        req: &TurnRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let mut state = self.state();
        state.turn_requests.push(req.clone());
        let result = match state.turn_script.pop_front() {
            None => Err(Error {
                message: "no enough turns",
                kind: ErrorKind::Other,
            }),
            Some(preset) if preset.rejected => Err(Error {
                message: "turn rejected",
                kind: ErrorKind::Unavailable,
            }),
            Some(preset) => Ok(TestTurnResponse {
                events: preset.events,
                event_idx: 0,
                delay: self.delay.unwrap_or(Duration::from_millis(1)),
                sleep: None,
            }),
        };
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use insight_agent_backend::StepKind;

    use super::*;

    async fn collect_events(
        resp: TestTurnResponse,
    ) -> (Vec<StepEvent>, Option<Error>) {
        let mut resp = pin!(resp);
        let mut events = vec![];
        loop {
            match poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await {
                Ok(Some(event)) => events.push(event),
                Ok(None) => return (events, None),
                Err(err) => return (events, Some(err)),
            }
        }
    }

    fn turn_request(agent_id: AgentId, session_id: SessionId) -> TurnRequest {
        TurnRequest {
            agent_id,
            session_id,
            message: "Review the opportunities for ACME".to_owned(),
            stream: true,
        }
    }

    #[tokio::test]
    async fn test_submit_turns() {
        let mut backend = TestBackend::default();
        backend.add_model("llama3.2:3b", ModelType::Llm);
        backend.add_turn(PresetTurn::with_events([
            PresetEvent::text("Looking up "),
            PresetEvent::text("ACME."),
            PresetEvent::complete(StepKind::Inference),
            PresetEvent::complete(StepKind::ToolExecution),
        ]));
        backend.add_turn(PresetTurn::with_events([
            PresetEvent::text("Half"),
            PresetEvent::TransportFailure,
            PresetEvent::text("never delivered"),
        ]));

        let config = AgentConfig {
            model: "llama3.2:3b".to_owned(),
            instructions: String::new(),
            toolgroups: Default::default(),
            tool_config: Default::default(),
            sampling_params: Default::default(),
            input_shields: vec![],
            output_shields: vec![],
            max_infer_iters: None,
            response_format: None,
            enable_session_persistence: false,
        };
        let agent_id = backend.create_agent(&config).await.unwrap();
        let session_id =
            backend.create_session(&agent_id, "test").await.unwrap();
        assert_eq!(backend.created_agents(), vec![config]);

        let req = turn_request(agent_id.clone(), session_id.clone());
        let resp = backend.create_turn(&req).await.unwrap();
        let (events, err) = collect_events(resp).await;
        assert!(err.is_none());
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], StepEvent::text("Looking up "));

        let resp = backend.create_turn(&req).await.unwrap();
        let (events, err) = collect_events(resp).await;
        assert_eq!(events, vec![StepEvent::text("Half")]);
        assert_eq!(err.unwrap().kind(), ErrorKind::Unavailable);

        // The script is exhausted.
        let err = backend.create_turn(&req).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(backend.turn_requests().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_agent() {
        let backend = TestBackend::default();
        let err = backend
            .create_session(&AgentId("agent:9".to_owned()), "test")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_unavailable_catalog() {
        let mut backend = TestBackend::default();
        backend.add_tool_group("mcp::crm");
        backend.set_unavailable(true);
        let err = backend.list_tool_groups().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }
}
