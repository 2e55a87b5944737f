use crate::agent::{AgentConfig, AgentId, SessionId, TurnRequest};
use crate::catalog::{
    ModelInfo, ShieldInfo, ToolGroupInfo, ToolInfo, VectorDbInfo,
};
use crate::error::BackendError;
use crate::response::TurnResponse;

/// A type that represents an agent backend, which is an entry for
/// querying the catalog, creating agents and sessions, and running turns.
///
/// Once the backend is created, it should behave like a stateless object.
/// It can still have internal state (the backend service obviously keeps
/// agents and sessions), but callers should not rely on it, and the backend
/// object should be prepared for being dropped anytime.
///
/// Every returned future must be fully independent of `self`.
pub trait Backend: Send + Sync {
    /// The error type that may be returned by the backend.
    type Error: BackendError;

    /// The event stream type of a submitted turn.
    type Response: TurnResponse<Error = Self::Error>;

    /// Lists all registered models.
    fn list_models(
        &self,
    ) -> impl Future<Output = Result<Vec<ModelInfo>, Self::Error>> + Send + 'static;

    /// Lists all registered tool groups.
    fn list_tool_groups(
        &self,
    ) -> impl Future<Output = Result<Vec<ToolGroupInfo>, Self::Error>>
    + Send
    + 'static;

    /// Lists the tools within a tool group.
    fn list_tools(
        &self,
        toolgroup_id: &str,
    ) -> impl Future<Output = Result<Vec<ToolInfo>, Self::Error>> + Send + 'static;

    /// Lists the knowledge-source collections.
    fn list_vector_dbs(
        &self,
    ) -> impl Future<Output = Result<Vec<VectorDbInfo>, Self::Error>>
    + Send
    + 'static;

    /// Lists the safety shields.
    fn list_shields(
        &self,
    ) -> impl Future<Output = Result<Vec<ShieldInfo>, Self::Error>> + Send + 'static;

    /// Creates an agent from the configuration.
    fn create_agent(
        &self,
        config: &AgentConfig,
    ) -> impl Future<Output = Result<AgentId, Self::Error>> + Send + 'static;

    /// Creates a session under an agent.
    fn create_session(
        &self,
        agent_id: &AgentId,
        session_name: &str,
    ) -> impl Future<Output = Result<SessionId, Self::Error>> + Send + 'static;

    /// Submits a turn and returns its event stream.
    fn create_turn(
        &self,
        req: &TurnRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;
}
