use insight_agent_backend::{AgentConfig, AgentId, Backend};
use uuid::Uuid;

use crate::{Error, Session};

const SESSION_NAME_PREFIX: &str = "tool_demo";

/// A live backend agent, created from one [`AgentConfig`].
///
/// The handle owns at most one session, created on first use and reused
/// for every following turn.
#[derive(Debug)]
pub struct AgentHandle {
    agent_id: AgentId,
    config: AgentConfig,
    session: Option<Session>,
}

impl AgentHandle {
    /// Returns the backend identifier of the agent.
    #[inline]
    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// Returns the configuration the agent was created from.
    #[inline]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Returns the session if it has been created.
    #[inline]
    pub fn current_session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Returns the session of this agent, creating it on first use.
    pub async fn session<B: Backend>(
        &mut self,
        backend: &B,
    ) -> Result<&mut Session, Error> {
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                let name = format!("{SESSION_NAME_PREFIX}_{}", Uuid::new_v4());
                let id = backend
                    .create_session(&self.agent_id, &name)
                    .await
                    .map_err(Error::from_backend)?;
                info!("created session {id} ({name}) for agent {}", self.agent_id);
                Session::new(id, name, self.agent_id.clone())
            }
        };
        Ok(self.session.insert(session))
    }
}

/// A single-slot cache from an [`AgentConfig`] to a live agent.
///
/// Between two invalidations, the backend is asked to create an agent at
/// most once per distinct configuration. Only one configuration is active
/// at a time: asking for another configuration replaces the cached agent,
/// together with its session.
#[derive(Debug, Default)]
pub struct SessionCache {
    slot: Option<AgentHandle>,
}

impl SessionCache {
    /// Creates an empty cache.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the agent for `config`, creating it if needed.
    pub async fn get_or_create<B: Backend>(
        &mut self,
        backend: &B,
        config: &AgentConfig,
    ) -> Result<&mut AgentHandle, Error> {
        let handle = match self.slot.take() {
            Some(handle) if handle.config == *config => {
                trace!("reusing agent {}", handle.agent_id);
                handle
            }
            previous => {
                if let Some(previous) = previous {
                    debug!("configuration changed, dropping agent {}", previous.agent_id);
                }
                let agent_id = backend
                    .create_agent(config)
                    .await
                    .map_err(Error::from_backend)?;
                info!("created agent {agent_id} with model {}", config.model);
                AgentHandle {
                    agent_id,
                    config: config.clone(),
                    session: None,
                }
            }
        };
        Ok(self.slot.insert(handle))
    }

    /// Returns the cached agent, if any.
    #[inline]
    pub fn current(&self) -> Option<&AgentHandle> {
        self.slot.as_ref()
    }

    /// Drops every cached state, the session and its history included, and
    /// returns an empty cache.
    #[must_use]
    pub fn invalidate(self) -> Self {
        if let Some(handle) = &self.slot {
            debug!("invalidating agent {}", handle.agent_id);
        }
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use insight_agent_backend::{ModelType, SamplingStrategy};
    use insight_agent_test_backend::TestBackend;

    use super::*;
    use crate::AgentConfigBuilder;

    fn backend() -> TestBackend {
        let mut backend = TestBackend::default();
        backend.add_model("llama3.2:3b", ModelType::Llm);
        backend.add_model("granite3.3:8b", ModelType::Llm);
        backend
    }

    async fn config(backend: &TestBackend, model: &str) -> AgentConfig {
        let models = backend.list_models().await.unwrap();
        AgentConfigBuilder::with_models(&models)
            .with_model(model)
            .with_tool_groups(["mcp::crm"])
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_reuse_for_equal_config() {
        let backend = backend();
        let config = config(&backend, "llama3.2:3b").await;
        let mut cache = SessionCache::new();

        let first = cache
            .get_or_create(&backend, &config)
            .await
            .unwrap()
            .agent_id()
            .clone();
        let second = cache
            .get_or_create(&backend, &config.clone())
            .await
            .unwrap()
            .agent_id()
            .clone();
        assert_eq!(first, second);
        assert_eq!(backend.created_agents().len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_configs() {
        let backend = backend();
        let config_a = config(&backend, "llama3.2:3b").await;
        let mut config_b = config_a.clone();
        config_b.sampling_params.strategy = SamplingStrategy::TopP {
            temperature: 0.7,
            top_p: 0.9,
        };

        let mut cache = SessionCache::new();
        let first = cache
            .get_or_create(&backend, &config_a)
            .await
            .unwrap()
            .agent_id()
            .clone();

        let mut cache = cache.invalidate();
        assert!(cache.current().is_none());
        let second = cache
            .get_or_create(&backend, &config_b)
            .await
            .unwrap()
            .agent_id()
            .clone();
        assert_ne!(first, second);

        // Without invalidation, a changed config replaces the slot.
        let third = cache
            .get_or_create(&backend, &config_a)
            .await
            .unwrap()
            .agent_id()
            .clone();
        assert_ne!(third, first);
        assert_ne!(third, second);
        assert_eq!(backend.created_agents().len(), 3);
    }

    #[tokio::test]
    async fn test_session_created_once() {
        let backend = backend();
        let config = config(&backend, "granite3.3:8b").await;
        let mut cache = SessionCache::new();

        let handle = cache.get_or_create(&backend, &config).await.unwrap();
        let first = handle.session(&backend).await.unwrap().id().clone();
        let handle = cache.get_or_create(&backend, &config).await.unwrap();
        let session = handle.session(&backend).await.unwrap();
        assert_eq!(session.id(), &first);
        assert!(session.name().starts_with("tool_demo_"));

        let sessions = backend.created_sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(&sessions[0].0, cache.current().unwrap().agent_id());

        // A new configuration starts a new conversation.
        let mut cache = cache.invalidate();
        let handle = cache.get_or_create(&backend, &config).await.unwrap();
        assert!(handle.current_session().is_none());
        let session = handle.session(&backend).await.unwrap();
        assert_ne!(session.id(), &first);
        assert_eq!(backend.created_sessions().len(), 2);
    }

    #[tokio::test]
    async fn test_session_of_unknown_agent() {
        let backend = backend();
        let config = config(&backend, "llama3.2:3b").await;

        // Sessions of unknown agents are rejected by the test backend.
        let mut orphan = AgentHandle {
            agent_id: AgentId("agent:42".to_owned()),
            config,
            session: None,
        };
        let err = orphan.session(&backend).await.unwrap_err();
        assert!(matches!(err, Error::Backend { .. }));
        assert!(orphan.current_session().is_none());
    }
}
