use insight_agent_backend::{AgentId, SessionId, StepEvent};

use crate::conversation::{Conversation, Role};

/// One user message and the events the backend produced for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    message: String,
    events: Vec<StepEvent>,
}

impl Turn {
    /// Returns the user message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the events received so far, in emission order.
    #[inline]
    pub fn events(&self) -> &[StepEvent] {
        &self.events
    }
}

/// A conversation session living under one agent.
///
/// The session is only kept in memory: it is gone as soon as the cache
/// entry owning its agent is dropped.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    name: String,
    agent_id: AgentId,
    turns: Vec<Turn>,
    conversation: Conversation,
}

impl Session {
    pub(crate) fn new(id: SessionId, name: String, agent_id: AgentId) -> Self {
        Self {
            id,
            name,
            agent_id,
            turns: vec![],
            conversation: Default::default(),
        }
    }

    /// Returns the backend identifier of this session.
    #[inline]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Returns the generated display name of this session.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the agent owning this session.
    #[inline]
    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// Returns the turns submitted so far.
    #[inline]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Returns the displayed conversation history.
    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Appends a finished message to the conversation history.
    #[inline]
    pub fn append_message<S: Into<String>>(&mut self, role: Role, content: S) {
        self.conversation.push(role, content);
    }

    pub(crate) fn begin_turn(&mut self, message: &str) {
        self.turns.push(Turn {
            message: message.to_owned(),
            events: vec![],
        });
    }

    pub(crate) fn record_event(&mut self, event: &StepEvent) {
        if let Some(turn) = self.turns.last_mut() {
            turn.events.push(event.clone());
        }
    }
}
