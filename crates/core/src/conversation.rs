//! Conversation-related types.

/// Who wrote a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// The person talking to the agent.
    User,
    /// The agent.
    Assistant,
}

/// Represents a conversation, a history that only grows.
#[derive(Clone, Default, Debug)]
pub struct Conversation {
    pub(crate) items: Vec<Item>,
}

impl Conversation {
    /// Appends a message to the conversation.
    #[inline]
    pub fn push<S: Into<String>>(&mut self, role: Role, transcript: S) {
        self.items.push(Item {
            role,
            transcript: transcript.into(),
        });
    }

    /// Returns all items in the order they were added.
    #[inline]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Returns the last item, if any.
    #[inline]
    pub fn last(&self) -> Option<&Item> {
        self.items.last()
    }

    /// Returns the number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing has been said yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// An item in the conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    pub(crate) role: Role,
    pub(crate) transcript: String,
}

impl Item {
    /// Returns who wrote this item.
    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the transcript of this item.
    ///
    /// For assistant items this is the concatenation of all display
    /// fragments of the turn, tool markers and error text included.
    #[inline]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }
}
