//! Conversation store: ordered conversations with a bounded history.
//!
//! Conversations and messages live behind `Arc` and are changed through
//! `Arc::make_mut`. A snapshot taken before a mutation keeps pointing at the
//! old values, so readers never see a half-applied change.

use parley_protocol::{Conversation, Message};
use std::collections::VecDeque;
use std::sync::Arc;

/// Default number of retained conversations
pub const DEFAULT_MAX_CONVERSATIONS: usize = 5;

/// Ordered conversations plus a cursor on the current one
#[derive(Debug, Clone)]
pub struct ConversationStore {
    conversations: VecDeque<Arc<Conversation>>,
    current: usize,
    max_conversations: usize,
    revision: u64,
}

impl ConversationStore {
    /// Create an empty store that retains at most `max_conversations`
    pub fn new(max_conversations: usize) -> Self {
        Self {
            conversations: VecDeque::new(),
            current: 0,
            max_conversations: max_conversations.max(1),
            revision: 0,
        }
    }

    /// Append a message to the current conversation.
    ///
    /// The first message into an empty store creates the first conversation.
    pub fn append_message(&mut self, message: Message) {
        let message = Arc::new(message);
        match self.conversations.get_mut(self.current) {
            Some(conversation) => Arc::make_mut(conversation).messages.push(message),
            None => {
                let mut conversation = Conversation::new();
                conversation.messages.push(message);
                self.push_conversation(conversation);
            }
        }
        self.revision += 1;
    }

    /// Apply `f` to the last message of the current conversation.
    ///
    /// Returns `false` (and leaves the store untouched) when there is no such
    /// message.
    pub fn mutate_last<F>(&mut self, f: F) -> bool
    where
        F: FnOnce(&mut Message),
    {
        let Some(conversation) = self.conversations.get_mut(self.current) else {
            return false;
        };
        if conversation.is_empty() {
            return false;
        }
        let conversation = Arc::make_mut(conversation);
        let Some(last) = conversation.messages.last_mut() else {
            return false;
        };
        f(Arc::make_mut(last));
        self.revision += 1;
        true
    }

    /// Start a new, empty conversation and make it current.
    ///
    /// Evicts the oldest conversation when the bound is exceeded.
    pub fn start_conversation(&mut self) {
        self.push_conversation(Conversation::new());
        self.revision += 1;
    }

    fn push_conversation(&mut self, conversation: Conversation) {
        self.conversations.push_back(Arc::new(conversation));
        while self.conversations.len() > self.max_conversations {
            if let Some(evicted) = self.conversations.pop_front() {
                tracing::debug!(
                    conversation_id = %evicted.id,
                    messages = evicted.len(),
                    "evicting oldest conversation"
                );
            }
        }
        self.current = self.conversations.len() - 1;
    }

    /// The conversation new messages go to
    pub fn current(&self) -> Option<&Conversation> {
        self.conversations.get(self.current).map(Arc::as_ref)
    }

    /// The only message that events may still change
    pub fn last_message(&self) -> Option<&Message> {
        self.current().and_then(Conversation::last_message)
    }

    /// Immutable, ordered view of all retained conversations
    pub fn snapshot(&self) -> Vec<Arc<Conversation>> {
        self.conversations.iter().cloned().collect()
    }

    pub fn conversations(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.iter().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn max_conversations(&self) -> usize {
        self.max_conversations
    }

    /// Incremented on every mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONVERSATIONS)
    }
}
