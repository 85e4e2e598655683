//! Direct-message index
//!
//! One conversation per unordered pair of live sessions, opened lazily on
//! the first direct message and dropped when either side disconnects.

use std::collections::HashMap;

use crate::types::SessionId;

/// Unordered pair of distinct sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairKey(SessionId, SessionId);

impl PairKey {
    /// Normalize the pair; `None` when both sides are the same session
    pub fn new(a: SessionId, b: SessionId) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self(a, b)),
            std::cmp::Ordering::Greater => Some(Self(b, a)),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn involves(&self, id: SessionId) -> bool {
        self.0 == id || self.1 == id
    }
}

#[derive(Debug, Default)]
pub struct DirectConversation {
    /// Messages exchanged so far
    messages: u64,
}

#[derive(Debug, Default)]
pub struct DirectIndex {
    conversations: HashMap<PairKey, DirectConversation>,
}

impl DirectIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one message between `a` and `b`, opening the conversation
    /// if needed. Returns the conversation's message count, or `None` for
    /// `a == b`.
    pub fn record(&mut self, a: SessionId, b: SessionId) -> Option<u64> {
        let key = PairKey::new(a, b)?;
        let conversation = self.conversations.entry(key).or_default();
        conversation.messages += 1;
        Some(conversation.messages)
    }

    pub fn contains(&self, a: SessionId, b: SessionId) -> bool {
        PairKey::new(a, b).is_some_and(|key| self.conversations.contains_key(&key))
    }

    /// Drop every conversation involving `id`; returns how many were dropped
    pub fn forget(&mut self, id: SessionId) -> usize {
        let before = self.conversations.len();
        self.conversations.retain(|key, _| !key.involves(id));
        before - self.conversations.len()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}
