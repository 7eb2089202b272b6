//! Per-user conversation state.
//!
//! State is kept per user within a chat, so in a group each member runs their
//! own menu. Entries idle for longer than the configured limit are dropped.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use courier::core::Event;

use crate::input::LookupKind;

/// How long an untouched conversation is kept.
pub const DEFAULT_IDLE: Duration = Duration::from_secs(30 * 60);

/// Where a user is in the menu flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// The menu was shown; waiting for a button.
    Choosing,
    /// Waiting for text of the given kind.
    Awaiting(LookupKind),
}

/// Identifies one conversation: a user in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub chat_id: i64,
    pub user_id: i64,
}

impl SessionKey {
    /// Returns the key for an event that has both a chat and a sender.
    pub fn of(event: &Event) -> Option<Self> {
        Some(Self {
            chat_id: event.chat_id()?,
            user_id: event.sender()?.id,
        })
    }
}

/// Conversation state keyed by chat and user.
#[derive(Debug)]
pub struct Sessions {
    entries: Mutex<HashMap<SessionKey, (State, Instant)>>,
    idle: Duration,
}

impl Default for Sessions {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE)
    }
}

impl Sessions {
    pub fn new(idle: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            idle,
        }
    }

    pub fn get(&self, key: SessionKey) -> Option<State> {
        let entries = self.entries.lock();
        entries
            .get(&key)
            .filter(|(_, touched)| touched.elapsed() < self.idle)
            .map(|(state, _)| *state)
    }

    /// Stores `state` and drops conversations that have gone idle.
    pub fn set(&self, key: SessionKey, state: State) {
        let mut entries = self.entries.lock();
        let idle = self.idle;
        entries.retain(|_, (_, touched)| touched.elapsed() < idle);
        entries.insert(key, (state, Instant::now()));
    }

    /// Clears the conversation, returning whether there was one.
    pub fn clear(&self, key: SessionKey) -> bool {
        self.entries.lock().remove(&key).is_some()
    }

    /// Returns the kind the user is waiting to send, if any.
    pub fn awaiting(&self, key: SessionKey) -> Option<LookupKind> {
        match self.get(key) {
            Some(State::Awaiting(kind)) => Some(kind),
            _ => None,
        }
    }

    /// Returns `true` if the user is looking at the menu.
    pub fn is_choosing(&self, key: SessionKey) -> bool {
        self.get(key) == Some(State::Choosing)
    }

    /// Number of stored conversations, idle ones included.
    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
