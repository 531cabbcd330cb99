//! Session registry: code → session.

use std::collections::HashMap;

use echo_protocol::SessionCode;

use crate::session::Session;

/// In-memory index of live sessions.
///
/// A session is present only while it has at least one member. Removal is
/// done eagerly by the disconnect path and again by [`sweep`](Self::sweep)
/// as a backstop. Not synchronized; [`RelayHub`](crate::hub::RelayHub) owns
/// it behind a single lock.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionCode, Session>,
}

impl SessionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The session for `code`, created empty if unknown.
    pub fn get_or_create(&mut self, code: &SessionCode) -> &mut Session {
        self.sessions.entry(code.clone()).or_default()
    }

    /// Look up a session.
    pub fn get(&self, code: &SessionCode) -> Option<&Session> {
        self.sessions.get(code)
    }

    /// Look up a session mutably.
    pub fn get_mut(&mut self, code: &SessionCode) -> Option<&mut Session> {
        self.sessions.get_mut(code)
    }

    /// Delete a session unconditionally. Removing an unknown code is a no-op.
    pub fn remove(&mut self, code: &SessionCode) -> bool {
        self.sessions.remove(code).is_some()
    }

    /// Delete a session if it has no members left.
    pub fn remove_if_empty(&mut self, code: &SessionCode) -> bool {
        if self.sessions.get(code).is_some_and(Session::is_empty) {
            return self.remove(code);
        }
        false
    }

    /// Drop every empty session. Returns how many were removed.
    pub fn sweep(&mut self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_empty());
        before - self.sessions.len()
    }

    /// Whether a session exists for `code`.
    pub fn contains(&self, code: &SessionCode) -> bool {
        self.sessions.contains_key(code)
    }

    /// Number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when no session exists.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Total displays and phones across all sessions.
    pub fn member_count(&self) -> usize {
        self.sessions
            .values()
            .map(|s| s.display_count() + s.phone_count())
            .sum()
    }
}
