//! User registry
//!
//! Single source of truth for who is connected. Sessions are owned here and
//! referenced everywhere else by `SessionId`.

use std::collections::BTreeMap;

use crate::error::AppError;
use crate::session::{Outbound, Session};
use crate::types::SessionId;

/// Live sessions keyed by ID
///
/// IDs are allocated before registration, so two connections can register
/// in the opposite order of their IDs. `order` keeps the actual order.
#[derive(Debug, Default)]
pub struct UserRegistry {
    sessions: BTreeMap<SessionId, Session>,
    order: Vec<SessionId>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new session
    ///
    /// Fails only if the ID is already registered.
    pub fn register(&mut self, session: Session) -> Result<(), AppError> {
        if self.sessions.contains_key(&session.id) {
            return Err(AppError::AlreadyRegistered(session.id));
        }
        self.order.push(session.id);
        self.sessions.insert(session.id, session);
        Ok(())
    }

    /// Remove and return a session
    pub fn unregister(&mut self, id: SessionId) -> Result<Session, AppError> {
        let session = self
            .sessions
            .remove(&id)
            .ok_or(AppError::SessionNotFound(id))?;
        self.order.retain(|other| *other != id);
        Ok(session)
    }

    /// Change a display name in place; names need not be unique
    pub fn rename(&mut self, id: SessionId, name: String) -> Result<(), AppError> {
        let session = self.get_mut(id)?;
        session.rename(name);
        Ok(())
    }

    /// First session with the given display name, in registration order
    pub fn find_by_name(&self, name: &str) -> Option<&Session> {
        self.order
            .iter()
            .filter_map(|id| self.sessions.get(id))
            .find(|s| s.name == name)
    }

    pub fn get(&self, id: SessionId) -> Result<&Session, AppError> {
        self.sessions.get(&id).ok_or(AppError::SessionNotFound(id))
    }

    pub fn get_mut(&mut self, id: SessionId) -> Result<&mut Session, AppError> {
        self.sessions
            .get_mut(&id)
            .ok_or(AppError::SessionNotFound(id))
    }

    /// Resolve member IDs to their transmit endpoints, skipping `exclude`
    /// and any ID that is no longer registered
    pub fn outbounds<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a SessionId>,
        exclude: Option<SessionId>,
    ) -> Vec<(SessionId, Outbound)> {
        ids.into_iter()
            .filter(|id| Some(**id) != exclude)
            .filter_map(|id| self.sessions.get(id).map(|s| (*id, s.outbound.clone())))
            .collect()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
