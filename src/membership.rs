//! Membership index
//!
//! Session → joined rooms. Together with each room's member set this forms
//! one relation: `id ∈ room.members ⇔ room.name ∈ rooms_of(id)`.
//! Both sides are changed while the index is borrowed mutably, i.e. under
//! the membership lock, and room member-set locks are only taken inside it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::AppError;
use crate::room::Room;
use crate::types::SessionId;

#[derive(Debug, Default)]
pub struct MembershipIndex {
    joined: HashMap<SessionId, BTreeMap<String, Arc<Room>>>,
}

impl MembershipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a session with no rooms
    pub fn track(&mut self, id: SessionId) {
        self.joined.entry(id).or_default();
    }

    /// Add the session to the room on both sides
    ///
    /// Returns `Ok(false)` if it was already a member. Fails with
    /// `SessionNotFound` once `leave_all` has run for this session, so a
    /// join racing with teardown cannot leave a stale member behind.
    pub fn join(&mut self, id: SessionId, room: &Arc<Room>) -> Result<bool, AppError> {
        let rooms = self
            .joined
            .get_mut(&id)
            .ok_or(AppError::SessionNotFound(id))?;

        if rooms.contains_key(&room.name) {
            return Ok(false);
        }
        rooms.insert(room.name.clone(), Arc::clone(room));
        room.insert(id);
        Ok(true)
    }

    /// Remove the session from the room on both sides; no-op if not a member
    pub fn leave(&mut self, id: SessionId, room: &Room) -> bool {
        let Some(rooms) = self.joined.get_mut(&id) else {
            return false;
        };
        if rooms.remove(&room.name).is_none() {
            return false;
        }
        room.remove(id);
        true
    }

    /// Remove the session from every room and stop tracking it
    ///
    /// Returns the rooms it was in, or `None` if it was not tracked (a
    /// repeated call). Exactly one caller gets `Some` per session.
    pub fn leave_all(&mut self, id: SessionId) -> Option<Vec<Arc<Room>>> {
        let rooms = self.joined.remove(&id)?;
        Some(
            rooms
                .into_values()
                .inspect(|room| {
                    room.remove(id);
                })
                .collect(),
        )
    }

    /// Names of rooms the session has joined, in name order
    pub fn rooms_of(&self, id: SessionId) -> Vec<String> {
        self.joined
            .get(&id)
            .map(|rooms| rooms.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, id: SessionId, room: &str) -> bool {
        self.joined
            .get(&id)
            .is_some_and(|rooms| rooms.contains_key(room))
    }

    /// Check `id ∈ room.members ⇔ room ∈ rooms_of(id)` for every room given
    pub fn is_consistent(&self, rooms: &[Arc<Room>]) -> bool {
        let forward = self
            .joined
            .iter()
            .all(|(id, joined)| joined.values().all(|room| room.contains(*id)));
        let backward = rooms.iter().all(|room| {
            room.snapshot()
                .into_iter()
                .all(|id| self.is_member(id, &room.name))
        });
        forward && backward
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(name: &str) -> Arc<Room> {
        Arc::new(Room::new(name.to_string()))
    }

    #[test]
    fn test_join_updates_both_sides() {
        let mut index = MembershipIndex::new();
        let lobby = room("Lobby");
        let id = SessionId::next();
        index.track(id);

        assert!(index.join(id, &lobby).unwrap());
        assert!(!index.join(id, &lobby).unwrap());

        assert!(lobby.contains(id));
        assert_eq!(lobby.member_count(), 1);
        assert_eq!(index.rooms_of(id), vec!["Lobby".to_string()]);
        assert!(index.is_consistent(&[lobby]));
    }

    #[test]
    fn test_leave_all_on_session_without_rooms() {
        let mut index = MembershipIndex::new();
        let id = SessionId::next();
        index.track(id);

        // Tracked with no rooms still counts as the first teardown
        assert_eq!(index.leave_all(id).map(|rooms| rooms.len()), Some(0));
        assert!(index.leave_all(id).is_none());
    }

    #[test]
    fn test_join_untracked_session() {
        let mut index = MembershipIndex::new();
        let lobby = room("Lobby");
        let id = SessionId::next();

        assert!(matches!(
            index.join(id, &lobby),
            Err(AppError::SessionNotFound(_))
        ));
        assert!(!lobby.contains(id));
    }

    #[test]
    fn test_leave_when_not_member_is_noop() {
        let mut index = MembershipIndex::new();
        let music = room("music");
        let id = SessionId::next();

        assert!(!index.leave(id, &music));

        index.track(id);
        assert!(!index.leave(id, &music));

        index.join(id, &music).unwrap();
        assert!(index.leave(id, &music));
        assert!(!music.contains(id));
        assert!(index.rooms_of(id).is_empty());
    }

    #[test]
    fn test_leave_all_removes_everywhere() {
        let mut index = MembershipIndex::new();
        let lobby = room("Lobby");
        let music = room("music");
        let id = SessionId::next();
        let other = SessionId::next();
        index.track(id);
        index.track(other);
        index.join(id, &lobby).unwrap();
        index.join(id, &music).unwrap();
        index.join(other, &lobby).unwrap();

        let left = index.leave_all(id).unwrap();
        assert_eq!(left.len(), 2);
        assert!(!lobby.contains(id));
        assert!(!music.contains(id));
        assert!(lobby.contains(other));
        assert!(index.rooms_of(id).is_empty());

        // Repeated teardown is a no-op, and a late join is refused
        assert!(index.leave_all(id).is_none());
        assert!(index.join(id, &music).is_err());
        assert!(index.is_consistent(&[lobby, music]));
    }
}
