//! Room and room registry
//!
//! A room is a named member set. Each room guards its own member set, so
//! fan-out in one room never waits on membership changes in another.
//! Rooms are never removed, even when empty.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::SessionId;

/// Named broadcast group
#[derive(Debug)]
pub struct Room {
    /// Room name (registry key)
    pub name: String,
    members: Mutex<BTreeSet<SessionId>>,
}

impl Room {
    /// Create an empty room
    pub fn new(name: String) -> Self {
        Self {
            name,
            members: Mutex::new(BTreeSet::new()),
        }
    }

    /// Add a member; returns false if already present
    ///
    /// Only the membership index calls this, so both sides of the relation
    /// change under the membership lock.
    pub(crate) fn insert(&self, id: SessionId) -> bool {
        self.members.lock().insert(id)
    }

    /// Remove a member; returns false if absent
    pub(crate) fn remove(&self, id: SessionId) -> bool {
        self.members.lock().remove(&id)
    }

    /// Copy of the current member set
    ///
    /// The lock is released before this returns.
    pub fn snapshot(&self) -> Vec<SessionId> {
        self.members.lock().iter().copied().collect()
    }

    /// Check if a session is in this room
    pub fn contains(&self, id: SessionId) -> bool {
        self.members.lock().contains(&id)
    }

    /// Get the number of members in the room
    pub fn member_count(&self) -> usize {
        self.members.lock().len()
    }
}

/// Room name → Room
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: BTreeMap<String, Arc<Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the room with this name, creating it if needed
    ///
    /// Callers hold the registry lock, so concurrent creators of the same
    /// name all get the same `Arc<Room>`.
    pub fn get_or_create(&mut self, name: &str) -> Arc<Room> {
        Arc::clone(
            self.rooms
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Room::new(name.to_string()))),
        )
    }

    /// Lookup without creation
    pub fn find(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.get(name).cloned()
    }

    /// All rooms in name order
    pub fn all(&self) -> Vec<Arc<Room>> {
        self.rooms.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_membership() {
        let room = Room::new("music".to_string());
        let a = SessionId::next();
        let b = SessionId::next();

        assert!(room.insert(a));
        assert!(!room.insert(a));
        assert!(room.insert(b));
        assert_eq!(room.member_count(), 2);
        assert!(room.contains(a));

        assert!(room.remove(a));
        assert!(!room.remove(a));
        assert_eq!(room.snapshot(), vec![b]);
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut registry = RoomRegistry::new();
        let first = registry.get_or_create("music");
        let second = registry.get_or_create("music");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_find_does_not_create() {
        let mut registry = RoomRegistry::new();
        assert!(registry.find("jazz").is_none());
        assert!(registry.is_empty());

        registry.get_or_create("jazz");
        assert!(registry.find("jazz").is_some());
    }

    #[test]
    fn test_concurrent_get_or_create_single_room() {
        let registry = Arc::new(Mutex::new(RoomRegistry::new()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.lock().get_or_create("race"))
            })
            .collect();

        let rooms: Vec<Arc<Room>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(rooms.iter().all(|r| Arc::ptr_eq(r, &rooms[0])));
        assert_eq!(registry.lock().len(), 1);
    }

    #[test]
    fn test_empty_rooms_persist() {
        let mut registry = RoomRegistry::new();
        let room = registry.get_or_create("quiet");
        let id = SessionId::next();
        room.insert(id);
        room.remove(id);

        assert_eq!(room.member_count(), 0);
        assert!(registry.find("quiet").is_some());
    }
}
