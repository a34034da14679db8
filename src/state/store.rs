use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use time::OffsetDateTime;
use uuid::Uuid;

use super::room::Room;

/// Concurrent registry of every room held by this instance.
///
/// The map only ever hands out `Arc<Room>` clones, so no shard lock outlives a lookup and
/// callers are free to await a room lock afterwards.
#[derive(Default)]
pub struct RoomStore {
    rooms: DashMap<Uuid, Arc<Room>>,
    revision: AtomicU64,
}

impl RoomStore {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create, register and return an empty room owned by `instance`.
    pub fn create(&self, instance: &str, now: OffsetDateTime) -> Arc<Room> {
        let room = Arc::new(Room::create(instance, now));
        self.insert(room.clone());
        room
    }

    /// Register an existing room, replacing any previous entry with the same identifier.
    pub fn insert(&self, room: Arc<Room>) {
        self.rooms.insert(room.id(), room);
        self.mark_changed();
    }

    /// Look a room up. A miss is a normal outcome.
    pub fn get(&self, id: &Uuid) -> Option<Arc<Room>> {
        self.rooms.get(id).map(|entry| entry.value().clone())
    }

    /// Remove a room, returning it when it was present.
    pub fn delete(&self, id: &Uuid) -> Option<Arc<Room>> {
        let removed = self.rooms.remove(id).map(|(_, room)| room);
        if removed.is_some() {
            self.mark_changed();
        }
        removed
    }

    /// Handles on every registered room, detached from the map.
    pub fn rooms(&self) -> Vec<Arc<Room>> {
        self.rooms.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Number of rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether no room is registered.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Counter bumped on every structural change and room mutation.
    ///
    /// The snapshot writer compares it between ticks to skip idle rewrites.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Record that some room content changed.
    pub fn mark_changed(&self) {
        self.revision.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_get_delete() {
        let store = RoomStore::new();
        let room = store.create("machine-a", OffsetDateTime::now_utc());

        let found = store.get(&room.id()).expect("room registered");
        assert!(Arc::ptr_eq(&room, &found));
        assert_eq!(found.instance(), "machine-a");
        assert_eq!(store.len(), 1);

        assert!(store.delete(&room.id()).is_some());
        assert!(store.get(&room.id()).is_none());
        assert!(store.delete(&room.id()).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn identifiers_are_unique_and_time_ordered() {
        let store = RoomStore::new();
        let now = OffsetDateTime::now_utc();
        let first = store.create("m", now).id();
        let second = store.create("m", now).id();

        assert_ne!(first, second);
        assert!(first < second);
    }

    #[test]
    fn revision_tracks_structural_changes() {
        let store = RoomStore::new();
        let start = store.revision();

        let room = store.create("m", OffsetDateTime::now_utc());
        let after_create = store.revision();
        assert!(after_create > start);

        store.delete(&Uuid::now_v7());
        assert_eq!(store.revision(), after_create);

        store.delete(&room.id());
        assert!(store.revision() > after_create);
    }

    #[tokio::test]
    async fn concurrent_creations_all_land() {
        let store = Arc::new(RoomStore::new());
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..32 {
            let store = store.clone();
            tasks.spawn(async move { store.create("m", OffsetDateTime::now_utc()).id() });
        }

        let mut ids = Vec::new();
        while let Some(id) = tasks.join_next().await {
            ids.push(id.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 32);
        assert_eq!(store.len(), 32);
    }
}
