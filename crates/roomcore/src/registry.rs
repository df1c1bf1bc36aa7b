//! Process-wide room registry.
//!
//! One mutex over the id map; each room serializes its own state behind its
//! own lock. No path holds the registry lock while acquiring a room lock
//! that another task could hold while re-entering the registry, so the two
//! levels cannot deadlock.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::room::Room;

pub struct Registry {
    rooms: Mutex<HashMap<String, Arc<Room>>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            rooms: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Room>> {
        let id = id.to_ascii_lowercase();
        self.rooms.lock().await.get(&id).cloned()
    }

    /// Fetch a room, creating it on first reference. The second return is
    /// true when this call created the room (the caller schedules the build).
    pub async fn get_or_create(&self, id: &str) -> (Arc<Room>, bool) {
        let id = id.to_ascii_lowercase();
        let mut m = self.rooms.lock().await;
        if let Some(room) = m.get(&id) {
            return (room.clone(), false);
        }
        let room = Room::new(id.clone());
        m.insert(id.clone(), room.clone());
        info!(room = %id, "room created");
        (room, true)
    }

    /// True when `room` is still the registered occupant of `id`. Build
    /// tasks check this before applying their result.
    pub async fn same_room(&self, id: &str, room: &Arc<Room>) -> bool {
        match self.get(id).await {
            Some(cur) => Arc::ptr_eq(&cur, room),
            None => false,
        }
    }

    /// Destroy the room if (still) empty, cancelling any in-flight build.
    /// Emptiness is re-checked under the registry lock so a concurrent join
    /// cannot lose its room.
    pub async fn drop_if_empty(&self, id: &str) -> bool {
        let id = id.to_ascii_lowercase();
        let mut m = self.rooms.lock().await;
        let Some(room) = m.get(&id) else { return false };
        let mut st = room.lock().await;
        if !st.is_empty() {
            return false;
        }
        if let Some(h) = st.take_init_handle() {
            h.abort();
        }
        drop(st);
        m.remove(&id);
        info!(room = %id, "room destroyed");
        true
    }

    /// Unconditional destroy, for failed builds.
    pub async fn remove(&self, id: &str) -> Option<Arc<Room>> {
        let id = id.to_ascii_lowercase();
        let removed = self.rooms.lock().await.remove(&id);
        if removed.is_some() {
            info!(room = %id, "room destroyed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.rooms.lock().await.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guessproto::SessionId;

    #[tokio::test]
    async fn creates_once_per_id() {
        let reg = Registry::new();
        let (a, created_a) = reg.get_or_create("bacu42").await;
        let (b, created_b) = reg.get_or_create("bacu42").await;
        assert!(created_a);
        assert!(!created_b);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reg.len().await, 1);
    }

    #[tokio::test]
    async fn ids_are_case_insensitive() {
        let reg = Registry::new();
        let (a, _) = reg.get_or_create("BACU42").await;
        let b = reg.get("bacu42").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.id, "bacu42");
    }

    #[tokio::test]
    async fn drop_if_empty_spares_occupied_rooms() {
        let reg = Registry::new();
        let (room, _) = reg.get_or_create("bacu42").await;
        room.lock().await.join(SessionId(1), "alice".to_string());
        assert!(!reg.drop_if_empty("bacu42").await);
        assert!(reg.get("bacu42").await.is_some());

        room.lock().await.leave(SessionId(1));
        assert!(reg.drop_if_empty("bacu42").await);
        assert!(reg.get("bacu42").await.is_none());
    }

    #[tokio::test]
    async fn recreated_rooms_are_fresh() {
        let reg = Registry::new();
        let (a, _) = reg.get_or_create("bacu42").await;
        reg.remove("bacu42").await;
        let (b, created) = reg.get_or_create("bacu42").await;
        assert!(created);
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!reg.same_room("bacu42", &a).await);
        assert!(reg.same_room("bacu42", &b).await);
    }
}
