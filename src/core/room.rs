use log::debug;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::session::Session;

/// Members of one room, keyed by session id
type Members = HashMap<Uuid, Weak<Session>>;

/// Rooms whose ids hash to the same shard
type Shard = HashMap<String, Members>;

/// Concurrent room id -> member sessions map
///
/// Rooms are spread over independently locked shards so that traffic on
/// unrelated rooms does not contend. The registry never keeps a session
/// alive: members are held as `Weak` and the session's own task removes it
/// on teardown.
pub struct RoomRegistry {
    shards: Vec<RwLock<Shard>>,
}

impl RoomRegistry {
    /// Creates a registry with `shards` shards (at least one)
    pub fn new(shards: usize) -> Self {
        let shards = (0..shards.max(1)).map(|_| RwLock::new(HashMap::new())).collect();
        Self { shards }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, rid: &str) -> &RwLock<Shard> {
        let mut hasher = DefaultHasher::new();
        rid.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[index]
    }

    /// Adds the session to the room; adding twice is a no-op
    pub async fn add(&self, rid: &str, session: &Arc<Session>) {
        let mut shard = self.shard(rid).write().await;
        shard
            .entry(rid.to_string())
            .or_default()
            .insert(session.id(), Arc::downgrade(session));
        session.track_room(rid);
        debug!("Session {} joined room {}", session.id(), rid);
    }

    /// Removes the session from the room; removing a non-member is a no-op
    pub async fn remove(&self, rid: &str, session: &Session) {
        let mut shard = self.shard(rid).write().await;
        if let Some(members) = shard.get_mut(rid) {
            if members.remove(&session.id()).is_some() {
                debug!("Session {} left room {}", session.id(), rid);
            }
            if members.is_empty() {
                shard.remove(rid);
            }
        }
        session.untrack_room(rid);
    }

    /// Removes the session from every room it joined
    pub async fn remove_all(&self, session: &Session) {
        for rid in session.rooms() {
            self.remove(&rid, session).await;
        }
    }

    /// Snapshot of the live members of a room
    pub async fn members(&self, rid: &str) -> Vec<Arc<Session>> {
        let shard = self.shard(rid).read().await;
        shard
            .get(rid)
            .map(|members| members.values().filter_map(Weak::upgrade).collect())
            .unwrap_or_default()
    }

    pub async fn contains(&self, rid: &str, session_id: Uuid) -> bool {
        let shard = self.shard(rid).read().await;
        shard
            .get(rid)
            .map(|members| members.contains_key(&session_id))
            .unwrap_or(false)
    }

    pub async fn member_count(&self, rid: &str) -> usize {
        let shard = self.shard(rid).read().await;
        shard.get(rid).map(HashMap::len).unwrap_or(0)
    }

    /// Number of non-empty rooms across all shards
    pub async fn room_count(&self) -> usize {
        let mut count = 0;
        for shard in &self.shards {
            count += shard.read().await.len();
        }
        count
    }

    /// Total (room, session) pairs across all shards
    pub async fn membership_count(&self) -> usize {
        let mut count = 0;
        for shard in &self.shards {
            count += shard.read().await.values().map(HashMap::len).sum::<usize>();
        }
        count
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(crate::constants::ROOM_SHARDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Protocol;
    use crate::core::session::Outbound;
    use crate::protocol::codec_for;
    use std::time::Duration;

    fn session() -> Arc<Session> {
        let (_peer, sink) = tokio::io::duplex(64);
        Session::new(
            codec_for(Protocol::Tcp, 4096),
            Outbound::stream(sink),
            None,
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn test_add_and_remove_are_idempotent() {
        let registry = RoomRegistry::new(4);
        let s = session();

        registry.add("r1", &s).await;
        registry.add("r1", &s).await;
        assert_eq!(registry.member_count("r1").await, 1);
        assert_eq!(s.rooms(), vec!["r1".to_string()]);

        registry.remove("r1", &s).await;
        registry.remove("r1", &s).await;
        registry.remove("never-joined", &s).await;
        assert_eq!(registry.member_count("r1").await, 0);
        assert_eq!(registry.room_count().await, 0);
        assert!(s.rooms().is_empty());
    }

    #[tokio::test]
    async fn test_remove_all_clears_every_room() {
        let registry = RoomRegistry::new(8);
        let s = session();
        let other = session();

        for rid in ["a", "b", "c"] {
            registry.add(rid, &s).await;
        }
        registry.add("a", &other).await;

        registry.remove_all(&s).await;
        for rid in ["a", "b", "c"] {
            assert!(!registry.contains(rid, s.id()).await);
        }
        assert!(registry.contains("a", other.id()).await);
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_dropped_sessions_are_not_returned() {
        let registry = RoomRegistry::new(1);
        let kept = session();
        registry.add("r", &kept).await;
        {
            let gone = session();
            registry.add("r", &gone).await;
        }

        let members = registry.members("r").await;
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id(), kept.id());
    }

    #[test]
    fn test_zero_shards_is_clamped() {
        assert_eq!(RoomRegistry::new(0).shard_count(), 1);
    }
}
