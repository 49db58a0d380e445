use std::{collections::HashMap, sync::Mutex, time::Duration};

use tokio::time::Instant;

use crate::domain::{Peer, RawMessage};

/// Ephemeral record of a recently observed message.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub peer: Peer,
    pub long_id: String,
    pub raw_content: serde_json::Value,
    pub inserted_at: Instant,
}

impl CacheEntry {
    pub fn to_raw_message(&self) -> RawMessage {
        RawMessage {
            long_id: self.long_id.clone(),
            chat_kind: self.peer.chat_kind,
            peer_id: self.peer.peer_id.clone(),
            content: self.raw_content.clone(),
        }
    }
}

/// TTL-bounded message cache.
///
/// Expiry is measured from insertion; re-putting a key restarts its clock. Expired
/// entries are dropped on read and never handed out again.
#[derive(Debug)]
pub struct MessageCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MessageCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn put(&self, long_id: &str, peer: Peer, raw_content: serde_json::Value) {
        let now = Instant::now();
        let mut map = lock(&self.entries);

        if !map.contains_key(long_id) && map.len() >= self.capacity {
            map.retain(|_, e| now.duration_since(e.inserted_at) < self.ttl);
            if map.len() >= self.capacity {
                let oldest = map
                    .iter()
                    .min_by_key(|(_, e)| e.inserted_at)
                    .map(|(k, _)| k.clone());
                if let Some(k) = oldest {
                    map.remove(&k);
                }
            }
        }

        map.insert(
            long_id.to_string(),
            CacheEntry {
                peer,
                long_id: long_id.to_string(),
                raw_content,
                inserted_at: now,
            },
        );
    }

    pub fn get(&self, long_id: &str) -> Option<CacheEntry> {
        let mut map = lock(&self.entries);
        let expired = match map.get(long_id) {
            None => return None,
            Some(e) => Instant::now().duration_since(e.inserted_at) >= self.ttl,
        };
        if expired {
            map.remove(long_id);
            return None;
        }
        map.get(long_id).cloned()
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut map = lock(&self.entries);
        let before = map.len();
        map.retain(|_, e| now.duration_since(e.inserted_at) < self.ttl);
        before - map.len()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// A panic while holding the map leaves plain data behind; keep serving it.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_and_do_not_resurrect() {
        let cache = MessageCache::new(Duration::from_secs(10), 16);
        cache.put("m1", Peer::group("g1"), json!({"text": "hi"}));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(cache.get("m1").is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("m1").is_none());
        assert!(cache.get("m1").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_evicts_oldest_first() {
        let cache = MessageCache::new(Duration::from_secs(60), 2);
        cache.put("a", Peer::direct("u1"), json!(null));
        tokio::time::advance(Duration::from_millis(5)).await;
        cache.put("b", Peer::direct("u1"), json!(null));
        tokio::time::advance(Duration::from_millis(5)).await;
        cache.put("c", Peer::direct("u1"), json!(null));

        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired() {
        let cache = MessageCache::new(Duration::from_secs(5), 16);
        cache.put("old", Peer::direct("u1"), json!(null));
        tokio::time::advance(Duration::from_secs(4)).await;
        cache.put("new", Peer::direct("u1"), json!(null));
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        let entry = cache.get("new").unwrap();
        assert_eq!(entry.to_raw_message().peer_id, "u1");
    }
}
