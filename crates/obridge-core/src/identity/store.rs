use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;

use crate::{
    domain::{MessageRef, Peer, ShortId},
    errors::Error,
    identity::cache::{CacheEntry, MessageCache},
    ports::{PersistentStore, StoredMapping},
    Result,
};

/// Bidirectional short/long id mapping plus the ephemeral message cache.
///
/// Short ids come from one global counter that resumes from the persisted maximum.
/// Assignment for a given long id is serialized through a per-key lock, so two tasks
/// seeing the same message for the first time still agree on a single handle.
pub struct IdentityStore {
    persistent: Arc<dyn PersistentStore>,
    cache: MessageCache,
    counter: Mutex<Option<i32>>,
    assign_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl IdentityStore {
    pub fn new(persistent: Arc<dyn PersistentStore>, cache_ttl: Duration, cache_capacity: usize) -> Self {
        Self {
            persistent,
            cache: MessageCache::new(cache_ttl, cache_capacity),
            counter: Mutex::new(None),
            assign_locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn assign(&self, long_id: &str, peer: &Peer) -> Result<ShortId> {
        if let Some(existing) = self.persistent.get_short(long_id).await? {
            return Ok(existing);
        }

        let key_lock = self.lock_for(long_id).await;
        let assigned = {
            let _guard = key_lock.lock().await;
            self.assign_locked(long_id, peer).await
        };
        drop(key_lock);
        self.release_lock(long_id).await;
        assigned
    }

    async fn assign_locked(&self, long_id: &str, peer: &Peer) -> Result<ShortId> {
        // Another writer may have won while we waited for the key lock.
        if let Some(existing) = self.persistent.get_short(long_id).await? {
            return Ok(existing);
        }

        // The counter stays locked until the mapping is stored, so a failed write
        // never leaves a handle issued but unsaved.
        let mut counter = self.counter.lock().await;
        let current = match *counter {
            Some(c) => c,
            None => self.persistent.last_short().await?.map_or(0, |s| s.0),
        };
        let next = current
            .checked_add(1)
            .ok_or_else(|| Error::External("short id space exhausted".to_string()))?;
        let short_id = ShortId(next);
        self.persistent
            .put(StoredMapping {
                short_id,
                long_id: long_id.to_string(),
                peer: peer.clone(),
            })
            .await?;
        *counter = Some(next);
        tracing::debug!(%short_id, long_id, "assigned short id");
        Ok(short_id)
    }

    async fn lock_for(&self, long_id: &str) -> Arc<Mutex<()>> {
        let mut map = self.assign_locks.lock().await;
        map.entry(long_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn release_lock(&self, long_id: &str) {
        let mut map = self.assign_locks.lock().await;
        // Only the map itself still holds it: nobody is waiting on this key.
        if map.get(long_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            map.remove(long_id);
        }
    }

    pub async fn lookup_by_short(&self, short_id: ShortId) -> Result<Option<MessageRef>> {
        let Some(m) = self.persistent.get_long(short_id).await? else {
            return Ok(None);
        };
        Ok(Some(MessageRef {
            short_id: Some(m.short_id),
            long_id: m.long_id,
            peer: m.peer,
        }))
    }

    pub async fn lookup_by_long(&self, long_id: &str) -> Result<Option<ShortId>> {
        self.persistent.get_short(long_id).await
    }

    pub fn cache_put(&self, long_id: &str, peer: Peer, raw_content: serde_json::Value) {
        self.cache.put(long_id, peer, raw_content);
    }

    pub fn cache_get(&self, long_id: &str) -> Option<CacheEntry> {
        self.cache.get(long_id)
    }

    pub fn purge_expired(&self) -> usize {
        self.cache.purge_expired()
    }
}
