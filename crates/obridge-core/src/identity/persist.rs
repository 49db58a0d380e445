use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    domain::ShortId,
    ports::{PersistentStore, StoredMapping},
    Result,
};

#[derive(Debug, Default)]
struct MappingTable {
    by_short: HashMap<ShortId, StoredMapping>,
    by_long: HashMap<String, ShortId>,
    last_short: Option<ShortId>,
}

impl MappingTable {
    fn accepts(&self, mapping: &StoredMapping) -> bool {
        !self.by_long.contains_key(&mapping.long_id)
            && !self.by_short.contains_key(&mapping.short_id)
    }

    fn insert(&mut self, mapping: StoredMapping) -> bool {
        if !self.accepts(&mapping) {
            return false;
        }
        if self.last_short.map_or(true, |s| mapping.short_id > s) {
            self.last_short = Some(mapping.short_id);
        }
        self.by_long
            .insert(mapping.long_id.clone(), mapping.short_id);
        self.by_short.insert(mapping.short_id, mapping);
        true
    }
}

/// In-process mapping store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: Mutex<MappingTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn get_short(&self, long_id: &str) -> Result<Option<ShortId>> {
        Ok(self.table.lock().await.by_long.get(long_id).copied())
    }

    async fn get_long(&self, short_id: ShortId) -> Result<Option<StoredMapping>> {
        Ok(self.table.lock().await.by_short.get(&short_id).cloned())
    }

    async fn put(&self, mapping: StoredMapping) -> Result<()> {
        // Existing assignments are never overwritten.
        self.table.lock().await.insert(mapping);
        Ok(())
    }

    async fn last_short(&self) -> Result<Option<ShortId>> {
        Ok(self.table.lock().await.last_short)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFileData {
    mappings: Vec<StoredMapping>,
}

/// Mapping store persisted as a single JSON document.
///
/// The whole file is rewritten on every new assignment (write to a sibling temp file,
/// then rename), which keeps it readable after a crash mid-write.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    table: Mutex<MappingTable>,
}

impl JsonFileStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut table = MappingTable::default();
        if let Some(data) = load_store_file(&path).await? {
            for m in data.mappings {
                if !table.insert(m.clone()) {
                    tracing::warn!(long_id = %m.long_id, short_id = %m.short_id, "duplicate mapping in store file ignored");
                }
            }
        }
        tracing::debug!(path = %path.display(), entries = table.by_short.len(), "opened id store");
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }
}

#[async_trait]
impl PersistentStore for JsonFileStore {
    async fn get_short(&self, long_id: &str) -> Result<Option<ShortId>> {
        Ok(self.table.lock().await.by_long.get(long_id).copied())
    }

    async fn get_long(&self, short_id: ShortId) -> Result<Option<StoredMapping>> {
        Ok(self.table.lock().await.by_short.get(&short_id).cloned())
    }

    async fn put(&self, mapping: StoredMapping) -> Result<()> {
        let mut table = self.table.lock().await;
        if !table.accepts(&mapping) {
            return Ok(());
        }

        // Memory only changes once the file holds the new mapping.
        let mut mappings = table.by_short.values().cloned().collect::<Vec<_>>();
        mappings.push(mapping.clone());
        mappings.sort_by_key(|m| m.short_id);
        save_store_file(&self.path, &StoreFileData { mappings }).await?;
        table.insert(mapping);
        Ok(())
    }

    async fn last_short(&self) -> Result<Option<ShortId>> {
        Ok(self.table.lock().await.last_short)
    }
}

async fn load_store_file(path: &Path) -> Result<Option<StoreFileData>> {
    if !tokio::fs::try_exists(path).await? {
        return Ok(None);
    }
    let txt = tokio::fs::read_to_string(path).await?;
    if txt.trim().is_empty() {
        return Ok(None);
    }
    let data: StoreFileData = serde_json::from_str(&txt)?;
    Ok(Some(data))
}

async fn save_store_file(path: &Path, data: &StoreFileData) -> Result<()> {
    let txt = serde_json::to_string(data)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, txt).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Peer;

    fn tmp_file(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        std::env::temp_dir().join(format!("{prefix}-{pid}-{ts}.json"))
    }

    fn mapping(short: i32, long: &str) -> StoredMapping {
        StoredMapping {
            short_id: ShortId(short),
            long_id: long.to_string(),
            peer: Peer::group("g1"),
        }
    }

    #[tokio::test]
    async fn memory_store_never_overwrites() {
        let store = MemoryStore::new();
        store.put(mapping(1, "a")).await.unwrap();
        store.put(mapping(2, "a")).await.unwrap();
        store.put(mapping(1, "b")).await.unwrap();

        assert_eq!(store.get_short("a").await.unwrap(), Some(ShortId(1)));
        assert_eq!(store.get_short("b").await.unwrap(), None);
        assert_eq!(store.last_short().await.unwrap(), Some(ShortId(1)));
    }

    #[tokio::test]
    async fn json_store_survives_reopen() {
        let path = tmp_file("obridge-store-test");
        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store.put(mapping(1, "long-a")).await.unwrap();
            store.put(mapping(7, "long-b")).await.unwrap();
        }

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(reopened.get_short("long-b").await.unwrap(), Some(ShortId(7)));
        let m = reopened.get_long(ShortId(1)).await.unwrap().unwrap();
        assert_eq!(m.long_id, "long-a");
        assert_eq!(reopened.last_short().await.unwrap(), Some(ShortId(7)));

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn json_store_keeps_memory_unchanged_when_write_fails() {
        let dir = tmp_file("obridge-store-nodir");
        let store = JsonFileStore::open(dir.join("ids.json")).await.unwrap();

        assert!(store.put(mapping(1, "long-a")).await.is_err());
        assert_eq!(store.get_short("long-a").await.unwrap(), None);
        assert!(store.get_long(ShortId(1)).await.unwrap().is_none());
        assert_eq!(store.last_short().await.unwrap(), None);
    }

    #[tokio::test]
    async fn json_store_treats_missing_file_as_empty() {
        let path = tmp_file("obridge-store-missing");
        let store = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(store.last_short().await.unwrap(), None);
        assert!(!path.exists());
    }
}
