use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    domain::{ChatKind, MessageRef, RawMessage, ShortId},
    errors::Error,
    identity::store::IdentityStore,
    ports::BackingQuery,
    Result,
};

/// What a protocol client handed us as a message reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolveKey {
    raw: String,
}

impl ResolveKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// The key read as a short handle, if it is a plain integer in range.
    pub fn as_short(&self) -> Option<ShortId> {
        self.raw.trim().parse::<i32>().ok().map(ShortId)
    }

    /// The key read as a long identifier.
    pub fn as_long(&self) -> &str {
        self.raw.trim()
    }
}

impl From<ShortId> for ResolveKey {
    fn from(s: ShortId) -> Self {
        Self::new(s.0.to_string())
    }
}

impl From<&str> for ResolveKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One tier of the resolution cascade.
#[async_trait]
pub trait ResolveStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means "not here, try the next tier".
    async fn try_resolve(&self, key: &ResolveKey) -> Result<Option<MessageRef>>;
}

/// Run strategies in order and return the first match.
///
/// A failing tier does not stop the cascade. If nothing matches, the first tier error
/// is returned in place of `NotFound` so a broken backend is not reported as a missing
/// message.
pub async fn first_match(
    strategies: &[Box<dyn ResolveStrategy>],
    key: &ResolveKey,
) -> Result<MessageRef> {
    let mut first_error: Option<Error> = None;
    for strategy in strategies {
        match strategy.try_resolve(key).await {
            Ok(Some(found)) => {
                tracing::debug!(tier = strategy.name(), key = key.as_long(), "resolved message");
                return Ok(found);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(tier = strategy.name(), key = key.as_long(), error = %e, "resolve tier failed");
                first_error.get_or_insert(e);
            }
        }
    }
    Err(first_error.unwrap_or_else(|| Error::NotFound(key.as_long().to_string())))
}

struct ShortHandleTier {
    store: Arc<IdentityStore>,
}

#[async_trait]
impl ResolveStrategy for ShortHandleTier {
    fn name(&self) -> &'static str {
        "short_handle"
    }

    async fn try_resolve(&self, key: &ResolveKey) -> Result<Option<MessageRef>> {
        let Some(short) = key.as_short() else {
            return Ok(None);
        };
        self.store.lookup_by_short(short).await
    }
}

struct KnownLongIdTier {
    store: Arc<IdentityStore>,
}

#[async_trait]
impl ResolveStrategy for KnownLongIdTier {
    fn name(&self) -> &'static str {
        "known_long_id"
    }

    async fn try_resolve(&self, key: &ResolveKey) -> Result<Option<MessageRef>> {
        let Some(short) = self.store.lookup_by_long(key.as_long()).await? else {
            return Ok(None);
        };
        self.store.lookup_by_short(short).await
    }
}

struct CacheTier {
    store: Arc<IdentityStore>,
}

#[async_trait]
impl ResolveStrategy for CacheTier {
    fn name(&self) -> &'static str {
        "message_cache"
    }

    async fn try_resolve(&self, key: &ResolveKey) -> Result<Option<MessageRef>> {
        Ok(self.store.cache_get(key.as_long()).map(|e| MessageRef {
            short_id: None,
            long_id: e.long_id,
            peer: e.peer,
        }))
    }
}

struct BackingTier {
    scope: ChatKind,
    backing: Arc<dyn BackingQuery>,
}

#[async_trait]
impl ResolveStrategy for BackingTier {
    fn name(&self) -> &'static str {
        match self.scope {
            ChatKind::Direct => "backing_direct",
            ChatKind::Group => "backing_group",
        }
    }

    async fn try_resolve(&self, key: &ResolveKey) -> Result<Option<MessageRef>> {
        let long_id = key.as_long();
        let found = self
            .backing
            .query(self.scope, long_id)
            .await
            .map_err(into_backing_error)?;
        Ok(found.into_iter().next().map(|m| MessageRef {
            short_id: None,
            long_id: long_id.to_string(),
            peer: m.peer(),
        }))
    }
}

fn into_backing_error(e: Error) -> Error {
    match e {
        Error::BackingQuery(_) => e,
        other => Error::BackingQuery(other.to_string()),
    }
}

/// Turns opaque message references into concrete `(peer, long id)` pairs.
///
/// Tiers, first match wins: persisted short handle, persisted long id, message cache,
/// direct-scoped backing query, group-scoped backing query. The cascade never writes.
pub struct IdentityResolver {
    store: Arc<IdentityStore>,
    backing: Arc<dyn BackingQuery>,
    tiers: Vec<Box<dyn ResolveStrategy>>,
}

impl IdentityResolver {
    pub fn new(store: Arc<IdentityStore>, backing: Arc<dyn BackingQuery>) -> Self {
        let tiers: Vec<Box<dyn ResolveStrategy>> = vec![
            Box::new(ShortHandleTier {
                store: Arc::clone(&store),
            }),
            Box::new(KnownLongIdTier {
                store: Arc::clone(&store),
            }),
            Box::new(CacheTier {
                store: Arc::clone(&store),
            }),
            Box::new(BackingTier {
                scope: ChatKind::Direct,
                backing: Arc::clone(&backing),
            }),
            Box::new(BackingTier {
                scope: ChatKind::Group,
                backing: Arc::clone(&backing),
            }),
        ];
        Self {
            store,
            backing,
            tiers,
        }
    }

    pub async fn resolve(&self, key: impl Into<ResolveKey>) -> Result<MessageRef> {
        let key = key.into();
        first_match(&self.tiers, &key).await
    }

    /// Load the full message behind a resolved reference: cache first, then the backend.
    pub async fn fetch(&self, msg: &MessageRef) -> Result<RawMessage> {
        if let Some(entry) = self.store.cache_get(&msg.long_id) {
            return Ok(entry.to_raw_message());
        }
        let found = self
            .backing
            .fetch(&msg.peer, &msg.long_id)
            .await
            .map_err(into_backing_error)?;
        found
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(msg.long_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::Peer,
        identity::persist::MemoryStore,
        ports::BackingQuery,
    };
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeBacking {
        direct: Vec<RawMessage>,
        group: Vec<RawMessage>,
        fail_direct: bool,
        queries: Mutex<Vec<(ChatKind, String)>>,
        fetches: Mutex<Vec<String>>,
    }

    impl FakeBacking {
        fn query_log(&self) -> Vec<(ChatKind, String)> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BackingQuery for FakeBacking {
        async fn query(&self, scope: ChatKind, long_id: &str) -> Result<Vec<RawMessage>> {
            self.queries
                .lock()
                .unwrap()
                .push((scope, long_id.to_string()));
            match scope {
                ChatKind::Direct if self.fail_direct => {
                    Err(Error::External("backend offline".to_string()))
                }
                ChatKind::Direct => Ok(self.direct.clone()),
                ChatKind::Group => Ok(self.group.clone()),
            }
        }

        async fn fetch(&self, _peer: &Peer, long_id: &str) -> Result<Vec<RawMessage>> {
            self.fetches.lock().unwrap().push(long_id.to_string());
            Ok(self
                .direct
                .iter()
                .chain(self.group.iter())
                .filter(|m| m.long_id == long_id)
                .cloned()
                .collect())
        }
    }

    fn raw(long_id: &str, kind: ChatKind, peer_id: &str) -> RawMessage {
        RawMessage {
            long_id: long_id.to_string(),
            chat_kind: kind,
            peer_id: peer_id.to_string(),
            content: json!({"text": "hello"}),
        }
    }

    fn store() -> Arc<IdentityStore> {
        Arc::new(IdentityStore::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(120),
            64,
        ))
    }

    #[tokio::test]
    async fn short_handle_tier_wins_without_backing_calls() {
        let store = store();
        let backing = Arc::new(FakeBacking::default());
        let s = store.assign("long-1", &Peer::group("g1")).await.unwrap();

        let resolver = IdentityResolver::new(store, backing.clone());
        let r = resolver.resolve(s).await.unwrap();
        assert_eq!(r.long_id, "long-1");
        assert_eq!(r.short_id, Some(s));
        assert!(backing.query_log().is_empty());
    }

    #[tokio::test]
    async fn known_long_id_resolves_to_full_ref() {
        let store = store();
        let backing = Arc::new(FakeBacking::default());
        let s = store.assign("7400000000000000123", &Peer::direct("u9")).await.unwrap();

        let resolver = IdentityResolver::new(store, backing.clone());
        let r = resolver.resolve("7400000000000000123").await.unwrap();
        assert_eq!(r.short_id, Some(s));
        assert_eq!(r.peer, Peer::direct("u9"));
        assert!(backing.query_log().is_empty());
    }

    #[tokio::test]
    async fn cache_tier_answers_before_backing() {
        let store = store();
        store.cache_put("long-c", Peer::group("g2"), json!({"text": "cached"}));
        let backing = Arc::new(FakeBacking::default());

        let resolver = IdentityResolver::new(store, backing.clone());
        let r = resolver.resolve("long-c").await.unwrap();
        assert_eq!(r.peer, Peer::group("g2"));
        assert_eq!(r.short_id, None);
        assert!(backing.query_log().is_empty());

        let full = resolver.fetch(&r).await.unwrap();
        assert_eq!(full.content, json!({"text": "cached"}));
        assert!(backing.fetches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn falls_through_direct_then_group() {
        let backing = Arc::new(FakeBacking {
            group: vec![raw("long-g", ChatKind::Group, "g7")],
            ..Default::default()
        });
        let resolver = IdentityResolver::new(store(), backing.clone());

        let r = resolver.resolve("long-g").await.unwrap();
        assert_eq!(r.peer, Peer::group("g7"));
        assert_eq!(
            backing.query_log(),
            vec![
                (ChatKind::Direct, "long-g".to_string()),
                (ChatKind::Group, "long-g".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn direct_hit_skips_group_query() {
        let backing = Arc::new(FakeBacking {
            direct: vec![raw("long-d", ChatKind::Direct, "u3")],
            group: vec![raw("long-d", ChatKind::Group, "g3")],
            ..Default::default()
        });
        let resolver = IdentityResolver::new(store(), backing.clone());

        let r = resolver.resolve("long-d").await.unwrap();
        assert_eq!(r.peer, Peer::direct("u3"));
        assert_eq!(backing.query_log().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_cascade_is_not_found_with_one_query_per_scope() {
        let backing = Arc::new(FakeBacking::default());
        let resolver = IdentityResolver::new(store(), backing.clone());

        let err = resolver.resolve("12345").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(ref k) if k == "12345"));
        assert_eq!(backing.query_log().len(), 2);
    }

    #[tokio::test]
    async fn failing_tier_does_not_hide_later_match() {
        let backing = Arc::new(FakeBacking {
            group: vec![raw("long-x", ChatKind::Group, "g1")],
            fail_direct: true,
            ..Default::default()
        });
        let resolver = IdentityResolver::new(store(), backing);
        let r = resolver.resolve("long-x").await.unwrap();
        assert_eq!(r.peer, Peer::group("g1"));
    }

    #[tokio::test]
    async fn backing_error_surfaces_when_nothing_matches() {
        let backing = Arc::new(FakeBacking {
            fail_direct: true,
            ..Default::default()
        });
        let resolver = IdentityResolver::new(store(), backing);
        let err = resolver.resolve("long-y").await.unwrap_err();
        assert!(matches!(err, Error::BackingQuery(_)));
    }

    #[tokio::test]
    async fn resolve_is_idempotent() {
        let backing = Arc::new(FakeBacking {
            direct: vec![raw("long-i", ChatKind::Direct, "u1")],
            ..Default::default()
        });
        let resolver = IdentityResolver::new(store(), backing);
        let a = resolver.resolve("long-i").await.unwrap();
        let b = resolver.resolve("long-i").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn fetch_falls_back_to_backend_and_reports_missing() {
        let backing = Arc::new(FakeBacking {
            direct: vec![raw("long-f", ChatKind::Direct, "u1")],
            ..Default::default()
        });
        let resolver = IdentityResolver::new(store(), backing);

        let r = resolver.resolve("long-f").await.unwrap();
        let full = resolver.fetch(&r).await.unwrap();
        assert_eq!(full.long_id, "long-f");

        let missing = MessageRef {
            short_id: None,
            long_id: "gone".to_string(),
            peer: Peer::direct("u1"),
        };
        assert!(matches!(
            resolver.fetch(&missing).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }
}
