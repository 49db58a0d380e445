//! Collaborator ports.
//!
//! The core never talks to the messaging backend, the media store or the filesystem
//! layout directly; adapters implement these traits.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{
    domain::{ChatKind, Peer, RawMessage, ShortId},
    forward::bundle::NamedBlob,
    Result,
};

/// Read access to the backing message store.
#[async_trait]
pub trait BackingQuery: Send + Sync {
    /// Look a long id up within every conversation of one kind.
    async fn query(&self, scope: ChatKind, long_id: &str) -> Result<Vec<RawMessage>>;

    /// Fetch the full record of a message whose peer is already known.
    async fn fetch(&self, peer: &Peer, long_id: &str) -> Result<Vec<RawMessage>>;
}

/// Uploads packaged forward bundles and returns an opaque resource reference id.
#[async_trait]
pub trait UploadGateway: Send + Sync {
    async fn upload_bundle(&self, peer: &Peer, blobs: &[NamedBlob]) -> Result<String>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaKind {
    /// `busi_type` 1 marks an animated sticker.
    Image { busi_type: u32 },
    Video { cover: PathBuf },
    File,
}

#[derive(Clone, Debug)]
pub struct MediaUpload {
    pub kind: MediaKind,
    pub path: PathBuf,
    pub file_name: String,
    pub peer: Peer,
}

/// Thumbnail metadata reported alongside an uploaded video.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ThumbDescriptor {
    pub remote_id: String,
    pub checksum: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
}

/// What the media store reports back for one uploaded resource.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediaDescriptor {
    pub remote_id: String,
    /// Hex digest the media store indexes by.
    pub checksum: String,
    /// Secondary hex digest (sha family).
    pub sha: String,
    pub size: u64,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub animated: bool,
    pub duration_secs: u32,
    pub thumb: Option<ThumbDescriptor>,
    /// CRC id some direct-file transfers carry.
    pub file_crc: Option<String>,
    /// A local copy the transport staged for upload; the caller deletes it after sending.
    pub staged_copy: Option<PathBuf>,
}

/// Uploads raw media bytes to the remote store.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    async fn upload(&self, req: MediaUpload) -> Result<MediaDescriptor>;
}

/// A media location as supplied by a protocol client: a local path, `file://`,
/// `http(s)://`, `base64://` or `data:` URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaSource {
    pub uri: String,
    /// Display name hint (file segments carry one).
    pub name: Option<String>,
}

impl MediaSource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Materialized {
    pub path: PathBuf,
    pub file_name: String,
    /// The source already pointed at a local file; it must not be deleted.
    pub was_already_local: bool,
}

/// Turns a [`MediaSource`] into a local file.
#[async_trait]
pub trait MediaAcquire: Send + Sync {
    async fn materialize_local(&self, source: &MediaSource) -> Result<Materialized>;
}

/// Derives a still cover image for a video. The returned file is always new.
#[async_trait]
pub trait CoverExtractor: Send + Sync {
    async fn extract_cover(&self, video: &Path) -> Result<PathBuf>;
}

/// One persisted short/long mapping.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StoredMapping {
    pub short_id: ShortId,
    pub long_id: String,
    pub peer: Peer,
}

/// Durable storage for the short/long id mapping.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn get_short(&self, long_id: &str) -> Result<Option<ShortId>>;
    async fn get_long(&self, short_id: ShortId) -> Result<Option<StoredMapping>>;
    async fn put(&self, mapping: StoredMapping) -> Result<()>;
    /// Highest short id ever handed out, so the counter survives restarts.
    async fn last_short(&self) -> Result<Option<ShortId>>;
}
