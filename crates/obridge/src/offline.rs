//! Collaborators for running the bridge without a messaging backend.
//!
//! Media and bundles are "uploaded" by content digest, so the CLI can compose and
//! inspect bundles locally.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use obridge_core::{
    domain::{ChatKind, Peer, RawMessage},
    errors::Error,
    forward::{encode_blobs, NamedBlob},
    ports::{
        BackingQuery, CoverExtractor, MediaDescriptor, MediaKind, MediaTransport, MediaUpload,
        ThumbDescriptor, UploadGateway,
    },
    Result,
};
use sha2::{Digest, Sha256};

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

async fn digest_file(path: &Path) -> Result<(String, u64)> {
    let bytes = tokio::fs::read(path).await?;
    Ok((sha256_hex(&bytes), bytes.len() as u64))
}

/// Describes media by the sha256 of its bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct DigestMediaTransport;

#[async_trait]
impl MediaTransport for DigestMediaTransport {
    async fn upload(&self, req: MediaUpload) -> Result<MediaDescriptor> {
        let (sha, size) = digest_file(&req.path)
            .await
            .map_err(|e| Error::MediaTransport(format!("{}: {e}", req.path.display())))?;

        let mut desc = MediaDescriptor {
            remote_id: format!("local-{}", &sha[..16]),
            checksum: sha[..32].to_string(),
            sha: sha.clone(),
            size,
            file_name: req.file_name.clone(),
            ..Default::default()
        };
        match req.kind {
            MediaKind::Image { busi_type } => desc.animated = busi_type == 1,
            MediaKind::Video { cover } => {
                let (thumb_sha, thumb_size) = digest_file(&cover).await.map_err(|e| {
                    Error::MediaTransport(format!("cover {}: {e}", cover.display()))
                })?;
                desc.thumb = Some(ThumbDescriptor {
                    remote_id: format!("local-{}", &thumb_sha[..16]),
                    checksum: thumb_sha[..32].to_string(),
                    size: thumb_size,
                    width: 0,
                    height: 0,
                });
            }
            MediaKind::File => {}
        }
        tracing::debug!(peer = %req.peer.peer_id, remote_id = %desc.remote_id, "described media");
        Ok(desc)
    }
}

/// Names a bundle by the digest of its encoded payload.
#[derive(Clone, Copy, Debug, Default)]
pub struct DigestUploadGateway;

#[async_trait]
impl UploadGateway for DigestUploadGateway {
    async fn upload_bundle(&self, _peer: &Peer, blobs: &[NamedBlob]) -> Result<String> {
        let payload = encode_blobs(blobs).map_err(|e| Error::Upload(e.to_string()))?;
        Ok(format!("resid-{}", &sha256_hex(&payload)[..24]))
    }
}

/// A backing store that knows no messages.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyBacking;

#[async_trait]
impl BackingQuery for EmptyBacking {
    async fn query(&self, _scope: ChatKind, _long_id: &str) -> Result<Vec<RawMessage>> {
        Ok(Vec::new())
    }

    async fn fetch(&self, _peer: &Peer, _long_id: &str) -> Result<Vec<RawMessage>> {
        Ok(Vec::new())
    }
}

/// Stand-in when no ffmpeg binary is available.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCoverExtractor;

#[async_trait]
impl CoverExtractor for NoCoverExtractor {
    async fn extract_cover(&self, video: &Path) -> Result<PathBuf> {
        Err(Error::Config(format!(
            "video {} has no cover and ffmpeg is unavailable (set FFMPEG_PATH)",
            video.display()
        )))
    }
}
