//! Media acquisition adapter.
//!
//! Turns the media locations protocol clients send (`http(s)://`, `file://`,
//! `base64://`, `data:` URIs and plain paths) into local files under a temp dir.

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use base64::Engine;
use obridge_core::{
    errors::Error,
    ports::{Materialized, MediaAcquire, MediaSource},
    Result,
};
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

static FETCH_COUNTER: AtomicUsize = AtomicUsize::new(0);
static DATA_URI_RE: std::sync::OnceLock<Option<Regex>> = std::sync::OnceLock::new();

/// Where a media location points.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Http(Url),
    Local(PathBuf),
    Base64(String),
    Data {
        mime: String,
        base64: bool,
        payload: String,
    },
}

fn data_uri_re() -> Option<&'static Regex> {
    DATA_URI_RE
        .get_or_init(|| Regex::new(r"^data:([^;,]*)((?:;[^;,]*)*),(.*)$").ok())
        .as_ref()
}

pub fn classify(uri: &str) -> Result<SourceKind> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(Error::InvalidSegment("empty media location".to_string()));
    }
    if let Some(b64) = uri.strip_prefix("base64://") {
        return Ok(SourceKind::Base64(b64.to_string()));
    }
    if uri.starts_with("data:") {
        let caps = data_uri_re()
            .and_then(|re| re.captures(uri))
            .ok_or_else(|| Error::InvalidSegment("malformed data uri".to_string()))?;
        let params = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        return Ok(SourceKind::Data {
            mime: caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
            base64: params.split(';').any(|p| p.eq_ignore_ascii_case("base64")),
            payload: caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default(),
        });
    }
    if uri.starts_with("http://") || uri.starts_with("https://") {
        let url = Url::parse(uri)
            .map_err(|e| Error::InvalidSegment(format!("bad url {uri}: {e}")))?;
        return Ok(SourceKind::Http(url));
    }
    if uri.starts_with("file://") {
        let url = Url::parse(uri)
            .map_err(|e| Error::InvalidSegment(format!("bad file url {uri}: {e}")))?;
        let path = url.to_file_path().map_err(|_| Error::InvalidPath {
            path: PathBuf::from(uri),
            reason: "file url is not a local path".to_string(),
        })?;
        return Ok(SourceKind::Local(path));
    }
    Ok(SourceKind::Local(PathBuf::from(uri)))
}

fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    if out.trim_matches('.').is_empty() {
        "media".to_string()
    } else {
        out
    }
}

fn uniquify_filename(name: &str, ts: u128, n: usize) -> String {
    let base = sanitize_filename(name);
    if let Some((stem, ext)) = base.rsplit_once('.') {
        if !stem.is_empty() && !ext.is_empty() {
            return format!("{stem}_{ts}_{n}.{ext}");
        }
    }
    format!("{base}_{ts}_{n}")
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime.to_ascii_lowercase().as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "video/mp4" => Some("mp4"),
        "audio/amr" => Some("amr"),
        "text/plain" => Some("txt"),
        _ => None,
    }
}

fn last_url_segment(url: &Url) -> Option<String> {
    url.path_segments()
        .and_then(|mut segs| segs.next_back())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Removes a temp file on drop unless [`PartialFile::keep`] was called.
///
/// Covers error returns and a dropped download future alike.
struct PartialFile {
    path: Option<PathBuf>,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    fn keep(mut self) -> PathBuf {
        self.path.take().unwrap_or_default()
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed partial media file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove partial media file"),
            }
        }
    }
}

pub struct HttpMediaFetcher {
    temp_dir: PathBuf,
    max_bytes: u64,
    http: reqwest::Client,
}

impl HttpMediaFetcher {
    pub fn new(temp_dir: impl Into<PathBuf>, timeout: Duration, max_bytes: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            temp_dir: temp_dir.into(),
            max_bytes,
            http,
        })
    }

    pub fn from_config(cfg: &obridge_core::config::Config) -> Result<Self> {
        Self::new(&cfg.temp_dir, cfg.download_timeout, cfg.max_download_bytes)
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let n = FETCH_COUNTER.fetch_add(1, Ordering::SeqCst);
        self.temp_dir.join(uniquify_filename(name, ts, n))
    }

    async fn write_temp(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        if bytes.len() as u64 > self.max_bytes {
            return Err(Error::External(format!(
                "media exceeds {} bytes",
                self.max_bytes
            )));
        }
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let partial = PartialFile::new(self.temp_path(name));
        tokio::fs::write(partial.path(), bytes).await?;
        Ok(partial.keep())
    }

    async fn download(&self, url: &Url, name: &str) -> Result<PathBuf> {
        let mut resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::External(format!("download request error: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::External(format!(
                "download failed: {} {url}",
                resp.status()
            )));
        }
        if resp.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(Error::External(format!(
                "media exceeds {} bytes: {url}",
                self.max_bytes
            )));
        }

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let partial = PartialFile::new(self.temp_path(name));
        let mut dst = tokio::fs::File::create(partial.path()).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| Error::External(format!("download body error: {e}")))?
        {
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(Error::External(format!(
                    "media exceeds {} bytes: {url}",
                    self.max_bytes
                )));
            }
            dst.write_all(&chunk).await?;
        }
        dst.flush().await?;
        drop(dst);
        let path = partial.keep();
        debug!(%url, path = %path.display(), bytes = written, "downloaded media");
        Ok(path)
    }
}

fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::InvalidSegment(format!("bad base64 payload: {e}")))
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("file")
        .to_string()
}

#[async_trait]
impl MediaAcquire for HttpMediaFetcher {
    async fn materialize_local(&self, source: &MediaSource) -> Result<Materialized> {
        let hint = source.name.as_deref().filter(|n| !n.trim().is_empty());
        match classify(&source.uri)? {
            SourceKind::Local(path) => {
                let meta = tokio::fs::metadata(&path)
                    .await
                    .map_err(|e| Error::InvalidPath {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?;
                if !meta.is_file() {
                    return Err(Error::InvalidPath {
                        path,
                        reason: "not a regular file".to_string(),
                    });
                }
                Ok(Materialized {
                    file_name: hint.map(str::to_string).unwrap_or_else(|| file_name_of(&path)),
                    path,
                    was_already_local: true,
                })
            }
            SourceKind::Base64(payload) => {
                let bytes = decode_base64(&payload)?;
                let name = hint.unwrap_or("base64").to_string();
                let path = self.write_temp(&name, &bytes).await?;
                Ok(Materialized {
                    path,
                    file_name: name,
                    was_already_local: false,
                })
            }
            SourceKind::Data {
                mime,
                base64,
                payload,
            } => {
                let bytes = if base64 {
                    decode_base64(&payload)?
                } else {
                    payload.into_bytes()
                };
                let name = match (hint, extension_for_mime(&mime)) {
                    (Some(h), _) => h.to_string(),
                    (None, Some(ext)) => format!("data.{ext}"),
                    (None, None) => "data".to_string(),
                };
                let path = self.write_temp(&name, &bytes).await?;
                Ok(Materialized {
                    path,
                    file_name: name,
                    was_already_local: false,
                })
            }
            SourceKind::Http(url) => {
                let name = hint
                    .map(str::to_string)
                    .or_else(|| last_url_segment(&url))
                    .unwrap_or_else(|| "download".to_string());
                let path = self.download(&url, &name).await?;
                Ok(Materialized {
                    path,
                    file_name: name,
                    was_already_local: false,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_dir(label: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "obridge-fetch-{}-{}-{}",
            std::process::id(),
            nanos,
            label
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn fetcher(dir: &Path) -> HttpMediaFetcher {
        HttpMediaFetcher::new(dir, Duration::from_secs(5), 1024).unwrap()
    }

    #[test]
    fn classifies_every_location_kind() {
        assert!(matches!(
            classify("https://example.invalid/a.png").unwrap(),
            SourceKind::Http(_)
        ));
        assert_eq!(
            classify("file:///tmp/x.png").unwrap(),
            SourceKind::Local(PathBuf::from("/tmp/x.png"))
        );
        assert_eq!(
            classify("/tmp/y.png").unwrap(),
            SourceKind::Local(PathBuf::from("/tmp/y.png"))
        );
        assert_eq!(
            classify("base64://aGk=").unwrap(),
            SourceKind::Base64("aGk=".to_string())
        );
        assert_eq!(
            classify("data:image/png;base64,aGk=").unwrap(),
            SourceKind::Data {
                mime: "image/png".to_string(),
                base64: true,
                payload: "aGk=".to_string(),
            }
        );
        assert!(classify("   ").is_err());
        assert!(classify("data:no-comma").is_err());
    }

    #[test]
    fn uniquify_keeps_extension() {
        assert_eq!(uniquify_filename("my pic.png", 10, 2), "my_pic_10_2.png");
        assert_eq!(uniquify_filename("noext", 10, 2), "noext_10_2");
        assert_eq!(uniquify_filename("..", 1, 0), "media_1_0");
    }

    #[tokio::test]
    async fn base64_is_written_to_temp_dir() {
        let dir = tmp_dir("b64");
        let f = fetcher(&dir);
        let m = f
            .materialize_local(&MediaSource::new("base64://aGVsbG8="))
            .await
            .unwrap();
        assert!(!m.was_already_local);
        assert!(m.path.starts_with(&dir));
        assert_eq!(std::fs::read(&m.path).unwrap(), b"hello");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn data_uri_uses_mime_extension() {
        let dir = tmp_dir("data");
        let f = fetcher(&dir);
        let m = f
            .materialize_local(&MediaSource::new("data:text/plain,hi"))
            .await
            .unwrap();
        assert_eq!(m.file_name, "data.txt");
        assert_eq!(std::fs::read(&m.path).unwrap(), b"hi");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn existing_local_file_is_not_copied() {
        let dir = tmp_dir("local");
        let file = dir.join("clip.mp4");
        std::fs::write(&file, b"mp4").unwrap();

        let f = fetcher(&dir);
        let m = f
            .materialize_local(&MediaSource {
                uri: file.to_string_lossy().to_string(),
                name: Some("renamed.mp4".to_string()),
            })
            .await
            .unwrap();
        assert!(m.was_already_local);
        assert_eq!(m.path, file);
        assert_eq!(m.file_name, "renamed.mp4");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn missing_local_file_is_invalid_path() {
        let dir = tmp_dir("missing");
        let f = fetcher(&dir);
        let err = f
            .materialize_local(&MediaSource::new(
                dir.join("nope.png").to_string_lossy().to_string(),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn oversized_inline_payload_is_rejected() {
        let dir = tmp_dir("big");
        let f = HttpMediaFetcher::new(&dir, Duration::from_secs(5), 2).unwrap();
        let err = f
            .materialize_local(&MediaSource::new("base64://aGVsbG8="))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::External(_)));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    async fn serve_once(response: &'static [u8]) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = sock.read(&mut buf).await;
            let _ = sock.write_all(response).await;
            let _ = sock.shutdown().await;
        });
        format!("http://{addr}/a.png")
    }

    fn files_in(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    #[tokio::test]
    async fn truncated_download_leaves_no_file() {
        let dir = tmp_dir("truncated");
        let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 500\r\n\r\nabc").await;

        let err = fetcher(&dir)
            .materialize_local(&MediaSource::new(url))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::External(_)));
        assert!(files_in(&dir).is_empty());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn completed_download_is_kept() {
        let dir = tmp_dir("complete");
        let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\nConnection: close\r\n\r\nabc").await;

        let m = fetcher(&dir)
            .materialize_local(&MediaSource::new(url))
            .await
            .unwrap();
        assert!(!m.was_already_local);
        assert_eq!(m.file_name, "a.png");
        assert_eq!(std::fs::read(&m.path).unwrap(), b"abc");
        assert_eq!(files_in(&dir), vec![m.path.clone()]);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
