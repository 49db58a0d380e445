//! ffmpeg adapter: derives a still cover image for videos sent without one.

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    process::Stdio,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use obridge_core::{errors::Error, ports::CoverExtractor, Result};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::Command,
    sync::Mutex,
};
use tracing::debug;

const STDERR_TAIL_MAX_BYTES: usize = 16 * 1024;
const STDERR_TAIL_MAX_LINES: usize = 200;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

static COVER_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Clone, Debug, Default)]
struct StderrTail {
    lines: VecDeque<String>,
    bytes: usize,
}

impl StderrTail {
    fn push_line(&mut self, line: String) {
        // +1 for the '\n' we join with later.
        self.bytes = self.bytes.saturating_add(line.len() + 1);
        self.lines.push_back(line);

        while self.lines.len() > STDERR_TAIL_MAX_LINES || self.bytes > STDERR_TAIL_MAX_BYTES {
            if let Some(front) = self.lines.pop_front() {
                self.bytes = self.bytes.saturating_sub(front.len() + 1);
            } else {
                break;
            }
        }
    }

    fn snapshot(&self) -> String {
        self.lines.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

#[derive(Clone, Debug)]
pub struct FfmpegCoverExtractor {
    program: PathBuf,
    out_dir: PathBuf,
    timeout: Duration,
}

impl FfmpegCoverExtractor {
    pub fn new(program: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            out_dir: out_dir.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `None` when no ffmpeg binary was configured or found on `PATH`.
    pub fn from_config(cfg: &obridge_core::config::Config) -> Option<Self> {
        cfg.ffmpeg_path
            .as_ref()
            .map(|p| Self::new(p, &cfg.temp_dir))
    }

    fn cover_path(&self) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let n = COVER_COUNTER.fetch_add(1, Ordering::SeqCst);
        self.out_dir.join(format!("cover_{ts}_{n}.jpg"))
    }
}

/// Grab the first frame as a high-quality jpeg.
fn cover_args(video: &Path, out: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-ss".to_string(),
        "0".to_string(),
        "-i".to_string(),
        video.to_string_lossy().to_string(),
        "-frames:v".to_string(),
        "1".to_string(),
        "-q:v".to_string(),
        "2".to_string(),
        out.to_string_lossy().to_string(),
    ]
}

#[async_trait]
impl CoverExtractor for FfmpegCoverExtractor {
    async fn extract_cover(&self, video: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.out_dir).await?;
        let out = self.cover_path();

        let mut child = Command::new(&self.program)
            .args(cover_args(video, &out))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::Config(format!(
                    "ffmpeg not found at {}",
                    self.program.display()
                )),
                _ => Error::Io(e),
            })?;

        let tail = std::sync::Arc::new(Mutex::new(StderrTail::default()));
        // Drain stderr in background to avoid blocking on a full pipe.
        let drain = child.stderr.take().map(|stderr| {
            let tail = tail.clone();
            tokio::spawn(async move {
                let mut r = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = r.next_line().await {
                    tail.lock().await.push_line(line);
                }
            })
        });

        let waited = tokio::time::timeout(self.timeout, child.wait()).await;
        let status = match waited {
            Ok(status) => status?,
            Err(_) => {
                let _ = child.kill().await;
                let _ = tokio::fs::remove_file(&out).await;
                return Err(Error::External(format!(
                    "ffmpeg timed out after {:?} on {}",
                    self.timeout,
                    video.display()
                )));
            }
        };
        if let Some(drain) = drain {
            let _ = drain.await;
        }

        if !status.success() {
            let _ = tokio::fs::remove_file(&out).await;
            let stderr = tail.lock().await.snapshot();
            let mut msg = format!("ffmpeg exited with status {status}");
            if !stderr.trim().is_empty() {
                msg.push_str("\nstderr (tail):\n");
                msg.push_str(&stderr);
            }
            return Err(Error::External(msg));
        }

        match tokio::fs::metadata(&out).await {
            Ok(meta) if meta.len() > 0 => {
                debug!(video = %video.display(), cover = %out.display(), "extracted video cover");
                Ok(out)
            }
            _ => {
                let _ = tokio::fs::remove_file(&out).await;
                Err(Error::EmptyResource { path: out })
            }
        }
    }
}
