use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::SelfIdentity, errors::Error, Result};

/// Typed configuration for the bridge.
#[derive(Clone, Debug)]
pub struct Config {
    // Identity the bridge composes as
    pub self_uin: u64,
    pub self_uid: String,
    pub self_nick: String,

    // Filesystem
    pub temp_dir: PathBuf,
    pub store_path: PathBuf,

    // Message cache
    pub msg_cache_expire: Duration,
    pub msg_cache_capacity: usize,

    // Media acquisition
    pub ffmpeg_path: Option<PathBuf>,
    pub download_timeout: Duration,
    pub max_download_bytes: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let self_uin = env_u64("SELF_UIN").unwrap_or(0);
        if self_uin == 0 {
            return Err(Error::Config(
                "SELF_UIN environment variable is required".to_string(),
            ));
        }
        let self_uid = env_str("SELF_UID").and_then(non_empty).unwrap_or_default();
        let self_nick = env_str("SELF_NICK")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_NICK.to_string());

        let temp_dir = PathBuf::from(env_str("TEMP_DIR").unwrap_or("/tmp/obridge".to_string()));
        let store_path = PathBuf::from(
            env_str("STORE_PATH").unwrap_or("/tmp/obridge-msgid.json".to_string()),
        );

        // Composed media lands here before upload.
        fs::create_dir_all(&temp_dir)?;

        let msg_cache_expire = Duration::from_secs(env_u64("MSG_CACHE_EXPIRE").unwrap_or(120));
        let msg_cache_capacity = env_usize("MSG_CACHE_CAPACITY").unwrap_or(10_000);

        let ffmpeg_path = env_path("FFMPEG_PATH").or_else(|| which_in_path("ffmpeg"));
        let download_timeout =
            Duration::from_millis(env_u64("DOWNLOAD_TIMEOUT_MS").unwrap_or(30_000));
        let max_download_bytes = env_u64("MAX_DOWNLOAD_BYTES").unwrap_or(100 * 1024 * 1024);

        Ok(Self {
            self_uin,
            self_uid,
            self_nick,
            temp_dir,
            store_path,
            msg_cache_expire,
            msg_cache_capacity,
            ffmpeg_path,
            download_timeout,
            max_download_bytes,
        })
    }

    pub fn identity(&self) -> SelfIdentity {
        SelfIdentity {
            uin: self.self_uin,
            uid: self.self_uid.clone(),
            nick: self.self_nick.clone(),
        }
    }
}

/// Display name used when neither the node nor the account supplies one.
pub const DEFAULT_NICK: &str = "QQ User";

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn which_in_path(binary: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    for dir in env::split_paths(&path) {
        let candidate = dir.join(binary);
        if is_executable_file(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn is_executable_file(p: &Path) -> bool {
    if !p.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(md) = fs::metadata(p) {
            return (md.permissions().mode() & 0o111) != 0;
        }
    }
    true
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotenv_parsing_skips_comments_and_strips_quotes() {
        let parsed = parse_dotenv(
            "# comment\nSELF_UIN=10001\n\nSELF_NICK = \"Bridge Bot\"\nbroken line\n=novalue\nTEMP_DIR='/tmp/x'\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("SELF_UIN".to_string(), "10001".to_string()),
                ("SELF_NICK".to_string(), "Bridge Bot".to_string()),
                ("TEMP_DIR".to_string(), "/tmp/x".to_string()),
            ]
        );
    }

    #[test]
    fn non_empty_rejects_whitespace() {
        assert_eq!(non_empty("  ".to_string()), None);
        assert_eq!(non_empty("x".to_string()), Some("x".to_string()));
    }
}
