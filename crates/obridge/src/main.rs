use std::{path::Path, sync::Arc};

use anyhow::Context;
use base64::Engine;
use obridge_core::{
    config::Config,
    domain::Peer,
    forward::{
        encode_blobs, segment::MessageContent, Collaborators, ComposeOptions, ForwardComposer,
        ResourceTracker,
    },
    identity::{persist::JsonFileStore, IdentityResolver, IdentityStore},
    ports::CoverExtractor,
};
use obridge_fetch::HttpMediaFetcher;
use obridge_ffmpeg::FfmpegCoverExtractor;

mod cli;
mod offline;

use cli::Command;

async fn open_store(cfg: &Config) -> anyhow::Result<Arc<IdentityStore>> {
    let persistent = JsonFileStore::open(&cfg.store_path)
        .await
        .with_context(|| format!("opening id store {}", cfg.store_path.display()))?;
    Ok(Arc::new(IdentityStore::new(
        Arc::new(persistent),
        cfg.msg_cache_expire,
        cfg.msg_cache_capacity,
    )))
}

async fn compose(cfg: &Config, input: &Path, peer: &Peer) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;
    let content: MessageContent =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", input.display()))?;
    let segments = content.to_segments();

    let covers: Arc<dyn CoverExtractor> = match FfmpegCoverExtractor::from_config(cfg) {
        Some(ffmpeg) => Arc::new(ffmpeg),
        None => {
            tracing::warn!("ffmpeg not found; videos without a cover will fail");
            Arc::new(offline::NoCoverExtractor)
        }
    };
    let composer = ForwardComposer::new(
        cfg.identity(),
        Collaborators {
            upload: Arc::new(offline::DigestUploadGateway),
            media: Arc::new(offline::DigestMediaTransport),
            acquire: Arc::new(HttpMediaFetcher::from_config(cfg)?),
            covers,
        },
    );

    let mut tracker = ResourceTracker::new();
    let result = composer
        .compose(peer, &segments, &ComposeOptions::default(), &mut tracker)
        .await;
    let report = result.map_err(anyhow::Error::from).and_then(|bundle| {
        let payload = encode_blobs(&bundle.named_blobs)?;
        Ok(serde_json::json!({
            "uuid": bundle.uuid,
            "total_count": bundle.total_count,
            "source": bundle.source,
            "summary": bundle.summary,
            "prompt": bundle.prompt,
            "preview": bundle.preview_lines,
            "blobs": bundle.blob_names(),
            "payload_base64": base64::engine::general_purpose::STANDARD.encode(payload),
        }))
    });
    tracker.cleanup().await;

    println!("{}", serde_json::to_string_pretty(&report?)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obridge_core::logging::init("obridge")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cmd = cli::parse_args(&args)?;
    if cmd == Command::Help {
        print!("{}", cli::USAGE);
        return Ok(());
    }

    let cfg = Config::load().context("loading config")?;

    match cmd {
        Command::Compose { input, peer } => compose(&cfg, &input, &peer).await?,
        Command::Assign { long_id, peer } => {
            let store = open_store(&cfg).await?;
            let short = store.assign(&long_id, &peer).await?;
            println!("{short}");
        }
        Command::Resolve { key } => {
            let store = open_store(&cfg).await?;
            let purged = store.purge_expired();
            tracing::debug!(purged, "dropped expired cache entries");
            let resolver = IdentityResolver::new(store, Arc::new(offline::EmptyBacking));
            let found = resolver
                .resolve(key.as_str())
                .await
                .with_context(|| format!("resolving {key}"))?;
            println!("{}", serde_json::to_string_pretty(&found)?);
        }
        Command::Help => {}
    }

    Ok(())
}
