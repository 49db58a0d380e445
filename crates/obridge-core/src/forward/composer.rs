//! Walks a segment list and packages it into a forward bundle.
//!
//! Each `Node` becomes one row. A node whose content holds further nodes (or a
//! `forward` segment with inline content) is composed one level deeper, uploaded on
//! its own, and referenced from the outer row through a pointer card. Inner blobs are
//! carried along in the outer bundle under the inner bundle's uuid.

use std::{future::Future, pin::Pin, sync::Arc};

use tracing::{debug, warn};

use crate::{
    config::DEFAULT_NICK,
    domain::{Peer, SelfIdentity},
    forward::{
        bundle::{Bundle, ContentMeta, NamedBlob, ResultRow, Routing, RowBody, ROOT_BLOB_NAME},
        element::{
            Element, ForwardCard, CARD_DEFAULT_PROMPT, CARD_DEFAULT_SOURCE, CARD_DEFAULT_SUMMARY,
        },
        envelope, faces,
        segment::{DisplayOverrides, FileData, ImageData, NodeData, Segment, VideoData},
        tracker::ResourceTracker,
    },
    ids::{IdGenerator, RandomIds},
    ports::{
        CoverExtractor, MediaAcquire, MediaKind, MediaSource, MediaTransport, MediaUpload,
        Materialized, UploadGateway,
    },
    Error, Result,
};

pub const MAX_FORWARD_DEPTH: usize = 3;
pub const MAX_PREVIEW_LINES: usize = 4;

const PREVIEW_IMAGE: &str = "[image]";
const PREVIEW_STICKER: &str = "[sticker]";
const PREVIEW_VIDEO: &str = "[video]";
const PREVIEW_FORWARD: &str = "[chat history]";

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Display labels for one bundle; unset fields fall back to peer-dependent defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComposeOptions {
    pub source: Option<String>,
    pub preview_lines: Option<Vec<String>>,
    pub summary: Option<String>,
    pub prompt: Option<String>,
}

impl From<&DisplayOverrides> for ComposeOptions {
    fn from(d: &DisplayOverrides) -> Self {
        Self {
            source: d.source.clone(),
            preview_lines: d
                .news
                .as_ref()
                .map(|news| news.iter().map(|n| n.text.clone()).collect()),
            summary: d.summary.clone(),
            prompt: d.prompt.clone(),
        }
    }
}

/// Outbound collaborators the composer drives.
#[derive(Clone)]
pub struct Collaborators {
    pub upload: Arc<dyn UploadGateway>,
    pub media: Arc<dyn MediaTransport>,
    pub acquire: Arc<dyn MediaAcquire>,
    pub covers: Arc<dyn CoverExtractor>,
}

/// Who a row is attributed to. Fixed for the duration of one flush.
#[derive(Clone, Debug, PartialEq, Eq)]
struct SenderContext {
    uin: u64,
    name: String,
    time: u32,
}

impl SenderContext {
    fn me(me: &SelfIdentity, now: u32) -> Self {
        Self {
            uin: me.uin,
            name: display_nick(me),
            time: now,
        }
    }

    fn for_node(node: &NodeData, me: &SelfIdentity, now: u32) -> Self {
        Self {
            uin: node.sender_id().unwrap_or(me.uin),
            name: node
                .sender_name()
                .map(str::to_string)
                .unwrap_or_else(|| display_nick(me)),
            time: node.timestamp().unwrap_or(now),
        }
    }
}

fn display_nick(me: &SelfIdentity) -> String {
    if me.nick.trim().is_empty() {
        DEFAULT_NICK.to_string()
    } else {
        me.nick.clone()
    }
}

/// Content collected since the last flush.
#[derive(Debug, Default)]
struct Accumulator {
    elements: Vec<Element>,
    raw_content: Option<Vec<u8>>,
    preview: String,
}

impl Accumulator {
    fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.raw_content.is_none()
    }
}

/// Output of one bundle level.
#[derive(Debug)]
struct Level {
    rows: Vec<ResultRow>,
    news: Vec<String>,
    seq: u32,
    inner: Vec<Bundle>,
}

struct Walk<'a> {
    peer: &'a Peer,
    depth: usize,
    now: u32,
    tracker: &'a mut ResourceTracker,
    level: Level,
    acc: Accumulator,
}

pub struct ForwardComposer {
    me: SelfIdentity,
    ports: Collaborators,
    ids: Arc<dyn IdGenerator>,
}

impl ForwardComposer {
    pub fn new(me: SelfIdentity, ports: Collaborators) -> Self {
        Self {
            me,
            ports,
            ids: Arc::new(RandomIds),
        }
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Compose `segments` into a bundle for `peer`.
    ///
    /// Every transient file created on the way is registered in `tracker`, including
    /// when this returns an error or the future is dropped. Deleting them is up to the
    /// caller.
    pub async fn compose(
        &self,
        peer: &Peer,
        segments: &[Segment],
        options: &ComposeOptions,
        tracker: &mut ResourceTracker,
    ) -> Result<Bundle> {
        self.compose_at(peer, segments, options, 0, tracker).await
    }

    fn compose_at<'a>(
        &'a self,
        peer: &'a Peer,
        segments: &'a [Segment],
        options: &'a ComposeOptions,
        depth: usize,
        tracker: &'a mut ResourceTracker,
    ) -> BoxFuture<'a, Result<Bundle>> {
        Box::pin(async move {
            let mut walk = Walk {
                peer,
                depth,
                now: unix_now(),
                tracker,
                level: Level {
                    rows: Vec::new(),
                    news: Vec::new(),
                    seq: self.ids.sequence_seed(),
                    inner: Vec::new(),
                },
                acc: Accumulator::default(),
            };

            let me = SenderContext::me(&self.me, walk.now);
            for segment in segments {
                match segment {
                    Segment::Node(node) => {
                        // Loose content before a node is its own row.
                        self.flush(&mut walk, &me);
                        self.visit_node(&mut walk, node).await?;
                    }
                    other => self.visit_leaf(&mut walk, other).await?,
                }
            }
            self.flush(&mut walk, &me);

            let bundle = self.finalize(peer, walk.level, options);
            debug!(
                depth,
                rows = bundle.total_count,
                blobs = bundle.named_blobs.len(),
                uuid = %bundle.uuid,
                "composed forward bundle"
            );
            Ok(bundle)
        })
    }

    async fn visit_node(&self, walk: &mut Walk<'_>, node: &NodeData) -> Result<()> {
        let content = node.segments();
        if content.iter().any(Segment::is_node) {
            if let Err(e) = check_depth(walk.depth) {
                warn!(error = %e, "skipping nested node");
                return Ok(());
            }
            let nodes: Vec<Segment> = content.into_iter().filter(Segment::is_node).collect();
            self.embed(walk, &nodes, &ComposeOptions::from(&node.display))
                .await?;
        } else {
            for segment in &content {
                self.visit_leaf(walk, segment).await?;
            }
        }
        let sender = SenderContext::for_node(node, &self.me, walk.now);
        self.flush(walk, &sender);
        Ok(())
    }

    async fn visit_leaf(&self, walk: &mut Walk<'_>, segment: &Segment) -> Result<()> {
        match segment {
            Segment::Text(t) => {
                walk.acc.elements.push(Element::Text(t.text.clone()));
                walk.acc.preview.push_str(&t.text);
            }
            Segment::Face(f) => {
                let id = f
                    .id
                    .as_i64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| Error::InvalidSegment(format!("bad face id: {:?}", f.id)))?;
                walk.acc.elements.push(Element::Face(id));
                if let Some(text) = faces::describe(id) {
                    walk.acc.preview.push_str(text);
                }
            }
            Segment::Image(img) => self.visit_image(walk, img).await?,
            Segment::Video(video) => self.visit_video(walk, video).await?,
            Segment::File(file) => self.visit_file(walk, file).await?,
            Segment::Forward(fwd) => {
                let options = ComposeOptions::from(&fwd.display);
                if let Some(resid) = fwd.id.as_deref().filter(|id| !id.trim().is_empty()) {
                    let card = self.card(resid.to_string(), self.ids.uuid(), &options);
                    walk.acc.elements.push(Element::ForwardCard(card));
                    walk.acc.preview.push_str(PREVIEW_FORWARD);
                } else if let Some(content) = &fwd.content {
                    if let Err(e) = check_depth(walk.depth) {
                        warn!(error = %e, "skipping nested forward");
                        return Ok(());
                    }
                    let nodes: Vec<Segment> = content
                        .to_segments()
                        .into_iter()
                        .filter(Segment::is_node)
                        .collect();
                    if nodes.is_empty() {
                        warn!("forward content has no node segments, skipping");
                        return Ok(());
                    }
                    self.embed(walk, &nodes, &options).await?;
                } else {
                    warn!("forward segment has neither id nor content, skipping");
                }
            }
            Segment::Unsupported(u) => {
                debug!(kind = %u.kind, "ignoring unsupported segment");
            }
            Segment::Node(_) => {
                return Err(Error::InvalidSegment(
                    "node segment inside plain node content".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Compose `nodes` one level down, upload the result and point at it.
    async fn embed(
        &self,
        walk: &mut Walk<'_>,
        nodes: &[Segment],
        options: &ComposeOptions,
    ) -> Result<()> {
        let inner = self
            .compose_at(walk.peer, nodes, options, walk.depth + 1, &mut *walk.tracker)
            .await?;
        let resid = self
            .ports
            .upload
            .upload_bundle(walk.peer, &inner.named_blobs)
            .await?;
        debug!(%resid, uuid = %inner.uuid, depth = walk.depth + 1, "uploaded nested bundle");

        let card = ForwardCard {
            resid,
            uuid: inner.uuid.clone(),
            source: inner.source.clone(),
            summary: inner.summary.clone(),
            prompt: inner.prompt.clone(),
            news: inner.preview_lines.clone(),
        };
        walk.acc.elements.push(Element::ForwardCard(card));
        walk.acc.preview.push_str(PREVIEW_FORWARD);
        walk.level.inner.push(inner);
        Ok(())
    }

    fn card(&self, resid: String, uuid: String, options: &ComposeOptions) -> ForwardCard {
        ForwardCard {
            resid,
            uuid,
            source: options
                .source
                .clone()
                .unwrap_or_else(|| CARD_DEFAULT_SOURCE.to_string()),
            summary: options
                .summary
                .clone()
                .unwrap_or_else(|| CARD_DEFAULT_SUMMARY.to_string()),
            prompt: options
                .prompt
                .clone()
                .unwrap_or_else(|| CARD_DEFAULT_PROMPT.to_string()),
            news: options
                .preview_lines
                .iter()
                .flatten()
                .take(MAX_PREVIEW_LINES)
                .cloned()
                .collect(),
        }
    }

    async fn visit_image(&self, walk: &mut Walk<'_>, img: &ImageData) -> Result<()> {
        let busi_type = img.busi_type();
        let local = self.acquire(walk, &img.source()).await?;
        let desc = self
            .ports
            .media
            .upload(MediaUpload {
                kind: MediaKind::Image { busi_type },
                path: local.path,
                file_name: local.file_name,
                peer: walk.peer.clone(),
            })
            .await?;
        if let Some(staged) = &desc.staged_copy {
            walk.tracker.register(staged);
        }

        walk.acc
            .elements
            .push(envelope::image(&desc, busi_type, walk.peer.is_group()));
        walk.acc.preview.push_str(if busi_type == 1 {
            PREVIEW_STICKER
        } else {
            PREVIEW_IMAGE
        });
        Ok(())
    }

    async fn visit_video(&self, walk: &mut Walk<'_>, video: &VideoData) -> Result<()> {
        let local = self.acquire(walk, &video.source()).await?;
        let cover = match video.cover_source() {
            Some(src) => {
                let m = self.ports.acquire.materialize_local(&src).await?;
                if !m.was_already_local {
                    walk.tracker.register(&m.path);
                }
                m.path
            }
            None => {
                let path = self.ports.covers.extract_cover(&local.path).await?;
                walk.tracker.register(&path);
                path
            }
        };

        let desc = self
            .ports
            .media
            .upload(MediaUpload {
                kind: MediaKind::Video { cover },
                path: local.path,
                file_name: local.file_name,
                peer: walk.peer.clone(),
            })
            .await?;
        if let Some(staged) = &desc.staged_copy {
            walk.tracker.register(staged);
        }

        walk.acc
            .elements
            .push(envelope::video(&desc, walk.peer.is_group()));
        walk.acc.preview.push_str(PREVIEW_VIDEO);
        Ok(())
    }

    async fn visit_file(&self, walk: &mut Walk<'_>, file: &FileData) -> Result<()> {
        let local = self.acquire(walk, &file.source()).await?;
        let file_name = local.file_name.clone();
        let desc = self
            .ports
            .media
            .upload(MediaUpload {
                kind: MediaKind::File,
                path: local.path,
                file_name: local.file_name,
                peer: walk.peer.clone(),
            })
            .await?;
        if let Some(staged) = &desc.staged_copy {
            walk.tracker.register(staged);
        }

        if walk.peer.is_group() {
            walk.acc
                .elements
                .push(envelope::group_file(&desc, &file_name)?);
        } else {
            walk.acc.raw_content = Some(envelope::direct_file(&desc, &file_name, walk.now));
        }
        walk.acc.preview.push_str(&format!("[file] {file_name}"));
        Ok(())
    }

    /// Materialize a media source locally and refuse empty files.
    async fn acquire(&self, walk: &mut Walk<'_>, source: &MediaSource) -> Result<Materialized> {
        if source.uri.trim().is_empty() {
            return Err(Error::InvalidSegment(
                "media segment without file or url".to_string(),
            ));
        }
        let local = self.ports.acquire.materialize_local(source).await?;
        if !local.was_already_local {
            walk.tracker.register(&local.path);
        }

        let size = tokio::fs::metadata(&local.path).await?.len();
        if size == 0 {
            return Err(Error::EmptyResource { path: local.path });
        }
        Ok(local)
    }

    fn flush(&self, walk: &mut Walk<'_>, sender: &SenderContext) {
        if walk.acc.is_empty() {
            return;
        }
        let acc = std::mem::take(&mut walk.acc);
        let is_group = walk.peer.is_group();

        if walk.level.news.len() < MAX_PREVIEW_LINES {
            walk.level
                .news
                .push(format!("{}: {}", sender.name, acc.preview));
        }
        walk.level.rows.push(ResultRow {
            routing: Routing::new(sender.uin, &sender.name, is_group),
            meta: ContentMeta {
                msg_type: ContentMeta::msg_type_for(is_group),
                random: self.ids.random_u32(),
                seq: walk.level.seq,
                time: sender.time,
            },
            body: RowBody {
                elements: acc.elements,
                raw_content: acc.raw_content,
            },
        });
        walk.level.seq = walk.level.seq.wrapping_add(1);
    }

    fn finalize(&self, peer: &Peer, level: Level, options: &ComposeOptions) -> Bundle {
        let total_count = level.rows.len();
        let mut named_blobs = vec![NamedBlob {
            name: ROOT_BLOB_NAME.to_string(),
            rows: level.rows,
        }];
        for inner in level.inner {
            for blob in inner.named_blobs {
                let name = if blob.name == ROOT_BLOB_NAME {
                    inner.uuid.clone()
                } else {
                    blob.name
                };
                named_blobs.push(NamedBlob {
                    name,
                    rows: blob.rows,
                });
            }
        }

        let preview_lines = match &options.preview_lines {
            Some(lines) if !lines.is_empty() => {
                lines.iter().take(MAX_PREVIEW_LINES).cloned().collect()
            }
            _ => level.news,
        };
        let default_source = if peer.is_group() {
            "Group chat history"
        } else {
            "Chat history"
        };

        Bundle {
            named_blobs,
            total_count,
            preview_lines,
            summary: options
                .summary
                .clone()
                .unwrap_or_else(|| format!("View {total_count} forwarded messages")),
            source: options
                .source
                .clone()
                .unwrap_or_else(|| default_source.to_string()),
            prompt: options
                .prompt
                .clone()
                .unwrap_or_else(|| CARD_DEFAULT_PROMPT.to_string()),
            uuid: self.ids.uuid(),
        }
    }
}

fn check_depth(depth: usize) -> Result<()> {
    if depth >= MAX_FORWARD_DEPTH {
        return Err(Error::DepthExceeded {
            depth: depth + 1,
            limit: MAX_FORWARD_DEPTH,
        });
    }
    Ok(())
}

fn unix_now() -> u32 {
    u32::try_from(chrono::Utc::now().timestamp()).unwrap_or(u32::MAX)
}
