//! Incoming message segments, in the `{ "type": ..., "data": { ... } }` shape protocol
//! clients send.

use serde::{Deserialize, Serialize};

use crate::ports::MediaSource;

/// A value clients send either as a JSON number or as a numeric string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumOrStr {
    Num(i64),
    Str(String),
}

impl NumOrStr {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NumOrStr::Num(n) => Some(*n),
            NumOrStr::Str(s) => s.trim().parse().ok(),
        }
    }
}

impl From<i64> for NumOrStr {
    fn from(n: i64) -> Self {
        NumOrStr::Num(n)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsLine {
    pub text: String,
}

/// Per-bundle display overrides a node or forward segment may carry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news: Option<Vec<NewsLine>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// Segment content: a list, a single segment, or bare text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Segments(Vec<Segment>),
    Single(Box<Segment>),
    Text(String),
}

impl MessageContent {
    pub fn to_segments(&self) -> Vec<Segment> {
        match self {
            MessageContent::Segments(xs) => xs.clone(),
            MessageContent::Single(s) => vec![(**s).clone()],
            MessageContent::Text(t) => vec![Segment::text(t.clone())],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextData {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceData {
    pub id: NumOrStr,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(default)]
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// `1` marks an animated sticker.
    #[serde(default, rename = "subType", alias = "sub_type", skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<NumOrStr>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoData {
    #[serde(default)]
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumb: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FileData {
    #[serde(default)]
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One sender context inside a forward.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uin: Option<NumOrStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<NumOrStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<NumOrStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    #[serde(flatten)]
    pub display: DisplayOverrides,
}

impl NodeData {
    pub fn sender_id(&self) -> Option<u64> {
        self.uin
            .as_ref()
            .or(self.user_id.as_ref())
            .and_then(NumOrStr::as_i64)
            .and_then(|n| u64::try_from(n).ok())
            .filter(|n| *n != 0)
    }

    pub fn sender_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.nickname.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn timestamp(&self) -> Option<u32> {
        self.time
            .as_ref()
            .and_then(NumOrStr::as_i64)
            .and_then(|t| u32::try_from(t).ok())
            .filter(|t| *t != 0)
    }

    pub fn segments(&self) -> Vec<Segment> {
        self.content
            .as_ref()
            .map(MessageContent::to_segments)
            .unwrap_or_default()
    }
}

/// A forwarded-conversation block: either an existing resource id or inline nodes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ForwardData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    #[serde(flatten)]
    pub display: DisplayOverrides,
}

/// A segment type the composer does not render (`at`, `reply`, ...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnsupportedData {
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    try_from = "RawSegment"
)]
pub enum Segment {
    Text(TextData),
    Face(FaceData),
    Image(ImageData),
    Video(VideoData),
    File(FileData),
    Node(NodeData),
    Forward(ForwardData),
    Unsupported(UnsupportedData),
}

#[derive(Deserialize)]
struct RawSegment {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl TryFrom<RawSegment> for Segment {
    type Error = serde_json::Error;

    fn try_from(raw: RawSegment) -> Result<Self, Self::Error> {
        use serde_json::from_value;

        Ok(match raw.kind.as_str() {
            "text" => Segment::Text(from_value(raw.data)?),
            "face" => Segment::Face(from_value(raw.data)?),
            "image" => Segment::Image(from_value(raw.data)?),
            "video" => Segment::Video(from_value(raw.data)?),
            "file" => Segment::File(from_value(raw.data)?),
            "node" => Segment::Node(from_value(raw.data)?),
            "forward" => Segment::Forward(from_value(raw.data)?),
            _ => Segment::Unsupported(UnsupportedData {
                kind: raw.kind,
                data: raw.data,
            }),
        })
    }
}

impl Segment {
    pub fn text(text: impl Into<String>) -> Self {
        Segment::Text(TextData { text: text.into() })
    }

    pub fn face(id: i64) -> Self {
        Segment::Face(FaceData { id: id.into() })
    }

    pub fn image(file: impl Into<String>) -> Self {
        Segment::Image(ImageData {
            file: file.into(),
            ..Default::default()
        })
    }

    pub fn video(file: impl Into<String>) -> Self {
        Segment::Video(VideoData {
            file: file.into(),
            ..Default::default()
        })
    }

    pub fn file(file: impl Into<String>, name: Option<&str>) -> Self {
        Segment::File(FileData {
            file: file.into(),
            url: None,
            name: name.map(str::to_string),
        })
    }

    /// A node sent by `name` with the given content.
    pub fn node(name: impl Into<String>, content: Vec<Segment>) -> Self {
        Segment::Node(NodeData {
            name: Some(name.into()),
            content: Some(MessageContent::Segments(content)),
            ..Default::default()
        })
    }

    pub fn forward_ref(id: impl Into<String>) -> Self {
        Segment::Forward(ForwardData {
            id: Some(id.into()),
            ..Default::default()
        })
    }

    pub fn forward_inline(content: Vec<Segment>) -> Self {
        Segment::Forward(ForwardData {
            content: Some(MessageContent::Segments(content)),
            ..Default::default()
        })
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Segment::Node(_))
    }
}

fn pick_source(file: &str, url: Option<&String>) -> String {
    if file.trim().is_empty() {
        url.cloned().unwrap_or_default()
    } else {
        file.to_string()
    }
}

impl ImageData {
    pub fn source(&self) -> MediaSource {
        MediaSource::new(pick_source(&self.file, self.url.as_ref()))
    }

    pub fn busi_type(&self) -> u32 {
        self.sub_type
            .as_ref()
            .and_then(NumOrStr::as_i64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0)
    }
}

impl VideoData {
    pub fn source(&self) -> MediaSource {
        MediaSource::new(pick_source(&self.file, self.url.as_ref()))
    }

    pub fn cover_source(&self) -> Option<MediaSource> {
        self.cover
            .as_ref()
            .or(self.thumb.as_ref())
            .filter(|s| !s.trim().is_empty())
            .map(|s| MediaSource::new(s.clone()))
    }
}

impl FileData {
    pub fn source(&self) -> MediaSource {
        MediaSource {
            uri: pick_source(&self.file, self.url.as_ref()),
            name: self.name.clone().filter(|n| !n.trim().is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_types_parse_as_unsupported() {
        let v = json!([
            {"type": "at", "data": {"qq": "10001"}},
            {"type": "text", "data": {"text": "hi"}},
            {"type": "reply"}
        ]);
        let segs: Vec<Segment> = serde_json::from_value(v).unwrap();
        assert_eq!(segs.len(), 3);
        let Segment::Unsupported(at) = &segs[0] else {
            panic!("expected unsupported");
        };
        assert_eq!(at.kind, "at");
        assert_eq!(at.data["qq"], "10001");
        assert_eq!(segs[1], Segment::text("hi"));
        assert!(matches!(&segs[2], Segment::Unsupported(u) if u.kind == "reply"));

        // Known types with bad data are still errors.
        assert!(serde_json::from_value::<Segment>(json!({"type": "face", "data": {}})).is_err());
    }

    #[test]
    fn parses_client_json_with_nested_nodes() {
        let v = json!([
            {"type": "text", "data": {"text": "hi"}},
            {"type": "face", "data": {"id": "14"}},
            {"type": "node", "data": {
                "user_id": "10001",
                "nickname": "Alice",
                "time": 1700000000,
                "content": [
                    {"type": "node", "data": {"name": "Bob", "content": "inner"}}
                ],
                "summary": "custom"
            }},
            {"type": "forward", "data": {"id": "res-1"}}
        ]);
        let segs: Vec<Segment> = serde_json::from_value(v).unwrap();
        assert_eq!(segs.len(), 4);

        let Segment::Face(face) = &segs[1] else {
            panic!("expected face");
        };
        assert_eq!(face.id.as_i64(), Some(14));

        let Segment::Node(node) = &segs[2] else {
            panic!("expected node");
        };
        assert_eq!(node.sender_id(), Some(10001));
        assert_eq!(node.sender_name(), Some("Alice"));
        assert_eq!(node.timestamp(), Some(1_700_000_000));
        assert_eq!(node.display.summary.as_deref(), Some("custom"));

        let inner = node.segments();
        assert!(inner[0].is_node());
        let Segment::Node(bob) = &inner[0] else {
            panic!("expected inner node");
        };
        assert_eq!(bob.segments(), vec![Segment::text("inner")]);
    }

    #[test]
    fn media_sources_fall_back_to_url() {
        let img: Segment = serde_json::from_value(json!({
            "type": "image",
            "data": {"url": "https://example.invalid/a.png", "subType": 1}
        }))
        .unwrap();
        let Segment::Image(img) = img else {
            panic!("expected image");
        };
        assert_eq!(img.source().uri, "https://example.invalid/a.png");
        assert_eq!(img.busi_type(), 1);

        let video = VideoData {
            file: "/tmp/v.mp4".to_string(),
            thumb: Some("/tmp/t.jpg".to_string()),
            ..Default::default()
        };
        assert_eq!(video.cover_source().unwrap().uri, "/tmp/t.jpg");
    }

    #[test]
    fn zero_and_negative_sender_ids_are_ignored() {
        let node = NodeData {
            user_id: Some(NumOrStr::Num(-5)),
            time: Some(NumOrStr::Str("0".to_string())),
            name: Some("  ".to_string()),
            nickname: Some("Nick".to_string()),
            ..Default::default()
        };
        assert_eq!(node.sender_id(), None);
        assert_eq!(node.timestamp(), None);
        // An explicit but blank name does not fall through to nickname.
        assert_eq!(node.sender_name(), None);
    }
}
