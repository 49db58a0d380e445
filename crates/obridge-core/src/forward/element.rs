use std::io::Write;

use flate2::{write::ZlibEncoder, Compression};
use serde_json::json;

use crate::{forward::proto, Result};

pub const CARD_DEFAULT_SOURCE: &str = "Chat history";
pub const CARD_DEFAULT_SUMMARY: &str = "View forwarded messages";
pub const CARD_DEFAULT_PROMPT: &str = "[Chat history]";

/// "Tap to view N forwarded messages": a pointer to an uploaded sub-bundle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForwardCard {
    pub resid: String,
    pub uuid: String,
    pub source: String,
    pub summary: String,
    pub prompt: String,
    pub news: Vec<String>,
}

impl ForwardCard {
    /// Card JSON as the client app renders it.
    pub fn to_json(&self) -> serde_json::Value {
        let news = if self.news.is_empty() {
            vec![json!({ "text": CARD_DEFAULT_SUMMARY })]
        } else {
            self.news.iter().map(|t| json!({ "text": t })).collect()
        };
        json!({
            "app": "com.tencent.multimsg",
            "config": {
                "autosize": 1,
                "forward": 1,
                "round": 1,
                "type": "normal",
                "width": 300
            },
            "desc": self.prompt,
            "extra": json!({ "filename": self.uuid, "tsum": 0 }).to_string(),
            "meta": {
                "detail": {
                    "news": news,
                    "resid": self.resid,
                    "source": self.source,
                    "summary": self.summary,
                    "uniseq": self.uuid
                }
            },
            "prompt": self.prompt,
            "ver": "0.0.0.5",
            "view": "contact"
        })
    }

    /// `0x01` followed by the zlib-deflated card JSON.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let content = serde_json::to_vec(&self.to_json())?;
        let mut enc = ZlibEncoder::new(vec![1u8], Compression::default());
        enc.write_all(&content)?;
        Ok(enc.finish()?)
    }
}

/// One payload unit inside a row body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Element {
    Text(String),
    Face(u32),
    /// Rich media envelope (pictures, videos).
    Common {
        service_type: u32,
        business_type: u32,
        pb_elem: Vec<u8>,
    },
    /// Transparent element, used for group files.
    Trans { elem_type: u32, value: Vec<u8> },
    ForwardCard(ForwardCard),
}

impl Element {
    pub fn to_proto(&self) -> Result<proto::Elem> {
        let mut elem = proto::Elem::default();
        match self {
            Element::Text(s) => {
                elem.text = Some(proto::TextElem { content: s.clone() });
            }
            Element::Face(index) => {
                elem.face = Some(proto::FaceElem { index: *index });
            }
            Element::Common {
                service_type,
                business_type,
                pb_elem,
            } => {
                elem.common_elem = Some(proto::CommonElem {
                    service_type: *service_type,
                    pb_elem: pb_elem.clone(),
                    business_type: *business_type,
                });
            }
            Element::Trans { elem_type, value } => {
                elem.trans_elem_info = Some(proto::TransElem {
                    elem_type: *elem_type,
                    elem_value: value.clone(),
                });
            }
            Element::ForwardCard(card) => {
                elem.light_app = Some(proto::LightAppElem {
                    data: card.encode()?,
                });
            }
        }
        Ok(elem)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Element::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_forward_card(&self) -> Option<&ForwardCard> {
        match self {
            Element::ForwardCard(c) => Some(c),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    fn card() -> ForwardCard {
        ForwardCard {
            resid: "res-42".to_string(),
            uuid: "u-1".to_string(),
            source: "Group chat history".to_string(),
            summary: "View 2 forwarded messages".to_string(),
            prompt: CARD_DEFAULT_PROMPT.to_string(),
            news: vec!["Alice: hello".to_string()],
        }
    }

    #[test]
    fn card_encoding_is_prefixed_zlib_json() {
        let bytes = card().encode().unwrap();
        assert_eq!(bytes[0], 1);

        let mut out = String::new();
        ZlibDecoder::new(&bytes[1..])
            .read_to_string(&mut out)
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["app"], "com.tencent.multimsg");
        assert_eq!(v["meta"]["detail"]["resid"], "res-42");
        assert_eq!(v["meta"]["detail"]["uniseq"], "u-1");
        assert_eq!(v["meta"]["detail"]["news"][0]["text"], "Alice: hello");
        let extra: serde_json::Value =
            serde_json::from_str(v["extra"].as_str().unwrap()).unwrap();
        assert_eq!(extra["filename"], "u-1");
    }

    #[test]
    fn empty_news_falls_back_to_summary_line() {
        let mut c = card();
        c.news.clear();
        assert_eq!(
            c.to_json()["meta"]["detail"]["news"][0]["text"],
            CARD_DEFAULT_SUMMARY
        );
    }

    #[test]
    fn elements_map_to_distinct_proto_fields() {
        let text = Element::Text("hi".to_string()).to_proto().unwrap();
        assert_eq!(text.text.unwrap().content, "hi");

        let face = Element::Face(14).to_proto().unwrap();
        assert_eq!(face.face.unwrap().index, 14);

        let fwd = Element::ForwardCard(card()).to_proto().unwrap();
        assert!(fwd.light_app.is_some());
        assert!(fwd.text.is_none());
    }
}
