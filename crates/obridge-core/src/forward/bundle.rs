//! Composed forward bundles and their wire encoding.

use prost::Message;

use crate::{
    forward::{element::Element, proto},
    Result,
};

/// Name of the blob holding a bundle's own root rows.
pub const ROOT_BLOB_NAME: &str = "MultiMsg";

/// Group code stamped on group-routed rows inside a forward.
const FORWARD_GROUP_CODE: u32 = 284_840_486;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteLabel {
    Group { card: String },
    Direct { friend_name: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Routing {
    pub from_uin: u64,
    pub label: RouteLabel,
}

impl Routing {
    pub fn new(from_uin: u64, name: &str, is_group: bool) -> Self {
        let label = if is_group {
            RouteLabel::Group {
                card: name.to_string(),
            }
        } else {
            RouteLabel::Direct {
                friend_name: name.to_string(),
            }
        };
        Self { from_uin, label }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.label, RouteLabel::Group { .. })
    }

    pub fn sender_name(&self) -> &str {
        match &self.label {
            RouteLabel::Group { card } => card,
            RouteLabel::Direct { friend_name } => friend_name,
        }
    }

    fn to_proto(&self) -> proto::RoutingHead {
        let mut head = proto::RoutingHead {
            from_uin: self.from_uin,
            ..Default::default()
        };
        match &self.label {
            RouteLabel::Group { card } => {
                head.group = Some(proto::GroupRouting {
                    group_code: FORWARD_GROUP_CODE,
                    group_card: card.clone(),
                });
            }
            RouteLabel::Direct { friend_name } => {
                head.c2c = Some(proto::C2cRouting {
                    friend_name: friend_name.clone(),
                });
            }
        }
        head
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentMeta {
    pub msg_type: u32,
    pub random: u32,
    pub seq: u32,
    pub time: u32,
}

impl ContentMeta {
    pub fn msg_type_for(is_group: bool) -> u32 {
        if is_group {
            82
        } else {
            9
        }
    }

    fn to_proto(self) -> proto::ContentHead {
        proto::ContentHead {
            msg_type: self.msg_type,
            random: self.random,
            msg_seq: self.seq,
            msg_time: self.time,
            pkg_num: 1,
            pkg_index: 0,
            div_seq: 0,
            forward: Some(proto::ForwardHead::default()),
        }
    }
}

/// Row payload. Direct files carry raw content next to (usually empty) elements.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RowBody {
    pub elements: Vec<Element>,
    pub raw_content: Option<Vec<u8>>,
}

/// One outgoing message envelope inside a bundle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultRow {
    pub routing: Routing,
    pub meta: ContentMeta,
    pub body: RowBody,
}

impl ResultRow {
    pub fn sender_name(&self) -> &str {
        self.routing.sender_name()
    }

    /// Concatenated text runs of the body.
    pub fn text(&self) -> String {
        self.body
            .elements
            .iter()
            .filter_map(Element::as_text)
            .collect()
    }

    pub fn to_proto(&self) -> Result<proto::PushMsgBody> {
        let elems = self
            .body
            .elements
            .iter()
            .map(Element::to_proto)
            .collect::<Result<Vec<_>>>()?;
        Ok(proto::PushMsgBody {
            routing_head: Some(self.routing.to_proto()),
            content_head: Some(self.meta.to_proto()),
            body: Some(proto::MessageBody {
                rich_text: Some(proto::RichText { elems }),
                msg_content: self.body.raw_content.clone(),
            }),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedBlob {
    pub name: String,
    pub rows: Vec<ResultRow>,
}

impl NamedBlob {
    pub fn to_proto(&self) -> Result<proto::MultiMsgItem> {
        let msg = self
            .rows
            .iter()
            .map(ResultRow::to_proto)
            .collect::<Result<Vec<_>>>()?;
        Ok(proto::MultiMsgItem {
            file_name: self.name.clone(),
            buffer: Some(proto::MultiMsgNew { msg }),
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.to_proto()?.encode_to_vec())
    }
}

/// Encodes a blob list into the single transmit payload uploaders hand to the backend.
pub fn encode_blobs(blobs: &[NamedBlob]) -> Result<Vec<u8>> {
    let items = blobs
        .iter()
        .map(NamedBlob::to_proto)
        .collect::<Result<Vec<_>>>()?;
    Ok(proto::MultiMsgTransmit { items }.encode_to_vec())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bundle {
    pub named_blobs: Vec<NamedBlob>,
    pub total_count: usize,
    pub preview_lines: Vec<String>,
    pub summary: String,
    pub source: String,
    pub prompt: String,
    pub uuid: String,
}

impl Bundle {
    /// Rows produced at this bundle's own level.
    pub fn root_rows(&self) -> &[ResultRow] {
        self.named_blobs
            .iter()
            .find(|b| b.name == ROOT_BLOB_NAME)
            .map(|b| b.rows.as_slice())
            .unwrap_or(&[])
    }

    pub fn blob_names(&self) -> Vec<&str> {
        self.named_blobs.iter().map(|b| b.name.as_str()).collect()
    }
}
