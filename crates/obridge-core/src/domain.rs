use serde::{Deserialize, Serialize};

/// Conversation topology of a peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    Direct,
    Group,
}

impl ChatKind {
    pub fn is_group(self) -> bool {
        self == ChatKind::Group
    }
}

/// Addressable conversation target (direct or group).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peer {
    pub chat_kind: ChatKind,
    pub peer_id: String,
    #[serde(default)]
    pub guild_id: String,
}

impl Peer {
    pub fn direct(peer_id: impl Into<String>) -> Self {
        Self {
            chat_kind: ChatKind::Direct,
            peer_id: peer_id.into(),
            guild_id: String::new(),
        }
    }

    pub fn group(peer_id: impl Into<String>) -> Self {
        Self {
            chat_kind: ChatKind::Group,
            peer_id: peer_id.into(),
            guild_id: String::new(),
        }
    }

    pub fn is_group(&self) -> bool {
        self.chat_kind.is_group()
    }
}

/// Small integer alias handed to protocol clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShortId(pub i32);

impl std::fmt::Display for ShortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A resolved reference to one message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub short_id: Option<ShortId>,
    pub long_id: String,
    pub peer: Peer,
}

/// Raw message record as returned by the backing message store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub long_id: String,
    pub chat_kind: ChatKind,
    pub peer_id: String,
    #[serde(default)]
    pub content: serde_json::Value,
}

impl RawMessage {
    pub fn peer(&self) -> Peer {
        Peer {
            chat_kind: self.chat_kind,
            peer_id: self.peer_id.clone(),
            guild_id: String::new(),
        }
    }
}

/// The account the bridge composes messages as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelfIdentity {
    pub uin: u64,
    pub uid: String,
    pub nick: String,
}
