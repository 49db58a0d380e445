//! Protobuf shapes of the forward payload and the media envelopes it embeds.

#[derive(Clone, PartialEq, prost::Message)]
pub struct MultiMsgTransmit {
    #[prost(message, repeated, tag = "2")]
    pub items: Vec<MultiMsgItem>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MultiMsgItem {
    #[prost(string, tag = "1")]
    pub file_name: String,
    #[prost(message, optional, tag = "2")]
    pub buffer: Option<MultiMsgNew>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MultiMsgNew {
    #[prost(message, repeated, tag = "1")]
    pub msg: Vec<PushMsgBody>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PushMsgBody {
    #[prost(message, optional, tag = "1")]
    pub routing_head: Option<RoutingHead>,
    #[prost(message, optional, tag = "2")]
    pub content_head: Option<ContentHead>,
    #[prost(message, optional, tag = "3")]
    pub body: Option<MessageBody>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RoutingHead {
    #[prost(uint64, tag = "1")]
    pub from_uin: u64,
    #[prost(message, optional, tag = "7")]
    pub c2c: Option<C2cRouting>,
    #[prost(message, optional, tag = "8")]
    pub group: Option<GroupRouting>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct C2cRouting {
    #[prost(string, tag = "6")]
    pub friend_name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GroupRouting {
    #[prost(uint32, tag = "1")]
    pub group_code: u32,
    #[prost(string, tag = "4")]
    pub group_card: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ContentHead {
    #[prost(uint32, tag = "1")]
    pub msg_type: u32,
    #[prost(uint32, tag = "4")]
    pub random: u32,
    #[prost(uint32, tag = "5")]
    pub msg_seq: u32,
    #[prost(uint32, tag = "6")]
    pub msg_time: u32,
    #[prost(uint32, tag = "7")]
    pub pkg_num: u32,
    #[prost(uint32, tag = "8")]
    pub pkg_index: u32,
    #[prost(uint32, tag = "9")]
    pub div_seq: u32,
    #[prost(message, optional, tag = "15")]
    pub forward: Option<ForwardHead>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ForwardHead {
    #[prost(uint32, tag = "1")]
    pub field1: u32,
    #[prost(uint32, tag = "2")]
    pub field2: u32,
    #[prost(uint32, tag = "3")]
    pub field3: u32,
    #[prost(string, tag = "4")]
    pub field4: String,
    #[prost(string, tag = "5")]
    pub avatar: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MessageBody {
    #[prost(message, optional, tag = "1")]
    pub rich_text: Option<RichText>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub msg_content: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RichText {
    #[prost(message, repeated, tag = "2")]
    pub elems: Vec<Elem>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Elem {
    #[prost(message, optional, tag = "1")]
    pub text: Option<TextElem>,
    #[prost(message, optional, tag = "2")]
    pub face: Option<FaceElem>,
    #[prost(message, optional, tag = "5")]
    pub trans_elem_info: Option<TransElem>,
    #[prost(message, optional, tag = "51")]
    pub light_app: Option<LightAppElem>,
    #[prost(message, optional, tag = "53")]
    pub common_elem: Option<CommonElem>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TextElem {
    #[prost(string, tag = "1")]
    pub content: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FaceElem {
    #[prost(uint32, tag = "1")]
    pub index: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TransElem {
    #[prost(uint32, tag = "1")]
    pub elem_type: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub elem_value: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LightAppElem {
    #[prost(bytes = "vec", tag = "1")]
    pub data: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CommonElem {
    #[prost(uint32, tag = "1")]
    pub service_type: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub pb_elem: Vec<u8>,
    #[prost(uint32, tag = "3")]
    pub business_type: u32,
}

// ---- media envelopes ----

#[derive(Clone, PartialEq, prost::Message)]
pub struct MsgInfo {
    #[prost(message, repeated, tag = "1")]
    pub msg_info_body: Vec<MsgInfoBody>,
    #[prost(message, optional, tag = "2")]
    pub ext_biz_info: Option<ExtBizInfo>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MsgInfoBody {
    #[prost(message, optional, tag = "1")]
    pub index: Option<IndexNode>,
    #[prost(message, optional, tag = "2")]
    pub pic: Option<PictureInfo>,
    #[prost(bool, tag = "5")]
    pub file_exist: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct IndexNode {
    #[prost(message, optional, tag = "1")]
    pub info: Option<FileInfo>,
    #[prost(string, tag = "2")]
    pub file_uuid: String,
    #[prost(uint32, tag = "3")]
    pub store_id: u32,
    #[prost(uint32, tag = "4")]
    pub upload_time: u32,
    #[prost(uint32, tag = "5")]
    pub expire: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FileInfo {
    #[prost(uint64, tag = "1")]
    pub file_size: u64,
    #[prost(string, tag = "2")]
    pub md5_hex: String,
    #[prost(string, tag = "3")]
    pub sha1_hex: String,
    #[prost(string, tag = "4")]
    pub file_name: String,
    #[prost(message, optional, tag = "5")]
    pub file_type: Option<FileType>,
    #[prost(uint32, tag = "6")]
    pub width: u32,
    #[prost(uint32, tag = "7")]
    pub height: u32,
    #[prost(uint32, tag = "8")]
    pub time: u32,
    #[prost(uint32, tag = "9")]
    pub original: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FileType {
    #[prost(uint32, tag = "1")]
    pub r#type: u32,
    #[prost(uint32, tag = "2")]
    pub pic_format: u32,
    #[prost(uint32, tag = "3")]
    pub video_format: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PictureInfo {
    #[prost(string, tag = "1")]
    pub url_path: String,
    #[prost(message, optional, tag = "2")]
    pub ext: Option<PicUrlExt>,
    #[prost(string, tag = "3")]
    pub domain: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PicUrlExt {
    #[prost(string, tag = "1")]
    pub original_param: String,
    #[prost(string, tag = "2")]
    pub big_param: String,
    #[prost(string, tag = "3")]
    pub thumb_param: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ExtBizInfo {
    #[prost(message, optional, tag = "1")]
    pub pic: Option<PicExtBizInfo>,
    #[prost(uint32, tag = "10")]
    pub busi_type: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PicExtBizInfo {
    #[prost(uint32, tag = "1")]
    pub biz_type: u32,
    #[prost(string, tag = "2")]
    pub summary: String,
    #[prost(uint32, tag = "1001")]
    pub from_scene: u32,
    #[prost(uint32, tag = "1002")]
    pub to_scene: u32,
    #[prost(uint32, optional, tag = "1003")]
    pub old_file_id: Option<u32>,
}

// ---- file extras ----

#[derive(Clone, PartialEq, prost::Message)]
pub struct GroupFileExtra {
    #[prost(uint32, tag = "1")]
    pub field1: u32,
    #[prost(string, tag = "2")]
    pub file_name: String,
    #[prost(message, optional, tag = "7")]
    pub inner: Option<GroupFileExtraInner>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GroupFileExtraInner {
    #[prost(message, optional, tag = "2")]
    pub info: Option<GroupFileExtraInfo>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GroupFileExtraInfo {
    #[prost(uint32, tag = "1")]
    pub bus_id: u32,
    #[prost(string, tag = "2")]
    pub file_id: String,
    #[prost(uint64, tag = "3")]
    pub file_size: u64,
    #[prost(string, tag = "4")]
    pub file_name: String,
    #[prost(string, tag = "8")]
    pub file_md5: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FileExtra {
    #[prost(message, optional, tag = "1")]
    pub file: Option<NotOnlineFile>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct NotOnlineFile {
    #[prost(uint32, tag = "1")]
    pub file_type: u32,
    #[prost(string, tag = "3")]
    pub file_uuid: String,
    #[prost(string, tag = "4")]
    pub file_md5: String,
    #[prost(string, tag = "5")]
    pub file_name: String,
    #[prost(uint64, tag = "6")]
    pub file_size: u64,
    #[prost(uint32, tag = "10")]
    pub sub_cmd: u32,
    #[prost(uint32, tag = "11")]
    pub danger_level: u32,
    #[prost(uint32, tag = "14")]
    pub expire_time: u32,
    #[prost(string, optional, tag = "57")]
    pub file_id_crc_media: Option<String>,
}
