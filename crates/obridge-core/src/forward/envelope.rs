//! Kind- and topology-specific envelopes for uploaded media.

use prost::Message;

use crate::{
    forward::{element::Element, proto},
    ports::MediaDescriptor,
    Error, Result,
};

const RICH_MEDIA_SERVICE: u32 = 48;
const GROUP_FILE_ELEM_TYPE: u32 = 24;
const GROUP_FILE_BUS_ID: u32 = 102;
const DIRECT_FILE_TTL_SECS: u32 = 7 * 24 * 60 * 60;
const PIC_DOMAIN: &str = "multimedia.nt.qq.com.cn";

fn file_info(desc: &MediaDescriptor, file_type: proto::FileType, time: u32) -> proto::FileInfo {
    proto::FileInfo {
        file_size: desc.size,
        md5_hex: desc.checksum.clone(),
        sha1_hex: desc.sha.clone(),
        file_name: desc.file_name.clone(),
        file_type: Some(file_type),
        width: desc.width,
        height: desc.height,
        time,
        original: 1,
    }
}

pub fn image(desc: &MediaDescriptor, busi_type: u32, is_group: bool) -> Element {
    let scene = if is_group { 2 } else { 1 };
    let info = proto::MsgInfo {
        msg_info_body: vec![proto::MsgInfoBody {
            index: Some(proto::IndexNode {
                info: Some(file_info(
                    desc,
                    proto::FileType {
                        r#type: 1,
                        pic_format: if desc.animated { 2000 } else { 1000 },
                        video_format: 0,
                    },
                    0,
                )),
                file_uuid: desc.remote_id.clone(),
                store_id: 1,
                upload_time: 0,
                expire: if is_group { 2_678_400 } else { 157_680_000 },
            }),
            pic: Some(proto::PictureInfo {
                url_path: format!(
                    "/download?appid={}&fileid={}",
                    if is_group { 1407 } else { 1406 },
                    desc.remote_id
                ),
                ext: Some(proto::PicUrlExt {
                    original_param: "&spec=0".to_string(),
                    big_param: "&spec=720".to_string(),
                    thumb_param: "&spec=198".to_string(),
                }),
                domain: PIC_DOMAIN.to_string(),
            }),
            file_exist: true,
        }],
        ext_biz_info: Some(proto::ExtBizInfo {
            pic: Some(proto::PicExtBizInfo {
                biz_type: 0,
                summary: String::new(),
                from_scene: scene,
                to_scene: scene,
                old_file_id: is_group.then_some(574_859_779),
            }),
            busi_type,
        }),
    };
    Element::Common {
        service_type: RICH_MEDIA_SERVICE,
        business_type: if is_group { 20 } else { 10 },
        pb_elem: info.encode_to_vec(),
    }
}

pub fn video(desc: &MediaDescriptor, is_group: bool) -> Element {
    let mut bodies = vec![proto::MsgInfoBody {
        index: Some(proto::IndexNode {
            info: Some(file_info(
                desc,
                proto::FileType {
                    r#type: 2,
                    pic_format: 0,
                    video_format: 0,
                },
                desc.duration_secs,
            )),
            file_uuid: desc.remote_id.clone(),
            store_id: 1,
            upload_time: 0,
            expire: 0,
        }),
        pic: None,
        file_exist: true,
    }];
    if let Some(thumb) = &desc.thumb {
        bodies.push(proto::MsgInfoBody {
            index: Some(proto::IndexNode {
                info: Some(proto::FileInfo {
                    file_size: thumb.size,
                    md5_hex: thumb.checksum.clone(),
                    sha1_hex: String::new(),
                    file_name: format!("{}.jpg", thumb.checksum),
                    file_type: Some(proto::FileType {
                        r#type: 1,
                        pic_format: 0,
                        video_format: 0,
                    }),
                    width: thumb.width,
                    height: thumb.height,
                    time: 0,
                    original: 0,
                }),
                file_uuid: thumb.remote_id.clone(),
                store_id: 1,
                upload_time: 0,
                expire: 0,
            }),
            pic: None,
            file_exist: true,
        });
    }
    let info = proto::MsgInfo {
        msg_info_body: bodies,
        ext_biz_info: Some(proto::ExtBizInfo {
            pic: None,
            busi_type: 0,
        }),
    };
    Element::Common {
        service_type: RICH_MEDIA_SERVICE,
        business_type: if is_group { 21 } else { 11 },
        pb_elem: info.encode_to_vec(),
    }
}

/// Group files travel as a transparent element: `0x01`, big-endian u16 length, extra.
pub fn group_file(desc: &MediaDescriptor, file_name: &str) -> Result<Element> {
    let extra = proto::GroupFileExtra {
        field1: 6,
        file_name: file_name.to_string(),
        inner: Some(proto::GroupFileExtraInner {
            info: Some(proto::GroupFileExtraInfo {
                bus_id: GROUP_FILE_BUS_ID,
                file_id: desc.remote_id.clone(),
                file_size: desc.size,
                file_name: file_name.to_string(),
                file_md5: desc.checksum.clone(),
            }),
        }),
    }
    .encode_to_vec();
    let len = u16::try_from(extra.len()).map_err(|_| {
        Error::InvalidSegment(format!("file descriptor too large: {} bytes", extra.len()))
    })?;

    let mut value = Vec::with_capacity(extra.len() + 3);
    value.push(0x01);
    value.extend_from_slice(&len.to_be_bytes());
    value.extend_from_slice(&extra);
    Ok(Element::Trans {
        elem_type: GROUP_FILE_ELEM_TYPE,
        value,
    })
}

/// Direct files replace the row body with raw content. `now` is unix seconds.
pub fn direct_file(desc: &MediaDescriptor, file_name: &str, now: u32) -> Vec<u8> {
    proto::FileExtra {
        file: Some(proto::NotOnlineFile {
            file_type: 0,
            file_uuid: desc.remote_id.clone(),
            file_md5: desc.checksum.clone(),
            file_name: file_name.to_string(),
            file_size: desc.size,
            sub_cmd: 1,
            danger_level: 0,
            expire_time: now.saturating_add(DIRECT_FILE_TTL_SECS),
            file_id_crc_media: desc.file_crc.clone(),
        }),
    }
    .encode_to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ThumbDescriptor;

    fn desc() -> MediaDescriptor {
        MediaDescriptor {
            remote_id: "fid-1".to_string(),
            checksum: "abcd".to_string(),
            sha: "ef01".to_string(),
            size: 12,
            file_name: "a.png".to_string(),
            width: 64,
            height: 32,
            ..Default::default()
        }
    }

    fn decode_common(el: &Element) -> (u32, proto::MsgInfo) {
        let Element::Common {
            business_type,
            pb_elem,
            ..
        } = el
        else {
            panic!("expected common element");
        };
        (*business_type, proto::MsgInfo::decode(pb_elem.as_slice()).unwrap())
    }

    #[test]
    fn image_envelope_depends_on_topology() {
        let (biz, info) = decode_common(&image(&desc(), 0, true));
        assert_eq!(biz, 20);
        let body = &info.msg_info_body[0];
        assert_eq!(body.index.as_ref().unwrap().expire, 2_678_400);
        assert!(body.pic.as_ref().unwrap().url_path.contains("appid=1407"));
        let pic = info.ext_biz_info.unwrap().pic.unwrap();
        assert_eq!(pic.old_file_id, Some(574_859_779));

        let (biz, info) = decode_common(&image(&desc(), 1, false));
        assert_eq!(biz, 10);
        assert_eq!(info.ext_biz_info.as_ref().unwrap().busi_type, 1);
        assert_eq!(info.ext_biz_info.unwrap().pic.unwrap().old_file_id, None);
    }

    #[test]
    fn animated_images_use_gif_format() {
        let mut d = desc();
        d.animated = true;
        let (_, info) = decode_common(&image(&d, 1, true));
        let ft = info.msg_info_body[0]
            .index
            .as_ref()
            .unwrap()
            .info
            .as_ref()
            .unwrap()
            .file_type
            .clone()
            .unwrap();
        assert_eq!(ft.pic_format, 2000);
    }

    #[test]
    fn video_envelope_carries_thumb_body() {
        let mut d = desc();
        d.duration_secs = 9;
        d.thumb = Some(ThumbDescriptor {
            remote_id: "thumb-1".to_string(),
            checksum: "99".to_string(),
            size: 4,
            width: 10,
            height: 10,
        });
        let (biz, info) = decode_common(&video(&d, false));
        assert_eq!(biz, 11);
        assert_eq!(info.msg_info_body.len(), 2);
        assert_eq!(
            info.msg_info_body[1].index.as_ref().unwrap().file_uuid,
            "thumb-1"
        );
    }

    #[test]
    fn group_file_value_is_length_prefixed() {
        let Element::Trans { elem_type, value } = group_file(&desc(), "report.pdf").unwrap()
        else {
            panic!("expected trans element");
        };
        assert_eq!(elem_type, 24);
        assert_eq!(value[0], 0x01);
        let len = u16::from_be_bytes([value[1], value[2]]) as usize;
        assert_eq!(len, value.len() - 3);
        let extra = proto::GroupFileExtra::decode(&value[3..]).unwrap();
        assert_eq!(extra.file_name, "report.pdf");
        assert_eq!(extra.inner.unwrap().info.unwrap().bus_id, 102);
    }

    #[test]
    fn direct_file_expires_after_a_week() {
        let raw = direct_file(&desc(), "report.pdf", 1_000);
        let file = proto::FileExtra::decode(raw.as_slice())
            .unwrap()
            .file
            .unwrap();
        assert_eq!(file.expire_time, 1_000 + 604_800);
        assert_eq!(file.file_uuid, "fid-1");
    }
}
