//! File header parsing.
//!
//! Layout:
//! ```text
//! [4 bytes] header length (u32, little-endian)
//! [N bytes] XML metadata, UTF-16LE, one self-closing element
//! [4 bytes] adler32 of the XML bytes (u32, little-endian)
//! ```
//! These two framing fields are the only little-endian fields in the
//! container; everything after the header is big-endian.

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};
use encoding_rs::UTF_16LE;
use log::{debug, info};
use quick_xml::{events::Event, Reader};

use crate::mdict::io::DictFile;
use crate::mdict::text;
use crate::mdict::types::error::{MdictError, Result};
use crate::mdict::types::models::{DictKind, EncryptionFlags, MdictHeader, MdictVersion};
use crate::mdict::utils;

/// Parse the header at the start of the file.
///
/// Returns the header plus the absolute offset of the key-block section
/// (`4 + header_len + 4`).
pub fn parse(file: &mut DictFile, kind: DictKind) -> Result<(MdictHeader, u64)> {
    let len_bytes = file.read_at(0, 4)?;
    let header_len = LittleEndian::read_u32(&len_bytes) as u64;

    let key_block_start = 4 + header_len + 4;
    if key_block_start > file.len() {
        return Err(MdictError::InvalidFormat(format!(
            "header length {} exceeds file size {}",
            header_len,
            file.len()
        )));
    }

    let header_bytes = file.read_at(4, header_len as usize)?;
    let checksum_bytes = file.read_at(4 + header_len, 4)?;
    let checksum_expected = LittleEndian::read_u32(&checksum_bytes);
    utils::verify_adler32(&header_bytes, checksum_expected)?;

    // The header text itself is always UTF-16LE, regardless of the
    // dictionary's declared encoding. Some files carry a trailing
    // double-NUL terminator.
    let trimmed = if header_bytes.ends_with(&[0, 0]) {
        &header_bytes[..header_bytes.len() - 2]
    } else {
        &header_bytes[..]
    };
    let (decoded, _, _) = UTF_16LE.decode(trimmed);

    // Some files contain stray control characters inside the XML.
    let sanitized: String = decoded
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect();

    let attrs = parse_xml_attributes(&sanitized)?;
    let header = build_header(&attrs, kind)?;

    info!(
        "header parsed: version={}, encoding={}, encrypted=(records={}, key_info={})",
        header.engine_version,
        header.encoding.name(),
        header.encryption.record_blocks,
        header.encryption.key_info
    );

    Ok((header, key_block_start))
}

/// Extract all attributes from the root XML element.
///
/// The header is a single element whose attributes are the metadata tags;
/// values may contain entity references, which quick-xml unescapes.
fn parse_xml_attributes(xml: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return e
                    .attributes()
                    .map(|attr_result| {
                        let attr = attr_result.map_err(|e| {
                            MdictError::InvalidFormat(format!("bad XML attribute in header: {}", e))
                        })?;
                        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                        let value = attr
                            .unescape_value()
                            .map_err(|e| {
                                MdictError::InvalidFormat(format!(
                                    "bad XML attribute value in header: {}",
                                    e
                                ))
                            })?
                            .into_owned();
                        Ok((key, value))
                    })
                    .collect();
            }
            Ok(Event::Eof) => {
                return Err(MdictError::InvalidFormat(
                    "no root element found in header XML".to_string(),
                ))
            }
            Err(e) => {
                return Err(MdictError::InvalidFormat(format!(
                    "failed to read header XML: {}",
                    e
                )))
            }
            _ => {}
        }
    }
}

fn build_header(attrs: &HashMap<String, String>, kind: DictKind) -> Result<MdictHeader> {
    let engine_version = attrs
        .get("GeneratedByEngineVersion")
        .cloned()
        .ok_or_else(|| {
            MdictError::InvalidFormat("header is missing GeneratedByEngineVersion".to_string())
        })?;
    let version_f32: f32 = engine_version.trim().parse().map_err(|e| {
        MdictError::InvalidFormat(format!("bad GeneratedByEngineVersion: {}", e))
    })?;
    let version = MdictVersion::try_from(version_f32)?;
    debug!("engine version {} parsed as {:?}", engine_version, version);

    // Empty or missing Encoding falls back per file kind: UTF-16LE for MDX
    // headwords, UTF-8 for MDD resource names.
    let encoding = match attrs.get("Encoding").map(String::as_str) {
        None | Some("") => match kind {
            DictKind::Mdx => encoding_rs::UTF_16LE,
            DictKind::Mdd => encoding_rs::UTF_8,
        },
        Some(label) => text::parse_encoding(label).ok_or_else(|| {
            MdictError::InvalidFormat(format!("unknown Encoding label: {:?}", label))
        })?,
    };

    let encryption = attrs
        .get("Encrypted")
        .and_then(|s| s.parse::<u8>().ok())
        .map(|flags| EncryptionFlags {
            record_blocks: (flags & 0x01) != 0,
            key_info: (flags & 0x02) != 0,
        })
        .unwrap_or_default();

    Ok(MdictHeader {
        version,
        engine_version,
        encryption,
        encoding,
        title: attrs.get("Title").cloned(),
        description: attrs.get("Description").cloned(),
        stylesheet: attrs.get("StyleSheet").cloned(),
        register_by: attrs.get("RegisterBy").cloned(),
    })
}
