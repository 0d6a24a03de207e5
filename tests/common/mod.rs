//! Synthetic MDX/MDD fixture construction.
//!
//! Builds complete dictionary files in memory, mirroring the writer side of
//! the container layout: header framing, key-block-info table (optionally
//! encrypted), key blocks, and the record section. Tests drive the public
//! reader API against these files.

#![allow(dead_code)]

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use ripemd::{Digest, Ripemd128};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Stored,
    Lzo,
    Zlib,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEnc {
    Utf8,
    Utf16Le,
}

/// Shape of one synthetic dictionary.
pub struct DictSpec {
    pub engine_version: &'static str,
    /// Value of the `Encoding` header attribute; `None` omits it.
    pub encoding_attr: Option<&'static str>,
    /// How the builder encodes key and body text.
    pub text: TextEnc,
    pub is_mdd: bool,
    pub encrypt_key_info: bool,
    /// Overrides the `Encrypted` attribute, e.g. to write an encrypted
    /// table while declaring the file plain.
    pub declared_encrypted: Option<&'static str>,
    pub keys_per_block: usize,
    pub records_per_block: usize,
    /// Cycled over the key blocks in order.
    pub key_codecs: Vec<Codec>,
    pub record_codec: Codec,
}

impl Default for DictSpec {
    fn default() -> Self {
        Self {
            engine_version: "2.0",
            encoding_attr: Some("UTF-8"),
            text: TextEnc::Utf8,
            is_mdd: false,
            encrypt_key_info: false,
            declared_encrypted: None,
            keys_per_block: 64,
            records_per_block: 64,
            key_codecs: vec![Codec::Zlib],
            record_codec: Codec::Zlib,
        }
    }
}

/// A built dictionary image plus the byte ranges of its key blocks, so
/// corruption tests can flip bits in a chosen block.
pub struct Fixture {
    pub bytes: Vec<u8>,
    pub key_block_ranges: Vec<(usize, usize)>,
}

pub fn encode_text(enc: TextEnc, s: &str) -> Vec<u8> {
    match enc {
        TextEnc::Utf8 => s.as_bytes().to_vec(),
        TextEnc::Utf16Le => s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect(),
    }
}

fn code_units(enc: TextEnc, s: &str) -> usize {
    match enc {
        TextEnc::Utf8 => s.len(),
        TextEnc::Utf16Le => s.encode_utf16().count(),
    }
}

fn unit_width(enc: TextEnc) -> usize {
    match enc {
        TextEnc::Utf8 => 1,
        TextEnc::Utf16Le => 2,
    }
}

/// Entries for an MDX fixture: definition text encoded like the keys.
pub fn text_entries(enc: TextEnc, pairs: &[(&str, &str)]) -> Vec<(String, Vec<u8>)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), encode_text(enc, v)))
        .collect()
}

fn compress(codec: Codec, data: &[u8]) -> Vec<u8> {
    match codec {
        Codec::Stored => data.to_vec(),
        Codec::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data).unwrap();
            encoder.finish().unwrap()
        }
        Codec::Lzo => lzokay::compress::compress(data).unwrap(),
    }
}

/// Wrap a block body in the 8-byte marker/checksum envelope.
fn envelope(codec: Codec, data: &[u8]) -> Vec<u8> {
    let marker = match codec {
        Codec::Stored => 0u8,
        Codec::Lzo => 1,
        Codec::Zlib => 2,
    };
    let mut out = vec![marker, 0, 0, 0];
    out.extend_from_slice(&adler2::adler32_slice(data).to_be_bytes());
    out.extend_from_slice(&compress(codec, data));
    out
}

fn write_num(out: &mut Vec<u8>, width: usize, value: u64) {
    if width == 8 {
        out.extend_from_slice(&value.to_be_bytes());
    } else {
        out.extend_from_slice(&(value as u32).to_be_bytes());
    }
}

fn key_info_key(block: &[u8]) -> [u8; 16] {
    let mut hasher = Ripemd128::new();
    hasher.update(&block[4..8]);
    hasher.update(0x3695u32.to_le_bytes());
    hasher.finalize().into()
}

/// Inverse of the reader's key-info stream transform.
fn key_info_encrypt(data: &mut [u8], key: &[u8; 16]) {
    let mut prev = 0x36u8;
    for (i, byte) in data.iter_mut().enumerate() {
        let mixed = *byte ^ prev ^ (i as u8) ^ key[i % key.len()];
        *byte = mixed.rotate_left(4);
        prev = *byte;
    }
}

/// Assemble a complete dictionary image.
///
/// `entries` must be in key order; record offsets are assigned in entry
/// order. MDX bodies get a NUL terminator appended in the text encoding.
pub fn build(spec: &DictSpec, entries: &[(String, Vec<u8>)]) -> Fixture {
    let version: f32 = spec.engine_version.parse().unwrap();
    let v2 = version >= 2.0;
    let width = if v2 { 8 } else { 4 };
    let text_unit = unit_width(spec.text);

    // Record payloads and their offsets in the decompressed stream.
    let payloads: Vec<Vec<u8>> = entries
        .iter()
        .map(|(_, body)| {
            let mut payload = body.clone();
            if !spec.is_mdd {
                payload.extend(encode_text(spec.text, "\0"));
            }
            payload
        })
        .collect();
    let mut offsets = Vec::with_capacity(payloads.len());
    let mut acc = 0u64;
    for payload in &payloads {
        offsets.push(acc);
        acc += payload.len() as u64;
    }

    // Key blocks.
    struct KeyBlock {
        raw: Vec<u8>,
        decomp_len: usize,
        first: String,
        last: String,
        count: u64,
    }
    let indices: Vec<usize> = (0..entries.len()).collect();
    let mut key_blocks = Vec::new();
    for (block_idx, chunk) in indices.chunks(spec.keys_per_block).enumerate() {
        let codec = spec.key_codecs[block_idx % spec.key_codecs.len()];
        let mut data = Vec::new();
        for &i in chunk {
            write_num(&mut data, width, offsets[i]);
            data.extend(encode_text(spec.text, &entries[i].0));
            data.extend(std::iter::repeat(0u8).take(text_unit));
        }
        key_blocks.push(KeyBlock {
            raw: envelope(codec, &data),
            decomp_len: data.len(),
            first: entries[chunk[0]].0.clone(),
            last: entries[*chunk.last().unwrap()].0.clone(),
            count: chunk.len() as u64,
        });
    }

    // Key-block-info table.
    let mut table = Vec::new();
    for kb in &key_blocks {
        write_num(&mut table, width, kb.count);
        for key in [&kb.first, &kb.last] {
            let units = code_units(spec.text, key) as u64;
            if v2 {
                table.extend_from_slice(&(units as u16).to_be_bytes());
            } else {
                table.push(units as u8);
            }
            table.extend(encode_text(spec.text, key));
            table.extend(std::iter::repeat(0u8).take(text_unit));
        }
        write_num(&mut table, width, kb.raw.len() as u64);
        write_num(&mut table, width, kb.decomp_len as u64);
    }

    // v2.x wraps the table in a compressed block, v1.x stores it raw.
    let table_region = if v2 {
        let mut region = envelope(Codec::Zlib, &table);
        if spec.encrypt_key_info {
            let key = key_info_key(&region);
            key_info_encrypt(&mut region[8..], &key);
        }
        region
    } else {
        table.clone()
    };

    // Header.
    let encrypted_attr = spec
        .declared_encrypted
        .unwrap_or(if spec.encrypt_key_info { "2" } else { "0" });
    let mut xml = format!(
        r#"<Dictionary GeneratedByEngineVersion="{}" Encrypted="{}" Title="Test &amp; Sample" Description="synthetic fixture""#,
        spec.engine_version, encrypted_attr
    );
    if let Some(label) = spec.encoding_attr {
        xml.push_str(&format!(r#" Encoding="{}""#, label));
    }
    xml.push_str("/>");
    let xml_bytes: Vec<u8> = xml.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();

    let mut out = Vec::new();
    out.extend_from_slice(&(xml_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&xml_bytes);
    out.extend_from_slice(&adler2::adler32_slice(&xml_bytes).to_le_bytes());

    // Key section.
    let key_blocks_size: u64 = key_blocks.iter().map(|b| b.raw.len() as u64).sum();
    let mut section_head = Vec::new();
    write_num(&mut section_head, width, key_blocks.len() as u64);
    write_num(&mut section_head, width, entries.len() as u64);
    if v2 {
        write_num(&mut section_head, width, table.len() as u64);
    }
    write_num(&mut section_head, width, table_region.len() as u64);
    write_num(&mut section_head, width, key_blocks_size);
    out.extend_from_slice(&section_head);
    if v2 {
        out.extend_from_slice(&adler2::adler32_slice(&section_head).to_be_bytes());
    }
    out.extend_from_slice(&table_region);

    let mut key_block_ranges = Vec::with_capacity(key_blocks.len());
    for kb in &key_blocks {
        key_block_ranges.push((out.len(), out.len() + kb.raw.len()));
        out.extend_from_slice(&kb.raw);
    }

    // Record section.
    let mut record_blocks = Vec::new();
    for chunk in payloads.chunks(spec.records_per_block) {
        let data: Vec<u8> = chunk.concat();
        record_blocks.push((envelope(spec.record_codec, &data), data.len() as u64));
    }
    let record_payload_size: u64 = record_blocks.iter().map(|(raw, _)| raw.len() as u64).sum();
    write_num(&mut out, width, record_blocks.len() as u64);
    write_num(&mut out, width, entries.len() as u64);
    write_num(&mut out, width, (2 * width * record_blocks.len()) as u64);
    write_num(&mut out, width, record_payload_size);
    for (raw, decomp_len) in &record_blocks {
        write_num(&mut out, width, raw.len() as u64);
        write_num(&mut out, width, *decomp_len);
    }
    for (raw, _) in &record_blocks {
        out.extend_from_slice(raw);
    }

    Fixture {
        bytes: out,
        key_block_ranges,
    }
}

/// Write a fixture image under `dir` and return its path.
pub fn write_dict(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}
