//! Key-block-info index parsing (C7).
//!
//! Fixed-layout section header at the key-block start offset:
//! ```text
//! v2.x: [u64 key_block_num][u64 entries_num][u64 kbi_decomp_size]
//!       [u64 kbi_size][u64 kb_size][u32 BE adler32 of the 40 bytes above]
//! v1.x: [u32 key_block_num][u32 entries_num][u32 kbi_size][u32 kb_size]
//! ```
//! followed by `kbi_size` bytes of table. The v2.x table is a compressed
//! block, optionally stream-encrypted; the v1.x table is raw.

use byteorder::{BigEndian, ByteOrder};
use log::{debug, info};

use crate::mdict::codec::{compression, crypto};
use crate::mdict::format::blocks;
use crate::mdict::io::DictFile;
use crate::mdict::text;
use crate::mdict::types::error::{MdictError, Result};
use crate::mdict::types::models::{KeyBlockInfoEntry, MdictHeader, MdictVersion};
use crate::mdict::utils;

/// The decoded key-block-info index.
#[derive(Debug)]
pub struct KeyIndex {
    pub entries: Vec<KeyBlockInfoEntry>,
    /// Total headword count promised by the section header.
    pub entries_num: u64,
    /// Total compressed size of the key-block region.
    pub key_blocks_size: u64,
    /// Absolute file offset of the first key block.
    pub key_blocks_offset: u64,
}

pub fn parse(
    file: &mut DictFile,
    header: &MdictHeader,
    key_block_start: u64,
) -> Result<KeyIndex> {
    info!("parsing key-block info section");

    if header.encryption.record_blocks {
        return Err(MdictError::Crypto(
            "record-block encryption is reserved and not supported".to_string(),
        ));
    }

    let width = header.version.number_width();
    let head_size = match header.version {
        MdictVersion::V1 => 4 * width,
        MdictVersion::V2 => 5 * width,
    };
    let head = file.read_at(key_block_start, head_size)?;
    let mut reader = head.as_slice();

    let key_block_num = utils::read_number(&mut reader, width)?;
    let entries_num = utils::read_number(&mut reader, width)?;
    let kbi_decomp_size = match header.version {
        MdictVersion::V1 => None,
        MdictVersion::V2 => Some(utils::read_number(&mut reader, width)?),
    };
    let kbi_size = utils::read_number(&mut reader, width)?;
    let key_blocks_size = utils::read_number(&mut reader, width)?;

    let mut table_offset = key_block_start + head_size as u64;
    if header.version == MdictVersion::V2 {
        let checksum_bytes = file.read_at(table_offset, 4)?;
        utils::verify_adler32(&head, BigEndian::read_u32(&checksum_bytes))?;
        table_offset += 4;
    }

    if table_offset + kbi_size + key_blocks_size > file.len() {
        return Err(MdictError::InvalidFormat(format!(
            "key section sizes exceed file size ({} + {} past offset {})",
            kbi_size,
            key_blocks_size,
            table_offset
        )));
    }

    debug!(
        "key-block info: {} blocks, {} entries, table {} bytes",
        key_block_num, entries_num, kbi_size
    );

    let raw_table = file.read_at(table_offset, kbi_size as usize)?;
    let table = match kbi_decomp_size {
        // v1.x stores the table raw, with no envelope.
        None => raw_table,
        Some(decomp_size) => decode_table(raw_table, decomp_size, header)?,
    };

    let entries = walk_table(&table, header, key_block_num, entries_num)?;

    info!("key index parsed: {} key blocks", entries.len());
    Ok(KeyIndex {
        entries,
        entries_num,
        key_blocks_size,
        key_blocks_offset: table_offset + kbi_size,
    })
}

/// Decode the v2.x table block: decrypt if flagged, decompress, verify.
///
/// When decryption ran, a failing checksum or a failing inflate means the
/// derived key did not match, so both are reported on the crypto path.
fn decode_table(mut raw: Vec<u8>, decomp_size: u64, header: &MdictHeader) -> Result<Vec<u8>> {
    if raw.len() < 8 {
        return Err(MdictError::InvalidFormat(
            "key-info table too short for its 8-byte envelope".to_string(),
        ));
    }
    let encrypted = header.encryption.key_info;
    if encrypted {
        debug!("decrypting key-block info table");
        let key = crypto::key_info_key(&raw);
        crypto::key_info_decrypt(&mut raw[8..], &key);
    }

    let (compression, checksum, body) = blocks::split_envelope(&raw)?;
    let decode = || -> Result<Vec<u8>> {
        let decompressed = compression::decompress(body, compression, decomp_size)?;
        utils::verify_adler32(&decompressed, checksum)?;
        Ok(decompressed)
    };

    match decode() {
        Ok(table) => Ok(table),
        Err(
            e @ (MdictError::ChecksumMismatch { .. }
            | MdictError::Decompression(_)
            | MdictError::SizeMismatch { .. }),
        ) if encrypted => Err(MdictError::Crypto(format!(
            "key-info table failed verification after decryption: {}",
            e
        ))),
        Err(e) => Err(e),
    }
}

/// Walk the decompressed table into dense info entries with running
/// exclusive prefix sums.
fn walk_table(
    table: &[u8],
    header: &MdictHeader,
    key_block_num: u64,
    entries_num: u64,
) -> Result<Vec<KeyBlockInfoEntry>> {
    let width = header.version.number_width();
    let mut reader = table;
    let mut entries = Vec::with_capacity(key_block_num as usize);
    let mut comp_acc = 0u64;
    let mut decomp_acc = 0u64;
    let mut total_entries = 0u64;

    while !reader.is_empty() {
        let entry_count = utils::read_number(&mut reader, width)?;
        let first_key = read_sized_key(&mut reader, header)?;
        let last_key = read_sized_key(&mut reader, header)?;
        let comp_size = utils::read_number(&mut reader, width)?;
        let decomp_size = utils::read_number(&mut reader, width)?;

        entries.push(KeyBlockInfoEntry {
            first_key,
            last_key,
            entry_count,
            comp_size,
            decomp_size,
            comp_prefix_sum: comp_acc,
            decomp_prefix_sum: decomp_acc,
        });
        comp_acc += comp_size;
        decomp_acc += decomp_size;
        total_entries += entry_count;
    }

    if entries.len() as u64 != key_block_num {
        return Err(MdictError::CountMismatch {
            item_type: "key blocks in info table",
            expected: key_block_num,
            found: entries.len() as u64,
        });
    }
    if total_entries != entries_num {
        return Err(MdictError::CountMismatch {
            item_type: "key entries in info table",
            expected: entries_num,
            found: total_entries,
        });
    }

    Ok(entries)
}

/// Read one size-prefixed, NUL-terminated key from the info table.
///
/// The size field counts code units of the active encoding (u16 for v2.x,
/// u8 for v1.x) and excludes the terminator.
fn read_sized_key(reader: &mut &[u8], header: &MdictHeader) -> Result<String> {
    let size_units =
        utils::read_small_number(reader, header.version.small_number_width())?;
    let unit = text::unit_width(header.encoding);
    let text_bytes = size_units as usize * unit;
    let total_bytes = text_bytes + unit;

    if reader.len() < total_bytes {
        return Err(MdictError::InvalidFormat(
            "truncated key text in key-block info table".to_string(),
        ));
    }

    let key = text::decode(&reader[..text_bytes], header.encoding)?;
    *reader = &reader[total_bytes..];
    Ok(key)
}
