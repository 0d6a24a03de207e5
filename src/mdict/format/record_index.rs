//! Record-block-info index parsing (C9).
//!
//! The record section begins immediately after the key blocks:
//! ```text
//! [record_block_num][entries_num][rb_info_size][rb_payload_size]
//! ```
//! in active width, then `rb_info_size` bytes of `(comp_size, decomp_size)`
//! pairs, then the record blocks themselves.

use log::{debug, info};

use crate::mdict::io::DictFile;
use crate::mdict::types::error::{MdictError, Result};
use crate::mdict::types::models::{MdictHeader, RecordBlockInfoEntry};
use crate::mdict::utils;

/// The decoded record-block-info index.
#[derive(Debug)]
pub struct RecordIndex {
    pub entries: Vec<RecordBlockInfoEntry>,
    /// Total entry count promised by the section header.
    pub entries_num: u64,
    /// Length of the whole decompressed record stream.
    pub total_decomp_size: u64,
}

pub fn parse(file: &mut DictFile, header: &MdictHeader, offset: u64) -> Result<RecordIndex> {
    info!("parsing record-block info section");

    let width = header.version.number_width();
    let head = file.read_at(offset, 4 * width)?;
    let mut reader = head.as_slice();

    let record_block_num = utils::read_number(&mut reader, width)?;
    let entries_num = utils::read_number(&mut reader, width)?;
    let rb_info_size = utils::read_number(&mut reader, width)?;
    let rb_payload_size = utils::read_number(&mut reader, width)?;

    // All four values are untrusted. The table size must agree with the
    // block count, and it must fit in the file, before any of it is read.
    let expected_info_size = (2 * width as u64)
        .checked_mul(record_block_num)
        .ok_or_else(|| {
            MdictError::InvalidFormat(format!(
                "record block count {} overflows the info table size",
                record_block_num
            ))
        })?;
    if rb_info_size != expected_info_size {
        return Err(MdictError::SizeMismatch {
            context: "record-block info table",
            expected: expected_info_size,
            found: rb_info_size,
        });
    }
    let table_offset = offset + 4 * width as u64;
    let table_end = table_offset.checked_add(rb_info_size);
    if table_end.map_or(true, |end| end > file.len()) {
        return Err(MdictError::InvalidFormat(format!(
            "record-block info table ({} bytes at offset {}) extends past end of file",
            rb_info_size, table_offset
        )));
    }

    debug!(
        "record-block info: {} blocks, {} entries, payload {} bytes",
        record_block_num, entries_num, rb_payload_size
    );

    let info = file.read_at(table_offset, rb_info_size as usize)?;
    let mut reader = info.as_slice();

    let mut entries = Vec::with_capacity(record_block_num as usize);
    let mut file_offset = table_offset + rb_info_size;
    let mut decomp_acc = 0u64;
    let mut comp_total = 0u64;

    while !reader.is_empty() {
        let comp_size = utils::read_number(&mut reader, width)?;
        let decomp_size = utils::read_number(&mut reader, width)?;
        entries.push(RecordBlockInfoEntry {
            comp_size,
            decomp_size,
            file_offset,
            decomp_prefix_sum: decomp_acc,
        });
        file_offset = checked_acc(file_offset, comp_size, "record block offsets")?;
        decomp_acc = checked_acc(decomp_acc, decomp_size, "record block sizes")?;
        comp_total += comp_size;
    }

    if comp_total != rb_payload_size {
        return Err(MdictError::SizeMismatch {
            context: "record-block payload region",
            expected: rb_payload_size,
            found: comp_total,
        });
    }
    if file_offset > file.len() {
        return Err(MdictError::InvalidFormat(format!(
            "record blocks extend past end of file ({} > {})",
            file_offset,
            file.len()
        )));
    }

    info!(
        "record index parsed: {} blocks, {} decompressed bytes",
        entries.len(),
        decomp_acc
    );
    Ok(RecordIndex {
        entries,
        entries_num,
        total_decomp_size: decomp_acc,
    })
}

fn checked_acc(acc: u64, size: u64, what: &'static str) -> Result<u64> {
    acc.checked_add(size)
        .ok_or_else(|| MdictError::InvalidFormat(format!("{} overflow a 64-bit sum", what)))
}
