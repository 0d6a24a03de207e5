//! Block envelope decoding and key-entry extraction.
//!
//! Every compressible block carries the same 8-byte envelope:
//! ```text
//! [4 bytes] compression marker (0 stored, 1 LZO1X, 2 zlib)
//! [4 bytes] adler32 of the DECOMPRESSED data (big-endian)
//! [rest]    block body
//! ```

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::trace;

use crate::mdict::codec::compression;
use crate::mdict::text;
use crate::mdict::types::error::{MdictError, Result};
use crate::mdict::types::models::{CompressionType, KeyEntry, MdictHeader};
use crate::mdict::utils;

/// Decode one raw block: parse the envelope, decompress, verify the
/// checksum against the decompressed bytes.
pub fn decode_block(raw: &[u8], expected_decomp_size: u64) -> Result<Vec<u8>> {
    let (compression, checksum, body) = split_envelope(raw)?;
    trace!(
        "decoding block: codec={:?}, {} -> {} bytes",
        compression,
        body.len(),
        expected_decomp_size
    );
    let decompressed = compression::decompress(body, compression, expected_decomp_size)?;
    utils::verify_adler32(&decompressed, checksum)?;
    Ok(decompressed)
}

/// Parse the 8-byte envelope of a block, yielding the codec, the stored
/// checksum, and the body slice.
pub fn split_envelope(raw: &[u8]) -> Result<(CompressionType, u32, &[u8])> {
    if raw.len() < 8 {
        return Err(MdictError::InvalidFormat(
            "block too short for its 8-byte envelope".to_string(),
        ));
    }
    let compression = CompressionType::try_from(LittleEndian::read_u32(&raw[0..4]))?;
    let checksum = BigEndian::read_u32(&raw[4..8]);
    Ok((compression, checksum, &raw[8..]))
}

/// Split a decompressed key block into its `(record_offset, key_text)`
/// entries. The buffer is consumed exactly; a trailing fragment is a
/// structural error surfaced by the terminator scan.
pub fn split_key_entries(data: &[u8], header: &MdictHeader) -> Result<Vec<KeyEntry>> {
    let width = header.version.number_width();
    let mut reader = data;
    let mut entries = Vec::new();

    while !reader.is_empty() {
        let record_offset = utils::read_number(&mut reader, width)?;
        let key_text = text::read_terminated(&mut reader, header.encoding)?;
        entries.push(KeyEntry {
            record_offset,
            key_text,
        });
    }

    Ok(entries)
}
