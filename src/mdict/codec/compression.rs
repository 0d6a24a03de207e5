//! Decompression for MDX/MDD data blocks.
//!
//! Three codecs occur in the wild, selected per block by a 4-byte marker:
//! stored (0), LZO1X (1), and zlib/RFC 1950 (2). The container records the
//! decompressed size of every block, so each path is held to the size it
//! was promised.

use std::io::Read;

use flate2::read::ZlibDecoder;
use log::trace;
use lzokay::decompress::decompress as lzo1x_decompress;

use crate::mdict::types::error::{MdictError, Result};
use crate::mdict::types::models::CompressionType;

/// Decompress a block body using the codec named by its marker.
pub fn decompress(body: &[u8], codec: CompressionType, expected_size: u64) -> Result<Vec<u8>> {
    trace!(
        "{:?} block body: {} -> {} bytes",
        codec,
        body.len(),
        expected_size
    );
    match codec {
        CompressionType::None => copy_stored(body, expected_size),
        CompressionType::Lzo => inflate_lzo1x(body, expected_size),
        CompressionType::Zlib => inflate_zlib(body, expected_size),
    }
}

/// A stored body must already have the promised length.
fn copy_stored(body: &[u8], expected_size: u64) -> Result<Vec<u8>> {
    if body.len() as u64 != expected_size {
        return Err(size_mismatch(expected_size, body.len()));
    }
    Ok(body.to_vec())
}

/// lzokay fills a caller-sized buffer and reports how much of it was
/// written; anything short of the promised size is a hard error.
fn inflate_lzo1x(body: &[u8], expected_size: u64) -> Result<Vec<u8>> {
    let mut out = vec![0u8; expected_size as usize];
    let written = lzo1x_decompress(body, &mut out)
        .map_err(|e| MdictError::Decompression(format!("LZO1X stream is invalid: {}", e)))?;
    if written as u64 != expected_size {
        return Err(size_mismatch(expected_size, written));
    }
    Ok(out)
}

/// The inflate read is capped one byte past the promised size, so an
/// overlong stream surfaces as a size mismatch instead of growing the
/// buffer unbounded.
fn inflate_zlib(body: &[u8], expected_size: u64) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_size as usize);
    ZlibDecoder::new(body)
        .take(expected_size.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| MdictError::Decompression(format!("zlib stream is invalid: {}", e)))?;
    if out.len() as u64 != expected_size {
        return Err(size_mismatch(expected_size, out.len()));
    }
    Ok(out)
}

fn size_mismatch(expected: u64, found: usize) -> MdictError {
    MdictError::SizeMismatch {
        context: "decompressed block",
        expected,
        found: found as u64,
    }
}
