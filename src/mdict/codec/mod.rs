//! Codec layer: per-block decompression and the key-info stream cipher.

pub mod compression;
pub mod crypto;
