//! Custom error types for the mdict-core crate.

use thiserror::Error;

/// The primary error type for all operations in this crate.
///
/// Absent keys are not errors: lookup-family APIs report them through
/// `Ok(None)` or an empty collection.
#[derive(Debug, Error)]
pub enum MdictError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The container version is unsupported (3.0+).
    #[error("Unsupported MDict version: {0}. Only v1.x and v2.x are supported.")]
    UnsupportedVersion(f32),

    /// A checksum validation failed, indicating data corruption.
    #[error("Checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// Key-info decryption produced a block that fails its checksum or
    /// cannot be decompressed.
    #[error("Decryption failed: {0}")]
    Crypto(String),

    /// A block body could not be decompressed.
    #[error("Decompression failed: {0}")]
    Decompression(String),

    /// Bytes cannot be decoded under the declared text encoding.
    #[error("Text decoding failed: {0}")]
    Encoding(String),

    /// A declared count of items does not match the number actually found.
    #[error("Count mismatch for {item_type}: expected {expected}, but found {found}")]
    CountMismatch {
        item_type: &'static str,
        expected: u64,
        found: u64,
    },

    /// A buffer or data block has an unexpected size after an operation.
    #[error("Size mismatch for {context}: expected {expected} bytes, but found {found} bytes")]
    SizeMismatch {
        context: &'static str,
        expected: u64,
        found: u64,
    },

    /// The file is structurally invalid for the MDX/MDD container layout.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// An API was called in the wrong lifecycle state.
    #[error("Operation requires an initialized reader, but the handle is {0}")]
    State(&'static str),
}

/// A convenience `Result` type alias using the crate's `MdictError` type.
pub type Result<T> = std::result::Result<T, MdictError>;
