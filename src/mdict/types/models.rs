//! Core data structures for the MDX/MDD container.

use std::path::Path;

use encoding_rs::Encoding;

use super::error::{MdictError, Result};

/// Encryption flags parsed from the `Encrypted` header attribute.
///
/// - Bit 0x01: record blocks are encrypted (reserved, rejected at init)
/// - Bit 0x02: the key-block-info table is encrypted
#[derive(Debug, Default, Clone, Copy)]
pub struct EncryptionFlags {
    pub record_blocks: bool,
    pub key_info: bool,
}

/// Parsed file header.
///
/// Built exactly once during `init()` and never mutated afterwards.
#[derive(Debug)]
pub struct MdictHeader {
    pub version: MdictVersion,
    /// The raw `GeneratedByEngineVersion` attribute value.
    pub engine_version: String,
    pub encryption: EncryptionFlags,
    pub encoding: &'static Encoding,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Raw `StyleSheet` attribute; interpreting it is a rendering concern.
    pub stylesheet: Option<String>,
    pub register_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MdictVersion {
    V1,
    V2,
}

impl MdictVersion {
    /// Byte width of count and size fields for this wire version.
    pub fn number_width(&self) -> usize {
        match self {
            MdictVersion::V1 => 4,
            MdictVersion::V2 => 8,
        }
    }

    /// Byte width of the key-size fields inside the key-block-info table.
    pub fn small_number_width(&self) -> usize {
        match self {
            MdictVersion::V1 => 1,
            MdictVersion::V2 => 2,
        }
    }
}

impl TryFrom<f32> for MdictVersion {
    type Error = MdictError;
    fn try_from(v: f32) -> Result<Self> {
        if v < 2.0 {
            Ok(Self::V1)
        } else if v < 3.0 {
            Ok(Self::V2)
        } else {
            Err(MdictError::UnsupportedVersion(v))
        }
    }
}

/// MDX (textual definitions) vs MDD (binary resources).
///
/// The container itself carries no marker; the distinction comes from the
/// filename suffix at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictKind {
    Mdx,
    Mdd,
}

impl DictKind {
    pub fn from_path(path: &Path) -> Self {
        let is_mdd = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("mdd"))
            .unwrap_or(false);
        if is_mdd { Self::Mdd } else { Self::Mdx }
    }
}

impl std::fmt::Display for DictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DictKind::Mdx => write!(f, "MDX"),
            DictKind::Mdd => write!(f, "MDD"),
        }
    }
}

/// Metadata for one key block, taken from the key-block-info table.
///
/// The prefix sums are exclusive (sizes of all prior blocks), so block `b`
/// starts `comp_prefix_sum` bytes into the key-block region.
#[derive(Debug, Clone)]
pub struct KeyBlockInfoEntry {
    pub first_key: String,
    pub last_key: String,
    pub entry_count: u64,
    pub comp_size: u64,
    pub decomp_size: u64,
    pub comp_prefix_sum: u64,
    pub decomp_prefix_sum: u64,
}

/// A headword and the start of its record in the virtual concatenated
/// decompressed record stream. Offsets are non-decreasing across the whole
/// dictionary; several keys may share one offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    pub record_offset: u64,
    pub key_text: String,
}

/// Metadata for one record block.
#[derive(Debug, Clone, Copy)]
pub struct RecordBlockInfoEntry {
    pub comp_size: u64,
    pub decomp_size: u64,
    /// Absolute file offset of this block's compressed data.
    pub file_offset: u64,
    /// Offset of this block in the virtual decompressed record stream.
    pub decomp_prefix_sum: u64,
}

/// Compression codec selected per block by the leading 4-byte marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    None,
    Lzo,
    Zlib,
}

impl TryFrom<u32> for CompressionType {
    type Error = MdictError;
    fn try_from(marker: u32) -> Result<Self> {
        match marker {
            0 => Ok(Self::None),
            1 => Ok(Self::Lzo),
            2 => Ok(Self::Zlib),
            _ => Err(MdictError::InvalidFormat(format!(
                "unsupported compression marker: {:#010x}",
                marker
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_gates() {
        assert_eq!(MdictVersion::try_from(1.2).unwrap(), MdictVersion::V1);
        assert_eq!(MdictVersion::try_from(2.0).unwrap(), MdictVersion::V2);
        assert!(matches!(
            MdictVersion::try_from(3.0),
            Err(MdictError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn kind_from_suffix() {
        assert_eq!(DictKind::from_path(Path::new("a/dict.mdx")), DictKind::Mdx);
        assert_eq!(DictKind::from_path(Path::new("a/dict.MDD")), DictKind::Mdd);
        assert_eq!(DictKind::from_path(Path::new("noext")), DictKind::Mdx);
    }
}
