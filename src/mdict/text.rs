//! Text decoding for key strings and record payloads.
//!
//! Key strings inside key blocks are NUL-terminated in the width of one
//! code unit (1 byte for 8-bit encodings, 2 bytes for UTF-16LE). Record
//! payloads are plain slices decoded in one shot.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE};

use super::types::error::{MdictError, Result};

/// Resolve an `Encoding` header label.
///
/// The legacy Chinese labels GBK and GB2312 are normalized to GB18030,
/// which supersets both.
pub fn parse_encoding(label: &str) -> Option<&'static Encoding> {
    let normalized = match label {
        "GBK" | "GB2312" => "GB18030",
        other => other,
    };
    Encoding::for_label(normalized.as_bytes())
}

/// Width in bytes of one code unit under `encoding`.
pub fn unit_width(encoding: &'static Encoding) -> usize {
    if encoding == UTF_16LE || encoding == UTF_16BE {
        2
    } else {
        1
    }
}

/// Decode `bytes` as text, failing on malformed input.
pub fn decode(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    if unit_width(encoding) == 2 && bytes.len() % 2 != 0 {
        return Err(MdictError::Encoding(format!(
            "UTF-16 text has odd byte length {}",
            bytes.len()
        )));
    }
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(MdictError::Encoding(format!(
            "invalid {} byte sequence",
            encoding.name()
        )));
    }
    Ok(text.into_owned())
}

/// Read a NUL-terminated string from a byte slice and advance the slice
/// past the terminator.
pub fn read_terminated(reader: &mut &[u8], encoding: &'static Encoding) -> Result<String> {
    let width = unit_width(encoding);
    let end_pos = if width == 2 {
        reader
            .chunks_exact(2)
            .position(|chunk| chunk == [0, 0])
            .map(|chunk_index| chunk_index * 2)
    } else {
        reader.iter().position(|&byte| byte == 0)
    }
    .ok_or_else(|| {
        MdictError::InvalidFormat("missing NUL terminator in key text".to_string())
    })?;

    let text = decode(&reader[..end_pos], encoding)?;
    *reader = &reader[end_pos + width..];
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{UTF_16LE, UTF_8};

    #[test]
    fn odd_utf16_input_is_rejected() {
        assert!(matches!(
            decode(&[0x61, 0x00, 0x62], UTF_16LE),
            Err(MdictError::Encoding(_))
        ));
    }

    #[test]
    fn terminated_read_advances_past_nul() {
        let mut buf: &[u8] = b"cat\0dog\0";
        assert_eq!(read_terminated(&mut buf, UTF_8).unwrap(), "cat");
        assert_eq!(read_terminated(&mut buf, UTF_8).unwrap(), "dog");
        assert!(buf.is_empty());

        // "猫" in UTF-16LE, then a 2-byte terminator
        let mut wide: &[u8] = &[0x2B, 0x73, 0x00, 0x00];
        assert_eq!(read_terminated(&mut wide, UTF_16LE).unwrap(), "猫");
    }

    #[test]
    fn unterminated_key_is_a_format_error() {
        let mut buf: &[u8] = b"cat";
        assert!(matches!(
            read_terminated(&mut buf, UTF_8),
            Err(MdictError::InvalidFormat(_))
        ));
    }

    #[test]
    fn legacy_labels_normalize() {
        assert_eq!(parse_encoding("GBK").unwrap().name(), "gb18030");
        assert_eq!(parse_encoding("GB2312").unwrap().name(), "gb18030");
        assert_eq!(parse_encoding("UTF-8").unwrap().name(), "UTF-8");
        assert!(parse_encoding("EBCDIC").is_none());
    }
}
