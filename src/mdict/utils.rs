//! Low-level byte reading utilities.

use std::io::Read;

use adler2::adler32_slice;
use byteorder::{BigEndian, ReadBytesExt};

use super::types::error::{MdictError, Result};

/// Read a 4 or 8 byte big-endian number.
///
/// Used throughout the container for size and count fields. The width is the
/// active width of the wire version (v1.x uses 4 bytes, v2.x uses 8 bytes).
///
/// # Panics
/// Panics if `number_width` is not 4 or 8. The value is fixed after header
/// parsing, so any other width is a programmer error.
pub fn read_number(reader: &mut impl Read, number_width: usize) -> Result<u64> {
    match number_width {
        8 => Ok(reader.read_u64::<BigEndian>()?),
        4 => Ok(reader.read_u32::<BigEndian>()? as u64),
        _ => unreachable!("Invalid number width: must be 4 or 8"),
    }
}

/// Read a 1 or 2 byte big-endian number.
///
/// Used for the key-size prefixes inside the key-block-info table.
///
/// # Panics
/// Panics if `number_width` is not 1 or 2.
pub fn read_small_number(reader: &mut impl Read, number_width: usize) -> Result<u64> {
    match number_width {
        2 => Ok(reader.read_u16::<BigEndian>()? as u64),
        1 => Ok(reader.read_u8()? as u64),
        _ => unreachable!("Invalid small number width: must be 1 or 2"),
    }
}

/// Verify a stored ADLER-32 against `data`.
pub fn verify_adler32(data: &[u8], expected: u32) -> Result<()> {
    let actual = adler32_slice(data);
    if actual != expected {
        return Err(MdictError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}
