//! Key-info table decryption.
//!
//! When the header sets `Encrypted & 0x02`, the body of the v2.x
//! key-block-info block (everything after its 8-byte marker/checksum
//! envelope) is obfuscated with a byte-wise stream transform. The key is
//! derived from the block itself, so no external credential is needed.

use log::trace;
use ripemd::{Digest, Ripemd128};

/// Magic constant appended to the salt before hashing.
const KEY_INFO_MAGIC: u32 = 0x3695;

/// Derive the 16-byte key-info decryption key from the stored block.
///
/// `RIPEMD-128(block[4..8] || 95 36 00 00)`: the 32-bit field at offset 4
/// acts as the salt and the magic constant supplies the fixed suffix.
pub fn key_info_key(block: &[u8]) -> [u8; 16] {
    let mut hasher = Ripemd128::new();
    hasher.update(&block[4..8]);
    hasher.update(KEY_INFO_MAGIC.to_le_bytes());
    hasher.finalize().into()
}

/// Decrypt an encrypted key-info body in place.
///
/// Each ciphertext byte is rotated by 4 bits, then XORed with the previous
/// ciphertext byte (0x36 for the first position), its index, and the
/// rolling key byte.
pub fn key_info_decrypt(data: &mut [u8], key: &[u8; 16]) {
    trace!("decrypting {} key-info bytes", data.len());
    let mut prev = 0x36u8;
    for (i, byte) in data.iter_mut().enumerate() {
        let current = *byte;
        *byte = current.rotate_left(4) ^ prev ^ (i as u8) ^ key[i % key.len()];
        prev = current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Inverse of `key_info_decrypt`, only needed to exercise the cipher.
    fn key_info_encrypt(data: &mut [u8], key: &[u8; 16]) {
        let mut prev = 0x36u8;
        for (i, byte) in data.iter_mut().enumerate() {
            let mixed = *byte ^ prev ^ (i as u8) ^ key[i % key.len()];
            *byte = mixed.rotate_left(4);
            prev = *byte;
        }
    }

    #[test]
    fn decrypt_inverts_encrypt() {
        let key = key_info_key(&[2, 0, 0, 0, 0xDE, 0xAD, 0xBE, 0xEF]);
        let plain: Vec<u8> = (0u8..=255).collect();
        let mut buf = plain.clone();
        key_info_encrypt(&mut buf, &key);
        assert_ne!(buf, plain);
        key_info_decrypt(&mut buf, &key);
        assert_eq!(buf, plain);
    }

    #[test]
    fn key_depends_on_salt() {
        let a = key_info_key(&[2, 0, 0, 0, 1, 2, 3, 4]);
        let b = key_info_key(&[2, 0, 0, 0, 1, 2, 3, 5]);
        assert_ne!(a, b);
    }
}
