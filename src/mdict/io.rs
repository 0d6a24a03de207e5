//! Positioned reads over the backing dictionary file.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use log::trace;

use super::types::error::Result;

/// Random-access view of an opened dictionary file.
///
/// Owned by exactly one reader handle; reads are issued serially by that
/// owner, so no internal synchronization is needed. The file stays open for
/// the handle's lifetime and is released on drop.
#[derive(Debug)]
pub struct DictFile {
    file: File,
    len: u64,
}

impl DictFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }

    /// Total file size in bytes, used to sanity-check length fields.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Read exactly `buf.len()` bytes starting at the absolute `offset`.
    ///
    /// A short read surfaces as an I/O error.
    pub fn read_into(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        trace!("read {} bytes at offset {}", buf.len(), offset);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    /// Read exactly `len` bytes starting at the absolute `offset`.
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(offset, &mut buf)?;
        Ok(buf)
    }
}
