//! Lazy iteration over the full key set.

use std::rc::Rc;

use super::reader::MdictReader;
use super::types::error::Result;
use super::types::models::KeyEntry;

/// Iterator over every `(record_offset, key_text)` pair in native order.
///
/// Key blocks are decoded one at a time as the iterator advances, so
/// enumerating a large dictionary never materializes more than one block
/// beyond the handle's cache. Created by
/// [`MdictReader::key_list`](crate::MdictReader::key_list); the iterator
/// borrows the handle exclusively for its lifetime.
pub struct KeyIter<'a> {
    reader: &'a mut MdictReader,
    total_blocks: usize,
    next_block: usize,
    entries: Option<Rc<Vec<KeyEntry>>>,
    entry_idx: usize,
}

impl<'a> KeyIter<'a> {
    pub(crate) fn new(reader: &'a mut MdictReader, total_blocks: usize) -> Self {
        Self {
            reader,
            total_blocks,
            next_block: 0,
            entries: None,
            entry_idx: 0,
        }
    }
}

impl Iterator for KeyIter<'_> {
    type Item = Result<KeyEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entries) = &self.entries {
                if self.entry_idx < entries.len() {
                    let entry = entries[self.entry_idx].clone();
                    self.entry_idx += 1;
                    return Some(Ok(entry));
                }
            }

            if self.next_block >= self.total_blocks {
                return None;
            }

            match self.reader.key_block_entries(self.next_block) {
                Ok(entries) => {
                    self.entries = Some(entries);
                    self.entry_idx = 0;
                    self.next_block += 1;
                }
                Err(e) => {
                    // A bad block ends the iteration after reporting it.
                    self.next_block = self.total_blocks;
                    return Some(Err(e));
                }
            }
        }
    }
}
