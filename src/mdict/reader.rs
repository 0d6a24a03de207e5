//! The reader handle: lifecycle, block access, and the lookup facade.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use log::{debug, info, trace};

use super::cache::BlockCache;
use super::format::key_index::{self, KeyIndex};
use super::format::record_index::{self, RecordIndex};
use super::format::{blocks, header};
use super::io::DictFile;
use super::iter::KeyIter;
use super::stem::{AffixFiles, Stemmer};
use super::text;
use super::types::error::{MdictError, Result};
use super::types::models::{
    DictKind, KeyBlockInfoEntry, KeyEntry, MdictHeader, RecordBlockInfoEntry,
};

/// Output encoding for [`MdictReader::locate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateEncoding {
    /// RFC 4648 base64, no line breaks.
    Base64,
    /// Lowercase hexadecimal.
    Hex,
}

/// Separator placed between bodies when one word matches several entries.
const RECORD_SEPARATOR: &str = "\u{1E}";

/// Decoded key and record blocks kept per handle.
const BLOCK_CACHE_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    Opened,
    Initialized,
    Poisoned,
}

impl ReaderState {
    fn name(self) -> &'static str {
        match self {
            ReaderState::Opened => "opened but not initialized",
            ReaderState::Initialized => "initialized",
            ReaderState::Poisoned => "poisoned by a failed init",
        }
    }
}

/// Everything parsed by `init()`. Immutable once built.
struct DictIndex {
    header: MdictHeader,
    keys: KeyIndex,
    records: RecordIndex,
}

/// A match inside a decoded key block.
struct FoundKey {
    block_id: usize,
    entry_idx: usize,
    record_offset: u64,
}

/// The reader for one MDX or MDD file.
///
/// A handle moves through `open -> init -> (lookups) -> close`. Every
/// lookup-family operation requires a successful `init()`; a failed init
/// poisons the handle permanently. Handles are single-owner: methods take
/// `&mut self` and nothing is shared, so independent handles over the same
/// file never interact.
pub struct MdictReader {
    path: PathBuf,
    kind: DictKind,
    file: DictFile,
    state: ReaderState,
    index: Option<DictIndex>,
    key_cache: BlockCache<Vec<KeyEntry>>,
    record_cache: BlockCache<Vec<u8>>,
    affix: Option<AffixFiles>,
    stemmer: Option<Box<dyn Stemmer>>,
}

impl MdictReader {
    /// Open a dictionary file. MDX vs MDD is inferred from the suffix.
    ///
    /// Opening only acquires the file; call [`init`](Self::init) before any
    /// lookup.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let kind = DictKind::from_path(path);
        info!("opening {} file: {}", kind, path.display());
        let file = DictFile::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            kind,
            file,
            state: ReaderState::Opened,
            index: None,
            key_cache: BlockCache::new(BLOCK_CACHE_SIZE),
            record_cache: BlockCache::new(BLOCK_CACHE_SIZE),
            affix: None,
            stemmer: None,
        })
    }

    /// Open a dictionary together with companion affix files for the
    /// external stemmer. The paths are held as opaque tokens; see
    /// [`set_stemmer`](Self::set_stemmer).
    pub fn open_with_affix(
        path: impl AsRef<Path>,
        affix_path: impl AsRef<Path>,
        dictionary_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let mut reader = Self::open(path)?;
        reader.affix = Some(AffixFiles {
            affix_path: affix_path.as_ref().to_path_buf(),
            dictionary_path: dictionary_path.as_ref().to_path_buf(),
        });
        Ok(reader)
    }

    /// Parse the header and both info indices.
    ///
    /// One-shot: a second call is a state error, and any failure here
    /// poisons the handle for good.
    pub fn init(&mut self) -> Result<()> {
        if self.state != ReaderState::Opened {
            return Err(MdictError::State(self.state.name()));
        }
        match self.build_index() {
            Ok(index) => {
                self.index = Some(index);
                self.state = ReaderState::Initialized;
                Ok(())
            }
            Err(e) => {
                self.state = ReaderState::Poisoned;
                Err(e)
            }
        }
    }

    fn build_index(&mut self) -> Result<DictIndex> {
        let (header, key_block_start) = header::parse(&mut self.file, self.kind)?;
        let keys = key_index::parse(&mut self.file, &header, key_block_start)?;
        let record_section_offset = keys.key_blocks_offset + keys.key_blocks_size;
        let records = record_index::parse(&mut self.file, &header, record_section_offset)?;

        if records.entries_num != keys.entries_num {
            return Err(MdictError::CountMismatch {
                item_type: "entries between key and record sections",
                expected: keys.entries_num,
                found: records.entries_num,
            });
        }

        info!(
            "{} file initialized: {} entries, {} key blocks, {} record blocks",
            self.kind,
            keys.entries_num,
            keys.entries.len(),
            records.entries.len()
        );
        Ok(DictIndex {
            header,
            keys,
            records,
        })
    }

    /// Close the reader, releasing the underlying file. Dropping the handle
    /// has the same effect; closing is irreversible by construction.
    pub fn close(self) {
        debug!("closing {} file: {}", self.kind, self.path.display());
    }

    // --- Metadata accessors ---

    pub fn kind(&self) -> DictKind {
        self.kind
    }

    pub fn header(&self) -> Result<&MdictHeader> {
        Ok(&self.index()?.header)
    }

    pub fn title(&self) -> Result<Option<&str>> {
        Ok(self.index()?.header.title.as_deref())
    }

    pub fn description(&self) -> Result<Option<&str>> {
        Ok(self.index()?.header.description.as_deref())
    }

    /// Total number of headwords, as promised by the key section header.
    pub fn num_entries(&self) -> Result<u64> {
        Ok(self.index()?.keys.entries_num)
    }

    pub fn num_key_blocks(&self) -> Result<usize> {
        Ok(self.index()?.keys.entries.len())
    }

    pub fn num_record_blocks(&self) -> Result<usize> {
        Ok(self.index()?.records.entries.len())
    }

    /// The key-block-info table, one entry per key block.
    pub fn key_block_info(&self) -> Result<&[KeyBlockInfoEntry]> {
        Ok(&self.index()?.keys.entries)
    }

    /// The record-block-info table, one entry per record block.
    pub fn record_block_info(&self) -> Result<&[RecordBlockInfoEntry]> {
        Ok(&self.index()?.records.entries)
    }

    // --- Lookup facade ---

    /// Look up the definition of a headword in an MDX file.
    ///
    /// Comparison is ASCII case-folded. When several entries match, their
    /// bodies are joined with U+001E (the information separator).
    pub fn lookup(&mut self, word: &str) -> Result<Option<String>> {
        if self.kind != DictKind::Mdx {
            return Err(MdictError::InvalidFormat(
                "lookup() reads definitions from an MDX file; use locate() for resources"
                    .to_string(),
            ));
        }
        let matches = self.find_exact(word)?;
        if matches.is_empty() {
            debug!("lookup miss: {:?}", word);
            return Ok(None);
        }

        let encoding = self.index()?.header.encoding;
        let mut bodies = Vec::with_capacity(matches.len());
        for found in &matches {
            let next = self.next_distinct_offset(found)?;
            let payload = self.record_slice(found.record_offset, next)?;
            let body = text::decode(&payload, encoding)?;
            bodies.push(body.trim_end_matches('\0').to_string());
        }
        Ok(Some(bodies.join(RECORD_SEPARATOR)))
    }

    /// Locate a resource in an MDD file and return its payload encoded as
    /// base64 or lowercase hex. Resource names compare byte-identically.
    pub fn locate(&mut self, resource_name: &str, encoding: LocateEncoding) -> Result<Option<String>> {
        if self.kind != DictKind::Mdd {
            return Err(MdictError::InvalidFormat(
                "locate() reads resources from an MDD file; use lookup() for definitions"
                    .to_string(),
            ));
        }
        let matches = self.find_exact(resource_name)?;
        let Some(found) = matches.first() else {
            debug!("locate miss: {:?}", resource_name);
            return Ok(None);
        };

        let next = self.next_distinct_offset(found)?;
        let payload = self.record_slice(found.record_offset, next)?;
        Ok(Some(match encoding {
            LocateEncoding::Base64 => BASE64_STANDARD.encode(&payload),
            LocateEncoding::Hex => hex::encode(&payload),
        }))
    }

    /// Test whether a key is present, without touching the record section.
    pub fn contains(&mut self, word: &str) -> Result<bool> {
        Ok(!self.find_exact(word)?.is_empty())
    }

    /// Enumerate every key that starts with `prefix`, in the dictionary's
    /// native order. An empty prefix yields the whole key set.
    pub fn suggest(&mut self, prefix: &str) -> Result<Vec<String>> {
        let block_count = self.index()?.keys.entries.len();
        let start = self
            .index()?
            .keys
            .entries
            .partition_point(|e| e.last_key.as_str() < prefix);

        let mut suggestions = Vec::new();
        for block_id in start..block_count {
            let first_shares_prefix = self.index()?.keys.entries[block_id]
                .first_key
                .starts_with(prefix);
            // Blocks after the candidate can only contribute while their
            // first key still shares the prefix.
            if block_id > start && !first_shares_prefix {
                break;
            }
            let entries = self.key_block_entries(block_id)?;
            for entry in entries.iter() {
                if entry.key_text.starts_with(prefix) {
                    suggestions.push(entry.key_text.clone());
                }
            }
        }
        Ok(suggestions)
    }

    /// Lazy enumeration of every `(record_offset, key_text)` pair.
    ///
    /// Each call restarts from the first key block; blocks are decoded as
    /// the iterator advances.
    pub fn key_list(&mut self) -> Result<KeyIter<'_>> {
        let total_blocks = self.index()?.keys.entries.len();
        Ok(KeyIter::new(self, total_blocks))
    }

    /// Expand a word through the installed affix stemmer.
    ///
    /// The reader core delegates entirely; without a stemmer this yields
    /// an empty list.
    pub fn stem(&self, word: &str) -> Vec<String> {
        match &self.stemmer {
            Some(stemmer) => stemmer.stem(word),
            None => Vec::new(),
        }
    }

    /// Install the external stemmer implementation.
    pub fn set_stemmer(&mut self, stemmer: Box<dyn Stemmer>) {
        self.stemmer = Some(stemmer);
    }

    /// The affix companion files supplied at open time, if any.
    pub fn affix_files(&self) -> Option<&AffixFiles> {
        self.affix.as_ref()
    }

    // --- Internal machinery ---

    fn index(&self) -> Result<&DictIndex> {
        if self.state != ReaderState::Initialized {
            return Err(MdictError::State(self.state.name()));
        }
        self.index
            .as_ref()
            .ok_or(MdictError::State("opened but not initialized"))
    }

    /// Comparable form of a key: ASCII-folded for MDX text, byte-identical
    /// for MDD resource names.
    fn fold(&self, key: &str) -> String {
        match self.kind {
            DictKind::Mdx => key.to_ascii_lowercase(),
            DictKind::Mdd => key.to_string(),
        }
    }

    /// Find every entry equal to `word` under the folded comparison.
    ///
    /// Binary-searches the info table for the first candidate block, then
    /// scans forward; duplicates may straddle a block boundary.
    fn find_exact(&mut self, word: &str) -> Result<Vec<FoundKey>> {
        let folded = self.fold(word);
        let block_count = self.index()?.keys.entries.len();
        let start = self
            .index()?
            .keys
            .entries
            .partition_point(|e| self.fold(&e.last_key) < folded);

        let mut found = Vec::new();
        for block_id in start..block_count {
            let (first_key_beyond, last_key_beyond) = {
                let entry = &self.index()?.keys.entries[block_id];
                (
                    self.fold(&entry.first_key) > folded,
                    self.fold(&entry.last_key) > folded,
                )
            };
            if first_key_beyond {
                break;
            }
            let entries = self.key_block_entries(block_id)?;
            for (entry_idx, entry) in entries.iter().enumerate() {
                if self.fold(&entry.key_text) == folded {
                    found.push(FoundKey {
                        block_id,
                        entry_idx,
                        record_offset: entry.record_offset,
                    });
                }
            }
            if last_key_beyond {
                break;
            }
        }
        trace!("find_exact {:?}: {} match(es)", word, found.len());
        Ok(found)
    }

    /// The next record offset strictly greater than the found entry's, in
    /// key order; `None` when the entry is the last in the dictionary.
    /// Keys sharing one offset are skipped over.
    fn next_distinct_offset(&mut self, found: &FoundKey) -> Result<Option<u64>> {
        let block_count = self.index()?.keys.entries.len();
        let mut entry_idx = found.entry_idx + 1;
        for block_id in found.block_id..block_count {
            let entries = self.key_block_entries(block_id)?;
            while entry_idx < entries.len() {
                let offset = entries[entry_idx].record_offset;
                if offset > found.record_offset {
                    return Ok(Some(offset));
                }
                entry_idx += 1;
            }
            entry_idx = 0;
        }
        Ok(None)
    }

    /// Slice one record payload out of its owning record block.
    ///
    /// The block is found by binary search on the decompressed prefix
    /// sums; the entry runs to `next_offset`, clamped to the block end.
    fn record_slice(&mut self, offset: u64, next_offset: Option<u64>) -> Result<Vec<u8>> {
        let (block_id, block_start, block_len) = {
            let records = &self.index()?.records;
            if records.entries.is_empty() {
                return Err(MdictError::InvalidFormat(
                    "dictionary has no record blocks".to_string(),
                ));
            }
            let block_id = records
                .entries
                .partition_point(|e| e.decomp_prefix_sum <= offset)
                - 1;
            let entry = &records.entries[block_id];
            if offset >= entry.decomp_prefix_sum + entry.decomp_size {
                return Err(MdictError::InvalidFormat(format!(
                    "record offset {} is out of bounds",
                    offset
                )));
            }
            (block_id, entry.decomp_prefix_sum, entry.decomp_size)
        };

        let block = self.record_block_bytes(block_id)?;
        let block_end = block_start + block_len;
        let end_abs = next_offset.unwrap_or(block_end).min(block_end);
        let start = (offset - block_start) as usize;
        let end = (end_abs - block_start) as usize;
        Ok(block[start..end].to_vec())
    }

    /// Decode key block `block_id` into its entries, via the cache.
    pub(crate) fn key_block_entries(&mut self, block_id: usize) -> Result<Rc<Vec<KeyEntry>>> {
        if let Some(hit) = self.key_cache.get(block_id) {
            return Ok(hit);
        }

        let index = self.index.as_ref().ok_or(MdictError::State(
            "opened but not initialized",
        ))?;
        let info = index.keys.entries.get(block_id).ok_or_else(|| {
            MdictError::InvalidFormat(format!("key block index {} out of range", block_id))
        })?;
        trace!(
            "decoding key block {}: {} -> {} bytes",
            block_id,
            info.comp_size,
            info.decomp_size
        );

        let raw = self.file.read_at(
            index.keys.key_blocks_offset + info.comp_prefix_sum,
            info.comp_size as usize,
        )?;
        let decoded = blocks::decode_block(&raw, info.decomp_size)?;
        let entries = blocks::split_key_entries(&decoded, &index.header)?;

        if entries.len() as u64 != info.entry_count {
            return Err(MdictError::CountMismatch {
                item_type: "entries in key block",
                expected: info.entry_count,
                found: entries.len() as u64,
            });
        }

        Ok(self.key_cache.insert(block_id, entries))
    }

    /// Decode record block `block_id` into its raw bytes, via the cache.
    fn record_block_bytes(&mut self, block_id: usize) -> Result<Rc<Vec<u8>>> {
        if let Some(hit) = self.record_cache.get(block_id) {
            return Ok(hit);
        }

        let index = self.index.as_ref().ok_or(MdictError::State(
            "opened but not initialized",
        ))?;
        let info = index.records.entries.get(block_id).ok_or_else(|| {
            MdictError::InvalidFormat(format!("record block index {} out of range", block_id))
        })?;
        trace!(
            "decoding record block {}: {} -> {} bytes",
            block_id,
            info.comp_size,
            info.decomp_size
        );

        let raw = self.file.read_at(info.file_offset, info.comp_size as usize)?;
        let decoded = blocks::decode_block(&raw, info.decomp_size)?;

        Ok(self.record_cache.insert(block_id, decoded))
    }
}
