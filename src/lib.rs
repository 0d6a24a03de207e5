//! Reader core for the MDX/MDD dictionary container format.
//!
//! MDX files hold textual definitions, MDD files hold binary resources
//! (images, audio) under path-like names. Both share the same layered
//! container: an XML header, a key-block-info index, compressed key blocks
//! of `(record_offset, key_text)` entries, a record-block index, and
//! compressed record blocks holding the concatenated payload bodies.
//! Wire versions 1.x and 2.x are supported.
//!
//! # Example
//! ```no_run
//! use mdict_core::MdictReader;
//!
//! # fn main() -> mdict_core::Result<()> {
//! let mut dict = MdictReader::open("collins.mdx")?;
//! dict.init()?;
//! if let Some(body) = dict.lookup("apple")? {
//!     println!("{}", body);
//! }
//! for word in dict.suggest("app")? {
//!     println!("suggestion: {}", word);
//! }
//! # Ok(())
//! # }
//! ```

mod mdict;

pub use mdict::iter::KeyIter;
pub use mdict::reader::{LocateEncoding, MdictReader};
pub use mdict::stem::{AffixFiles, Stemmer};
pub use mdict::types::error::{MdictError, Result};
pub use mdict::types::models::{
    DictKind, EncryptionFlags, KeyBlockInfoEntry, KeyEntry, MdictHeader, MdictVersion,
    RecordBlockInfoEntry,
};
