//! Affix-stemmer delegation hook.
//!
//! Morphological expansion is not part of the reader core. A handle opened
//! with companion affix files exposes them to whatever [`Stemmer`]
//! implementation the caller installs; without one, `stem()` yields
//! nothing.

use std::path::PathBuf;

/// An external morphological expander.
pub trait Stemmer {
    /// Expand `word` into candidate stems, best match first.
    fn stem(&self, word: &str) -> Vec<String>;
}

/// Companion affix and dictionary files supplied at open time.
///
/// The reader treats these as opaque paths; only the installed stemmer
/// interprets them.
#[derive(Debug, Clone)]
pub struct AffixFiles {
    pub affix_path: PathBuf,
    pub dictionary_path: PathBuf,
}
