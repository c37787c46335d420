//! Phonetic-key derivation seam
//!
//! Key derivation is an external collaborator: a pure function from free
//! text to its canonical term key. The core only needs determinism, since
//! registering a product and indexing a recipe ingredient must agree on
//! the key for the same word.

use crate::ids::TermKey;

/// Derives the canonical term key for a piece of free text
pub trait PhoneticKeyer: Send + Sync + 'static {
    fn key(&self, text: &str) -> TermKey;
}

/// Trim-and-casefold keyer. Deterministic stand-in for a real phonetic
/// transliterator; adequate wherever spelling already is canonical.
pub struct FoldingKeyer;

impl PhoneticKeyer for FoldingKeyer {
    fn key(&self, text: &str) -> TermKey {
        TermKey::new(text.trim().to_lowercase())
    }
}
