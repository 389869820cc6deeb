//! Artist and character name matching.
//!
//! | Module | Role |
//! |--------|------|
//! | [`trie`] | [`TagTrie`]: insert and scan |
//! | [`dictionary`] | entry parsing, normalized forms, file loading |
//! | [`registry`] | [`MatcherRegistry`]: two tries behind a one-time load |

pub mod dictionary;
pub mod registry;
pub mod trie;

pub use dictionary::load_dictionary;
pub use registry::{DictionarySource, MatcherRegistry};
pub use trie::TagTrie;

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// A dictionary could not be loaded.
///
/// `Clone` so every caller of [`MatcherRegistry::initialize`] can be handed
/// the one stored failure.
#[derive(Error, Debug, Clone)]
pub enum MatcherError {
    #[error("failed to read dictionary {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: Arc<std::io::Error>,
    },
}
