//! The shared artist/character lookup.
//!
//! A [`MatcherRegistry`] is created once by the caller and passed by
//! reference into every parse. Its two tries are built on the first
//! [`initialize`](MatcherRegistry::initialize) call and are read-only
//! afterwards, so any number of threads can scan concurrently without
//! locking.
//!
//! ```text
//! new() ──► initialize() ──► find_artists / find_characters
//!             │  (once)          │
//!             │                  └─ before or after a failed load: []
//!             └─ artists ┐ rayon::join
//!                characters ┘
//! ```

use super::{MatcherError, TagTrie, load_dictionary};
use crate::metadata::Match;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Where a dictionary's text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictionarySource {
    File(PathBuf),
    Inline(String),
    Empty,
}

#[derive(Debug)]
struct LoadedMatchers {
    artists: TagTrie,
    characters: TagTrie,
}

#[derive(Debug)]
pub struct MatcherRegistry {
    artists: DictionarySource,
    characters: DictionarySource,
    loaded: OnceLock<Result<LoadedMatchers, MatcherError>>,
}

impl MatcherRegistry {
    pub fn new(artists: DictionarySource, characters: DictionarySource) -> Self {
        Self {
            artists,
            characters,
            loaded: OnceLock::new(),
        }
    }

    /// A registry that never matches anything.
    pub fn disabled() -> Self {
        Self::new(DictionarySource::Empty, DictionarySource::Empty)
    }

    /// Load both dictionaries, exactly once per registry.
    ///
    /// Concurrent callers block until the first load finishes and then all
    /// see its outcome; nobody observes a half-built trie. A failed load is
    /// final: every later call returns the same error and lookups stay
    /// empty.
    ///
    /// The two files load in parallel on the rayon pool. Call this before
    /// fanning work out with `par_iter`, not from inside a rayon task.
    pub fn initialize(&self) -> Result<(), MatcherError> {
        match self.loaded.get_or_init(|| self.load()) {
            Ok(_) => Ok(()),
            Err(e) => Err(e.clone()),
        }
    }

    fn load(&self) -> Result<LoadedMatchers, MatcherError> {
        let (artists, characters) = rayon::join(
            || load_dictionary(&self.artists),
            || load_dictionary(&self.characters),
        );
        let loaded = match (artists, characters) {
            (Ok(artists), Ok(characters)) => Ok(LoadedMatchers {
                artists,
                characters,
            }),
            (Err(e), _) | (_, Err(e)) => Err(e),
        };
        match &loaded {
            Ok(m) => tracing::info!(
                artists = m.artists.len(),
                characters = m.characters.len(),
                "dictionaries loaded"
            ),
            Err(e) => tracing::warn!(error = %e, "dictionary load failed, matching disabled"),
        }
        loaded
    }

    fn ready(&self) -> Option<&LoadedMatchers> {
        self.loaded.get()?.as_ref().ok()
    }

    /// Whether a successful [`initialize`](Self::initialize) has completed.
    pub fn is_ready(&self) -> bool {
        self.ready().is_some()
    }

    /// Distinct entries per trie, `(artists, characters)`, once ready.
    pub fn entry_counts(&self) -> Option<(usize, usize)> {
        self.ready()
            .map(|m| (m.artists.len(), m.characters.len()))
    }

    /// Artist names in `text`; empty until initialized.
    pub fn find_artists(&self, text: &str) -> Vec<Match> {
        self.ready()
            .map(|m| m.artists.find_all_matches(text))
            .unwrap_or_default()
    }

    /// Character names in `text`; empty until initialized.
    pub fn find_characters(&self, text: &str) -> Vec<Match> {
        self.ready()
            .map(|m| m.characters.find_all_matches(text))
            .unwrap_or_default()
    }
}
