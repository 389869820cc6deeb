//! Dictionary files: one or more comma-separated names per line.
//!
//! ```text
//! wlop, ilya kuvshinov
//! hatsune miku \(append\)
//! ```
//!
//! Each trimmed, non-empty token is one entry. Entries are inserted in up to
//! three forms so both spellings used in prompts match:
//!
//! ```text
//! hatsune miku \(append\)   verbatim
//! hatsune miku (append)     escapes removed
//! hatsune_miku_(append)     escapes removed, whitespace runs → "_"
//! ```

use super::{DictionarySource, MatcherError, TagTrie};
use std::sync::Arc;

/// Entries of a dictionary file.
pub fn parse_entries(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .flat_map(|line| line.split(','))
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
}

/// The distinct forms `entry` is inserted under.
pub fn normalized_forms(entry: &str) -> Vec<String> {
    let unescaped = entry.replace('\\', "");
    let underscored = unescaped.split_whitespace().collect::<Vec<_>>().join("_");
    let mut forms = vec![entry.to_string()];
    for form in [unescaped, underscored] {
        if !form.is_empty() && !forms.contains(&form) {
            forms.push(form);
        }
    }
    forms
}

/// Build a trie from dictionary text.
pub fn build_trie(content: &str) -> TagTrie {
    let mut trie = TagTrie::new();
    for entry in parse_entries(content) {
        for form in normalized_forms(entry) {
            trie.insert(&form);
        }
    }
    trie
}

/// Read `source` and build its trie.
pub fn load_dictionary(source: &DictionarySource) -> Result<TagTrie, MatcherError> {
    match source {
        DictionarySource::File(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| MatcherError::Read {
                path: path.clone(),
                source: Arc::new(e),
            })?;
            Ok(build_trie(&content))
        }
        DictionarySource::Inline(content) => Ok(build_trie(content)),
        DictionarySource::Empty => Ok(TagTrie::new()),
    }
}
