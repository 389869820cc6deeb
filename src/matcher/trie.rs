//! Case-folded prefix tree for multi-pattern substring search.
//!
//! ```text
//! insert "cat", "category"
//!
//! root ─ c ─ a ─ t* ─ e ─ g ─ o ─ r ─ y*
//!
//! scan "the category"
//!   start 4: c a t*  → Match("cat", 4, 7)
//!                  e g o r y* → Match("category", 4, 12)
//! ```
//!
//! Every inserted word and every scanned character is folded to lower case
//! one character at a time, so offsets in the scanned text line up with the
//! original (unfolded) text.

use crate::metadata::Match;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
struct TrieNode {
    children: HashMap<char, TrieNode>,
    /// Canonical (folded) form of the word ending here.
    word: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct TagTrie {
    root: TrieNode,
    len: usize,
}

/// Lower-case `c` when that maps to exactly one character.
///
/// Characters whose lowercase form expands (e.g. `İ`) are kept as-is so the
/// folded text has the same length as the original.
fn fold_char(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(single), None) => single,
        _ => c,
    }
}

impl TagTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `word`. Reinserting a word (in any casing) changes nothing.
    pub fn insert(&mut self, word: &str) {
        if word.is_empty() {
            return;
        }
        let folded: String = word.chars().map(fold_char).collect();
        let mut node = &mut self.root;
        for c in folded.chars() {
            node = node.children.entry(c).or_default();
        }
        if node.word.is_none() {
            node.word = Some(folded);
            self.len += 1;
        }
    }

    /// Number of distinct words stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, word: &str) -> bool {
        let mut node = &self.root;
        for c in word.chars().map(fold_char) {
            match node.children.get(&c) {
                Some(next) => node = next,
                None => return false,
            }
        }
        node.word.is_some()
    }

    /// Every occurrence of every stored word in `text`.
    ///
    /// Ordered by start offset, then by end offset (shorter first). Offsets
    /// are character indices into `text`, half-open.
    pub fn find_all_matches(&self, text: &str) -> Vec<Match> {
        let folded: Vec<char> = text.chars().map(fold_char).collect();
        let mut matches = Vec::new();
        for start in 0..folded.len() {
            let mut node = &self.root;
            for (offset, c) in folded[start..].iter().enumerate() {
                match node.children.get(c) {
                    Some(next) => node = next,
                    None => break,
                }
                if let Some(word) = &node.word {
                    matches.push(Match {
                        word: word.clone(),
                        start,
                        end: start + offset + 1,
                    });
                }
            }
        }
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie(words: &[&str]) -> TagTrie {
        let mut trie = TagTrie::new();
        for word in words {
            trie.insert(word);
        }
        trie
    }

    fn m(word: &str, start: usize, end: usize) -> Match {
        Match {
            word: word.to_string(),
            start,
            end,
        }
    }

    // =========================================================================
    // Scanning
    // =========================================================================

    #[test]
    fn shared_prefix_reports_both_words() {
        let matches = trie(&["cat", "category"]).find_all_matches("the category");
        assert_eq!(matches, vec![m("cat", 4, 7), m("category", 4, 12)]);
    }

    #[test]
    fn case_insensitive_with_canonical_word() {
        let matches = trie(&["Miku"]).find_all_matches("i love MIKU today");
        assert_eq!(matches, vec![m("miku", 7, 11)]);
    }

    #[test]
    fn ordered_by_start_then_end() {
        let matches = trie(&["ab", "b", "abc"]).find_all_matches("abc ab");
        assert_eq!(
            matches,
            vec![
                m("ab", 0, 2),
                m("abc", 0, 3),
                m("b", 1, 2),
                m("ab", 4, 6),
                m("b", 5, 6),
            ]
        );
    }

    #[test]
    fn offsets_are_character_offsets() {
        let matches = trie(&["初音ミク"]).find_all_matches("é 初音ミク");
        assert_eq!(matches, vec![m("初音ミク", 2, 6)]);
    }

    #[test]
    fn no_matches_in_unrelated_text() {
        assert!(trie(&["cat"]).find_all_matches("dog").is_empty());
        assert!(TagTrie::new().find_all_matches("anything").is_empty());
        assert!(trie(&["cat"]).find_all_matches("").is_empty());
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    #[test]
    fn insert_is_idempotent() {
        let t = trie(&["Miku", "miku", "MIKU"]);
        assert_eq!(t.len(), 1);
        assert_eq!(t.find_all_matches("miku").len(), 1);
    }

    #[test]
    fn empty_word_ignored() {
        let t = trie(&[""]);
        assert!(t.is_empty());
        assert!(t.find_all_matches("abc").is_empty());
    }

    #[test]
    fn contains_is_exact_word() {
        let t = trie(&["category"]);
        assert!(t.contains("Category"));
        assert!(!t.contains("cat"));
    }
}
