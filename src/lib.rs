//! # promptlens
//!
//! Reads the generation parameters that image generators embed in their
//! output files and normalizes them into one record shape, whatever tool
//! wrote them. The positive prompt is then annotated with the artist and
//! character names found in two plain-text dictionaries.
//!
//! # Architecture: Read, Detect, Parse, Annotate
//!
//! ```text
//! 1. Read      file        →  TagDictionary      (PNG text chunks, JPEG COM/EXIF, WebP EXIF)
//! 2. Detect    tags        →  GeneratorFamily    (fixed priority order)
//! 3. Parse     tags        →  ExtractedMetadata  (one parser per family)
//! 4. Annotate  prompt      →  Vec<Match>         (shared dictionary tries)
//! ```
//!
//! Stages 2-4 are pure functions over a [`TagDictionary`], so every parser
//! can be tested from literal tag maps without touching the filesystem.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Container sniffing and tag extraction, pixel dimensions, input discovery |
//! | [`tags`] | The tag dictionary every later stage consumes |
//! | [`detect`] | Generator family detection |
//! | [`parsers`] | Per-family payload parsers, including the ComfyUI graph resolvers |
//! | [`metadata`] | The normalized [`ExtractedMetadata`] record |
//! | [`matcher`] | Dictionary loading, the character trie, the shared matcher registry |
//! | [`pipeline`] | `extract` (tags → record) and `inspect` (file → report) |
//! | [`config`] | `config.toml` loading, validation and merging |
//! | [`output`] | CLI text formatting |
//!
//! # Design Decisions
//!
//! ## Extraction Never Fails
//!
//! Generator payloads are hand-edited, truncated and re-saved by other
//! tools all the time. A parser that cannot make sense of its payload logs
//! a warning and falls back to the generic reading, so every tag dictionary
//! yields a record. Only file-level problems (unreadable file, unknown
//! container, no metadata at all) surface as errors, and even those become
//! a report rather than aborting a batch.
//!
//! ## Graphs Are Walked With Bounds
//!
//! ComfyUI stores two graph shapes: the executed prompt graph and the editor
//! workflow. Both can contain cycles or long reroute chains. Every traversal
//! keeps a visited set and a hop limit, so a malformed graph costs at most a
//! few dozen lookups.
//!
//! ## Dictionaries Load Once
//!
//! The [`MatcherRegistry`] builds both tries exactly once behind a
//! `OnceLock`, no matter how many workers ask at the same time. Until it is
//! initialized, lookups return no matches instead of blocking.

pub mod config;
pub mod detect;
pub mod imaging;
pub mod matcher;
pub mod metadata;
pub mod output;
pub mod parsers;
pub mod pipeline;
pub mod tags;

pub use detect::{GeneratorFamily, detect};
pub use matcher::{DictionarySource, MatcherRegistry};
pub use metadata::{ExtractedMetadata, Match, Seed};
pub use pipeline::{ImageReport, extract, inspect};
pub use tags::{Tag, TagDictionary, TagValue};

#[cfg(test)]
pub(crate) mod test_helpers;
