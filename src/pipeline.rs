//! Tag dictionary → [`ExtractedMetadata`], and file → [`ImageReport`].
//!
//! ```text
//! TagDictionary ─► detect ─► parser_for(family).parse ─► annotate matches
//! ```
//!
//! [`extract`] is total: every dictionary, however broken, produces a
//! record. [`inspect`] adds the file-level collaborators (tag reader,
//! dimension reader) and keeps the raw tags alongside the result so a
//! failed or partial extraction can still be looked at.

use crate::detect::detect;
use crate::imaging::{self, Dimensions};
use crate::matcher::MatcherRegistry;
use crate::metadata::ExtractedMetadata;
use crate::parsers::parser_for;
use crate::tags::TagDictionary;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Extract generation parameters from `tags` and annotate the positive
/// prompt with artist/character matches.
///
/// Matches stay empty when the prompt is empty or `matchers` is not
/// initialized.
pub fn extract(tags: &TagDictionary, matchers: &MatcherRegistry) -> ExtractedMetadata {
    let family = detect(tags);
    let mut metadata = parser_for(family).parse(tags);
    if !metadata.positive_prompt.trim().is_empty() {
        metadata.artist_matches = matchers.find_artists(&metadata.positive_prompt);
        metadata.character_matches = matchers.find_characters(&metadata.positive_prompt);
    }
    metadata
}

/// Everything known about one image file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageReport {
    pub path: PathBuf,
    pub dimensions: Option<Dimensions>,
    pub metadata: Option<ExtractedMetadata>,
    pub raw_tags: TagDictionary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Read and interpret the image at `path`.
///
/// A file without usable metadata yields a report with `metadata: None` and
/// the reason in `error`. Undecodable dimensions only leave `dimensions`
/// empty.
pub fn inspect(path: &Path, matchers: &MatcherRegistry) -> ImageReport {
    let dimensions = match imaging::read_dimensions(path) {
        Ok(d) => Some(d),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read dimensions");
            None
        }
    };

    match imaging::read_tags(path) {
        Ok(tags) => ImageReport {
            path: path.to_path_buf(),
            dimensions,
            metadata: Some(extract(&tags, matchers)),
            raw_tags: tags,
            error: None,
        },
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "no usable metadata");
            ImageReport {
                path: path.to_path_buf(),
                dimensions,
                metadata: None,
                raw_tags: TagDictionary::new(),
                error: Some(e.to_string()),
            }
        }
    }
}
