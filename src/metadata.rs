//! The normalized extraction record and its field-resolution helpers.
//!
//! Every family parser produces the same [`ExtractedMetadata`] shape. The
//! core generation fields (`model`, `sampler`, `scheduler`, `steps`, `cfg`,
//! `seed`) are always present, possibly empty, so consumers never branch on
//! missing keys:
//!
//! ```text
//! model      "Unknown" when the payload names none
//! sampler    ""        when absent
//! seed       number or string, exactly as the payload stored it
//! ```
//!
//! ## Resolution priority
//!
//! When a field can come from several places, each parser lists the sources
//! in priority order and [`resolve`] picks the first non-empty one.

use crate::detect::GeneratorFamily;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const UNKNOWN_MODEL: &str = "Unknown";

/// One located occurrence of a dictionary word inside scanned text.
///
/// `start..end` is a half-open range of character offsets into the original
/// (not case-folded) text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub word: String,
    pub start: usize,
    pub end: usize,
}

/// A generation seed, kept in the type the payload used.
///
/// Seeds can be negative sentinels (`-1` = random) or exceed `i64`, so
/// numeric seeds keep their JSON number representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seed {
    Number(serde_json::Number),
    Text(String),
}

impl Seed {
    /// Seed from a JSON value: numbers stay numbers, strings stay strings.
    pub fn from_json(value: &serde_json::Value) -> Option<Seed> {
        match value {
            serde_json::Value::Number(n) => Some(Seed::Number(n.clone())),
            serde_json::Value::String(s) => Some(Seed::Text(s.clone())),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Seed::Text(s) if s.is_empty())
    }
}

impl Default for Seed {
    fn default() -> Self {
        Seed::Text(String::new())
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seed::Number(n) => write!(f, "{n}"),
            Seed::Text(s) => f.write_str(s),
        }
    }
}

/// Normalized generation parameters extracted from one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedMetadata {
    pub generator: GeneratorFamily,
    pub model: String,
    pub sampler: String,
    pub scheduler: String,
    pub steps: String,
    pub cfg: String,
    pub seed: Seed,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    pub positive_prompt: String,
    pub negative_prompt: String,
    pub artist_matches: Vec<Match>,
    pub character_matches: Vec<Match>,
    /// Every key/value pair the payload carried, sorted by key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
    /// The unparsed payload the fields were read from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_parameters: Option<String>,
}

impl ExtractedMetadata {
    /// An empty record for `generator`: model `Unknown`, everything else blank.
    pub fn new(generator: GeneratorFamily) -> Self {
        Self {
            generator,
            model: UNKNOWN_MODEL.to_string(),
            sampler: String::new(),
            scheduler: String::new(),
            steps: String::new(),
            cfg: String::new(),
            seed: Seed::default(),
            size: None,
            positive_prompt: String::new(),
            negative_prompt: String::new(),
            artist_matches: Vec::new(),
            character_matches: Vec::new(),
            parameters: BTreeMap::new(),
            raw_parameters: None,
        }
    }

    /// Set the model unless `model` is blank, which keeps `Unknown`.
    pub fn set_model(&mut self, model: Option<&str>) {
        if let Some(model) = resolve(&[model]) {
            self.model = model;
        }
    }
}

/// Resolve a field from multiple sources.
///
/// Takes a list of optional values in priority order and returns the first
/// non-None, non-empty value (trimmed).
///
/// ```text
/// model: resolve(&[model_tag, software_tag, generator_tag, params_model])
/// ```
pub fn resolve(sources: &[Option<&str>]) -> Option<String> {
    sources
        .iter()
        .filter_map(|opt| {
            opt.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // resolve() tests
    // =========================================================================

    #[test]
    fn resolve_picks_first_non_none() {
        assert_eq!(
            resolve(&[Some("sd_xl_base"), Some("Fallback")]),
            Some("sd_xl_base".to_string())
        );
    }

    #[test]
    fn resolve_skips_none_and_blank() {
        assert_eq!(
            resolve(&[None, Some("  \n\t  "), Some("Fallback")]),
            Some("Fallback".to_string())
        );
    }

    #[test]
    fn resolve_returns_none_for_empty_sources() {
        assert_eq!(resolve(&[]), None);
        assert_eq!(resolve(&[None, None]), None);
    }

    // =========================================================================
    // record shape
    // =========================================================================

    #[test]
    fn new_record_has_every_core_field() {
        let meta = ExtractedMetadata::new(GeneratorFamily::Unknown);
        let json = serde_json::to_value(&meta).unwrap();
        for key in ["model", "sampler", "scheduler", "steps", "cfg", "seed"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["model"], "Unknown");
        assert_eq!(json["seed"], "");
        assert_eq!(json["positivePrompt"], "");
        assert_eq!(json["artistMatches"], serde_json::json!([]));
    }

    #[test]
    fn set_model_ignores_blank() {
        let mut meta = ExtractedMetadata::new(GeneratorFamily::Unknown);
        meta.set_model(Some("  "));
        assert_eq!(meta.model, "Unknown");
        meta.set_model(Some("animagine-xl"));
        assert_eq!(meta.model, "animagine-xl");
    }

    #[test]
    fn seed_keeps_numeric_type() {
        let seed = Seed::from_json(&serde_json::json!(-1)).unwrap();
        assert_eq!(serde_json::to_value(&seed).unwrap(), serde_json::json!(-1));
        assert_eq!(seed.to_string(), "-1");

        let big = Seed::from_json(&serde_json::json!(18446744073709551615u64)).unwrap();
        assert_eq!(big.to_string(), "18446744073709551615");

        let text = Seed::from_json(&serde_json::json!("42")).unwrap();
        assert_eq!(text, Seed::Text("42".into()));
        assert!(Seed::default().is_empty());
    }
}
