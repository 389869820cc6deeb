//! Per-family parsers.
//!
//! Each [`GeneratorFamily`] has one [`FamilyParser`] implementation;
//! [`parser_for`] is the registry mapping the detected family to it.
//!
//! Parsers are total. Internally each one works in terms of
//! `Result<ExtractedMetadata, PayloadError>`, and a failure (bad JSON,
//! missing tag, unexpected shape) is logged and degraded to the generic
//! free-text reading of the same tags, tagged with the detected family.
//! Nothing a payload contains can make [`FamilyParser::parse`] fail.
//!
//! | Family | Parser | Payload |
//! |--------|--------|---------|
//! | NovelAI | [`novelai::NovelAiParser`] | JSON in `Comment`, model in `Source` |
//! | ComfyUI | [`comfyui::ComfyUiParser`] | `generation_data` / `workflow` / `prompt` |
//! | Stable Diffusion | [`stable_diffusion::StableDiffusionParser`] | text or JSON in `parameters` |
//! | IllustriousXL | [`illustrious::IllustriousParser`] | JSON in `generate_info` |
//! | Midjourney | [`freetext::MidjourneyParser`] | `--flag` text in description tags |
//! | Unknown | [`freetext::GenericParser`] | last-line-params text |
//!
//! ## Field precedence
//!
//! JSON fields are read with [`first_text`] / [`first_seed`]: the first key
//! in the list that exists and is not `null` wins, even when its value is
//! `0` or `""`. Presence is explicit; nothing is skipped for being falsy.

pub mod comfyui;
pub mod freetext;
pub mod illustrious;
pub mod novelai;
pub(crate) mod params;
pub mod stable_diffusion;

use crate::detect::GeneratorFamily;
use crate::metadata::{ExtractedMetadata, Seed};
use crate::tags::TagDictionary;
use serde_json::Value;
use thiserror::Error;

/// Why a family-specific payload could not be read. Never leaves a parser.
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("tag `{0}` not present")]
    MissingTag(&'static str),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected payload shape: {0}")]
    Shape(String),
}

/// One generator family's extraction logic.
pub trait FamilyParser: Sync {
    fn family(&self) -> GeneratorFamily;

    /// Strict extraction; errors describe why the payload was unusable.
    fn try_parse(&self, tags: &TagDictionary) -> Result<ExtractedMetadata, PayloadError>;

    /// Total extraction: on failure, degrade to the generic reading.
    fn parse(&self, tags: &TagDictionary) -> ExtractedMetadata {
        match self.try_parse(tags) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(family = %self.family(), error = %e, "payload unreadable, using generic fallback");
                freetext::generic_reading(self.family(), tags)
            }
        }
    }
}

/// The parser registered for `family`.
pub fn parser_for(family: GeneratorFamily) -> &'static dyn FamilyParser {
    match family {
        GeneratorFamily::NovelAi => &novelai::NovelAiParser,
        GeneratorFamily::ComfyUi => &comfyui::ComfyUiParser,
        GeneratorFamily::StableDiffusion => &stable_diffusion::StableDiffusionParser,
        GeneratorFamily::IllustriousXl => &illustrious::IllustriousParser,
        GeneratorFamily::Midjourney => &freetext::MidjourneyParser,
        GeneratorFamily::Unknown => &freetext::GenericParser,
    }
}

// ---------------------------------------------------------------------------
// JSON field access
// ---------------------------------------------------------------------------

/// Scalar JSON value as text. Objects, arrays and `null` are not text.
pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Text of the first key in `keys` that is present and non-null.
///
/// Keys starting with `/` are JSON pointers (`/baseModel/modelFileName`).
pub(crate) fn first_text(object: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| lookup(object, key).and_then(value_text))
}

/// Seed from the first key in `keys` that is present and non-null.
pub(crate) fn first_seed(object: &Value, keys: &[&str]) -> Option<Seed> {
    keys.iter().find_map(|key| lookup(object, key).and_then(Seed::from_json))
}

fn lookup<'a>(object: &'a Value, key: &str) -> Option<&'a Value> {
    let value = if key.starts_with('/') {
        object.pointer(key)
    } else {
        object.get(key)
    };
    value.filter(|v| !v.is_null())
}

/// Parse a JSON payload that must be an object.
pub(crate) fn parse_object(text: &str) -> Result<Value, PayloadError> {
    let value: Value = serde_json::from_str(text.trim())?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(PayloadError::Shape("expected a JSON object".into()))
    }
}

/// `WIDTHxHEIGHT` from separate width/height fields.
pub(crate) fn size_from(object: &Value, width_key: &str, height_key: &str) -> Option<String> {
    let width = first_text(object, &[width_key])?;
    let height = first_text(object, &[height_key])?;
    Some(format!("{width}x{height}"))
}

/// Copy every scalar top-level field of `object` into `metadata.parameters`,
/// except the ones in `skip` (prompts, which already have their own fields).
pub(crate) fn collect_scalars(metadata: &mut ExtractedMetadata, object: &Value, skip: &[&str]) {
    if let Some(map) = object.as_object() {
        for (key, value) in map {
            if skip.contains(&key.as_str()) {
                continue;
            }
            if let Some(text) = value_text(value) {
                metadata.parameters.insert(key.clone(), text);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Text cleanup
// ---------------------------------------------------------------------------

/// Normalize line endings, turn tabs into spaces and drop the remaining
/// control characters other than `\n`.
pub(crate) fn clean_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .map(|c| if c == '\t' { ' ' } else { c })
        .filter(|c| *c == '\n' || !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}
