//! Parsers for families without a structured payload: Midjourney and the
//! generic catch-all.
//!
//! Both read the first non-blank candidate text tag, in this order:
//!
//! ```text
//! Description → ImageDescription → UserComment (may be raw bytes) → Comment
//! ```
//!
//! and strip control characters before interpreting it.

use super::params::{apply_standard_params, split_trailing_params};
use super::{FamilyParser, PayloadError, clean_text};
use crate::detect::{GeneratorFamily, is_flag_token};
use crate::metadata::{ExtractedMetadata, Seed, resolve};
use crate::tags::TagDictionary;

const TEXT_CANDIDATES: &[&str] = &["Description", "ImageDescription", "UserComment", "Comment"];

/// First candidate free-text tag, cleaned.
fn candidate_text(tags: &TagDictionary) -> Option<String> {
    tags.first_text(TEXT_CANDIDATES)
        .map(|text| clean_text(&text))
        .filter(|text| !text.is_empty())
}

// ---------------------------------------------------------------------------
// Generic
// ---------------------------------------------------------------------------

pub struct GenericParser;

impl FamilyParser for GenericParser {
    fn family(&self) -> GeneratorFamily {
        GeneratorFamily::Unknown
    }

    fn try_parse(&self, tags: &TagDictionary) -> Result<ExtractedMetadata, PayloadError> {
        Ok(generic_reading(GeneratorFamily::Unknown, tags))
    }
}

/// The generic interpretation of a tag dictionary, labelled as `family`.
///
/// This is also the degraded result every other parser falls back to.
///
/// Model precedence: `Model` tag → `Software` tag → `Generator` tag →
/// `Model` key of the parameter block → `Unknown`.
pub(crate) fn generic_reading(family: GeneratorFamily, tags: &TagDictionary) -> ExtractedMetadata {
    let mut metadata = ExtractedMetadata::new(family);

    if let Some(text) = candidate_text(tags) {
        let split = split_trailing_params(&text);
        apply_standard_params(&mut metadata, &split.params);
        metadata.positive_prompt = split.positive;
        metadata.negative_prompt = split.negative;
        metadata.raw_parameters = Some(text);
    }

    let params_model = metadata.parameters.get("Model").cloned();
    let model_tag = tags.text("Model");
    let software = tags.text("Software");
    let generator = tags.text("Generator");
    metadata.set_model(
        resolve(&[
            model_tag.as_deref(),
            software.as_deref(),
            generator.as_deref(),
            params_model.as_deref(),
        ])
        .as_deref(),
    );
    metadata
}

// ---------------------------------------------------------------------------
// Midjourney
// ---------------------------------------------------------------------------

pub struct MidjourneyParser;

const JOB_ID_LABEL: &str = "Job ID:";

impl FamilyParser for MidjourneyParser {
    fn family(&self) -> GeneratorFamily {
        GeneratorFamily::Midjourney
    }

    /// ```text
    /// a castle at dusk --ar 16:9 --v 6.1 --no people --seed 99 Job ID: 1b2c…
    /// └── positive ──┘ └────────────── flags ───────────────┘ └─ job ──┘
    /// ```
    ///
    /// `--no` is Midjourney's negative prompt; `--seed` fills seed;
    /// `--niji`/`--v`/`--version` name the model.
    fn try_parse(&self, tags: &TagDictionary) -> Result<ExtractedMetadata, PayloadError> {
        let text = candidate_text(tags).ok_or(PayloadError::MissingTag("Description"))?;
        let mut metadata = ExtractedMetadata::new(GeneratorFamily::Midjourney);

        let (body, job_id) = match text.find(JOB_ID_LABEL) {
            Some(pos) => (&text[..pos], Some(text[pos + JOB_ID_LABEL.len()..].trim())),
            None => (text.as_str(), None),
        };
        if let Some(job_id) = job_id.filter(|j| !j.is_empty()) {
            metadata.parameters.insert("Job ID".into(), job_id.to_string());
        }

        let mut prompt_words = Vec::new();
        let mut flags: Vec<(String, Vec<&str>)> = Vec::new();
        for token in body.split_whitespace() {
            if is_flag_token(token) {
                flags.push((token.trim_start_matches('-').to_string(), Vec::new()));
            } else if let Some((_, values)) = flags.last_mut() {
                values.push(token);
            } else {
                prompt_words.push(token);
            }
        }
        metadata.positive_prompt = prompt_words.join(" ");

        for (name, values) in flags {
            let value = values.join(" ");
            match name.as_str() {
                "no" => metadata.negative_prompt = value.clone(),
                "seed" => metadata.seed = Seed::Text(value.clone()),
                _ => {}
            }
            metadata.parameters.insert(name, value);
        }

        let version = |key: &str| metadata.parameters.get(key).cloned();
        let model = if let Some(niji) = version("niji") {
            resolve(&[Some(niji.as_str())])
                .map(|v| format!("Niji {v}"))
                .unwrap_or_else(|| "Niji".to_string())
        } else if let Some(v) = version("v").or_else(|| version("version")) {
            format!("Midjourney v{v}")
        } else {
            "Midjourney".to_string()
        };
        metadata.model = model;
        metadata.raw_parameters = Some(text.clone());
        Ok(metadata)
    }
}
