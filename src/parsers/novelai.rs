//! NovelAI.
//!
//! NovelAI writes the generation settings as JSON into the `Comment` tag and
//! the model name into `Source`:
//!
//! | JSON / tag | Field |
//! |------------|-------|
//! | `scale` | cfg |
//! | `steps` | steps |
//! | `seed` | seed |
//! | `sampler` | sampler |
//! | `noise_schedule` | scheduler |
//! | `prompt` → `v4_prompt.caption.base_caption` → `Description` tag | positive |
//! | `uc` → `v4_negative_prompt.caption.base_caption` | negative |
//! | `Source` tag | model |
//!
//! A `Comment` that is not JSON is the legacy text layout and goes through
//! the shared last-line-params routine instead.

use super::params::{apply_standard_params, split_trailing_params};
use super::{
    FamilyParser, PayloadError, clean_text, collect_scalars, first_seed, first_text, parse_object,
    size_from,
};
use crate::detect::GeneratorFamily;
use crate::metadata::ExtractedMetadata;
use crate::tags::TagDictionary;

pub struct NovelAiParser;

const PROMPT_KEYS: &[&str] = &["prompt", "/v4_prompt/caption/base_caption"];
const NEGATIVE_KEYS: &[&str] = &["uc", "/v4_negative_prompt/caption/base_caption"];

impl FamilyParser for NovelAiParser {
    fn family(&self) -> GeneratorFamily {
        GeneratorFamily::NovelAi
    }

    fn try_parse(&self, tags: &TagDictionary) -> Result<ExtractedMetadata, PayloadError> {
        let comment = tags.text("Comment").ok_or(PayloadError::MissingTag("Comment"))?;
        let payload = match parse_object(&comment) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!(error = %e, "NovelAI comment is not JSON, reading legacy layout");
                return Ok(legacy_reading(tags, &comment));
            }
        };

        let mut metadata = ExtractedMetadata::new(GeneratorFamily::NovelAi);
        collect_scalars(&mut metadata, &payload, &["prompt", "uc"]);
        metadata.cfg = first_text(&payload, &["scale"]).unwrap_or_default();
        metadata.steps = first_text(&payload, &["steps"]).unwrap_or_default();
        metadata.seed = first_seed(&payload, &["seed"]).unwrap_or_default();
        metadata.sampler = first_text(&payload, &["sampler"]).unwrap_or_default();
        metadata.scheduler = first_text(&payload, &["noise_schedule"]).unwrap_or_default();
        metadata.size = size_from(&payload, "width", "height");
        metadata.positive_prompt = first_text(&payload, PROMPT_KEYS)
            .or_else(|| tags.text("Description").map(|d| d.into_owned()))
            .unwrap_or_default();
        metadata.negative_prompt = first_text(&payload, NEGATIVE_KEYS).unwrap_or_default();
        let source = tags.text("Source");
        metadata.set_model(source.as_deref());
        metadata.raw_parameters = Some(comment.into_owned());
        Ok(metadata)
    }
}

/// Legacy text `Comment`: prompt from `Description` when present, the rest
/// from the last-line-params layout.
fn legacy_reading(tags: &TagDictionary, comment: &str) -> ExtractedMetadata {
    let mut metadata = ExtractedMetadata::new(GeneratorFamily::NovelAi);
    let split = split_trailing_params(&clean_text(comment));
    apply_standard_params(&mut metadata, &split.params);
    metadata.positive_prompt = tags
        .first_text(&["Description"])
        .map(|d| clean_text(&d))
        .unwrap_or(split.positive);
    metadata.negative_prompt = split.negative;
    let source = tags.text("Source");
    metadata.set_model(source.as_deref());
    metadata.raw_parameters = Some(comment.to_string());
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Seed;
    use crate::test_helpers::tags;

    const COMMENT: &str = r#"{"prompt": "1girl, {{masterpiece}}", "steps": 28, "height": 1216, "width": 832, "scale": 5.0, "uc": "lowres, bad anatomy", "seed": 3735928559, "sampler": "k_euler_ancestral", "noise_schedule": "karras", "sm": false}"#;

    #[test]
    fn maps_json_fields() {
        let dict = tags(&[
            ("Software", "NovelAI"),
            ("Source", "NovelAI Diffusion V4.5 4BDE2A90"),
            ("Comment", COMMENT),
        ]);
        let meta = NovelAiParser.parse(&dict);
        assert_eq!(meta.generator, GeneratorFamily::NovelAi);
        assert_eq!(meta.model, "NovelAI Diffusion V4.5 4BDE2A90");
        assert_eq!(meta.positive_prompt, "1girl, {{masterpiece}}");
        assert_eq!(meta.negative_prompt, "lowres, bad anatomy");
        assert_eq!(meta.steps, "28");
        assert_eq!(meta.cfg, "5.0");
        assert_eq!(meta.sampler, "k_euler_ancestral");
        assert_eq!(meta.scheduler, "karras");
        assert_eq!(meta.size.as_deref(), Some("832x1216"));
        assert_eq!(
            serde_json::to_value(&meta.seed).unwrap(),
            serde_json::json!(3735928559u64)
        );
        assert_eq!(meta.parameters.get("sm").map(String::as_str), Some("false"));
        assert!(!meta.parameters.contains_key("prompt"));
        assert_eq!(meta.raw_parameters.as_deref(), Some(COMMENT));
    }

    #[test]
    fn v4_captions_used_when_prompt_absent() {
        let comment = r#"{"v4_prompt": {"caption": {"base_caption": "fox, forest"}}, "v4_negative_prompt": {"caption": {"base_caption": "blurry"}}, "seed": 1}"#;
        let meta = NovelAiParser.parse(&tags(&[("Comment", comment)]));
        assert_eq!(meta.positive_prompt, "fox, forest");
        assert_eq!(meta.negative_prompt, "blurry");
    }

    #[test]
    fn description_used_when_json_has_no_prompt() {
        let dict = tags(&[("Description", "from description"), ("Comment", r#"{"steps": 1}"#)]);
        assert_eq!(NovelAiParser.parse(&dict).positive_prompt, "from description");
    }

    #[test]
    fn missing_source_keeps_unknown_model() {
        let meta = NovelAiParser.parse(&tags(&[("Comment", r#"{"steps": 1}"#)]));
        assert_eq!(meta.model, "Unknown");
    }

    #[test]
    fn legacy_text_comment() {
        let dict = tags(&[
            ("Description", "cat ears"),
            ("Comment", "ignored\nnsfw\nSteps: 28, Seed: 77"),
        ]);
        let meta = NovelAiParser.parse(&dict);
        assert_eq!(meta.positive_prompt, "cat ears");
        assert_eq!(meta.negative_prompt, "nsfw");
        assert_eq!(meta.seed, Seed::Text("77".into()));
    }

    #[test]
    fn missing_comment_degrades_to_generic() {
        let dict = tags(&[("Software", "NovelAI"), ("Description", "just a prompt")]);
        let meta = NovelAiParser.parse(&dict);
        assert_eq!(meta.generator, GeneratorFamily::NovelAi);
        assert_eq!(meta.positive_prompt, "just a prompt");
    }
}
