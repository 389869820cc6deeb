//! Stable Diffusion web UIs (A1111, Forge, SD.Next) and diffusers-style JSON.
//!
//! The `parameters` tag takes one of two shapes.
//!
//! **Text** (the common case):
//!
//! ```text
//! cat sitting                          ← positive (up to "Negative prompt:")
//! Negative prompt: blurry              ← negative (up to "Steps:")
//! Steps: 20, Sampler: Euler, CFG scale: 7.5, Seed: 42, Size: 512x512, Model: foo
//! ```
//!
//! Fields are pulled out of the parameter section with fixed patterns.
//! Without a `Negative prompt:` marker the positive prompt ends at `Steps:`.
//!
//! **JSON**, recognised by the substring `negative_prompt`:
//!
//! | Key | Field |
//! |-----|-------|
//! | `prompt` | positive |
//! | `negative_prompt` | negative |
//! | `guidance_scale`, `cfg_scale`, `cfg` | cfg |
//! | `num_inference_steps`, `steps` | steps |
//! | `seed` | seed |
//! | `sampler`, `sampler_name` | sampler |
//! | `scheduler` | scheduler |
//! | `model`, `model_name`, `sd_model_name` | model |
//!
//! A `negative_prompt` payload that fails to parse as JSON is read as text.

use super::params::split_key_values;
use super::{
    FamilyParser, PayloadError, collect_scalars, first_seed, first_text, parse_object, size_from,
};
use crate::detect::GeneratorFamily;
use crate::metadata::{ExtractedMetadata, Seed};
use crate::tags::TagDictionary;
use regex::Regex;
use std::sync::LazyLock;

pub struct StableDiffusionParser;

const NEGATIVE_MARKER: &str = "Negative prompt:";
const STEPS_MARKER: &str = "Steps:";
const JSON_MARKER: &str = "negative_prompt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SdField {
    Steps,
    Sampler,
    Cfg,
    Seed,
    Size,
    ScheduleType,
    Model,
}

/// `(field, label, value pattern)`; a label only counts at the start of the
/// section or right after a comma/newline, so `Model hash:` never reads as
/// `Model:` and `Hires steps:` never reads as `Steps:`.
static SD_FIELDS: LazyLock<Vec<(SdField, Regex)>> = LazyLock::new(|| {
    [
        (SdField::Steps, "Steps", r"\d+"),
        (SdField::Sampler, "Sampler", r"[^,\n]+"),
        (SdField::Cfg, "CFG scale", r"\d+(?:\.\d+)?"),
        (SdField::Seed, "Seed", r"-?\d+"),
        (SdField::Size, "Size", r"\d+x\d+"),
        (SdField::ScheduleType, "Schedule type", r"[^,\n]+"),
        (SdField::Model, "Model", r"[^,\n]+"),
    ]
    .into_iter()
    .map(|(field, label, value)| {
        let pattern = format!(r"(?:^|[,\n])\s*{}: ({})", regex::escape(label), value);
        (field, Regex::new(&pattern).expect("field pattern is valid"))
    })
    .collect()
});

impl FamilyParser for StableDiffusionParser {
    fn family(&self) -> GeneratorFamily {
        GeneratorFamily::StableDiffusion
    }

    fn try_parse(&self, tags: &TagDictionary) -> Result<ExtractedMetadata, PayloadError> {
        let params = tags
            .text("parameters")
            .ok_or(PayloadError::MissingTag("parameters"))?;

        if params.contains(JSON_MARKER) {
            match parse_json(&params) {
                Ok(metadata) => return Ok(metadata),
                Err(e) => tracing::debug!(error = %e, "parameters mention negative_prompt but are not JSON"),
            }
        }
        Ok(parse_text(&params))
    }
}

fn parse_json(params: &str) -> Result<ExtractedMetadata, PayloadError> {
    let payload = parse_object(params)?;
    let mut metadata = ExtractedMetadata::new(GeneratorFamily::StableDiffusion);
    collect_scalars(&mut metadata, &payload, &["prompt", "negative_prompt"]);
    metadata.positive_prompt = first_text(&payload, &["prompt"]).unwrap_or_default();
    metadata.negative_prompt = first_text(&payload, &["negative_prompt"]).unwrap_or_default();
    metadata.cfg = first_text(&payload, &["guidance_scale", "cfg_scale", "cfg"]).unwrap_or_default();
    metadata.steps = first_text(&payload, &["num_inference_steps", "steps"]).unwrap_or_default();
    metadata.seed = first_seed(&payload, &["seed"]).unwrap_or_default();
    metadata.sampler = first_text(&payload, &["sampler", "sampler_name"]).unwrap_or_default();
    metadata.scheduler = first_text(&payload, &["scheduler"]).unwrap_or_default();
    metadata.size = size_from(&payload, "width", "height");
    let model = first_text(&payload, &["model", "model_name", "sd_model_name"]);
    metadata.set_model(model.as_deref());
    metadata.raw_parameters = Some(params.to_string());
    Ok(metadata)
}

/// Split the text layout into (positive, negative, parameter section).
///
/// The parameter section may start on its own line or share a line with
/// the prompt before it (`blurry, Steps: 20, ...`); a separating comma is
/// left out of the prompt.
fn split_sections(params: &str) -> (&str, &str, &str) {
    match params.find(NEGATIVE_MARKER) {
        Some(neg_start) => {
            let positive = &params[..neg_start];
            let rest = &params[neg_start + NEGATIVE_MARKER.len()..];
            match find_steps(rest) {
                Some(steps) => (positive, before_section(&rest[..steps]), &rest[steps..]),
                None => (positive, rest, ""),
            }
        }
        None => match find_steps(params) {
            Some(steps) => (before_section(&params[..steps]), "", &params[steps..]),
            None => (params, "", ""),
        },
    }
}

/// Offset of the first `Steps:` label: at the start of the text or after
/// whitespace or a comma, so `HiresSteps:` is not taken for it.
fn find_steps(text: &str) -> Option<usize> {
    text.match_indices(STEPS_MARKER).map(|(pos, _)| pos).find(|&pos| {
        text[..pos]
            .chars()
            .next_back()
            .is_none_or(|c| c == ',' || c.is_whitespace())
    })
}

fn before_section(text: &str) -> &str {
    text.trim_end().trim_end_matches(',')
}

fn parse_text(params: &str) -> ExtractedMetadata {
    let mut metadata = ExtractedMetadata::new(GeneratorFamily::StableDiffusion);
    let (positive, negative, section) = split_sections(params);
    metadata.positive_prompt = positive.trim().to_string();
    metadata.negative_prompt = negative.trim().to_string();

    for (field, regex) in SD_FIELDS.iter() {
        let Some(value) = regex
            .captures(section)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
        else {
            continue;
        };
        match field {
            SdField::Steps => metadata.steps = value,
            SdField::Sampler => metadata.sampler = value,
            SdField::Cfg => metadata.cfg = value,
            SdField::Seed => metadata.seed = Seed::Text(value),
            SdField::Size => metadata.size = Some(value),
            SdField::ScheduleType => metadata.scheduler = value,
            SdField::Model => metadata.set_model(Some(value.as_str())),
        }
    }

    for line in section.lines() {
        for (key, value) in split_key_values(line) {
            metadata.parameters.insert(key, value);
        }
    }
    metadata.raw_parameters = Some(params.to_string());
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::tags;

    fn parse(params: &str) -> ExtractedMetadata {
        StableDiffusionParser.parse(&tags(&[("parameters", params)]))
    }

    #[test]
    fn text_layout_round_trip() {
        let meta = parse(
            "cat sitting\nNegative prompt: blurry\nSteps: 20, Sampler: Euler, CFG scale: 7.5, Seed: 42, Size: 512x512, Model: foo",
        );
        assert_eq!(meta.generator, GeneratorFamily::StableDiffusion);
        assert_eq!(meta.positive_prompt, "cat sitting");
        assert_eq!(meta.negative_prompt, "blurry");
        assert_eq!(meta.steps, "20");
        assert_eq!(meta.sampler, "Euler");
        assert_eq!(meta.cfg, "7.5");
        assert_eq!(meta.seed, Seed::Text("42".into()));
        assert_eq!(meta.size.as_deref(), Some("512x512"));
        assert_eq!(meta.model, "foo");
    }

    #[test]
    fn model_hash_is_not_model() {
        let meta = parse("x\nSteps: 4, Model hash: abc123, Schedule type: Karras, Hires steps: 9");
        assert_eq!(meta.model, "Unknown");
        assert_eq!(meta.scheduler, "Karras");
        assert_eq!(meta.steps, "4");
        assert_eq!(meta.parameters.get("Model hash").map(String::as_str), Some("abc123"));
        assert_eq!(meta.parameters.get("Hires steps").map(String::as_str), Some("9"));
    }

    #[test]
    fn no_negative_marker_stops_at_steps() {
        let meta = parse("a cat\non a mat\nSteps: 10, Seed: -1");
        assert_eq!(meta.positive_prompt, "a cat\non a mat");
        assert_eq!(meta.negative_prompt, "");
        assert_eq!(meta.seed, Seed::Text("-1".into()));
    }

    #[test]
    fn params_on_negative_line() {
        let meta = parse(
            "cat sitting\nNegative prompt: blurry, Steps: 20, Sampler: Euler, CFG scale: 7.5, Seed: 42",
        );
        assert_eq!(meta.positive_prompt, "cat sitting");
        assert_eq!(meta.negative_prompt, "blurry");
        assert_eq!(meta.steps, "20");
        assert_eq!(meta.sampler, "Euler");
        assert_eq!(meta.cfg, "7.5");
        assert_eq!(meta.seed, Seed::Text("42".into()));
    }

    #[test]
    fn params_on_positive_line() {
        let meta = parse("cat sitting, Steps: 20, Sampler: Euler, Seed: 42");
        assert_eq!(meta.positive_prompt, "cat sitting");
        assert_eq!(meta.negative_prompt, "");
        assert_eq!(meta.steps, "20");
        assert_eq!(meta.sampler, "Euler");
        assert_eq!(meta.seed, Seed::Text("42".into()));
    }

    #[test]
    fn first_steps_label_opens_section() {
        let meta = parse("p\nNegative prompt: n\nSteps: 5, Hires steps: 9, Sampler: DDIM\nSteps: 7");
        assert_eq!(meta.negative_prompt, "n");
        assert_eq!(meta.steps, "5");
        assert_eq!(meta.sampler, "DDIM");
    }

    #[test]
    fn multi_line_negative() {
        let meta = parse("p\nNegative prompt: a,\nb\nSteps: 1");
        assert_eq!(meta.negative_prompt, "a,\nb");
    }

    #[test]
    fn prompt_only() {
        let meta = parse("just words");
        assert_eq!(meta.positive_prompt, "just words");
        assert_eq!(meta.steps, "");
        assert_eq!(meta.model, "Unknown");
    }

    #[test]
    fn json_layout_same_shape() {
        let meta = parse(
            r#"{"prompt": "cat sitting", "negative_prompt": "blurry", "guidance_scale": 7.5, "num_inference_steps": 20, "seed": 42, "scheduler": "DPMSolverMultistep", "model": "foo", "width": 512, "height": 512}"#,
        );
        assert_eq!(meta.positive_prompt, "cat sitting");
        assert_eq!(meta.negative_prompt, "blurry");
        assert_eq!(meta.cfg, "7.5");
        assert_eq!(meta.steps, "20");
        assert_eq!(meta.seed.to_string(), "42");
        assert!(matches!(meta.seed, Seed::Number(_)));
        assert_eq!(meta.scheduler, "DPMSolverMultistep");
        assert_eq!(meta.model, "foo");
        assert_eq!(meta.size.as_deref(), Some("512x512"));
    }

    #[test]
    fn broken_json_falls_back_to_text() {
        let meta = parse("mentions negative_prompt literally\nSteps: 3");
        assert_eq!(meta.positive_prompt, "mentions negative_prompt literally");
        assert_eq!(meta.steps, "3");
    }

    #[test]
    fn missing_parameters_degrades() {
        let meta = StableDiffusionParser.parse(&tags(&[("Comment", "x")]));
        assert_eq!(meta.generator, GeneratorFamily::StableDiffusion);
        assert_eq!(meta.positive_prompt, "x");
    }
}
