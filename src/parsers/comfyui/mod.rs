//! ComfyUI and its derivatives.
//!
//! Three historical export formats, tried in this order; the first one that
//! reads successfully wins:
//!
//! | Tag | Shape | Reader |
//! |-----|-------|--------|
//! | `generation_data` | flat JSON, NUL-terminated | [`read_generation_data`] |
//! | `workflow` | node-and-link editor graph | [`workflow`] |
//! | `prompt` | node-id → `{class_type, inputs}` | [`prompt_graph`] |
//!
//! If all present formats fail, the parser reports the last failure and the
//! record degrades to the generic reading.

pub mod prompt_graph;
pub mod workflow;

use super::{
    FamilyParser, PayloadError, collect_scalars, first_seed, first_text, parse_object, size_from,
};
use crate::detect::GeneratorFamily;
use crate::metadata::ExtractedMetadata;
use crate::tags::TagDictionary;

pub struct ComfyUiParser;

type SubFormat = fn(&str) -> Result<ExtractedMetadata, PayloadError>;

const SUB_FORMATS: &[(&str, SubFormat)] = &[
    ("generation_data", read_generation_data),
    ("workflow", workflow::read_workflow),
    ("prompt", prompt_graph::read_prompt_graph),
];

impl FamilyParser for ComfyUiParser {
    fn family(&self) -> GeneratorFamily {
        GeneratorFamily::ComfyUi
    }

    fn try_parse(&self, tags: &TagDictionary) -> Result<ExtractedMetadata, PayloadError> {
        let mut last_error = PayloadError::MissingTag("prompt");
        for (tag, read) in SUB_FORMATS {
            let Some(payload) = tags.text(tag) else {
                continue;
            };
            match read(&payload) {
                Ok(mut metadata) => {
                    tracing::debug!(format = tag, "read ComfyUI payload");
                    metadata.raw_parameters = Some(payload.into_owned());
                    return Ok(metadata);
                }
                Err(e) => {
                    tracing::debug!(format = tag, error = %e, "ComfyUI sub-format unreadable");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

/// `generation_data`: a flat JSON object with stray NUL terminators.
///
/// | Key | Field |
/// |-----|-------|
/// | `prompt` / `negativePrompt` | prompts |
/// | `cfgScale` | cfg |
/// | `steps` | steps |
/// | `seed` | seed |
/// | `ksamplerName` → `samplerName` | sampler |
/// | `schedule` | scheduler |
/// | `baseModel.modelFileName` → `baseModel.modelName` | model |
pub fn read_generation_data(payload: &str) -> Result<ExtractedMetadata, PayloadError> {
    let cleaned = payload.replace('\0', "");
    let data = parse_object(&cleaned)?;

    let mut metadata = ExtractedMetadata::new(GeneratorFamily::ComfyUi);
    collect_scalars(&mut metadata, &data, &["prompt", "negativePrompt"]);
    metadata.positive_prompt = first_text(&data, &["prompt"]).unwrap_or_default();
    metadata.negative_prompt = first_text(&data, &["negativePrompt"]).unwrap_or_default();
    metadata.cfg = first_text(&data, &["cfgScale"]).unwrap_or_default();
    metadata.steps = first_text(&data, &["steps"]).unwrap_or_default();
    metadata.seed = first_seed(&data, &["seed"]).unwrap_or_default();
    metadata.sampler = first_text(&data, &["ksamplerName", "samplerName"]).unwrap_or_default();
    metadata.scheduler = first_text(&data, &["schedule"]).unwrap_or_default();
    metadata.size = size_from(&data, "width", "height");
    let model = first_text(
        &data,
        &["/baseModel/modelFileName", "/baseModel/modelName"],
    );
    metadata.set_model(model.as_deref());
    Ok(metadata)
}
