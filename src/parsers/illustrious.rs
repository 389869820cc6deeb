//! IllustriousXL: one JSON object under `generate_info`.
//!
//! | Key | Field |
//! |-----|-------|
//! | `checkpoint` | model |
//! | `cfgScale` | cfg |
//! | `steps` | steps |
//! | `seed` | seed |
//! | `samplerName` | sampler |
//! | `scheduler` | scheduler |
//! | `prompt` / `negativePrompt` | prompts |

use super::{
    FamilyParser, PayloadError, collect_scalars, first_seed, first_text, parse_object, size_from,
};
use crate::detect::GeneratorFamily;
use crate::metadata::ExtractedMetadata;
use crate::tags::TagDictionary;

pub struct IllustriousParser;

impl FamilyParser for IllustriousParser {
    fn family(&self) -> GeneratorFamily {
        GeneratorFamily::IllustriousXl
    }

    fn try_parse(&self, tags: &TagDictionary) -> Result<ExtractedMetadata, PayloadError> {
        let info = tags
            .text("generate_info")
            .ok_or(PayloadError::MissingTag("generate_info"))?;
        let payload = parse_object(&info)?;

        let mut metadata = ExtractedMetadata::new(GeneratorFamily::IllustriousXl);
        collect_scalars(&mut metadata, &payload, &["prompt", "negativePrompt"]);
        let model = first_text(&payload, &["checkpoint"]);
        metadata.set_model(model.as_deref());
        metadata.cfg = first_text(&payload, &["cfgScale"]).unwrap_or_default();
        metadata.steps = first_text(&payload, &["steps"]).unwrap_or_default();
        metadata.seed = first_seed(&payload, &["seed"]).unwrap_or_default();
        metadata.sampler = first_text(&payload, &["samplerName"]).unwrap_or_default();
        metadata.scheduler = first_text(&payload, &["scheduler"]).unwrap_or_default();
        metadata.size = size_from(&payload, "width", "height");
        metadata.positive_prompt = first_text(&payload, &["prompt"]).unwrap_or_default();
        metadata.negative_prompt = first_text(&payload, &["negativePrompt"]).unwrap_or_default();
        metadata.raw_parameters = Some(info.into_owned());
        Ok(metadata)
    }
}
