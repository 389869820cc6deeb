//! Generator-family detection.
//!
//! Classifies a [`TagDictionary`] into exactly one [`GeneratorFamily`] by
//! checking signatures top to bottom; the first match wins. Signatures
//! overlap (a ComfyUI export can carry a Midjourney-style description), so
//! the order is part of the contract:
//!
//! | # | Family | Signature |
//! |---|--------|-----------|
//! | 1 | Midjourney | `Software`/description/`UserComment` mentions Midjourney, or a description/`Comment` carries a `--flag` token |
//! | 2 | ComfyUI | any of `prompt`, `workflow`, `generation_data` |
//! | 3 | NovelAI | `Software` is exactly `NovelAI` |
//! | 4 | IllustriousXL | `generate_info` |
//! | 5 | Stable Diffusion | `parameters` |
//! | 6 | Unknown | everything else |

use crate::tags::TagDictionary;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The tool inferred to have produced an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeneratorFamily {
    #[serde(rename = "NovelAI")]
    NovelAi,
    #[serde(rename = "ComfyUI")]
    ComfyUi,
    #[serde(rename = "Stable Diffusion")]
    StableDiffusion,
    #[serde(rename = "IllustriousXL")]
    IllustriousXl,
    Midjourney,
    Unknown,
}

impl GeneratorFamily {
    pub const ALL: [GeneratorFamily; 6] = [
        GeneratorFamily::NovelAi,
        GeneratorFamily::ComfyUi,
        GeneratorFamily::StableDiffusion,
        GeneratorFamily::IllustriousXl,
        GeneratorFamily::Midjourney,
        GeneratorFamily::Unknown,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GeneratorFamily::NovelAi => "NovelAI",
            GeneratorFamily::ComfyUi => "ComfyUI",
            GeneratorFamily::StableDiffusion => "Stable Diffusion",
            GeneratorFamily::IllustriousXl => "IllustriousXL",
            GeneratorFamily::Midjourney => "Midjourney",
            GeneratorFamily::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for GeneratorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tags that may name Midjourney as the producing tool.
const MIDJOURNEY_NAME_TAGS: &[&str] = &["Software", "Description", "ImageDescription", "UserComment"];
/// Free-text tags that may carry Midjourney's `--flag` parameters.
const FLAG_TAGS: &[&str] = &["Description", "ImageDescription", "Comment"];
/// Any one of these marks one of ComfyUI's three export formats.
const COMFYUI_TAGS: &[&str] = &["prompt", "workflow", "generation_data"];

const NOVELAI_SOFTWARE: &str = "NovelAI";

/// Classify a tag dictionary. Never fails: anything unrecognised is
/// [`GeneratorFamily::Unknown`].
pub fn detect(tags: &TagDictionary) -> GeneratorFamily {
    let family = if is_midjourney(tags) {
        GeneratorFamily::Midjourney
    } else if COMFYUI_TAGS.iter().any(|name| tags.contains(name)) {
        GeneratorFamily::ComfyUi
    } else if tags
        .text("Software")
        .is_some_and(|s| s.trim() == NOVELAI_SOFTWARE)
    {
        GeneratorFamily::NovelAi
    } else if tags.contains("generate_info") {
        GeneratorFamily::IllustriousXl
    } else if tags.contains("parameters") {
        GeneratorFamily::StableDiffusion
    } else {
        GeneratorFamily::Unknown
    };
    tracing::debug!(%family, tag_count = tags.len(), "detected generator family");
    family
}

fn is_midjourney(tags: &TagDictionary) -> bool {
    let named = MIDJOURNEY_NAME_TAGS.iter().any(|name| {
        tags.text(name)
            .is_some_and(|text| text.to_lowercase().contains("midjourney"))
    });
    named
        || FLAG_TAGS
            .iter()
            .any(|name| tags.text(name).is_some_and(|text| has_flag_token(&text)))
}

/// True when `text` contains a whitespace-delimited `--name` token.
pub(crate) fn has_flag_token(text: &str) -> bool {
    text.split_whitespace().any(is_flag_token)
}

pub(crate) fn is_flag_token(token: &str) -> bool {
    token
        .strip_prefix("--")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_alphabetic())
}
