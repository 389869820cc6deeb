//! The shared "last line is parameters" text layout.
//!
//! Several tools (A1111 JPEG `UserComment`, legacy NovelAI `Comment`,
//! unknown tools writing free text) store generation info as:
//!
//! ```text
//! <positive prompt, possibly several lines>
//! <negative prompt line>
//! Steps: 20, Sampler: Euler a, CFG scale: 7, Seed: 42, Model: foo
//! ```
//!
//! The last line is a comma-separated `key: value` block, the line before it
//! is the negative prompt, and everything earlier is the positive prompt.
//! All families use this one routine.

use crate::metadata::{ExtractedMetadata, Seed};

/// Result of splitting free text with [`split_trailing_params`].
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct TrailingParams {
    pub positive: String,
    pub negative: String,
    pub params: Vec<(String, String)>,
}

const NEGATIVE_LABEL: &str = "Negative prompt:";

/// Split `text` into positive prompt, negative prompt and parameter block.
///
/// - one line, or a last line with no `key: value` pair → all positive
/// - two lines → positive + params
/// - three or more → positive lines + negative line + params
pub(crate) fn split_trailing_params(text: &str) -> TrailingParams {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let Some((last, rest)) = lines.split_last() else {
        return TrailingParams::default();
    };
    let params = split_key_values(last);
    if rest.is_empty() || params.is_empty() {
        return TrailingParams {
            positive: lines.join("\n"),
            ..TrailingParams::default()
        };
    }

    let (negative, positive_lines) = match rest.split_last() {
        Some((negative, before)) if !before.is_empty() => (strip_negative_label(negative), before),
        _ => (String::new(), rest),
    };

    TrailingParams {
        positive: positive_lines.join("\n"),
        negative,
        params,
    }
}

fn strip_negative_label(line: &str) -> String {
    line.strip_prefix(NEGATIVE_LABEL)
        .unwrap_or(line)
        .trim()
        .to_string()
}

/// Split a `key: value, key: value` block.
///
/// Each segment is split on its *first* colon, so values keep any colons of
/// their own (`Job ID: a:b`). Commas inside double quotes do not split
/// (`Lora hashes: "a: 1, b: 2"`); the surrounding quotes are removed.
/// Segments without a colon or with an empty key are dropped.
pub(crate) fn split_key_values(block: &str) -> Vec<(String, String)> {
    split_unquoted_commas(block)
        .into_iter()
        .filter_map(|segment| {
            let (key, value) = segment.split_once(':')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

fn split_unquoted_commas(block: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, c) in block.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                segments.push(&block[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&block[start..]);
    segments
}

/// Copy a parameter block into `metadata`: every pair lands in
/// `parameters`, and the well-known keys (matched case-insensitively) fill
/// the core fields.
///
/// | Key | Field |
/// |-----|-------|
/// | `Steps` | steps |
/// | `Sampler` | sampler |
/// | `CFG scale`, `CFG`, `Scale` | cfg |
/// | `Seed` | seed |
/// | `Model` | model |
/// | `Schedule type`, `Scheduler`, `Schedule` | scheduler |
/// | `Size` | size |
pub(crate) fn apply_standard_params(metadata: &mut ExtractedMetadata, params: &[(String, String)]) {
    for (key, value) in params {
        metadata.parameters.insert(key.clone(), value.clone());
        match key.to_ascii_lowercase().as_str() {
            "steps" => metadata.steps = value.clone(),
            "sampler" => metadata.sampler = value.clone(),
            "cfg scale" | "cfg" | "scale" => metadata.cfg = value.clone(),
            "seed" => metadata.seed = Seed::Text(value.clone()),
            "model" => metadata.set_model(Some(value)),
            "schedule type" | "scheduler" | "schedule" => metadata.scheduler = value.clone(),
            "size" => metadata.size = Some(value.clone()),
            _ => {}
        }
    }
}
