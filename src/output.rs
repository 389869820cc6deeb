//! CLI output formatting for inspection reports.
//!
//! # Information-First Display
//!
//! Each report leads with the file and the inferred generator, followed by
//! the generation settings and prompts as indented context lines. Empty
//! fields are left out so a sparse record stays short.
//!
//! ```text
//! 001 cat.png (832x1216)
//!     Generator: Stable Diffusion
//!     Model: animagine-xl-3.1
//!     Sampler: Euler a, Steps: 28, CFG: 7, Seed: 12345
//!     Positive: 1girl, hatsune miku, by wlop
//!     Negative: lowres
//!     Artists: wlop [34..38]
//!     Characters: hatsune miku [7..19]
//!
//! 002 notes.png
//!     Error: notes.png has no metadata
//!
//! Inspected 2 files, 1 with metadata
//! ```
//!
//! # Architecture
//!
//! Every `format_*` function returns `Vec<String>` for testability and has a
//! `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::config::OutputConfig;
use crate::metadata::{ExtractedMetadata, Match};
use crate::pipeline::ImageReport;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Prompts are shown on one line.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `word [start..end], ...`
pub fn format_matches(matches: &[Match]) -> String {
    matches
        .iter()
        .map(|m| format!("{} [{}..{}]", m.word, m.start, m.end))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `Sampler: x, Steps: y, ...` with blank settings left out.
fn settings_line(meta: &ExtractedMetadata) -> Option<String> {
    let seed = meta.seed.to_string();
    let parts: Vec<String> = [
        ("Sampler", meta.sampler.as_str()),
        ("Scheduler", meta.scheduler.as_str()),
        ("Steps", meta.steps.as_str()),
        ("CFG", meta.cfg.as_str()),
        ("Seed", seed.as_str()),
        ("Size", meta.size.as_deref().unwrap_or("")),
    ]
    .iter()
    .filter(|(_, value)| !value.is_empty())
    .map(|(label, value)| format!("{label}: {value}"))
    .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

// ============================================================================
// Reports
// ============================================================================

/// Lines describing one extracted record, at `depth`.
pub fn format_metadata(meta: &ExtractedMetadata, depth: usize, config: &OutputConfig) -> Vec<String> {
    let pad = indent(depth);
    let mut lines = vec![
        format!("{pad}Generator: {}", meta.generator),
        format!("{pad}Model: {}", meta.model),
    ];
    if let Some(settings) = settings_line(meta) {
        lines.push(format!("{pad}{settings}"));
    }
    for (label, prompt) in [
        ("Positive", &meta.positive_prompt),
        ("Negative", &meta.negative_prompt),
    ] {
        let prompt = single_line(prompt);
        if !prompt.is_empty() {
            lines.push(format!(
                "{pad}{label}: {}",
                truncate_chars(&prompt, config.max_prompt_chars)
            ));
        }
    }
    if !meta.artist_matches.is_empty() {
        lines.push(format!("{pad}Artists: {}", format_matches(&meta.artist_matches)));
    }
    if !meta.character_matches.is_empty() {
        lines.push(format!(
            "{pad}Characters: {}",
            format_matches(&meta.character_matches)
        ));
    }
    lines
}

/// Header plus indented details for one inspected file.
pub fn format_report(index: usize, report: &ImageReport, config: &OutputConfig) -> Vec<String> {
    let name = report
        .path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| report.path.display().to_string());
    let header = match &report.dimensions {
        Some(d) => format!("{} {} ({}x{})", format_index(index), name, d.width, d.height),
        None => format!("{} {}", format_index(index), name),
    };

    let mut lines = vec![header];
    if let Some(meta) = &report.metadata {
        lines.extend(format_metadata(meta, 1, config));
    }
    if let Some(error) = &report.error {
        lines.push(format!("{}Error: {}", indent(1), error));
    }
    if config.show_raw_tags && !report.raw_tags.is_empty() {
        lines.push(format!("{}Tags", indent(1)));
        for (name, tag) in report.raw_tags.iter() {
            let value = single_line(&tag.as_text());
            lines.push(format!(
                "{}{}: {}",
                indent(2),
                name,
                truncate_chars(&value, config.max_prompt_chars)
            ));
        }
    }
    lines
}

/// All reports, blank-line separated, with a closing summary line.
pub fn format_reports(reports: &[ImageReport], config: &OutputConfig) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, report) in reports.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.extend(format_report(i + 1, report, config));
    }
    let with_metadata = reports.iter().filter(|r| r.metadata.is_some()).count();
    if !reports.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "Inspected {} files, {} with metadata",
        reports.len(),
        with_metadata
    ));
    lines
}

/// Print reports to stdout.
pub fn print_reports(reports: &[ImageReport], config: &OutputConfig) {
    for line in format_reports(reports, config) {
        println!("{}", line);
    }
}

// ============================================================================
// Match command
// ============================================================================

/// Artist and character hits in free text, as printed by `promptlens match`.
pub fn format_text_matches(artists: &[Match], characters: &[Match]) -> Vec<String> {
    let mut lines = Vec::new();
    for (label, matches) in [("Artists", artists), ("Characters", characters)] {
        if matches.is_empty() {
            lines.push(format!("{label}: (none)"));
        } else {
            lines.push(format!("{label}: {}", format_matches(matches)));
        }
    }
    lines
}

/// Print text matches to stdout.
pub fn print_text_matches(artists: &[Match], characters: &[Match]) {
    for line in format_text_matches(artists, characters) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
