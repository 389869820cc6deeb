//! Shared test utilities for the promptlens test suite.
//!
//! Builders for the inputs every layer consumes: tag dictionaries, matcher
//! registries backed by inline dictionaries, and synthetic PNG/TIFF bytes.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let dict = tags(&[("Software", "NovelAI"), ("Comment", "{}")]);
//! let registry = inline_registry("wlop", "hatsune miku");
//! registry.initialize().unwrap();
//!
//! let png = png_with_chunks(&[png_chunk(b"tEXt", b"parameters\0a cat")]);
//! ```

use std::path::Path;

use crate::matcher::{DictionarySource, MatcherRegistry};
use crate::tags::{Tag, TagDictionary};

// =========================================================================
// Tags and matchers
// =========================================================================

/// Text-only tag dictionary.
pub fn tags(entries: &[(&str, &str)]) -> TagDictionary {
    entries
        .iter()
        .map(|(name, value)| (*name, Tag::text(*value)))
        .collect()
}

/// Registry over in-memory dictionaries. Not initialized.
pub fn inline_registry(artists: &str, characters: &str) -> MatcherRegistry {
    MatcherRegistry::new(
        DictionarySource::Inline(artists.to_string()),
        DictionarySource::Inline(characters.to_string()),
    )
}

// =========================================================================
// PNG
// =========================================================================

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// One PNG chunk with a correct CRC.
pub fn png_chunk(kind: &[u8], body: &[u8]) -> Vec<u8> {
    let mut crc = flate2::Crc::new();
    crc.update(kind);
    crc.update(body);

    let mut out = Vec::with_capacity(body.len() + 12);
    out.extend((body.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    out.extend(crc.sum().to_be_bytes());
    out
}

/// Signature + 4x3 RGB IHDR + `chunks` + IEND. No pixel data.
pub fn png_with_chunks(chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut ihdr = Vec::new();
    ihdr.extend(4u32.to_be_bytes());
    ihdr.extend(3u32.to_be_bytes());
    ihdr.extend([8, 2, 0, 0, 0]);

    let mut out = PNG_SIGNATURE.to_vec();
    out.extend(png_chunk(b"IHDR", &ihdr));
    for chunk in chunks {
        out.extend(chunk);
    }
    out.extend(png_chunk(b"IEND", b""));
    out
}

/// Offset just past the IHDR chunk of an encoder-written PNG.
const AFTER_IHDR: usize = 8 + 12 + 13;

/// Write a real, decodable 4x3 PNG carrying `tEXt` chunks.
pub fn write_text_png(path: &Path, entries: &[(&str, &str)]) {
    image::RgbImage::new(4, 3).save(path).unwrap();
    let encoded = std::fs::read(path).unwrap();

    let mut out = encoded[..AFTER_IHDR].to_vec();
    for (keyword, text) in entries {
        let mut body = keyword.as_bytes().to_vec();
        body.push(0);
        body.extend_from_slice(text.as_bytes());
        out.extend(png_chunk(b"tEXt", &body));
    }
    out.extend_from_slice(&encoded[AFTER_IHDR..]);
    std::fs::write(path, out).unwrap();
}

// =========================================================================
// TIFF / EXIF
// =========================================================================

/// Big-endian TIFF with ASCII tags in IFD0 and, optionally, an Exif sub-IFD
/// holding `UserComment`.
pub fn tiff_with(ascii: &[(u16, &str)], user_comment: Option<&[u8]>) -> Vec<u8> {
    let entry_count = ascii.len() + usize::from(user_comment.is_some());
    let data_start = 8 + 2 + 12 * entry_count + 4;
    let mut entries = Vec::new();
    let mut data = Vec::new();

    for (tag, text) in ascii {
        let mut value = text.as_bytes().to_vec();
        value.push(0);
        entries.extend(tag.to_be_bytes());
        entries.extend(2u16.to_be_bytes());
        entries.extend((value.len() as u32).to_be_bytes());
        if value.len() <= 4 {
            value.resize(4, 0);
            entries.extend(value);
        } else {
            entries.extend(((data_start + data.len()) as u32).to_be_bytes());
            data.extend(value);
        }
    }

    if let Some(comment) = user_comment {
        let exif_offset = data_start + data.len();
        entries.extend(0x8769u16.to_be_bytes());
        entries.extend(4u16.to_be_bytes());
        entries.extend(1u32.to_be_bytes());
        entries.extend((exif_offset as u32).to_be_bytes());

        let comment_offset = exif_offset + 2 + 12 + 4;
        data.extend(1u16.to_be_bytes());
        data.extend(0x9286u16.to_be_bytes());
        data.extend(7u16.to_be_bytes());
        data.extend((comment.len() as u32).to_be_bytes());
        data.extend((comment_offset as u32).to_be_bytes());
        data.extend(0u32.to_be_bytes());
        data.extend_from_slice(comment);
    }

    let mut out = b"MM\0\x2a".to_vec();
    out.extend(8u32.to_be_bytes());
    out.extend((entry_count as u16).to_be_bytes());
    out.extend(entries);
    out.extend(0u32.to_be_bytes());
    out.extend(data);
    out
}
