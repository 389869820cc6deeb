//! JPEG and WebP metadata segments.
//!
//! JPEG: walk the marker segments up to start-of-scan.
//!
//! | Marker | Segment | Tags |
//! |--------|---------|------|
//! | `0xFFFE` | COM | `Comment` |
//! | `0xFFE1` | APP1 `Exif\0\0` | see [`exif`](super::exif) |
//!
//! WebP: walk the RIFF chunks for `EXIF`.

use super::exif;
use crate::tags::{Tag, TagDictionary};

const EXIF_HEADER: &[u8] = b"Exif\0\0";

pub(crate) fn read_jpeg_segments(data: &[u8]) -> TagDictionary {
    let mut tags = TagDictionary::new();
    // Skip SOI
    let mut pos = 2;

    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            break;
        }
        let marker = data[pos + 1];
        // Fill bytes
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        // SOS (0xDA) means image data starts; EOI ends the file
        if marker == 0xDA || marker == 0xD9 {
            break;
        }
        // Markers without length field
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            pos += 2;
            continue;
        }

        let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if seg_len < 2 {
            break;
        }
        let seg_end = (pos + 2 + seg_len).min(data.len());
        let segment = &data[pos + 4..seg_end];

        match marker {
            0xFE => {
                let text = String::from_utf8_lossy(segment);
                let text = text.trim_end_matches('\0');
                if !text.trim().is_empty() {
                    tags.insert_first("Comment", Tag::text(text));
                }
            }
            0xE1 => {
                if let Some(tiff) = segment.strip_prefix(EXIF_HEADER) {
                    for (name, tag) in exif::read_tiff(tiff) {
                        tags.insert_first(name, tag);
                    }
                }
            }
            _ => {}
        }

        pos += 2 + seg_len;
    }

    tags
}

pub(crate) fn read_webp_chunks(data: &[u8]) -> TagDictionary {
    let mut tags = TagDictionary::new();
    // RIFF header: "RIFF" size "WEBP"
    let mut pos = 12;

    while pos + 8 <= data.len() {
        let fourcc = &data[pos..pos + 4];
        let len = u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]]) as usize;
        let start = pos + 8;
        let Some(body) = start.checked_add(len).and_then(|end| data.get(start..end)) else {
            break;
        };
        if fourcc == b"EXIF" {
            let tiff = body.strip_prefix(EXIF_HEADER).unwrap_or(body);
            for (name, tag) in exif::read_tiff(tiff) {
                tags.insert_first(name, tag);
            }
        }
        // Chunks are padded to even length
        pos = start + len + (len % 2);
    }

    tags
}
