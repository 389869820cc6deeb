//! EXIF tags generators write, read with `kamadak-exif`.
//!
//! | IFD | Tag | Name | Stored as |
//! |-----|-----|------|-----------|
//! | 0 | 0x010E | `ImageDescription` | text |
//! | 0 | 0x010F | `Make` | text |
//! | 0 | 0x0110 | `Model` | text |
//! | 0 | 0x0131 | `Software` | text |
//! | 0 | 0x013B | `Artist` | text |
//! | Exif | 0x9286 | `UserComment` | raw bytes |
//!
//! `UserComment` keeps its 8-byte character-code header; decoding happens
//! when the tag is read as text.

use crate::tags::{Tag, TagDictionary};
use ::exif::{Exif, In, Reader, Tag as ExifTag, Value};

const TEXT_TAGS: &[(ExifTag, &str)] = &[
    (ExifTag::ImageDescription, "ImageDescription"),
    (ExifTag::Make, "Make"),
    (ExifTag::Model, "Model"),
    (ExifTag::Software, "Software"),
    (ExifTag::Artist, "Artist"),
];

fn parse(data: &[u8]) -> Option<Exif> {
    let mut reader = Reader::new();
    reader.continue_on_error(true);
    let result = reader.read_raw(data.to_vec()).or_else(|e| {
        e.distill_partial_result(|errors| {
            for error in errors {
                tracing::debug!(%error, "skipped malformed EXIF field");
            }
        })
    });
    result
        .map_err(|error| tracing::debug!(%error, "unreadable EXIF block"))
        .ok()
}

/// Text of an ASCII (or byte-typed) field, NULs and whitespace trimmed.
fn field_text(value: &Value) -> Option<String> {
    let bytes: Vec<u8> = match value {
        Value::Ascii(parts) => parts.first()?.clone(),
        Value::Byte(bytes) | Value::Undefined(bytes, _) => bytes.clone(),
        _ => return None,
    };
    let text = String::from_utf8_lossy(&bytes);
    let text = text.trim_end_matches('\0').trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Read the generator-relevant tags from TIFF-structured EXIF data
/// (the payload after a JPEG APP1 `Exif\0\0` header, a PNG `eXIf` chunk or
/// a WebP `EXIF` chunk).
pub(crate) fn read_tiff(data: &[u8]) -> TagDictionary {
    let mut tags = TagDictionary::new();
    let Some(exif) = parse(data) else {
        return tags;
    };

    for (tag, name) in TEXT_TAGS {
        if let Some(field) = exif.get_field(*tag, In::PRIMARY)
            && let Some(text) = field_text(&field.value)
        {
            tags.insert(*name, Tag::text(text));
        }
    }

    if let Some(field) = exif.get_field(ExifTag::UserComment, In::PRIMARY)
        && let Value::Undefined(bytes, _) = &field.value
        && !bytes.is_empty()
    {
        tags.insert("UserComment", Tag::bytes(bytes.clone()));
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::tiff_with;

    #[test]
    fn reads_ifd0_text_and_user_comment() {
        let mut comment = b"UNICODE\0".to_vec();
        comment.extend("a fox".encode_utf16().flat_map(|u| u.to_be_bytes()));
        let tiff = tiff_with(&[(0x010E, "a fox --v 6"), (0x0131, "Midjourney")], Some(comment.as_slice()));
        let tags = read_tiff(&tiff);
        assert_eq!(tags.text("Software").as_deref(), Some("Midjourney"));
        assert_eq!(tags.text("ImageDescription").as_deref(), Some("a fox --v 6"));
        assert_eq!(tags.text("UserComment").as_deref(), Some("a fox"));
    }

    #[test]
    fn short_values_are_inline() {
        let tiff = tiff_with(&[(0x010F, "abc")], None);
        assert_eq!(read_tiff(&tiff).text("Make").as_deref(), Some("abc"));
    }

    #[test]
    fn unlisted_tags_are_ignored() {
        let tiff = tiff_with(&[(0x010F, "Canon"), (0x8298, "(c) someone")], None);
        let tags = read_tiff(&tiff);
        assert_eq!(tags.len(), 1);
        assert!(tags.contains("Make"));
    }

    #[test]
    fn garbage_yields_empty() {
        assert!(read_tiff(b"").is_empty());
        assert!(read_tiff(b"XX\0*\0\0\0\x08").is_empty());
        assert!(read_tiff(b"MM\0\x2a\xff\xff\xff\xff").is_empty());
    }
}
