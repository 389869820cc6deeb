//! The raw tag dictionary read from an image's metadata container.
//!
//! Every container format (PNG text chunks, EXIF IFDs, JPEG comments) is
//! flattened into the same shape before any interpretation happens:
//!
//! ```text
//! tag name  →  { value: text | number | bytes, description: optional text }
//! ```
//!
//! Keys are case-sensitive and format-specific (`parameters`, `prompt`,
//! `UserComment`, `Software`, ...). The dictionary is immutable for the
//! duration of a parse; parsers only ever read it through [`TagDictionary::text`]
//! or the raw [`Tag`] accessors.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// The value half of a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Text(String),
    Number(f64),
    Bytes(Vec<u8>),
}

/// A single metadata entry: the stored value plus an optional
/// human-readable rendering of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub value: TagValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Tag {
    /// A text tag whose description mirrors its value.
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            description: Some(text.clone()),
            value: TagValue::Text(text),
        }
    }

    /// A byte-sequence tag with no pre-rendered description.
    pub fn bytes(bytes: Vec<u8>) -> Self {
        Self {
            value: TagValue::Bytes(bytes),
            description: None,
        }
    }

    /// A numeric tag.
    pub fn number(n: f64) -> Self {
        Self {
            value: TagValue::Number(n),
            description: None,
        }
    }

    /// Readable text for this tag.
    ///
    /// Precedence: description → text value → number → decoded bytes.
    pub fn as_text(&self) -> Cow<'_, str> {
        if let Some(description) = &self.description {
            return Cow::Borrowed(description);
        }
        match &self.value {
            TagValue::Text(s) => Cow::Borrowed(s),
            TagValue::Number(n) => Cow::Owned(format_number(*n)),
            TagValue::Bytes(bytes) => Cow::Owned(decode_byte_text(bytes)),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Mapping from tag name to [`Tag`], ordered by name for stable output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagDictionary {
    tags: BTreeMap<String, Tag>,
}

impl TagDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a tag.
    pub fn insert(&mut self, name: impl Into<String>, tag: Tag) {
        self.tags.insert(name.into(), tag);
    }

    /// Insert a tag only if the name is not already present.
    pub fn insert_first(&mut self, name: impl Into<String>, tag: Tag) {
        self.tags.entry(name.into()).or_insert(tag);
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.tags.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    /// Readable text of a tag, if present.
    pub fn text(&self, name: &str) -> Option<Cow<'_, str>> {
        self.get(name).map(Tag::as_text)
    }

    /// Text of the first tag in `names` that is present and non-blank.
    pub fn first_text(&self, names: &[&str]) -> Option<Cow<'_, str>> {
        names
            .iter()
            .filter_map(|name| self.text(name))
            .find(|text| !text.trim().is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tag)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl IntoIterator for TagDictionary {
    type Item = (String, Tag);
    type IntoIter = std::collections::btree_map::IntoIter<String, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.into_iter()
    }
}

impl<K: Into<String>> FromIterator<(K, Tag)> for TagDictionary {
    fn from_iter<I: IntoIterator<Item = (K, Tag)>>(iter: I) -> Self {
        Self {
            tags: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Byte-sequence decoding
// ---------------------------------------------------------------------------

const HEADER_LEN: usize = 8;

/// Decode a byte-sequence tag into text.
///
/// EXIF `UserComment` starts with an 8-byte character code:
///
/// ```text
/// "ASCII\0\0\0"   → ASCII / UTF-8 body
/// "UNICODE\0"     → UTF-16 body (byte order sniffed, BOM honoured)
/// "JIS\0\0\0\0\0" → treated as UTF-8 (lossy)
/// "\0" * 8        → undefined, treated as UTF-8
/// ```
///
/// Bytes without a recognised header are decoded as lossy UTF-8.
/// Trailing NULs are dropped.
pub fn decode_byte_text(bytes: &[u8]) -> String {
    let text = if bytes.len() >= HEADER_LEN {
        let (header, body) = bytes.split_at(HEADER_LEN);
        match header {
            b"UNICODE\0" => decode_utf16(body),
            b"ASCII\0\0\0" | b"JIS\0\0\0\0\0" | [0, 0, 0, 0, 0, 0, 0, 0] => {
                String::from_utf8_lossy(body).into_owned()
            }
            _ => String::from_utf8_lossy(bytes).into_owned(),
        }
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    };
    text.trim_end_matches('\0').to_string()
}

fn decode_utf16(body: &[u8]) -> String {
    let (big_endian, body) = match body {
        [0xFE, 0xFF, rest @ ..] => (true, rest),
        [0xFF, 0xFE, rest @ ..] => (false, rest),
        // ASCII-range text has its zero byte first in big-endian order
        [0, b, ..] if *b != 0 => (true, body),
        [a, 0, ..] if *a != 0 => (false, body),
        _ => (true, body),
    };
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16_be(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect()
    }

    fn utf16_le(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    #[test]
    fn description_wins_over_value() {
        let tag = Tag {
            value: TagValue::Number(3.0),
            description: Some("three".into()),
        };
        assert_eq!(tag.as_text(), "three");
    }

    #[test]
    fn integral_numbers_render_without_fraction() {
        assert_eq!(Tag::number(512.0).as_text(), "512");
        assert_eq!(Tag::number(7.5).as_text(), "7.5");
    }

    #[test]
    fn unicode_user_comment_big_endian() {
        let mut bytes = b"UNICODE\0".to_vec();
        bytes.extend(utf16_be("cat, Steps: 20"));
        assert_eq!(decode_byte_text(&bytes), "cat, Steps: 20");
    }

    #[test]
    fn unicode_user_comment_little_endian() {
        let mut with_bom = b"UNICODE\0".to_vec();
        with_bom.extend([0xFF, 0xFE]);
        with_bom.extend(utf16_le("猫 girl"));
        assert_eq!(decode_byte_text(&with_bom), "猫 girl");

        let mut ascii_first = b"UNICODE\0".to_vec();
        ascii_first.extend(utf16_le("girl 猫"));
        assert_eq!(decode_byte_text(&ascii_first), "girl 猫");
    }

    #[test]
    fn ascii_user_comment_strips_header_and_nuls() {
        let bytes = b"ASCII\0\0\0hello\0\0".to_vec();
        assert_eq!(decode_byte_text(&bytes), "hello");
    }

    #[test]
    fn headerless_bytes_decode_as_utf8() {
        assert_eq!(decode_byte_text(b"short"), "short");
        assert_eq!(decode_byte_text("plain utf8 text".as_bytes()), "plain utf8 text");
    }

    #[test]
    fn first_text_skips_blank_tags() {
        let tags: TagDictionary = [
            ("Description", Tag::text("   ")),
            ("Comment", Tag::text("found")),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            tags.first_text(&["Missing", "Description", "Comment"]).as_deref(),
            Some("found")
        );
    }

    #[test]
    fn insert_first_keeps_existing() {
        let mut tags = TagDictionary::new();
        tags.insert_first("prompt", Tag::text("a"));
        tags.insert_first("prompt", Tag::text("b"));
        assert_eq!(tags.text("prompt").as_deref(), Some("a"));
    }
}
