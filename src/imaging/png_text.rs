//! PNG text chunks.
//!
//! ```text
//! tEXt  keyword \0 text                                    (Latin-1; UTF-8 accepted)
//! zTXt  keyword \0 method compressed-text                  (zlib)
//! iTXt  keyword \0 flag method language \0 translated \0 text (UTF-8, zlib if flag = 1)
//! eXIf  TIFF-structured EXIF
//! ```
//!
//! Each text chunk becomes one tag named by its keyword. A keyword seen twice
//! keeps its first value. A truncated chunk ends the walk; what was read
//! before it is kept.

use super::exif;
use crate::tags::{Tag, TagDictionary};
use flate2::read::ZlibDecoder;
use std::io::Read;

pub(crate) const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Upper bound on one inflated text chunk.
const MAX_INFLATED: u64 = 16 * 1024 * 1024;

pub(crate) fn read_png_text(data: &[u8]) -> TagDictionary {
    let mut tags = TagDictionary::new();
    let mut pos = PNG_SIGNATURE.len();

    while pos + 8 <= data.len() {
        let len = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        let kind = &data[pos + 4..pos + 8];
        let start = pos + 8;
        let Some(body) = start.checked_add(len).and_then(|end| data.get(start..end)) else {
            tracing::debug!(offset = pos, "truncated PNG chunk");
            break;
        };

        match kind {
            b"tEXt" => {
                if let Some((keyword, text)) = split_keyword(body) {
                    tags.insert_first(keyword, Tag::text(decode_text(text)));
                }
            }
            b"zTXt" => {
                if let Some((keyword, rest)) = split_keyword(body)
                    && let Some(text) = rest.get(1..).and_then(inflate)
                {
                    tags.insert_first(keyword, Tag::text(decode_text(&text)));
                }
            }
            b"iTXt" => {
                if let Some((keyword, text)) = read_itxt(body) {
                    tags.insert_first(keyword, Tag::text(text));
                }
            }
            b"eXIf" => {
                for (name, tag) in exif::read_tiff(body) {
                    tags.insert_first(name, tag);
                }
            }
            b"IEND" => break,
            _ => {}
        }

        // data + CRC
        pos = start + len + 4;
    }

    tags
}

fn split_keyword(body: &[u8]) -> Option<(String, &[u8])> {
    let nul = body.iter().position(|&b| b == 0)?;
    let keyword = latin1(&body[..nul]);
    if keyword.is_empty() {
        return None;
    }
    Some((keyword, &body[nul + 1..]))
}

fn read_itxt(body: &[u8]) -> Option<(String, String)> {
    let (keyword, rest) = split_keyword(body)?;
    let (&compressed, rest) = rest.split_first()?;
    let (_method, rest) = rest.split_first()?;
    let language_end = rest.iter().position(|&b| b == 0)?;
    let rest = &rest[language_end + 1..];
    let translated_end = rest.iter().position(|&b| b == 0)?;
    let text = &rest[translated_end + 1..];

    let text = if compressed == 1 {
        String::from_utf8_lossy(&inflate(text)?).into_owned()
    } else {
        String::from_utf8_lossy(text).into_owned()
    };
    Some((keyword, text))
}

/// UTF-8 when valid, otherwise Latin-1.
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => latin1(bytes),
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn inflate(compressed: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    match ZlibDecoder::new(compressed)
        .take(MAX_INFLATED)
        .read_to_end(&mut out)
    {
        Ok(_) => Some(out),
        Err(e) => {
            tracing::debug!(error = %e, "PNG text chunk failed to inflate");
            None
        }
    }
}
