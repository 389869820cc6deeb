//! Reading metadata containers and dimensions from image files.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Dimensions** | `image::image_dimensions` |
//! | **PNG text** | custom chunk walker, `flate2` for `zTXt`/`iTXt` |
//! | **JPEG / WebP EXIF** | custom marker/RIFF walker + TIFF IFD reader |
//!
//! The container is identified by its magic bytes, not its extension. Every
//! format is flattened into a [`TagDictionary`]; nothing here interprets the
//! tags.

mod exif;
mod jpeg;
mod png_text;

use crate::tags::TagDictionary;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Extensions picked up when walking a directory.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{} is not a PNG, JPEG or WebP image", .0.display())]
    UnrecognizedFormat(PathBuf),
    #[error("{} has no metadata", .0.display())]
    NoMetadata(PathBuf),
    #[error("failed to decode image: {0}")]
    Decode(String),
}

/// Pixel size of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Png,
    Jpeg,
    WebP,
}

impl ContainerFormat {
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(png_text::PNG_SIGNATURE) {
            Some(Self::Png)
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Some(Self::WebP)
        } else {
            None
        }
    }
}

/// Tags of an in-memory image. `None` when the container is not recognised.
pub fn parse_container(data: &[u8]) -> Option<TagDictionary> {
    let tags = match ContainerFormat::sniff(data)? {
        ContainerFormat::Png => png_text::read_png_text(data),
        ContainerFormat::Jpeg => jpeg::read_jpeg_segments(data),
        ContainerFormat::WebP => jpeg::read_webp_chunks(data),
    };
    Some(tags)
}

/// Read the tag dictionary of the image at `path`.
pub fn read_tags(path: &Path) -> Result<TagDictionary, ReadError> {
    let data = std::fs::read(path)?;
    let tags =
        parse_container(&data).ok_or_else(|| ReadError::UnrecognizedFormat(path.to_path_buf()))?;
    if tags.is_empty() {
        return Err(ReadError::NoMetadata(path.to_path_buf()));
    }
    tracing::debug!(path = %path.display(), tags = tags.len(), "read tags");
    Ok(tags)
}

/// Pixel dimensions of the image at `path`.
pub fn read_dimensions(path: &Path) -> Result<Dimensions, ReadError> {
    let (width, height) = image::image_dimensions(path)
        .map_err(|e| ReadError::Decode(format!("Failed to read dimensions: {}", e)))?;
    Ok(Dimensions { width, height })
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Expand `inputs` into image files.
///
/// Files are kept as given. Directories are walked recursively for files
/// with a [supported extension](SUPPORTED_EXTENSIONS), sorted by path.
pub fn collect_images(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut images = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| has_supported_extension(p))
                .collect();
            found.sort();
            images.extend(found);
        } else {
            images.push(input.clone());
        }
    }
    images
}
