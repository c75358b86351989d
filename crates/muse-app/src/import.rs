//! Image import: validation, down-scaling and JPEG re-encoding.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use muse_core::{DisplayHandle, ImageRef};
use std::io::Cursor;
use thiserror::Error;

/// Longest side of a stored image, in pixels.
pub const MAX_DIMENSION: u32 = 800;
pub const JPEG_QUALITY: u8 = 60;
pub const STORED_MIME: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("failed to process image: {0}")]
    Image(#[from] image::ImageError),
}

/// A file handed over by the host (picker or drop).
#[derive(Debug, Clone)]
pub struct ImportFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImportFile {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Decode `file`, shrink it to fit [`MAX_DIMENSION`] and re-encode as JPEG.
pub fn prepare_image(file: &ImportFile) -> Result<ImageRef, ImportError> {
    if !file.is_image() {
        return Err(ImportError::UnsupportedType(file.mime_type.clone()));
    }
    let decoded = image::load_from_memory(&file.bytes)?;
    let (width, height) = decoded.dimensions();
    let scaled = if width.max(height) > MAX_DIMENSION {
        decoded.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Triangle)
    } else {
        decoded
    };

    let rgb = DynamicImage::ImageRgb8(scaled.to_rgb8());
    let mut jpeg = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(
        &mut Cursor::new(&mut jpeg),
        JPEG_QUALITY,
    ))?;
    log::debug!(
        "{}: {width}x{height} -> {}x{}, {} bytes",
        file.name,
        rgb.width(),
        rgb.height(),
        jpeg.len()
    );

    Ok(ImageRef {
        name: file.name.clone(),
        mime_type: STORED_MIME.to_string(),
        data: STANDARD.encode(&jpeg),
        handle: Some(DisplayHandle::new(jpeg)),
    })
}
