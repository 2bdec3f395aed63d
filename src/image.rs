//! Local image files turned into data URLs for multimodal questions.
//!
//! Images are decoded, downscaled to fit [`MAX_WIDTH`] x [`MAX_HEIGHT`] and
//! re-encoded: PNG stays PNG, every other format becomes JPEG.

use std::io::Cursor;
use std::path::Path;

use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use image::{DynamicImage, ImageFormat, imageops::FilterType};

use crate::error::ImageError;

/// Maximum image width in pixels before downscaling.
pub const MAX_WIDTH: u32 = 2048;
/// Maximum image height in pixels before downscaling.
pub const MAX_HEIGHT: u32 = 2048;

/// Upper bound on the re-encoded image; keeps request bodies under the relay's body limit.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// An image ready to be attached to a question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    file_name: String,
    mime_type: &'static str,
    data_url: String,
}

impl ImageAttachment {
    pub fn from_path(path: &Path) -> Result<Self, ImageError> {
        let raw = std::fs::read(path).map_err(|e| ImageError::Io(path.display().to_string(), e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_bytes(&name, &raw)
    }

    /// Build from raw bytes; the format is detected from the bytes, then the name's extension.
    pub fn from_bytes(file_name: &str, raw: &[u8]) -> Result<Self, ImageError> {
        let format = image::guess_format(raw)
            .ok()
            .or_else(|| format_from_extension(file_name))
            .ok_or_else(|| ImageError::UnsupportedFormat(file_name.to_string()))?;

        let img = image::load_from_memory_with_format(raw, format)
            .map_err(|e| ImageError::Decode(file_name.to_string(), e.to_string()))?;
        let img = resize_if_needed(img);

        let (out_format, mime_type) = if format == ImageFormat::Png {
            (ImageFormat::Png, "image/png")
        } else {
            (ImageFormat::Jpeg, "image/jpeg")
        };
        // JPEG has no alpha channel
        let img = match out_format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
            _ => img,
        };

        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, out_format)
            .map_err(|e| ImageError::Encode(e.to_string()))?;
        let bytes = out.into_inner();

        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ImageError::TooLarge(file_name.to_string(), bytes.len(), MAX_IMAGE_BYTES));
        }

        Ok(Self {
            file_name: file_name.to_string(),
            mime_type,
            data_url: format!("data:{};base64,{}", mime_type, B64.encode(&bytes)),
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        self.mime_type
    }

    /// `data:<mime>;base64,<payload>`
    pub fn data_url(&self) -> &str {
        &self.data_url
    }
}

fn format_from_extension(file_name: &str) -> Option<ImageFormat> {
    let ext = Path::new(file_name).extension()?.to_str()?;
    ImageFormat::from_extension(ext)
}

fn resize_if_needed(img: DynamicImage) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    if w <= MAX_WIDTH && h <= MAX_HEIGHT {
        return img;
    }
    let ratio = (MAX_WIDTH as f64 / w as f64).min(MAX_HEIGHT as f64 / h as f64);
    let new_w = ((w as f64 * ratio).round() as u32).max(1);
    let new_h = ((h as f64 * ratio).round() as u32).max(1);
    img.resize(new_w, new_h, FilterType::Lanczos3)
}

/// Encoded sample images for tests across the crate
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    pub fn png() -> Vec<u8> {
        encoded(2, 2, ImageFormat::Png)
    }
}
