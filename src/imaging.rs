//! Receipt photo pre-processing: file type sniffing and downscaling before
//! the image is stored and sent to the vision model.

use std::borrow::Cow;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ImageFormat;

use crate::error::{FaturaError, Result};

pub const DEFAULT_MAX_EDGE: u32 = 1600;
pub const JPEG_QUALITY: u8 = 90;

const ACCEPTED: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::WebP,
    ImageFormat::Gif,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
];

/// Sniff the image format from the leading bytes. Anything that is not one
/// of the accepted raster formats is rejected.
pub fn detect_format(bytes: &[u8], name: &str) -> Result<ImageFormat> {
    match image::guess_format(bytes) {
        Ok(format) if ACCEPTED.contains(&format) => Ok(format),
        _ => Err(FaturaError::UnsupportedFileType(name.to_string())),
    }
}

pub fn mime_type(format: ImageFormat) -> &'static str {
    format.to_mime_type()
}

pub fn extension(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("img")
}

/// Target size when the image exceeds `max_edge`, `None` when it already fits.
pub fn scaled_dimensions(width: u32, height: u32, max_edge: u32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }
    let ratio = f64::min(
        max_edge as f64 / width as f64,
        max_edge as f64 / height as f64,
    );
    if ratio >= 1.0 {
        return None;
    }
    let w = (width as f64 * ratio).round().max(1.0) as u32;
    let h = (height as f64 * ratio).round().max(1.0) as u32;
    Some((w, h))
}

#[derive(Debug)]
pub struct Prepared<'a> {
    pub data: Cow<'a, [u8]>,
    pub format: ImageFormat,
}

impl Prepared<'_> {
    pub fn was_resized(&self) -> bool {
        matches!(self.data, Cow::Owned(_))
    }
}

/// Downscale so the longest edge is at most `max_edge`, re-encoding as
/// JPEG. Images that already fit, and images that fail to decode or
/// encode, come back as the original bytes.
pub fn downscale(bytes: &[u8], format: ImageFormat, max_edge: u32) -> Prepared<'_> {
    let unchanged = Prepared {
        data: Cow::Borrowed(bytes),
        format,
    };

    let img = match image::load_from_memory_with_format(bytes, format) {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!(error = %e, "could not decode image, keeping original");
            return unchanged;
        }
    };

    let Some((w, h)) = scaled_dimensions(img.width(), img.height(), max_edge) else {
        return unchanged;
    };

    let resized = img.resize_exact(w, h, FilterType::Triangle).to_rgb8();
    let mut buf = Vec::new();
    let encoded = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).encode_image(&resized);
    if let Err(e) = encoded {
        tracing::warn!(error = %e, "could not re-encode resized image, keeping original");
        return unchanged;
    }

    tracing::info!(
        from_width = img.width(),
        from_height = img.height(),
        width = w,
        height = h,
        bytes = buf.len(),
        "downscaled receipt image"
    );
    Prepared {
        data: Cow::Owned(buf),
        format: ImageFormat::Jpeg,
    }
}
