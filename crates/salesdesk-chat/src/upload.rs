//! Validation and normalisation of uploaded photos.
//!
//! Accepted images are re-encoded as RGB JPEG and inlined into the user
//! message as a base64 data URL.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use image::codecs::jpeg::JpegEncoder;
use tracing::{debug, error};

use crate::error::ChatError;

const JPEG_QUALITY: u8 = 85;
const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png"];

pub const TOO_LARGE: &str = "File is too large. Please upload a file smaller than 8MB.";
pub const UNSUPPORTED_TYPE: &str = "Unsupported file type. Please upload JPEG or PNG files.";
pub const PROCESSING_FAILED: &str = "Error processing image. Please try again.";

/// Check an upload and return it as a `data:image/jpeg;base64,...` URL.
///
/// The type is judged from the file name, as the browser reports it.
pub fn image_data_url(filename: &str, bytes: &[u8], max_bytes: usize) -> Result<String, ChatError> {
    if bytes.len() > max_bytes {
        error!(size = bytes.len(), max_bytes, "Uploaded file too large");
        return Err(ChatError::InvalidImage(TOO_LARGE.to_string()));
    }

    let mime = mime_guess::from_path(filename).first();
    let allowed = mime
        .as_ref()
        .map(|m| ALLOWED_MIME_TYPES.contains(&m.essence_str()))
        .unwrap_or(false);
    if !allowed {
        error!(filename, mime = ?mime, "Unsupported upload type");
        return Err(ChatError::InvalidImage(UNSUPPORTED_TYPE.to_string()));
    }

    let jpeg = reencode_jpeg(bytes).map_err(|e| {
        error!(filename, error = %e, "Error processing image");
        ChatError::InvalidImage(PROCESSING_FAILED.to_string())
    })?;
    debug!(filename, bytes = jpeg.len(), "Processed image upload");

    Ok(format!(
        "data:image/jpeg;base64,{}",
        BASE64_STANDARD.encode(jpeg)
    ))
}

/// Decode any supported image and write it back as an RGB JPEG.
fn reencode_jpeg(bytes: &[u8]) -> image::ImageResult<Vec<u8>> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(&rgb)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    const MAX: usize = 8 * 1024 * 1024;

    fn png_bytes() -> Vec<u8> {
        let img = RgbaImage::from_pixel(4, 4, Rgba([200, 10, 10, 128]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn message(err: ChatError) -> String {
        err.to_string()
    }

    #[test]
    fn test_png_becomes_jpeg_data_url() {
        let url = image_data_url("label.png", &png_bytes(), MAX).unwrap();
        let encoded = url.strip_prefix("data:image/jpeg;base64,").unwrap();
        let jpeg = BASE64_STANDARD.decode(encoded).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_too_large_rejected_first() {
        let err = image_data_url("label.gif", &[0u8; 16], 8).unwrap_err();
        assert_eq!(message(err), TOO_LARGE);
    }

    #[test]
    fn test_unsupported_type() {
        let err = image_data_url("label.gif", &png_bytes(), MAX).unwrap_err();
        assert_eq!(message(err), UNSUPPORTED_TYPE);
        let err = image_data_url("noextension", &png_bytes(), MAX).unwrap_err();
        assert_eq!(message(err), UNSUPPORTED_TYPE);
    }

    #[test]
    fn test_undecodable_image() {
        let err = image_data_url("photo.jpg", b"not an image", MAX).unwrap_err();
        assert_eq!(message(err), PROCESSING_FAILED);
    }
}
