//! Input decoding and image plumbing shared by the pipeline stages.

use std::io::Cursor;

use image::{DynamicImage, ImageOutputFormat, RgbImage};

use super::geometry::Rect;
use super::OcrError;

/// Smallest byte length a real encoded image can have (a 1x1 PNG).
pub const MIN_IMAGE_BYTES: usize = 67;

/// Largest accepted input, 50 MB.
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

/// Reject clearly invalid input before attempting a decode.
pub fn validate_image_bytes(bytes: &[u8]) -> Result<(), OcrError> {
    if bytes.is_empty() {
        return Err(OcrError::InvalidInput("Image data is empty".into()));
    }
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(OcrError::InvalidInput(
            "Image data too small to be valid".into(),
        ));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(OcrError::InvalidInput(format!(
            "Image data exceeds {}MB limit",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Decode an encoded image and apply its EXIF orientation, so that pixel
/// space matches what a viewer would show.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, OcrError> {
    validate_image_bytes(bytes)?;

    let img = image::load_from_memory(bytes)
        .map_err(|e| OcrError::InvalidInput(format!("Failed to decode image: {e}")))?;

    let orientation = read_exif_orientation(bytes);
    if orientation != 1 {
        tracing::debug!(orientation, "Applying EXIF orientation");
    }
    let img = apply_orientation(img, orientation);

    if img.width() == 0 || img.height() == 0 {
        return Err(OcrError::InvalidInput("Image has zero dimensions".into()));
    }
    Ok(img)
}

/// EXIF tag 0x0112. Returns 1 (normal) when absent or unreadable.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let Ok(reader) = exif::Reader::new().read_from_container(&mut cursor) else {
        return 1;
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// 1 normal, 2 mirrored, 3 180°, 4 flipped vertically, 5 mirrored + 90° CW,
/// 6 90° CW, 7 mirrored + 270° CW, 8 270° CW. Anything else is identity.
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Cut `rect` (top-left origin, pixels) out of `img`, clamped to its bounds.
/// `None` when the clamped area is empty.
pub fn crop_region(img: &RgbImage, rect: &Rect) -> Option<RgbImage> {
    let px = rect.clamped_pixels(img.width(), img.height())?;
    Some(image::imageops::crop_imm(img, px.x, px.y, px.width, px.height).to_image())
}

/// Lossy JPEG encoding for upload. `quality` is 1..=100.
pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut cursor, ImageOutputFormat::Jpeg(quality.clamp(1, 100)))?;
    Ok(cursor.into_inner())
}
