// ============================================================================
// UPLOAD — validate, decode, auto-crop and place customer artwork
// ============================================================================

use std::path::Path;
use std::sync::mpsc;

use image::RgbaImage;

use crate::autocrop;
use crate::error::UploadError;
use crate::units::{Rect, inches_to_px};

/// Raster formats the canvas can decode.
pub const DECODABLE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// Offered by the file picker but refused at upload time.
pub const VECTOR_EXTENSIONS: &[&str] = &["ai", "svg", "eps", "psd", "pdf"];

/// Longer side of freshly imported art.
pub const IMPORT_LONG_SIDE_IN: f32 = 3.0;

/// Closest an imported image may sit to the viewport edge.
pub const MIN_MARGIN: f32 = 8.0;

/// Every extension the file picker lists.
pub fn accepted_extensions() -> Vec<&'static str> {
    DECODABLE_EXTENSIONS
        .iter()
        .chain(VECTOR_EXTENSIONS.iter())
        .copied()
        .collect()
}

/// Lower-cased extension of a file name, if any.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Synchronous gate run before any decode work.
pub fn validate(name: &str, size: u64, limit: u64) -> Result<(), UploadError> {
    if size == 0 {
        return Err(UploadError::Empty);
    }
    if size > limit {
        return Err(UploadError::TooLarge { size, limit });
    }
    let ext = extension_of(name).unwrap_or_default();
    if !DECODABLE_EXTENSIONS.contains(&ext.as_str()) {
        return Err(UploadError::UnsupportedFormat(ext));
    }
    Ok(())
}

/// Decoded, cropped artwork ready to become an image element.
pub struct PreparedUpload {
    pub name: String,
    pub image: RgbaImage,
    /// PNG encoding of `image`.
    pub png: Vec<u8>,
}

/// Completion posted by a background upload task.
pub struct UploadMessage {
    pub name: String,
    pub result: Result<PreparedUpload, UploadError>,
}

/// Decode and auto-crop.  Runs on a worker thread.
pub fn prepare(name: &str, bytes: &[u8]) -> Result<PreparedUpload, UploadError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| UploadError::Decode(e.to_string()))?
        .into_rgba8();
    let (image, png) =
        autocrop::auto_crop_encoded(&decoded).map_err(|e| UploadError::Decode(e.to_string()))?;
    Ok(PreparedUpload { name: name.to_string(), image, png })
}

/// Run [`prepare`] on the rayon pool and post the result to `sender`.
pub fn spawn_prepare(name: String, bytes: Vec<u8>, sender: mpsc::Sender<UploadMessage>) {
    rayon::spawn(move || {
        let result = prepare(&name, &bytes);
        let _ = sender.send(UploadMessage { name, result });
    });
}

/// Placement for imported art: longer side scaled to three inches, centered
/// in `viewport`, and kept at least `border_reserve` plus [`MIN_MARGIN`]
/// away from its top-left edges.
pub fn auto_layout(image_width: u32, image_height: u32, viewport: Rect, border_reserve: f32) -> Rect {
    let long_side = inches_to_px(IMPORT_LONG_SIDE_IN);
    let (iw, ih) = (image_width.max(1) as f32, image_height.max(1) as f32);
    let scale = long_side / iw.max(ih);
    let w = iw * scale;
    let h = ih * scale;

    let margin = border_reserve.max(0.0) + MIN_MARGIN;
    let x = (viewport.x + (viewport.width - w) * 0.5).max(viewport.x + margin);
    let y = (viewport.y + (viewport.height - h) * 0.5).max(viewport.y + margin);
    Rect::new(x, y, w, h)
}
