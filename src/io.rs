// ============================================================================
// IO — PNG export, data-URL snapshots, `.ssd` design files
// ============================================================================

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::Path;

use base64::{Engine as _, engine::general_purpose};
use image::{DynamicImage, ImageOutputFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::scene::CanvasState;

pub const DESIGN_MAGIC_V1: &str = "SSD1";
pub const DESIGN_EXTENSION: &str = "ssd";

/// Largest logical canvas edge accepted from a design file.
const MAX_CANVAS_DIM: u32 = 32_768;

/// Largest element coordinate or edge accepted from a design file.
const MAX_ELEMENT_EXTENT: f32 = 1_000_000.0;

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, EngineError> {
    let mut out = Vec::new();
    DynamicImage::ImageRgba8(img.clone()).write_to(&mut Cursor::new(&mut out), ImageOutputFormat::Png)?;
    Ok(out)
}

/// `data:image/png;base64,…` for the cart snapshot.
pub fn png_data_url(img: &RgbaImage) -> Result<String, EngineError> {
    let png = encode_png(img)?;
    Ok(format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(png)))
}

/// On-disk design: the scene plus the encoded bytes of every in-memory
/// image source it references, so uploads survive a reload.
#[derive(Serialize, Deserialize)]
pub struct DesignFileV1 {
    pub magic: String,
    pub state: CanvasState,
    pub blobs: Vec<(String, Vec<u8>)>,
}

impl DesignFileV1 {
    pub fn new(state: CanvasState, blobs: Vec<(String, Vec<u8>)>) -> Self {
        Self { magic: DESIGN_MAGIC_V1.to_string(), state, blobs }
    }
}

pub fn save_design(design: &DesignFileV1, path: &Path) -> Result<(), EngineError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    bincode::serialize_into(writer, design)?;
    Ok(())
}

pub fn load_design(path: &Path) -> Result<DesignFileV1, EngineError> {
    let raw = std::fs::read(path)?;
    decode_design(&raw)
}

pub fn decode_design(raw: &[u8]) -> Result<DesignFileV1, EngineError> {
    // bincode writes a String as an 8-byte length prefix then UTF-8, so the
    // 4-char magic sits at bytes 8..12.
    if raw.len() < 12 {
        return Err(EngineError::InvalidFormat("File too small".into()));
    }
    let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    if magic != DESIGN_MAGIC_V1 {
        return Err(EngineError::InvalidFormat(format!("Unknown magic '{}'", magic)));
    }
    let design: DesignFileV1 = bincode::deserialize(raw)?;
    let s = &design.state;
    if s.width == 0 || s.height == 0 || s.width > MAX_CANVAS_DIM || s.height > MAX_CANVAS_DIM {
        return Err(EngineError::InvalidFormat(format!(
            "Canvas size {}x{} out of range",
            s.width, s.height
        )));
    }
    check_elements(s)?;
    Ok(design)
}

/// Ids must be unique and geometry finite and in range.
fn check_elements(state: &CanvasState) -> Result<(), EngineError> {
    let mut seen = HashSet::with_capacity(state.elements.len());
    for el in &state.elements {
        if !seen.insert(el.id) {
            return Err(EngineError::InvalidFormat(format!("Duplicate element id {}", el.id)));
        }
        let coords = [el.x, el.y, el.rotation, el.opacity];
        let edges = [el.width, el.height];
        let bad = coords.iter().any(|v| !v.is_finite() || v.abs() > MAX_ELEMENT_EXTENT)
            || edges.iter().any(|v| !v.is_finite() || *v < 0.0 || *v > MAX_ELEMENT_EXTENT);
        if bad {
            return Err(EngineError::InvalidFormat(format!("Element '{}' has invalid geometry", el.name)));
        }
    }
    Ok(())
}
