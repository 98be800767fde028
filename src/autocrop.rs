// ============================================================================
// AUTO-CROP — trim uploaded art to the bounding box of its non-transparent pixels
// ============================================================================

use std::io::Cursor;

use image::{DynamicImage, ImageOutputFormat, RgbaImage};
use rayon::prelude::*;

/// Integer pixel rectangle inside an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn full(img: &RgbaImage) -> Self {
        Self { x: 0, y: 0, width: img.width(), height: img.height() }
    }
}

/// Minimal rectangle containing every pixel with alpha > 0, or `None` when
/// the image is fully transparent (or empty).
pub fn opaque_bounds(img: &RgbaImage) -> Option<CropRect> {
    let w = img.width() as usize;
    if w == 0 || img.height() == 0 {
        return None;
    }
    let stride = w * 4;

    // Per-row (first, last) opaque column, reduced across rows.
    let (min_x, min_y, max_x, max_y) = img
        .as_raw()
        .par_chunks(stride)
        .enumerate()
        .filter_map(|(y, row)| {
            let first = (0..w).find(|&x| row[x * 4 + 3] > 0)?;
            let last = (first..w).rev().find(|&x| row[x * 4 + 3] > 0)?;
            Some((first, y, last, y))
        })
        .reduce(
            || (usize::MAX, usize::MAX, 0, 0),
            |a, b| (a.0.min(b.0), a.1.min(b.1), a.2.max(b.2), a.3.max(b.3)),
        );

    if min_x > max_x || min_y > max_y {
        return None;
    }
    Some(CropRect {
        x: min_x as u32,
        y: min_y as u32,
        width: (max_x - min_x + 1) as u32,
        height: (max_y - min_y + 1) as u32,
    })
}

/// Bounds the auto-crop would keep.  A fully transparent image keeps its
/// full extent, so applying this to an already-tight image returns the full
/// image rectangle.
pub fn crop_bounds(img: &RgbaImage) -> CropRect {
    opaque_bounds(img).unwrap_or_else(|| CropRect::full(img))
}

/// Copy out the opaque bounds into a new buffer sized to them.  Returns the
/// input unchanged when nothing is opaque.
pub fn auto_crop(img: &RgbaImage) -> RgbaImage {
    match opaque_bounds(img) {
        Some(r) if r != CropRect::full(img) => {
            image::imageops::crop_imm(img, r.x, r.y, r.width, r.height).to_image()
        }
        _ => img.clone(),
    }
}

/// Auto-crop and re-encode as PNG.  Returns the cropped bitmap together with
/// its encoded bytes.
pub fn auto_crop_encoded(img: &RgbaImage) -> Result<(RgbaImage, Vec<u8>), image::ImageError> {
    let cropped = auto_crop(img);
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(cropped.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)?;
    Ok((cropped, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn art() -> RgbaImage {
        let mut img = RgbaImage::new(40, 30);
        for y in 5..12 {
            for x in 8..20 {
                img.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            }
        }
        // A single faint pixel still counts as opaque.
        img.put_pixel(31, 20, Rgba([0, 0, 0, 1]));
        img
    }

    #[test]
    fn finds_tight_bounds() {
        let b = crop_bounds(&art());
        assert_eq!(b, CropRect { x: 8, y: 5, width: 24, height: 16 });
    }

    #[test]
    fn crop_is_idempotent() {
        let once = auto_crop(&art());
        assert_eq!(once.dimensions(), (24, 16));
        let bounds_again = crop_bounds(&once);
        assert_eq!(bounds_again, CropRect::full(&once));
        let twice = auto_crop(&once);
        assert_eq!(twice, once);
    }

    #[test]
    fn transparent_image_is_returned_unchanged() {
        let img = RgbaImage::new(7, 9);
        assert!(opaque_bounds(&img).is_none());
        assert_eq!(crop_bounds(&img), CropRect::full(&img));
        assert_eq!(auto_crop(&img), img);
    }

    #[test]
    fn encoded_output_decodes_to_cropped_size() {
        let (cropped, bytes) = auto_crop_encoded(&art()).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().into_rgba8();
        assert_eq!(decoded.dimensions(), cropped.dimensions());
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
    }
}
