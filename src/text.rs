// ============================================================================
// TEXT — system font lookup, line measurement and glyph rasterization
// ============================================================================

use std::collections::{HashMap, HashSet};

use ab_glyph::{Font, FontArc, GlyphId, ScaleFont, point};
use image::{GrayImage, Luma};

use crate::scene::{TextAlign, TextProps};

/// Line advance as a multiple of the font size.
pub const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// Average glyph advance assumed when no font could be loaded.
const FALLBACK_ADVANCE: f32 = 0.5;

/// Load a font by family name and CSS-style weight from the system.
/// Falls back to the platform's generic sans-serif face, and returns `None`
/// when neither can be loaded.
pub fn load_system_font(family: &str, weight: u16) -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::{Properties, Weight};
    use font_kit::source::SystemSource;

    let mut props = Properties::new();
    props.weight = Weight(weight as f32);

    let source = SystemSource::new();
    let handle = source
        .select_best_match(
            &[FamilyName::Title(family.to_string()), FamilyName::SansSerif],
            &props,
        )
        .ok()?;

    let font_data = handle.load().ok()?;
    let bytes: Vec<u8> = (*font_data.copy_font_data()?).clone();
    FontArc::try_from_vec(bytes).ok()
}

/// Loaded faces keyed by `(family, weight)`.  A failed lookup is cached as
/// `None` so the system font database is queried once per key.
pub struct FontBook {
    fonts: HashMap<(String, u16), Option<FontArc>>,
    system_lookup: bool,
    warned: HashSet<String>,
}

impl Default for FontBook {
    fn default() -> Self {
        Self::new()
    }
}

impl FontBook {
    pub fn new() -> Self {
        Self {
            fonts: HashMap::new(),
            system_lookup: true,
            warned: HashSet::new(),
        }
    }

    /// A book that never touches the system font database; every family
    /// resolves to fallback metrics unless registered with [`Self::insert`].
    pub fn offline() -> Self {
        Self { system_lookup: false, ..Self::new() }
    }

    pub fn insert(&mut self, family: &str, weight: u16, font: FontArc) {
        self.fonts.insert((family.to_string(), weight), Some(font));
    }

    pub fn font(&mut self, family: &str, weight: u16) -> Option<FontArc> {
        let key = (family.to_string(), weight);
        if let Some(cached) = self.fonts.get(&key) {
            return cached.clone();
        }
        let loaded = if self.system_lookup {
            load_system_font(family, weight)
        } else {
            None
        };
        if loaded.is_none() && self.system_lookup && self.warned.insert(family.to_string()) {
            log_warn!("No font available for family '{}'; text will use fallback metrics", family);
        }
        self.fonts.insert(key, loaded.clone());
        loaded
    }

    pub fn clear(&mut self) {
        self.fonts.clear();
        self.warned.clear();
    }
}

/// Advance width of one line at `font_size`.
pub fn measure_line(font: Option<&FontArc>, line: &str, font_size: f32) -> f32 {
    let Some(font) = font else {
        return line.chars().count() as f32 * font_size * FALLBACK_ADVANCE;
    };
    let scaled = font.as_scaled(font_size);
    let mut width = 0.0f32;
    let mut last: Option<GlyphId> = None;
    for ch in line.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = last {
            width += scaled.kern(prev, id);
        }
        width += scaled.h_advance(id);
        last = Some(id);
    }
    width
}

/// Widest line of `props.text`.
pub fn measure_text(font: Option<&FontArc>, props: &TextProps) -> f32 {
    props
        .text
        .split('\n')
        .map(|line| measure_line(font, line, props.font_size))
        .fold(0.0, f32::max)
}

/// Horizontal start of a line relative to the element's left edge.
pub fn line_origin_x(align: TextAlign, box_width: f32, line_width: f32) -> f32 {
    match align {
        TextAlign::Left => 0.0,
        TextAlign::Center => box_width * 0.5 - line_width * 0.5,
        TextAlign::Right => box_width - line_width,
    }
}

/// Coverage mask for a block of text plus where it sits relative to the
/// element's top-left corner (user units).
pub struct TextRaster {
    pub mask: GrayImage,
    pub offset_x: f32,
    pub offset_y: f32,
    pub width: f32,
    pub height: f32,
}

/// Rasterize `props.text` laid out inside a box `box_width` wide.  Lines use
/// a top baseline and a `1.2 × font_size` advance.  `raster_scale` is device
/// pixels per user unit so the mask is sharp at the output density.
pub fn rasterize(font: &FontArc, props: &TextProps, box_width: f32, raster_scale: f32) -> Option<TextRaster> {
    if props.text.is_empty() || props.font_size <= 0.0 {
        return None;
    }
    let scale = raster_scale.max(0.01);
    let line_height = props.font_size * LINE_HEIGHT_FACTOR;
    let lines: Vec<&str> = props.text.split('\n').collect();

    let widths: Vec<f32> = lines
        .iter()
        .map(|l| measure_line(Some(font), l, props.font_size))
        .collect();
    let starts: Vec<f32> = widths
        .iter()
        .map(|w| line_origin_x(props.text_align, box_width, *w))
        .collect();

    let min_x = starts.iter().copied().fold(f32::MAX, f32::min);
    let max_x = starts
        .iter()
        .zip(&widths)
        .map(|(s, w)| s + w)
        .fold(f32::MIN, f32::max);
    let width = (max_x - min_x).max(0.0);
    let height = line_height * lines.len() as f32;
    if width <= 0.0 {
        return None;
    }
    let buf_w = (width * scale).ceil() as u32 + 2;
    let buf_h = (height * scale).ceil() as u32 + 2;

    let px_size = props.font_size * scale;
    let scaled = font.as_scaled(px_size);
    let ascent = scaled.ascent();
    let mut mask = GrayImage::new(buf_w, buf_h);

    for (i, line) in lines.iter().enumerate() {
        let mut cursor = (starts[i] - min_x) * scale;
        let baseline = i as f32 * line_height * scale + ascent;
        let mut last: Option<GlyphId> = None;
        for ch in line.chars() {
            let id = font.glyph_id(ch);
            if let Some(prev) = last {
                cursor += scaled.kern(prev, id);
            }
            let glyph = id.with_scale_and_position(px_size, point(cursor, baseline));
            if let Some(outlined) = font.outline_glyph(glyph) {
                let b = outlined.px_bounds();
                outlined.draw(|gx, gy, cov| {
                    let x = b.min.x as i32 + gx as i32;
                    let y = b.min.y as i32 + gy as i32;
                    if x >= 0 && y >= 0 && (x as u32) < buf_w && (y as u32) < buf_h {
                        let p = mask.get_pixel_mut(x as u32, y as u32);
                        let v = (p[0] as f32 / 255.0 + cov).min(1.0);
                        *p = Luma([(v * 255.0).round() as u8]);
                    }
                });
            }
            cursor += scaled.h_advance(id);
            last = Some(id);
        }
    }

    Some(TextRaster {
        mask,
        offset_x: min_x,
        offset_y: 0.0,
        width: buf_w as f32 / scale,
        height: buf_h as f32 / scale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(text: &str, size: f32) -> TextProps {
        TextProps {
            text: text.to_string(),
            font_size: size,
            font_family: "Nope".to_string(),
            text_color: [255, 255, 255, 255],
            font_weight: 400,
            text_align: TextAlign::Left,
        }
    }

    #[test]
    fn fallback_metrics_scale_with_length() {
        assert_eq!(measure_line(None, "abcd", 20.0), 40.0);
        assert_eq!(measure_line(None, "", 20.0), 0.0);
    }

    #[test]
    fn widest_line_wins() {
        assert_eq!(measure_text(None, &props("ab\nabcdef\nabc", 10.0)), 30.0);
    }

    #[test]
    fn alignment_offsets_line_origin() {
        assert_eq!(line_origin_x(TextAlign::Left, 200.0, 50.0), 0.0);
        assert_eq!(line_origin_x(TextAlign::Center, 200.0, 50.0), 75.0);
        assert_eq!(line_origin_x(TextAlign::Right, 200.0, 50.0), 150.0);
    }

    #[test]
    fn offline_book_never_resolves() {
        let mut book = FontBook::offline();
        assert!(book.font("Arial", 400).is_none());
        assert!(book.font("Arial", 400).is_none());
    }
}
