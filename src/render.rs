// ============================================================================
// RENDER PIPELINE — scene + image cache → pixels
// ============================================================================
//
// A frame is a pure read of the scene and whatever bitmaps are already
// decoded: images that are still pending are requested and skipped, and the
// engine re-renders when their decode lands.  Geometry helpers here are shared
// with hit-testing so both agree on where an element is.

use crate::image_cache::{DecodeStatus, ImageCache};
use crate::scene::{CanvasElement, CanvasState, ElementKind, ImageProps, ShapeProps, ShapeType, TextProps};
use crate::sticker;
use crate::surface::{ShapeGeom, Surface};
use crate::text::{self, FontBook};
use crate::units::{Affine, Rect};

pub const GRID_PERIOD: f32 = 20.0;
pub const GRID_DOT_RADIUS: f32 = 1.0;
pub const GRID_COLOR: [u8; 4] = [255, 255, 255, 26];

pub const SELECTION_COLOR: [u8; 4] = [0x00, 0xd4, 0xff, 255];
pub const SELECTION_STROKE: f32 = 2.0;
pub const SELECTION_DASH: f32 = 6.0;
pub const SELECTION_GAP: f32 = 4.0;
/// Side of a corner handle, logical units.
pub const HANDLE_SIZE: f32 = 8.0;

/// Per-frame switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    pub show_grid: bool,
    pub show_selection: bool,
}

impl RenderOptions {
    pub fn interactive(show_grid: bool) -> Self {
        Self { show_grid, show_selection: true }
    }

    /// Artwork only: no grid, no selection chrome.
    pub fn export() -> Self {
        Self { show_grid: false, show_selection: false }
    }
}

/// What a frame left undone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub elements_drawn: usize,
    /// Image elements skipped because their bitmap is still decoding.
    pub images_pending: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResizeHandle {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl ResizeHandle {
    pub fn all() -> [ResizeHandle; 4] {
        [
            ResizeHandle::TopLeft,
            ResizeHandle::TopRight,
            ResizeHandle::BottomRight,
            ResizeHandle::BottomLeft,
        ]
    }

    /// Unrotated corner position on `rect`.
    pub fn corner(&self, rect: &Rect) -> (f32, f32) {
        match self {
            ResizeHandle::TopLeft => (rect.x, rect.y),
            ResizeHandle::TopRight => (rect.right(), rect.y),
            ResizeHandle::BottomRight => (rect.right(), rect.bottom()),
            ResizeHandle::BottomLeft => (rect.x, rect.bottom()),
        }
    }

    pub fn opposite(&self) -> ResizeHandle {
        match self {
            ResizeHandle::TopLeft => ResizeHandle::BottomRight,
            ResizeHandle::TopRight => ResizeHandle::BottomLeft,
            ResizeHandle::BottomRight => ResizeHandle::TopLeft,
            ResizeHandle::BottomLeft => ResizeHandle::TopRight,
        }
    }

    /// Handle square in element-local (unrotated) space.
    pub fn rect(&self, bounds: &Rect) -> Rect {
        let (cx, cy) = self.corner(bounds);
        let half = HANDLE_SIZE * 0.5;
        Rect::new(cx - half, cy - half, HANDLE_SIZE, HANDLE_SIZE)
    }
}

/// Rotation about the element's own center.
pub fn element_transform(el: &CanvasElement) -> Affine {
    let (cx, cy) = el.bounds().center();
    Affine::identity()
        .translate(cx, cy)
        .rotate_deg(el.rotation)
        .translate(-cx, -cy)
}

/// Box the element answers hit-tests with, or `None` when it is not
/// eligible (image not decoded yet).
pub fn effective_bounds(el: &CanvasElement, cache: &ImageCache, fonts: &mut FontBook) -> Option<Rect> {
    match &el.kind {
        ElementKind::Text(t) => {
            let font = fonts.font(&t.font_family, t.font_weight);
            let w = text::measure_text(font.as_ref(), t);
            Some(Rect::new(el.x, el.y, w, t.font_size))
        }
        ElementKind::Image(img) => {
            if cache.is_loaded(&img.src) {
                Some(el.bounds())
            } else {
                None
            }
        }
        ElementKind::Shape(_) => Some(el.bounds()),
    }
}

/// Paint one frame.  `scale` is device pixels per logical unit.
pub fn render_frame(
    surface: &mut Surface,
    scale: f32,
    state: &CanvasState,
    cache: &mut ImageCache,
    fonts: &mut FontBook,
    opts: RenderOptions,
) -> FrameReport {
    let mut report = FrameReport::default();

    surface.reset_state();
    surface.clear(state.background_color);
    let base = Affine::identity().scale(scale, scale);
    surface.set_transform(base);

    if opts.show_grid {
        draw_grid(surface, state.width as f32, state.height as f32);
    }

    for idx in state.paint_order() {
        let el = &state.elements[idx];
        if !el.visible {
            continue;
        }
        surface.save();
        surface.set_global_alpha(el.opacity);
        surface.set_transform(base.then(&element_transform(el)));

        let drawn = match &el.kind {
            ElementKind::Text(t) => draw_text(surface, el, t, fonts),
            ElementKind::Shape(s) => {
                draw_shape(surface, el, s);
                true
            }
            ElementKind::Image(img) => {
                let drawn = draw_image(surface, el, img, cache);
                if matches!(cache.status(&img.src), Some(DecodeStatus::Pending)) {
                    report.images_pending += 1;
                }
                drawn
            }
        };
        if drawn {
            report.elements_drawn += 1;
        }

        if opts.show_selection && state.selected_element_id == Some(el.id) {
            surface.set_global_alpha(1.0);
            draw_selection(surface, el);
        }
        surface.restore();
    }

    report
}

fn draw_grid(surface: &mut Surface, width: f32, height: f32) {
    let mut y = GRID_PERIOD;
    while y < height {
        let mut x = GRID_PERIOD;
        while x < width {
            surface.fill_shape(ShapeGeom::Circle { cx: x, cy: y, r: GRID_DOT_RADIUS }, GRID_COLOR);
            x += GRID_PERIOD;
        }
        y += GRID_PERIOD;
    }
}

fn draw_text(surface: &mut Surface, el: &CanvasElement, t: &TextProps, fonts: &mut FontBook) -> bool {
    let Some(font) = fonts.font(&t.font_family, t.font_weight) else {
        return false;
    };
    let raster_scale = surface.transform().scale_factor();
    let Some(raster) = text::rasterize(&font, t, el.width, raster_scale) else {
        return false;
    };
    let dst = Rect::new(
        el.x + raster.offset_x,
        el.y + raster.offset_y,
        raster.width,
        raster.height,
    );
    surface.draw_mask(&raster.mask, dst, t.text_color);
    true
}

/// Geometry of a shape element in canvas space.
pub fn shape_geom(el: &CanvasElement, shape_type: ShapeType) -> ShapeGeom {
    let b = el.bounds();
    match shape_type {
        ShapeType::Rectangle => ShapeGeom::Rect(b),
        ShapeType::Circle => {
            let (cx, cy) = b.center();
            ShapeGeom::Circle { cx, cy, r: b.width.min(b.height) * 0.5 }
        }
        ShapeType::Triangle => ShapeGeom::Triangle([
            (b.x + b.width * 0.5, b.y),
            (b.right(), b.bottom()),
            (b.x, b.bottom()),
        ]),
    }
}

fn draw_shape(surface: &mut Surface, el: &CanvasElement, s: &ShapeProps) {
    let geom = shape_geom(el, s.shape_type);
    surface.fill_shape(geom, s.fill_color);
    if let Some(stroke) = s.stroke_color
        && s.stroke_width > 0.0
    {
        surface.stroke_shape(geom, stroke, s.stroke_width);
    }
}

fn draw_image(surface: &mut Surface, el: &CanvasElement, props: &ImageProps, cache: &mut ImageCache) -> bool {
    let Some(bitmap) = cache.request(&props.src) else {
        return false;
    };
    if !props.sticker_mode {
        surface.draw_image(&bitmap, el.bounds());
        return true;
    }
    let transform = surface.transform();
    let Some(inv) = transform.invert() else {
        return false;
    };
    let device = Rect::new(0.0, 0.0, surface.width() as f32, surface.height() as f32);
    let on_surface = inv.map_rect(&device).inflate(1.0);
    let visible = Rect::new(on_surface.x - el.x, on_surface.y - el.y, on_surface.width, on_surface.height);
    let raster_scale = transform.scale_factor();
    let Some(layer) = sticker::compose(&bitmap, props, el.width, el.height, raster_scale, visible) else {
        return false;
    };
    let dst = Rect::new(
        el.x + layer.bounds.x,
        el.y + layer.bounds.y,
        layer.bounds.width,
        layer.bounds.height,
    );
    surface.draw_image(&layer.image, dst);
    true
}

fn draw_selection(surface: &mut Surface, el: &CanvasElement) {
    let b = el.bounds();
    surface.stroke_dashed_rect(b, SELECTION_COLOR, SELECTION_STROKE, SELECTION_DASH, SELECTION_GAP);
    for handle in ResizeHandle::all() {
        let r = handle.rect(&b);
        surface.fill_rect(r, [255, 255, 255, 255]);
        surface.stroke_shape(ShapeGeom::Rect(r), SELECTION_COLOR, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ElementDraft;
    use image::{Rgba, RgbaImage};

    fn scene() -> CanvasState {
        CanvasState::new(100, 80, [0, 0, 0, 255])
    }

    fn frame(state: &CanvasState, cache: &mut ImageCache, opts: RenderOptions) -> RgbaImage {
        let mut surface = Surface::new(state.width, state.height);
        let mut fonts = FontBook::offline();
        render_frame(&mut surface, 1.0, state, cache, &mut fonts, opts);
        surface.into_image()
    }

    #[test]
    fn background_and_grid() {
        let state = scene();
        let mut cache = ImageCache::new();
        let plain = frame(&state, &mut cache, RenderOptions::export());
        assert_eq!(plain.get_pixel(20, 20), &Rgba([0, 0, 0, 255]));
        let grid = frame(&state, &mut cache, RenderOptions::interactive(true));
        assert_ne!(grid.get_pixel(20, 20), &Rgba([0, 0, 0, 255]));
        assert_eq!(grid.get_pixel(30, 30), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn higher_z_paints_on_top() {
        let mut state = scene();
        let a = state.add_element(ElementDraft::shape(ShapeType::Rectangle).at(10.0, 10.0).sized(40.0, 40.0));
        let mut patch = crate::scene::ElementPatch::default();
        patch.fill_color = Some([0, 0, 255, 255]);
        let b = state.add_element(ElementDraft::shape(ShapeType::Rectangle).at(30.0, 30.0).sized(40.0, 40.0));
        state.update_element(b, &patch);
        let mut cache = ImageCache::new();

        let img = frame(&state, &mut cache, RenderOptions::export());
        assert_eq!(img.get_pixel(40, 40), &Rgba([0, 0, 255, 255]));

        state.bring_to_front(a);
        let img = frame(&state, &mut cache, RenderOptions::export());
        assert_eq!(img.get_pixel(40, 40), &Rgba([0xff, 0x6b, 0x6b, 255]));
    }

    #[test]
    fn rotation_pivots_on_element_center() {
        let mut state = scene();
        let id = state.add_element(ElementDraft::shape(ShapeType::Rectangle).at(30.0, 36.0).sized(40.0, 8.0));
        let mut patch = crate::scene::ElementPatch::default();
        patch.rotation = Some(90.0);
        state.update_element(id, &patch);
        let mut cache = ImageCache::new();
        let img = frame(&state, &mut cache, RenderOptions::export());
        // Center (50, 40) stays covered; the bar is now vertical.
        assert_eq!(img.get_pixel(50, 40)[0], 0xff);
        assert_eq!(img.get_pixel(50, 24)[0], 0xff);
        assert_eq!(img.get_pixel(34, 40), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn pending_images_are_requested_once_and_skipped() {
        let mut state = scene();
        state.add_element(ElementDraft::image("never-resolves.png", 10, 10));
        let mut cache = ImageCache::new();
        let mut surface = Surface::new(100, 80);
        let mut fonts = FontBook::offline();
        let report = render_frame(&mut surface, 1.0, &state, &mut cache, &mut fonts, RenderOptions::export());
        assert_eq!(report.elements_drawn, 0);
        render_frame(&mut surface, 1.0, &state, &mut cache, &mut fonts, RenderOptions::export());
        assert!(cache.pending_count() <= 1);
    }

    #[test]
    fn invisible_elements_are_skipped() {
        let mut state = scene();
        let id = state.add_element(ElementDraft::shape(ShapeType::Rectangle).at(0.0, 0.0).sized(100.0, 80.0));
        let mut patch = crate::scene::ElementPatch::default();
        patch.visible = Some(false);
        state.update_element(id, &patch);
        let mut cache = ImageCache::new();
        let img = frame(&state, &mut cache, RenderOptions::export());
        assert_eq!(img.get_pixel(50, 40), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn selection_chrome_only_when_requested() {
        let mut state = scene();
        let id = state.add_element(ElementDraft::shape(ShapeType::Circle).at(20.0, 20.0).sized(40.0, 40.0));
        state.set_selected(Some(id));
        let mut cache = ImageCache::new();
        let plain = frame(&state, &mut cache, RenderOptions::export());
        let chrome = frame(&state, &mut cache, RenderOptions::interactive(false));
        // Top-left handle sits on the bounding-box corner, outside the circle.
        assert_eq!(plain.get_pixel(20, 20), &Rgba([0, 0, 0, 255]));
        assert_eq!(chrome.get_pixel(20, 20), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn sticker_images_draw_a_border() {
        let mut state = scene();
        let id = state.add_element(ElementDraft::image("mem://red", 10, 10).at(40.0, 30.0));
        let mut patch = crate::scene::ElementPatch::default();
        patch.sticker_mode = Some(true);
        patch.sticker_border_width = Some(4.0);
        state.update_element(id, &patch);
        let mut cache = ImageCache::new();
        cache.insert_decoded("mem://red", RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let img = frame(&state, &mut cache, RenderOptions::export());
        assert_eq!(img.get_pixel(45, 35), &Rgba([255, 0, 0, 255]));
        assert_eq!(img.get_pixel(38, 35), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn oversized_sticker_is_clipped_to_the_surface() {
        let mut state = scene();
        let id = state.add_element(ElementDraft::image("mem://red", 4, 4).at(-500.0, -500.0).sized(20_000.0, 20_000.0));
        let mut patch = crate::scene::ElementPatch::default();
        patch.sticker_mode = Some(true);
        patch.sticker_border_width = Some(10.0);
        state.update_element(id, &patch);
        let mut cache = ImageCache::new();
        cache.insert_decoded("mem://red", RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])));
        let img = frame(&state, &mut cache, RenderOptions::export());
        assert_eq!(img.get_pixel(50, 40), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn text_box_uses_measured_width_and_font_size() {
        let mut state = scene();
        let id = state.add_element(ElementDraft::text("abcd").at(5.0, 6.0));
        let cache = ImageCache::new();
        let mut fonts = FontBook::offline();
        let el = state.get(id).unwrap().clone();
        let r = effective_bounds(&el, &cache, &mut fonts).unwrap();
        // Fallback metrics: 0.5 × 24 per glyph.
        assert_eq!(r, Rect::new(5.0, 6.0, 48.0, 24.0));
    }
}
