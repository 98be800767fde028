// ============================================================================
// STICKER BORDER — directional-dilation outline around an image's silhouette
// ============================================================================
//
// The border is stamped, not computed: the image's alpha silhouette is drawn
// PASSES times in the border color, each pass shifted by the border width
// along an evenly spaced direction.  Thin or concave features can show gaps;
// that approximation is accepted.  Hole fill paints the whole element box
// behind the stamps, not just enclosed transparent regions.

use image::RgbaImage;

use crate::scene::ImageProps;
use crate::surface::{CompositeOp, Surface};
use crate::units::{Affine, Rect};

/// Number of silhouette stamps around the full circle.
pub const PASSES: usize = 16;

/// Unit offset of stamp `i`.
pub fn pass_direction(i: usize) -> (f32, f32) {
    let angle = std::f32::consts::TAU * i as f32 / PASSES as f32;
    (angle.cos(), angle.sin())
}

/// Largest offscreen layer edge, in device pixels.
pub const MAX_LAYER_SIDE: u32 = 16_384;

/// A composed sticker, positioned relative to the element's top-left corner.
pub struct StickerLayer {
    pub image: RgbaImage,
    /// Element-local user-space rectangle the layer covers.
    pub bounds: Rect,
}

/// Element-local extent of the sticker including its border.
pub fn padded_bounds(props: &ImageProps, width: f32, height: f32) -> Rect {
    let pad = props.sticker_border_width.max(0.0) + 1.0;
    Rect::new(-pad, -pad, width + pad * 2.0, height + pad * 2.0)
}

/// Compose border stamps, optional hole fill and the original image into an
/// offscreen layer rendered at `raster_scale` device pixels per user unit.
///
/// Only the part of the sticker inside `visible` (element-local user space)
/// is rasterized.  Returns `None` when nothing is visible or the layer would
/// exceed [`MAX_LAYER_SIDE`].
pub fn compose(
    img: &RgbaImage,
    props: &ImageProps,
    width: f32,
    height: f32,
    raster_scale: f32,
    visible: Rect,
) -> Option<StickerLayer> {
    if !(width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite()) {
        return None;
    }
    let border = props.sticker_border_width.max(0.0);
    let area = padded_bounds(props, width, height).intersect(&visible)?;

    let scale = if raster_scale.is_finite() { raster_scale.max(0.01) } else { 1.0 };
    let dev_w = (area.width * scale).ceil();
    let dev_h = (area.height * scale).ceil();
    if dev_w < 1.0 || dev_h < 1.0 || dev_w > MAX_LAYER_SIDE as f32 || dev_h > MAX_LAYER_SIDE as f32 {
        return None;
    }
    let (dev_w, dev_h) = (dev_w as u32, dev_h as u32);

    let mut layer = Surface::new(dev_w, dev_h);
    layer.set_transform(Affine::identity().scale(scale, scale).translate(-area.x, -area.y));
    let body = Rect::new(0.0, 0.0, width, height);

    if border > 0.0 {
        for i in 0..PASSES {
            let (ux, uy) = pass_direction(i);
            let stamp = Rect::new(ux * border, uy * border, width, height);
            layer.draw_image_silhouette(img, stamp, props.sticker_border_color);
        }
    }

    if props.fill_holes {
        layer.set_composite(CompositeOp::DestinationOver);
        layer.fill_rect(body, props.sticker_border_color);
        layer.set_composite(CompositeOp::SourceOver);
    }

    layer.draw_image(img, body);

    // Report the exact device-aligned extent so the layer maps back 1:1.
    let bounds = Rect::new(area.x, area.y, dev_w as f32 / scale, dev_h as f32 / scale);
    Some(StickerLayer { image: layer.into_image(), bounds })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn props(border: f32, fill_holes: bool) -> ImageProps {
        ImageProps {
            src: "mem".to_string(),
            sticker_mode: true,
            sticker_border_width: border,
            sticker_border_color: [0, 255, 0, 255],
            fill_holes,
            original_width: 10,
            original_height: 10,
        }
    }

    fn everything() -> Rect {
        Rect::new(-1.0e6, -1.0e6, 2.0e6, 2.0e6)
    }

    fn red_square() -> RgbaImage {
        RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]))
    }

    /// Layer pixel at element-local user coordinates (scale 1).
    fn at(layer: &StickerLayer, x: f32, y: f32) -> Rgba<u8> {
        let px = (x - layer.bounds.x) as u32;
        let py = (y - layer.bounds.y) as u32;
        *layer.image.get_pixel(px, py)
    }

    #[test]
    fn directions_cover_the_circle_evenly() {
        let (x0, y0) = pass_direction(0);
        assert!((x0 - 1.0).abs() < 1e-6 && y0.abs() < 1e-6);
        let (x4, y4) = pass_direction(4);
        assert!(x4.abs() < 1e-6 && (y4 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn border_surrounds_and_image_stays_on_top() {
        let layer = compose(&red_square(), &props(4.0, false), 10.0, 10.0, 1.0, everything()).unwrap();
        // Inside: original pixels.
        assert_eq!(at(&layer, 5.0, 5.0), Rgba([255, 0, 0, 255]));
        // Just outside each side: border color.
        assert_eq!(at(&layer, -2.0, 5.0), Rgba([0, 255, 0, 255]));
        assert_eq!(at(&layer, 12.0, 5.0), Rgba([0, 255, 0, 255]));
        assert_eq!(at(&layer, 5.0, 12.0), Rgba([0, 255, 0, 255]));
        // Beyond the border width: untouched.
        assert_eq!(at(&layer, -4.9, -4.9)[3], 0);
    }

    #[test]
    fn fill_holes_paints_behind_transparent_regions() {
        let mut img = red_square();
        for y in 2..8 {
            for x in 2..8 {
                img.put_pixel(x, y, Rgba([0, 0, 0, 0]));
            }
        }
        let open = compose(&img, &props(1.0, false), 10.0, 10.0, 1.0, everything()).unwrap();
        assert_eq!(at(&open, 5.0, 5.0)[3], 0);

        let filled = compose(&img, &props(1.0, true), 10.0, 10.0, 1.0, everything()).unwrap();
        assert_eq!(at(&filled, 5.0, 5.0), Rgba([0, 255, 0, 255]));
        // Opaque image pixels are not recolored by the fill.
        assert_eq!(at(&filled, 1.0, 1.0), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn zero_border_is_just_the_image() {
        let layer = compose(&red_square(), &props(0.0, false), 10.0, 10.0, 1.0, everything()).unwrap();
        assert_eq!(at(&layer, 5.0, 5.0), Rgba([255, 0, 0, 255]));
        assert_eq!(at(&layer, -0.5, 5.0)[3], 0);
    }

    #[test]
    fn huge_sticker_only_rasterizes_the_visible_window() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        let window = Rect::new(0.0, 0.0, 100.0, 80.0);
        let layer = compose(&img, &props(10.0, false), 20_000.0, 20_000.0, 1.0, window).unwrap();
        assert_eq!(layer.image.dimensions(), (100, 80));
        assert_eq!(layer.bounds, window);
        assert_eq!(*layer.image.get_pixel(50, 40), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn offscreen_or_oversized_layers_are_skipped() {
        let img = red_square();
        let away = Rect::new(500.0, 500.0, 10.0, 10.0);
        assert!(compose(&img, &props(2.0, false), 10.0, 10.0, 1.0, away).is_none());
        assert!(compose(&img, &props(2.0, false), 20_000.0, 20_000.0, 1.0, everything()).is_none());
        assert!(compose(&img, &props(2.0, false), f32::NAN, 10.0, 1.0, everything()).is_none());
    }
}
