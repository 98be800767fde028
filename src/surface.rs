// ============================================================================
// SURFACE — software 2-D drawing target with a canvas-style state stack
// ============================================================================
//
// Pixels are straight (non-premultiplied) RGBA8.  Every primitive is a shader
// over user space: `paint_region` walks the device pixels covered by a user
// rectangle, maps each pixel center back through the inverse transform and
// composites whatever the shader returns.  Coverage comes from signed
// distance fields with a one-device-pixel smoothstep edge.

use image::{GrayImage, RgbaImage};
use rayon::prelude::*;

use crate::units::{Affine, Rect};

/// How a new paint combines with what is already on the surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompositeOp {
    /// New paint goes on top.
    #[default]
    SourceOver,
    /// New paint goes behind existing pixels.
    DestinationOver,
}

#[derive(Clone, Copy, Debug)]
struct GraphicsState {
    transform: Affine,
    global_alpha: f32,
    composite: CompositeOp,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            transform: Affine::identity(),
            global_alpha: 1.0,
            composite: CompositeOp::SourceOver,
        }
    }
}

/// Geometry accepted by [`Surface::fill_shape`] / [`Surface::stroke_shape`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShapeGeom {
    Rect(Rect),
    Circle { cx: f32, cy: f32, r: f32 },
    /// Vertices in user space, any winding.
    Triangle([(f32, f32); 3]),
}

impl ShapeGeom {
    fn bounds(&self) -> Rect {
        match *self {
            ShapeGeom::Rect(r) => r,
            ShapeGeom::Circle { cx, cy, r } => Rect::new(cx - r, cy - r, r * 2.0, r * 2.0),
            ShapeGeom::Triangle(v) => {
                let min_x = v[0].0.min(v[1].0).min(v[2].0);
                let min_y = v[0].1.min(v[1].1).min(v[2].1);
                let max_x = v[0].0.max(v[1].0).max(v[2].0);
                let max_y = v[0].1.max(v[1].1).max(v[2].1);
                Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
            }
        }
    }

    /// Signed distance in user units (negative inside).
    fn sdf(&self, px: f32, py: f32) -> f32 {
        match *self {
            ShapeGeom::Rect(r) => {
                let (cx, cy) = r.center();
                sdf_box(px - cx, py - cy, r.width * 0.5, r.height * 0.5)
            }
            ShapeGeom::Circle { cx, cy, r } => {
                ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt() - r
            }
            ShapeGeom::Triangle(v) => sdf_convex_polygon(&v, px, py),
        }
    }
}

pub struct Surface {
    pixels: RgbaImage,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
            state: GraphicsState::default(),
            stack: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    // ---- state stack ------------------------------------------------------

    pub fn save(&mut self) {
        self.stack.push(self.state);
    }

    /// Pops the last saved state.  Unbalanced restores are ignored.
    pub fn restore(&mut self) {
        if let Some(s) = self.stack.pop() {
            self.state = s;
        }
    }

    pub fn reset_state(&mut self) {
        self.state = GraphicsState::default();
        self.stack.clear();
    }

    pub fn transform(&self) -> Affine {
        self.state.transform
    }

    pub fn set_transform(&mut self, m: Affine) {
        self.state.transform = m;
    }

    pub fn translate(&mut self, tx: f32, ty: f32) {
        self.state.transform = self.state.transform.translate(tx, ty);
    }

    pub fn rotate_deg(&mut self, degrees: f32) {
        self.state.transform = self.state.transform.rotate_deg(degrees);
    }

    pub fn scale(&mut self, sx: f32, sy: f32) {
        self.state.transform = self.state.transform.scale(sx, sy);
    }

    pub fn global_alpha(&self) -> f32 {
        self.state.global_alpha
    }

    pub fn set_global_alpha(&mut self, alpha: f32) {
        self.state.global_alpha = alpha.clamp(0.0, 1.0);
    }

    pub fn set_composite(&mut self, op: CompositeOp) {
        self.state.composite = op;
    }

    // ---- primitives -------------------------------------------------------

    /// Overwrite every pixel, ignoring transform, alpha and composite mode.
    pub fn clear(&mut self, color: [u8; 4]) {
        for p in self.pixels.pixels_mut() {
            p.0 = color;
        }
    }

    pub fn fill_rect(&mut self, rect: Rect, color: [u8; 4]) {
        self.fill_shape(ShapeGeom::Rect(rect), color);
    }

    pub fn fill_shape(&mut self, geom: ShapeGeom, color: [u8; 4]) {
        let px = self.device_pixel_size();
        let rgba = to_f32(color);
        self.paint_region(geom.bounds(), move |x, y| {
            let cov = smoothstep(0.5, -0.5, geom.sdf(x, y) / px);
            [rgba[0], rgba[1], rgba[2], rgba[3] * cov]
        });
    }

    /// Stroke centered on the outline, `width` in user units.
    pub fn stroke_shape(&mut self, geom: ShapeGeom, color: [u8; 4], width: f32) {
        if width <= 0.0 {
            return;
        }
        let px = self.device_pixel_size();
        let half = width * 0.5;
        let rgba = to_f32(color);
        self.paint_region(geom.bounds().inflate(half), move |x, y| {
            let band = geom.sdf(x, y).abs() - half;
            let cov = smoothstep(0.5, -0.5, band / px);
            [rgba[0], rgba[1], rgba[2], rgba[3] * cov]
        });
    }

    /// Dashed rectangle outline.  Dash phase starts at the top-left corner
    /// and runs clockwise around the perimeter.
    pub fn stroke_dashed_rect(&mut self, rect: Rect, color: [u8; 4], width: f32, dash: f32, gap: f32) {
        if width <= 0.0 {
            return;
        }
        let px = self.device_pixel_size();
        let half = width * 0.5;
        let period = (dash + gap).max(f32::EPSILON);
        let rgba = to_f32(color);
        let geom = ShapeGeom::Rect(rect);
        self.paint_region(rect.inflate(half), move |x, y| {
            let band = geom.sdf(x, y).abs() - half;
            let cov = smoothstep(0.5, -0.5, band / px);
            if cov <= 0.0 || perimeter_offset(&rect, x, y) % period >= dash {
                return [0.0; 4];
            }
            [rgba[0], rgba[1], rgba[2], rgba[3] * cov]
        });
    }

    /// Draw `img` stretched into `dst` (user space), bilinear filtered.
    pub fn draw_image(&mut self, img: &RgbaImage, dst: Rect) {
        self.draw_image_with(img, dst, None);
    }

    /// Stamp the alpha silhouette of `img` into `dst` as solid `color`.
    pub fn draw_image_silhouette(&mut self, img: &RgbaImage, dst: Rect, color: [u8; 4]) {
        self.draw_image_with(img, dst, Some(color));
    }

    /// Paint `color` through a coverage mask stretched into `dst`.
    pub fn draw_mask(&mut self, mask: &GrayImage, dst: Rect, color: [u8; 4]) {
        if mask.width() == 0 || mask.height() == 0 || dst.width <= 0.0 || dst.height <= 0.0 {
            return;
        }
        let sx = mask.width() as f32 / dst.width;
        let sy = mask.height() as f32 / dst.height;
        let rgba = to_f32(color);
        self.paint_region(dst, move |x, y| {
            if !dst.contains(x, y) {
                return [0.0; 4];
            }
            let cov = sample_gray_bilinear(mask, (x - dst.x) * sx - 0.5, (y - dst.y) * sy - 0.5);
            [rgba[0], rgba[1], rgba[2], rgba[3] * cov]
        });
    }

    fn draw_image_with(&mut self, img: &RgbaImage, dst: Rect, tint: Option<[u8; 4]>) {
        if img.width() == 0 || img.height() == 0 || dst.width <= 0.0 || dst.height <= 0.0 {
            return;
        }
        let px = self.device_pixel_size();
        let sx = img.width() as f32 / dst.width;
        let sy = img.height() as f32 / dst.height;
        let geom = ShapeGeom::Rect(dst);
        let tint = tint.map(to_f32);
        self.paint_region(dst, move |x, y| {
            let edge = smoothstep(0.5, -0.5, geom.sdf(x, y) / px);
            if edge <= 0.0 {
                return [0.0; 4];
            }
            let s = sample_bilinear(img, (x - dst.x) * sx - 0.5, (y - dst.y) * sy - 0.5);
            match tint {
                Some(t) => [t[0], t[1], t[2], t[3] * s[3] * edge],
                None => [s[0], s[1], s[2], s[3] * edge],
            }
        });
    }

    /// Size of one device pixel in current user units.
    fn device_pixel_size(&self) -> f32 {
        let s = self.state.transform.scale_factor();
        if s > 1e-6 { 1.0 / s } else { 1.0 }
    }

    /// Run `shader` for every device pixel whose center maps into `bounds`
    /// (plus a one-pixel apron for anti-aliasing) and composite the result.
    ///
    /// The shader receives user-space coordinates and returns straight RGB in
    /// 0–255 with alpha in 0–1.
    pub fn paint_region<F>(&mut self, bounds: Rect, shader: F)
    where
        F: Fn(f32, f32) -> [f32; 4] + Sync,
    {
        let GraphicsState { transform, global_alpha, composite } = self.state;
        if global_alpha <= 0.0 {
            return;
        }
        let Some(inv) = transform.invert() else { return };

        let w = self.pixels.width();
        let h = self.pixels.height();
        let dev = transform.map_rect(&bounds).inflate(1.0);
        let x0 = dev.x.floor().max(0.0) as u32;
        let y0 = dev.y.floor().max(0.0) as u32;
        let x1 = (dev.right().ceil().max(0.0) as u32).min(w);
        let y1 = (dev.bottom().ceil().max(0.0) as u32).min(h);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let stride = w as usize * 4;
        let raw: &mut [u8] = &mut self.pixels;
        raw[y0 as usize * stride..y1 as usize * stride]
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(row, row_buf)| {
                let dy = (y0 as usize + row) as f32 + 0.5;
                for x in x0..x1 {
                    let (ux, uy) = inv.apply(x as f32 + 0.5, dy);
                    let c = shader(ux, uy);
                    let a = c[3] * global_alpha;
                    if a <= 0.0 {
                        continue;
                    }
                    let idx = x as usize * 4;
                    blend(&mut row_buf[idx..idx + 4], c, a.min(1.0), composite);
                }
            });
    }
}

#[inline]
fn to_f32(c: [u8; 4]) -> [f32; 4] {
    [c[0] as f32, c[1] as f32, c[2] as f32, c[3] as f32 / 255.0]
}

/// Straight-alpha Porter-Duff over.  `src` RGB is 0–255, `sa` is 0–1.
#[inline]
fn blend(dst: &mut [u8], src: [f32; 4], sa: f32, op: CompositeOp) {
    let da = dst[3] as f32 / 255.0;
    let d = [dst[0] as f32, dst[1] as f32, dst[2] as f32];
    let s = [src[0], src[1], src[2]];
    let (top, top_a, bot, bot_a) = match op {
        CompositeOp::SourceOver => (s, sa, d, da),
        CompositeOp::DestinationOver => (d, da, s, sa),
    };
    let out_a = top_a + bot_a * (1.0 - top_a);
    if out_a <= 0.0 {
        dst.copy_from_slice(&[0, 0, 0, 0]);
        return;
    }
    for c in 0..3 {
        let v = (top[c] * top_a + bot[c] * bot_a * (1.0 - top_a)) / out_a;
        dst[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[inline]
fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

fn sdf_convex_polygon(verts: &[(f32, f32)], px: f32, py: f32) -> f32 {
    let n = verts.len();
    let mut d = (px - verts[0].0) * (px - verts[0].0) + (py - verts[0].1) * (py - verts[0].1);
    let mut s: f32 = 1.0;
    let mut j = n - 1;
    for i in 0..n {
        let ex = verts[j].0 - verts[i].0;
        let ey = verts[j].1 - verts[i].1;
        let wx = px - verts[i].0;
        let wy = py - verts[i].1;
        let t = ((wx * ex + wy * ey) / (ex * ex + ey * ey).max(1e-12)).clamp(0.0, 1.0);
        let bx = wx - ex * t;
        let by = wy - ey * t;
        d = d.min(bx * bx + by * by);
        // crossing test
        let c1 = py >= verts[i].1;
        let c2 = py < verts[j].1;
        let c3 = ex * wy > ey * wx;
        if (c1 && c2 && c3) || (!c1 && !c2 && !c3) {
            s = -s;
        }
        j = i;
    }
    s * d.sqrt()
}

/// Distance travelled clockwise from the top-left corner to the edge point
/// nearest `(x, y)`.
fn perimeter_offset(r: &Rect, x: f32, y: f32) -> f32 {
    let top = (y - r.y).abs();
    let right = (x - r.right()).abs();
    let bottom = (y - r.bottom()).abs();
    let left = (x - r.x).abs();
    let nearest = top.min(right).min(bottom).min(left);
    let cx = (x - r.x).clamp(0.0, r.width);
    let cy = (y - r.y).clamp(0.0, r.height);
    if nearest == top {
        cx
    } else if nearest == right {
        r.width + cy
    } else if nearest == bottom {
        r.width + r.height + (r.width - cx)
    } else {
        2.0 * r.width + r.height + (r.height - cy)
    }
}

#[inline]
fn pixel_clamped(img: &RgbaImage, x: i32, y: i32) -> [f32; 4] {
    let cx = x.clamp(0, img.width() as i32 - 1) as u32;
    let cy = y.clamp(0, img.height() as i32 - 1) as u32;
    let p = img.get_pixel(cx, cy);
    [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32 / 255.0]
}

/// Bilinear sample with alpha-weighted color so transparent neighbours do
/// not bleed dark fringes.  Returns straight RGB 0–255, alpha 0–1.
fn sample_bilinear(img: &RgbaImage, fx: f32, fy: f32) -> [f32; 4] {
    let x0 = fx.floor() as i32;
    let y0 = fy.floor() as i32;
    let dx = fx - x0 as f32;
    let dy = fy - y0 as f32;
    let taps = [
        (pixel_clamped(img, x0, y0), (1.0 - dx) * (1.0 - dy)),
        (pixel_clamped(img, x0 + 1, y0), dx * (1.0 - dy)),
        (pixel_clamped(img, x0, y0 + 1), (1.0 - dx) * dy),
        (pixel_clamped(img, x0 + 1, y0 + 1), dx * dy),
    ];
    let mut out = [0.0f32; 4];
    for (p, wgt) in taps {
        let wa = p[3] * wgt;
        out[0] += p[0] * wa;
        out[1] += p[1] * wa;
        out[2] += p[2] * wa;
        out[3] += wa;
    }
    if out[3] > 1e-6 {
        out[0] /= out[3];
        out[1] /= out[3];
        out[2] /= out[3];
    }
    out
}

fn sample_gray_bilinear(img: &GrayImage, fx: f32, fy: f32) -> f32 {
    let w = img.width() as i32;
    let h = img.height() as i32;
    let at = |x: i32, y: i32| -> f32 {
        if x < 0 || y < 0 || x >= w || y >= h {
            0.0
        } else {
            img.get_pixel(x as u32, y as u32)[0] as f32 / 255.0
        }
    };
    let x0 = fx.floor() as i32;
    let y0 = fy.floor() as i32;
    let dx = fx - x0 as f32;
    let dy = fy - y0 as f32;
    at(x0, y0) * (1.0 - dx) * (1.0 - dy)
        + at(x0 + 1, y0) * dx * (1.0 - dy)
        + at(x0, y0 + 1) * (1.0 - dx) * dy
        + at(x0 + 1, y0 + 1) * dx * dy
}
