// ============================================================================
// UNITS & GEOMETRY — fixed-DPI conversion, rectangles, 2-D affine transforms
// ============================================================================

use serde::{Deserialize, Serialize};

/// Print resolution used for every pixel↔inch conversion in the editor.
pub const PX_PER_INCH: f32 = 96.0;

#[inline]
pub fn px_to_inches(px: f32) -> f32 {
    px / PX_PER_INCH
}

#[inline]
pub fn inches_to_px(inches: f32) -> f32 {
    inches * PX_PER_INCH
}

/// Parse a numeric form field.  Anything that is not a finite, non-negative
/// number reads as `0.0` instead of failing.
pub fn parse_dimension(input: &str) -> f32 {
    match input.trim().parse::<f32>() {
        Ok(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

/// Axis-aligned rectangle in canvas space (float px).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Inclusive on all four edges.
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Overlap of two rectangles, or `None` when they do not overlap.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        (x1 > x0 && y1 > y0).then(|| Rect::new(x0, y0, x1 - x0, y1 - y0))
    }

    pub fn inflate(&self, by: f32) -> Rect {
        Rect::new(
            self.x - by,
            self.y - by,
            self.width + by * 2.0,
            self.height + by * 2.0,
        )
    }
}

/// 2×3 affine matrix using the canvas convention:
/// `x' = a·x + c·y + e`, `y' = b·x + d·y + f`.
///
/// Builder methods post-multiply, so the most recently appended operation
/// is the first one applied to a point (same as a 2-D canvas context).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine {
    pub const fn identity() -> Self {
        Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 }
    }

    /// `self × other`: `other` is applied to the point first.
    pub fn then(&self, other: &Affine) -> Affine {
        Affine {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn translate(&self, tx: f32, ty: f32) -> Affine {
        self.then(&Affine { e: tx, f: ty, ..Affine::identity() })
    }

    pub fn scale(&self, sx: f32, sy: f32) -> Affine {
        self.then(&Affine { a: sx, d: sy, ..Affine::identity() })
    }

    pub fn rotate_deg(&self, degrees: f32) -> Affine {
        let (sin, cos) = degrees.to_radians().sin_cos();
        self.then(&Affine { a: cos, b: sin, c: -sin, d: cos, e: 0.0, f: 0.0 })
    }

    #[inline]
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Inverse transform, or `None` for a degenerate (zero-area) matrix.
    pub fn invert(&self) -> Option<Affine> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < 1e-12 {
            return None;
        }
        let inv = 1.0 / det;
        Some(Affine {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            e: (self.c * self.f - self.d * self.e) * inv,
            f: (self.b * self.e - self.a * self.f) * inv,
        })
    }

    /// Axis-aligned bounds of `rect` after transformation.
    pub fn map_rect(&self, rect: &Rect) -> Rect {
        let corners = [
            self.apply(rect.x, rect.y),
            self.apply(rect.right(), rect.y),
            self.apply(rect.x, rect.bottom()),
            self.apply(rect.right(), rect.bottom()),
        ];
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        for (x, y) in corners {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Uniform scale factor (geometric mean of the axis scales).
    pub fn scale_factor(&self) -> f32 {
        (self.a * self.d - self.b * self.c).abs().sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn inch_conversion_uses_96_dpi() {
        assert!(close(px_to_inches(288.0), 3.0));
        assert!(close(inches_to_px(1.5), 144.0));
    }

    #[test]
    fn invalid_dimensions_read_as_zero() {
        assert_eq!(parse_dimension("abc"), 0.0);
        assert_eq!(parse_dimension(""), 0.0);
        assert_eq!(parse_dimension("-3"), 0.0);
        assert_eq!(parse_dimension("NaN"), 0.0);
        assert_eq!(parse_dimension(" 2.5 "), 2.5);
    }

    #[test]
    fn rotation_about_center_keeps_center_fixed() {
        let m = Affine::identity()
            .translate(50.0, 50.0)
            .rotate_deg(90.0)
            .translate(-50.0, -50.0);
        let (cx, cy) = m.apply(50.0, 50.0);
        assert!(close(cx, 50.0) && close(cy, 50.0));
        let (x, y) = m.apply(60.0, 50.0);
        assert!(close(x, 50.0) && close(y, 60.0));
    }

    #[test]
    fn invert_round_trips_a_point() {
        let m = Affine::identity().scale(2.0, 2.0).translate(10.0, 5.0).rotate_deg(30.0);
        let inv = m.invert().unwrap();
        let (x, y) = m.apply(3.0, 7.0);
        let (bx, by) = inv.apply(x, y);
        assert!(close(bx, 3.0) && close(by, 7.0));
    }

    #[test]
    fn degenerate_matrix_has_no_inverse() {
        assert!(Affine::identity().scale(0.0, 1.0).invert().is_none());
    }

    #[test]
    fn rect_contains_is_edge_inclusive() {
        let r = Rect::new(10.0, 10.0, 20.0, 5.0);
        assert!(r.contains(10.0, 10.0));
        assert!(r.contains(30.0, 15.0));
        assert!(!r.contains(30.1, 12.0));
    }
}
