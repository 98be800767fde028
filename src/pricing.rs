// ============================================================================
// PRICING — area × quantity-tier sticker quotes
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::units::parse_dimension;

/// Unit price of the 9 sq-in reference sticker at the base tier.
pub const REFERENCE_PRICE: f64 = 1.36;
pub const REFERENCE_AREA: f64 = 9.0;
pub const RUSH_MULTIPLIER: f64 = 1.4;

/// `(minimum quantity, multiplier)`, ascending.  The 2500 tier is priced
/// above the 1000 tier in the published table and is kept as published.
pub const QUANTITY_TIERS: [(u32, f64); 8] = [
    (50, 1.0),
    (100, 0.647),
    (200, 0.463),
    (300, 0.39),
    (500, 0.324),
    (750, 0.24),
    (1000, 0.19),
    (2500, 0.213),
];

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub per_unit: f64,
    pub total: f64,
}

/// Multiplier of the largest tier at or below `quantity`; quantities below
/// the first tier use the first tier.
pub fn tier_multiplier(quantity: u32) -> f64 {
    QUANTITY_TIERS
        .iter()
        .rev()
        .find(|(min, _)| *min <= quantity)
        .map_or(QUANTITY_TIERS[0].1, |(_, m)| *m)
}

/// Quote `quantity` stickers of `area_sq_in` each.
pub fn price(quantity: u32, area_sq_in: f64, rush_order: bool) -> PriceBreakdown {
    if quantity == 0 || !area_sq_in.is_finite() || area_sq_in <= 0.0 {
        return PriceBreakdown { per_unit: 0.0, total: 0.0 };
    }
    let scaled_base = REFERENCE_PRICE * (area_sq_in / REFERENCE_AREA);
    let mut per_unit = scaled_base * tier_multiplier(quantity);
    let mut total = per_unit * quantity as f64;
    if rush_order {
        per_unit *= RUSH_MULTIPLIER;
        total *= RUSH_MULTIPLIER;
    }
    PriceBreakdown { per_unit, total }
}

/// Round to whole cents for display.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StickerShape {
    #[default]
    DieCut,
    Circle,
    Square,
    Rectangle,
    KissCut,
}

impl StickerShape {
    pub fn label(&self) -> &'static str {
        match self {
            StickerShape::DieCut => "Die Cut",
            StickerShape::Circle => "Circle",
            StickerShape::Square => "Square",
            StickerShape::Rectangle => "Rectangle",
            StickerShape::KissCut => "Kiss Cut",
        }
    }

    pub fn all() -> &'static [StickerShape] {
        &[
            StickerShape::DieCut,
            StickerShape::Circle,
            StickerShape::Square,
            StickerShape::Rectangle,
            StickerShape::KissCut,
        ]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Material {
    #[default]
    Vinyl,
    Holographic,
    Transparent,
    Glitter,
    Mirror,
}

impl Material {
    pub fn label(&self) -> &'static str {
        match self {
            Material::Vinyl => "Vinyl",
            Material::Holographic => "Holographic",
            Material::Transparent => "Transparent",
            Material::Glitter => "Glitter",
            Material::Mirror => "Mirror",
        }
    }

    pub fn all() -> &'static [Material] {
        &[
            Material::Vinyl,
            Material::Holographic,
            Material::Transparent,
            Material::Glitter,
            Material::Mirror,
        ]
    }
}

/// Printed size.  Named sizes are square (2″, 3″, 4″, 5″).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum StickerSize {
    Small,
    #[default]
    Medium,
    Large,
    XLarge,
    /// Inches.
    Custom { width: f32, height: f32 },
}

impl StickerSize {
    pub fn area_sq_in(&self) -> f64 {
        match *self {
            StickerSize::Small => 4.0,
            StickerSize::Medium => 9.0,
            StickerSize::Large => 16.0,
            StickerSize::XLarge => 25.0,
            StickerSize::Custom { width, height } => width as f64 * height as f64,
        }
    }

    pub fn label(&self) -> String {
        match self {
            StickerSize::Small => "Small (2\" x 2\")".to_string(),
            StickerSize::Medium => "Medium (3\" x 3\")".to_string(),
            StickerSize::Large => "Large (4\" x 4\")".to_string(),
            StickerSize::XLarge => "X-Large (5\" x 5\")".to_string(),
            StickerSize::Custom { width, height } => format!("Custom ({}\" x {}\")", width, height),
        }
    }

    /// Build from a size key and the raw custom width/height fields.  Unknown
    /// keys are custom; unparseable dimensions read as zero.
    pub fn parse(key: &str, width: &str, height: &str) -> StickerSize {
        match key.trim().to_ascii_lowercase().as_str() {
            "small" => StickerSize::Small,
            "medium" => StickerSize::Medium,
            "large" => StickerSize::Large,
            "xlarge" | "x-large" => StickerSize::XLarge,
            _ => StickerSize::Custom {
                width: parse_dimension(width),
                height: parse_dimension(height),
            },
        }
    }
}

/// Structured order line handed to the cart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub quantity: u32,
    pub unit_price: f64,
    pub total_price: f64,
    pub shape: StickerShape,
    pub material: Material,
    pub size: StickerSize,
    pub rush_order: bool,
}

impl OrderLine {
    pub fn quote(
        shape: StickerShape,
        material: Material,
        size: StickerSize,
        quantity: u32,
        rush_order: bool,
    ) -> Self {
        let p = price(quantity, size.area_sq_in(), rush_order);
        Self {
            quantity,
            unit_price: p.per_unit,
            total_price: p.total,
            shape,
            material,
            size,
            rush_order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn reference_quote() {
        let p = price(100, 9.0, false);
        assert!((p.per_unit - 0.87992).abs() < 1e-6);
        assert!(close(p.total, 87.99));
    }

    #[test]
    fn rush_scales_both_figures() {
        let p = price(100, 9.0, true);
        assert!(close(p.total, 123.19));
        assert!((p.per_unit - 0.87992 * 1.4).abs() < 1e-6);
    }

    #[test]
    fn below_first_tier_uses_first_multiplier() {
        assert_eq!(tier_multiplier(40), tier_multiplier(50));
        assert_eq!(tier_multiplier(1), 1.0);
        let p = price(40, 9.0, false);
        assert!((p.per_unit - 1.36).abs() < 1e-9);
    }

    #[test]
    fn largest_tier_at_or_below_quantity() {
        assert_eq!(tier_multiplier(99), 1.0);
        assert_eq!(tier_multiplier(100), 0.647);
        assert_eq!(tier_multiplier(749), 0.324);
        assert_eq!(tier_multiplier(2499), 0.19);
        assert_eq!(tier_multiplier(10_000), 0.213);
    }

    #[test]
    fn zero_inputs_price_to_zero() {
        assert_eq!(price(100, 0.0, false).total, 0.0);
        assert_eq!(price(0, 9.0, true).total, 0.0);
        assert_eq!(price(100, f64::NAN, false).per_unit, 0.0);
    }

    #[test]
    fn size_lookup() {
        assert_eq!(StickerSize::parse("small", "", "").area_sq_in(), 4.0);
        assert_eq!(StickerSize::parse("XLarge", "", "").area_sq_in(), 25.0);
        assert_eq!(StickerSize::parse("custom", "2", "3.5").area_sq_in(), 7.0);
        assert_eq!(StickerSize::parse("custom", "abc", "3").area_sq_in(), 0.0);
    }

    #[test]
    fn order_line_carries_selection() {
        let line = OrderLine::quote(StickerShape::Circle, Material::Glitter, StickerSize::Medium, 100, false);
        assert_eq!(line.shape, StickerShape::Circle);
        assert_eq!(line.material, Material::Glitter);
        assert!(close(line.total_price, 87.99));
        assert_eq!(round_cents(line.total_price), 87.99);
    }
}
