//! Process-wide color tables: category markers and the density gradient.

use std::sync::LazyLock;

use crate::render::Color;

/// Marker fill for points without a known category.
pub const DEFAULT_CATEGORY_COLOR: Color = Color::from_rgb_hex(0xFF_FF_FF);

pub const CATEGORY_COLORS: [(&str, Color); 21] = [
    ("Light", Color::from_rgb_hex(0x00_E5_FF)),
    ("Circle", Color::from_rgb_hex(0x00_FF_9C)),
    ("Triangle", Color::from_rgb_hex(0xFF_3B_3B)),
    ("Sphere", Color::from_rgb_hex(0xFF_B8_00)),
    ("Fireball", Color::from_rgb_hex(0xFF_66_00)),
    ("Disk", Color::from_rgb_hex(0xAA_44_FF)),
    ("Oval", Color::from_rgb_hex(0x44_AA_FF)),
    ("Cylinder", Color::from_rgb_hex(0xFF_44_AA)),
    ("Rectangle", Color::from_rgb_hex(0x88_FF_44)),
    ("Diamond", Color::from_rgb_hex(0xFF_FF_00)),
    ("Chevron", Color::from_rgb_hex(0xFF_88_00)),
    ("Formation", Color::from_rgb_hex(0x2B_FF_B5)),
    ("Changing", Color::from_rgb_hex(0xFF_00_FF)),
    ("Cigar", Color::from_rgb_hex(0xCC_FF_00)),
    ("Flash", Color::from_rgb_hex(0xFF_FF_FF)),
    ("Cross", Color::from_rgb_hex(0xFF_3B_3B)),
    ("Egg", Color::from_rgb_hex(0xFF_CC_88)),
    ("Cone", Color::from_rgb_hex(0x88_CC_FF)),
    ("Star", Color::from_rgb_hex(0xFF_FF_AA)),
    ("Other", Color::from_rgb_hex(0x7A_8A_99)),
    ("Unknown", Color::from_rgb_hex(0x55_66_77)),
];

/// Marker fill for a category; unknown or absent categories get the default.
#[must_use]
pub fn category_color(category: Option<&str>) -> Color {
    category
        .and_then(|name| {
            CATEGORY_COLORS
                .iter()
                .find(|(known, _)| *known == name)
                .map(|(_, color)| *color)
        })
        .unwrap_or(DEFAULT_CATEGORY_COLOR)
}

/// Density gradient stops, transparent black at the bottom to white at saturation.
pub const HEAT_GRADIENT_STOPS: [(f64, Color); 10] = [
    (0.0, Color::rgba(0.0, 10.0 / 255.0, 5.0 / 255.0, 0.0)),
    (0.15, Color::from_rgb_hex(0x00_33_11)),
    (0.3, Color::from_rgb_hex(0x00_55_1A)),
    (0.45, Color::from_rgb_hex(0x00_88_2E)),
    (0.55, Color::from_rgb_hex(0x00_CC_55)),
    (0.65, Color::from_rgb_hex(0x00_FF_9C)),
    (0.75, Color::from_rgb_hex(0x33_FF_B5)),
    (0.85, Color::from_rgb_hex(0x00_E5_FF)),
    (0.95, Color::from_rgb_hex(0x80_F0_FF)),
    (1.0, Color::from_rgb_hex(0xFF_FF_FF)),
];

pub const GRADIENT_LEVELS: usize = 256;

static HEAT_GRADIENT: LazyLock<[Color; GRADIENT_LEVELS]> = LazyLock::new(|| {
    let mut table = [Color::TRANSPARENT; GRADIENT_LEVELS];
    for (level, slot) in table.iter_mut().enumerate() {
        let t = level as f64 / (GRADIENT_LEVELS - 1) as f64;
        *slot = sample_stops(t);
    }
    table
});

fn sample_stops(t: f64) -> Color {
    let upper = HEAT_GRADIENT_STOPS
        .iter()
        .position(|(stop, _)| *stop >= t)
        .unwrap_or(HEAT_GRADIENT_STOPS.len() - 1);
    if upper == 0 {
        return HEAT_GRADIENT_STOPS[0].1;
    }
    let (low_t, low) = HEAT_GRADIENT_STOPS[upper - 1];
    let (high_t, high) = HEAT_GRADIENT_STOPS[upper];
    low.lerp(high, (t - low_t) / (high_t - low_t))
}

/// Gradient color (alpha excluded) for an intensity in `[0, 1]`.
#[must_use]
pub fn heat_color(intensity: f32) -> Color {
    let level = (intensity.clamp(0.0, 1.0) * (GRADIENT_LEVELS - 1) as f32).round() as usize;
    HEAT_GRADIENT[level]
}
