use serde::{Deserialize, Serialize};

use crate::error::{MapError, MapResult};

/// RGBA color in normalized 0..=1 channel values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

impl Color {
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self::rgba(0.0, 0.0, 0.0, 0.0);

    #[must_use]
    pub const fn rgba(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    #[must_use]
    pub const fn rgb(red: f64, green: f64, blue: f64) -> Self {
        Self::rgba(red, green, blue, 1.0)
    }

    /// Opaque color from a packed `0xRRGGBB` value.
    #[must_use]
    pub const fn from_rgb_hex(hex: u32) -> Self {
        Self::rgb(
            ((hex >> 16) & 0xFF) as f64 / 255.0,
            ((hex >> 8) & 0xFF) as f64 / 255.0,
            (hex & 0xFF) as f64 / 255.0,
        )
    }

    #[must_use]
    pub const fn with_alpha(self, alpha: f64) -> Self {
        Self::rgba(self.red, self.green, self.blue, alpha)
    }

    /// Channel-wise linear blend, `t` clamped to `[0, 1]`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self::rgba(
            self.red + (other.red - self.red) * t,
            self.green + (other.green - self.green) * t,
            self.blue + (other.blue - self.blue) * t,
            self.alpha + (other.alpha - self.alpha) * t,
        )
    }

    pub fn validate(self) -> MapResult<()> {
        for (channel, value) in [
            ("red", self.red),
            ("green", self.green),
            ("blue", self.blue),
            ("alpha", self.alpha),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(MapError::InvalidData(format!(
                    "color channel `{channel}` must be finite and in [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

/// Draw command for one label centered on `(x, y)` in pixel space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPrimitive {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub font_size_px: f64,
    pub color: Color,
}

impl TextPrimitive {
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        x: f64,
        y: f64,
        font_size_px: f64,
        color: Color,
    ) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            font_size_px,
            color,
        }
    }

    pub fn validate(&self) -> MapResult<()> {
        if self.text.is_empty() {
            return Err(MapError::InvalidData(
                "text primitive must not be empty".to_owned(),
            ));
        }
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(MapError::InvalidData(
                "text coordinates must be finite".to_owned(),
            ));
        }
        if !self.font_size_px.is_finite() || self.font_size_px <= 0.0 {
            return Err(MapError::InvalidData(
                "font size must be finite and > 0".to_owned(),
            ));
        }
        self.color.validate()
    }
}

/// Filled, stroked circle in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CirclePrimitive {
    pub x: f64,
    pub y: f64,
    pub radius_px: f64,
    pub fill: Color,
    pub stroke: Color,
    pub stroke_width: f64,
}

impl CirclePrimitive {
    #[must_use]
    pub const fn new(
        x: f64,
        y: f64,
        radius_px: f64,
        fill: Color,
        stroke: Color,
        stroke_width: f64,
    ) -> Self {
        Self {
            x,
            y,
            radius_px,
            fill,
            stroke,
            stroke_width,
        }
    }

    /// `true` when the pixel lies within the circle including its stroke.
    #[must_use]
    pub fn contains(self, x: f64, y: f64) -> bool {
        let reach = self.radius_px + self.stroke_width / 2.0;
        (x - self.x).powi(2) + (y - self.y).powi(2) <= reach * reach
    }

    pub fn validate(self) -> MapResult<()> {
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(MapError::InvalidData(
                "circle center must be finite".to_owned(),
            ));
        }
        if !self.radius_px.is_finite() || self.radius_px <= 0.0 {
            return Err(MapError::InvalidData(
                "circle radius must be finite and > 0".to_owned(),
            ));
        }
        if !self.stroke_width.is_finite() || self.stroke_width < 0.0 {
            return Err(MapError::InvalidData(
                "circle stroke width must be finite and >= 0".to_owned(),
            ));
        }
        self.fill.validate()?;
        self.stroke.validate()
    }
}
