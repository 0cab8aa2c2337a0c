//! Background and layout styling read by the compositor every frame.

use serde::{Deserialize, Serialize};

/// An opaque sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Background fill behind the content window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundStyle {
    #[default]
    Solid,
    GradientA,
    GradientB,
    GradientC,
}

/// How a [`BackgroundStyle`] paints the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    Solid(Rgb),
    /// Two-stop linear gradient from the top-left to the bottom-right corner.
    LinearGradient { from: Rgb, to: Rgb },
}

impl BackgroundStyle {
    pub fn fill(self) -> Fill {
        match self {
            BackgroundStyle::Solid => Fill::Solid(Rgb::new(0x1a, 0x1a, 0x1a)),
            BackgroundStyle::GradientA => Fill::LinearGradient {
                from: Rgb::new(0x4f, 0x46, 0xe5),
                to: Rgb::new(0xec, 0x48, 0x99),
            },
            BackgroundStyle::GradientB => Fill::LinearGradient {
                from: Rgb::new(0x0e, 0xa5, 0xe9),
                to: Rgb::new(0x22, 0xc5, 0x5e),
            },
            BackgroundStyle::GradientC => Fill::LinearGradient {
                from: Rgb::new(0xf9, 0x73, 0x16),
                to: Rgb::new(0xfa, 0xcc, 0x15),
            },
        }
    }
}

/// Compositing parameters for the content window and cursor overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Content window size as a percentage of the output surface.
    pub scale: f64,
    /// Corner radius of the content window in output pixels.
    pub corner_radius: f64,
    /// Drop shadow blur radius in output pixels. `None` disables the shadow.
    pub shadow: Option<f64>,
    pub style: BackgroundStyle,
    /// Cursor glyph scale multiplier. `None` uses 1.0.
    pub cursor_scale: Option<f64>,
    /// Cursor smoothing strength in `[0, 10]`. `None` uses the default.
    pub cursor_smoothness: Option<f64>,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            scale: 90.0,
            corner_radius: 12.0,
            shadow: Some(20.0),
            style: BackgroundStyle::Solid,
            cursor_scale: None,
            cursor_smoothness: None,
        }
    }
}

impl BackgroundConfig {
    pub const DEFAULT_CURSOR_SMOOTHNESS: f64 = 5.0;

    /// Scale as a fraction in `(0, 1]`.
    pub fn scale_fraction(&self) -> f64 {
        if self.scale.is_finite() && self.scale > 0.0 {
            (self.scale / 100.0).min(1.0)
        } else {
            1.0
        }
    }

    pub fn effective_corner_radius(&self) -> f64 {
        self.corner_radius.max(0.0)
    }

    /// Shadow radius, `0.0` when disabled.
    pub fn effective_shadow(&self) -> f64 {
        self.shadow.filter(|s| s.is_finite()).unwrap_or(0.0).max(0.0)
    }

    pub fn effective_cursor_scale(&self) -> f64 {
        self.cursor_scale
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(1.0)
    }

    pub fn effective_cursor_smoothness(&self) -> f64 {
        self.cursor_smoothness
            .filter(|s| s.is_finite())
            .unwrap_or(Self::DEFAULT_CURSOR_SMOOTHNESS)
            .clamp(0.0, 10.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let color = Rgb::from_hex("#4f46e5").unwrap();
        assert_eq!(color, Rgb::new(0x4f, 0x46, 0xe5));
        assert_eq!(color.to_hex(), "#4f46e5");
        assert!(Rgb::from_hex("#12345").is_none());
        assert!(Rgb::from_hex("zzzzzz").is_none());
    }

    #[test]
    fn test_styles_map_to_fixed_fills() {
        assert_eq!(
            BackgroundStyle::Solid.fill(),
            Fill::Solid(Rgb::from_hex("#1a1a1a").unwrap())
        );
        assert!(matches!(
            BackgroundStyle::GradientC.fill(),
            Fill::LinearGradient { .. }
        ));
    }

    #[test]
    fn test_effective_values_clamp() {
        let config = BackgroundConfig {
            scale: 150.0,
            shadow: Some(-4.0),
            cursor_scale: Some(0.0),
            cursor_smoothness: Some(42.0),
            ..Default::default()
        };
        assert_eq!(config.scale_fraction(), 1.0);
        assert_eq!(config.effective_shadow(), 0.0);
        assert_eq!(config.effective_cursor_scale(), 1.0);
        assert_eq!(config.effective_cursor_smoothness(), 10.0);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: BackgroundConfig =
            serde_json::from_str(r#"{"style":"gradient_b","scale":80.0}"#).unwrap();
        assert_eq!(config.style, BackgroundStyle::GradientB);
        assert_eq!(config.scale, 80.0);
        assert_eq!(config.corner_radius, 12.0);
        assert!(config.cursor_scale.is_none());
    }
}
