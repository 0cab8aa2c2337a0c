//! Camera state and geometry primitives.

use serde::{Deserialize, Serialize};

/// Instantaneous zoom factor and normalized focal point applied to a frame.
///
/// `position_x`/`position_y` select which fraction of the zoomed overflow is
/// cropped from each side: `0.0` keeps the top/left edge, `1.0` the
/// bottom/right edge, `0.5` crops evenly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub zoom_factor: f64,
    pub position_x: f64,
    pub position_y: f64,
}

impl CameraState {
    /// No zoom, centered.
    pub const IDENTITY: CameraState = CameraState {
        zoom_factor: 1.0,
        position_x: 0.5,
        position_y: 0.5,
    };

    pub fn new(zoom_factor: f64, position_x: f64, position_y: f64) -> Self {
        Self {
            zoom_factor,
            position_x,
            position_y,
        }
    }

    /// Linearly interpolate each component.
    ///
    /// Written as `a * (1 - t) + b * t` so `t == 1.0` yields `b` bit-exactly;
    /// equal components pass through unchanged.
    pub fn lerp(a: &CameraState, b: &CameraState, t: f64) -> CameraState {
        let mix = |from: f64, to: f64| {
            if from == to {
                from
            } else {
                from * (1.0 - t) + to * t
            }
        };
        CameraState {
            zoom_factor: mix(a.zoom_factor, b.zoom_factor),
            position_x: mix(a.position_x, b.position_x),
            position_y: mix(a.position_y, b.position_y),
        }
    }

    /// Whether the camera applies any zoom.
    pub fn is_zoomed(&self) -> bool {
        self.zoom_factor != 1.0
    }

    /// Offset of the visible window inside a zoomed content box of the given
    /// size: `(size - size * zoom) * position` per axis.
    pub fn content_offset(&self, width: f64, height: f64) -> (f64, f64) {
        (
            (width - width * self.zoom_factor) * self.position_x,
            (height - height * self.zoom_factor) * self.position_y,
        )
    }

    /// Map a point in unzoomed content-local coordinates to where it lands
    /// after the zoom transform.
    pub fn project(&self, width: f64, height: f64, x: f64, y: f64) -> (f64, f64) {
        let (ox, oy) = self.content_offset(width, height);
        (x * self.zoom_factor + ox, y * self.zoom_factor + oy)
    }

    /// Inverse of [`CameraState::project`].
    pub fn unproject(&self, width: f64, height: f64, x: f64, y: f64) -> (f64, f64) {
        let (ox, oy) = self.content_offset(width, height);
        ((x - ox) / self.zoom_factor, (y - oy) / self.zoom_factor)
    }
}

impl Default for CameraState {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A 2D point in source-pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Pixel dimensions of a frame or surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height.max(1) as f64
    }

    /// Largest even-sized frame with this aspect ratio that fits in `max`.
    /// Never upscales.
    pub fn fit_within(&self, max: FrameSize) -> FrameSize {
        if self.is_empty() {
            return FrameSize::new(0, 0);
        }
        let scale = (max.width as f64 / self.width as f64)
            .min(max.height as f64 / self.height as f64)
            .min(1.0);
        let even = |v: f64| (((v + 1e-9).floor() as u32) & !1).max(2);
        FrameSize::new(
            even(self.width as f64 * scale),
            even(self.height as f64 * scale),
        )
    }
}
