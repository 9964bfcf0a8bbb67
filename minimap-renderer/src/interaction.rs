use serde::{Deserialize, Serialize};

use crate::projection::Point;

pub const DEFAULT_ZOOM_MIN: f32 = 0.25;
pub const DEFAULT_ZOOM_MAX: f32 = 20.0;
pub const DEFAULT_ZOOM_STEP: f32 = 1.1;

/// Whether the pointer is over the minimap disc (boundary inclusive).
pub fn update_hover(center: Point, radius: f32, pointer: Point) -> bool {
    pointer.distance(center) <= radius
}

/// Inclusive bounds for the zoom multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomBounds {
    pub min: f32,
    pub max: f32,
}

impl Default for ZoomBounds {
    fn default() -> Self {
        Self {
            min: DEFAULT_ZOOM_MIN,
            max: DEFAULT_ZOOM_MAX,
        }
    }
}

impl ZoomBounds {
    pub fn clamp(&self, zoom: f32) -> f32 {
        zoom.clamp(self.min, self.max)
    }
}

/// Scroll-driven zoom.
///
/// A negative delta grows the crop window by `step`, a positive delta shrinks it.
/// Only the sign of the delta matters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomModel {
    pub bounds: ZoomBounds,
    pub step: f32,
}

impl Default for ZoomModel {
    fn default() -> Self {
        Self {
            bounds: ZoomBounds::default(),
            step: DEFAULT_ZOOM_STEP,
        }
    }
}

impl ZoomModel {
    pub fn apply_zoom(&self, current: f32, delta: f32) -> f32 {
        let next = if !delta.is_finite() || delta == 0.0 {
            current
        } else if delta < 0.0 {
            current * self.step
        } else {
            current / self.step
        };
        self.bounds.clamp(next)
    }
}
