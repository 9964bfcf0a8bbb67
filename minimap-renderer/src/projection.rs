//! World → atlas mapping and the rotation math shared by update and drawing.

use serde::{Deserialize, Serialize};

/// Position of the tracked entity in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorldPos {
    pub x: f32,
    pub y: f32,
}

/// Screen-space point in pixels. (0,0) is top-left, positive Y = down.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Atlas-space pixel coordinate currently centered under the minimap.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorldAnchor {
    pub x: f32,
    pub y: f32,
}

/// Calibration tying the atlas pixel grid to the world coordinate system.
///
/// `x = origin_x + (world.x + world_offset_x) * factor`
/// `y = origin_y - (world.y + world_offset_y) * factor`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub origin_x: f32,
    pub world_offset_x: f32,
    pub origin_y: f32,
    pub world_offset_y: f32,
    pub world_to_map_factor: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            origin_x: 1262.0,
            world_offset_x: 1874.07,
            origin_y: 3162.0,
            world_offset_y: 1213.51,
            world_to_map_factor: 0.329,
        }
    }
}

/// Which way the map turns on screen as the tracked heading increases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationDirection {
    #[default]
    Clockwise,
    CounterClockwise,
}

/// Convert the tracked world position into the atlas anchor.
pub fn compute_anchor(pos: WorldPos, calibration: &Calibration) -> WorldAnchor {
    let factor = calibration.world_to_map_factor;
    WorldAnchor {
        x: calibration.origin_x + (pos.x + calibration.world_offset_x) * factor,
        y: calibration.origin_y - (pos.y + calibration.world_offset_y) * factor,
    }
}

/// Normalize a heading in radians into degrees in `[0, 360)`.
///
/// 0° is atlas north. Non-finite headings map to 0.
pub fn compute_rotation(heading_radians: f32, direction: RotationDirection) -> f32 {
    if !heading_radians.is_finite() {
        return 0.0;
    }
    let turns = (heading_radians as f64 / std::f64::consts::TAU).rem_euclid(1.0);
    let degrees = match direction {
        RotationDirection::Clockwise => turns * 360.0,
        RotationDirection::CounterClockwise => (1.0 - turns) * 360.0,
    };
    normalize_degrees(degrees as f32)
}

/// Wrap an angle into `[0, 360)`.
pub fn normalize_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Rotation applied to the map bitmap. The overlay turns opposite to the entity.
pub fn bitmap_rotation(rotation_degrees: f32) -> f32 {
    360.0 - rotation_degrees
}

/// Half width of the atlas crop window (`offsetmap`).
pub fn crop_half_width(radius: f32, zoom: f32) -> f32 {
    radius * zoom
}

/// Offset of the north marker from the map center, before screen flipping.
pub fn north_offset(radius: f32, rotation_degrees: f32) -> Point {
    let angle = (rotation_degrees - 90.0).to_radians();
    Point {
        x: radius * angle.cos(),
        y: radius * angle.sin(),
    }
}

/// Screen position of the north marker on the rim of the minimap.
pub fn north_position(center: Point, radius: f32, rotation_degrees: f32) -> Point {
    let north = north_offset(radius, rotation_degrees);
    Point {
        x: center.x - north.x,
        y: center.y + north.y,
    }
}
