use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::draw_command::Rgba;
use crate::error::MinimapError;
use crate::interaction::{
    DEFAULT_ZOOM_MAX, DEFAULT_ZOOM_MIN, DEFAULT_ZOOM_STEP, ZoomBounds, ZoomModel,
};
use crate::projection::{Calibration, Point, RotationDirection};

/// Which viewport edge `position.y` is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalOrigin {
    Top,
    #[default]
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub initial: f32,
    pub min: f32,
    pub max: f32,
    /// Multiplier applied per scroll notch.
    pub step: f32,
    /// Only react to scrolling while the pointer is over the minimap.
    pub require_hover: bool,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            initial: 1.3,
            min: DEFAULT_ZOOM_MIN,
            max: DEFAULT_ZOOM_MAX,
            step: DEFAULT_ZOOM_STEP,
            require_hover: false,
        }
    }
}

/// The two overlay strings. Kept as data so they can be translated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    pub north: String,
    pub north_size: f32,
    pub disclaimer: String,
    pub disclaimer_origin: Point,
    pub disclaimer_size: f32,
    pub show_disclaimer: bool,
    /// Optional gettext `.mo` catalog used to translate both labels.
    pub catalog_path: Option<PathBuf>,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            north: "N".to_string(),
            north_size: 22.0,
            disclaimer: "Disclaimer: This map overlay is unofficial. Use at your own risk."
                .to_string(),
            disclaimer_origin: Point::new(13.0, 50.0),
            disclaimer_size: 12.0,
            show_disclaimer: true,
            catalog_path: None,
        }
    }
}

/// Colors as RGB. Alpha comes from `opacity` unless the field carries its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub background: [u8; 3],
    pub border: [u8; 3],
    pub north: [u8; 3],
    pub north_label: [u8; 3],
    pub marker: [u8; 3],
    pub disclaimer: Rgba,
    pub crosshair: Rgba,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            background: [255, 255, 255],
            border: [0, 0, 0],
            north: [0, 0, 0],
            north_label: [255, 255, 255],
            marker: [0, 166, 255],
            disclaimer: [255, 255, 255, 128],
            crosshair: [255, 255, 255, 102],
        }
    }
}

/// Minimap configuration, loadable from a TOML file.
///
/// All fields default to their standard values. CLI flags override config file values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimapConfig {
    pub atlas_path: PathBuf,
    /// Font for the north label and disclaimer. Labels are skipped without one.
    pub font_path: Option<PathBuf>,
    pub calibration: Calibration,
    /// Minimap center in pixels, `y` measured from `vertical_origin`.
    pub position: Point,
    pub vertical_origin: VerticalOrigin,
    pub radius: f32,
    pub zoom: ZoomConfig,
    pub border_thickness: f32,
    pub opacity: f32,
    pub north_size: f32,
    pub marker_radius: f32,
    pub rotation_direction: RotationDirection,
    pub labels: LabelConfig,
    pub colors: ColorConfig,
    pub show_crosshair: bool,
}

impl Default for MinimapConfig {
    fn default() -> Self {
        Self {
            atlas_path: PathBuf::from("res/atlas_4096.png"),
            font_path: None,
            calibration: Calibration::default(),
            position: Point::new(100.0, 120.0),
            vertical_origin: VerticalOrigin::Bottom,
            radius: 93.0,
            zoom: ZoomConfig::default(),
            border_thickness: 7.0,
            opacity: 1.0,
            north_size: 10.0,
            marker_radius: 3.0,
            rotation_direction: RotationDirection::Clockwise,
            labels: LabelConfig::default(),
            colors: ColorConfig::default(),
            show_crosshair: false,
        }
    }
}

fn positive(name: &str, value: f32) -> Result<(), MinimapError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MinimapError::invalid_config(format!(
            "{name} must be a positive number, got {value}"
        )))
    }
}

impl MinimapConfig {
    /// Load config from a TOML file.
    pub fn load(path: &std::path::Path) -> Result<Self, rootcause::Report> {
        use rootcause::prelude::*;
        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = toml::from_str(&contents).context("Failed to parse config file")?;
        config.validate().context("Invalid config file")?;
        Ok(config)
    }

    /// Reject values that would break rendering later.
    pub fn validate(&self) -> Result<(), MinimapError> {
        positive("radius", self.radius)?;
        positive("zoom.min", self.zoom.min)?;
        positive("zoom.max", self.zoom.max)?;
        positive("north_size", self.north_size)?;
        positive("marker_radius", self.marker_radius)?;
        positive("labels.north_size", self.labels.north_size)?;
        positive("labels.disclaimer_size", self.labels.disclaimer_size)?;
        if self.zoom.min > self.zoom.max {
            return Err(MinimapError::invalid_config(format!(
                "zoom.min ({}) is greater than zoom.max ({})",
                self.zoom.min, self.zoom.max
            )));
        }
        if !(self.zoom.min..=self.zoom.max).contains(&self.zoom.initial) {
            return Err(MinimapError::invalid_config(format!(
                "zoom.initial ({}) is outside [{}, {}]",
                self.zoom.initial, self.zoom.min, self.zoom.max
            )));
        }
        if !(self.zoom.step.is_finite() && self.zoom.step > 1.0) {
            return Err(MinimapError::invalid_config(format!(
                "zoom.step must be greater than 1, got {}",
                self.zoom.step
            )));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(MinimapError::invalid_config(format!(
                "opacity must be within [0, 1], got {}",
                self.opacity
            )));
        }
        if !(self.border_thickness.is_finite() && self.border_thickness >= 0.0) {
            return Err(MinimapError::invalid_config(format!(
                "border_thickness must be non-negative, got {}",
                self.border_thickness
            )));
        }
        let factor = self.calibration.world_to_map_factor;
        if !factor.is_finite() || factor == 0.0 {
            return Err(MinimapError::invalid_config(format!(
                "calibration.world_to_map_factor must be finite and non-zero, got {factor}"
            )));
        }
        if !(self.position.x.is_finite() && self.position.y.is_finite()) {
            return Err(MinimapError::invalid_config("position must be finite"));
        }
        Ok(())
    }

    pub fn zoom_model(&self) -> ZoomModel {
        ZoomModel {
            bounds: ZoomBounds {
                min: self.zoom.min,
                max: self.zoom.max,
            },
            step: self.zoom.step,
        }
    }

    /// Minimap center in top-left screen coordinates for the given viewport height.
    pub fn screen_center(&self, viewport_height: u32) -> Point {
        match self.vertical_origin {
            VerticalOrigin::Top => self.position,
            VerticalOrigin::Bottom => {
                Point::new(self.position.x, viewport_height as f32 - self.position.y)
            }
        }
    }

    /// Generate a commented default TOML config string.
    pub fn generate_default_toml() -> String {
        r#"# Atlas Minimap Configuration
# Place this file as atlas_minimap.toml next to the executable,
# or specify with --config <path>.

# World atlas image (PNG/JPEG)
atlas_path = "res/atlas_4096.png"

# TTF/OTF font for the north label and disclaimer (labels are hidden without one)
# font_path = "res/font.ttf"

# Minimap center in pixels; y is measured from `vertical_origin` ("top" or "bottom")
position = { x = 100.0, y = 120.0 }
vertical_origin = "bottom"

# Minimap radius in pixels
radius = 93.0

# Border ring thickness in pixels
border_thickness = 7.0

# Opacity of the map, background, border, marker and north indicator (0.0 - 1.0)
opacity = 1.0

# Radius of the north indicator disc
north_size = 10.0

# Radius of the player marker
marker_radius = 3.0

# "clockwise" or "counter_clockwise"
rotation_direction = "clockwise"

# Debug dot at the viewport center
show_crosshair = false

[calibration]
# atlas_x = origin_x + (world_x + world_offset_x) * world_to_map_factor
# atlas_y = origin_y - (world_y + world_offset_y) * world_to_map_factor
origin_x = 1262.0
world_offset_x = 1874.07
origin_y = 3162.0
world_offset_y = 1213.51
world_to_map_factor = 0.329

[zoom]
# Crop window multiplier; larger shows more of the atlas
initial = 1.3
min = 0.25
max = 20.0
# Multiplier per scroll notch
step = 1.1
# Only zoom while the pointer is over the minimap
require_hover = false

[labels]
north = "N"
north_size = 22.0
disclaimer = "Disclaimer: This map overlay is unofficial. Use at your own risk."
disclaimer_origin = { x = 13.0, y = 50.0 }
disclaimer_size = 12.0
show_disclaimer = true
# gettext .mo catalog used to translate the labels
# catalog_path = "res/minimap.mo"

[colors]
background = [255, 255, 255]
border = [0, 0, 0]
north = [0, 0, 0]
north_label = [255, 255, 255]
marker = [0, 166, 255]
disclaimer = [255, 255, 255, 128]
crosshair = [255, 255, 255, 102]
"#
        .to_string()
    }

    /// Apply CLI flag overrides.
    #[cfg(feature = "bin")]
    pub fn apply_cli_overrides(&mut self, matches: &clap::ArgMatches) -> Result<(), MinimapError> {
        let parse = |name: &str| -> Result<Option<f32>, MinimapError> {
            matches
                .value_of(name)
                .map(|v| {
                    v.parse::<f32>().map_err(|_| {
                        let flag = name.to_ascii_lowercase();
                        MinimapError::invalid_config(format!("--{flag} expects a number, got {v}"))
                    })
                })
                .transpose()
        };
        if let Some(path) = matches.value_of("ATLAS") {
            self.atlas_path = PathBuf::from(path);
        }
        if let Some(path) = matches.value_of("FONT") {
            self.font_path = Some(PathBuf::from(path));
        }
        if let Some(radius) = parse("RADIUS")? {
            self.radius = radius;
        }
        if let Some(zoom) = parse("ZOOM")? {
            self.zoom.initial = zoom;
        }
        if let Some(opacity) = parse("OPACITY")? {
            self.opacity = opacity;
        }
        if matches.is_present("NO_DISCLAIMER") {
            self.labels.show_disclaimer = false;
        }
        if matches.is_present("SHOW_CROSSHAIR") {
            self.show_crosshair = true;
        }
        if matches.is_present("COUNTER_CLOCKWISE") {
            self.rotation_direction = RotationDirection::CounterClockwise;
        }
        self.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        MinimapConfig::default().validate().unwrap();
    }

    #[test]
    fn generated_toml_matches_defaults() {
        let parsed: MinimapConfig =
            toml::from_str(&MinimapConfig::generate_default_toml()).unwrap();
        assert_eq!(parsed, MinimapConfig::default());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let parsed: MinimapConfig = toml::from_str(
            r#"
radius = 120.0
[zoom]
max = 8.0
[labels]
north = "Nord"
"#,
        )
        .unwrap();
        assert_eq!(parsed.radius, 120.0);
        assert_eq!(parsed.zoom.max, 8.0);
        assert_eq!(parsed.zoom.min, DEFAULT_ZOOM_MIN);
        assert_eq!(parsed.labels.north, "Nord");
        assert_eq!(parsed.labels.north_size, 22.0);
        assert_eq!(parsed.calibration, Calibration::default());
    }

    #[test]
    fn invalid_values_fail_fast() {
        let cases: Vec<Box<dyn Fn(&mut MinimapConfig)>> = vec![
            Box::new(|c| c.radius = 0.0),
            Box::new(|c| c.radius = -5.0),
            Box::new(|c| c.radius = f32::NAN),
            Box::new(|c| c.opacity = 1.5),
            Box::new(|c| c.zoom.min = 4.0),
            Box::new(|c| c.zoom.initial = 50.0),
            Box::new(|c| c.zoom.step = 1.0),
            Box::new(|c| c.border_thickness = -1.0),
            Box::new(|c| c.calibration.world_to_map_factor = 0.0),
        ];
        for mutate in cases {
            let mut config = MinimapConfig::default();
            mutate(&mut config);
            assert!(matches!(
                config.validate(),
                Err(MinimapError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn bottom_origin_flips_y() {
        let config = MinimapConfig::default();
        assert_eq!(config.screen_center(720), Point::new(100.0, 600.0));

        let config = MinimapConfig {
            vertical_origin: VerticalOrigin::Top,
            ..MinimapConfig::default()
        };
        assert_eq!(config.screen_center(720), Point::new(100.0, 120.0));
    }

    #[test]
    fn load_reads_and_validates() {
        let dir = std::env::temp_dir();
        let good = dir.join(format!("atlas_minimap_cfg_{}.toml", std::process::id()));
        std::fs::write(&good, "radius = 50.0\n").unwrap();
        assert_eq!(MinimapConfig::load(&good).unwrap().radius, 50.0);

        std::fs::write(&good, "radius = -50.0\n").unwrap();
        assert!(MinimapConfig::load(&good).is_err());

        std::fs::write(&good, "radius = [\n").unwrap();
        assert!(MinimapConfig::load(&good).is_err());
        let _ = std::fs::remove_file(good);
    }
}
