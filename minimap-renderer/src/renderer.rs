use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::config::MinimapConfig;
use crate::draw_command::{DrawCommand, RenderTarget, Rgba};
use crate::effect::EffectParameters;
use crate::error::MinimapError;
use crate::interaction;
use crate::projection::{self, Point, WorldAnchor, WorldPos};

const CROSSHAIR_RADIUS: f32 = 2.0;

/// Host camera for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraPose {
    pub position: [f32; 3],
    /// Yaw in radians. 0 faces atlas north.
    pub heading: f32,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

/// Everything the host hands the minimap once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HostInput {
    pub camera: CameraPose,
    /// World position the minimap is centered on.
    pub tracked_position: WorldPos,
    /// Pointer position in top-left screen coordinates.
    pub pointer: Point,
    /// Scroll wheel delta since the last frame. Only the sign is used.
    pub scroll_delta: f32,
}

/// Mutable per-frame minimap state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimapState {
    pub center: Point,
    pub radius: f32,
    pub zoom: f32,
    pub border_thickness: f32,
    pub opacity: f32,
    pub world_to_map_factor: f32,
    /// Normalized into `[0, 360)`.
    pub rotation_degrees: f32,
    pub is_hovering: bool,
}

/// Immutable result of `update`, consumed by `draw_frame`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSnapshot {
    pub state: MinimapState,
    pub anchor: WorldAnchor,
    pub effect: EffectParameters,
    pub viewport: (u32, u32),
}

/// What happened to a frame handed to `render`.
#[derive(Debug)]
pub enum FrameOutcome {
    Drawn { commands: usize },
    /// Nothing was drawn. The next frame tries again.
    Skipped(MinimapError),
}

impl FrameOutcome {
    pub fn is_drawn(&self) -> bool {
        matches!(self, Self::Drawn { .. })
    }
}

fn with_alpha(rgb: [u8; 3], alpha: f32) -> Rgba {
    [rgb[0], rgb[1], rgb[2], (alpha.clamp(0.0, 1.0) * 255.0).round() as u8]
}

/// Turns host input into minimap state and state into draw commands.
///
/// Holds no GPU or image resources: those live in the `RenderTarget`.
pub struct MinimapRenderer {
    config: MinimapConfig,
    state: MinimapState,
}

impl MinimapRenderer {
    pub fn new(config: MinimapConfig) -> Result<Self, MinimapError> {
        config.validate()?;
        let state = MinimapState {
            center: config.position,
            radius: config.radius,
            zoom: config.zoom.initial,
            border_thickness: config.border_thickness,
            opacity: config.opacity,
            world_to_map_factor: config.calibration.world_to_map_factor,
            rotation_degrees: 0.0,
            is_hovering: false,
        };
        Ok(Self { config, state })
    }

    pub fn config(&self) -> &MinimapConfig {
        &self.config
    }

    pub fn state(&self) -> &MinimapState {
        &self.state
    }

    /// Change the minimap radius. The render target must be resized to match
    /// before the next frame draws.
    pub fn set_radius(&mut self, radius: f32) -> Result<(), MinimapError> {
        let mut config = self.config.clone();
        config.radius = radius;
        config.validate()?;
        self.config = config;
        self.state.radius = radius;
        Ok(())
    }

    pub fn set_opacity(&mut self, opacity: f32) -> Result<(), MinimapError> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(MinimapError::invalid_config(format!(
                "opacity must be within [0, 1], got {opacity}"
            )));
        }
        self.config.opacity = opacity;
        self.state.opacity = opacity;
        Ok(())
    }

    /// Advance the state by one frame of host input.
    pub fn update(&mut self, input: &HostInput) -> FrameSnapshot {
        let camera = &input.camera;
        let state = &mut self.state;

        state.center = self.config.screen_center(camera.viewport_height);
        state.is_hovering = interaction::update_hover(state.center, state.radius, input.pointer);

        let zoom_allowed = !self.config.zoom.require_hover || state.is_hovering;
        if input.scroll_delta != 0.0 && zoom_allowed {
            state.zoom = self.config.zoom_model().apply_zoom(state.zoom, input.scroll_delta);
        }

        state.rotation_degrees =
            projection::compute_rotation(camera.heading, self.config.rotation_direction);

        let anchor = projection::compute_anchor(input.tracked_position, &self.config.calibration);
        let effect = EffectParameters::compute(anchor, state.radius, state.zoom);

        FrameSnapshot {
            state: *state,
            anchor,
            effect,
            viewport: (camera.viewport_width, camera.viewport_height),
        }
    }

    /// Produce the frame's draw commands in z-order.
    pub fn draw_frame(&self, snapshot: &FrameSnapshot) -> Vec<DrawCommand> {
        let state = &snapshot.state;
        let colors = &self.config.colors;
        let labels = &self.config.labels;
        let mut commands = Vec::with_capacity(9);

        // 1. Offscreen map: wash, then the masked atlas crop
        commands.push(DrawCommand::ClearOffscreen);
        commands.push(DrawCommand::BackgroundWash {
            color: with_alpha(colors.background, state.opacity),
        });
        commands.push(DrawCommand::MaskedMap {
            params: snapshot.effect,
            opacity: state.opacity,
        });

        // 2. Rotated onto the canvas
        commands.push(DrawCommand::BlitOffscreen {
            center: state.center,
            radius: state.radius,
            rotation_degrees: projection::bitmap_rotation(state.rotation_degrees),
        });

        // 3. Overlays, faded with the map
        commands.push(DrawCommand::PlayerMarker {
            center: state.center,
            radius: self.config.marker_radius,
            color: with_alpha(colors.marker, state.opacity),
        });
        commands.push(DrawCommand::Border {
            center: state.center,
            radius: state.radius,
            thickness: state.border_thickness,
            color: with_alpha(colors.border, state.opacity),
        });
        commands.push(DrawCommand::NorthIndicator {
            position: projection::north_position(
                state.center,
                state.radius,
                state.rotation_degrees,
            ),
            radius: self.config.north_size,
            color: with_alpha(colors.north, state.opacity),
            label: labels.north.clone(),
            label_color: with_alpha(colors.north_label, state.opacity),
            label_size: labels.north_size,
        });

        if labels.show_disclaimer {
            commands.push(DrawCommand::Text {
                text: labels.disclaimer.clone(),
                origin: labels.disclaimer_origin,
                size: labels.disclaimer_size,
                color: colors.disclaimer,
            });
        }

        if self.config.show_crosshair {
            let (width, height) = snapshot.viewport;
            commands.push(DrawCommand::Crosshair {
                position: Point::new(width as f32 / 2.0, height as f32 / 2.0),
                radius: CROSSHAIR_RADIUS,
                color: colors.crosshair,
            });
        }

        commands
    }

    /// Draw a frame into `target`.
    ///
    /// Every failure, including a panic inside the backend, skips the frame and
    /// leaves the target without a partial draw.
    ///
    /// A caught panic still goes through the process panic hook first, so the
    /// default hook prints it to stderr. Installing a quieter hook is up to the host.
    pub fn render<T: RenderTarget>(
        &self,
        snapshot: &FrameSnapshot,
        target: &mut T,
    ) -> FrameOutcome {
        let commands = self.draw_frame(snapshot);

        let result = panic::catch_unwind(AssertUnwindSafe(|| -> Result<(), MinimapError> {
            target.begin_frame()?;
            for cmd in &commands {
                if let Err(e) = target.draw(cmd) {
                    target.abort_frame();
                    return Err(e);
                }
            }
            target.end_frame();
            Ok(())
        }));

        let err = match result {
            Ok(Ok(())) => {
                return FrameOutcome::Drawn {
                    commands: commands.len(),
                };
            }
            Ok(Err(e)) => e,
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                let _ = panic::catch_unwind(AssertUnwindSafe(|| target.abort_frame()));
                MinimapError::Draw(format!("render panicked: {msg}"))
            }
        };

        if err.is_transient() {
            debug!("Skipping minimap frame: {err}");
        } else {
            warn!("Skipping minimap frame: {err}");
        }
        FrameOutcome::Skipped(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{AtlasHandle, AtlasTexture, PixelLayout};
    use crate::config::VerticalOrigin;
    use crate::drawing::ImageTarget;
    use crate::projection::Calibration;
    use std::f32::consts::FRAC_PI_2;

    fn test_config() -> MinimapConfig {
        let mut config = MinimapConfig::default();
        config.vertical_origin = VerticalOrigin::Top;
        config.position = Point::new(100.0, 100.0);
        config.radius = 50.0;
        config.calibration = Calibration {
            origin_x: 32.0,
            world_offset_x: 0.0,
            origin_y: 32.0,
            world_offset_y: 0.0,
            world_to_map_factor: 1.0,
        };
        config.zoom.initial = 1.0;
        config
    }

    fn input(heading: f32) -> HostInput {
        HostInput {
            camera: CameraPose {
                position: [0.0; 3],
                heading,
                viewport_width: 200,
                viewport_height: 200,
            },
            tracked_position: WorldPos::default(),
            pointer: Point::new(-500.0, -500.0),
            scroll_delta: 0.0,
        }
    }

    /// 64x64 atlas, left half red and right half blue.
    fn split_atlas() -> AtlasHandle {
        let mut data = Vec::with_capacity(64 * 64 * 4);
        for _y in 0..64 {
            for x in 0..64 {
                if x < 32 {
                    data.extend_from_slice(&[255, 0, 0, 255]);
                } else {
                    data.extend_from_slice(&[0, 0, 255, 255]);
                }
            }
        }
        AtlasHandle::ready(AtlasTexture::from_raw(64, 64, &data, PixelLayout::Rgba).unwrap())
    }

    fn solid_atlas(color: [u8; 4]) -> AtlasHandle {
        let data: Vec<u8> = std::iter::repeat_n(color, 64 * 64).flatten().collect();
        AtlasHandle::ready(AtlasTexture::from_raw(64, 64, &data, PixelLayout::Rgba).unwrap())
    }

    fn pixel(target: &ImageTarget, x: u32, y: u32) -> [u8; 4] {
        let c = target.frame().unwrap().pixel(x, y).unwrap();
        [c.red(), c.green(), c.blue(), c.alpha()]
    }

    fn near(actual: [u8; 4], expected: [u8; 4]) -> bool {
        actual.iter().zip(expected.iter()).all(|(a, e)| a.abs_diff(*e) <= 3)
    }

    #[test]
    fn update_derives_state_from_input() {
        let mut config = MinimapConfig::default();
        config.zoom.initial = 2.0;
        let mut renderer = MinimapRenderer::new(config).unwrap();
        let mut host = input(FRAC_PI_2);
        host.camera.viewport_height = 720;
        host.tracked_position = WorldPos { x: 100.0, y: -50.0 };

        let snapshot = renderer.update(&host);
        assert_eq!(snapshot.state.center, Point::new(100.0, 600.0));
        assert!((snapshot.state.rotation_degrees - 90.0).abs() < 1e-3);
        assert_eq!(snapshot.viewport, (200, 720));
        assert_eq!(
            snapshot.anchor,
            projection::compute_anchor(host.tracked_position, &Calibration::default())
        );
        assert!((snapshot.effect.crop_rect.width() - 372.0).abs() < 1e-2);
        assert_eq!(snapshot.effect.rescale_factor, 0.5);
        assert!(!snapshot.state.is_hovering);
    }

    #[test]
    fn scroll_zooms_in_both_directions() {
        let mut renderer = MinimapRenderer::new(test_config()).unwrap();
        let mut host = input(0.0);

        host.scroll_delta = -120.0;
        let zoom = renderer.update(&host).state.zoom;
        assert!((zoom - 1.1).abs() < 1e-5);

        host.scroll_delta = 3.0;
        let zoom = renderer.update(&host).state.zoom;
        assert!((zoom - 1.0).abs() < 1e-5);

        host.scroll_delta = 0.0;
        assert_eq!(renderer.update(&host).state.zoom, zoom);
    }

    #[test]
    fn zoom_can_require_hover() {
        let mut config = test_config();
        config.zoom.require_hover = true;
        let mut renderer = MinimapRenderer::new(config).unwrap();

        let mut host = input(0.0);
        host.scroll_delta = -1.0;
        let snapshot = renderer.update(&host);
        assert!(!snapshot.state.is_hovering);
        assert_eq!(snapshot.state.zoom, 1.0);

        host.pointer = Point::new(110.0, 90.0);
        let snapshot = renderer.update(&host);
        assert!(snapshot.state.is_hovering);
        assert!((snapshot.state.zoom - 1.1).abs() < 1e-5);
    }

    #[test]
    fn zoom_stays_within_bounds() {
        let mut renderer = MinimapRenderer::new(test_config()).unwrap();
        let mut host = input(0.0);
        host.scroll_delta = -1.0;
        for _ in 0..200 {
            renderer.update(&host);
        }
        assert_eq!(renderer.state().zoom, 20.0);
        host.scroll_delta = 1.0;
        for _ in 0..200 {
            renderer.update(&host);
        }
        assert_eq!(renderer.state().zoom, 0.25);
    }

    #[test]
    fn commands_follow_z_order() {
        let mut config = test_config();
        config.show_crosshair = true;
        let mut renderer = MinimapRenderer::new(config).unwrap();
        let snapshot = renderer.update(&input(0.0));
        let commands = renderer.draw_frame(&snapshot);

        let kinds: Vec<&str> = commands
            .iter()
            .map(|c| match c {
                DrawCommand::ClearOffscreen => "clear",
                DrawCommand::BackgroundWash { .. } => "wash",
                DrawCommand::MaskedMap { .. } => "map",
                DrawCommand::BlitOffscreen { .. } => "blit",
                DrawCommand::PlayerMarker { .. } => "marker",
                DrawCommand::Border { .. } => "border",
                DrawCommand::NorthIndicator { .. } => "north",
                DrawCommand::Text { .. } => "text",
                DrawCommand::Crosshair { .. } => "crosshair",
            })
            .collect();
        assert_eq!(
            kinds,
            [
                "clear",
                "wash",
                "map",
                "blit",
                "marker",
                "border",
                "north",
                "text",
                "crosshair"
            ]
        );

        match &commands[6] {
            DrawCommand::NorthIndicator { position, label, .. } => {
                assert_eq!(label, "N");
                assert!((position.x - 100.0).abs() < 1e-3);
                assert!((position.y - 50.0).abs() < 1e-3);
            }
            other => panic!("unexpected command {other:?}"),
        }
        match &commands[8] {
            DrawCommand::Crosshair { position, .. } => {
                assert_eq!(*position, Point::new(100.0, 100.0))
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn optional_overlays_can_be_disabled() {
        let mut config = test_config();
        config.labels.show_disclaimer = false;
        let mut renderer = MinimapRenderer::new(config).unwrap();
        let snapshot = renderer.update(&input(0.0));
        let commands = renderer.draw_frame(&snapshot);
        assert_eq!(commands.len(), 7);
        assert!(
            !commands
                .iter()
                .any(|c| matches!(c, DrawCommand::Text { .. } | DrawCommand::Crosshair { .. }))
        );
    }

    #[test]
    fn decorations_fade_with_opacity() {
        let mut renderer = MinimapRenderer::new(test_config()).unwrap();
        renderer.set_opacity(0.5).unwrap();
        let snapshot = renderer.update(&input(0.0));
        let commands = renderer.draw_frame(&snapshot);

        let mut seen = 0;
        for cmd in &commands {
            match cmd {
                DrawCommand::PlayerMarker { color, .. } | DrawCommand::Border { color, .. } => {
                    assert_eq!(color[3], 128, "{cmd:?}");
                    seen += 1;
                }
                DrawCommand::NorthIndicator {
                    color, label_color, ..
                } => {
                    assert_eq!(color[3], 128);
                    assert_eq!(label_color[3], 128);
                    seen += 1;
                }
                _ => {}
            }
        }
        assert_eq!(seen, 3);
    }

    #[test]
    fn wash_alpha_follows_opacity() {
        let mut renderer = MinimapRenderer::new(test_config()).unwrap();
        renderer.set_opacity(0.5).unwrap();
        assert!(renderer.set_opacity(1.5).is_err());
        let snapshot = renderer.update(&input(0.0));
        let commands = renderer.draw_frame(&snapshot);
        assert_eq!(
            commands[1],
            DrawCommand::BackgroundWash {
                color: [255, 255, 255, 128]
            }
        );
        assert!(matches!(
            commands[2],
            DrawCommand::MaskedMap { opacity, .. } if opacity == 0.5
        ));
    }

    #[test]
    fn render_before_atlas_load_draws_nothing() {
        let mut renderer = MinimapRenderer::new(test_config()).unwrap();
        let mut target = ImageTarget::new(AtlasHandle::pending(), None, (200, 200), 50.0).unwrap();
        let snapshot = renderer.update(&input(0.0));

        let outcome = renderer.render(&snapshot, &mut target);
        assert!(matches!(
            outcome,
            FrameOutcome::Skipped(MinimapError::ResourceUnavailable(_))
        ));
        assert!(target.frame().unwrap().pixels().iter().all(|p| p.alpha() == 0));
    }

    #[test]
    fn full_frame_composites_every_layer() {
        let mut renderer = MinimapRenderer::new(test_config()).unwrap();
        let mut target =
            ImageTarget::new(solid_atlas([255, 0, 0, 255]), None, (200, 200), 50.0).unwrap();
        let snapshot = renderer.update(&input(0.0));

        let outcome = renderer.render(&snapshot, &mut target);
        assert!(outcome.is_drawn(), "{outcome:?}");

        assert!(near(pixel(&target, 100, 100), [0, 166, 255, 255]));
        assert!(near(pixel(&target, 100, 75), [255, 0, 0, 255]));
        assert_eq!(pixel(&target, 0, 0)[3], 0);
        assert!(near(pixel(&target, 150, 100), [0, 0, 0, 255]));
        assert!(near(pixel(&target, 100, 50), [0, 0, 0, 255]));
        assert_eq!(pixel(&target, 100, 170)[3], 0);

        // Inside the offscreen square but outside the disc: clipped by the mask
        for (x, y) in [(55, 55), (145, 145), (55, 145), (145, 55)] {
            assert_eq!(pixel(&target, x, y)[3], 0, "pixel ({x}, {y})");
        }
        assert!(near(pixel(&target, 100, 80), [255, 0, 0, 255]));
        assert!(near(pixel(&target, 120, 120), [255, 0, 0, 255]));
    }

    #[test]
    fn map_turns_opposite_to_heading() {
        let mut renderer = MinimapRenderer::new(test_config()).unwrap();
        let mut target = ImageTarget::new(split_atlas(), None, (200, 200), 50.0).unwrap();

        let snapshot = renderer.update(&input(0.0));
        assert!(renderer.render(&snapshot, &mut target).is_drawn());
        assert!(near(pixel(&target, 75, 100), [255, 0, 0, 255]));
        assert!(near(pixel(&target, 125, 100), [0, 0, 255, 255]));

        // Heading east: the west half of the atlas swings below the marker
        let snapshot = renderer.update(&input(FRAC_PI_2));
        assert!(renderer.render(&snapshot, &mut target).is_drawn());
        assert!(near(pixel(&target, 100, 125), [255, 0, 0, 255]));
        assert!(near(pixel(&target, 100, 75), [0, 0, 255, 255]));
    }

    #[test]
    fn disposed_or_stale_resources_skip_the_frame() {
        let mut renderer = MinimapRenderer::new(test_config()).unwrap();
        let mut target =
            ImageTarget::new(solid_atlas([255, 0, 0, 255]), None, (200, 200), 50.0).unwrap();

        target.dispose();
        let snapshot = renderer.update(&input(0.0));
        assert!(matches!(
            renderer.render(&snapshot, &mut target),
            FrameOutcome::Skipped(MinimapError::ResourceUnavailable(_))
        ));

        target.resize(200, 200, 50.0).unwrap();
        renderer.set_radius(60.0).unwrap();
        let snapshot = renderer.update(&input(0.0));
        assert!(matches!(
            renderer.render(&snapshot, &mut target),
            FrameOutcome::Skipped(MinimapError::ResourceUnavailable(_))
        ));
        assert!(target.frame().unwrap().pixels().iter().all(|p| p.alpha() == 0));

        target.resize(200, 200, 60.0).unwrap();
        assert!(renderer.render(&snapshot, &mut target).is_drawn());
    }

    struct PanickingTarget {
        aborted: bool,
    }

    impl RenderTarget for PanickingTarget {
        fn begin_frame(&mut self) -> Result<(), MinimapError> {
            Ok(())
        }

        fn draw(&mut self, cmd: &DrawCommand) -> Result<(), MinimapError> {
            if matches!(cmd, DrawCommand::Border { .. }) {
                panic!("backend exploded");
            }
            Ok(())
        }

        fn end_frame(&mut self) {}

        fn abort_frame(&mut self) {
            self.aborted = true;
        }
    }

    #[test]
    fn backend_panic_skips_the_frame() {
        let mut renderer = MinimapRenderer::new(test_config()).unwrap();
        let snapshot = renderer.update(&input(0.0));
        let mut target = PanickingTarget { aborted: false };

        match renderer.render(&snapshot, &mut target) {
            FrameOutcome::Skipped(MinimapError::Draw(msg)) => {
                assert!(msg.contains("backend exploded"))
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(target.aborted);
    }

    #[test]
    fn invalid_radius_is_rejected() {
        let mut renderer = MinimapRenderer::new(test_config()).unwrap();
        assert!(matches!(
            renderer.set_radius(-1.0),
            Err(MinimapError::InvalidConfiguration(_))
        ));
        assert_eq!(renderer.state().radius, 50.0);
    }
}
