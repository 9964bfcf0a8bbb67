use tiny_skia::{
    Color, FillRule, FilterQuality, Mask, Paint, PathBuilder, Pixmap, PixmapMut, PixmapPaint,
    Stroke, Transform,
};
use tracing::debug;

use crate::atlas::AtlasHandle;
use crate::draw_command::{DrawCommand, RenderTarget, Rgba};
use crate::effect::{self, EffectChain};
use crate::error::MinimapError;
use crate::projection::Point;
use crate::text::LabelFont;

/// Everything tied to the current viewport size and minimap radius.
///
/// Created and dropped as one batch so a resize can never leave half of it stale.
struct FrameResources {
    /// Viewport-sized overlay the host blits over its scene.
    canvas: Pixmap,
    /// `2 * radius` square holding the masked map before the rotated blit.
    offscreen: Pixmap,
    disc_mask: Mask,
    effect: EffectChain,
    radius: f32,
}

impl FrameResources {
    fn create(width: u32, height: u32, radius: f32) -> Result<Self, MinimapError> {
        let canvas = Pixmap::new(width, height).ok_or_else(|| {
            MinimapError::invalid_config(format!("cannot allocate {width}x{height} canvas"))
        })?;
        let size = effect::output_size(radius);
        let offscreen = Pixmap::new(size, size).ok_or_else(|| {
            MinimapError::invalid_config(format!("cannot allocate {size}x{size} offscreen surface"))
        })?;

        let mut disc_mask = Mask::new(size, size).ok_or_else(|| {
            MinimapError::invalid_config(format!("cannot allocate {size}x{size} mask"))
        })?;
        let half = size as f32 / 2.0;
        let disc = PathBuilder::from_circle(half, half, radius)
            .ok_or_else(|| MinimapError::invalid_config(format!("invalid radius {radius}")))?;
        disc_mask.fill_path(&disc, FillRule::Winding, true, Transform::identity());

        Ok(Self {
            canvas,
            offscreen,
            disc_mask,
            effect: EffectChain::new(radius)?,
            radius,
        })
    }

    fn offscreen_center(&self) -> f32 {
        self.offscreen.width() as f32 / 2.0
    }
}

fn solid_paint(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color[0], color[1], color[2], color[3]);
    paint.anti_alias = true;
    paint
}

fn fill_circle(target: &mut PixmapMut<'_>, center: Point, radius: f32, color: Rgba) {
    if let Some(path) = PathBuilder::from_circle(center.x, center.y, radius) {
        target.fill_path(
            &path,
            &solid_paint(color),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }
}

fn stroke_circle(target: &mut PixmapMut<'_>, center: Point, radius: f32, width: f32, color: Rgba) {
    if width <= 0.0 {
        return;
    }
    if let Some(path) = PathBuilder::from_circle(center.x, center.y, radius) {
        let stroke = Stroke {
            width,
            ..Default::default()
        };
        target.stroke_path(
            &path,
            &solid_paint(color),
            &stroke,
            Transform::identity(),
            None,
        );
    }
}

/// Software renderer that composites the minimap into a transparent RGBA canvas.
///
/// Owns the per-resolution resources and the label font, and reads the atlas
/// through the shared handle. Implements `RenderTarget` by dispatching
/// `DrawCommand`s to tiny-skia.
pub struct ImageTarget {
    atlas: AtlasHandle,
    font: Option<LabelFont>,
    resources: Option<FrameResources>,
}

impl ImageTarget {
    pub fn new(
        atlas: AtlasHandle,
        font: Option<LabelFont>,
        viewport: (u32, u32),
        radius: f32,
    ) -> Result<Self, MinimapError> {
        let mut target = Self {
            atlas,
            font,
            resources: None,
        };
        target.resize(viewport.0, viewport.1, radius)?;
        Ok(target)
    }

    /// Drop every per-resolution resource and build a fresh batch.
    ///
    /// On failure the target stays disposed and frames are skipped.
    pub fn resize(&mut self, width: u32, height: u32, radius: f32) -> Result<(), MinimapError> {
        self.dispose();
        let resources = FrameResources::create(width, height, radius)?;
        debug!("Created minimap resources for {width}x{height}, radius {radius}");
        self.resources = Some(resources);
        Ok(())
    }

    /// Release the per-resolution resources. Frames are skipped until `resize`.
    pub fn dispose(&mut self) {
        if self.resources.take().is_some() {
            debug!("Disposed minimap resources");
        }
    }

    /// Whether a frame could be drawn right now.
    pub fn is_ready(&self) -> bool {
        self.resources.is_some() && self.atlas.is_ready()
    }

    /// Current overlay image, premultiplied RGBA.
    pub fn frame(&self) -> Option<&Pixmap> {
        self.resources.as_ref().map(|r| &r.canvas)
    }

    /// Canvas dimensions.
    pub fn canvas_size(&self) -> Option<(u32, u32)> {
        self.resources
            .as_ref()
            .map(|r| (r.canvas.width(), r.canvas.height()))
    }

    pub fn radius(&self) -> Option<f32> {
        self.resources.as_ref().map(|r| r.radius)
    }

    pub fn atlas(&self) -> &AtlasHandle {
        &self.atlas
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Composite the overlay over a host render target.
    pub fn blit_onto(&self, dst: &mut PixmapMut<'_>) -> bool {
        let Some(canvas) = self.frame() else {
            return false;
        };
        dst.draw_pixmap(
            0,
            0,
            canvas.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
        true
    }

    fn resources_mut(&mut self) -> Result<&mut FrameResources, MinimapError> {
        self.resources
            .as_mut()
            .ok_or(MinimapError::ResourceUnavailable("minimap resources are disposed"))
    }
}

impl RenderTarget for ImageTarget {
    fn begin_frame(&mut self) -> Result<(), MinimapError> {
        if !self.atlas.is_ready() {
            return Err(MinimapError::ResourceUnavailable("atlas is not loaded"));
        }
        let resources = self.resources_mut()?;
        resources.canvas.fill(Color::TRANSPARENT);
        Ok(())
    }

    fn draw(&mut self, cmd: &DrawCommand) -> Result<(), MinimapError> {
        let atlas = self.atlas.get().cloned();
        let font = self.font.as_ref();
        let resources = self
            .resources
            .as_mut()
            .ok_or(MinimapError::ResourceUnavailable("minimap resources are disposed"))?;

        match cmd {
            DrawCommand::ClearOffscreen => {
                resources.offscreen.fill(Color::TRANSPARENT);
            }
            DrawCommand::BackgroundWash { color } => {
                let half = resources.offscreen_center();
                fill_circle(
                    &mut resources.offscreen.as_mut(),
                    Point::new(half, half),
                    resources.radius,
                    *color,
                );
            }
            DrawCommand::MaskedMap { params, opacity } => {
                let atlas = atlas.ok_or(MinimapError::ResourceUnavailable("atlas is not loaded"))?;
                let FrameResources {
                    offscreen,
                    disc_mask,
                    effect,
                    ..
                } = &mut *resources;
                let cropped = effect.render(&atlas, params)?;
                let paint = PixmapPaint {
                    opacity: opacity.clamp(0.0, 1.0),
                    quality: FilterQuality::Nearest,
                    ..Default::default()
                };
                offscreen.draw_pixmap(
                    0,
                    0,
                    cropped.as_ref(),
                    &paint,
                    Transform::identity(),
                    Some(&*disc_mask),
                );
            }
            DrawCommand::BlitOffscreen {
                center,
                radius,
                rotation_degrees,
            } => {
                if effect::output_size(*radius) != resources.offscreen.width() {
                    return Err(MinimapError::ResourceUnavailable(
                        "offscreen surface does not match the minimap radius",
                    ));
                }
                let half = resources.offscreen_center();
                let transform = Transform::from_translate(center.x - half, center.y - half)
                    .post_concat(Transform::from_rotate_at(*rotation_degrees, center.x, center.y));
                let paint = PixmapPaint {
                    quality: FilterQuality::Bilinear,
                    ..Default::default()
                };
                resources.canvas.draw_pixmap(
                    0,
                    0,
                    resources.offscreen.as_ref(),
                    &paint,
                    transform,
                    None,
                );
            }
            DrawCommand::PlayerMarker {
                center,
                radius,
                color,
            } => {
                fill_circle(&mut resources.canvas.as_mut(), *center, *radius, *color);
            }
            DrawCommand::Border {
                center,
                radius,
                thickness,
                color,
            } => {
                stroke_circle(
                    &mut resources.canvas.as_mut(),
                    *center,
                    *radius,
                    *thickness,
                    *color,
                );
            }
            DrawCommand::NorthIndicator {
                position,
                radius,
                color,
                label,
                label_color,
                label_size,
            } => {
                let mut canvas = resources.canvas.as_mut();
                fill_circle(&mut canvas, *position, *radius, *color);
                if let Some(font) = font {
                    font.draw_centered(
                        &mut canvas,
                        label,
                        position.x,
                        position.y,
                        *label_size,
                        *label_color,
                    );
                }
            }
            DrawCommand::Text {
                text,
                origin,
                size,
                color,
            } => {
                if let Some(font) = font {
                    font.draw(
                        &mut resources.canvas.as_mut(),
                        text,
                        origin.x,
                        origin.y,
                        *size,
                        *color,
                    );
                }
            }
            DrawCommand::Crosshair {
                position,
                radius,
                color,
            } => {
                fill_circle(&mut resources.canvas.as_mut(), *position, *radius, *color);
            }
        }
        Ok(())
    }

    fn end_frame(&mut self) {
        // Nothing to flush, the canvas is read through frame()
    }

    fn abort_frame(&mut self) {
        if let Some(resources) = self.resources.as_mut() {
            resources.canvas.fill(Color::TRANSPARENT);
        }
    }
}
