//! Crop → rescale chain that turns the atlas into a zoomed, fixed-size square.
//!
//! Zoom never changes the output size. A larger zoom widens the crop window and
//! the rescale factor shrinks it back down to `2 * radius` pixels.

use tiny_skia::{Color, FilterQuality, Paint, Pattern, Pixmap, Rect, SpreadMode, Transform};

use crate::atlas::AtlasTexture;
use crate::error::MinimapError;
use crate::projection::{self, WorldAnchor};

/// Axis-aligned crop window in atlas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl CropRect {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectParameters {
    pub crop_rect: CropRect,
    /// Atlas-space point the rescale is anchored on (the crop center).
    pub rescale_center: WorldAnchor,
    pub rescale_factor: f32,
    /// Output half width in pixels (the minimap radius).
    pub radius: f32,
}

impl EffectParameters {
    pub fn compute(anchor: WorldAnchor, radius: f32, zoom: f32) -> Self {
        let half = projection::crop_half_width(radius, zoom);
        Self {
            crop_rect: CropRect {
                left: anchor.x - half,
                top: anchor.y - half,
                right: anchor.x + half,
                bottom: anchor.y + half,
            },
            rescale_center: anchor,
            rescale_factor: radius / half,
            radius,
        }
    }

    pub fn offsetmap(&self) -> f32 {
        self.crop_rect.width() / 2.0
    }

    /// Maps atlas pixels to output pixels: crop to the window, then scale about its center.
    pub fn transform(&self) -> Transform {
        let half = self.offsetmap();
        let crop = Transform::from_translate(-self.crop_rect.left, -self.crop_rect.top);
        crop.post_translate(-half, -half)
            .post_scale(self.rescale_factor, self.rescale_factor)
            .post_translate(self.radius, self.radius)
    }

    /// Identity scale on whole-pixel offsets copies pixels without resampling.
    fn filter_quality(&self) -> FilterQuality {
        let whole = |v: f32| v.fract() == 0.0;
        if self.rescale_factor == 1.0 && whole(self.crop_rect.left) && whole(self.crop_rect.top) {
            FilterQuality::Nearest
        } else {
            FilterQuality::Bilinear
        }
    }
}

/// Side length of the effect output for a given radius.
pub fn output_size(radius: f32) -> u32 {
    (radius * 2.0).round().max(1.0) as u32
}

/// Owns the reusable output image. Recreate it when the radius changes.
pub struct EffectChain {
    output: Pixmap,
}

impl EffectChain {
    pub fn new(radius: f32) -> Result<Self, MinimapError> {
        let size = output_size(radius);
        let output = Pixmap::new(size, size).ok_or_else(|| {
            MinimapError::invalid_config(format!("cannot allocate {size}x{size} effect output"))
        })?;
        Ok(Self { output })
    }

    pub fn size(&self) -> u32 {
        self.output.width()
    }

    /// Crop and rescale the atlas. Samples outside the atlas clamp to the edge.
    pub fn render(
        &mut self,
        atlas: &AtlasTexture,
        params: &EffectParameters,
    ) -> Result<&Pixmap, MinimapError> {
        if output_size(params.radius) != self.size() {
            return Err(MinimapError::ResourceUnavailable("effect output size is stale"));
        }
        if !(params.rescale_factor.is_finite() && params.rescale_factor > 0.0) {
            return Err(MinimapError::Draw(format!(
                "invalid rescale factor {}",
                params.rescale_factor
            )));
        }

        self.output.fill(Color::TRANSPARENT);

        let shader = Pattern::new(
            atlas.pixmap().as_ref(),
            SpreadMode::Pad,
            params.filter_quality(),
            1.0,
            params.transform(),
        );
        let paint = Paint {
            shader,
            anti_alias: false,
            ..Default::default()
        };
        let size = self.size() as f32;
        let rect = Rect::from_xywh(0.0, 0.0, size, size)
            .ok_or_else(|| MinimapError::Draw("empty effect output".to_string()))?;
        self.output.fill_rect(rect, &paint, Transform::identity(), None);

        Ok(&self.output)
    }

    pub fn output(&self) -> &Pixmap {
        &self.output
    }
}
