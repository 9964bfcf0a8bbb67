use tiny_skia::{Pixmap, PixmapMut};
use tracing::{info, warn};

use crate::atlas::{self, AtlasHandle, LoadNotifier};
use crate::config::MinimapConfig;
use crate::drawing::ImageTarget;
use crate::error::MinimapError;
use crate::renderer::{FrameOutcome, FrameSnapshot, HostInput, MinimapRenderer};
use crate::text::LabelFont;

/// A ready-to-use minimap overlay: state, draw commands and the software backend.
///
/// Call `frame` once per host frame, then read `image` or `blit_onto` the host
/// surface. Viewport changes are picked up from the input and rebuild every
/// per-resolution resource before the next draw.
pub struct Minimap {
    renderer: MinimapRenderer,
    target: ImageTarget,
    viewport: (u32, u32),
}

impl Minimap {
    /// Validate the config and start loading the atlas in the background.
    ///
    /// Frames are skipped until the atlas arrives. A failed load is reported
    /// through `notifier` and leaves the minimap disabled.
    pub fn new(
        config: MinimapConfig,
        viewport: (u32, u32),
        notifier: Option<LoadNotifier>,
    ) -> Result<Self, MinimapError> {
        config.validate()?;
        let atlas = atlas::spawn_load(config.atlas_path.clone(), notifier);
        Self::with_atlas(config, viewport, atlas)
    }

    /// Build the overlay around an atlas handle the caller already owns.
    pub fn with_atlas(
        config: MinimapConfig,
        viewport: (u32, u32),
        atlas: AtlasHandle,
    ) -> Result<Self, MinimapError> {
        let font = config.font_path.as_deref().and_then(LabelFont::load);
        if font.is_none() {
            info!("No label font available, minimap labels are disabled");
        }
        let renderer = MinimapRenderer::new(config)?;
        let target = ImageTarget::new(atlas, font, viewport, renderer.state().radius)?;
        Ok(Self {
            renderer,
            target,
            viewport,
        })
    }

    pub fn renderer(&self) -> &MinimapRenderer {
        &self.renderer
    }

    pub fn target(&self) -> &ImageTarget {
        &self.target
    }

    pub fn is_ready(&self) -> bool {
        self.target.is_ready()
    }

    pub fn atlas_failed(&self) -> bool {
        self.target.atlas().has_failed()
    }

    /// Advance state, resizing first if the host viewport changed.
    pub fn update(&mut self, input: &HostInput) -> FrameSnapshot {
        let viewport = (input.camera.viewport_width, input.camera.viewport_height);
        if viewport != self.viewport {
            if let Err(e) = self.resize(viewport.0, viewport.1) {
                warn!("Minimap resize to {}x{} failed: {e}", viewport.0, viewport.1);
            }
        }
        self.renderer.update(input)
    }

    pub fn render(&mut self, snapshot: &FrameSnapshot) -> FrameOutcome {
        self.renderer.render(snapshot, &mut self.target)
    }

    /// `update` followed by `render`.
    pub fn frame(&mut self, input: &HostInput) -> FrameOutcome {
        let snapshot = self.update(input);
        self.render(&snapshot)
    }

    /// Rebuild the per-resolution resources for a new viewport.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), MinimapError> {
        self.viewport = (width, height);
        self.target.resize(width, height, self.renderer.state().radius)
    }

    /// Change the minimap radius and rebuild the resources that depend on it.
    pub fn set_radius(&mut self, radius: f32) -> Result<(), MinimapError> {
        self.renderer.set_radius(radius)?;
        self.target.resize(self.viewport.0, self.viewport.1, radius)
    }

    pub fn set_opacity(&mut self, opacity: f32) -> Result<(), MinimapError> {
        self.renderer.set_opacity(opacity)
    }

    /// Release every per-resolution resource. Frames are skipped until `resize`.
    pub fn cleanup(&mut self) {
        self.target.dispose();
    }

    /// The last composited overlay, premultiplied RGBA.
    pub fn image(&self) -> Option<&Pixmap> {
        self.target.frame()
    }

    pub fn blit_onto(&self, dst: &mut PixmapMut<'_>) -> bool {
        self.target.blit_onto(dst)
    }
}
