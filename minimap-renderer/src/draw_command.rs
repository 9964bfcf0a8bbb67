use crate::effect::EffectParameters;
use crate::error::MinimapError;
use crate::projection::Point;

/// Straight (non-premultiplied) RGBA color.
pub type Rgba = [u8; 4];

/// A high-level draw command emitted by the renderer.
///
/// `MinimapRenderer` turns a `FrameSnapshot` into an ordered list of these.
/// The order is the z-order. A `RenderTarget` executes them against its own
/// resources (offscreen surface, mask, effect chain, font).
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Clear the offscreen surface to transparent.
    ClearOffscreen,
    /// Fill the full minimap disc in the offscreen surface.
    BackgroundWash { color: Rgba },
    /// Crop/rescale the atlas and composite it into the offscreen surface through
    /// the disc mask.
    MaskedMap {
        params: EffectParameters,
        opacity: f32,
    },
    /// Draw the offscreen surface onto the canvas, rotated about the minimap center.
    BlitOffscreen {
        center: Point,
        radius: f32,
        rotation_degrees: f32,
    },
    /// Filled dot marking the tracked entity.
    PlayerMarker {
        center: Point,
        radius: f32,
        color: Rgba,
    },
    /// Unfilled ring around the minimap.
    Border {
        center: Point,
        radius: f32,
        thickness: f32,
        color: Rgba,
    },
    /// Filled disc on the rim with a centered label.
    NorthIndicator {
        position: Point,
        radius: f32,
        color: Rgba,
        label: String,
        label_color: Rgba,
        label_size: f32,
    },
    /// Single-line text with its top-left corner at `origin`.
    Text {
        text: String,
        origin: Point,
        size: f32,
        color: Rgba,
    },
    /// Small dot at the viewport center.
    Crosshair {
        position: Point,
        radius: f32,
        color: Rgba,
    },
}

/// Trait for rendering backends that consume `DrawCommand`s.
pub trait RenderTarget {
    /// Prepare a fresh frame. Fails with `ResourceUnavailable` if per-resolution
    /// resources are missing, in which case nothing has been drawn.
    fn begin_frame(&mut self) -> Result<(), MinimapError>;

    /// Execute a single draw command.
    fn draw(&mut self, cmd: &DrawCommand) -> Result<(), MinimapError>;

    /// Finalize the current frame. After this call, the frame is ready to read.
    fn end_frame(&mut self);

    /// Discard anything drawn since `begin_frame`.
    fn abort_frame(&mut self);
}
