pub mod atlas;
pub mod config;
pub mod draw_command;
pub mod drawing;
pub mod effect;
pub mod error;
pub mod interaction;
pub mod overlay;
pub mod projection;
pub mod renderer;
pub mod text;

pub use atlas::{AtlasHandle, AtlasTexture, LoadNotifier};
pub use config::MinimapConfig;
pub use draw_command::{DrawCommand, RenderTarget};
pub use drawing::ImageTarget;
pub use error::{AssetLoadError, MinimapError};
pub use overlay::Minimap;
pub use projection::{Point, WorldPos};
pub use renderer::{CameraPose, FrameOutcome, FrameSnapshot, HostInput, MinimapRenderer};
