use std::fmt;
use std::path::PathBuf;

/// Failure to read or decode the atlas image.
#[derive(Debug)]
pub enum AssetLoadError {
    /// The file could not be opened or read.
    Io { path: PathBuf, source: std::io::Error },
    /// The bytes were read but are not a decodable image.
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    /// A raw pixel buffer did not match its declared dimensions.
    BufferSize { expected: usize, actual: usize },
    /// The image has a zero dimension.
    Empty { width: u32, height: u32 },
}

impl fmt::Display for AssetLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read atlas {}: {source}", path.display())
            }
            Self::Decode { path, source } => {
                write!(f, "failed to decode atlas {}: {source}", path.display())
            }
            Self::BufferSize { expected, actual } => {
                write!(f, "pixel buffer is {actual} bytes, expected {expected}")
            }
            Self::Empty { width, height } => write!(f, "atlas has no pixels ({width}x{height})"),
        }
    }
}

impl std::error::Error for AssetLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Decode { source, .. } => Some(source),
            Self::BufferSize { .. } | Self::Empty { .. } => None,
        }
    }
}

/// Typed error for minimap configuration and rendering.
#[derive(Debug)]
pub enum MinimapError {
    /// A resource needed for drawing is not loaded yet, or was disposed by a resize.
    /// The frame is skipped and the next one retries.
    ResourceUnavailable(&'static str),
    /// The atlas could not be loaded. The minimap stays unready.
    AssetLoad(AssetLoadError),
    /// A configuration value is out of range. Raised at configuration time.
    InvalidConfiguration(String),
    /// The drawing backend rejected an operation.
    Draw(String),
}

impl MinimapError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Whether this error only affects the current frame.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ResourceUnavailable(_) | Self::Draw(_))
    }
}

impl fmt::Display for MinimapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceUnavailable(what) => write!(f, "resource unavailable: {what}"),
            Self::AssetLoad(e) => write!(f, "asset load failed: {e}"),
            Self::InvalidConfiguration(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Draw(msg) => write!(f, "draw failed: {msg}"),
        }
    }
}

impl std::error::Error for MinimapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::AssetLoad(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AssetLoadError> for MinimapError {
    fn from(e: AssetLoadError) -> Self {
        Self::AssetLoad(e)
    }
}
