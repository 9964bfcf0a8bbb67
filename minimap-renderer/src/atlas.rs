use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tiny_skia::Pixmap;
use tracing::{debug, info, warn};

use crate::error::AssetLoadError;

/// Channel order of a raw 8-bit, 4-channel pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Rgba,
    Bgra,
}

/// The world atlas as a premultiplied RGBA pixmap. Immutable once built.
pub struct AtlasTexture {
    pixmap: Pixmap,
}

impl AtlasTexture {
    /// Build a texture from straight-alpha pixels, swapping channels to RGBA and
    /// premultiplying.
    pub fn from_raw(
        width: u32,
        height: u32,
        data: &[u8],
        layout: PixelLayout,
    ) -> Result<Self, AssetLoadError> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(AssetLoadError::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        let mut pixmap =
            Pixmap::new(width, height).ok_or(AssetLoadError::Empty { width, height })?;

        for (dst, src) in pixmap.data_mut().chunks_exact_mut(4).zip(data.chunks_exact(4)) {
            let [r, g, b, a] = match layout {
                PixelLayout::Rgba => [src[0], src[1], src[2], src[3]],
                PixelLayout::Bgra => [src[2], src[1], src[0], src[3]],
            };
            dst[0] = premultiply(r, a);
            dst[1] = premultiply(g, a);
            dst[2] = premultiply(b, a);
            dst[3] = a;
        }

        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }
}

impl std::fmt::Debug for AtlasTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtlasTexture")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

fn premultiply(channel: u8, alpha: u8) -> u8 {
    ((u16::from(channel) * u16::from(alpha) + 127) / 255) as u8
}

/// Read and decode an atlas image from disk.
pub fn load_atlas(path: &Path) -> Result<AtlasTexture, AssetLoadError> {
    let bytes = std::fs::read(path).map_err(|source| AssetLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = image::load_from_memory(&bytes).map_err(|source| AssetLoadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let rgba = decoded.to_rgba8();
    let texture =
        AtlasTexture::from_raw(rgba.width(), rgba.height(), rgba.as_raw(), PixelLayout::Rgba)?;
    info!(
        "Loaded atlas {}: {}x{}",
        path.display(),
        texture.width(),
        texture.height()
    );
    Ok(texture)
}

/// Callback invoked off the render thread when a background load fails.
pub type LoadNotifier = Arc<dyn Fn(&AssetLoadError) + Send + Sync>;

#[derive(Default)]
struct AtlasSlot {
    texture: OnceLock<Arc<AtlasTexture>>,
    failed: AtomicBool,
}

/// Shared, write-once handle to the atlas.
///
/// The loader thread publishes the texture exactly once; the render thread polls
/// `get` without blocking. A failed load leaves the handle unready forever.
#[derive(Clone, Default)]
pub struct AtlasHandle {
    slot: Arc<AtlasSlot>,
}

impl AtlasHandle {
    /// A handle that never becomes ready until `publish` is called.
    pub fn pending() -> Self {
        Self::default()
    }

    /// A handle that is already ready.
    pub fn ready(texture: AtlasTexture) -> Self {
        let handle = Self::default();
        handle.publish(texture);
        handle
    }

    /// Returns false if a texture was already published.
    pub fn publish(&self, texture: AtlasTexture) -> bool {
        self.slot.texture.set(Arc::new(texture)).is_ok()
    }

    pub fn get(&self) -> Option<&Arc<AtlasTexture>> {
        self.slot.texture.get()
    }

    pub fn is_ready(&self) -> bool {
        self.slot.texture.get().is_some()
    }

    pub fn has_failed(&self) -> bool {
        self.slot.failed.load(Ordering::Acquire)
    }

    fn mark_failed(&self, err: &AssetLoadError, notifier: Option<&LoadNotifier>) {
        warn!("Atlas load failed, minimap stays disabled: {err}");
        self.slot.failed.store(true, Ordering::Release);
        if let Some(notify) = notifier {
            notify(err);
        }
    }
}

impl std::fmt::Debug for AtlasHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtlasHandle")
            .field("ready", &self.is_ready())
            .field("failed", &self.has_failed())
            .finish()
    }
}

/// Start decoding the atlas on a detached background thread.
///
/// There is no cancellation or timeout: the load always runs to success or failure.
pub fn spawn_load(path: impl Into<PathBuf>, notifier: Option<LoadNotifier>) -> AtlasHandle {
    let path = path.into();
    let handle = AtlasHandle::pending();
    let worker_handle = handle.clone();
    let worker_notifier = notifier.clone();
    let worker_path = path.clone();

    let spawned = std::thread::Builder::new()
        .name("atlas-load".to_string())
        .spawn(move || match load_atlas(&worker_path) {
            Ok(texture) => {
                if !worker_handle.publish(texture) {
                    debug!("Atlas already published, dropping duplicate load");
                }
            }
            Err(e) => worker_handle.mark_failed(&e, worker_notifier.as_ref()),
        });

    if let Err(source) = spawned {
        handle.mark_failed(&AssetLoadError::Io { path, source }, notifier.as_ref());
    }
    handle
}
