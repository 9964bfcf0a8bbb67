use std::path::Path;

use ab_glyph::{Font, FontVec, PxScale, ScaleFont, point};
use tiny_skia::{Pixmap, PixmapMut, PixmapPaint, PremultipliedColorU8, Transform};
use tracing::warn;

/// Font used for the two overlay labels.
pub struct LabelFont {
    font: FontVec,
}

/// Size of a laid out single-line label in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextExtent {
    pub width: f32,
    pub height: f32,
}

impl LabelFont {
    pub fn from_bytes(data: Vec<u8>) -> Option<Self> {
        FontVec::try_from_vec(data).ok().map(|font| Self { font })
    }

    /// Load a TTF/OTF file. Missing or invalid fonts are logged and disable labels.
    pub fn load(path: &Path) -> Option<Self> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                warn!("Could not read label font {}: {e}", path.display());
                return None;
            }
        };
        let font = Self::from_bytes(data);
        if font.is_none() {
            warn!("Label font {} is not a valid font", path.display());
        }
        font
    }

    pub fn measure(&self, text: &str, size: f32) -> TextExtent {
        let scaled = self.font.as_scaled(PxScale::from(size));
        let mut width = 0.0;
        let mut prev = None;
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = prev {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            prev = Some(id);
        }
        TextExtent {
            width,
            height: scaled.ascent() - scaled.descent(),
        }
    }

    /// Rasterize `text` into a premultiplied pixmap tinted with `color` (straight RGBA).
    pub fn rasterize(&self, text: &str, size: f32, color: [u8; 4]) -> Option<Pixmap> {
        let extent = self.measure(text, size);
        let width = extent.width.ceil().max(1.0) as u32;
        let height = extent.height.ceil().max(1.0) as u32;
        let mut pixmap = Pixmap::new(width, height)?;

        let scale = PxScale::from(size);
        let scaled = self.font.as_scaled(scale);
        let ascent = scaled.ascent();
        let mut caret = 0.0;
        let mut prev = None;

        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = prev {
                caret += scaled.kern(prev, id);
            }
            let glyph = id.with_scale_and_position(scale, point(caret, ascent));
            caret += scaled.h_advance(id);
            prev = Some(id);

            let Some(outlined) = self.font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            let pixels = pixmap.pixels_mut();
            outlined.draw(|gx, gy, coverage| {
                let x = bounds.min.x as i32 + gx as i32;
                let y = bounds.min.y as i32 + gy as i32;
                if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
                    return;
                }
                let idx = y as usize * width as usize + x as usize;
                let alpha = (coverage.clamp(0.0, 1.0) * color[3] as f32).round() as u8;
                if alpha <= pixels[idx].alpha() {
                    return;
                }
                let premul = |c: u8| ((c as u16 * alpha as u16 + 127) / 255) as u8;
                if let Some(px) = PremultipliedColorU8::from_rgba(
                    premul(color[0]),
                    premul(color[1]),
                    premul(color[2]),
                    alpha,
                ) {
                    pixels[idx] = px;
                }
            });
        }

        Some(pixmap)
    }

    /// Draw `text` with its top-left corner at `(x, y)`.
    pub fn draw(
        &self,
        target: &mut PixmapMut<'_>,
        text: &str,
        x: f32,
        y: f32,
        size: f32,
        color: [u8; 4],
    ) -> bool {
        let Some(label) = self.rasterize(text, size, color) else {
            return false;
        };
        target.draw_pixmap(
            0,
            0,
            label.as_ref(),
            &PixmapPaint::default(),
            Transform::from_translate(x.round(), y.round()),
            None,
        );
        true
    }

    /// Draw `text` centered on `(cx, cy)`.
    pub fn draw_centered(
        &self,
        target: &mut PixmapMut<'_>,
        text: &str,
        cx: f32,
        cy: f32,
        size: f32,
        color: [u8; 4],
    ) -> bool {
        let extent = self.measure(text, size);
        self.draw(
            target,
            text,
            cx - extent.width / 2.0,
            cy - extent.height / 2.0,
            size,
            color,
        )
    }
}

impl std::fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelFont").finish_non_exhaustive()
    }
}

/// First common system font found on this machine, for label tests.
#[cfg(test)]
pub(crate) fn system_font() -> Option<LabelFont> {
    const CANDIDATES: &[&str] = &[
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ];
    CANDIDATES
        .iter()
        .map(Path::new)
        .filter(|p| p.exists())
        .find_map(LabelFont::load)
}
