use crate::settings::FONT_SIZE_RANGE;
use ab_glyph::{point, Font, FontArc, FontVec, Glyph, OutlinedGlyph, PxScale, ScaleFont};
use anyhow::{anyhow, Context, Result};
use eframe::egui;
use image::{Rgba, RgbaImage};
use once_cell::sync::Lazy;
use std::path::Path;

/// Padding added on each side of the measured text box.
pub const GLYPH_PADDING: u32 = 10;
/// Bitmap side used when no outline font could be loaded.
pub const FALLBACK_BITMAP_SIZE: u32 = 60;
const FALLBACK_PX: f32 = 11.0;

static FALLBACK_FONT: Lazy<Option<FontArc>> = Lazy::new(default_font_arc);

/// Outline font at a fixed pixel size.
#[derive(Clone)]
pub struct ClockFont {
    font: FontArc,
    scale: PxScale,
    size: u32,
}

impl std::fmt::Debug for ClockFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockFont").field("size", &self.size).finish()
    }
}

impl ClockFont {
    /// Load the font at `path` so that one em is `size` pixels.
    pub fn load(path: &Path, size: u32) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("read font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| anyhow!("parse font {}: {e}", path.display()))?;
        Ok(Self::from_font(FontArc::from(font), size))
    }

    /// `size` is clamped to [`FONT_SIZE_RANGE`].
    pub fn from_font(font: FontArc, size: u32) -> Self {
        let size = size.clamp(*FONT_SIZE_RANGE.start(), *FONT_SIZE_RANGE.end());
        // PxScale is the ascent-to-descent height, not the em
        let scale = match font.units_per_em() {
            Some(units_per_em) if units_per_em > 0.0 && font.height_unscaled() > 0.0 => {
                PxScale::from(size as f32 * font.height_unscaled() / units_per_em)
            }
            _ => PxScale::from(size as f32),
        };
        Self { font, scale, size }
    }

    pub fn size(&self) -> u32 {
        self.size
    }
}

/// Transparent bitmap holding one rendered string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphBitmap {
    pub image: RgbaImage,
}

impl GlyphBitmap {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Render `text` centered in a transparent bitmap.
///
/// With a font the bitmap is the tight text box plus [`GLYPH_PADDING`] on
/// every side; `fixed_width` overrides only the width. Without a font the
/// bundled UI font is used inside a [`FALLBACK_BITMAP_SIZE`] square.
pub fn render_text(
    text: &str,
    font: Option<&ClockFont>,
    color: [u8; 3],
    fixed_width: Option<u32>,
) -> GlyphBitmap {
    match font {
        Some(font) => {
            let glyphs = layout(&font.font, font.scale, text);
            let bounds = measure(&font.font, font.scale, &glyphs);
            let width =
                fixed_width.unwrap_or_else(|| bounds.width().saturating_add(2 * GLYPH_PADDING));
            let height = bounds.height().saturating_add(2 * GLYPH_PADDING);
            draw_centered(&font.font, glyphs, bounds, width, height, color)
        }
        None => {
            let width = fixed_width.unwrap_or(FALLBACK_BITMAP_SIZE);
            let height = FALLBACK_BITMAP_SIZE;
            match FALLBACK_FONT.as_ref() {
                Some(fallback) => {
                    let scale = PxScale::from(FALLBACK_PX);
                    let glyphs = layout(fallback, scale, text);
                    let bounds = measure(fallback, scale, &glyphs);
                    draw_centered(fallback, glyphs, bounds, width, height, color)
                }
                None => {
                    tracing::warn!("no fallback font available; rendering blank glyph");
                    GlyphBitmap {
                        image: RgbaImage::new(width.max(1), height),
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TextBounds {
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
}

impl TextBounds {
    fn width(&self) -> u32 {
        (self.max_x.ceil() - self.min_x.floor()).max(0.0) as u32
    }

    fn height(&self) -> u32 {
        (self.max_y.ceil() - self.min_y.floor()).max(0.0) as u32
    }
}

fn layout(font: &FontArc, scale: PxScale, text: &str) -> Vec<Glyph> {
    let scaled = font.as_scaled(scale);
    let mut caret = point(0.0, scaled.ascent());
    let mut previous = None;
    let mut glyphs = Vec::new();
    for ch in text.chars().filter(|c| !c.is_control()) {
        let mut glyph = scaled.scaled_glyph(ch);
        if let Some(prev) = previous {
            caret.x += scaled.kern(prev, glyph.id);
        }
        glyph.position = caret;
        caret.x += scaled.h_advance(glyph.id);
        previous = Some(glyph.id);
        glyphs.push(glyph);
    }
    glyphs
}

fn measure(font: &FontArc, scale: PxScale, glyphs: &[Glyph]) -> TextBounds {
    let mut bounds: Option<TextBounds> = None;
    for glyph in glyphs {
        if let Some(outlined) = font.outline_glyph(glyph.clone()) {
            let b = outlined.px_bounds();
            bounds = Some(match bounds {
                None => TextBounds {
                    min_x: b.min.x,
                    min_y: b.min.y,
                    max_x: b.max.x,
                    max_y: b.max.y,
                },
                Some(acc) => TextBounds {
                    min_x: acc.min_x.min(b.min.x),
                    min_y: acc.min_y.min(b.min.y),
                    max_x: acc.max_x.max(b.max.x),
                    max_y: acc.max_y.max(b.max.y),
                },
            });
        }
    }
    // whitespace only: use the advance box
    bounds.unwrap_or_else(|| {
        let scaled = font.as_scaled(scale);
        let advance = glyphs
            .last()
            .map(|g| g.position.x + scaled.h_advance(g.id))
            .unwrap_or(0.0);
        TextBounds {
            min_x: 0.0,
            min_y: 0.0,
            max_x: advance,
            max_y: scaled.ascent() - scaled.descent(),
        }
    })
}

fn draw_centered(
    font: &FontArc,
    glyphs: Vec<Glyph>,
    bounds: TextBounds,
    width: u32,
    height: u32,
    color: [u8; 3],
) -> GlyphBitmap {
    let width = width.max(1);
    let height = height.max(1);
    let mut image = RgbaImage::new(width, height);
    let offset_x = ((width as f32 - (bounds.max_x - bounds.min_x)) / 2.0 - bounds.min_x).round();
    let offset_y = ((height as f32 - (bounds.max_y - bounds.min_y)) / 2.0 - bounds.min_y).round();
    for mut glyph in glyphs {
        glyph.position.x += offset_x;
        glyph.position.y += offset_y;
        if let Some(outlined) = font.outline_glyph(glyph) {
            draw_glyph(&mut image, &outlined, color);
        }
    }
    GlyphBitmap { image }
}

fn draw_glyph(image: &mut RgbaImage, outlined: &OutlinedGlyph, color: [u8; 3]) {
    let bounds = outlined.px_bounds();
    let (width, height) = image.dimensions();
    outlined.draw(|x, y, coverage| {
        let px = x as i32 + bounds.min.x as i32;
        let py = y as i32 + bounds.min.y as i32;
        if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
            return;
        }
        let alpha = (coverage * 255.0).round().clamp(0.0, 255.0) as u8;
        let pixel = image.get_pixel_mut(px as u32, py as u32);
        if alpha > pixel[3] {
            *pixel = Rgba([color[0], color[1], color[2], alpha]);
        }
    });
}

fn default_font_arc() -> Option<FontArc> {
    let definitions = egui::FontDefinitions::default();
    let family = definitions.families.get(&egui::FontFamily::Proportional)?;
    let font_name = family.first()?;
    let data = definitions.font_data.get(font_name)?;
    FontVec::try_from_vec_and_index(data.font.to_vec(), data.index)
        .map(FontArc::from)
        .ok()
}
