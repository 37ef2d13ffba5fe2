use crate::paths::AppPaths;
use crate::settings::SizePreset;
use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{GrayImage, Luma};
use std::path::Path;

const MAX_CORNER_RADIUS: u32 = 60;

/// Supplies the alpha silhouette for each size preset.
#[derive(Debug, Clone)]
pub struct MaskProvider {
    paths: AppPaths,
}

impl MaskProvider {
    pub fn new(paths: AppPaths) -> Self {
        Self { paths }
    }

    /// Mask with exactly the preset's dimensions. Loads the preset's asset
    /// when present and synthesizes one otherwise.
    pub fn mask_for(&self, preset: SizePreset) -> GrayImage {
        let (width, height) = preset.dimensions();
        let path = self.paths.mask_file(preset);
        if !path.exists() {
            tracing::info!(%preset, path = %path.display(), "mask asset missing; synthesizing");
            return synthesize_mask(width, height);
        }
        match load_mask(&path, width, height) {
            Ok(mask) => {
                tracing::debug!(%preset, path = %path.display(), "mask loaded");
                mask
            }
            Err(e) => {
                tracing::warn!(%preset, "failed to load mask: {e:#}; synthesizing");
                synthesize_mask(width, height)
            }
        }
    }
}

fn load_mask(path: &Path, width: u32, height: u32) -> Result<GrayImage> {
    let mask = image::open(path)
        .with_context(|| format!("open mask {}", path.display()))?
        .to_luma8();
    if mask.dimensions() != (width, height) {
        tracing::warn!(
            found = ?mask.dimensions(),
            expected = ?(width, height),
            "mask size mismatch; resizing"
        );
        return Ok(image::imageops::resize(
            &mask,
            width,
            height,
            FilterType::Lanczos3,
        ));
    }
    Ok(mask)
}

/// Corner radius used for a widget of the given height.
pub fn corner_radius(height: u32) -> u32 {
    MAX_CORNER_RADIUS.min(height / 4)
}

/// Build the silhouette procedurally: square top corners and rounded bottom
/// corners. Every primitive uses inclusive pixel coordinates.
pub fn synthesize_mask(width: u32, height: u32) -> GrayImage {
    let r = corner_radius(height) as i64;
    let w = width as i64;
    let h = height as i64;
    GrayImage::from_fn(width, height, |x, y| {
        let (x, y) = (x as i64, y as i64);
        if covered(x, y, w, h, r) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

fn covered(x: i64, y: i64, w: i64, h: i64, r: i64) -> bool {
    let band_top = h - r;
    // top rectangle
    if y <= band_top {
        return true;
    }
    // bottom-center rectangle
    if x >= r && x <= w - r {
        return true;
    }
    let dy = y - band_top;
    if x < r {
        // bottom-left quarter disc and seam triangle
        let dx = r - x;
        dx * dx + dy * dy <= r * r || x + dy <= r
    } else {
        // bottom-right quarter disc and seam triangle
        let dx = x - (w - r);
        dx * dx + dy * dy <= r * r || (w - x) + dy <= r
    }
}
