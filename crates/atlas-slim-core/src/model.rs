use crate::error::Result;
use image::{ImageFormat, RgbaImage};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// True if the rectangle is non-empty and lies entirely inside a `width x height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.w > 0
            && self.h > 0
            && u64::from(self.x) + u64::from(self.w) <= u64::from(width)
            && u64::from(self.y) + u64::from(self.h) <= u64::from(height)
    }
}

/// One packed sprite entry of an atlas page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AtlasRegion {
    /// Unique sprite name (e.g. `characters/hero`).
    pub name: String,
    /// File name of the page image holding the packed pixels.
    pub page_name: String,
    /// Packed rectangle as it lies in the page (top-left origin). Not swapped for rotation.
    pub frame: Rect,
    /// Trim offset from the bottom-left of the untrimmed box to the bottom-left of the packed content.
    pub offset_x: i32,
    pub offset_y: i32,
    /// Untrimmed sprite size.
    pub original_width: u32,
    pub original_height: u32,
    /// Packed content is stored rotated 90° clockwise.
    pub rotated: bool,
}

impl AtlasRegion {
    /// Packed extent that maps onto the sprite's vertical axis.
    pub fn packed_span(&self) -> u32 {
        if self.rotated { self.frame.w } else { self.frame.h }
    }

    /// Size of the restored content inside the sprite canvas (`w`, `h`).
    pub fn footprint(&self) -> (u32, u32) {
        if self.rotated {
            (self.frame.h, self.frame.w)
        } else {
            (self.frame.w, self.frame.h)
        }
    }
}

/// A sprite rebuilt from an atlas page at its canonical, untrimmed size.
#[derive(Debug, Clone)]
pub struct ReconstructedSprite {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Restored original size. Equal to `width/height` for atlas-origin sprites.
    pub source_width: u32,
    pub source_height: u32,
    pub rgba: RgbaImage,
}

impl ReconstructedSprite {
    /// Encodes the sprite pixels as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        self.rgba.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    /// Converts the sprite into a loaded image entry under `path`, encoding its pixels as PNG.
    pub fn into_loaded_image(self, path: impl Into<String>) -> Result<LoadedImage> {
        let bytes = self.encode_png()?;
        Ok(LoadedImage::new(path, self.width, self.height, bytes))
    }
}

/// Aggregated render requirement for one logical sprite, produced by the statistics collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GlobalAssetStat {
    /// Normalized key used to match loaded images (see [`crate::lookup_key`] and [`crate::sprite_key`]).
    pub lookup_key: String,
    /// Display path.
    #[serde(default)]
    pub path: String,
    /// Largest on-screen size observed, already override-adjusted when `is_overridden`.
    pub max_render_width: f64,
    pub max_render_height: f64,
    #[serde(default)]
    pub max_scale_x: f64,
    #[serde(default)]
    pub max_scale_y: f64,
    #[serde(default)]
    pub is_overridden: bool,
    #[serde(default)]
    pub override_percentage: Option<f64>,
}

/// One physically loaded image: encoded bytes plus their actual pixel dimensions.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// Relative path (with extension); drives output naming.
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub bytes: Arc<[u8]>,
}

impl LoadedImage {
    pub fn new(path: impl Into<String>, width: u32, height: u32, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            width,
            height,
            bytes: Arc::from(bytes),
        }
    }
}

/// Loaded images keyed by lookup key, in insertion order.
pub type LoadedImages = IndexMap<String, LoadedImage>;

/// One planned output unit. Planning builds a fresh list every time; tasks are never edited.
#[derive(Debug, Clone)]
pub struct OptimizationTask {
    /// Output path with the extension normalized to `.png`.
    pub file_name: String,
    /// Original relative path, for display.
    pub relative_path: String,
    /// Physical dimensions of the loaded source.
    pub original_width: u32,
    pub original_height: u32,
    pub target_width: u32,
    pub target_height: u32,
    /// Source bytes, shared with the loaded image.
    pub blob: Arc<[u8]>,
    pub max_scale_used: f64,
    pub is_resize: bool,
    pub override_percentage: Option<f64>,
}

/// Statistics about a planned task list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PlanSummary {
    /// Number of planned tasks.
    pub num_tasks: usize,
    /// Tasks that need a resample.
    pub num_resized: usize,
    /// Tasks copied through unchanged.
    pub num_kept: usize,
    /// Tasks whose size comes from a user override.
    pub num_overridden: usize,
    /// Sum of source pixel areas.
    pub source_pixels: u64,
    /// Sum of target pixel areas.
    pub target_pixels: u64,
    /// Sum of encoded source sizes.
    pub source_bytes: u64,
}

impl PlanSummary {
    /// Computes the summary for a task list.
    pub fn from_tasks(tasks: &[OptimizationTask]) -> Self {
        let mut summary = PlanSummary {
            num_tasks: tasks.len(),
            num_resized: 0,
            num_kept: 0,
            num_overridden: 0,
            source_pixels: 0,
            target_pixels: 0,
            source_bytes: 0,
        };
        for task in tasks {
            if task.is_resize {
                summary.num_resized += 1;
            } else {
                summary.num_kept += 1;
            }
            if task.override_percentage.is_some() {
                summary.num_overridden += 1;
            }
            summary.source_pixels +=
                u64::from(task.original_width) * u64::from(task.original_height);
            summary.target_pixels += u64::from(task.target_width) * u64::from(task.target_height);
            summary.source_bytes += task.blob.len() as u64;
        }
        summary
    }

    /// Pixel area removed by the plan, as a percentage of the source area (0.0 to 100.0).
    pub fn pixel_reduction_percentage(&self) -> f64 {
        if self.source_pixels > 0 {
            let saved = self.source_pixels.saturating_sub(self.target_pixels);
            (saved as f64 / self.source_pixels as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Tasks: {}, Resized: {}, Kept: {}, Overridden: {}, Pixels: {} -> {} ({:.2}% saved)",
            self.num_tasks,
            self.num_resized,
            self.num_kept,
            self.num_overridden,
            self.source_pixels,
            self.target_pixels,
            self.pixel_reduction_percentage(),
        )
    }
}
