use crate::model::{GlobalAssetStat, LoadedImages, OptimizationTask};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Extension every output entry carries; the output codec is always PNG.
pub const OUTPUT_EXTENSION: &str = "png";

#[instrument(skip_all, fields(stats = stats.len(), loaded = loaded.len(), buffer_percent = buffer_percent))]
/// Plans one task per loaded image that has a usage statistic.
///
/// Per axis: `target = max(1, min(required, physical))` where `required` is the stat's render
/// size, inflated by `buffer_percent` and rounded up unless the stat is overridden. A sprite is
/// never planned above its physical size, whatever the override or buffer says.
///
/// Notes:
/// - Images whose key has no stat are left out silently. Keys are compared exactly.
/// - Images with a zero physical dimension are left out.
/// - Result order: resize tasks first, then pass-through tasks, each in `loaded` order.
pub fn plan_tasks(
    stats: &[GlobalAssetStat],
    loaded: &LoadedImages,
    buffer_percent: f64,
) -> Vec<OptimizationTask> {
    let by_key: HashMap<&str, &GlobalAssetStat> = stats
        .iter()
        .map(|s| (s.lookup_key.as_str(), s))
        .collect();

    let mut resized: Vec<OptimizationTask> = Vec::new();
    let mut kept: Vec<OptimizationTask> = Vec::new();

    for (key, image) in loaded {
        let Some(stat) = by_key.get(key.as_str()) else {
            continue;
        };
        if image.width == 0 || image.height == 0 {
            debug!(key = %key, "skip image with empty dimensions");
            continue;
        }

        let (req_w, req_h) = required_size(stat, buffer_percent);
        let target_width = req_w.min(image.width).max(1);
        let target_height = req_h.min(image.height).max(1);
        let is_resize = target_width != image.width || target_height != image.height;

        let task = OptimizationTask {
            file_name: output_file_name(&image.path),
            relative_path: image.path.clone(),
            original_width: image.width,
            original_height: image.height,
            target_width,
            target_height,
            blob: image.bytes.clone(),
            max_scale_used: stat.max_scale_x.max(stat.max_scale_y),
            is_resize,
            override_percentage: if stat.is_overridden {
                stat.override_percentage
            } else {
                None
            },
        };
        if is_resize {
            resized.push(task);
        } else {
            kept.push(task);
        }
    }

    debug!(resized = resized.len(), kept = kept.len(), "plan ready");
    resized.extend(kept);
    resized
}

/// Pixel size a sprite must keep to cover its largest observed render, before the physical cap.
///
/// Overridden stats are taken as given (rounded up when fractional); otherwise the render size is
/// inflated by `buffer_percent` and rounded up. Negative or NaN buffers count as zero.
pub fn required_size(stat: &GlobalAssetStat, buffer_percent: f64) -> (u32, u32) {
    if stat.is_overridden {
        return (
            ceil_pixels(stat.max_render_width),
            ceil_pixels(stat.max_render_height),
        );
    }
    let factor = 1.0 + buffer_percent.max(0.0) / 100.0;
    (
        ceil_pixels(stat.max_render_width * factor),
        ceil_pixels(stat.max_render_height * factor),
    )
}

fn ceil_pixels(v: f64) -> u32 {
    if v.is_nan() || v <= 0.0 {
        return 0;
    }
    // `as` saturates at u32::MAX, which the physical cap brings back down.
    v.ceil() as u32
}

/// Output path for `path`: its extension (if any) replaced by `.png`.
///
/// A `.` only counts as an extension separator when it comes after the last `/` or `\`,
/// so `a.b/c` becomes `a.b/c.png`.
pub fn output_file_name(path: &str) -> String {
    format!("{}.{}", strip_extension(path), OUTPUT_EXTENSION)
}

/// Normalized key for matching loaded images with statistics: forward slashes, no leading
/// `./` or `/`, no extension, lower case. `Characters\Hero.PNG` -> `characters/hero`.
pub fn lookup_key(path: &str) -> String {
    strip_extension(&normalize_path(path)).to_string()
}

/// Key for an atlas region name. Region names carry no extension, so a dot suffix such as
/// `fx/spark.1` stays part of the key.
pub fn sprite_key(name: &str) -> String {
    normalize_path(name)
}

fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut trimmed = unified.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.trim_start_matches('/').to_lowercase()
}

fn strip_extension(path: &str) -> &str {
    let last_sep = path.rfind(['/', '\\']);
    match path.rfind('.') {
        Some(dot) if last_sep.is_none_or(|sep| dot > sep) => &path[..dot],
        _ => path,
    }
}
