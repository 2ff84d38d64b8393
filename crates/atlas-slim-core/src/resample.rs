use crate::config::OptimizerConfig;
use crate::error::{Result, SlimError};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba32FImage};
use std::io::Cursor;
use tracing::{instrument, trace};

#[instrument(skip(bytes, cfg), fields(len = bytes.len()))]
/// Decodes `bytes`, resamples to `target_width x target_height` and encodes the result as PNG.
///
/// Filtering runs on premultiplied f32 RGBA so fully transparent pixels contribute no color to
/// the visible edge; alpha is divided back out afterwards.
///
/// Errors are returned, never panicked: `Decode` for unreadable input, `Surface` for a zero or
/// oversized target, `Encode` when PNG encoding fails.
pub fn resample_png(
    bytes: &[u8],
    target_width: u32,
    target_height: u32,
    cfg: &OptimizerConfig,
) -> Result<Vec<u8>> {
    if target_width == 0
        || target_height == 0
        || target_width > cfg.max_surface_side
        || target_height > cfg.max_surface_side
    {
        return Err(SlimError::Surface {
            width: target_width,
            height: target_height,
        });
    }

    let source = image::load_from_memory(bytes).map_err(|e| SlimError::Decode(e.to_string()))?;
    trace!(
        from_w = source.width(),
        from_h = source.height(),
        to_w = target_width,
        to_h = target_height,
        "resampling"
    );

    let mut rgba = source.into_rgba32f();
    premultiply(&mut rgba);
    let filter: FilterType = cfg.filter.into();
    let mut scaled = imageops::resize(&rgba, target_width, target_height, filter);
    unpremultiply(&mut scaled);

    let out_rgba = DynamicImage::ImageRgba32F(scaled).into_rgba8();
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(out_rgba)
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| SlimError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

fn premultiply(img: &mut Rgba32FImage) {
    for px in img.pixels_mut() {
        let a = px[3].clamp(0.0, 1.0);
        px[0] *= a;
        px[1] *= a;
        px[2] *= a;
    }
}

fn unpremultiply(img: &mut Rgba32FImage) {
    for px in img.pixels_mut() {
        // Lanczos/Catmull-Rom overshoot; keep every channel in range.
        let a = px[3].clamp(0.0, 1.0);
        px[3] = a;
        if a <= f32::EPSILON {
            px[0] = 0.0;
            px[1] = 0.0;
            px[2] = 0.0;
            px[3] = 0.0;
            continue;
        }
        for c in 0..3 {
            px[c] = (px[c] / a).clamp(0.0, 1.0);
        }
    }
}
