use crate::compositing::{Placement, blit_region};
use crate::config::OptimizerConfig;
use crate::error::{Result, SlimError};
use crate::model::{AtlasRegion, ReconstructedSprite};
use image::RgbaImage;

/// Rebuilds one sprite from a decoded atlas page.
///
/// The result is `original_width x original_height`, fully transparent except for the packed
/// content, which is placed according to the trim offsets and turned back upright when the
/// region was packed rotated.
///
/// Errors (the caller drops the region and moves on):
/// - `Surface` when the canvas is empty or larger than `cfg.max_surface_side`
/// - `InvalidRegion` when the packed rectangle is empty or not inside the page
pub fn extract_region(
    page: &RgbaImage,
    region: &AtlasRegion,
    cfg: &OptimizerConfig,
) -> Result<ReconstructedSprite> {
    let (ow, oh) = (region.original_width, region.original_height);
    let mut canvas = allocate_canvas(ow, oh, cfg.max_surface_side)?;

    let (pw, ph) = page.dimensions();
    if !region.frame.fits_within(pw, ph) {
        return Err(SlimError::InvalidRegion {
            name: region.name.clone(),
            reason: format!(
                "packed rect {}x{}+{}+{} does not fit page {}x{}",
                region.frame.w, region.frame.h, region.frame.x, region.frame.y, pw, ph
            ),
        });
    }

    let placement = Placement::for_region(region);
    blit_region(page, region.frame, &mut canvas, placement);

    Ok(ReconstructedSprite {
        name: region.name.clone(),
        width: ow,
        height: oh,
        source_width: ow,
        source_height: oh,
        rgba: canvas,
    })
}

/// Transparent RGBA canvas, refusing empty or oversized surfaces.
pub(crate) fn allocate_canvas(width: u32, height: u32, max_side: u32) -> Result<RgbaImage> {
    if width == 0 || height == 0 || width > max_side || height > max_side {
        return Err(SlimError::Surface { width, height });
    }
    Ok(RgbaImage::new(width, height))
}
