use crate::model::{AtlasRegion, Rect};
use image::RgbaImage;

/// Where a region's packed pixels land on the restored sprite canvas.
/// `dest_x, dest_y` is the top-left of the restored content (may be negative; clipped on blit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub dest_x: i64,
    pub dest_y: i64,
    pub rotated: bool,
}

impl Placement {
    /// Converts the bottom-left based trim offsets of `region` into a top-left destination.
    pub fn for_region(region: &AtlasRegion) -> Self {
        let span = i64::from(region.packed_span());
        Self {
            dest_x: i64::from(region.offset_x),
            dest_y: i64::from(region.original_height) - (i64::from(region.offset_y) + span),
            rotated: region.rotated,
        }
    }
}

/// Blit the packed rectangle `src` of `page` onto `canvas` at `placement`.
///
/// - non-rotated: straight copy, footprint `src.w x src.h`
/// - rotated: the page holds the content turned 90° CW; it is turned back 90° CCW, so the
///   footprint is `src.h x src.w` and canvas pixel `(i, j)` of the footprint reads page pixel
///   `(src.x + src.w - 1 - j, src.y + i)`
///
/// Pixels falling outside the canvas are dropped. `src` must lie inside `page`.
pub fn blit_region(page: &RgbaImage, src: Rect, canvas: &mut RgbaImage, placement: Placement) {
    let (cw, ch) = canvas.dimensions();
    let (rw, rh) = if placement.rotated {
        (src.h, src.w)
    } else {
        (src.w, src.h)
    };

    for yy in 0..rh {
        let dy = placement.dest_y + i64::from(yy);
        if dy < 0 || dy >= i64::from(ch) {
            continue;
        }
        for xx in 0..rw {
            let dx = placement.dest_x + i64::from(xx);
            if dx < 0 || dx >= i64::from(cw) {
                continue;
            }
            let (ix, iy) = if placement.rotated {
                (src.x + (src.w - 1 - yy), src.y + xx)
            } else {
                (src.x + xx, src.y + yy)
            };
            let px = *page.get_pixel(ix, iy);
            canvas.put_pixel(dx as u32, dy as u32, px);
        }
    }
}
