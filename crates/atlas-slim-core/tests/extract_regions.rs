use atlas_slim_core::compositing::Placement;
use atlas_slim_core::error::SlimError;
use atlas_slim_core::prelude::*;
use image::{Rgba, RgbaImage};

/// Page whose pixel (x, y) is `[x, y, 7, 255]`, so every copied pixel reveals its origin.
fn coordinate_page(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| Rgba([x as u8, y as u8, 7, 255]))
}

fn region(
    frame: Rect,
    rotated: bool,
    offset: (i32, i32),
    original: (u32, u32),
) -> AtlasRegion {
    AtlasRegion {
        name: "sprite".into(),
        page_name: "page.png".into(),
        frame,
        offset_x: offset.0,
        offset_y: offset.1,
        original_width: original.0,
        original_height: original.1,
        rotated,
    }
}

fn is_transparent(img: &RgbaImage, x: u32, y: u32) -> bool {
    img.get_pixel(x, y)[3] == 0
}

#[test]
fn rotated_region_is_restored_upright() {
    let page = coordinate_page(100, 100);
    let r = region(Rect::new(0, 0, 50, 30), true, (5, 10), (80, 60));

    let placement = Placement::for_region(&r);
    assert_eq!(placement.dest_x, 5);
    assert_eq!(placement.dest_y, 0);
    assert_eq!(r.footprint(), (30, 50));

    let sprite = extract_region(&page, &r, &OptimizerConfig::default()).expect("extract");
    assert_eq!((sprite.width, sprite.height), (80, 60));
    assert_eq!(sprite.rgba.dimensions(), (80, 60));
    assert_eq!((sprite.source_width, sprite.source_height), (80, 60));

    // Footprint covers x in [5, 35), y in [0, 50).
    // Canvas (5 + i, j) holds page pixel (49 - j, i).
    assert_eq!(*sprite.rgba.get_pixel(5, 0), Rgba([49, 0, 7, 255]));
    assert_eq!(*sprite.rgba.get_pixel(34, 0), Rgba([49, 29, 7, 255]));
    assert_eq!(*sprite.rgba.get_pixel(5, 49), Rgba([0, 0, 7, 255]));
    assert_eq!(*sprite.rgba.get_pixel(34, 49), Rgba([0, 29, 7, 255]));
    assert_eq!(*sprite.rgba.get_pixel(15, 20), Rgba([29, 10, 7, 255]));

    assert!(is_transparent(&sprite.rgba, 4, 0));
    assert!(is_transparent(&sprite.rgba, 35, 0));
    assert!(is_transparent(&sprite.rgba, 5, 50));
    assert!(is_transparent(&sprite.rgba, 79, 59));
}

#[test]
fn rotated_content_covers_exactly_its_footprint() {
    let page = coordinate_page(100, 100);
    let r = region(Rect::new(0, 0, 50, 30), true, (5, 10), (80, 60));
    let sprite = extract_region(&page, &r, &OptimizerConfig::default()).expect("extract");
    let opaque = sprite.rgba.pixels().filter(|p| p[3] == 255).count();
    assert_eq!(opaque, 50 * 30);
}

#[test]
fn trimmed_region_lands_at_bottom_left_offset() {
    let page = coordinate_page(64, 64);
    let r = region(Rect::new(10, 20, 16, 8), false, (2, 3), (24, 16));

    let placement = Placement::for_region(&r);
    // 16 - (3 + 8) = 5
    assert_eq!((placement.dest_x, placement.dest_y), (2, 5));

    let sprite = extract_region(&page, &r, &OptimizerConfig::default()).expect("extract");
    assert_eq!(sprite.rgba.dimensions(), (24, 16));
    assert_eq!(*sprite.rgba.get_pixel(2, 5), Rgba([10, 20, 7, 255]));
    assert_eq!(*sprite.rgba.get_pixel(17, 12), Rgba([25, 27, 7, 255]));
    assert!(is_transparent(&sprite.rgba, 1, 5));
    assert!(is_transparent(&sprite.rgba, 2, 4));
    assert!(is_transparent(&sprite.rgba, 18, 12));
    assert!(is_transparent(&sprite.rgba, 17, 13));
}

#[test]
fn untrimmed_region_is_a_plain_copy() {
    let page = coordinate_page(32, 32);
    let r = region(Rect::new(4, 4, 8, 8), false, (0, 0), (8, 8));
    let sprite = extract_region(&page, &r, &OptimizerConfig::default()).expect("extract");
    for y in 0..8 {
        for x in 0..8 {
            assert_eq!(*sprite.rgba.get_pixel(x, y), *page.get_pixel(4 + x, 4 + y));
        }
    }
}

#[test]
fn content_beyond_the_canvas_is_clipped() {
    let page = coordinate_page(32, 32);
    // offset_y too large: dest_y = 10 - (6 + 8) = -4, top four rows fall off the canvas.
    let r = region(Rect::new(0, 0, 8, 8), false, (6, 6), (10, 10));
    let sprite = extract_region(&page, &r, &OptimizerConfig::default()).expect("extract");
    assert_eq!(Placement::for_region(&r).dest_y, -4);
    assert_eq!(*sprite.rgba.get_pixel(6, 0), Rgba([0, 4, 7, 255]));
    assert_eq!(*sprite.rgba.get_pixel(9, 3), Rgba([3, 7, 7, 255]));
    assert!(is_transparent(&sprite.rgba, 6, 4));
}

#[test]
fn region_outside_page_is_rejected() {
    let page = coordinate_page(32, 32);
    let r = region(Rect::new(30, 0, 8, 8), false, (0, 0), (8, 8));
    match extract_region(&page, &r, &OptimizerConfig::default()) {
        Err(SlimError::InvalidRegion { name, .. }) => assert_eq!(name, "sprite"),
        other => panic!("expected InvalidRegion, got {other:?}"),
    }
}

#[test]
fn empty_or_oversized_canvas_is_a_surface_failure() {
    let page = coordinate_page(32, 32);
    let r = region(Rect::new(0, 0, 8, 8), false, (0, 0), (0, 8));
    assert!(matches!(
        extract_region(&page, &r, &OptimizerConfig::default()),
        Err(SlimError::Surface { width: 0, height: 8 })
    ));

    let cfg = OptimizerConfig::builder().max_surface_side(16).build();
    let r = region(Rect::new(0, 0, 8, 8), false, (0, 0), (17, 8));
    let err = extract_region(&page, &r, &cfg).expect_err("oversized");
    assert_eq!(err.diagnostic_kind(), DiagnosticKind::SurfaceFailure);
}
