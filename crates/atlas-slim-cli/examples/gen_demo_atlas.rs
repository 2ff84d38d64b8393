use atlas_slim_core::{GlobalAssetStat, sprite_key};
use image::{GenericImageView, Rgba, RgbaImage, imageops};
use rand::{Rng, SeedableRng};
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

const PAGE_SIZE: u32 = 1024;
const PADDING: u32 = 2;

fn solid(w: u32, h: u32, c: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(w, h, Rgba(c))
}

fn random_color_opaque(rng: &mut impl Rng) -> [u8; 4] {
    [rng.r#gen(), rng.r#gen(), rng.r#gen(), 255]
}

fn draw_rect(img: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, c: [u8; 4]) {
    let (iw, ih) = img.dimensions();
    for yy in y.min(ih)..(y.saturating_add(h)).min(ih) {
        for xx in x.min(iw)..(x.saturating_add(w)).min(iw) {
            img.put_pixel(xx, yy, Rgba(c));
        }
    }
}

fn draw_soft_circle(img: &mut RgbaImage, cx: i32, cy: i32, r: f32, rgb: [u8; 3]) {
    let (iw, ih) = img.dimensions();
    for y in 0..ih as i32 {
        for x in 0..iw as i32 {
            let dx = (x - cx) as f32;
            let dy = (y - cy) as f32;
            let d = (dx * dx + dy * dy).sqrt();
            if d <= r {
                let edge = (r - d) / r.max(1.0);
                let a = (edge.clamp(0.0, 1.0) * 255.0) as u8;
                img.put_pixel(x as u32, y as u32, Rgba([rgb[0], rgb[1], rgb[2], a]));
            }
        }
    }
}

/// Upright sprite with a transparent margin so trimming has something to remove.
fn gen_sprite(rng: &mut impl Rng) -> RgbaImage {
    let w = rng.gen_range(32..=160);
    let h = rng.gen_range(32..=160);
    let mut img = solid(w, h, [0, 0, 0, 0]);
    let bw = rng.gen_range(12..=(w / 2).max(12));
    let bh = rng.gen_range(12..=(h / 2).max(12));
    let offx = rng.gen_range(0..(w - bw + 1));
    let offy = rng.gen_range(0..(h - bh + 1));
    draw_rect(&mut img, offx, offy, bw, bh, random_color_opaque(rng));
    if rng.gen_bool(0.5) {
        draw_soft_circle(
            &mut img,
            (offx + bw / 2) as i32,
            (offy + bh / 2) as i32,
            (bw.min(bh) as f32) / 2.0,
            [rng.r#gen(), rng.r#gen(), rng.r#gen()],
        );
    }
    img
}

/// Bounding box of the non-transparent pixels (`x, y, w, h`), or the full image when empty.
fn opaque_bounds(img: &RgbaImage) -> (u32, u32, u32, u32) {
    let (w, h) = img.dimensions();
    let (mut x0, mut y0, mut x1, mut y1) = (w, h, 0, 0);
    for (x, y, p) in img.enumerate_pixels() {
        if p[3] > 0 {
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x + 1);
            y1 = y1.max(y + 1);
        }
    }
    if x1 <= x0 || y1 <= y0 {
        return (0, 0, w, h);
    }
    (x0, y0, x1 - x0, y1 - y0)
}

fn main() -> anyhow::Result<()> {
    // Usage: cargo run -p atlas-slim-cli --example gen_demo_atlas -- [out_dir]
    // Default out_dir: assets/demo
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("assets/demo"));
    fs::create_dir_all(&out_dir)?;

    let mut rng = rand::rngs::StdRng::seed_from_u64(0xA71A5);
    let mut page = solid(PAGE_SIZE, PAGE_SIZE, [0, 0, 0, 0]);
    let mut atlas = String::new();
    writeln!(atlas)?;
    writeln!(atlas, "demo.png")?;
    writeln!(atlas, "size: {PAGE_SIZE},{PAGE_SIZE}")?;
    writeln!(atlas, "format: RGBA8888")?;
    writeln!(atlas, "filter: Linear,Linear")?;
    writeln!(atlas, "repeat: none")?;

    let mut stats: Vec<GlobalAssetStat> = Vec::new();
    let (mut cursor_x, mut cursor_y, mut row_h) = (PADDING, PADDING, 0u32);

    for i in 0..32u32 {
        let name = format!("props/item_{i:02}");
        let sprite = gen_sprite(&mut rng);
        let (ow, oh) = sprite.dimensions();
        let (tx, ty, tw, th) = opaque_bounds(&sprite);
        let trimmed = sprite.view(tx, ty, tw, th).to_image();

        let rotated = rng.gen_bool(0.3);
        let packed = if rotated {
            imageops::rotate90(&trimmed)
        } else {
            trimmed
        };
        let (pw, ph) = packed.dimensions();

        if cursor_x + pw + PADDING > PAGE_SIZE {
            cursor_x = PADDING;
            cursor_y += row_h + PADDING;
            row_h = 0;
        }
        anyhow::ensure!(cursor_y + ph + PADDING <= PAGE_SIZE, "demo page overflow");
        imageops::replace(&mut page, &packed, i64::from(cursor_x), i64::from(cursor_y));

        // Offsets are measured from the bottom-left of the untrimmed sprite.
        let offset_y = oh - (ty + th);
        writeln!(atlas, "{name}")?;
        writeln!(atlas, "  rotate: {rotated}")?;
        writeln!(atlas, "  xy: {cursor_x}, {cursor_y}")?;
        writeln!(atlas, "  size: {tw}, {th}")?;
        writeln!(atlas, "  orig: {ow}, {oh}")?;
        writeln!(atlas, "  offset: {tx}, {offset_y}")?;
        writeln!(atlas, "  index: -1")?;

        cursor_x += pw + PADDING;
        row_h = row_h.max(ph);

        let scale = rng.gen_range(0.2..1.3);
        let overridden = i % 10 == 9;
        stats.push(GlobalAssetStat {
            lookup_key: sprite_key(&name),
            path: format!("{name}.png"),
            max_render_width: f64::from(ow) * scale,
            max_render_height: f64::from(oh) * scale,
            max_scale_x: scale,
            max_scale_y: scale,
            is_overridden: overridden,
            override_percentage: overridden.then_some(scale * 100.0),
        });
    }

    page.save(out_dir.join("demo.png"))?;
    fs::write(out_dir.join("demo.atlas"), atlas)?;
    fs::write(
        out_dir.join("stats.json"),
        serde_json::to_string_pretty(&stats)?,
    )?;
    println!(
        "Generated demo atlas under {} (demo.png, demo.atlas, stats.json)",
        out_dir.display()
    );
    Ok(())
}
