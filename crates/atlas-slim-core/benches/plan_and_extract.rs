use atlas_slim_core::prelude::*;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use image::{Rgba, RgbaImage};

fn generate_inputs(count: usize) -> (Vec<GlobalAssetStat>, LoadedImages) {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let mut stats = Vec::with_capacity(count);
    let mut loaded = LoadedImages::with_capacity(count);
    for i in 0..count {
        let key = format!("sprite_{}", i);
        let w = rng.gen_range(16..=1024);
        let h = rng.gen_range(16..=1024);
        loaded.insert(
            key.clone(),
            LoadedImage::new(format!("{key}.png"), w, h, Vec::new()),
        );
        stats.push(GlobalAssetStat {
            lookup_key: key.clone(),
            path: format!("{key}.png"),
            max_render_width: rng.gen_range(1.0..1200.0),
            max_render_height: rng.gen_range(1.0..1200.0),
            max_scale_x: 1.0,
            max_scale_y: 1.0,
            is_overridden: rng.gen_bool(0.1),
            override_percentage: None,
        });
    }
    (stats, loaded)
}

fn generate_regions(count: u32, rotated: bool) -> Vec<AtlasRegion> {
    (0..count)
        .map(|i| AtlasRegion {
            name: format!("r{}", i),
            page_name: "page.png".into(),
            frame: Rect::new((i % 16) * 64, (i / 16) * 64, 60, 40),
            offset_x: 2,
            offset_y: 3,
            original_width: 72,
            original_height: 72,
            rotated,
        })
        .collect()
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_tasks");
    for count in [100usize, 1000, 5000] {
        let (stats, loaded) = generate_inputs(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| black_box(plan_tasks(&stats, &loaded, 10.0)))
        });
    }
    group.finish();
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_region");
    let page = RgbaImage::from_fn(1024, 1024, |x, y| Rgba([x as u8, y as u8, 0, 255]));
    let cfg = OptimizerConfig::default();
    for rotated in [false, true] {
        let regions = generate_regions(256, rotated);
        let label = if rotated { "rotated" } else { "upright" };
        group.throughput(Throughput::Elements(regions.len() as u64));
        group.bench_with_input(BenchmarkId::new(label, regions.len()), &regions, |b, regions| {
            b.iter(|| {
                for r in regions {
                    let _ = black_box(extract_region(&page, r, &cfg));
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_plan, bench_extract);
criterion_main!(benches);
