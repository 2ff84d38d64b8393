use crate::config::OptimizerConfig;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::{Result, SlimError};
use crate::extract::extract_region;
use crate::model::{AtlasRegion, ReconstructedSprite};
use image::RgbaImage;
use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Encoded page images keyed by page file name.
pub type PageImages = HashMap<String, Vec<u8>>;

/// Reconstructed sprites keyed by region name, in region input order.
pub type SpriteSet = IndexMap<String, ReconstructedSprite>;

/// Regions of one page with their index in the caller's region list.
type PageGroup<'a> = (&'a str, Vec<(usize, &'a AtlasRegion)>);

#[instrument(skip_all, fields(regions = regions.len(), pages = pages.len()))]
/// Rebuilds every region from its page image.
///
/// Notes:
/// - Each page is decoded once and dropped before the next page is touched.
/// - A missing or undecodable page skips all of its regions; a failing region skips only itself.
///   Both are reported to `sink` and never abort the call.
/// - `on_progress(current, total)` fires once per region (skipped ones included); `total` is the
///   region count and `current` climbs by one each call until it equals `total`.
/// - Output order follows `regions`; when a name repeats, the first successful region wins.
pub fn unpack_pages<F>(
    pages: &PageImages,
    regions: &[AtlasRegion],
    cfg: &OptimizerConfig,
    sink: &dyn DiagnosticSink,
    mut on_progress: F,
) -> SpriteSet
where
    F: FnMut(usize, usize),
{
    let total = regions.len();
    let groups = group_by_page(regions);
    let mut done = 0usize;
    let mut tick = || {
        done += 1;
        on_progress(done, total);
    };

    let mut slots: Vec<Option<ReconstructedSprite>> = (0..total).map(|_| None).collect();

    #[cfg(feature = "parallel")]
    {
        if cfg.parallel {
            // Pages are independent; progress is replayed on this thread in page order afterwards.
            let results: Vec<(usize, Vec<(usize, ReconstructedSprite)>)> = groups
                .par_iter()
                .map(|(page_name, members)| {
                    let sprites = unpack_page(page_name, pages, members, cfg, sink, &mut || {});
                    (members.len(), sprites)
                })
                .collect();
            for (count, sprites) in results {
                for (idx, sprite) in sprites {
                    slots[idx] = Some(sprite);
                }
                for _ in 0..count {
                    tick();
                }
            }
            return collect_slots(slots);
        }
    }

    for (page_name, members) in &groups {
        for (idx, sprite) in unpack_page(page_name, pages, members, cfg, sink, &mut tick) {
            slots[idx] = Some(sprite);
        }
    }
    collect_slots(slots)
}

fn group_by_page(regions: &[AtlasRegion]) -> Vec<PageGroup<'_>> {
    let mut groups: IndexMap<&str, Vec<(usize, &AtlasRegion)>> = IndexMap::new();
    for (idx, region) in regions.iter().enumerate() {
        groups
            .entry(region.page_name.as_str())
            .or_default()
            .push((idx, region));
    }
    groups.into_iter().collect()
}

fn unpack_page(
    page_name: &str,
    pages: &PageImages,
    members: &[(usize, &AtlasRegion)],
    cfg: &OptimizerConfig,
    sink: &dyn DiagnosticSink,
    tick: &mut dyn FnMut(),
) -> Vec<(usize, ReconstructedSprite)> {
    let page = match decode_page(page_name, pages) {
        Ok(page) => page,
        Err(e) => {
            sink.report(Diagnostic::new(
                e.diagnostic_kind(),
                page_name,
                format!("{e}; skipping {} region(s)", members.len()),
            ));
            for _ in members {
                tick();
            }
            return Vec::new();
        }
    };
    debug!(
        page = page_name,
        width = page.width(),
        height = page.height(),
        regions = members.len(),
        "page decoded"
    );

    let mut out = Vec::with_capacity(members.len());
    for (idx, region) in members {
        match extract_region(&page, region, cfg) {
            Ok(sprite) => out.push((*idx, sprite)),
            Err(e) => sink.report(Diagnostic::from_error(region.name.as_str(), &e)),
        }
        tick();
    }
    drop(page);
    out
}

fn decode_page(page_name: &str, pages: &PageImages) -> Result<RgbaImage> {
    let bytes = pages
        .get(page_name)
        .ok_or_else(|| SlimError::MissingSource(format!("page image '{page_name}' not found")))?;
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| SlimError::Decode(format!("page '{page_name}': {e}")))?;
    Ok(decoded.into_rgba8())
}

fn collect_slots(slots: Vec<Option<ReconstructedSprite>>) -> SpriteSet {
    let mut out = SpriteSet::with_capacity(slots.len());
    for sprite in slots.into_iter().flatten() {
        out.entry(sprite.name.clone()).or_insert(sprite);
    }
    out
}
