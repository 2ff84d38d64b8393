//! Reader for Spine/libGDX `.atlas` text files (legacy and 4.x layouts).

use anyhow::{Context, bail};
use atlas_slim_core::{AtlasRegion, Rect};
use std::collections::HashSet;
use tracing::{debug, warn};

/// One page header of an atlas file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasPage {
    pub name: String,
    /// Declared `size`, when the file carries one.
    pub size: Option<(u32, u32)>,
}

#[derive(Debug, Clone, Default)]
pub struct AtlasFile {
    pub pages: Vec<AtlasPage>,
    pub regions: Vec<AtlasRegion>,
}

#[derive(Default)]
struct RegionFields {
    rotate: Option<String>,
    xy: Option<(u32, u32)>,
    size: Option<(u32, u32)>,
    orig: Option<(u32, u32)>,
    offset: Option<(i32, i32)>,
    bounds: Option<[u32; 4]>,
    offsets: Option<(i32, i32, u32, u32)>,
}

/// Parses atlas text into pages and regions.
///
/// Regions keep file order. `size`/`bounds` are stored in the sprite's upright orientation, so
/// for rotated regions width and height are swapped into page space. A repeated region name keeps
/// the first occurrence.
pub fn parse_atlas(text: &str) -> anyhow::Result<AtlasFile> {
    let mut out = AtlasFile::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut page: Option<usize> = None;
    // (name, line number, fields) of the region being read.
    let mut pending: Option<(String, usize, RegionFields)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            finish_region(&mut pending, page, &mut out, &mut seen)?;
            page = None;
            continue;
        }

        let Some(page_idx) = page else {
            out.pages.push(AtlasPage {
                name: line.to_string(),
                size: None,
            });
            page = Some(out.pages.len() - 1);
            continue;
        };

        match split_entry(line) {
            Some((key, value)) => {
                if let Some((name, _, fields)) = pending.as_mut() {
                    read_region_entry(fields, key, value)
                        .with_context(|| format!("line {line_no}: region '{name}'"))?;
                } else if key == "size" {
                    let (w, h) = pair(value).with_context(|| format!("line {line_no}: page size"))?;
                    out.pages[page_idx].size = Some((w, h));
                }
            }
            None => {
                finish_region(&mut pending, page, &mut out, &mut seen)?;
                pending = Some((line.to_string(), line_no, RegionFields::default()));
            }
        }
    }
    finish_region(&mut pending, page, &mut out, &mut seen)?;

    debug!(
        pages = out.pages.len(),
        regions = out.regions.len(),
        "atlas parsed"
    );
    Ok(out)
}

fn split_entry(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    Some((key.trim(), value.trim()))
}

fn read_region_entry(fields: &mut RegionFields, key: &str, value: &str) -> anyhow::Result<()> {
    match key {
        "rotate" => fields.rotate = Some(value.to_ascii_lowercase()),
        "xy" => fields.xy = Some(pair(value)?),
        "size" => fields.size = Some(pair(value)?),
        "orig" => fields.orig = Some(pair(value)?),
        "offset" => fields.offset = Some(signed_pair(value)?),
        "bounds" => {
            let v = numbers::<u32>(value, 4)?;
            fields.bounds = Some([v[0], v[1], v[2], v[3]]);
        }
        "offsets" => {
            let v = numbers::<i64>(value, 4)?;
            fields.offsets = Some((
                i32::try_from(v[0])?,
                i32::try_from(v[1])?,
                u32::try_from(v[2])?,
                u32::try_from(v[3])?,
            ));
        }
        // index, split, pad and anything newer carry nothing needed to rebuild pixels.
        _ => {}
    }
    Ok(())
}

fn finish_region(
    pending: &mut Option<(String, usize, RegionFields)>,
    page: Option<usize>,
    out: &mut AtlasFile,
    seen: &mut HashSet<String>,
) -> anyhow::Result<()> {
    let Some((name, line_no, fields)) = pending.take() else {
        return Ok(());
    };
    let Some(page_idx) = page else {
        bail!("line {line_no}: region '{name}' outside of a page");
    };
    let region = build_region(name, &out.pages[page_idx].name, fields)
        .with_context(|| format!("line {line_no}"))?;
    if seen.insert(region.name.clone()) {
        out.regions.push(region);
    } else {
        warn!(region = %region.name, line = line_no, "duplicate region name, keeping the first");
    }
    Ok(())
}

fn build_region(name: String, page_name: &str, f: RegionFields) -> anyhow::Result<AtlasRegion> {
    let rotated = match f.rotate.as_deref() {
        None | Some("false") | Some("0") => false,
        Some("true") | Some("90") => true,
        Some(other) => bail!("region '{name}': unsupported rotation '{other}'"),
    };

    let (x, y, w, h) = match (f.bounds, f.xy, f.size) {
        (Some([x, y, w, h]), _, _) => (x, y, w, h),
        (None, Some((x, y)), Some((w, h))) => (x, y, w, h),
        _ => bail!("region '{name}': missing position or size"),
    };

    let (offset_x, offset_y, original_width, original_height) = match f.offsets {
        Some(o) => o,
        None => {
            let (ow, oh) = f.orig.unwrap_or((w, h));
            let (ox, oy) = f.offset.unwrap_or((0, 0));
            (ox, oy, ow, oh)
        }
    };

    let frame = if rotated {
        Rect::new(x, y, h, w)
    } else {
        Rect::new(x, y, w, h)
    };

    Ok(AtlasRegion {
        name,
        page_name: page_name.to_string(),
        frame,
        offset_x,
        offset_y,
        original_width,
        original_height,
        rotated,
    })
}

fn numbers<T: std::str::FromStr>(value: &str, count: usize) -> anyhow::Result<Vec<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != count {
        bail!("expected {count} comma-separated values, got '{value}'");
    }
    parts
        .into_iter()
        .map(|p| p.parse::<T>().with_context(|| format!("bad number '{p}'")))
        .collect()
}

fn pair(value: &str) -> anyhow::Result<(u32, u32)> {
    let v = numbers::<u32>(value, 2)?;
    Ok((v[0], v[1]))
}

fn signed_pair(value: &str) -> anyhow::Result<(i32, i32)> {
    let v = numbers::<i32>(value, 2)?;
    Ok((v[0], v[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY: &str = "
hero.png
size: 256,128
format: RGBA8888
filter: Linear,Linear
repeat: none
body
  rotate: false
  xy: 2, 2
  size: 100, 60
  orig: 120, 64
  offset: 10, 3
  index: -1
arm
  rotate: true
  xy: 104, 2
  size: 30, 80
  orig: 30, 80
  offset: 0, 0
  index: -1

fx.png
size: 64,64
format: RGBA8888
filter: Linear,Linear
repeat: none
spark
  rotate: false
  xy: 0, 0
  size: 16, 16
  index: 3
";

    const SPINE4: &str = "hero.png
\tsize: 256, 128
\tfilter: Linear, Linear
\tpma: true
body
\tbounds: 2, 2, 100, 60
\toffsets: 10, 3, 120, 64
arm
\tbounds: 104, 2, 30, 80
\trotate: 90
";

    #[test]
    fn legacy_layout_with_two_pages() {
        let atlas = parse_atlas(LEGACY).expect("parse");
        assert_eq!(
            atlas.pages,
            vec![
                AtlasPage {
                    name: "hero.png".into(),
                    size: Some((256, 128))
                },
                AtlasPage {
                    name: "fx.png".into(),
                    size: Some((64, 64))
                },
            ]
        );
        assert_eq!(atlas.regions.len(), 3);

        let body = &atlas.regions[0];
        assert_eq!(body.page_name, "hero.png");
        assert_eq!(body.frame, Rect::new(2, 2, 100, 60));
        assert_eq!((body.offset_x, body.offset_y), (10, 3));
        assert_eq!((body.original_width, body.original_height), (120, 64));
        assert!(!body.rotated);

        let spark = &atlas.regions[2];
        assert_eq!(spark.page_name, "fx.png");
        assert_eq!(spark.name, "spark");
        assert_eq!((spark.original_width, spark.original_height), (16, 16));
        assert_eq!((spark.offset_x, spark.offset_y), (0, 0));
    }

    #[test]
    fn rotated_size_is_swapped_into_page_space() {
        let atlas = parse_atlas(LEGACY).expect("parse");
        let arm = &atlas.regions[1];
        assert!(arm.rotated);
        assert_eq!(arm.frame, Rect::new(104, 2, 80, 30));
        assert_eq!(arm.footprint(), (30, 80));
    }

    #[test]
    fn spine4_layout_matches_legacy() {
        let legacy = parse_atlas(LEGACY).expect("legacy");
        let v4 = parse_atlas(SPINE4).expect("4.x");
        assert_eq!(v4.pages.len(), 1);
        assert_eq!(v4.regions[0], legacy.regions[0]);
        assert_eq!(v4.regions[1], legacy.regions[1]);
    }

    #[test]
    fn duplicate_names_keep_the_first() {
        let text = "page.png\na\n  xy: 0, 0\n  size: 4, 4\na\n  xy: 8, 8\n  size: 2, 2\n";
        let atlas = parse_atlas(text).expect("parse");
        assert_eq!(atlas.regions.len(), 1);
        assert_eq!(atlas.regions[0].frame, Rect::new(0, 0, 4, 4));
    }

    #[test]
    fn unsupported_rotation_is_an_error() {
        let text = "page.png\na\n  rotate: 180\n  xy: 0, 0\n  size: 4, 4\n";
        let err = parse_atlas(text).expect_err("180 is not supported");
        assert!(format!("{err:#}").contains("unsupported rotation"));
    }

    #[test]
    fn malformed_numbers_are_errors() {
        assert!(parse_atlas("page.png\na\n  xy: 0\n  size: 4, 4\n").is_err());
        assert!(parse_atlas("page.png\na\n  xy: 0, x\n  size: 4, 4\n").is_err());
        assert!(parse_atlas("page.png\na\n  rotate: false\n").is_err());
    }

    #[test]
    fn empty_text_has_no_regions() {
        let atlas = parse_atlas("\n\n").expect("parse");
        assert!(atlas.pages.is_empty() && atlas.regions.is_empty());
    }
}
