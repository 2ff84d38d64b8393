use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use atlas_slim_core::prelude::*;
use globset::{Glob, GlobSet, GlobSetBuilder};
use image::ImageReader;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::atlas_text::{AtlasFile, parse_atlas};

/// Progress bar with the given label, or `None` when progress output is off.
pub fn progress_bar(show: bool, len: u64, label: &str) -> anyhow::Result<Option<ProgressBar>> {
    if !show {
        return Ok(None);
    }
    let bar = ProgressBar::new(len);
    bar.set_style(ProgressStyle::with_template(&format!(
        "{{spinner:.green}} {label} {{pos}}/{{len}} [{{elapsed_precise}}] {{wide_msg}}"
    ))?);
    Ok(Some(bar))
}

/// Reads and parses an atlas file.
pub fn read_atlas(path: &Path) -> anyhow::Result<AtlasFile> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read atlas {}", path.display()))?;
    parse_atlas(&text).with_context(|| format!("parse atlas {}", path.display()))
}

/// Loads the encoded page images an atlas refers to, resolved next to the atlas file.
/// Pages that cannot be read are left out so unpacking reports them per page.
pub fn load_pages(atlas_path: &Path, atlas: &AtlasFile) -> PageImages {
    let dir = atlas_path.parent().unwrap_or_else(|| Path::new("."));
    let mut pages = PageImages::with_capacity(atlas.pages.len());
    for page in &atlas.pages {
        let path = dir.join(&page.name);
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(page = %page.name, bytes = bytes.len(), "page loaded");
                pages.insert(page.name.clone(), bytes);
            }
            Err(e) => error!(path = %path.display(), error = %e, "cannot read page"),
        }
    }
    pages
}

/// Unpacks every region of an atlas, with an optional progress bar.
pub fn unpack_atlas(
    atlas_path: &Path,
    cfg: &OptimizerConfig,
    sink: &dyn DiagnosticSink,
    show_progress: bool,
) -> anyhow::Result<SpriteSet> {
    let atlas = read_atlas(atlas_path)?;
    let pages = load_pages(atlas_path, &atlas);
    let bar = progress_bar(show_progress, atlas.regions.len() as u64, "unpacking")?;
    let sprites = unpack_pages(&pages, &atlas.regions, cfg, sink, |done, _| {
        if let Some(b) = &bar {
            b.set_position(done as u64);
        }
    });
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    info!(
        atlas = %atlas_path.display(),
        regions = atlas.regions.len(),
        sprites = sprites.len(),
        "atlas unpacked"
    );
    Ok(sprites)
}

/// Encodes reconstructed sprites as loaded images keyed by [`sprite_key`] of their name.
pub fn sprites_to_loaded(sprites: SpriteSet, loaded: &mut LoadedImages) {
    for (name, sprite) in sprites {
        let key = sprite_key(&name);
        if loaded.contains_key(&key) {
            warn!(sprite = %name, "another image already uses this key, skipping");
            continue;
        }
        match sprite.into_loaded_image(format!("{name}.png")) {
            Ok(img) => {
                loaded.insert(key, img);
            }
            Err(e) => error!(sprite = %name, error = %e, "skip sprite"),
        }
    }
}

/// Loads loose image files below `root`, keyed by [`lookup_key`] of their path relative to `root`.
pub fn load_images_with_progress(
    root: &Path,
    paths: &[PathBuf],
    loaded: &mut LoadedImages,
    progress: bool,
) -> anyhow::Result<()> {
    let bar = progress_bar(progress, paths.len() as u64, "loading")?;
    for p in paths {
        let msg = p.file_name().and_then(|s| s.to_str()).unwrap_or("");
        if let Some(b) = &bar {
            b.set_message(msg.to_string());
        }
        let rel = p
            .strip_prefix(root)
            .unwrap_or(p)
            .to_string_lossy()
            .replace('\\', "/");
        let key = lookup_key(&rel);
        if loaded.contains_key(&key) {
            warn!(path = %rel, "another image already uses this key, skipping");
        } else {
            match load_image(p) {
                Ok((w, h, bytes)) => {
                    loaded.insert(key, LoadedImage::new(rel, w, h, bytes));
                }
                Err(e) => {
                    error!(?p, error = %e, "skip image");
                }
            }
        }
        if let Some(b) = &bar {
            b.inc(1);
        }
    }
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    Ok(())
}

fn load_image(p: &Path) -> anyhow::Result<(u32, u32, Vec<u8>)> {
    let (w, h) = ImageReader::open(p)?
        .with_guessed_format()?
        .into_dimensions()?;
    let bytes = fs::read(p)?;
    Ok((w, h, bytes))
}

/// Reads the render statistics file: a JSON array of asset stats.
pub fn load_stats(path: &Path) -> anyhow::Result<Vec<GlobalAssetStat>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read stats {}", path.display()))?;
    let stats: Vec<GlobalAssetStat> =
        serde_json::from_str(&text).with_context(|| format!("parse stats {}", path.display()))?;
    Ok(stats)
}

pub fn gather_paths(
    path: &Path,
    include: &[String],
    exclude: &[String],
) -> anyhow::Result<Vec<PathBuf>> {
    let inc_set = build_globset(include)?;
    let exc_set = build_globset(exclude)?;
    let mut list: Vec<PathBuf> = Vec::new();
    if path.is_file() {
        if !should_skip(path, inc_set.as_ref(), exc_set.as_ref()) && is_image(path) {
            list.push(path.to_path_buf());
        }
    } else {
        for entry in WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let p = entry.path();
            if p.is_file() && !should_skip(p, inc_set.as_ref(), exc_set.as_ref()) && is_image(p) {
                list.push(p.to_path_buf());
            }
        }
    }
    Ok(list)
}

fn build_globset(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut b = GlobSetBuilder::new();
    for pat in patterns {
        b.add(Glob::new(pat)?);
    }
    Ok(Some(b.build()?))
}

fn should_skip(p: &Path, include: Option<&GlobSet>, exclude: Option<&GlobSet>) -> bool {
    let s = p.to_string_lossy().replace('\\', "/");
    if let Some(ex) = exclude {
        if ex.is_match(&s) {
            return true;
        }
    }
    if let Some(inc) = include {
        if !inc.is_match(&s) {
            return true;
        }
    }
    false
}

fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_ascii_lowercase()),
        Some(ext) if matches!(ext.as_str(), "png" | "jpg" | "jpeg")
    )
}

/// Safe relative output path for a sprite name; `None` when the name would escape the output dir.
pub fn sprite_output_path(out_dir: &Path, name: &str) -> Option<PathBuf> {
    let unified = name.replace('\\', "/");
    let mut path = out_dir.to_path_buf();
    let mut any = false;
    for seg in unified.split('/') {
        match seg {
            "" | "." => continue,
            ".." => return None,
            s if s.contains(':') => return None,
            s => {
                path.push(s);
                any = true;
            }
        }
    }
    if !any {
        return None;
    }
    let file = path.file_name()?.to_string_lossy().into_owned();
    path.set_file_name(format!("{file}.png"));
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sprite_paths_stay_inside_the_output_dir() {
        let out = Path::new("out");
        assert_eq!(
            sprite_output_path(out, "characters/hero"),
            Some(PathBuf::from("out/characters/hero.png"))
        );
        assert_eq!(
            sprite_output_path(out, "./ui\\icon.v2"),
            Some(PathBuf::from("out/ui/icon.v2.png"))
        );
        assert_eq!(sprite_output_path(out, "../escape"), None);
        assert_eq!(sprite_output_path(out, "C:/abs"), None);
        assert_eq!(sprite_output_path(out, "/"), None);
    }

    fn sprite(name: &str, w: u32, h: u32, c: [u8; 4]) -> ReconstructedSprite {
        ReconstructedSprite {
            name: name.into(),
            width: w,
            height: h,
            source_width: w,
            source_height: h,
            rgba: image::RgbaImage::from_pixel(w, h, image::Rgba(c)),
        }
    }

    fn stat(key: &str, w: f64, h: f64) -> GlobalAssetStat {
        GlobalAssetStat {
            lookup_key: key.into(),
            path: format!("{key}.png"),
            max_render_width: w,
            max_render_height: h,
            max_scale_x: 0.5,
            max_scale_y: 0.5,
            is_overridden: false,
            override_percentage: None,
        }
    }

    #[test]
    fn dotted_region_names_keep_separate_keys() {
        let mut sprites = SpriteSet::new();
        sprites.insert("fx/spark.1".into(), sprite("fx/spark.1", 40, 20, [255, 0, 0, 255]));
        sprites.insert("fx/spark.2".into(), sprite("fx/spark.2", 30, 30, [0, 255, 0, 255]));

        let mut loaded = LoadedImages::new();
        sprites_to_loaded(sprites, &mut loaded);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["fx/spark.1"].path, "fx/spark.1.png");
        assert_eq!(loaded["fx/spark.2"].path, "fx/spark.2.png");

        let stats = vec![stat("fx/spark.1", 20.0, 10.0), stat("fx/spark.2", 15.0, 15.0)];
        let tasks = plan_tasks(&stats, &loaded, 0.0);
        let mut planned: Vec<(&str, u32, u32)> = tasks
            .iter()
            .map(|t| (t.file_name.as_str(), t.target_width, t.target_height))
            .collect();
        planned.sort();
        assert_eq!(
            planned,
            vec![("fx/spark.1.png", 20, 10), ("fx/spark.2.png", 15, 15)]
        );
    }

    #[test]
    fn only_codecs_the_loader_reads_count_as_images() {
        assert!(is_image(Path::new("a/b.PNG")));
        assert!(is_image(Path::new("a/b.jpeg")));
        assert!(!is_image(Path::new("a/b.atlas")));
        assert!(!is_image(Path::new("a/b")));
    }
}
