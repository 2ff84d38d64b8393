//! Core library for downsizing sprite assets of a skeletal-animation runtime.
//!
//! - Unpacking: `unpack_pages` rebuilds every sprite packed into atlas pages (rotation + trim undone)
//! - Planning: `plan_tasks` turns render statistics into per-sprite target sizes, never upscaling
//! - Output: `pack_archive` resamples what needs it and writes one ZIP of PNGs
//! - Recoverable failures are reported through a `DiagnosticSink` instead of aborting the batch.
//!
//! Quick example:
//! ```ignore
//! use atlas_slim_core::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let cfg = OptimizerConfig::builder().buffer_percent(10.0).build();
//! let sprites = unpack_pages(&pages, &regions, &cfg, &TracingSink, |_, _| {});
//! let mut loaded = LoadedImages::new();
//! for (name, sprite) in sprites {
//!     loaded.insert(sprite_key(&name), sprite.into_loaded_image(format!("{name}.png"))?);
//! }
//! let tasks = plan_tasks(&stats, &loaded, cfg.buffer_percent);
//! let zip = pack_archive(&tasks, &cfg, &TracingSink, |done, total| println!("{done}/{total}"))?;
//! std::fs::write("optimized.zip", zip)?;
//! # Ok(()) }
//! ```

pub mod compositing;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod export;
pub mod extract;
pub mod model;
pub mod package;
pub mod policy;
pub mod resample;
pub mod unpack;

pub use config::*;
pub use diagnostics::*;
pub use error::*;
pub use export::*;
pub use extract::*;
pub use model::*;
pub use package::*;
pub use policy::*;
pub use resample::*;
pub use unpack::*;

/// Convenience prelude for common types and functions.
/// Importing `atlas_slim_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::config::{
        ArchiveCompression, OptimizerConfig, OptimizerConfigBuilder, ResampleFilter,
    };
    pub use crate::diagnostics::{
        CollectingSink, Diagnostic, DiagnosticKind, DiagnosticSink, TracingSink,
    };
    pub use crate::model::{
        AtlasRegion, GlobalAssetStat, LoadedImage, LoadedImages, OptimizationTask, PlanSummary,
        ReconstructedSprite, Rect,
    };
    pub use crate::{
        extract_region, lookup_key, output_file_name, pack_archive, plan_tasks, plan_to_json,
        resample_png, sprite_key, unpack_pages, PageImages, SpriteSet,
    };
}
