use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Context;
use atlas_slim_core::prelude::*;
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, warn};

mod atlas_text;
mod inputs;

use inputs::{
    gather_paths, load_images_with_progress, load_stats, progress_bar, sprite_output_path,
    sprites_to_loaded, unpack_atlas,
};

#[derive(Parser, Debug)]
#[command(
    name = "atlas-slim",
    about = "Downsize sprite assets to the size they are actually rendered at",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show progress bars (disable with --progress false or --quiet)
    #[arg(long, default_value_t = true, action=ArgAction::Set, global=true, help_heading = "Logging/UX")]
    progress: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(
        short,
        long,
        default_value_t = false,
        global = true,
        help_heading = "Logging/UX"
    )]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rebuild every sprite of an atlas as a standalone PNG
    Unpack(UnpackArgs),
    /// Plan target sizes from render statistics and print the plan
    Plan(PlanArgs),
    /// Plan, resample and write the downsized sprites into one ZIP archive
    Optimize(OptimizeArgs),
}

#[derive(Parser, Debug, Clone)]
struct UnpackArgs {
    /// Atlas text file (.atlas); page images are resolved next to it
    #[arg(help_heading = "Input/Output")]
    atlas: PathBuf,
    /// Output directory
    #[arg(short, long, default_value = "sprites", help_heading = "Input/Output")]
    out_dir: PathBuf,
    #[command(flatten)]
    tuning: TuningArgs,
}

#[derive(Args, Debug, Clone)]
struct SourceArgs {
    /// Render statistics (JSON array of asset stats)
    #[arg(long, help_heading = "Input/Output")]
    stats: PathBuf,
    /// Atlas files whose sprites take part in the plan
    #[arg(long, help_heading = "Input/Output")]
    atlas: Vec<PathBuf>,
    /// Directory (or single file) of loose sprite images
    #[arg(long, help_heading = "Input/Output")]
    images: Option<PathBuf>,
    /// Include patterns (glob). If set, only files matching any pattern are considered
    #[arg(long, help_heading = "Input/Output")]
    include: Vec<String>,
    /// Exclude patterns (glob). Files matching any pattern will be ignored
    #[arg(long, help_heading = "Input/Output")]
    exclude: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct TuningArgs {
    /// YAML config file path (keys present in the file override flags)
    #[arg(long, help_heading = "Tuning")]
    config: Option<PathBuf>,
    /// Safety buffer in percent added to observed render sizes
    #[arg(long = "buffer", default_value_t = 0.0, help_heading = "Tuning")]
    buffer_percent: f64,
    /// Resample filter: nearest|triangle|catmull_rom|gaussian|lanczos3
    #[arg(long, default_value = "lanczos3", help_heading = "Tuning")]
    filter: String,
    /// Largest canvas side allowed when rebuilding or resampling
    #[arg(long, default_value_t = 16384, help_heading = "Tuning")]
    max_surface_side: u32,
    /// Unpack pages and resample in parallel (requires core feature `parallel`)
    #[arg(long, default_value_t = false, help_heading = "Tuning")]
    parallel: bool,
}

#[derive(Parser, Debug, Clone)]
struct PlanArgs {
    #[command(flatten)]
    source: SourceArgs,
    #[command(flatten)]
    tuning: TuningArgs,
    /// Print the plan as JSON instead of a table
    #[arg(long, default_value_t = false, help_heading = "Export")]
    json: bool,
    /// Write the JSON plan report to this file
    #[arg(long, help_heading = "Export")]
    export_report: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
struct OptimizeArgs {
    #[command(flatten)]
    source: SourceArgs,
    #[command(flatten)]
    tuning: TuningArgs,
    /// Output ZIP file
    #[arg(short, long, default_value = "optimized.zip", help_heading = "Input/Output")]
    output: PathBuf,
    /// Root folder inside the archive
    #[arg(long, default_value = "optimized", help_heading = "Export")]
    archive_root: String,
    /// Entry compression: stored|deflated
    #[arg(long, default_value = "deflated", help_heading = "Export")]
    compression: String,
    /// Deflate level (0..=9)
    #[arg(long, help_heading = "Export")]
    compression_level: Option<i64>,
    /// Only export sprites that are actually resized
    #[arg(long, default_value_t = false, help_heading = "Export")]
    only_resized: bool,
    /// Write the JSON plan report to this file
    #[arg(long, help_heading = "Export")]
    export_report: Option<PathBuf>,
    /// Print the merged configuration (after CLI/YAML) and exit
    #[arg(long, default_value_t = false, help_heading = "Export")]
    print_config: bool,
    /// Output format for --print-config: json|yaml
    #[arg(long, default_value = "json", value_parser = ["json", "yaml"], help_heading = "Export")]
    print_config_format: String,
    /// Dry run: plan and report but do not write the archive
    #[arg(long, default_value_t = false, help_heading = "Export")]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    let show_progress = cli.progress && !cli.quiet;
    match &cli.command {
        Commands::Unpack(args) => run_unpack(args, show_progress),
        Commands::Plan(args) => run_plan(args, show_progress),
        Commands::Optimize(args) => run_optimize(args, show_progress),
    }
}

/// Logs diagnostics through `tracing` and counts them for the final report.
#[derive(Default)]
struct CountingSink {
    count: AtomicUsize,
}

impl CountingSink {
    fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

impl DiagnosticSink for CountingSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.count.fetch_add(1, Ordering::Relaxed);
        TracingSink.report(diagnostic);
    }
}

fn run_unpack(args: &UnpackArgs, show_progress: bool) -> anyhow::Result<()> {
    let cfg = build_config(&args.tuning, OptimizerConfig::default())?;
    let sink = CountingSink::default();
    let sprites = unpack_atlas(&args.atlas, &cfg, &sink, show_progress)?;

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create out_dir {}", args.out_dir.display()))?;
    let mut written = 0usize;
    for (name, sprite) in &sprites {
        let Some(path) = sprite_output_path(&args.out_dir, name) else {
            warn!(sprite = %name, "name escapes the output directory, skipping");
            continue;
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = sprite
            .encode_png()
            .with_context(|| format!("encode sprite {name}"))?;
        fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
        written += 1;
    }
    info!(
        written,
        degraded = sink.count(),
        out_dir = %args.out_dir.display(),
        "unpack done"
    );
    Ok(())
}

fn run_plan(args: &PlanArgs, show_progress: bool) -> anyhow::Result<()> {
    let cfg = build_config(&args.tuning, OptimizerConfig::default())?;
    let sink = CountingSink::default();
    let tasks = plan_from_sources(&args.source, &cfg, &sink, show_progress)?;

    let report = plan_to_json(&tasks);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_plan_table(&tasks);
    }
    if let Some(path) = &args.export_report {
        write_report(path, &report)?;
    }
    Ok(())
}

fn run_optimize(args: &OptimizeArgs, show_progress: bool) -> anyhow::Result<()> {
    let base = OptimizerConfig {
        archive_root: args.archive_root.clone(),
        compression: args
            .compression
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown compression: {}", args.compression))?,
        compression_level: args.compression_level,
        ..OptimizerConfig::default()
    };
    let cfg = build_config(&args.tuning, base)?;

    if args.print_config {
        match args.print_config_format.as_str() {
            "yaml" => println!("{}", serde_yaml::to_string(&cfg)?),
            _ => println!("{}", serde_json::to_string_pretty(&cfg)?),
        }
        return Ok(());
    }

    let sink = CountingSink::default();
    let mut tasks = plan_from_sources(&args.source, &cfg, &sink, show_progress)?;
    if args.only_resized {
        tasks.retain(|t| t.is_resize);
    }
    if let Some(path) = &args.export_report {
        write_report(path, &plan_to_json(&tasks))?;
    }
    let summary = PlanSummary::from_tasks(&tasks);
    info!("{}", summary.summary());

    if args.dry_run {
        info!("dry run: archive not written");
        return Ok(());
    }

    let bar = progress_bar(show_progress, tasks.len() as u64, "packing")?;
    let archive = pack_archive(&tasks, &cfg, &sink, |done, _| {
        if let Some(b) = &bar {
            b.set_position(done as u64);
        }
    })?;
    if let Some(b) = &bar {
        b.finish_and_clear();
    }

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create output dir {}", parent.display()))?;
    }
    fs::write(&args.output, &archive)
        .with_context(|| format!("write {}", args.output.display()))?;
    info!(
        output = %args.output.display(),
        entries = tasks.len(),
        bytes = archive.len(),
        degraded = sink.count(),
        "archive written"
    );
    Ok(())
}

fn plan_from_sources(
    source: &SourceArgs,
    cfg: &OptimizerConfig,
    sink: &dyn DiagnosticSink,
    show_progress: bool,
) -> anyhow::Result<Vec<OptimizationTask>> {
    if source.atlas.is_empty() && source.images.is_none() {
        anyhow::bail!("nothing to plan: pass --atlas and/or --images");
    }
    let stats = load_stats(&source.stats)?;

    let mut loaded = LoadedImages::new();
    for atlas in &source.atlas {
        let sprites = unpack_atlas(atlas, cfg, sink, show_progress)?;
        sprites_to_loaded(sprites, &mut loaded);
    }
    if let Some(dir) = &source.images {
        let paths = gather_paths(dir, &source.include, &source.exclude)?;
        let root = if dir.is_file() {
            dir.parent().unwrap_or(Path::new(""))
        } else {
            dir.as_path()
        };
        load_images_with_progress(root, &paths, &mut loaded, show_progress)?;
    }
    info!(stats = stats.len(), images = loaded.len(), "inputs loaded");

    Ok(plan_tasks(&stats, &loaded, cfg.buffer_percent))
}

fn print_plan_table(tasks: &[OptimizationTask]) {
    for t in tasks {
        let action = if t.is_resize { "resize" } else { "keep" };
        let note = t
            .override_percentage
            .map(|p| format!(" (override {p}%)"))
            .unwrap_or_default();
        println!(
            "{:<6} {:>5}x{:<5} -> {:>5}x{:<5} {}{}",
            action,
            t.original_width,
            t.original_height,
            t.target_width,
            t.target_height,
            t.file_name,
            note
        );
    }
    println!("{}", PlanSummary::from_tasks(tasks).summary());
}

fn write_report(path: &Path, report: &serde_json::Value) -> anyhow::Result<()> {
    fs::write(path, serde_json::to_vec_pretty(report)?)
        .with_context(|| format!("write report {}", path.display()))?;
    info!(path = %path.display(), "plan report written");
    Ok(())
}

/// Merges flags into `base`, then lets a YAML config file override them, then validates.
fn build_config(
    tuning: &TuningArgs,
    base: OptimizerConfig,
) -> anyhow::Result<OptimizerConfig> {
    let mut cfg = OptimizerConfig {
        buffer_percent: tuning.buffer_percent,
        filter: tuning
            .filter
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown filter: {}", tuning.filter))?,
        max_surface_side: tuning.max_surface_side,
        parallel: tuning.parallel,
        ..base
    };
    if let Some(path) = &tuning.config {
        let file = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let y: YamlConfig = serde_yaml::from_str(&file)?;
        cfg = y.into_optimizer_config(cfg);
    }
    if cfg.parallel && !cfg!(feature = "parallel") {
        warn!("--parallel has no effect without the `parallel` feature");
    }
    cfg.validate()?;
    Ok(cfg)
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .try_init();
}

#[derive(Debug, Deserialize, Default)]
struct YamlConfig {
    buffer_percent: Option<f64>,
    filter: Option<String>,
    archive_root: Option<String>,
    compression: Option<String>,
    compression_level: Option<i64>,
    max_surface_side: Option<u32>,
    parallel: Option<bool>,
}

/// Parses a named YAML value, keeping `current` (with a warning) when the name is unknown.
fn parse_or_keep<T>(key: &str, value: &str, current: T) -> T
where
    T: std::str::FromStr + std::fmt::Debug,
{
    match value.parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(key, value, keeping = ?current, "unknown value in config");
            current
        }
    }
}

impl YamlConfig {
    fn into_optimizer_config(self, mut cfg: OptimizerConfig) -> OptimizerConfig {
        if let Some(v) = self.buffer_percent {
            cfg.buffer_percent = v;
        }
        if let Some(v) = self.filter {
            cfg.filter = parse_or_keep("filter", &v, cfg.filter);
        }
        if let Some(v) = self.archive_root {
            cfg.archive_root = v;
        }
        if let Some(v) = self.compression {
            cfg.compression = parse_or_keep("compression", &v, cfg.compression);
        }
        if let Some(v) = self.compression_level {
            cfg.compression_level = Some(v);
        }
        if let Some(v) = self.max_surface_side {
            cfg.max_surface_side = v;
        }
        if let Some(v) = self.parallel {
            cfg.parallel = v;
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_keys_override_flags() {
        let y: YamlConfig =
            serde_yaml::from_str("buffer_percent: 12.5\nfilter: nearest\nparallel: true\n")
                .expect("yaml");
        let cfg = y.into_optimizer_config(OptimizerConfig::default());
        assert_eq!(cfg.buffer_percent, 12.5);
        assert_eq!(cfg.filter, ResampleFilter::Nearest);
        assert!(cfg.parallel);
        assert_eq!(cfg.archive_root, "optimized");
    }

    #[test]
    fn unknown_yaml_names_keep_the_flag_value() {
        let y: YamlConfig = serde_yaml::from_str("filter: sinc\ncompression: zstd\n").expect("yaml");
        let base = OptimizerConfig::builder()
            .filter(ResampleFilter::Gaussian)
            .compression(ArchiveCompression::Stored)
            .build();
        let cfg = y.into_optimizer_config(base);
        assert_eq!(cfg.filter, ResampleFilter::Gaussian);
        assert_eq!(cfg.compression, ArchiveCompression::Stored);
    }

    #[test]
    fn named_yaml_values_parse_or_fall_back() {
        assert_eq!(
            parse_or_keep("filter", "Lanczos3", ResampleFilter::Nearest),
            ResampleFilter::Lanczos3
        );
        assert_eq!(
            parse_or_keep("filter", "lanczos-3", ResampleFilter::Nearest),
            ResampleFilter::Nearest
        );
        assert_eq!(
            parse_or_keep("compression", "zstd", ArchiveCompression::Deflated),
            ArchiveCompression::Deflated
        );
    }

    #[test]
    fn cli_parses_optimize_flags() {
        let cli = Cli::try_parse_from([
            "atlas-slim",
            "optimize",
            "--stats",
            "stats.json",
            "--atlas",
            "a.atlas",
            "--atlas",
            "b.atlas",
            "--buffer",
            "10",
            "--only-resized",
            "-o",
            "out/slim.zip",
        ])
        .expect("parse");
        match cli.command {
            Commands::Optimize(args) => {
                assert_eq!(args.source.atlas.len(), 2);
                assert_eq!(args.tuning.buffer_percent, 10.0);
                assert!(args.only_resized);
                assert_eq!(args.output, PathBuf::from("out/slim.zip"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn counting_sink_counts_reports() {
        let sink = CountingSink::default();
        sink.report(Diagnostic::new(DiagnosticKind::MissingSource, "page.png", "gone"));
        sink.report(Diagnostic::new(DiagnosticKind::DecodeFailure, "x.png", "bad"));
        assert_eq!(sink.count(), 2);
    }
}
