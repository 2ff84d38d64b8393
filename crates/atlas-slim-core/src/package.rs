use crate::config::{ArchiveCompression, OptimizerConfig};
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::error::Result;
use crate::model::OptimizationTask;
use crate::resample::resample_png;
use std::borrow::Cow;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use tracing::{debug, info, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[instrument(skip_all, fields(tasks = tasks.len()))]
/// Writes every task into one ZIP archive under `cfg.archive_root` and returns the archive bytes.
///
/// Notes:
/// - Tasks are written in the given order; any subset of a plan is accepted.
/// - Resize tasks go through [`resample_png`]; if that fails the original bytes are written
///   instead and a diagnostic is reported, so no asset goes missing.
/// - Entry names are `<archive_root>/<file_name>`, nested folders kept as-is. A name already
///   written is skipped with a `DuplicateEntry` diagnostic.
/// - `on_progress(done, total)` fires after each task and ends at `(total, total)`.
/// - Only failures of the archive writer itself are returned as errors.
pub fn pack_archive<F>(
    tasks: &[OptimizationTask],
    cfg: &OptimizerConfig,
    sink: &dyn DiagnosticSink,
    on_progress: F,
) -> Result<Vec<u8>>
where
    F: FnMut(usize, usize),
{
    #[cfg(feature = "parallel")]
    {
        if cfg.parallel {
            let payloads: Vec<Cow<'_, [u8]>> = tasks
                .par_iter()
                .map(|task| task_payload(task, cfg, sink))
                .collect();
            let entries = tasks.iter().zip(payloads);
            return write_archive(entries, tasks.len(), cfg, sink, on_progress);
        }
    }

    let entries = tasks.iter().map(|task| (task, task_payload(task, cfg, sink)));
    write_archive(entries, tasks.len(), cfg, sink, on_progress)
}

fn task_payload<'a>(
    task: &'a OptimizationTask,
    cfg: &OptimizerConfig,
    sink: &dyn DiagnosticSink,
) -> Cow<'a, [u8]> {
    if !task.is_resize {
        return Cow::Borrowed(&task.blob[..]);
    }
    match resample_png(&task.blob, task.target_width, task.target_height, cfg) {
        Ok(bytes) => Cow::Owned(bytes),
        Err(e) => {
            sink.report(Diagnostic::new(
                e.diagnostic_kind(),
                task.relative_path.as_str(),
                format!("{e}; keeping original bytes"),
            ));
            Cow::Borrowed(&task.blob[..])
        }
    }
}

fn write_archive<'a, I, F>(
    entries: I,
    total: usize,
    cfg: &OptimizerConfig,
    sink: &dyn DiagnosticSink,
    mut on_progress: F,
) -> Result<Vec<u8>>
where
    I: Iterator<Item = (&'a OptimizationTask, Cow<'a, [u8]>)>,
    F: FnMut(usize, usize),
{
    let options = entry_options(cfg);
    let root = cfg.archive_root.trim_end_matches('/');
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.add_directory(format!("{root}/"), options)?;

    let mut written: HashSet<String> = HashSet::with_capacity(total);
    for (done, (task, payload)) in entries.enumerate() {
        let entry = format!("{root}/{}", task.file_name);
        if written.contains(&entry) {
            sink.report(Diagnostic::new(
                DiagnosticKind::DuplicateEntry,
                entry.as_str(),
                format!("'{}' maps to an entry that was already written", task.relative_path),
            ));
        } else {
            writer.start_file(entry.as_str(), options)?;
            writer.write_all(&payload)?;
            debug!(
                entry = %entry,
                bytes = payload.len(),
                resized = task.is_resize,
                "entry written"
            );
            written.insert(entry);
        }
        on_progress(done + 1, total);
    }

    let cursor = writer.finish()?;
    let bytes = cursor.into_inner();
    info!(entries = written.len(), bytes = bytes.len(), "archive assembled");
    Ok(bytes)
}

fn entry_options(cfg: &OptimizerConfig) -> SimpleFileOptions {
    match cfg.compression {
        ArchiveCompression::Stored => {
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
        }
        ArchiveCompression::Deflated => SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(cfg.compression_level),
    }
}
