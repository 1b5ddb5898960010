//! Directory-wide conversion: walk a tag tree, convert every matching file and
//! report per-file outcomes. One bad file never stops the batch.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::bail;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::convert::{ConversionContext, ConversionKind, Diagnostic, DiagnosticLevel, FileOutcome};
use crate::error::TagError;

/// Progress notifications for a running batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Started { total: usize },
    FileStarted { path: PathBuf, index: usize, total: usize },
    FileSucceeded { path: PathBuf, diagnostics: Vec<Diagnostic> },
    FileSkipped { path: PathBuf, reason: String },
    FileFailed { path: PathBuf, error: String },
    Cancelled { remaining: usize },
    Finished { report: ConversionReport },
}

pub fn progress_channel() -> (broadcast::Sender<BatchEvent>, broadcast::Receiver<BatchEvent>) {
    broadcast::channel(100)
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Checked between files; set it to stop the batch after the current file.
    pub cancel: Arc<AtomicBool>,
    pub progress: Option<broadcast::Sender<BatchEvent>>,
}

impl BatchOptions {
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(sender) = &self.progress {
            // no subscribers is fine
            let _ = sender.send(event);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionReport {
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    pub skipped: Vec<PathBuf>,
    /// Non-fatal findings of converted files.
    pub diagnostics: Vec<(PathBuf, Diagnostic)>,
    pub cancelled: bool,
}

impl ConversionReport {
    pub fn processed(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// Files under `root` with the given extension, in sorted walk order.
pub fn find_sources(root: &Path, source_extension: &str) -> anyhow::Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }
    let mut sources = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("skipping unreadable entry: {}", err);
                continue;
            }
        };
        if entry.file_type().is_file() && has_extension(entry.path(), source_extension) {
            sources.push(entry.into_path());
        }
    }
    Ok(sources)
}

/// Convert every `source_extension` file under `root`.
///
/// `destination_path` maps a source to its output path and `convert` does one
/// file. Failures are recorded in the report and the walk continues; a
/// converter returning [`TagError::Cancelled`] stops the batch without
/// counting the file as failed.
pub fn convert_directory<D, C>(
    root: &Path,
    source_extension: &str,
    mut destination_path: D,
    mut convert: C,
    options: &BatchOptions,
) -> anyhow::Result<ConversionReport>
where
    D: FnMut(&Path) -> PathBuf,
    C: FnMut(&Path, &Path) -> anyhow::Result<FileOutcome>,
{
    let sources = find_sources(root, source_extension)?;
    let total = sources.len();
    info!(root = %root.display(), extension = source_extension, total, "starting batch");
    options.emit(BatchEvent::Started { total });

    let mut report = ConversionReport::default();
    for (index, source) in sources.into_iter().enumerate() {
        if options.is_cancelled() {
            info!(remaining = total - index, "batch cancelled");
            options.emit(BatchEvent::Cancelled {
                remaining: total - index,
            });
            report.cancelled = true;
            break;
        }
        options.emit(BatchEvent::FileStarted {
            path: source.clone(),
            index,
            total,
        });

        let destination = destination_path(&source);
        match convert(&source, &destination) {
            Ok(FileOutcome::Written { diagnostics }) => {
                for diagnostic in &diagnostics {
                    match diagnostic.level {
                        DiagnosticLevel::Warning => warn!(path = %source.display(), "{}", diagnostic.message),
                        DiagnosticLevel::Info => info!(path = %source.display(), "{}", diagnostic.message),
                    }
                }
                info!(path = %source.display(), destination = %destination.display(), "converted");
                options.emit(BatchEvent::FileSucceeded {
                    path: source.clone(),
                    diagnostics: diagnostics.clone(),
                });
                report
                    .diagnostics
                    .extend(diagnostics.into_iter().map(|d| (source.clone(), d)));
                report.succeeded.push(source);
            }
            Ok(FileOutcome::Skipped { reason }) => {
                info!(path = %source.display(), "skipped: {}", reason);
                options.emit(BatchEvent::FileSkipped {
                    path: source.clone(),
                    reason,
                });
                report.skipped.push(source);
            }
            Err(err) if matches!(err.downcast_ref::<TagError>(), Some(TagError::Cancelled)) => {
                // the converter stopped before writing anything
                info!(path = %source.display(), remaining = total - index, "batch cancelled during file");
                options.emit(BatchEvent::Cancelled {
                    remaining: total - index,
                });
                report.cancelled = true;
                break;
            }
            Err(err) => {
                let message = format!("{:#}", err);
                error!(path = %source.display(), "conversion failed: {}", message);
                options.emit(BatchEvent::FileFailed {
                    path: source.clone(),
                    error: message.clone(),
                });
                report.failed.push((source, message));
            }
        }
    }

    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        skipped = report.skipped.len(),
        cancelled = report.cancelled,
        "batch finished"
    );
    options.emit(BatchEvent::Finished { report: report.clone() });
    Ok(report)
}

/// Run one conversion kind over a directory.
pub fn run_conversion(
    kind: ConversionKind,
    root: &Path,
    context: &ConversionContext,
    options: &BatchOptions,
) -> anyhow::Result<ConversionReport> {
    convert_directory(
        root,
        kind.source_extension(),
        |source| kind.destination_path(source, root, context),
        |source, destination| kind.convert_file(source, destination, context),
        options,
    )
}

/// Run a batch on a worker thread.
pub fn spawn_batch(
    kind: ConversionKind,
    root: PathBuf,
    context: ConversionContext,
    options: BatchOptions,
) -> anyhow::Result<JoinHandle<anyhow::Result<ConversionReport>>> {
    let handle = std::thread::Builder::new()
        .name(format!("batch-{:?}", kind).to_lowercase())
        .spawn(move || run_conversion(kind, &root, &context, &options))?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"x").unwrap();
        }
        dir
    }

    #[test]
    fn finds_sources_case_insensitively_in_order() {
        let dir = tree(&["b/two.DDS", "a/one.dds", "a/skip.bitmap", "c.dds"]);
        let names: Vec<String> = find_sources(dir.path(), "dds")
            .unwrap()
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a/one.dds", "b/two.DDS", "c.dds"]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_sources(&dir.path().join("nope"), "dds").is_err());
    }

    #[test]
    fn failures_and_skips_are_reported() {
        let dir = tree(&["1.dds", "2.dds", "3.dds"]);
        let report = convert_directory(
            dir.path(),
            "dds",
            |source| source.with_extension("bitmap"),
            |source, _| match source.file_stem().and_then(|s| s.to_str()) {
                Some("2") => anyhow::bail!("bad header"),
                Some("3") => Ok(FileOutcome::Skipped {
                    reason: "nothing to do".into(),
                }),
                _ => Ok(FileOutcome::written(vec![Diagnostic::info("note")])),
            },
            &BatchOptions::default(),
        )
        .unwrap();

        assert_eq!(report.succeeded, vec![dir.path().join("1.dds")]);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].1.contains("bad header"));
        assert_eq!(report.skipped, vec![dir.path().join("3.dds")]);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.processed(), 3);
        assert!(!report.cancelled);
    }

    #[test]
    fn cancellation_stops_between_files() {
        let dir = tree(&["1.dds", "2.dds", "3.dds"]);
        let options = BatchOptions::default();
        let mut calls = 0;
        let report = convert_directory(
            dir.path(),
            "dds",
            |source| source.to_path_buf(),
            |_, _| {
                calls += 1;
                options.cancel();
                Ok(FileOutcome::written(Vec::new()))
            },
            &options,
        )
        .unwrap();
        assert_eq!(calls, 1);
        assert!(report.cancelled);
        assert_eq!(report.succeeded.len(), 1);
    }

    #[test]
    fn converter_cancellation_is_not_a_failure() {
        let dir = tree(&["1.dds", "2.dds"]);
        let report = convert_directory(
            dir.path(),
            "dds",
            |source| source.to_path_buf(),
            |_, _| Err(TagError::Cancelled.into()),
            &BatchOptions::default(),
        )
        .unwrap();
        assert!(report.cancelled);
        assert!(report.failed.is_empty());
        assert_eq!(report.processed(), 0);
    }

    #[test]
    fn progress_events_are_broadcast() {
        let dir = tree(&["1.dds"]);
        let (sender, mut receiver) = progress_channel();
        let options = BatchOptions {
            progress: Some(sender),
            ..Default::default()
        };
        convert_directory(
            dir.path(),
            "dds",
            |source| source.to_path_buf(),
            |_, _| Ok(FileOutcome::written(Vec::new())),
            &options,
        )
        .unwrap();

        assert_eq!(receiver.try_recv().unwrap(), BatchEvent::Started { total: 1 });
        assert!(matches!(receiver.try_recv().unwrap(), BatchEvent::FileStarted { index: 0, .. }));
        assert!(matches!(receiver.try_recv().unwrap(), BatchEvent::FileSucceeded { .. }));
        assert!(matches!(receiver.try_recv().unwrap(), BatchEvent::Finished { .. }));
    }
}
