use crate::error::SlimError;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::warn;

/// Recoverable failure categories. None of these abort a batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A referenced page file or loaded image is absent.
    MissingSource,
    /// Image bytes could not be decoded.
    DecodeFailure,
    /// A drawing surface could not be allocated or encoded.
    SurfaceFailure,
    /// Region geometry does not fit its page.
    InvalidRegion,
    /// Two tasks resolved to the same archive entry; the later one was dropped.
    DuplicateEntry,
}

/// One non-fatal event: what went wrong, and for which asset/page/entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub subject: String,
    pub detail: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            detail: detail.into(),
        }
    }

    pub fn from_error(subject: impl Into<String>, err: &SlimError) -> Self {
        Self::new(err.diagnostic_kind(), subject, err.to_string())
    }
}

/// Receives diagnostics as they happen. Implementations decide whether to surface or drop them.
///
/// `Send + Sync` so one sink can be shared by parallel page/task workers.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Logs every diagnostic as a `tracing` warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        warn!(
            kind = ?diagnostic.kind,
            subject = %diagnostic.subject,
            detail = %diagnostic.detail,
            "asset degraded"
        );
    }
}

/// Keeps every diagnostic in memory for later inspection.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the diagnostics reported so far, in arrival order.
    pub fn events(&self) -> Vec<Diagnostic> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of diagnostics of the given kind.
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|d| d.kind == kind)
            .count()
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(diagnostic);
    }
}
