use crate::diagnostics::DiagnosticKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlimError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("Missing source: {0}")]
    MissingSource(String),
    #[error("Decode failure: {0}")]
    Decode(String),
    #[error("Cannot allocate a {width}x{height} surface")]
    Surface { width: u32, height: u32 },
    #[error("Encoding error: {0}")]
    Encode(String),
    #[error("Region '{name}' is invalid: {reason}")]
    InvalidRegion { name: String, reason: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SlimError {
    /// Category used when this error is downgraded to a diagnostic.
    pub fn diagnostic_kind(&self) -> DiagnosticKind {
        match self {
            SlimError::MissingSource(_) => DiagnosticKind::MissingSource,
            SlimError::Decode(_) => DiagnosticKind::DecodeFailure,
            SlimError::InvalidRegion { .. } => DiagnosticKind::InvalidRegion,
            _ => DiagnosticKind::SurfaceFailure,
        }
    }
}

pub type Result<T> = std::result::Result<T, SlimError>;
