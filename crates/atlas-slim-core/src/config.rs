use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Downscale filters available to the resampler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResampleFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    /// Sharpest of the set; the default.
    Lanczos3,
}

impl FromStr for ResampleFilter {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "triangle" | "bilinear" => Ok(Self::Triangle),
            "catmull_rom" | "catmullrom" | "bicubic" => Ok(Self::CatmullRom),
            "gaussian" => Ok(Self::Gaussian),
            "lanczos3" | "lanczos" => Ok(Self::Lanczos3),
            _ => Err(()),
        }
    }
}

impl From<ResampleFilter> for FilterType {
    fn from(f: ResampleFilter) -> Self {
        match f {
            ResampleFilter::Nearest => FilterType::Nearest,
            ResampleFilter::Triangle => FilterType::Triangle,
            ResampleFilter::CatmullRom => FilterType::CatmullRom,
            ResampleFilter::Gaussian => FilterType::Gaussian,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Compression applied to archive entries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveCompression {
    Stored,
    Deflated,
}

impl FromStr for ArchiveCompression {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stored" | "store" | "none" => Ok(Self::Stored),
            "deflated" | "deflate" => Ok(Self::Deflated),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizerConfig {
    /// Safety buffer (percent) added on top of the observed render size of non-overridden sprites.
    #[serde(default)]
    pub buffer_percent: f64,
    /// Downscale filter.
    #[serde(default = "default_filter")]
    pub filter: ResampleFilter,
    /// Root folder every archive entry is written under.
    #[serde(default = "default_archive_root")]
    pub archive_root: String,
    #[serde(default = "default_compression")]
    pub compression: ArchiveCompression,
    /// Deflate level 0..=9. None uses the codec default.
    #[serde(default)]
    pub compression_level: Option<i64>,
    /// Largest canvas side the extractor/resampler will allocate.
    #[serde(default = "default_max_surface_side")]
    pub max_surface_side: u32,
    /// Unpack pages and resample tasks in parallel when feature "parallel" is on.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            buffer_percent: 0.0,
            filter: default_filter(),
            archive_root: default_archive_root(),
            compression: default_compression(),
            compression_level: None,
            max_surface_side: default_max_surface_side(),
            parallel: default_parallel(),
        }
    }
}

impl OptimizerConfig {
    /// Validates the configuration parameters.
    ///
    /// Returns an error if:
    /// - `buffer_percent` is negative or not finite
    /// - `max_surface_side` is zero
    /// - `archive_root` is empty, absolute, or escapes via `..`
    /// - `compression_level` is outside 0..=9 for deflate, or set for stored entries
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::SlimError;

        if !self.buffer_percent.is_finite() || self.buffer_percent < 0.0 {
            return Err(SlimError::InvalidConfig(format!(
                "buffer_percent must be a finite value >= 0 (got {})",
                self.buffer_percent
            )));
        }

        if self.max_surface_side == 0 {
            return Err(SlimError::InvalidConfig(
                "max_surface_side must be greater than zero".into(),
            ));
        }

        let root = self.archive_root.trim_end_matches('/');
        if root.is_empty() {
            return Err(SlimError::InvalidConfig("archive_root is empty".into()));
        }
        if root.starts_with('/') || root.starts_with('\\') {
            return Err(SlimError::InvalidConfig(format!(
                "archive_root must be relative (got {})",
                self.archive_root
            )));
        }
        if root.split(['/', '\\']).any(|seg| seg == "..") {
            return Err(SlimError::InvalidConfig(format!(
                "archive_root must not contain '..' (got {})",
                self.archive_root
            )));
        }

        match (self.compression, self.compression_level) {
            (ArchiveCompression::Deflated, Some(level)) if !(0..=9).contains(&level) => {
                return Err(SlimError::InvalidConfig(format!(
                    "compression_level must be within 0..=9 (got {level})"
                )));
            }
            (ArchiveCompression::Stored, Some(_)) => {
                return Err(SlimError::InvalidConfig(
                    "compression_level has no effect on stored entries".into(),
                ));
            }
            _ => {}
        }

        Ok(())
    }
}

fn default_filter() -> ResampleFilter {
    ResampleFilter::Lanczos3
}
fn default_archive_root() -> String {
    "optimized".into()
}
fn default_compression() -> ArchiveCompression {
    ArchiveCompression::Deflated
}
fn default_max_surface_side() -> u32 {
    16384
}
fn default_parallel() -> bool {
    false
}

/// Builder for `OptimizerConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct OptimizerConfigBuilder {
    cfg: OptimizerConfig,
}

impl OptimizerConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: OptimizerConfig::default(),
        }
    }
    pub fn buffer_percent(mut self, v: f64) -> Self {
        self.cfg.buffer_percent = v;
        self
    }
    pub fn filter(mut self, v: ResampleFilter) -> Self {
        self.cfg.filter = v;
        self
    }
    pub fn archive_root(mut self, v: impl Into<String>) -> Self {
        self.cfg.archive_root = v.into();
        self
    }
    pub fn compression(mut self, v: ArchiveCompression) -> Self {
        self.cfg.compression = v;
        self
    }
    pub fn compression_level(mut self, v: Option<i64>) -> Self {
        self.cfg.compression_level = v;
        self
    }
    pub fn max_surface_side(mut self, v: u32) -> Self {
        self.cfg.max_surface_side = v;
        self
    }
    pub fn parallel(mut self, v: bool) -> Self {
        self.cfg.parallel = v;
        self
    }
    pub fn build(self) -> OptimizerConfig {
        self.cfg
    }
}

impl OptimizerConfig {
    /// Create a fluent builder for `OptimizerConfig`.
    pub fn builder() -> OptimizerConfigBuilder {
        OptimizerConfigBuilder::new()
    }
}
