//! Run configuration.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::codec::{JpegCodec, PngCodec, TileCodec};
use crate::merge::{ByInputOrder, ByMaxLevel, Priority};
use crate::{Error, Result};

/// Workers started per available core. Tasks mostly wait
/// on file I/O.
pub const WORKERS_PER_CORE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn codec(&self) -> Arc<dyn TileCodec> {
        match self {
            OutputFormat::Jpeg => Arc::new(JpegCodec),
            OutputFormat::Png => Arc::new(PngCodec),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            _ => Err(Error::Config(format!("unknown output format: {}", s))),
        }
    }
}

/// Parse a priority policy name: `max-level` or
/// `input-order`.
pub fn priority_from_str(s: &str) -> Result<Arc<dyn Priority>> {
    match s.to_ascii_lowercase().as_str() {
        "max-level" => Ok(Arc::new(ByMaxLevel)),
        "input-order" => Ok(Arc::new(ByInputOrder)),
        _ => Err(Error::Config(format!("unknown priority policy: {}", s))),
    }
}

/// Options of a merge run. See [`Default`] for the
/// defaults.
#[derive(Clone)]
pub struct MergeOptions {
    /// Encoding quality in `[0, 1]`.
    pub quality: f32,
    pub format: OutputFormat,
    /// Size of the worker pool.
    pub workers: usize,
    /// How long to wait for the pool to drain once every
    /// tile is submitted.
    pub drain_timeout: Duration,
    /// Minimum time between two progress reports.
    pub report_interval: Duration,
    /// Colour transparent pixels are flattened onto.
    pub background: [u8; 3],
    pub priority: Arc<dyn Priority>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        MergeOptions {
            quality: 0.9,
            format: OutputFormat::Jpeg,
            workers: (cores * WORKERS_PER_CORE).max(1),
            drain_timeout: Duration::from_secs(2 * 24 * 60 * 60),
            report_interval: Duration::from_secs(10),
            background: [0, 0, 0],
            priority: Arc::new(ByMaxLevel),
        }
    }
}

impl fmt::Debug for MergeOptions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MergeOptions")
            .field("quality", &self.quality)
            .field("format", &self.format)
            .field("workers", &self.workers)
            .field("drain_timeout", &self.drain_timeout)
            .field("report_interval", &self.report_interval)
            .field("background", &self.background)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Builder methods
impl MergeOptions {
    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn with_background(mut self, background: [u8; 3]) -> Self {
        self.background = background;
        self
    }

    pub fn with_priority(mut self, priority: Arc<dyn Priority>) -> Self {
        self.priority = priority;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0. ..=1.).contains(&self.quality) {
            return Err(Error::Config(format!(
                "quality must be within [0, 1]: got {}",
                self.quality
            )));
        }
        if self.workers == 0 {
            return Err(Error::Config("at least one worker is required".into()));
        }
        if self.drain_timeout == Duration::from_secs(0) {
            return Err(Error::Config("drain timeout must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let options = MergeOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.quality, 0.9);
        assert_eq!(options.format, OutputFormat::Jpeg);
        assert!(options.workers >= WORKERS_PER_CORE);
    }

    #[test]
    fn invalid_options() {
        assert!(MergeOptions::default().with_quality(1.5).validate().is_err());
        assert!(MergeOptions::default().with_quality(-0.1).validate().is_err());
        assert!(MergeOptions::default().with_workers(0).validate().is_err());
        let err = MergeOptions::default()
            .with_drain_timeout(Duration::from_secs(0))
            .validate()
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn parse_names() {
        assert_eq!("JPG".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("png".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert!("tif".parse::<OutputFormat>().is_err());
        assert!(priority_from_str("max-level").is_ok());
        assert!(priority_from_str("input-order").is_ok());
        assert!(priority_from_str("newest").is_err());
    }
}
