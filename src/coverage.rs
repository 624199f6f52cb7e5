//! Images and masks that produced no annotation

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverageReport {
    /// Images with no matching mask file, in discovery order.
    pub missing: Vec<PathBuf>,
    /// Matched masks the encoder discarded as degenerate.
    pub rejected: Vec<PathBuf>,
}

impl CoverageReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_missing(&mut self, image: &Path) {
        self.missing.push(image.to_path_buf());
    }

    pub fn record_rejected(&mut self, mask: &Path) {
        self.rejected.push(mask.to_path_buf());
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.rejected.is_empty()
    }

    /// Emit the end-of-run warnings. Nothing is logged when coverage is complete.
    pub fn log_summary(&self) {
        if !self.missing.is_empty() {
            warn!(
                "{} images have no matching mask: {:?}",
                self.missing.len(),
                self.missing
            );
        }
        if !self.rejected.is_empty() {
            warn!(
                "{} matched masks were degenerate and skipped: {:?}",
                self.rejected.len(),
                self.rejected
            );
        }
    }
}
