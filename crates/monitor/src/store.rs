//! Calibrated threshold persistence
//!
//! The engine only consumes and produces a threshold value; this store keeps
//! it between runs as a one-field JSON document.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Serialize, Deserialize)]
struct StoredThreshold {
    ear_threshold: f64,
}

/// File-backed store for the calibrated eye-closure threshold
#[derive(Debug, Clone)]
pub struct ThresholdStore {
    path: PathBuf,
}

impl ThresholdStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored threshold, `None` when nothing was saved yet
    pub fn load(&self) -> Result<Option<f64>> {
        if !self.path.exists() {
            debug!("No stored threshold at {}", self.path.display());
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let stored: StoredThreshold = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        info!(
            "Loaded EAR threshold {:.3} from {}",
            stored.ear_threshold,
            self.path.display()
        );
        Ok(Some(stored.ear_threshold))
    }

    pub fn save(&self, ear_threshold: f64) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let body = serde_json::to_string_pretty(&StoredThreshold { ear_threshold })?;
        fs::write(&self.path, body).with_context(|| format!("writing {}", self.path.display()))?;
        info!(
            "Saved EAR threshold {:.3} to {}",
            ear_threshold,
            self.path.display()
        );
        Ok(())
    }
}
