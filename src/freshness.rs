//! Whole-batch cache check run before any network traffic.
//!
//! The pipeline is skipped only when every expected canonical binary exists
//! and was modified within the freshness window. One stale or missing binary
//! sends the whole batch through the pipeline again.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::config::PipelineConfig;
use crate::env;
use crate::error::{PipelineError, Result};
use crate::triplet::Triplet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Missing(PathBuf),
    Stale(PathBuf),
}

/// Canonical binary paths for every configured platform pattern.
#[must_use]
pub fn expected_binaries(config: &PipelineConfig) -> Vec<PathBuf> {
    config
        .asset_patterns
        .iter()
        .map(|pattern| {
            env::canonical_binary_path(
                &config.output_dir,
                &config.binary_name,
                &Triplet::from_file_name(pattern),
            )
        })
        .collect()
}

/// Check `paths` against `window`, measured back from `now`.
#[must_use]
pub fn evaluate(paths: &[PathBuf], window: Duration, now: SystemTime) -> Freshness {
    let cutoff = now.checked_sub(window).unwrap_or(SystemTime::UNIX_EPOCH);
    for path in paths {
        let modified = match fs::metadata(path).and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(_) => return Freshness::Missing(path.clone()),
        };
        if modified < cutoff {
            debug!(
                "freshness: {} last modified {}",
                path.display(),
                format_timestamp(modified)
            );
            return Freshness::Stale(path.clone());
        }
    }
    Freshness::Fresh
}

/// Remove a front-end directory left behind by an earlier run.
pub fn remove_legacy_frontend(output_dir: &Path, frontend_dir: &str) -> Result<()> {
    let path = env::frontend_path(output_dir, frontend_dir);
    if path.is_dir() {
        info!("freshness: removing previous front-end at {}", path.display());
        fs::remove_dir_all(&path)
            .map_err(|e| PipelineError::io_at("failed to remove", &path, e))?;
    }
    Ok(())
}

fn format_timestamp(time: SystemTime) -> String {
    let dt: DateTime<Utc> = time.into();
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
