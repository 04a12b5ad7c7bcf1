use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::error::{PipelineError, Result};

const RELEASE_URL: &str = "https://api.github.com/repos/memospot/memos-builds/releases/latest";
const DAY_SECS: u64 = 24 * 60 * 60;

/// Tunables for one pipeline run.
///
/// Every field has a default, so a config file only needs the keys it
/// changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Release listing endpoint returning `{tag_name, assets}` JSON.
    pub release_url: String,
    /// Name suffix identifying the checksum manifest among release assets.
    pub checksum_suffix: String,
    /// Use this URL or local file instead of the release's checksum asset.
    pub checksum_source: Option<String>,
    /// One glob per supported platform archive.
    pub asset_patterns: Vec<String>,
    pub output_dir: PathBuf,
    pub binary_name: String,
    /// Legacy bundled front-end directory shipped by some releases.
    pub frontend_dir: String,
    pub download_concurrency: usize,
    pub verify_concurrency: usize,
    pub extract_concurrency: usize,
    pub freshness_window_secs: u64,
    pub timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub download_retries: u32,
    pub user_agent: String,
    /// Run even when every binary is fresh.
    pub force: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            release_url: RELEASE_URL.into(),
            checksum_suffix: "SHA256SUMS.txt".into(),
            checksum_source: None,
            asset_patterns: vec![
                "memos-*-darwin-arm64.tar.gz".into(),
                "memos-*-darwin-x86_64.tar.gz".into(),
                "memos-*-linux-x86_64.tar.gz".into(),
                "memos-*-windows-x86_64.zip".into(),
            ],
            output_dir: PathBuf::from("server-dist"),
            binary_name: "memos".into(),
            frontend_dir: "dist".into(),
            download_concurrency: 5,
            verify_concurrency: 2,
            extract_concurrency: 2,
            freshness_window_secs: 7 * DAY_SECS,
            timeout_secs: 10 * 60,
            request_timeout_secs: 5 * 60,
            download_retries: 0,
            user_agent: concat!("memos-fetch/", env!("CARGO_PKG_VERSION")).into(),
            force: false,
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("config: loading {}", path.display());
        let contents = fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            PipelineError::Configuration(format!("failed to parse {}: {e}", path.display()))
        })
    }

    pub fn validate(&self) -> Result<()> {
        let limits = [
            ("download_concurrency", self.download_concurrency),
            ("verify_concurrency", self.verify_concurrency),
            ("extract_concurrency", self.extract_concurrency),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, limit)| *limit == 0) {
            return Err(PipelineError::Configuration(format!(
                "{name} must be at least 1"
            )));
        }
        if self.asset_patterns.is_empty() {
            return Err(PipelineError::Configuration(
                "no asset patterns configured".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_secs)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_limits() {
        let config = PipelineConfig::default();
        assert_eq!(config.download_concurrency, 5);
        assert_eq!(config.verify_concurrency, 2);
        assert_eq!(config.extract_concurrency, 2);
        assert_eq!(config.freshness_window(), Duration::from_secs(604_800));
        assert_eq!(config.timeout(), Duration::from_secs(600));
        assert_eq!(config.asset_patterns.len(), 4);
        config.validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memos-fetch.json");
        fs::write(
            &path,
            r#"{"output_dir": "dist-bin", "download_concurrency": 3, "force": true}"#,
        )
        .unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("dist-bin"));
        assert_eq!(config.download_concurrency, 3);
        assert!(config.force);
        assert_eq!(config.verify_concurrency, 2);
        assert_eq!(config.binary_name, "memos");
    }

    #[test]
    fn unreadable_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PipelineConfig::from_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn rejects_zero_concurrency() {
        let config = PipelineConfig {
            verify_concurrency: 0,
            ..PipelineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("verify_concurrency"));
    }
}
