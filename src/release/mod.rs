use glob::{MatchOptions, Pattern};
use log::warn;
use serde::Deserialize;

use crate::error::{PipelineError, Result};

// `*` must not cross a path separator.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseManifest {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Asset {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

impl ReleaseManifest {
    /// The checksum manifest attached to the release, found by name suffix.
    #[must_use]
    pub fn checksum_asset(&self, suffix: &str) -> Option<&Asset> {
        self.assets.iter().find(|asset| asset.name.ends_with(suffix))
    }
}

/// Compiled set of platform asset patterns such as `memos-*-linux-x86_64.tar.gz`.
#[derive(Debug, Clone)]
pub struct AssetMatcher {
    patterns: Vec<Pattern>,
}

impl AssetMatcher {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|raw| {
                Pattern::new(raw.as_ref()).map_err(|e| {
                    PipelineError::Configuration(format!(
                        "invalid asset pattern {:?}: {e}",
                        raw.as_ref()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern.matches_with(name, MATCH_OPTIONS))
    }

    /// Assets matching at least one pattern, in release order. Names that
    /// could escape the output directory are dropped.
    #[must_use]
    pub fn select(&self, assets: &[Asset]) -> Vec<Asset> {
        assets
            .iter()
            .filter(|asset| self.matches(&asset.name))
            .filter(|asset| {
                let plain = is_plain_file_name(&asset.name);
                if !plain {
                    warn!("release: ignoring asset with unsafe name {:?}", asset.name);
                }
                plain
            })
            .cloned()
            .collect()
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    const RELEASE: &str = r#"{
        "tag_name": "v0.22.0",
        "html_url": "https://github.com/memospot/memos-builds/releases/tag/v0.22.0",
        "assets": [
            {"name": "memos-v0.22.0-darwin-arm64.tar.gz", "browser_download_url": "https://dl/1", "size": 1},
            {"name": "memos-v0.22.0-darwin-x86_64.tar.gz", "browser_download_url": "https://dl/2"},
            {"name": "memos-v0.22.0-linux-x86_64.tar.gz", "browser_download_url": "https://dl/3"},
            {"name": "memos-v0.22.0-linux-arm64.tar.gz", "browser_download_url": "https://dl/4"},
            {"name": "memos-v0.22.0-windows-x86_64.zip", "browser_download_url": "https://dl/5"},
            {"name": "memos-v0.22.0-windows-x86_64.tar.gz", "browser_download_url": "https://dl/6"},
            {"name": "memos_SHA256SUMS.txt", "browser_download_url": "https://dl/sums"}
        ]
    }"#;

    fn release() -> ReleaseManifest {
        serde_json::from_str(RELEASE).unwrap()
    }

    #[test]
    fn parses_github_release_payload() {
        let release = release();
        assert_eq!(release.tag_name, "v0.22.0");
        assert_eq!(release.assets.len(), 7);
        assert_eq!(release.assets[0].download_url, "https://dl/1");
    }

    #[test]
    fn locates_checksum_asset_by_suffix() {
        let release = release();
        let sums = release.checksum_asset("SHA256SUMS.txt").unwrap();
        assert_eq!(sums.download_url, "https://dl/sums");
        assert!(release.checksum_asset("SHA512SUMS.txt").is_none());
    }

    #[test]
    fn default_patterns_select_supported_platforms() {
        let matcher = AssetMatcher::new(&PipelineConfig::default().asset_patterns).unwrap();
        let names: Vec<String> = matcher
            .select(&release().assets)
            .into_iter()
            .map(|asset| asset.name)
            .collect();

        assert_eq!(
            names,
            vec![
                "memos-v0.22.0-darwin-arm64.tar.gz",
                "memos-v0.22.0-darwin-x86_64.tar.gz",
                "memos-v0.22.0-linux-x86_64.tar.gz",
                "memos-v0.22.0-windows-x86_64.zip",
            ]
        );
    }

    #[test]
    fn names_with_path_components_are_never_selected() {
        let matcher = AssetMatcher::new(&PipelineConfig::default().asset_patterns).unwrap();
        let assets: Vec<Asset> = [
            "memos-/../../x-linux-x86_64.tar.gz",
            "memos-a\\..\\x-linux-x86_64.tar.gz",
            "memos-v0.22.0-linux-x86_64.tar.gz",
        ]
        .into_iter()
        .map(|name| Asset {
            name: name.into(),
            download_url: "https://dl/x".into(),
        })
        .collect();

        assert!(!matcher.matches("memos-/../../x-linux-x86_64.tar.gz"));
        let selected = matcher.select(&assets);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "memos-v0.22.0-linux-x86_64.tar.gz");
    }

    #[test]
    fn rejects_invalid_patterns() {
        assert!(matches!(
            AssetMatcher::new(&["memos-[.zip"]),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn missing_assets_field_is_empty() {
        let release: ReleaseManifest = serde_json::from_str(r#"{"tag_name": "v1"}"#).unwrap();
        assert!(release.assets.is_empty());
    }
}
