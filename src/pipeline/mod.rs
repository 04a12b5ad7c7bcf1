use std::io;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use log::{error, info, warn};
use tokio::fs;
use tokio::task;

use crate::checksum::{self, ChecksumManifest};
use crate::config::PipelineConfig;
use crate::env;
use crate::error::{PipelineError, Result};
use crate::freshness::{self, Freshness};
use crate::networking::NetworkClient;
use crate::release::{Asset, AssetMatcher, ReleaseManifest};
use crate::util::run_bounded;

pub mod install;
pub mod state;


use install::InstallJob;
pub use state::{Outcome, PipelineState};

/// An asset whose archive is on disk at `path`.
#[derive(Debug, Clone)]
struct Downloaded {
    asset: Asset,
    path: PathBuf,
}

/// Fetches, verifies and installs the release binaries described by a
/// [`PipelineConfig`].
pub struct ReleasePipeline {
    config: PipelineConfig,
    client: NetworkClient,
    matcher: AssetMatcher,
    state: PipelineState,
}

impl ReleasePipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let matcher = AssetMatcher::new(&config.asset_patterns)?;
        let client = NetworkClient::new(&config.user_agent, config.request_timeout());
        Ok(Self {
            config,
            client,
            matcher,
            state: PipelineState::Idle,
        })
    }

    #[must_use]
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Run the whole pipeline under the configured overall deadline.
    pub async fn run(&mut self) -> Result<Outcome> {
        let started = Instant::now();
        let deadline = self.config.timeout();
        let result = match tokio::time::timeout(deadline, self.run_stages()).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout(deadline)),
        };

        match &result {
            Ok(_) => info!("pipeline: finished in {:.1?}", started.elapsed()),
            Err(err) => {
                error!("pipeline: {err}");
                self.transition(PipelineState::Failed(err.to_string()));
            }
        }
        debug_assert!(self.state.is_terminal());
        result
    }

    async fn run_stages(&mut self) -> Result<Outcome> {
        let output_dir = self.config.output_dir.clone();
        env::ensure_output_dir(&output_dir)
            .map_err(|e| PipelineError::io_at("failed to create", &output_dir, e))?;

        if self.config.force {
            info!("freshness: check bypassed");
        } else {
            let expected = freshness::expected_binaries(&self.config);
            match freshness::evaluate(&expected, self.config.freshness_window(), SystemTime::now())
            {
                Freshness::Fresh => {
                    info!(
                        "freshness: found all {} required binaries; skipping download",
                        expected.len()
                    );
                    self.transition(PipelineState::Done);
                    return Ok(Outcome::Skipped);
                }
                Freshness::Missing(path) => info!("freshness: {} is missing", path.display()),
                Freshness::Stale(path) => info!("freshness: {} is out of date", path.display()),
            }
        }
        freshness::remove_legacy_frontend(&output_dir, &self.config.frontend_dir)?;

        self.transition(PipelineState::Fetching);
        let release = self.fetch_release().await?;

        self.transition(PipelineState::Matching);
        let (selected, checksum_source) = self.match_assets(&release)?;

        self.transition(PipelineState::Downloading {
            assets: selected.len(),
        });
        let downloaded = self.download_all(selected).await?;

        self.transition(PipelineState::Verifying {
            assets: downloaded.len(),
        });
        let sums = checksum::load_checksums(&self.client, &checksum_source).await?;
        self.verify_all(&downloaded, &sums).await?;

        self.transition(PipelineState::Extracting {
            assets: downloaded.len(),
        });
        let mut binaries = self.extract_all(downloaded).await?;
        binaries.sort();

        self.transition(PipelineState::Done);
        Ok(Outcome::Installed {
            tag: release.tag_name,
            binaries,
        })
    }

    fn transition(&mut self, next: PipelineState) {
        info!("pipeline: {} -> {}", self.state, next);
        self.state = next;
    }

    async fn fetch_release(&self) -> Result<ReleaseManifest> {
        let url = &self.config.release_url;
        let release: ReleaseManifest = self.client.fetch_json(url).await?;
        if release.assets.is_empty() {
            return Err(PipelineError::Fetch {
                url: url.clone(),
                reason: format!("release {} has no assets", release.tag_name),
            });
        }
        info!(
            "release: matching assets from {} ({} assets)",
            release.tag_name,
            release.assets.len()
        );
        Ok(release)
    }

    fn match_assets(&self, release: &ReleaseManifest) -> Result<(Vec<Asset>, String)> {
        let checksum_source = match &self.config.checksum_source {
            Some(source) => source.clone(),
            None => release
                .checksum_asset(&self.config.checksum_suffix)
                .map(|asset| asset.download_url.clone())
                .ok_or_else(|| {
                    PipelineError::Configuration(format!(
                        "release {} has no asset ending in {}",
                        release.tag_name, self.config.checksum_suffix
                    ))
                })?,
        };

        let selected = self.matcher.select(&release.assets);
        if selected.is_empty() {
            return Err(PipelineError::Configuration(format!(
                "no assets of release {} match the configured platforms",
                release.tag_name
            )));
        }
        info!("release: matched {} files", selected.len());
        Ok((selected, checksum_source))
    }

    async fn download_all(&self, assets: Vec<Asset>) -> Result<Vec<Downloaded>> {
        info!("download: fetching {} assets", assets.len());
        run_bounded(assets, self.config.download_concurrency, |asset| {
            self.download_one(asset)
        })
        .await
    }

    async fn download_one(&self, asset: Asset) -> Result<Downloaded> {
        let path = self.config.output_dir.join(&asset.name);
        remove_existing(&path).await?;

        match self
            .client
            .download_with_retries(&asset.download_url, &path, self.config.download_retries)
            .await
        {
            Ok(bytes) => {
                info!("download: [OK] {} ({bytes} bytes)", asset.name);
                Ok(Downloaded { asset, path })
            }
            Err(err) => {
                error!("download: [ERROR] {}: {err}", asset.name);
                Err(err)
            }
        }
    }

    async fn verify_all(&self, downloaded: &[Downloaded], sums: &ChecksumManifest) -> Result<()> {
        if sums.is_empty() {
            warn!("verify: checksum manifest lists no files");
        }
        info!("verify: checking {} files against {} sums", downloaded.len(), sums.len());
        run_bounded(downloaded, self.config.verify_concurrency, |item| {
            verify_one(item, sums)
        })
        .await?;
        Ok(())
    }

    async fn extract_all(&self, downloaded: Vec<Downloaded>) -> Result<Vec<PathBuf>> {
        info!("extract: unpacking {} archives", downloaded.len());
        let jobs = downloaded.into_iter().map(|item| InstallJob {
            asset_name: item.asset.name,
            archive: item.path,
            output_dir: self.config.output_dir.clone(),
            binary_name: self.config.binary_name.clone(),
            frontend_dir: self.config.frontend_dir.clone(),
        });
        run_bounded(jobs, self.config.extract_concurrency, |job| async move {
            let name = job.asset_name.clone();
            let result = task::spawn_blocking(move || install::install(&job))
                .await
                .map_err(|e| PipelineError::Extract {
                    archive: name.clone(),
                    reason: format!("extraction task failed: {e}"),
                })?;
            if let Err(err) = &result {
                error!("extract: [ERROR] {name}: {err}");
            }
            result
        })
        .await
    }
}

async fn verify_one(item: &Downloaded, sums: &ChecksumManifest) -> Result<()> {
    let path = item.path.clone();
    let actual = task::spawn_blocking(move || checksum::sha256_file(&path))
        .await
        .map_err(|e| {
            PipelineError::io(
                format!("hash task for {} failed", item.asset.name),
                io::Error::other(e),
            )
        })??;

    match sums.verify(&item.asset.name, &actual) {
        Ok(()) => {
            info!("verify: [OK] {} {actual}", item.asset.name);
            Ok(())
        }
        Err(err) => {
            error!("verify: [ERROR] {} {actual}", item.asset.name);
            Err(err)
        }
    }
}

async fn remove_existing(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path).await {
        Ok(meta) => meta,
        Err(_) => return Ok(()),
    };
    warn!("download: replacing existing {}", path.display());
    let removed = if meta.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };
    removed.map_err(|e| PipelineError::io_at("failed to remove", path, e))
}
