use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use log::{error, info};

mod archive;
mod checksum;
mod config;
mod env;
mod error;
mod freshness;
mod networking;
mod pipeline;
mod release;
mod triplet;
mod util;

use config::PipelineConfig;
use error::Result;
use pipeline::{Outcome, ReleasePipeline};

#[derive(Parser, Debug)]
#[command(
    name = "memos-fetch",
    author,
    version,
    about = "Download, verify and unpack prebuilt memos server binaries"
)]
struct Cli {
    /// JSON config file; keys it omits keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory that receives the canonical binaries.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Release listing endpoint.
    #[arg(long)]
    release_url: Option<String>,

    /// Checksum manifest URL or local file, instead of the release asset.
    #[arg(long)]
    checksums: Option<String>,

    /// Overall deadline for the run, in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Run even when every binary is fresh.
    #[arg(long)]
    force: bool,
}

impl Cli {
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(url) = self.release_url {
            config.release_url = url;
        }
        if self.checksums.is_some() {
            config.checksum_source = self.checksums;
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout_secs = secs;
        }
        config.force |= self.force;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match run(Cli::parse()).await {
        Ok(Outcome::Skipped) => {
            info!("all binaries are up to date");
            ExitCode::SUCCESS
        }
        Ok(Outcome::Installed { tag, binaries }) => {
            info!("installed {} binaries from {tag}", binaries.len());
            for path in binaries {
                info!("  {}", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<Outcome> {
    let config = cli.into_config()?;
    let mut pipeline = ReleasePipeline::new(config)?;
    pipeline.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "memos-fetch",
            "--output-dir",
            "bin",
            "--checksums",
            "sums.txt",
            "--timeout-secs",
            "30",
            "--force",
        ]);
        let config = cli.into_config().unwrap();

        assert_eq!(config.output_dir, PathBuf::from("bin"));
        assert_eq!(config.checksum_source.as_deref(), Some("sums.txt"));
        assert_eq!(config.timeout_secs, 30);
        assert!(config.force);
        assert_eq!(config.binary_name, "memos");
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fetch.json");
        std::fs::write(&path, r#"{"output_dir": "from-file", "download_concurrency": 3}"#)
            .unwrap();

        let cli = Cli::parse_from([
            "memos-fetch",
            "--config",
            path.to_str().unwrap(),
            "--release-url",
            "http://localhost/latest",
        ]);
        let config = cli.into_config().unwrap();

        assert_eq!(config.output_dir, PathBuf::from("from-file"));
        assert_eq!(config.download_concurrency, 3);
        assert_eq!(config.release_url, "http://localhost/latest");
    }

    #[test]
    fn missing_config_file_is_rejected() {
        let cli = Cli::parse_from(["memos-fetch", "--config", "/nonexistent/fetch.json"]);
        assert!(cli.into_config().is_err());
    }
}
