use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use log::{debug, warn};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::error::{PipelineError, Result};
use crate::util::{format_speed, progress_percent};

const STAGING_SUFFIX: &str = ".part";

#[derive(Clone)]
pub struct NetworkClient {
    client: Client,
}

impl NetworkClient {
    pub fn new(user_agent: &str, request_timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(request_timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!("network client: falling back to default HTTP client configuration ({err})");
                Client::new()
            });
        Self { client }
    }

    /// GET `url` and decode the JSON body.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.get_ok(url).await?;
        response.json().await.map_err(|e| PipelineError::Fetch {
            url: url.to_owned(),
            reason: format!("invalid response body: {e}"),
        })
    }

    /// GET `url` and return the body as text.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.get_ok(url).await?;
        response.text().await.map_err(|e| PipelineError::Fetch {
            url: url.to_owned(),
            reason: format!("failed to read response body: {e}"),
        })
    }

    async fn get_ok(&self, url: &str) -> Result<Response> {
        let fetch_error = |reason: String| PipelineError::Fetch {
            url: url.to_owned(),
            reason,
        };
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(format!("request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("server returned status {status}")));
        }
        Ok(response)
    }

    /// Download `url` to `dest`, retrying up to `retries` extra times.
    ///
    /// Returns the number of bytes written.
    pub async fn download_with_retries(&self, url: &str, dest: &Path, retries: u32) -> Result<u64> {
        let mut attempt = 0;
        loop {
            match self.download_to_path(url, dest).await {
                Err(PipelineError::Download { reason, .. }) if attempt < retries => {
                    attempt += 1;
                    warn!("download: {url} failed ({reason}); retry {attempt} of {retries}");
                }
                other => return other,
            }
        }
    }

    /// Stream `url` into `dest`.
    ///
    /// The body goes to `<dest>.part` first and is renamed over `dest` only
    /// once every chunk has been written and flushed.
    pub async fn download_to_path(&self, url: &str, dest: &Path) -> Result<u64> {
        let staging = staging_path(dest);
        let result = match self.stream_to_file(url, &staging).await {
            Ok(downloaded) => fs::rename(&staging, dest)
                .await
                .map(|()| downloaded)
                .map_err(|e| PipelineError::io_at("failed to move download into", dest, e)),
            Err(err) => Err(err),
        };
        if result.is_err() {
            let _ = fs::remove_file(&staging).await;
        }
        result
    }

    async fn stream_to_file(&self, url: &str, staging: &Path) -> Result<u64> {
        let download_error = |reason: String| PipelineError::Download {
            url: url.to_owned(),
            reason,
        };
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| download_error(format!("request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(download_error(format!("server returned status {status}")));
        }

        if let Some(parent) = staging.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::io_at("failed to create download dir", parent, e))?;
        }
        let mut file = File::create(staging)
            .await
            .map_err(|e| PipelineError::io_at("failed to create", staging, e))?;

        let total = response.content_length();
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let mut last_tick = Instant::now();
        let mut last_bytes = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| download_error(format!("stream error: {e}")))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| PipelineError::io_at("failed to write", staging, e))?;
            downloaded += chunk.len() as u64;

            let since = last_tick.elapsed().as_secs_f32();
            if since > 1.0 {
                let speed = (downloaded - last_bytes) as f32 / since;
                debug!(
                    "download: {} {:.1}% at {}",
                    url,
                    progress_percent(downloaded, total),
                    format_speed(speed)
                );
                last_tick = Instant::now();
                last_bytes = downloaded;
            }
        }

        file.flush()
            .await
            .map_err(|e| PipelineError::io_at("failed to flush", staging, e))?;
        file.sync_all()
            .await
            .map_err(|e| PipelineError::io_at("failed to sync", staging, e))?;

        if let Some(total) = total
            && downloaded < total
        {
            return Err(download_error(format!(
                "download incomplete: received {downloaded} of {total} bytes"
            )));
        }

        Ok(downloaded)
    }
}

fn staging_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(STAGING_SUFFIX);
    PathBuf::from(name)
}
