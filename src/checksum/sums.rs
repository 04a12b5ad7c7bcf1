use std::path::Path;

use log::debug;

use super::ChecksumManifest;
use crate::error::{PipelineError, Result};
use crate::networking::NetworkClient;

const SEPARATOR: &str = "  ";

/// Load a `SHA256SUMS`-style manifest from a local file or a URL.
pub async fn load_checksums(client: &NetworkClient, source: &str) -> Result<ChecksumManifest> {
    let text = if !source.starts_with("http") && Path::new(source).is_file() {
        debug!("verify: reading checksums from {source}");
        tokio::fs::read_to_string(source)
            .await
            .map_err(|e| PipelineError::io(format!("failed to read {source}"), e))?
    } else {
        debug!("verify: fetching checksums from {source}");
        client.fetch_text(source).await?
    };
    parse_checksums(&text)
}

/// Parse `<hex digest><two spaces><file name>` lines.
pub fn parse_checksums(text: &str) -> Result<ChecksumManifest> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            let (hash, file_name) = line.split_once(SEPARATOR).ok_or_else(|| {
                PipelineError::MalformedChecksums {
                    line: idx + 1,
                    content: line.to_owned(),
                }
            })?;
            Ok((file_name.trim().to_owned(), hash.trim().to_owned()))
        })
        .collect()
}
