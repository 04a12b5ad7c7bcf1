use std::io;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

/// Every way a pipeline run can fail.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("hash mismatch for {file}. Expected: {expected}, got: {actual}")]
    Integrity {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("failed to extract {archive}: {reason}")]
    Extract { archive: String, reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed checksum manifest, line {line}: {content:?}")]
    MalformedChecksums { line: usize, content: String },

    #[error("pipeline timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl PipelineError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn io_at(action: &str, path: &Path, source: io::Error) -> Self {
        Self::io(format!("{action} {}", path.display()), source)
    }

    pub fn extract(archive: &Path, reason: impl Into<String>) -> Self {
        Self::Extract {
            archive: archive
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| archive.display().to_string()),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
