//! SHA-256 hashing and the published checksum manifest.

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{PipelineError, Result};

mod sums;

pub use sums::{load_checksums, parse_checksums};

/// Asset file name to lowercase hex SHA-256 digest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumManifest {
    entries: HashMap<String, String>,
}

impl ChecksumManifest {
    #[must_use]
    pub fn get(&self, file_name: &str) -> Option<&str> {
        self.entries.get(file_name).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compare a computed digest against the published one.
    ///
    /// The comparison is exact: digests are published in lowercase hex and
    /// [`sha256_file`] produces lowercase hex.
    pub fn verify(&self, file_name: &str, actual: &str) -> Result<()> {
        match self.get(file_name) {
            Some(expected) if expected == actual => Ok(()),
            expected => Err(PipelineError::Integrity {
                file: file_name.to_owned(),
                expected: expected.unwrap_or("<not listed>").to_owned(),
                actual: actual.to_owned(),
            }),
        }
    }
}

impl FromIterator<(String, String)> for ChecksumManifest {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Stream a file through SHA-256 and return the lowercase hex digest.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file =
        fs::File::open(path).map_err(|e| PipelineError::io_at("checksum open error", path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = file
            .read(&mut buf)
            .map_err(|e| PipelineError::io_at("checksum read error", path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
