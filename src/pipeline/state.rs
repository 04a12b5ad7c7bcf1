use std::fmt;
use std::path::PathBuf;

// Where a pipeline run currently is. Stages run strictly in this order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Fetching,
    Matching,
    Downloading { assets: usize },
    Verifying { assets: usize },
    Extracting { assets: usize },
    Done,
    Failed(String),
}

impl PipelineState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed(_))
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => f.write_str("idle"),
            PipelineState::Fetching => f.write_str("fetching release"),
            PipelineState::Matching => f.write_str("matching assets"),
            PipelineState::Downloading { assets } => write!(f, "downloading {assets} assets"),
            PipelineState::Verifying { assets } => write!(f, "verifying {assets} assets"),
            PipelineState::Extracting { assets } => write!(f, "extracting {assets} assets"),
            PipelineState::Done => f.write_str("done"),
            PipelineState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Result of a successful invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Every expected binary was already fresh; nothing was fetched.
    Skipped,
    Installed { tag: String, binaries: Vec<PathBuf> },
}
