use std::path::PathBuf;

use thiserror::Error;

use crate::remote::RemoteError;

/// Which half of the two-step run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Coarse,
    Refine,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Coarse => write!(f, "Step 1 (coarse try-on)"),
            Stage::Refine => write!(f, "Step 2 (refinement)"),
        }
    }
}

#[derive(Debug, Error)]
pub enum VtonError {
    #[error("{key} is not set")]
    MissingCredential { key: &'static str },

    #[error("{role} image not found: {}", .path.display())]
    MissingAsset { role: &'static str, path: PathBuf },

    #[error("No garment selected")]
    NoGarment,

    /// A remote stage failed. `step1` is the stage-1 artifact when it was
    /// already written before the failure.
    #[error("Pipeline failed at {stage}: {source}")]
    Stage {
        stage: Stage,
        step1: Option<PathBuf>,
        #[source]
        source: RemoteError,
    },

    #[error("Invalid settings file {}: {source}", .path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl VtonError {
    pub fn is_malformed_response(&self) -> bool {
        matches!(
            self,
            VtonError::Stage {
                source: RemoteError::Malformed(_),
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, VtonError>;
