use thiserror::Error;

use super::config::ConfigError;
use super::fep::collector::FepRestoreError;
use super::sink::SinkError;
use crate::core::stats::bin::SnapshotError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid run configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error(
        "Mismatch between the {expected} accumulator slots configured at setup and the {found} slots in the restored snapshot"
    )]
    SlotShapeMismatch { expected: usize, found: usize },

    #[error("Free-energy layout mismatch on restore: {source}")]
    FreeEnergy {
        #[from]
        source: FepRestoreError,
    },

    #[error("Unsupported energy-history version {found} (this build writes version {expected})")]
    HistoryVersion { found: u32, expected: u32 },

    #[error("Output sink failed: {source}")]
    Sink {
        #[from]
        source: SinkError,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl From<SnapshotError> for EngineError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::SlotCountMismatch { expected, found } => {
                EngineError::SlotShapeMismatch { expected, found }
            }
        }
    }
}
