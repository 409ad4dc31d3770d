use std::path::PathBuf;

use thiserror::Error;

use crate::spacetime::constraint::RotationAxis;

/// Error for chain setup and settings loading.
///
/// Solving itself never fails: unreachable targets, degenerate bones and
/// ground misses all have a defined fallback behaviour.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("[IK] Chain length {requested} greater than actual chain length ({available} ancestors available)")]
    ChainTooLong { requested: usize, available: usize },
    #[error("[IK] Chain length must be at least 1")]
    EmptyChain,
    #[error("[IK] Joint {joint}: {axis:?} axis min angle {min} is greater than max angle {max}")]
    InvalidConstraint {
        joint: usize,
        axis: RotationAxis,
        min: f64,
        max: f64,
    },
    #[error("[Config] {0}")]
    InvalidConfig(String),
    #[error("[Config] Cannot read settings file {path:?}: {source}")]
    SettingsFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("[Config] Settings parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
