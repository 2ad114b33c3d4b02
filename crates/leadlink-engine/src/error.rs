use std::path::PathBuf;

use thiserror::Error;

/// Raised only when a caller breaks the merger's non-empty precondition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("cannot merge an empty cluster of listings")]
    EmptyCluster,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("reading platform registry {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing platform registry")]
    Parse(#[from] serde_yaml::Error),
    #[error("platform {platform_id} has reliability {reliability}, expected a value in [0, 1]")]
    InvalidReliability { platform_id: String, reliability: f64 },
    #[error("platform {0} is declared more than once")]
    DuplicatePlatform(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("match weights can award {0} points, more than the 100-point scale")]
    ScoreOverflow(u64),
    #[error("review threshold {review} is above match threshold {matched}")]
    ThresholdOrder { review: u32, matched: u32 },
    #[error("name factor {0} must be a finite value in [0, 1]")]
    InvalidNameFactor(f64),
    #[error("unknown cluster strategy {0:?}, expected \"seed\" or \"transitive\"")]
    UnknownStrategy(String),
}
