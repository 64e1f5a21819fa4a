//! Error types at the crate's seams. None of these ever escape a round: reports are
//! swallowed by the reporter and the controller always returns to idle.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid endpoint {url:?}: {reason}")]
    Endpoint { url: String, reason: String },
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("{0}")]
    Usage(String),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("collector replied {0}")]
    Status(u16),
}

#[derive(Debug, Error)]
pub enum RoundError {
    #[error("round task aborted: {0}")]
    Aborted(String),
}
