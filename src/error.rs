//! Errors from the crate's outer surfaces: config files and output.
//!
//! Compilation problems are never Rust errors; they travel as
//! [`Diagnostic`](crate::dsl::Diagnostic)s inside a
//! [`CompileResult`](crate::dsl::CompileResult).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AkkadoError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}
