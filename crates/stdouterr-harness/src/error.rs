//! Harness error type.

use std::path::PathBuf;

use stdouterr_core::RedirectError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("redirection: {0}")]
    Redirect(#[from] RedirectError),
    #[error("demo binary not found at {}", .0.display())]
    MissingBinary(PathBuf),
    #[error("no demo binary configured (pass --binary or set STDOUTERR_BIN)")]
    BinaryNotConfigured,
    #[error("scenario name `{0}` must be a single plain path component")]
    InvalidScenarioName(String),
}
