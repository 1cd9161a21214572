//! Errors raised while parsing or applying shell redirections.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedirectError {
    #[error("redirection `{word}` has no target")]
    EmptyTarget { word: String },
    #[error("bad file descriptor {fd} in `{word}`")]
    BadDescriptor { fd: u32, word: String },
    #[error("unsupported redirection `{0}`")]
    Unsupported(String),
    #[error("file `{word}` is outside the working directory")]
    EscapesWorkdir { word: String },
}
