use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SeqvaultError {
    #[error("missing config file seqvault.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("conflicting selection modes: {0}")]
    ConflictingSelection(String),

    #[error("incomplete date range: {0}")]
    IncompleteDateRange(String),

    #[error("no services selected")]
    EmptySelection,

    #[error("none of the requested services were found in the LIMS: {0}")]
    NothingFound(String),

    #[error("run ended by the operator")]
    Aborted,

    #[error("LIMS request failed: {0}")]
    LimsHttp(String),

    #[error("LIMS returned status {status}: {message}")]
    LimsStatus { status: u16, message: String },

    #[error("user of service {0} has no profile classification area assigned in the LIMS")]
    MissingProfile(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("prompt failed: {0}")]
    Prompt(String),
}
