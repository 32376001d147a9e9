use std::path::PathBuf;
use thiserror::Error;

use tally_core::RulesError;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("reading delimited data from {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("no handler recognizes {}", .0.display())]
    NoHandler(PathBuf),

    #[error("{} matches more than one handler: {}", path.display(), institutions.join(", "))]
    AmbiguousHandler {
        path: PathBuf,
        institutions: Vec<String>,
    },

    #[error("{}: row {row}: anchor column '{column}' could not be converted from {raw:?}", path.display())]
    AnchorField {
        path: PathBuf,
        row: usize,
        column: String,
        raw: String,
    },

    #[error("{}: row {row} has {found} fields, which does not fit the detected format", path.display())]
    RowWidth { path: PathBuf, row: usize, found: usize },

    #[error("{}: missing required column '{column}'", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("cannot resolve an account number for {}", .0.display())]
    Account(PathBuf),

    #[error("handler '{0}' is already registered")]
    DuplicateHandler(String),

    #[error("invalid handler '{institution}': {reason}")]
    InvalidDescriptor { institution: String, reason: String },

    #[error("parse session for {} already finished ({stage})", path.display())]
    SessionFinished { path: PathBuf, stage: String },

    #[error("worker failed: {0}")]
    Worker(String),

    #[error(transparent)]
    Rules(#[from] RulesError),
}

impl IngestError {
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            IngestError::MissingFile(path)
            | IngestError::NoHandler(path)
            | IngestError::Account(path)
            | IngestError::Io { path, .. }
            | IngestError::Csv { path, .. }
            | IngestError::AmbiguousHandler { path, .. }
            | IngestError::AnchorField { path, .. }
            | IngestError::RowWidth { path, .. }
            | IngestError::MissingColumn { path, .. }
            | IngestError::SessionFinished { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Faults that indicate a registry misconfiguration rather than bad data.
    /// A batch records them in `failed` like any other file error; callers
    /// pick them out with `BatchReport::configuration_faults`.
    pub fn is_configuration_fault(&self) -> bool {
        matches!(
            self,
            IngestError::AmbiguousHandler { .. }
                | IngestError::DuplicateHandler(_)
                | IngestError::InvalidDescriptor { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
