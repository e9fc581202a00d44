//! Error types for the caption pipeline
//!
//! Every failure carries the path it relates to, so a batch run that aborts
//! can point at the offending file.
//!
//! # Examples
//!
//! ```rust
//! use layercaption::errors::CaptionError;
//! use std::path::PathBuf;
//!
//! let err = CaptionError::Read {
//!     path: PathBuf::from("map.json"),
//!     source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
//! };
//! assert!(err.is_input_error());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Pipeline errors
#[derive(Error, Debug)]
pub enum CaptionError {
    /// An input file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An input file is not valid JSON
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The annotated document could not be written
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The annotated document could not be serialized
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A YAML run plan could not be loaded
    #[error("Invalid plan file {path}: {reason}")]
    PlanFile { path: PathBuf, reason: String },

    /// File watching could not be set up
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl CaptionError {
    /// Check if the error comes from reading or parsing one of the inputs
    pub fn is_input_error(&self) -> bool {
        matches!(self, CaptionError::Read { .. } | CaptionError::Parse { .. })
    }

    /// The file the error relates to, when there is one
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            CaptionError::Read { path, .. }
            | CaptionError::Parse { path, .. }
            | CaptionError::Write { path, .. }
            | CaptionError::PlanFile { path, .. } => Some(path),
            CaptionError::Serialize(_) | CaptionError::Watch(_) => None,
        }
    }
}

/// Result type alias for pipeline operations
pub type CaptionResult<T> = Result<T, CaptionError>;
