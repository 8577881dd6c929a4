use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CyHairError {
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed CyHair data: {0}")]
    Format(String),

    #[error("Truncated CyHair file: {section} section needs {needed} bytes, have {available}")]
    TruncatedFile {
        section: &'static str,
        needed: usize,
        available: usize,
    },

    #[error(
        "Inconsistent {attribute} stream in input {input}: expected {expected} values, found {actual}"
    )]
    InconsistentAttribute {
        input: String,
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Cannot encode CyHair data: {0}")]
    Invariant(String),

    #[error("Invalid combiner config '{}': {reason}", .path.display())]
    Config { path: PathBuf, reason: String },

    #[error("'{}': {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: Box<CyHairError>,
    },
}

impl CyHairError {
    /// The underlying error, without any file context.
    pub fn root(&self) -> &CyHairError {
        match self {
            CyHairError::File { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn in_file(self, path: impl Into<PathBuf>) -> Self {
        match self {
            e @ (CyHairError::Io { .. } | CyHairError::File { .. }) => e,
            e => CyHairError::File {
                path: path.into(),
                source: Box::new(e),
            },
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CyHairError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CyHairError>;
