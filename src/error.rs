//! Error taxonomy shared by the fetcher, the storage layer and the
//! preprocessor.
//!
//! Errors that only affect a single record are recovered locally (see the
//! fetcher's flattening and the preprocessor's [`RowErrorPolicy`]); the
//! variants here are what actually reaches a caller.
//!
//! [`RowErrorPolicy`]: crate::preprocess::RowErrorPolicy

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Transport, authentication or quota failure talking to the remote API.
    #[error("remote access failed: {message}")]
    RemoteAccess { message: String },

    /// A remote payload did not have the shape we expect.
    #[error("unexpected data shape: {message}")]
    DataShape { message: String },

    /// A single row could not be parsed.
    #[error("row {row}: could not parse {column}: {message}")]
    Parse {
        row: usize,
        column: &'static str,
        message: String,
    },

    #[error("file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("malformed file {}: {message}", path.display())]
    MalformedFile { path: PathBuf, message: String },

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn remote_access(message: impl Into<String>) -> Self {
        Self::RemoteAccess {
            message: message.into(),
        }
    }

    pub fn data_shape(message: impl Into<String>) -> Self {
        Self::DataShape {
            message: message.into(),
        }
    }

    pub fn parse(row: usize, column: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            row,
            column,
            message: message.into(),
        }
    }

    pub fn malformed_file(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::MalformedFile {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
