//! Error types for the touchzone engine.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for session-level operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that end a session before or outside the phase loop.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no camera responded on device indices {first}..{end}")]
    NoCameraFound { first: i32, end: i32 },

    #[error("camera {index} produced no frame within {timeout_secs} seconds")]
    DeviceUnavailable { index: i32, timeout_secs: u64 },

    #[error("camera selection input closed before a valid index was entered")]
    SelectionAborted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while building zone geometry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ZoneError {
    #[error("zone '{name}' must have a positive size, got {width}x{height}")]
    EmptyGeometry { name: String, width: i32, height: i32 },

    #[error("zone index {index} is out of range for {len} zones")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Errors raised while writing a captured photo.
#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("could not prepare output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write photo {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}
