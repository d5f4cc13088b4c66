// One error type for the whole app. Every variant states *where* things went wrong.
use crate::types::Resolution;
use std::collections::TryReserveError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Buffers handed to one stage disagree on size. Always a caller bug.
    #[error("{stage}: resolution mismatch (expected {expected}, found {found})")]
    ResolutionMismatch {
        stage: &'static str,
        expected: Resolution,
        found: Resolution,
    },
    #[error("invalid frame resolution {0}")]
    InvalidResolution(Resolution),
    #[error("failed to allocate a {resolution} frame buffer: {source}")]
    Allocation {
        resolution: Resolution,
        #[source]
        source: TryReserveError,
    },
    #[error("window init error: {0}")]
    WindowInit(String),
    #[error("window update error: {0}")]
    WindowUpdate(String),
    #[error("camera init error: {0}")]
    CameraInit(String),
    #[error("camera frame error: {0}")]
    CameraFrame(String),
    #[error("failed to write snapshot {}: {source}", path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
