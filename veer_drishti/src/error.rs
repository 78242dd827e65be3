// THEORY:
// Errors in this crate are never fatal to the hosting process. Each type below maps to
// one class of degradation: a frame that cannot be read, a detector that cannot run,
// or a classifier backend that cannot be brought up. Callers decide how to degrade;
// the producers log and carry on.

use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while opening or reading a frame source.
#[derive(Debug, Error)]
pub enum FrameSourceError {
    #[error("frame source I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not decode frame {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("frame source {0} contains no frames")]
    Empty(String),

    #[error("frame source is not open")]
    NotOpen,
}

/// Failures raised by a detector strategy on a single frame.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("classifier backend failed: {0}")]
    Backend(String),

    #[error("invalid frame: {0}")]
    Frame(String),
}

/// Returned by a classifier loader when no learned backend can be acquired.
#[derive(Debug, Error)]
#[error("classifier backend unavailable: {reason}")]
pub struct BackendUnavailable {
    pub reason: String,
}

impl BackendUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
