use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::error::OcrError;

/// Category of a failed recognition request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Empty or zero-dimension image
    InvalidInput,
    /// Engine failed to initialize; permanent for the worker
    EngineUnavailable,
    /// Engine error while processing this request
    RecognitionFailed,
    /// Request rejected because the worker queue was full
    QueueFull,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::EngineUnavailable => "engine unavailable",
            ErrorKind::RecognitionFailed => "recognition failed",
            ErrorKind::QueueFull => "queue full",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{kind}: {message}")]
pub struct RecognitionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RecognitionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<OcrError> for RecognitionError {
    fn from(err: OcrError) -> Self {
        match err {
            OcrError::EngineInitFailed(msg) => Self::new(ErrorKind::EngineUnavailable, msg),
            OcrError::InvalidInput(msg) => Self::new(ErrorKind::InvalidInput, msg),
            other => Self::new(ErrorKind::RecognitionFailed, other.to_string()),
        }
    }
}

/// Successful recognition; `text` may be empty when nothing was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recognition {
    pub request_id: u64,
    pub text: String,
    /// Time spent inside the engine
    pub elapsed: Duration,
}

impl Recognition {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

pub type RecognitionResult = std::result::Result<Recognition, RecognitionError>;
