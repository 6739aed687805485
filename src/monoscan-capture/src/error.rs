//! Capture error types

use std::path::PathBuf;
use thiserror::Error;

/// A raw frame could not be normalized into a `FrameBuffer`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("stride {stride} is smaller than a row of {row_bytes} bytes")]
    StrideTooSmall { stride: usize, row_bytes: usize },

    #[error("frame storage too short: expected at least {expected} bytes, got {actual}")]
    StorageTooShort { expected: usize, actual: usize },

    #[error("frame dimensions overflow: {width}x{height}")]
    Overflow { width: u32, height: u32 },

    #[error("unsupported channel count: {0}")]
    UnsupportedChannels(usize),
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("source directory not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("no frames found in {0}")]
    NoFrames(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}
