//! monoscan-capture - Frame intake for Monoscan
//!
//! Normalizes whatever pixel layout a capture source hands over into an
//! owned RGB(A) `FrameBuffer`, and provides a directory-backed frame source.

pub mod error;
pub mod frame;
pub mod source;

pub use error::{CaptureError, DecodeError};
pub use frame::{FrameBuffer, PixelLayout, RawFrame};
pub use source::{CapturedFrame, FrameSource, ImageSequence};
