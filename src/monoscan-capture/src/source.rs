//! Frame sources
//!
//! A live camera is an external collaborator; `ImageSequence` replays a
//! directory of still images through the same interface.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::CaptureError;
use crate::frame::{PixelLayout, RawFrame};

/// File extensions `ImageSequence` picks up
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp", "pnm", "pgm", "ppm"];

/// Owned frame as produced by a source
pub struct CapturedFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub layout: PixelLayout,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
}

impl CapturedFrame {
    /// Borrow as a raw frame for the delivery callback
    pub fn as_raw(&self) -> RawFrame<'_> {
        RawFrame {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.stride,
            layout: self.layout,
        }
    }
}

/// Anything that delivers frames one at a time
pub trait FrameSource {
    /// Next frame, or `None` when the source is exhausted
    fn next_frame(&mut self) -> Result<Option<CapturedFrame>, CaptureError>;

    /// Human-readable name for logging
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Replays image files from a directory in lexical order
pub struct ImageSequence {
    name: String,
    paths: Vec<PathBuf>,
    position: usize,
    looping: bool,
    sequence: u64,
}

impl ImageSequence {
    /// Scan `dir` for image files
    pub fn open(dir: &Path, looping: bool) -> Result<Self, CaptureError> {
        if !dir.is_dir() {
            return Err(CaptureError::SourceNotFound(dir.to_path_buf()));
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if path.is_file() && is_image {
                paths.push(path);
            }
        }

        if paths.is_empty() {
            return Err(CaptureError::NoFrames(dir.to_path_buf()));
        }
        paths.sort();

        debug!("image sequence {:?}: {} frames", dir, paths.len());

        Ok(Self {
            name: dir.display().to_string(),
            paths,
            position: 0,
            looping,
            sequence: 0,
        })
    }

    /// Number of distinct images in the sequence
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn load(path: &Path, sequence: u64) -> Result<CapturedFrame, CaptureError> {
        let rgba = image::open(path)?.to_rgba8();
        let (width, height) = rgba.dimensions();

        Ok(CapturedFrame {
            data: rgba.into_raw(),
            width,
            height,
            stride: width as usize * 4,
            layout: PixelLayout::Rgba8,
            sequence,
            timestamp: Utc::now(),
        })
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<CapturedFrame>, CaptureError> {
        if self.position >= self.paths.len() {
            if !self.looping {
                return Ok(None);
            }
            self.position = 0;
        }

        let path = &self.paths[self.position];
        self.position += 1;
        let sequence = self.sequence;
        self.sequence += 1;

        match Self::load(path, sequence) {
            Ok(frame) => Ok(Some(frame)),
            Err(e) => {
                warn!("failed to load {:?}: {}", path, e);
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
