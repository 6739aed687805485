//! Grayscale projection and automatic threshold selection

use image::{GrayImage, ImageBuffer};
use monoscan_capture::FrameBuffer;
use tracing::trace;

use crate::color::luma;

/// Cut point used when the histogram has no usable split
pub const FALLBACK_THRESHOLD: u8 = 128;

/// Project a frame to one channel.
///
/// 3 channels use Rec. 601 luma, 4 channels drop alpha first, 1 channel
/// is copied as-is.
pub fn to_grayscale(frame: &FrameBuffer) -> GrayImage {
    let mut gray: GrayImage = ImageBuffer::new(frame.width(), frame.height());

    for (dst, px) in gray.pixels_mut().zip(frame.pixels()) {
        dst.0[0] = match px.len() {
            1 => px[0],
            _ => luma(px[0], px[1], px[2]),
        };
    }

    gray
}

/// 256-bin intensity histogram
pub fn histogram(gray: &GrayImage) -> [u64; 256] {
    let mut bins = [0u64; 256];
    for px in gray.pixels() {
        bins[px.0[0] as usize] += 1;
    }
    bins
}

/// Otsu's method: the `t` maximizing between-class variance for the
/// split `<= t` / `> t`.
///
/// Returns [`FALLBACK_THRESHOLD`] when no split separates two non-empty
/// classes (empty image or a single intensity).
pub fn otsu_threshold(gray: &GrayImage) -> u8 {
    let bins = histogram(gray);
    let total: u64 = bins.iter().sum();
    if total == 0 {
        return FALLBACK_THRESHOLD;
    }

    let total = total as f64;
    let sum_all: f64 = bins.iter().enumerate().map(|(i, &n)| i as f64 * n as f64).sum();

    let mut weight_bg = 0.0;
    let mut sum_bg = 0.0;
    let mut best: Option<(u8, f64)> = None;

    for t in 0..255usize {
        weight_bg += bins[t] as f64;
        if weight_bg == 0.0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0.0 {
            break;
        }

        sum_bg += t as f64 * bins[t] as f64;
        let mean_bg = sum_bg / weight_bg;
        let mean_fg = (sum_all - sum_bg) / weight_fg;
        let variance = weight_bg * weight_fg * (mean_bg - mean_fg).powi(2);

        // Strict comparison keeps the first maximum
        if variance > best.map_or(0.0, |(_, v)| v) {
            best = Some((t as u8, variance));
        }
    }

    match best {
        Some((t, variance)) => {
            trace!("otsu threshold {} (variance {:.1})", t, variance);
            t
        }
        None => {
            trace!("degenerate histogram, falling back to {}", FALLBACK_THRESHOLD);
            FALLBACK_THRESHOLD
        }
    }
}

/// Per-pixel foreground/background classification, 255 or 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    mask: GrayImage,
    threshold: u8,
}

impl BinaryMask {
    /// Classify `gray`: foreground where the value is above `threshold`
    pub fn from_gray(gray: &GrayImage, threshold: u8) -> Self {
        let mut mask = gray.clone();
        for px in mask.pixels_mut() {
            px.0[0] = if px.0[0] > threshold { 255 } else { 0 };
        }
        Self { mask, threshold }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    /// Mask values in row-major order
    pub fn values(&self) -> impl Iterator<Item = bool> + '_ {
        self.mask.pixels().map(|px| px.0[0] == 255)
    }

    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.mask.get_pixel(x, y).0[0] == 255
    }

    pub fn foreground_count(&self) -> usize {
        self.values().filter(|&fg| fg).count()
    }
}
