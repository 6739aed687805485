//! Frame pipeline: synchronous display path and asynchronous OCR path
//!
//! Both entry points run on the frame-delivery thread. Only the hand-off
//! to the OCR worker crosses threads, and it never waits.

use monoscan_capture::{FrameBuffer, RawFrame};
use monoscan_ocr::{OcrWorker, RecognitionHandle};
use monoscan_processing::{to_grayscale, ColorScheme, MonochromeConverter};
use tracing::{debug, warn};

/// Owns the converter and the OCR worker.
///
/// Dropping the pipeline detaches the worker thread without waiting for
/// queued recognitions; [`shutdown`](Self::shutdown) waits for them.
pub struct FrameProcessingPipeline {
    converter: MonochromeConverter,
    worker: OcrWorker,
}

impl FrameProcessingPipeline {
    pub fn new(worker: OcrWorker) -> Self {
        Self {
            converter: MonochromeConverter::new(),
            worker,
        }
    }

    /// Decode and render a frame for display.
    ///
    /// `None` means the frame could not be decoded and should be skipped.
    /// An empty frame renders to an empty buffer.
    pub fn render_frame(&self, raw: &RawFrame<'_>, scheme: &ColorScheme) -> Option<FrameBuffer> {
        let frame = match FrameBuffer::decode(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("skipping undecodable frame: {}", e);
                return None;
            }
        };

        Some(self.converter.convert(&frame, scheme))
    }

    /// Render a frame and queue its grayscale projection for OCR.
    ///
    /// The frame is copied before anything crosses to the worker, so `raw`
    /// may be released as soon as this returns. `None` means the frame
    /// could not be decoded and nothing was submitted.
    pub fn capture_and_recognize(&self, raw: &RawFrame<'_>, scheme: &ColorScheme) -> Option<RecognitionHandle> {
        let frame = match FrameBuffer::decode(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("capture skipped, undecodable frame: {}", e);
                return None;
            }
        };

        let rendered = self.converter.convert(&frame, scheme);
        // Two-colour input keeps its classification as two gray levels
        let gray = to_grayscale(&rendered);

        let handle = self.worker.submit(gray);
        debug!(
            "captured {}x{} frame with '{}' as OCR request {}",
            frame.width(),
            frame.height(),
            scheme.name,
            handle.id()
        );
        Some(handle)
    }

    pub fn worker(&self) -> &OcrWorker {
        &self.worker
    }

    /// Finish queued recognitions and stop the worker. Blocks until the
    /// queue is drained.
    pub fn shutdown(self) {
        self.worker.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;
    use monoscan_capture::PixelLayout;
    use monoscan_ocr::{ErrorKind, OcrEngine, WorkerConfig};

    /// Reports the distinct gray levels it was given
    struct LevelsEngine;

    impl OcrEngine for LevelsEngine {
        fn name(&self) -> &str {
            "levels"
        }

        fn recognize(&mut self, image: &GrayImage) -> monoscan_ocr::Result<String> {
            let mut levels: Vec<u8> = image.pixels().map(|p| p.0[0]).collect();
            levels.sort_unstable();
            levels.dedup();
            Ok(levels.iter().map(|l| l.to_string()).collect::<Vec<_>>().join(","))
        }
    }

    fn pipeline() -> FrameProcessingPipeline {
        FrameProcessingPipeline::new(OcrWorker::spawn(|| Ok(LevelsEngine), WorkerConfig::default()).unwrap())
    }

    #[test]
    fn test_render_bgra_frame() {
        // 2x1 BGRA: bright blue-ish pixel, dark pixel
        let data = [250u8, 240, 230, 255, 5, 5, 5, 255];
        let raw = RawFrame::packed(&data, 2, 1, PixelLayout::Bgra8);
        let out = pipeline().render_frame(&raw, &ColorScheme::builtin()[2]).unwrap();

        assert_eq!(out.channels(), 3);
        assert_eq!(out.data(), &[0x11, 0xc7, 0x0e, 0, 0, 0]);
    }

    #[test]
    fn test_malformed_frame_yields_nothing() {
        let data = [0u8; 5];
        let raw = RawFrame::packed(&data, 2, 1, PixelLayout::Rgb8);
        let p = pipeline();

        assert!(p.render_frame(&raw, &ColorScheme::default()).is_none());
        assert!(p.capture_and_recognize(&raw, &ColorScheme::default()).is_none());
        assert_eq!(p.worker().stats().submitted, 0);
    }

    #[test]
    fn test_ocr_receives_two_gray_levels() {
        let data: Vec<u8> = (0..64u8).flat_map(|v| [v * 4, v * 2, v]).collect();
        let raw = RawFrame::packed(&data, 8, 8, PixelLayout::Rgb8);

        let text = pipeline()
            .capture_and_recognize(&raw, &ColorScheme::builtin()[3])
            .unwrap()
            .wait()
            .unwrap()
            .text;
        // Yellow (#f4d81e) and black
        assert_eq!(text, "0,203");
    }

    #[test]
    fn test_empty_capture_is_invalid_input() {
        let raw = RawFrame::packed(&[], 0, 0, PixelLayout::Rgb8);
        let err = pipeline()
            .capture_and_recognize(&raw, &ColorScheme::default())
            .unwrap()
            .wait()
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }
}
