//! Two-colour rendering of frames

use image::GrayImage;
use monoscan_capture::FrameBuffer;
use tracing::debug;

use crate::color::ColorScheme;
use crate::threshold::{otsu_threshold, to_grayscale, BinaryMask};

/// Grayscale -> automatic threshold -> recolour.
///
/// Stateless; the scheme is passed into every call. Output is always a
/// 3-channel RGB buffer with the input's dimensions.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonochromeConverter;

impl MonochromeConverter {
    pub fn new() -> Self {
        Self
    }

    /// Render `input` using only `scheme.foreground` and `scheme.background`
    pub fn convert(&self, input: &FrameBuffer, scheme: &ColorScheme) -> FrameBuffer {
        if input.is_empty() {
            return FrameBuffer::empty();
        }

        let gray = to_grayscale(input);

        // Nothing to separate in a single-level frame
        if is_uniform(&gray) {
            debug!("uniform {}x{} frame, rendering background", input.width(), input.height());
            return Self::recolor(&BinaryMask::from_gray(&gray, u8::MAX), scheme);
        }

        // A frame already rendered in this scheme maps to itself
        if Self::is_rendered_with(input, scheme) {
            debug!("frame already rendered with '{}'", scheme.name);
            return input.clone();
        }

        let threshold = otsu_threshold(&gray);
        let mask = BinaryMask::from_gray(&gray, threshold);
        debug!(
            "monochrome {}x{} threshold={} foreground={}",
            input.width(),
            input.height(),
            threshold,
            mask.foreground_count()
        );

        Self::recolor(&mask, scheme)
    }

    /// Same as [`convert`](Self::convert) with a caller-chosen cut point
    pub fn convert_with_threshold(&self, input: &FrameBuffer, scheme: &ColorScheme, threshold: u8) -> FrameBuffer {
        if input.is_empty() {
            return FrameBuffer::empty();
        }
        let mask = BinaryMask::from_gray(&to_grayscale(input), threshold);
        Self::recolor(&mask, scheme)
    }

    /// The threshold `convert` would pick for `input`
    pub fn threshold_for(&self, input: &FrameBuffer) -> u8 {
        otsu_threshold(&to_grayscale(input))
    }

    /// Map a mask to scheme colours
    pub fn recolor(mask: &BinaryMask, scheme: &ColorScheme) -> FrameBuffer {
        let fg = scheme.foreground.to_array();
        let bg = scheme.background.to_array();

        let mut data = Vec::with_capacity(mask.width() as usize * mask.height() as usize * 3);
        for is_fg in mask.values() {
            data.extend_from_slice(if is_fg { &fg } else { &bg });
        }

        // Size follows from the mask dimensions
        FrameBuffer::new(mask.width(), mask.height(), 3, data).unwrap_or_else(|_| FrameBuffer::empty())
    }

    fn is_rendered_with(input: &FrameBuffer, scheme: &ColorScheme) -> bool {
        if input.channels() != 3 {
            return false;
        }
        let fg = scheme.foreground.to_array();
        let bg = scheme.background.to_array();
        input.pixels().all(|px| px == fg || px == bg)
    }
}

fn is_uniform(gray: &GrayImage) -> bool {
    let mut values = gray.as_raw().iter();
    match values.next() {
        Some(first) => values.all(|v| v == first),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;

    fn split_frame() -> FrameBuffer {
        // 4x2, left half bright, right half dark
        let mut data = Vec::new();
        for _ in 0..2 {
            for x in 0..4 {
                let v = if x < 2 { 230 } else { 10 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        FrameBuffer::new(4, 2, 3, data).unwrap()
    }

    fn gradient_frame(width: u32, height: u32) -> FrameBuffer {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x * 7 + y * 3) as u8, (x * 13) as u8, (y * 29) as u8, 255]);
            }
        }
        FrameBuffer::new(width, height, 4, data).unwrap()
    }

    #[test]
    fn test_split_white_on_black() {
        let out = MonochromeConverter::new().convert(&split_frame(), &ColorScheme::builtin()[0]);

        assert_eq!((out.width(), out.height(), out.channels()), (4, 2, 3));
        for y in 0..2 {
            assert_eq!(out.pixel(0, y), Some(&[255u8, 255, 255][..]));
            assert_eq!(out.pixel(1, y), Some(&[255u8, 255, 255][..]));
            assert_eq!(out.pixel(2, y), Some(&[0u8, 0, 0][..]));
            assert_eq!(out.pixel(3, y), Some(&[0u8, 0, 0][..]));
        }
    }

    #[test]
    fn test_output_uses_only_scheme_colors() {
        let converter = MonochromeConverter::new();
        let input = gradient_frame(37, 23);

        for scheme in ColorScheme::builtin() {
            let out = converter.convert(&input, &scheme);
            let fg = scheme.foreground.to_array();
            let bg = scheme.background.to_array();
            assert!(out.pixels().all(|px| px == fg || px == bg), "scheme {}", scheme.name);
        }
    }

    #[test]
    fn test_convert_is_idempotent() {
        let converter = MonochromeConverter::new();
        let input = gradient_frame(31, 17);

        for scheme in ColorScheme::builtin() {
            let once = converter.convert(&input, &scheme);
            let twice = converter.convert(&once, &scheme);
            assert_eq!(once, twice, "scheme {}", scheme.name);
        }
    }

    #[test]
    fn test_convert_is_deterministic() {
        let converter = MonochromeConverter::new();
        let input = gradient_frame(16, 16);
        let scheme = ColorScheme::builtin()[3].clone();
        assert_eq!(converter.convert(&input, &scheme), converter.convert(&input, &scheme));
    }

    #[test]
    fn test_uniform_input_is_background() {
        let converter = MonochromeConverter::new();
        let scheme = ColorScheme::new("Test", Rgb::new(1, 2, 3), Rgb::new(200, 200, 200));

        for value in [0u8, 40, 128, 250, 255] {
            let flat = FrameBuffer::new(3, 3, 3, vec![value; 27]).unwrap();
            let out = converter.convert(&flat, &scheme);
            assert!(out.pixels().all(|px| px == [200, 200, 200]), "value {}", value);
        }
    }

    #[test]
    fn test_black_and_white_frames_render_background() {
        let converter = MonochromeConverter::new();

        for scheme in ColorScheme::builtin() {
            let bg = scheme.background.to_array();
            for value in [0u8, 255] {
                let flat = FrameBuffer::new(4, 4, 3, vec![value; 48]).unwrap();
                let out = converter.convert(&flat, &scheme);
                assert!(
                    out.pixels().all(|px| px == bg),
                    "scheme {} on {} input",
                    scheme.name,
                    value
                );
                assert_eq!(converter.convert(&out, &scheme), out, "scheme {}", scheme.name);
            }
        }
    }

    #[test]
    fn test_empty_input_returns_empty() {
        let out = MonochromeConverter::new().convert(&FrameBuffer::empty(), &ColorScheme::default());
        assert!(out.is_empty());
    }

    #[test]
    fn test_single_channel_input() {
        let gray = FrameBuffer::new(2, 1, 1, vec![5, 250]).unwrap();
        let out = MonochromeConverter::new().convert(&gray, &ColorScheme::builtin()[1]);
        assert_eq!(out.channels(), 3);
        assert_eq!(out.data(), &[255, 255, 255, 0, 0, 0]);
    }

    #[test]
    fn test_fixed_threshold() {
        let converter = MonochromeConverter::new();
        let out = converter.convert_with_threshold(&split_frame(), &ColorScheme::default(), 240);
        assert!(out.pixels().all(|px| px == [0, 0, 0]));
        assert_eq!(converter.threshold_for(&split_frame()), 10);
    }
}
