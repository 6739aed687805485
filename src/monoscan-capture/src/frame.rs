//! Raw frame views and the owned, normalized frame buffer
//!
//! Every `FrameBuffer` stores pixels in RGB(A) byte order with tightly
//! packed rows. BGR(A) sources are reordered during decoding.

use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use tracing::trace;

use crate::error::DecodeError;

/// Pixel layout of a frame as delivered by the capture source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
    Gray8,
}

impl PixelLayout {
    /// Bytes per pixel
    pub fn channels(&self) -> usize {
        match self {
            PixelLayout::Rgb8 | PixelLayout::Bgr8 => 3,
            PixelLayout::Rgba8 | PixelLayout::Bgra8 => 4,
            PixelLayout::Gray8 => 1,
        }
    }

    fn is_bgr(&self) -> bool {
        matches!(self, PixelLayout::Bgr8 | PixelLayout::Bgra8)
    }
}

/// Borrowed view of a frame owned by the capture source.
///
/// Only valid for the duration of the delivery callback; anything that
/// must outlive it goes through [`FrameBuffer::decode`], which copies.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub layout: PixelLayout,
}

impl<'a> RawFrame<'a> {
    /// Create a view over tightly packed rows
    pub fn packed(data: &'a [u8], width: u32, height: u32, layout: PixelLayout) -> Self {
        Self {
            data,
            width,
            height,
            stride: width as usize * layout.channels(),
            layout,
        }
    }
}

/// Owned pixel buffer in RGB(A) or single-channel order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    stride: usize,
    channels: usize,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Wrap tightly packed pixel data, validating its size
    pub fn new(width: u32, height: u32, channels: usize, data: Vec<u8>) -> Result<Self, DecodeError> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(DecodeError::UnsupportedChannels(channels));
        }

        let stride = (width as usize)
            .checked_mul(channels)
            .ok_or(DecodeError::Overflow { width, height })?;
        let expected = stride
            .checked_mul(height as usize)
            .ok_or(DecodeError::Overflow { width, height })?;

        if data.len() < expected {
            return Err(DecodeError::StorageTooShort {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            stride,
            channels,
            data,
        })
    }

    /// A zero-sized 3-channel buffer
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            stride: 0,
            channels: 3,
            data: Vec::new(),
        }
    }

    /// Copy a raw frame into owned, normalized storage
    pub fn decode(raw: &RawFrame<'_>) -> Result<Self, DecodeError> {
        let channels = raw.layout.channels();
        let (width, height) = (raw.width, raw.height);

        if width == 0 || height == 0 {
            trace!("empty frame {}x{}", width, height);
            return Ok(Self {
                channels,
                ..Self::empty()
            });
        }

        let row_bytes = (width as usize)
            .checked_mul(channels)
            .ok_or(DecodeError::Overflow { width, height })?;

        if raw.stride < row_bytes {
            return Err(DecodeError::StrideTooSmall {
                stride: raw.stride,
                row_bytes,
            });
        }

        // The last row does not need its trailing padding
        let required = (height as usize - 1)
            .checked_mul(raw.stride)
            .and_then(|n| n.checked_add(row_bytes))
            .ok_or(DecodeError::Overflow { width, height })?;

        if raw.data.len() < required {
            return Err(DecodeError::StorageTooShort {
                expected: required,
                actual: raw.data.len(),
            });
        }

        let mut data = Vec::with_capacity(row_bytes * height as usize);
        for y in 0..height as usize {
            let start = y * raw.stride;
            let row = &raw.data[start..start + row_bytes];

            if raw.layout.is_bgr() {
                for px in row.chunks_exact(channels) {
                    data.push(px[2]);
                    data.push(px[1]);
                    data.push(px[0]);
                    if channels == 4 {
                        data.push(px[3]);
                    }
                }
            } else {
                data.extend_from_slice(row);
            }
        }

        Ok(Self {
            width,
            height,
            stride: row_bytes,
            channels,
            data,
        })
    }

    /// Build a 3-channel buffer from any decoded image
    pub fn from_dynamic_image(image: &DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self {
            width,
            height,
            stride: width as usize * 3,
            channels: 3,
            data: rgb.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Bytes of the pixel at (x, y), `channels()` long
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = y as usize * self.stride + x as usize * self.channels;
        self.data.get(start..start + self.channels)
    }

    /// Iterate over pixels row by row
    pub fn pixels(&self) -> impl Iterator<Item = &[u8]> {
        let row_bytes = self.width as usize * self.channels;
        self.data
            .chunks(self.stride.max(1))
            .take(self.height as usize)
            .flat_map(move |row| row[..row_bytes].chunks_exact(self.channels.max(1)))
    }

    /// Convert to an `image` RGB buffer (alpha dropped, gray expanded)
    pub fn to_rgb_image(&self) -> RgbImage {
        let mut out: RgbImage = ImageBuffer::new(self.width, self.height);
        for (dst, src) in out.pixels_mut().zip(self.pixels()) {
            *dst = match self.channels {
                1 => Rgb([src[0], src[0], src[0]]),
                _ => Rgb([src[0], src[1], src[2]]),
            };
        }
        out
    }
}
