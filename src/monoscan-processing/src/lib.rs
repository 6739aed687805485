//! monoscan-processing - Monochrome rendering for Monoscan
//!
//! Grayscale projection, automatic (Otsu) thresholding and two-colour
//! recolouring of frames.

pub mod color;
pub mod monochrome;
pub mod threshold;

pub use color::{ColorScheme, Rgb, SchemeError};
pub use monochrome::MonochromeConverter;
pub use threshold::{otsu_threshold, to_grayscale, BinaryMask, FALLBACK_THRESHOLD};
