use image::GrayImage;

use crate::error::Result;

/// Text recognition backend.
///
/// Implementations need not be `Send` or reentrant: the worker builds the
/// engine on its own thread and calls it from there only, one image at a
/// time.
pub trait OcrEngine {
    /// Engine identifier for logging
    fn name(&self) -> &str;

    /// Recognize text in `image`. Finding no text is `Ok("")`.
    fn recognize(&mut self, image: &GrayImage) -> Result<String>;
}

impl<E: OcrEngine + ?Sized> OcrEngine for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn recognize(&mut self, image: &GrayImage) -> Result<String> {
        (**self).recognize(image)
    }
}
