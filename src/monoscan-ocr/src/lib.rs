//! OCR for Monoscan
//!
//! An [`OcrEngine`] turns a grayscale image into text. The [`OcrWorker`]
//! owns one engine on a dedicated thread and serves requests one at a
//! time, in submission order, handing results back through
//! [`RecognitionHandle`]s.

mod engine;
mod error;
mod result;
mod tesseract_engine;
mod worker;

pub use engine::OcrEngine;
pub use error::{OcrError, Result};
pub use result::{ErrorKind, Recognition, RecognitionError, RecognitionResult};
pub use tesseract_engine::{TesseractConfig, TesseractEngine};
pub use worker::{OcrWorker, RecognitionHandle, WorkerConfig, WorkerState, WorkerStats};

/// Start a worker whose thread loads a [`TesseractEngine`]
pub fn spawn_tesseract_worker(tesseract: TesseractConfig, worker: WorkerConfig) -> Result<OcrWorker> {
    OcrWorker::spawn(move || TesseractEngine::new(tesseract), worker)
}
