//! Tesseract OCR through libtesseract

use image::GrayImage;
use std::path::PathBuf;
use tesseract::Tesseract;
use tracing::debug;

use crate::engine::OcrEngine;
use crate::error::{OcrError, Result};

#[derive(Debug, Clone)]
pub struct TesseractConfig {
    /// Directory holding `*.traineddata`; `None` uses `TESSDATA_PREFIX`
    /// or the library's built-in search path
    pub tessdata_dir: Option<PathBuf>,
    /// Language code(s), e.g. "eng" or "eng+deu"
    pub language: String,
    /// Page segmentation mode (3 = fully automatic)
    pub page_seg_mode: u8,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            tessdata_dir: None,
            language: "eng".to_string(),
            page_seg_mode: 3,
        }
    }
}

/// One libtesseract handle, loaded once and reused for every request
pub struct TesseractEngine {
    config: TesseractConfig,
    api: Option<Tesseract>,
}

impl TesseractEngine {
    /// Load the language models; fails if the language data is missing
    pub fn new(config: TesseractConfig) -> Result<Self> {
        debug!(
            "initializing tesseract engine ({}, tessdata {:?})",
            config.language, config.tessdata_dir
        );
        let api = load_api(&config)?;
        debug!("tesseract engine ready");
        Ok(Self { config, api: Some(api) })
    }
}

fn load_api(config: &TesseractConfig) -> Result<Tesseract> {
    let datapath = match config.tessdata_dir.as_deref() {
        Some(dir) => Some(dir.to_str().ok_or_else(|| {
            OcrError::EngineInitFailed(format!("tessdata path {:?} is not valid UTF-8", dir))
        })?),
        None => None,
    };

    Tesseract::new(datapath, Some(&config.language))
        .map_err(|e| {
            OcrError::EngineInitFailed(format!(
                "failed to load language '{}': {} (set TESSDATA_PREFIX or install the traineddata file)",
                config.language, e
            ))
        })?
        .set_variable("tessedit_pageseg_mode", &config.page_seg_mode.to_string())
        .map_err(|e| OcrError::EngineInitFailed(format!("invalid page segmentation mode: {}", e)))
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&mut self, image: &GrayImage) -> Result<String> {
        if image.width() == 0 || image.height() == 0 {
            return Err(OcrError::InvalidInput("empty image".to_string()));
        }
        let width = i32::try_from(image.width())
            .map_err(|_| OcrError::InvalidInput(format!("image width {} too large", image.width())))?;
        let height = i32::try_from(image.height())
            .map_err(|_| OcrError::InvalidInput(format!("image height {} too large", image.height())))?;

        // set_frame consumes the handle; a failed call leaves it to be reloaded
        let api = match self.api.take() {
            Some(api) => api,
            None => load_api(&self.config).map_err(|e| OcrError::ProcessingError(e.to_string()))?,
        };

        let mut api = api
            .set_frame(image.as_raw(), width, height, 1, width)
            .map_err(|e| OcrError::ProcessingError(format!("failed to set image: {}", e)))?;
        let text = api.get_text();
        self.api = Some(api);

        let text = clean_output(&text.map_err(|e| OcrError::ProcessingError(e.to_string()))?);
        debug!("tesseract recognized {} chars", text.chars().count());
        Ok(text)
    }
}

/// Tesseract ends each page with a form feed
fn clean_output(text: &str) -> String {
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_output() {
        assert_eq!(clean_output("Hello world\n\x0c"), "Hello world");
        assert_eq!(clean_output("\n\x0c"), "");
        assert_eq!(clean_output("line one\nline two\n"), "line one\nline two");
    }

    #[test]
    fn test_missing_language_is_init_failure() {
        let config = TesseractConfig {
            language: "zz_not_a_language".to_string(),
            ..TesseractConfig::default()
        };
        assert!(matches!(TesseractEngine::new(config), Err(OcrError::EngineInitFailed(_))));
    }

    #[test]
    fn test_missing_tessdata_dir_is_init_failure() {
        let config = TesseractConfig {
            tessdata_dir: Some(PathBuf::from("/nonexistent/tessdata")),
            ..TesseractConfig::default()
        };
        assert!(matches!(TesseractEngine::new(config), Err(OcrError::EngineInitFailed(_))));
    }
}
