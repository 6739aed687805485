//! Configuration management
//!
//! TOML file with every field optional:
//!
//! ```toml
//! [display]
//! scheme = 2
//!
//! [[display.custom_schemes]]
//! name = "Amber on Black"
//! foreground = "#ffb000"
//! background = "#000000"
//!
//! [ocr]
//! language = "eng"
//! page_seg_mode = 3
//! tessdata_dir = "/usr/share/tesseract-ocr/5/tessdata"
//! queue_capacity = 8
//! ```

use anyhow::{Context, Result};
use monoscan_ocr::{TesseractConfig, WorkerConfig};
use monoscan_processing::ColorScheme;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::schemes::SchemeSelector;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub ocr: OcrConfig,
}

/// Rendering settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Index of the scheme selected at startup
    #[serde(default)]
    pub scheme: usize,

    /// Extra schemes appended after the four built-ins
    #[serde(default)]
    pub custom_schemes: Vec<ColorScheme>,
}

/// OCR engine and worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Tesseract language code(s), e.g. "eng" or "eng+deu"
    #[serde(default = "default_language")]
    pub language: String,

    /// Tesseract page segmentation mode
    #[serde(default = "default_page_seg_mode")]
    pub page_seg_mode: u8,

    /// Directory with `*.traineddata`; unset uses `TESSDATA_PREFIX`
    #[serde(default)]
    pub tessdata_dir: Option<PathBuf>,

    /// Pending OCR requests allowed before new ones are rejected
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_language() -> String { "eng".to_string() }
fn default_page_seg_mode() -> u8 { 3 }
fn default_queue_capacity() -> usize { 8 }

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            page_seg_mode: default_page_seg_mode(),
            tessdata_dir: None,
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {:?}", path.as_ref()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given; otherwise the default file, falling back to
    /// built-in defaults when it does not exist
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        match Self::default_path() {
            Some(default) if default.exists() => Self::from_file(default),
            _ => {
                debug!("no config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// `<config dir>/monoscan/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("monoscan").join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        for scheme in &self.display.custom_schemes {
            scheme.validate().context("Invalid custom colour scheme")?;
        }

        let count = ColorScheme::builtin().len() + self.display.custom_schemes.len();
        if self.display.scheme >= count {
            anyhow::bail!("display.scheme {} out of range (0..{})", self.display.scheme, count);
        }

        if self.ocr.queue_capacity == 0 {
            anyhow::bail!("ocr.queue_capacity must be at least 1");
        }

        Ok(())
    }

    /// Scheme list with the configured startup selection applied
    pub fn scheme_selector(&self) -> Result<SchemeSelector> {
        let mut selector = SchemeSelector::new(self.display.custom_schemes.clone())?;
        selector.select(self.display.scheme)?;
        Ok(selector)
    }

    pub fn tesseract_config(&self) -> TesseractConfig {
        TesseractConfig {
            tessdata_dir: self.ocr.tessdata_dir.clone(),
            language: self.ocr.language.clone(),
            page_seg_mode: self.ocr.page_seg_mode,
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            queue_capacity: self.ocr.queue_capacity,
            ..WorkerConfig::default()
        }
    }
}
