//! Colours and two-colour schemes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemeError {
    #[error("invalid colour '{0}': expected #rrggbb")]
    InvalidColor(String),

    #[error("scheme '{0}': foreground and background have the same brightness")]
    IndistinctColors(String),

    #[error("scheme name must not be empty")]
    EmptyName,

    #[error("scheme index {index} out of range (0..{count})")]
    OutOfRange { index: usize, count: usize },
}

/// 8-bit RGB colour, serialized as `#rrggbb`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0x00, 0x00, 0x00);
    pub const WHITE: Rgb = Rgb::new(0xff, 0xff, 0xff);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Rec. 601 luma, rounded
    pub fn luma(&self) -> u8 {
        luma(self.r, self.g, self.b)
    }

    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// Integer Rec. 601 luma (0.299 R + 0.587 G + 0.114 B)
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114 + 500) / 1000) as u8
}

impl FromStr for Rgb {
    type Err = SchemeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().strip_prefix('#').unwrap_or(s.trim());
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(SchemeError::InvalidColor(s.to_string()));
        }

        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| SchemeError::InvalidColor(s.to_string()))
        };

        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl TryFrom<String> for Rgb {
    type Error = SchemeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Named foreground/background pair used for monochrome rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorScheme {
    pub name: String,
    pub foreground: Rgb,
    pub background: Rgb,
}

impl ColorScheme {
    pub fn new(name: impl Into<String>, foreground: Rgb, background: Rgb) -> Self {
        Self {
            name: name.into(),
            foreground,
            background,
        }
    }

    /// The four built-in schemes, in selection order
    pub fn builtin() -> Vec<ColorScheme> {
        vec![
            Self::new("White on Black", Rgb::WHITE, Rgb::BLACK),
            Self::new("Black on White", Rgb::BLACK, Rgb::WHITE),
            Self::new("Green on Black", Rgb::new(0x11, 0xc7, 0x0e), Rgb::BLACK),
            Self::new("Yellow on Black", Rgb::new(0xf4, 0xd8, 0x1e), Rgb::BLACK),
        ]
    }

    /// Built-in scheme at `index`
    pub fn by_index(index: usize) -> Option<ColorScheme> {
        Self::builtin().into_iter().nth(index)
    }

    /// Check that a rendered frame projects back to two distinct gray levels
    pub fn validate(&self) -> Result<(), SchemeError> {
        if self.name.trim().is_empty() {
            return Err(SchemeError::EmptyName);
        }
        if self.foreground.luma() == self.background.luma() {
            return Err(SchemeError::IndistinctColors(self.name.clone()));
        }
        Ok(())
    }
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self::new("White on Black", Rgb::WHITE, Rgb::BLACK)
    }
}
