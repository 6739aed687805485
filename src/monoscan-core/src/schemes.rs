//! Ordered colour-scheme list with index selection

use monoscan_processing::{ColorScheme, SchemeError};
use tracing::info;

/// Built-in schemes followed by user-defined ones.
///
/// The selection only decides which scheme the next frame gets; callers
/// receive a copy, never a reference into shared state.
#[derive(Debug, Clone)]
pub struct SchemeSelector {
    schemes: Vec<ColorScheme>,
    active: usize,
}

impl SchemeSelector {
    pub fn new(custom: Vec<ColorScheme>) -> Result<Self, SchemeError> {
        for scheme in &custom {
            scheme.validate()?;
        }

        let mut schemes = ColorScheme::builtin();
        schemes.extend(custom);
        Ok(Self { schemes, active: 0 })
    }

    /// Switch to the scheme at `index`; out-of-range keeps the current one
    pub fn select(&mut self, index: usize) -> Result<&ColorScheme, SchemeError> {
        if index >= self.schemes.len() {
            return Err(SchemeError::OutOfRange {
                index,
                count: self.schemes.len(),
            });
        }
        self.active = index;
        info!("colour scheme changed to: {}", self.schemes[index].name);
        Ok(&self.schemes[index])
    }

    /// Copy of the active scheme
    pub fn active(&self) -> ColorScheme {
        self.schemes[self.active].clone()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn schemes(&self) -> &[ColorScheme] {
        &self.schemes
    }
}

impl Default for SchemeSelector {
    fn default() -> Self {
        Self {
            schemes: ColorScheme::builtin(),
            active: 0,
        }
    }
}
