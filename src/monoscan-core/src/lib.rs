//! Monoscan Core Library
//!
//! Frame pipeline, configuration and logging shared by the `monoscan` CLI.

pub mod colored_logger;
pub mod config;
pub mod pipeline;
pub mod schemes;

pub use config::Config;
pub use pipeline::FrameProcessingPipeline;
pub use schemes::SchemeSelector;
