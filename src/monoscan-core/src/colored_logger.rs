//! Colored logging infrastructure for component identification
//!
//! Custom tracing formatter that prefixes each line with a coloured tag
//! for the crate that emitted it (capture, processing, OCR, CLI).

use owo_colors::{OwoColorize, Style};
use std::fmt;
use std::io;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::{
    format::{FormatEvent, FormatFields, Writer},
    FmtContext,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Component identifier for prefixing logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Main,
    Capture,
    Process,
    Ocr,
}

impl Component {
    /// Component owning a tracing target (module path)
    pub fn from_target(target: &str) -> Self {
        if target.starts_with("monoscan_capture") {
            Component::Capture
        } else if target.starts_with("monoscan_processing") || target.starts_with("monoscan_core::pipeline") {
            Component::Process
        } else if target.starts_with("monoscan_ocr") {
            Component::Ocr
        } else {
            Component::Main
        }
    }

    /// Get the string representation for logging prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Main => "MAIN",
            Component::Capture => "CAPTURE",
            Component::Process => "PROCESS",
            Component::Ocr => "OCR",
        }
    }

    /// Get the color style for this component
    pub fn color_style(&self) -> Style {
        match self {
            Component::Main => Style::new().cyan().bold(),
            Component::Capture => Style::new().green().bold(),
            Component::Process => Style::new().blue().bold(),
            Component::Ocr => Style::new().yellow().bold(),
        }
    }
}

/// Formatter with component prefixes and colors
pub struct ColoredFormatter;

impl<S, N> FormatEvent<S, N> for ColoredFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();

        // Timestamp (HH:MM:SS.mmm)
        let now = chrono::Local::now();
        write!(writer, "{} ", now.format("%H:%M:%S%.3f").dimmed())?;

        let component = Component::from_target(metadata.target());
        let prefix = format!("[{:7}]", component.as_str());
        write!(writer, "{} ", prefix.style(component.color_style()))?;

        match *metadata.level() {
            Level::ERROR => write!(writer, "{} ", "ERROR".red().bold())?,
            Level::WARN => write!(writer, "{} ", "WARN ".yellow().bold())?,
            Level::INFO => write!(writer, "{} ", "INFO ".green().bold())?,
            Level::DEBUG => write!(writer, "{} ", "DEBUG".blue().bold())?,
            Level::TRACE => write!(writer, "{} ", "TRACE".dimmed().bold())?,
        }

        // Worker thread name helps tell the two execution contexts apart
        if let Some(name) = std::thread::current().name() {
            if name != "main" {
                write!(writer, "{} ", format!("<{}>", name).dimmed())?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Install the coloured logger on stderr.
///
/// `RUST_LOG` wins when set; otherwise `verbose` selects debug over info.
/// Should be called once per process.
pub fn init_logger(verbose: bool) -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let default_level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.as_str()));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .event_format(ColoredFormatter)
        .with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
