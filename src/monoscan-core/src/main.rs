//! Monoscan - monochrome frame rendering with on-demand OCR

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use monoscan_capture::{FrameBuffer, FrameSource, ImageSequence, PixelLayout, RawFrame};
use monoscan_core::colored_logger::init_logger;
use monoscan_core::{Config, FrameProcessingPipeline, SchemeSelector};
use monoscan_ocr::{ErrorKind, RecognitionHandle, RecognitionResult, WorkerState};
use monoscan_processing::{ColorScheme, MonochromeConverter};

#[derive(Parser)]
#[command(name = "monoscan")]
#[command(about = "Two-colour frame rendering with OCR capture")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List colour schemes
    Schemes,

    /// Check that the OCR engine initializes
    Check,

    /// Render an image to a two-colour PNG
    Convert {
        /// Input image
        input: PathBuf,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,

        /// Colour scheme index (see `schemes`)
        #[arg(short, long)]
        scheme: Option<usize>,
    },

    /// Render an image and run OCR on it
    Recognize {
        /// Input image
        input: PathBuf,

        /// Colour scheme index (see `schemes`)
        #[arg(short, long)]
        scheme: Option<usize>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay a directory of frames, capturing OCR periodically
    Run {
        /// Directory of frame images, played in file-name order
        dir: PathBuf,

        /// Colour scheme index (see `schemes`)
        #[arg(short, long)]
        scheme: Option<usize>,

        /// Trigger OCR on every Nth frame (0 disables)
        #[arg(long, default_value = "30")]
        capture_every: u64,

        /// Frame delivery rate
        #[arg(long, default_value = "30")]
        fps: u32,

        /// Write rendered frames here
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Restart from the first frame when the directory is exhausted
        #[arg(long = "loop")]
        looping: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logger(cli.verbose)?;

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Schemes => {
            cmd_schemes(&config)?;
        }
        Commands::Check => {
            cmd_check(&config)?;
        }
        Commands::Convert { input, output, scheme } => {
            cmd_convert(&config, &input, &output, scheme)?;
        }
        Commands::Recognize { input, scheme, json } => {
            cmd_recognize(&config, &input, scheme, json)?;
        }
        Commands::Run {
            dir,
            scheme,
            capture_every,
            fps,
            output_dir,
            looping,
        } => {
            cmd_run(&config, &dir, scheme, capture_every, fps, output_dir, looping)?;
        }
    }

    Ok(())
}

/// Scheme list with the CLI override applied over the configured one
fn resolve_scheme(config: &Config, scheme: Option<usize>) -> Result<SchemeSelector> {
    let mut selector = config.scheme_selector()?;
    if let Some(index) = scheme {
        selector.select(index)?;
    }
    Ok(selector)
}

fn start_pipeline(config: &Config) -> Result<FrameProcessingPipeline> {
    let worker = monoscan_ocr::spawn_tesseract_worker(config.tesseract_config(), config.worker_config())
        .context("Failed to start OCR worker")?;
    Ok(FrameProcessingPipeline::new(worker))
}

fn cmd_schemes(config: &Config) -> Result<()> {
    let selector = config.scheme_selector()?;

    println!("available colour schemes:\n");
    for (i, scheme) in selector.schemes().iter().enumerate() {
        println!(
            "  [{}] {:<18} {} on {} {}",
            i,
            scheme.name,
            scheme.foreground,
            scheme.background,
            if i == selector.active_index() { "(default)" } else { "" }
        );
    }

    Ok(())
}

fn cmd_check(config: &Config) -> Result<()> {
    println!("checking OCR engine...\n");

    let tesseract = config.tesseract_config();
    match tesseract.tessdata_dir {
        Some(ref dir) => println!("  tessdata: {:?}", dir),
        None => println!(
            "  tessdata: {}",
            std::env::var("TESSDATA_PREFIX").unwrap_or_else(|_| "(library default)".to_string())
        ),
    }

    let worker = monoscan_ocr::spawn_tesseract_worker(tesseract, config.worker_config())?;
    let state = worker.wait_initialized(Duration::from_secs(10));
    let ready = state.is_ready();
    println!(
        "  language '{}': {}",
        config.ocr.language,
        if ready { "OK" } else { "not available" }
    );
    worker.shutdown();

    println!();

    if !ready {
        println!("WARNING: OCR is unavailable; captures will report 'engine unavailable'.");
        println!("Install the '{}' language data, or point ocr.tessdata_dir", config.ocr.language);
        println!("(or TESSDATA_PREFIX) at the tessdata directory.");
        if state == WorkerState::Uninitialized {
            warn!("engine initialization did not finish within 10s");
        }
    } else {
        println!("all checks passed!");
    }

    Ok(())
}

fn cmd_convert(config: &Config, input: &Path, output: &Path, scheme: Option<usize>) -> Result<()> {
    let scheme = resolve_scheme(config, scheme)?.active();

    let image = image::open(input).with_context(|| format!("Failed to open {:?}", input))?;
    let frame = FrameBuffer::from_dynamic_image(&image);

    let converter = MonochromeConverter::new();
    let threshold = converter.threshold_for(&frame);
    let rendered = converter.convert(&frame, &scheme);

    rendered
        .to_rgb_image()
        .save(output)
        .with_context(|| format!("Failed to write {:?}", output))?;

    info!(
        "rendered {}x{} with '{}' (threshold {}) to {:?}",
        rendered.width(),
        rendered.height(),
        scheme.name,
        threshold,
        output
    );
    Ok(())
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum RecognizeReport {
    Ok {
        text: String,
        characters: usize,
        words: usize,
        elapsed_ms: u64,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl From<&RecognitionResult> for RecognizeReport {
    fn from(result: &RecognitionResult) -> Self {
        match result {
            Ok(r) => RecognizeReport::Ok {
                text: r.text.clone(),
                characters: r.char_count(),
                words: r.word_count(),
                elapsed_ms: r.elapsed.as_millis() as u64,
            },
            Err(e) => RecognizeReport::Error {
                kind: e.kind,
                message: e.message.clone(),
            },
        }
    }
}

fn cmd_recognize(config: &Config, input: &Path, scheme: Option<usize>, json: bool) -> Result<()> {
    let scheme = resolve_scheme(config, scheme)?.active();

    let image = image::open(input)
        .with_context(|| format!("Failed to open {:?}", input))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    let data = image.into_raw();
    let raw = RawFrame::packed(&data, width, height, PixelLayout::Rgba8);

    let pipeline = start_pipeline(config)?;
    info!("performing OCR on {:?} with '{}'", input, scheme.name);

    let result = pipeline
        .capture_and_recognize(&raw, &scheme)
        .context("Could not process frame")?
        .wait();
    pipeline.shutdown();

    if json {
        println!("{}", serde_json::to_string_pretty(&RecognizeReport::from(&result))?);
    } else {
        print_result(None, &result);
    }

    match result {
        Ok(_) => Ok(()),
        Err(e) => Err(anyhow::anyhow!("OCR failed: {}", e)),
    }
}

fn print_result(frame: Option<u64>, result: &RecognitionResult) {
    let label = frame.map(|f| format!("frame {}: ", f)).unwrap_or_default();
    match result {
        Ok(r) if r.is_empty() => {
            println!("{}no text found", label);
        }
        Ok(r) => {
            println!("{}recognized text:", label);
            println!("{}", r.text);
            println!("characters: {} | words: {}", r.char_count(), r.word_count());
        }
        Err(e) => {
            eprintln!("{}OCR error ({}): {}", label, e.kind, e.message);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    config: &Config,
    dir: &Path,
    scheme: Option<usize>,
    capture_every: u64,
    fps: u32,
    output_dir: Option<PathBuf>,
    looping: bool,
) -> Result<()> {
    let scheme: ColorScheme = resolve_scheme(config, scheme)?.active();
    let mut source = ImageSequence::open(dir, looping)?;

    if let Some(ref out) = output_dir {
        std::fs::create_dir_all(out)?;
    }

    let pipeline = start_pipeline(config)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    info!(
        "replaying {} ({} frames) at {} fps with '{}'",
        source.name(),
        source.len(),
        fps,
        scheme.name
    );

    let frame_interval = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
    let mut pending: VecDeque<(u64, RecognitionHandle)> = VecDeque::new();
    let mut rendered_count = 0u64;
    let mut skipped_count = 0u64;

    while running.load(Ordering::SeqCst) {
        let started = Instant::now();

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                warn!("skipping frame: {}", e);
                skipped_count += 1;
                continue;
            }
        };
        let raw = frame.as_raw();

        match pipeline.render_frame(&raw, &scheme) {
            Some(rendered) => {
                rendered_count += 1;
                if let Some(ref out) = output_dir {
                    let path = out.join(format!("frame_{:06}.png", frame.sequence));
                    if let Err(e) = rendered.to_rgb_image().save(&path) {
                        warn!("failed to write {:?}: {}", path, e);
                    }
                }
            }
            None => skipped_count += 1,
        }

        if capture_every > 0 && (frame.sequence + 1) % capture_every == 0 {
            if let Some(handle) = pipeline.capture_and_recognize(&raw, &scheme) {
                debug!("frame {} captured as request {}", frame.sequence, handle.id());
                pending.push_back((frame.sequence, handle));
            }
        }

        // Results arrive in submission order; report the ready prefix
        while let Some((sequence, handle)) = pending.front_mut() {
            match handle.try_result() {
                Some(result) => {
                    print_result(Some(*sequence), &result);
                    pending.pop_front();
                }
                None => break,
            }
        }

        if let Some(remaining) = frame_interval.checked_sub(started.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    if !pending.is_empty() {
        info!("waiting for {} pending OCR results", pending.len());
    }
    for (sequence, handle) in pending {
        print_result(Some(sequence), &handle.wait());
    }

    let stats = pipeline.worker().stats();
    pipeline.shutdown();

    info!(
        "rendered {} frames, skipped {}; OCR submitted {}, completed {}, failed {}, rejected {}",
        rendered_count, skipped_count, stats.submitted, stats.completed, stats.failed, stats.rejected
    );
    Ok(())
}
