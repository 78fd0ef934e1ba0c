//! crystfind CLI
//!
//! Peak finding and streak masking for detector frames stored as text.
#![allow(clippy::cast_precision_loss)]

use clap::{ArgAction, Parser, Subcommand};
use crystfind_algorithms::{
    find_peaks, find_peaks_batch, find_peaks_with_streak_mask_batch, StreakMaskContext,
};
use crystfind_core::donut::donut_mask;
use crystfind_core::geometry::DetectorGeometry;
use crystfind_core::mask::MaskTag;
use crystfind_core::peak::{Peak, PeakFinderConfig};
use crystfind_core::streak::StreakMaskConfig;
use crystfind_geometry::PanelLayout;
use crystfind_io::{
    deploy_static_mask, read_frame_text, read_mask_text, unstack_panels, write_mask_text,
    PeakFileWriter, TextFrameSource,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    CrystfindIo(#[from] crystfind_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] crystfind_core::Error),

    #[error("Geometry error: {0}")]
    Geometry(#[from] crystfind_geometry::Error),

    #[error("Invalid config file: {0}")]
    Config(#[from] serde_json::Error),
}

/// Parameters loaded from `--config`. Missing sections keep their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RunConfig {
    peaks: PeakFinderConfig,
    streak: StreakMaskConfig,
}

impl RunConfig {
    fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                Ok(serde_json::from_str(&text)?)
            }
            None => Ok(Self::default()),
        }
    }
}

/// Peak finder overrides shared by the subcommands that find peaks.
#[derive(Debug, clap::Args)]
struct PeakArgs {
    /// h-maxima extinction height
    #[arg(long)]
    hvalue: Option<f64>,

    /// Minimum signal-to-noise ratio
    #[arg(long)]
    son_min: Option<f64>,

    /// Minimum integrated intensity
    #[arg(long)]
    atot_thr: Option<f64>,
}

impl PeakArgs {
    fn apply(&self, mut config: PeakFinderConfig) -> PeakFinderConfig {
        if let Some(hvalue) = self.hvalue {
            config.hvalue = hvalue;
        }
        if let Some(son_min) = self.son_min {
            config.son_min = son_min;
        }
        if let Some(atot_thr) = self.atot_thr {
            config.atot_thr = atot_thr;
        }
        config
    }
}

/// Bragg peak finding and streak masking for X-ray detector frames.
#[derive(Parser)]
#[command(name = "crystfind")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON file with `peaks` and `streak` parameter sections
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find peaks in 2D text frames
    Peaks {
        /// Input frame file(s)
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Mask file (non-zero = usable pixel)
        #[arg(short, long)]
        mask: Option<PathBuf>,

        /// Output CSV file; peaks are printed when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        peak_args: PeakArgs,
    },

    /// Compute streak masks for raw frames
    Streak {
        /// Input raw frame file(s), panels stacked vertically
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Panel layout JSON
        #[arg(short, long)]
        geometry: PathBuf,

        /// Directory for `streakMask{tag}.txt` files
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Mask file name tag; `$n` expands to the event number
        #[arg(long, default_value = "$n")]
        tag: String,
    },

    /// Streak-mask raw frames and find peaks on the result
    Process {
        /// Input raw frame file(s), panels stacked vertically
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Panel layout JSON
        #[arg(short, long)]
        geometry: PathBuf,

        /// Static mask file, panels stacked vertically
        #[arg(short, long)]
        mask: Option<PathBuf>,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,

        /// Deploy the static mask into this directory
        #[arg(long)]
        deploy_dir: Option<PathBuf>,

        /// Tag for deployed mask file names
        #[arg(long, default_value = "")]
        tag: String,

        #[command(flatten)]
        peak_args: PeakArgs,
    },

    /// Print a donut mask
    Donut {
        /// Window height
        #[arg(long, default_value = "13")]
        height: usize,

        /// Window width
        #[arg(long, default_value = "13")]
        width: usize,

        /// Outer radius
        #[arg(long, default_value = "6.0")]
        outer: f64,

        /// Inner radius
        #[arg(long, default_value = "3.0")]
        inner: f64,
    },

    /// Show statistics of a frame file
    Info {
        /// Input frame file
        input: PathBuf,

        /// Panel layout JSON; prints assembled geometry when given
        #[arg(short, long)]
        geometry: Option<PathBuf>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn print_peaks(label: &str, peaks: &[Peak]) {
    println!("{label}: {} peak(s)", peaks.len());
    if peaks.is_empty() {
        return;
    }
    println!(
        "{:>10} {:>10} {:>6} {:>12} {:>10}",
        "row", "col", "npix", "atot", "son"
    );
    for p in peaks {
        println!(
            "{:>10.2} {:>10.2} {:>6} {:>12.1} {:>10.2}",
            p.row, p.col, p.pixel_count, p.integrated_intensity, p.signal_to_noise
        );
    }
}

fn write_or_print(output: Option<&Path>, inputs: &[PathBuf], results: &[Vec<Peak>]) -> Result<()> {
    match output {
        Some(path) => {
            let mut writer = PeakFileWriter::create(path)?;
            for (event, peaks) in (0u64..).zip(results) {
                writer.write_event_peaks_csv(event, peaks)?;
            }
            writer.flush()?;
            let total: usize = results.iter().map(Vec::len).sum();
            println!("Wrote {total} peak(s) to {}", path.display());
        }
        None => {
            for (path, peaks) in inputs.iter().zip(results) {
                print_peaks(&path.display().to_string(), peaks);
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let run_config = RunConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Peaks {
            input,
            mask,
            output,
            peak_args,
        } => {
            let config = peak_args.apply(run_config.peaks);
            config.validate()?;
            let mask = mask.map(read_mask_text).transpose()?;

            let start = Instant::now();
            let results = if input.len() == 1 {
                let frame = read_frame_text(&input[0])?;
                vec![find_peaks(
                    frame.view(),
                    &config,
                    mask.as_ref().map(|m| m.view()),
                )?]
            } else {
                let frames = input
                    .iter()
                    .map(read_frame_text)
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                find_peaks_batch(&frames, &config, mask.as_ref().map(|m| m.view()))?
            };
            log::info!(
                "searched {} frame(s) in {:.2}s",
                input.len(),
                start.elapsed().as_secs_f64()
            );

            write_or_print(output.as_deref(), &input, &results)?;
        }

        Commands::Streak {
            input,
            geometry,
            output,
            tag,
        } => {
            let layout = PanelLayout::from_file(&geometry)?;
            let raw_shape = layout.raw_shape();
            let context = StreakMaskContext::create(layout, run_config.streak)?;
            if !context.is_usable() {
                println!("Geometry has no center; no streak masks computed");
                return Ok(());
            }

            let tag = MaskTag::new(tag);
            for (event, path) in (0u64..).zip(&input) {
                let source = TextFrameSource::new(path, raw_shape);
                let Some(mask) = context.streak_mask_from_source(&source)? else {
                    continue;
                };
                let masked = mask.iter().filter(|&&usable| !usable).count();
                println!("{}: {masked} pixel(s) masked", path.display());

                if let Some(dir) = &output {
                    let out = dir.join(tag.file_name("streakMask", event, "txt"));
                    write_mask_text(&out, mask.view())?;
                    log::info!("wrote {}", out.display());
                }
            }
        }

        Commands::Process {
            input,
            geometry,
            mask,
            output,
            deploy_dir,
            tag,
            peak_args,
        } => {
            let config = peak_args.apply(run_config.peaks);
            config.validate()?;
            let layout = PanelLayout::from_file(&geometry)?;
            let raw_shape = layout.raw_shape();
            let static_mask = mask
                .map(|path| -> Result<_> { Ok(unstack_panels(read_mask_text(path)?, raw_shape)?) })
                .transpose()?;

            if let (Some(dir), Some(mask)) = (&deploy_dir, &static_mask) {
                let written = deploy_static_mask(dir, mask.view(), &MaskTag::new(tag), 0)?;
                for path in written {
                    println!("Deployed {}", path.display());
                }
            }

            let context = StreakMaskContext::create(layout, run_config.streak)?;
            let frames = input
                .iter()
                .map(|path| -> Result<_> { Ok(unstack_panels(read_frame_text(path)?, raw_shape)?) })
                .collect::<Result<Vec<_>>>()?;

            let start = Instant::now();
            let results = find_peaks_with_streak_mask_batch(
                &frames,
                &context,
                static_mask.as_ref().map(|m| m.view()),
                &config,
            )?;
            log::info!(
                "processed {} frame(s) in {:.2}s",
                frames.len(),
                start.elapsed().as_secs_f64()
            );

            write_or_print(Some(&output), &input, &results)?;
        }

        Commands::Donut {
            height,
            width,
            outer,
            inner,
        } => {
            let donut = donut_mask(height, width, outer, inner, None);
            for row in donut.ring.rows() {
                let line: String = row.iter().map(|&v| if v { '#' } else { '.' }).collect();
                println!("{line}");
            }
            println!("{} pixel(s) in ring", donut.count());
        }

        Commands::Info { input, geometry } => {
            let frame = read_frame_text(&input)?;
            let (rows, cols) = frame.dim();
            println!("File: {}", input.display());
            println!("Shape: {rows} x {cols}");

            if !frame.is_empty() {
                let min = frame.iter().copied().fold(f64::INFINITY, f64::min);
                let max = frame.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let mean = frame.sum() / frame.len() as f64;
                println!("Range: {min} - {max}");
                println!("Mean: {mean:.3}");
            }

            if let Some(geometry) = geometry {
                let layout = PanelLayout::from_file(&geometry)?;
                let raw = layout.raw_shape();
                let (assembled_rows, assembled_cols) = layout.assembled_shape();
                println!(
                    "Panels: {} x ({} x {})",
                    raw.panels, raw.rows, raw.cols
                );
                println!("Assembled: {assembled_rows} x {assembled_cols}");
                match layout.center() {
                    Some((row, col)) => println!("Center: ({row}, {col})"),
                    None => println!("Center: none"),
                }
                if raw.flat_dim() != (rows, cols) {
                    println!(
                        "Warning: frame does not match layout ({} x {} expected)",
                        raw.panels * raw.rows,
                        raw.cols
                    );
                }
            }
        }
    }

    Ok(())
}
