//! ringfinder CLI: detect rings in an image and print them as JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use ringfinder::{channels_from_image, DetectorKind, PipelineParams, RingPipeline, RunContext};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser, Debug)]
#[command(name = "ringfinder")]
#[command(about = "Detect rings of known thickness in every channel of an image")]
#[command(version)]
struct Cli {
    /// Path to the input image.
    image: PathBuf,

    /// JSON file with pipeline parameters; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the JSON result here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Smallest candidate radius in pixels.
    #[arg(long)]
    min_radius: Option<u32>,

    /// Largest candidate radius in pixels.
    #[arg(long)]
    max_radius: Option<u32>,

    /// Radius step in pixels.
    #[arg(long)]
    step_radius: Option<u32>,

    /// Ring thickness in pixels.
    #[arg(long)]
    thickness: Option<f64>,

    /// Score ceiling; weaker rings are dropped.
    #[arg(long)]
    sensitivity: Option<f64>,

    /// Multiplier on the automatic threshold.
    #[arg(long)]
    threshold_factor: Option<f64>,

    /// Detection strategy: scale-space or local-max.
    #[arg(long)]
    detector: Option<DetectorKind>,

    /// Keep at most this many rings per channel.
    #[arg(long)]
    max_detections: Option<usize>,

    /// Worker threads (0 = all cores).
    #[arg(long)]
    threads: Option<usize>,

    /// Skip tubeness enhancement and threshold the raw channel.
    #[arg(long)]
    no_enhance: bool,

    /// Print the effective parameters and exit.
    #[arg(long)]
    print_params: bool,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn params(&self) -> CliResult<PipelineParams> {
        let mut params = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| format!("failed to read config {}: {e}", path.display()))?;
                serde_json::from_str(&text)
                    .map_err(|e| format!("invalid config {}: {e}", path.display()))?
            }
            None => PipelineParams::default(),
        };
        if let Some(v) = self.min_radius {
            params.radii.min = v;
        }
        if let Some(v) = self.max_radius {
            params.radii.max = v;
        }
        if let Some(v) = self.step_radius {
            params.radii.step = v;
        }
        if let Some(v) = self.thickness {
            params.circle_thickness = v;
        }
        if let Some(v) = self.sensitivity {
            params.sensitivity = v;
        }
        if let Some(v) = self.threshold_factor {
            params.threshold.factor = v;
        }
        if let Some(v) = self.detector {
            params.detector = v;
        }
        if let Some(v) = self.max_detections {
            params.max_detections = Some(v);
        }
        if let Some(v) = self.threads {
            params.threads = v;
        }
        if self.no_enhance {
            params.enhance.enabled = false;
        }
        Ok(params)
    }
}

fn init_logging(verbose: u8) -> CliResult<()> {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    #[cfg(feature = "tracing")]
    {
        tracing_log::LogTracer::init()?;
        log::set_max_level(level);
        ringfinder::init_tracing(false);
    }
    #[cfg(not(feature = "tracing"))]
    ringfinder::init_with_level(level)?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> CliResult<()> {
    init_logging(cli.verbose)?;

    let params = cli.params()?;
    if cli.print_params {
        println!("{}", serde_json::to_string_pretty(&params)?);
        return Ok(());
    }
    let pipeline = RingPipeline::new(params)?;

    log::info!("loading image: {}", cli.image.display());
    let img = image::open(&cli.image)
        .map_err(|e| format!("failed to open image {}: {e}", cli.image.display()))?;
    let channels = channels_from_image(&img)?;

    let results = pipeline.run(&channels, &RunContext::new())?;
    let json = serde_json::to_string_pretty(&results)?;
    match &cli.out {
        Some(path) => {
            std::fs::write(path, &json)?;
            log::info!("results written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
