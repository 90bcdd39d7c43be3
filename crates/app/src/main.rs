use std::{
    io::{self, BufRead},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use clap::{Args, Parser, Subcommand};
use lightsync_core::{AppConfig, Pipeline, TransportWorker, WindowKind};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "live")]
mod capture;
mod display;
mod offline;

fn main() -> lightsync_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Live {
            settings,
            device,
            duration,
        } => {
            let mut config = settings.resolve()?;
            if device.is_some() {
                config.audio.device = device;
            }
            run_live(config, duration.map(Duration::from_secs_f64))
        }
        Commands::Analyze {
            settings,
            input,
            output,
            realtime,
        } => {
            let config = settings.resolve()?;
            run_analyze(config, &input, output.as_ref(), realtime)
        }
        Commands::Devices => list_devices(),
    }
}

#[cfg(feature = "live")]
fn run_live(config: AppConfig, duration: Option<Duration>) -> lightsync_core::Result<()> {
    let pipeline = Pipeline::new(&config)?;
    let render = pipeline.render_handle();
    let mut transport = TransportWorker::serial(&config.transport)?;

    let stream = capture::start(&config.audio, pipeline, transport.sender())?;
    tracing::info!("capture running; press Enter to stop");

    let stop = Arc::new(AtomicBool::new(false));
    let display = config
        .render
        .enabled
        .then(|| {
            display::spawn(
                render,
                &config.render,
                config.analysis.quantization_ceiling,
                stop.clone(),
            )
        })
        .transpose()?;

    wait_for_stop(duration)?;

    stop.store(true, Ordering::Relaxed);
    if let Some(display) = display {
        if display.join().is_err() {
            tracing::warn!("display thread panicked");
        }
    }

    // Capture first: dropping the stream drops the callback and its sender,
    // which lets the transport worker drain and close the port.
    drop(stream);
    transport.shutdown();
    tracing::info!("stopped");
    Ok(())
}

#[cfg(not(feature = "live"))]
fn run_live(_config: AppConfig, _duration: Option<Duration>) -> lightsync_core::Result<()> {
    Err(lightsync_core::LightSyncError::config(
        "this build has no microphone support; rebuild with `--features live`",
    ))
}

fn run_analyze(
    mut config: AppConfig,
    input: &PathBuf,
    output: Option<&PathBuf>,
    realtime: bool,
) -> lightsync_core::Result<()> {
    tracing::info!(?input, ?output, realtime, "analysing file");

    let source = offline::WavSource::open(input)?;
    source.apply_format(&mut config.audio);
    let mut pipeline = Pipeline::new(&config)?;
    let mut transport = TransportWorker::serial(&config.transport)?;
    let sender = transport.sender();

    // The display shares stdout with the records, so it only runs when the
    // records go to a file.
    let stop = Arc::new(AtomicBool::new(false));
    let display = (realtime && output.is_some() && config.render.enabled)
        .then(|| {
            display::spawn(
                pipeline.render_handle(),
                &config.render,
                config.analysis.quantization_ceiling,
                stop.clone(),
            )
        })
        .transpose()?;

    let result = match output {
        Some(path) => {
            let mut file = io::BufWriter::new(std::fs::File::create(path)?);
            offline::analyze(source, &mut pipeline, &mut file, sender.as_ref(), realtime)
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            offline::analyze(source, &mut pipeline, &mut lock, sender.as_ref(), realtime)
        }
    };
    drop(sender);

    stop.store(true, Ordering::Relaxed);
    if let Some(display) = display {
        if display.join().is_err() {
            tracing::warn!("display thread panicked");
        }
    }

    let stats = transport.shutdown();
    let summary = result?;
    tracing::info!(
        blocks = summary.blocks,
        beats = summary.beats,
        discarded_tail = summary.discarded_samples,
        frames_sent = stats.sent,
        "analysis finished"
    );
    Ok(())
}

#[cfg(feature = "live")]
fn list_devices() -> lightsync_core::Result<()> {
    for device in capture::input_device_names()? {
        println!("{device}");
    }
    Ok(())
}

#[cfg(not(feature = "live"))]
fn list_devices() -> lightsync_core::Result<()> {
    Err(lightsync_core::LightSyncError::config(
        "this build has no microphone support; rebuild with `--features live`",
    ))
}

#[cfg_attr(not(feature = "live"), allow(dead_code))]
fn wait_for_stop(duration: Option<Duration>) -> lightsync_core::Result<()> {
    match duration {
        Some(duration) => std::thread::sleep(duration),
        None => {
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
        }
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive serial lighting from live audio", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyse the microphone and stream control frames to the controller.
    Live {
        #[command(flatten)]
        settings: Settings,
        /// Input device name; defaults to the system input.
        #[arg(short, long)]
        device: Option<String>,
        /// Stop after this many seconds instead of waiting for Enter.
        #[arg(long)]
        duration: Option<f64>,
    },
    /// Run a WAV file through the pipeline and print one JSON record per block.
    Analyze {
        #[command(flatten)]
        settings: Settings,
        /// WAV file to analyse.
        input: PathBuf,
        /// Write records here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Pace blocks at the file's sample rate.
        #[arg(long)]
        realtime: bool,
    },
    /// List audio input devices.
    Devices,
}

/// Startup configuration: an optional JSON file plus per-field overrides.
#[derive(Args, Debug)]
struct Settings {
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Serial port of the lighting controller.
    #[arg(short, long)]
    port: Option<String>,
    /// Run without a lighting controller.
    #[arg(long, conflicts_with = "port")]
    no_port: bool,
    #[arg(long)]
    baud: Option<u32>,
    #[arg(long)]
    sample_rate: Option<u32>,
    #[arg(long)]
    block_size: Option<usize>,
    #[arg(long)]
    channels: Option<usize>,
    /// Apply a Hann window before the transform.
    #[arg(long)]
    hann: bool,
    /// Disable the terminal spectrum display.
    #[arg(long)]
    no_display: bool,
}

impl Settings {
    fn resolve(self) -> lightsync_core::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_json_file(path)?,
            None => AppConfig::default(),
        };

        if self.port.is_some() {
            config.transport.port = self.port;
        }
        if self.no_port {
            config.transport.port = None;
        }
        if let Some(baud) = self.baud {
            config.transport.baud_rate = baud;
        }
        if let Some(sample_rate) = self.sample_rate {
            config.audio.sample_rate = sample_rate;
        }
        if let Some(block_size) = self.block_size {
            config.audio.block_size = block_size;
        }
        if let Some(channels) = self.channels {
            config.audio.channels = channels;
        }
        if self.hann {
            config.analysis.window = WindowKind::Hann;
        }
        if self.no_display {
            config.render.enabled = false;
        }

        config.validate()?;
        Ok(config)
    }
}
