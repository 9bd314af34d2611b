//! Coin Counter CLI
//!
//! Drives the capture lifecycle from the command line: pump a camera
//! (synthetic by default) or run detection on a single image.

use clap::{Parser, Subcommand};
use coin_counter::{
    capture::{FileConfig, ImageFileDecoder, MediaSource, SyntheticCamera},
    lifecycle::{CaptureCoordinator, Collaborators, FramePump},
    metrics::{MetricsRegistry, MetricsSnapshot},
    processing::FrameProcessor,
    runtime::{bring_up_reporting, SoftwareRuntime},
    sink::TracingSink,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "coin-counter", version, about = "Count coins from a camera or an image")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the camera loop.
    Camera {
        /// Frames to process before stopping (0 runs until Ctrl-C).
        #[arg(long)]
        frames: Option<u32>,

        /// Seed for the synthetic camera.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Use a real camera device instead of the synthetic one.
        #[cfg(feature = "camera")]
        #[arg(long)]
        device: bool,
    },
    /// Detect coins in one image file.
    Image {
        path: PathBuf,
    },
}

enum MetricsOutput {
    Local(MetricsRegistry),
    #[cfg(feature = "metrics")]
    Served(coin_counter::metrics::SharedMetrics),
}

impl MetricsOutput {
    fn new(port: u16) -> Option<Self> {
        let registry = match MetricsRegistry::new() {
            Ok(registry) => registry,
            Err(e) => {
                warn!("Metrics disabled: {}", e);
                return None;
            }
        };

        #[cfg(feature = "metrics")]
        if port != 0 {
            use coin_counter::metrics::{MetricsServer, MetricsServerConfig};

            let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry);
            let state = server.state();
            let spawned = std::thread::Builder::new()
                .name("metrics-server".into())
                .spawn(move || match tokio::runtime::Runtime::new() {
                    Ok(rt) => {
                        if let Err(e) = rt.block_on(server.run()) {
                            warn!("Metrics server stopped: {}", e);
                        }
                    }
                    Err(e) => warn!("Failed to start metrics runtime: {}", e),
                });
            if let Err(e) = spawned {
                warn!("Failed to spawn metrics thread: {}", e);
            }
            return Some(MetricsOutput::Served(state));
        }

        #[cfg(not(feature = "metrics"))]
        let _ = port;

        Some(MetricsOutput::Local(registry))
    }

    fn update(&self, snapshot: &MetricsSnapshot) {
        match self {
            MetricsOutput::Local(registry) => registry.update(snapshot),
            #[cfg(feature = "metrics")]
            MetricsOutput::Served(state) => state.blocking_write().update(snapshot),
        }
    }

    fn dump(&self) {
        match self {
            MetricsOutput::Local(registry) => match registry.encode() {
                Ok(text) => tracing::debug!("Final metrics:\n{}", text),
                Err(e) => warn!("Failed to encode metrics: {}", e),
            },
            #[cfg(feature = "metrics")]
            MetricsOutput::Served(_) => {}
        }
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .init();

    info!("Coin Counter v{}", coin_counter::VERSION);

    let config = match &cli.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };

    let mut runtime = SoftwareRuntime::new();
    if bring_up_reporting(&mut runtime, &mut TracingSink).is_err() {
        warn!("Continuing without a ready runtime; captures will be refused");
    }

    let media: Box<dyn MediaSource> = match &cli.command {
        #[cfg(feature = "camera")]
        Command::Camera { device: true, .. } => Box::new(coin_counter::capture::NokhwaCamera::new()),
        Command::Camera { seed, .. } => Box::new(SyntheticCamera::yen_scene(
            *seed,
            config.coins.pixels_per_mm,
        )),
        Command::Image { .. } => Box::new(SyntheticCamera::new(0)),
    };

    let pump = FramePump::new();
    let mut coordinator = CaptureCoordinator::new(
        Collaborators {
            runtime: Box::new(runtime),
            media,
            decoder: Box::new(ImageFileDecoder::new()),
            scheduler: Box::new(pump.clone()),
            sink: Box::new(TracingSink),
        },
        config.capture.clone(),
        FrameProcessor::new(config.processing.clone(), config.coins.clone()),
    );
    let metrics = MetricsOutput::new(config.output.metrics_port);

    let outcome = match cli.command {
        Command::Camera { frames, .. } => {
            let frame_count = frames.unwrap_or(config.output.frame_count);
            run_camera(&mut coordinator, &pump, frame_count, config.capture.fps, &metrics)
        }
        Command::Image { path } => coordinator.load_image(path),
    };

    if let Some(metrics) = &metrics {
        metrics.update(&MetricsSnapshot::from_coordinator(&coordinator));
        metrics.dump();
    }

    let stats = coordinator.stats();
    info!(
        "Processed {} frames: {} failed, {} stale ticks",
        stats.frames_processed, stats.frames_failed, stats.stale_ticks
    );

    match outcome {
        Ok(()) => {
            if let Some(total) = stats.last_total {
                println!("Total: {}", total);
            }
        }
        Err(e) => {
            eprintln!("{}", e.status_message().text);
            std::process::exit(1);
        }
    }
}

fn run_camera(
    coordinator: &mut CaptureCoordinator,
    pump: &FramePump,
    frame_count: u32,
    fps: u32,
    metrics: &Option<MetricsOutput>,
) -> Result<(), coin_counter::CaptureError> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst)) {
        warn!("Ctrl-C handler unavailable: {}", e);
    }

    coordinator.start_camera()?;

    let interval = Duration::from_millis(1000 / u64::from(fps.max(1)));
    let mut ticks = 0u32;
    while running.load(Ordering::SeqCst) && (frame_count == 0 || ticks < frame_count) {
        pump.tick();
        for ticket in pump.drain() {
            coordinator.on_frame(ticket);
        }
        ticks += 1;

        if let Some(metrics) = metrics {
            metrics.update(&MetricsSnapshot::from_coordinator(coordinator));
        }
        std::thread::sleep(interval);
    }

    coordinator.stop()
}
