//! Pi Camera Station binary.
//!
//! Starts the background capture loop and the snapshot/sensor web server.

use clap::{Args, Parser, Subcommand};
use picam_server::{
    start_web_server, AppState, CameraConfig, ClimateProbe, CpuAdapters, FrameBuffer, NullProbe,
    Snapshotter, WebConfig, DEFAULT_DHT_PIN, DEFAULT_FRAMERATE, DEFAULT_FRAME_HEIGHT,
    DEFAULT_FRAME_WIDTH, DEFAULT_JPEG_QUALITY, DEFAULT_WEB_PORT,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[cfg(feature = "camera")]
use picam_server::{V4l2Source, VideoStream};
#[cfg(feature = "camera")]
use std::time::Duration;

#[derive(Parser)]
#[command(name = "picam_server")]
#[command(about = "📷 Pi Camera Station - camera and environment snapshot server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Web server bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Web server port
    #[arg(short, long, default_value_t = DEFAULT_WEB_PORT)]
    port: u16,

    /// Video device path
    #[arg(long, default_value = "/dev/video0")]
    device: String,

    /// Capture width in pixels
    #[arg(long, default_value_t = DEFAULT_FRAME_WIDTH)]
    width: u32,

    /// Capture height in pixels
    #[arg(long, default_value_t = DEFAULT_FRAME_HEIGHT)]
    height: u32,

    /// Capture frame rate
    #[arg(short, long, default_value_t = DEFAULT_FRAMERATE)]
    framerate: u32,

    /// JPEG quality for snapshots (1-100)
    #[arg(short, long, default_value_t = DEFAULT_JPEG_QUALITY)]
    quality: u8,

    /// Flip the image horizontally
    #[arg(long)]
    hflip: bool,

    /// Flip the image vertically
    #[arg(long)]
    vflip: bool,

    /// Rotate the image (0, 90, 180, 270 degrees)
    #[arg(long, default_value_t = 0)]
    rotation: u16,

    /// BCM pin of the DHT22 climate sensor
    #[arg(long, default_value_t = DEFAULT_DHT_PIN)]
    dht_pin: u8,

    /// Write each encoded snapshot to this path (best-effort debug aid)
    #[arg(long, num_args = 0..=1, default_missing_value = "tmp.jpg")]
    debug_image: Option<PathBuf>,

    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the capture loop and web server (default)
    Serve,

    /// Capture a single snapshot, write it to a file and exit
    Snapshot(SnapshotArgs),

    /// Print current CPU and climate readings
    Info,
}

#[derive(Args)]
struct SnapshotArgs {
    /// Output file
    #[arg(short, long, default_value = "snapshot.jpg")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;
    print_banner();

    match &cli.command {
        Some(Commands::Serve) | None => serve_command(&cli).await,
        Some(Commands::Snapshot(args)) => snapshot_command(&cli, args).await,
        Some(Commands::Info) => info_command(&cli),
    }
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn print_banner() {
    println!("📷 Pi Camera Station");
    println!("   Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
}

fn camera_config(cli: &Cli) -> CameraConfig {
    CameraConfig::new(cli.width, cli.height, cli.framerate)
        .with_device(&cli.device)
        .with_flip(cli.hflip, cli.vflip)
        .with_rotation(cli.rotation)
}

fn build_climate_probe(_dht_pin: u8) -> Box<dyn ClimateProbe> {
    #[cfg(feature = "gpio")]
    {
        match picam_server::Dht22Probe::new(_dht_pin) {
            Ok(probe) => {
                info!(pin = _dht_pin, "DHT22 climate sensor initialized");
                return Box::new(probe);
            }
            Err(e) => {
                tracing::warn!(error = %e, "DHT22 init failed, continuing without climate sensor");
            }
        }
    }
    #[cfg(not(feature = "gpio"))]
    info!("GPIO support not compiled, climate sensor disabled");

    Box::new(NullProbe)
}

async fn serve_command(cli: &Cli) -> anyhow::Result<()> {
    let config = camera_config(cli);
    config.validate()?;

    let buffer = FrameBuffer::new();

    // The camera opens before anything else: an open failure here is fatal
    // and nothing needs cleanup yet.
    #[cfg(feature = "camera")]
    let stream = {
        let source = V4l2Source::open(&config)?;
        VideoStream::start(source, buffer.clone())?
    };
    #[cfg(not(feature = "camera"))]
    tracing::warn!("built without the camera feature; image endpoints will report not ready");

    let snapshotter =
        Snapshotter::new(buffer, cli.quality).with_debug_path(cli.debug_image.clone());
    let probe = build_climate_probe(cli.dht_pin);
    let state = Arc::new(AppState::new(snapshotter, probe, CpuAdapters::default()));

    let web_config = WebConfig::new(&cli.host, cli.port).with_cors(!cli.no_cors);

    info!(
        "serving {}x{} @ {} fps on {}",
        config.width,
        config.height,
        config.framerate,
        web_config.bind_address()
    );

    // Serves until ctrl-c
    let served = start_web_server(web_config, state).await;

    // Teardown order: stop the camera first, then let the probe (and its
    // GPIO pin) drop with the state. Best-effort: if the capture thread is
    // mid-read the OS reclaims the handle on exit.
    #[cfg(feature = "camera")]
    {
        stream.stop();
        let released =
            tokio::task::spawn_blocking(move || stream.shutdown(Duration::from_secs(2)))
                .await
                .unwrap_or(false);
        if released {
            info!("camera released");
        }
    }

    served?;
    Ok(())
}

#[cfg(feature = "camera")]
async fn snapshot_command(cli: &Cli, args: &SnapshotArgs) -> anyhow::Result<()> {
    let config = camera_config(cli);
    let source = V4l2Source::open(&config)?;

    let buffer = FrameBuffer::new();
    let stream = VideoStream::start(source, buffer.clone())?;

    // Give the camera a moment to deliver its first frame
    let deadline = std::time::Instant::now() + Duration::from_secs(3);
    while !buffer.has_frame() && std::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let snapshotter = Snapshotter::new(buffer, cli.quality);
    let result = snapshotter.encode_jpeg();

    tokio::task::spawn_blocking(move || stream.shutdown(Duration::from_secs(2)))
        .await
        .ok();

    let jpeg = result?;
    std::fs::write(&args.output, &jpeg)?;
    println!("wrote {} bytes to {}", jpeg.len(), args.output.display());
    Ok(())
}

#[cfg(not(feature = "camera"))]
async fn snapshot_command(_cli: &Cli, _args: &SnapshotArgs) -> anyhow::Result<()> {
    anyhow::bail!("the snapshot command requires building with the `camera` feature")
}

fn info_command(cli: &Cli) -> anyhow::Result<()> {
    println!("CPU:");
    match picam_server::sensors::read_cpu_clock() {
        Some(clock) => println!("  Clock: {:.1} MHz", clock),
        None => println!("  Clock: N/A"),
    }
    match picam_server::sensors::read_cpu_temp() {
        Some(temp) => println!("  Temperature: {:.1}°C", temp),
        None => println!("  Temperature: N/A"),
    }

    println!();
    println!("Room climate:");
    let mut probe = build_climate_probe(cli.dht_pin);
    match probe.read() {
        Some(reading) => {
            println!("  Temperature: {:.1}°C", reading.temperature);
            println!("  Humidity: {:.1}%", reading.humidity);
        }
        None => {
            println!("  Temperature: N/A");
            println!("  Humidity: N/A");
        }
    }

    Ok(())
}
