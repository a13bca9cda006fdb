// webradio -- run the web radio appliance on a host, or drive its tuner
// from the command line.
//
// Usage:
//   webradio serve
//   webradio --web-root src/web --control-port 8080 --slots 4 serve
//   webradio --wav sample.wav serve
//   webradio scan fm
//   webradio tune am 1010
//
// On a host the tuner is a simulated Si4730 with a fixed station table;
// the audio stream is a test tone or a looping WAV file.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use webradio_audio::{Capture, DEFAULT_CHUNK_SAMPLES, PoolConfig, ToneCapture, WavFileCapture};
use webradio_core::{Band, format_fm_mhz, station_name};
use webradio_server::{HostNetwork, ServerConfig, Supervisor, TracingLed};
use webradio_si4730::{Si4730, Si4730Builder};
use webradio_test_harness::SimulatedTuner;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Network-attached AM/FM radio.
#[derive(Parser)]
#[command(name = "webradio", version, about)]
struct Cli {
    /// Directory holding index.html, the app scripts and stations.xml.
    #[arg(long, default_value = "www")]
    web_root: PathBuf,

    /// Address both servers listen on.
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Audio stream port.
    #[arg(long, default_value_t = 1234)]
    audio_port: u16,

    /// Control (web app) port.
    #[arg(long, default_value_t = 80)]
    control_port: u16,

    /// Maximum concurrent audio listeners.
    #[arg(long, default_value_t = 1)]
    slots: usize,

    /// Stream this WAV file in a loop instead of a test tone.
    #[arg(long)]
    wav: Option<PathBuf>,

    /// Log at debug level (RUST_LOG overrides).
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the audio and control servers until Ctrl-C.
    Serve,

    /// Scan a band and list the stations found.
    Scan {
        /// am or fm.
        band: Band,
    },

    /// Tune to a frequency and print the signal report.
    Tune {
        /// am or fm.
        band: Band,
        /// kHz for AM, 10 kHz units for FM (9990 = 99.9 MHz).
        freq: u32,
    },
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn create_radio() -> Result<Si4730> {
    Si4730Builder::new()
        .build(SimulatedTuner::demo())
        .await
        .context("tuner reset failed")
}

fn create_capture(cli: &Cli) -> Result<Box<dyn Capture>> {
    Ok(match &cli.wav {
        Some(path) => Box::new(
            WavFileCapture::open(path, DEFAULT_CHUNK_SAMPLES)
                .with_context(|| format!("cannot open {}", path.display()))?,
        ),
        None => Box::new(ToneCapture::default()),
    })
}

fn server_config(cli: &Cli) -> Result<ServerConfig> {
    if cli.slots == 0 {
        bail!("--slots must be at least 1");
    }
    Ok(ServerConfig {
        bind: cli.bind,
        audio_port: cli.audio_port,
        control_port: cli.control_port,
        web_root: cli.web_root.clone(),
        pool: PoolConfig {
            slots: cli.slots,
            ..PoolConfig::default()
        },
        ..ServerConfig::default()
    })
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_serve(cli: &Cli) -> Result<()> {
    let config = server_config(cli)?;
    let capture = create_capture(cli)?;
    let radio = create_radio().await?;
    let supervisor = Supervisor::new(config, HostNetwork::new(cli.bind), TracingLed::default());
    supervisor
        .run(radio, capture, CancellationToken::new())
        .await
        .context("web radio stopped with an error")?;
    Ok(())
}

async fn cmd_scan(band: Band) -> Result<()> {
    let mut radio = create_radio().await?;
    let channels = radio
        .scan(band)
        .await
        .with_context(|| format!("{band} scan failed"))?;
    info!(%band, count = channels.len(), "scan finished");
    for freq in channels {
        println!("{:>10}  tune/{}/{}", station_name(band, freq), band.path_segment(), freq);
    }
    Ok(())
}

async fn cmd_tune(band: Band, freq: u32) -> Result<()> {
    let mut radio = create_radio().await?;
    let status = radio
        .tune(band, freq)
        .await
        .with_context(|| format!("cannot tune {band} {freq}"))?;
    let shown = match band {
        Band::Fm => format!("{} MHz", u16::try_from(freq).map(format_fm_mhz).unwrap_or_default()),
        Band::Am => format!("{freq} kHz"),
    };
    println!(
        "{shown}: {} (RSSI {} dBuV, SNR {} dB)",
        if status.valid { "station" } else { "no station" },
        status.rssi,
        status.snr
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Command::Serve => cmd_serve(&cli).await,
        Command::Scan { band } => cmd_scan(*band).await,
        Command::Tune { band, freq } => cmd_tune(*band, *freq).await,
    }
}
