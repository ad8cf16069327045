//! bwt-bridge: Serial bridge for the Braille writing tablet emulator.
//!
//! Opens the configured endpoint, performs the handshake, then tracks
//! incoming presses until interrupted. On shutdown the committed input
//! is dumped through the braille glyph table.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::{error, info};

use bwt_protocol::wire::BAUD_RATE;

use bwt_bridge::config::{self, BridgeSettings, ConfigFile};
use bwt_bridge::handler::{ActionHandler, SerialBridge};
use bwt_bridge::handshake::HandshakeState;
use bwt_bridge::logging;

/// bwt-bridge - Serial bridge for the Braille writing tablet
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Endpoint kind: "device" or "tcp"
    #[arg(short, long)]
    mode: Option<String>,

    /// Path to the serial device node
    #[arg(short, long)]
    device: Option<String>,

    /// Address of the virtual USB bridge
    #[arg(short, long)]
    tcp_addr: Option<String>,

    /// Number of board cells
    #[arg(long)]
    cells: Option<usize>,

    /// Debounce window in milliseconds
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Abort a handshake after this many milliseconds (off by default)
    #[arg(long)]
    handshake_timeout_ms: Option<u64>,

    /// Configuration file path
    #[arg(short = 'f', long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory where log files are stored
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Number of days to keep log files
    #[arg(long, default_value = "7")]
    log_retention_days: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load config file: explicit path > auto-detect > default
    let config_path = args.config.clone().or_else(|| {
        let default_path = PathBuf::from("bwt-bridge.toml");
        if default_path.exists() {
            Some(default_path)
        } else {
            None
        }
    });
    let file_config = if let Some(config_path) = &config_path {
        match config::load_config(config_path) {
            Ok(c) => {
                eprintln!("Loaded config from: {}", config_path.display());
                c
            }
            Err(e) => {
                eprintln!("Failed to load config file: {}", e);
                return Err(e);
            }
        }
    } else {
        ConfigFile::default()
    };

    // Merge logging configs (command line takes precedence)
    let log_dir = if args.log_dir.to_string_lossy() != "logs" {
        args.log_dir.clone()
    } else {
        PathBuf::from(file_config.logging.log_dir.as_deref().unwrap_or("logs"))
    };
    let log_retention_days = if args.log_retention_days != 7 {
        args.log_retention_days
    } else {
        file_config.logging.retention_days.unwrap_or(7)
    };
    let log_level = file_config.logging.level.as_deref();
    logging::init_logging(&log_dir, log_retention_days, args.verbose, log_level)
        .expect("Failed to initialize logging");

    // Merge session settings (command line takes precedence)
    let mut settings = BridgeSettings::with_sections(&file_config.board, &file_config.timing);
    if let Some(cells) = args.cells {
        settings.cell_count = cells;
    }
    if let Some(ms) = args.debounce_ms {
        settings.debounce_window = Duration::from_millis(ms);
    }
    if let Some(ms) = args.handshake_timeout_ms {
        settings.handshake_timeout = Some(Duration::from_millis(ms));
    }

    let mode = args
        .mode
        .or(file_config.port.mode)
        .unwrap_or_else(|| "device".to_string());
    let device = args.device.or(file_config.port.device);
    let tcp_addr = args.tcp_addr.or(file_config.port.tcp_addr);
    let endpoint = config::endpoint_from(&mode, device.as_deref(), tcp_addr.as_deref())?;

    info!("bwt-bridge starting...");
    info!("  Endpoint: {:?}", endpoint);
    info!("  Line rate: {} baud 8N1, set up by the platform driver", BAUD_RATE);
    info!("  Board cells: {}", settings.cell_count);
    info!("  Debounce window: {:?}", settings.debounce_window);

    let mut bridge = SerialBridge::new(endpoint, settings);
    bridge.init_serial_comm().await?;
    bridge.handle_button_code("init").await?;

    match bridge.wait_handshake().await? {
        HandshakeState::Complete => info!("Handshake complete, tracking input"),
        state => {
            error!("Handshake did not complete (state: {:?}), exiting", state);
            bridge.stop().await;
            return Err("handshake failed".into());
        }
    }
    bridge.start_tracking().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    let committed = bridge.stop_tracking().await?;
    if !committed.is_empty() {
        info!("Committed input: {:?}", committed);
    }
    bridge.stop().await;

    Ok(())
}
