//! Configuration file format and resolved runtime settings.
//!
//! The TOML file is optional; every field has a default taken from the
//! wire constants, and command line arguments take precedence over the
//! file. Merging happens in `main`, this module only defines the shapes.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use bwt_protocol::wire::DEFAULT_CELL_COUNT;
use bwt_protocol::{DEBOUNCE_WINDOW, FILLER_INTERVAL};

use crate::channel::Endpoint;
use crate::error::BridgeError;

/// Configuration file format.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub port: PortSection,
    #[serde(default)]
    pub board: BoardSection,
    #[serde(default)]
    pub timing: TimingSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct PortSection {
    /// "device" or "tcp".
    pub mode: Option<String>,
    pub device: Option<String>,
    pub tcp_addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct BoardSection {
    pub cells: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TimingSection {
    pub debounce_ms: Option<u64>,
    pub filler_interval_ms: Option<u64>,
    /// Unset means the handshake blocks until the sentinel arrives,
    /// matching the original device software.
    pub handshake_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LoggingSection {
    pub log_dir: Option<String>,
    pub retention_days: Option<u64>,
    pub level: Option<String>,
}

pub fn load_config(path: &Path) -> Result<ConfigFile, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: ConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Pick the endpoint kind from the merged mode/target values.
pub fn endpoint_from(
    mode: &str,
    device: Option<&str>,
    tcp_addr: Option<&str>,
) -> Result<Endpoint, BridgeError> {
    match mode {
        "device" => match device {
            Some(path) => Ok(Endpoint::Device(path.into())),
            None => Err(BridgeError::UnrecognizedChannel(
                "device mode requires a device path".into(),
            )),
        },
        "tcp" => match tcp_addr {
            Some(addr) => Ok(Endpoint::Tcp(addr.into())),
            None => Err(BridgeError::UnrecognizedChannel(
                "tcp mode requires an address".into(),
            )),
        },
        other => Err(BridgeError::UnrecognizedChannel(other.into())),
    }
}

/// Per-session runtime settings after CLI/file merging.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub cell_count: usize,
    pub debounce_window: Duration,
    pub filler_interval: Duration,
    pub handshake_timeout: Option<Duration>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            cell_count: DEFAULT_CELL_COUNT,
            debounce_window: DEBOUNCE_WINDOW,
            filler_interval: FILLER_INTERVAL,
            handshake_timeout: None,
        }
    }
}

impl BridgeSettings {
    /// Apply the `[board]` and `[timing]` sections on top of the
    /// defaults.
    pub fn with_sections(board: &BoardSection, timing: &TimingSection) -> Self {
        let defaults = Self::default();
        Self {
            cell_count: board.cells.unwrap_or(defaults.cell_count),
            debounce_window: timing
                .debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.debounce_window),
            filler_interval: timing
                .filler_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.filler_interval),
            handshake_timeout: timing.handshake_timeout_ms.map(Duration::from_millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: ConfigFile = toml::from_str(
            r#"
            [port]
            mode = "tcp"
            tcp_addr = "127.0.0.1:4000"

            [board]
            cells = 17

            [timing]
            debounce_ms = 250
            handshake_timeout_ms = 5000

            [logging]
            log_dir = "/var/log/bwt"
            retention_days = 14
            "#,
        )
        .unwrap();

        assert_eq!(config.port.mode.as_deref(), Some("tcp"));
        let settings = BridgeSettings::with_sections(&config.board, &config.timing);
        assert_eq!(settings.cell_count, 17);
        assert_eq!(settings.debounce_window, Duration::from_millis(250));
        assert_eq!(settings.filler_interval, FILLER_INTERVAL);
        assert_eq!(
            settings.handshake_timeout,
            Some(Duration::from_millis(5000))
        );
    }

    #[test]
    fn test_empty_config_gives_defaults() {
        let config: ConfigFile = toml::from_str("").unwrap();
        let settings = BridgeSettings::with_sections(&config.board, &config.timing);
        assert_eq!(settings.cell_count, DEFAULT_CELL_COUNT);
        assert_eq!(settings.debounce_window, DEBOUNCE_WINDOW);
        assert_eq!(settings.handshake_timeout, None);
    }

    #[test]
    fn test_endpoint_selection() {
        assert!(matches!(
            endpoint_from("device", Some("/dev/ttyUSB0"), None),
            Ok(Endpoint::Device(_))
        ));
        assert!(matches!(
            endpoint_from("tcp", None, Some("127.0.0.1:4000")),
            Ok(Endpoint::Tcp(_))
        ));
        assert!(matches!(
            endpoint_from("tcp", None, None),
            Err(BridgeError::UnrecognizedChannel(_))
        ));
        assert!(matches!(
            endpoint_from("parallel", None, None),
            Err(BridgeError::UnrecognizedChannel(_))
        ));
    }
}
