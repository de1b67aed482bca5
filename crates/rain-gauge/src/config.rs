//! Gauge configuration using JSON file storage

use crate::error::GaugeError;
use crate::supervisor::DEFAULT_MAX_FAILED_PROBES;
use rs200_protocol::transport::{BAUD_RATE, DATA_BITS, STOP_BITS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

/// Environment variable overriding the serial port path
pub const PORT_ENV: &str = "RS200_PORT";

/// UART parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// Serial line parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSettings {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
}

impl Default for LineSettings {
    fn default() -> Self {
        Self {
            baud_rate: BAUD_RATE,
            data_bits: DATA_BITS,
            stop_bits: STOP_BITS,
            parity: Parity::None,
        }
    }
}

impl LineSettings {
    /// Deviations from what the RS200 expects. Reported, not enforced.
    #[must_use]
    pub fn mismatches(&self) -> Vec<String> {
        let mut found = Vec::new();
        if self.baud_rate != BAUD_RATE {
            found.push(format!(
                "baud rate is {}, expected {}",
                self.baud_rate, BAUD_RATE
            ));
        }
        if self.data_bits != DATA_BITS {
            found.push(format!(
                "data bits is {}, expected {}",
                self.data_bits, DATA_BITS
            ));
        }
        if self.stop_bits != STOP_BITS {
            found.push(format!(
                "stop bits is {}, expected {}",
                self.stop_bits, STOP_BITS
            ));
        }
        if self.parity != Parity::None {
            found.push(format!("parity is {:?}, expected None", self.parity));
        }
        found
    }
}

/// Runtime configuration for one RS200
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GaugeConfig {
    /// Serial device path
    pub serial_port: String,
    pub line: LineSettings,
    /// Minimum spacing between published realtime rain readings
    pub throttle_ms: u64,
    /// How often the rainfall status is requested once connected
    pub poll_interval_secs: u64,
    /// Period of the firmware version probe while unconnected
    pub reboot_interval_ms: u64,
    /// Unanswered probes tolerated before the device is declared failed
    pub max_failed_probes: u16,
}

impl Default for GaugeConfig {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyUSB0".to_string(),
            line: LineSettings::default(),
            throttle_ms: 450,
            poll_interval_secs: 60,
            reboot_interval_ms: 5000,
            max_failed_probes: DEFAULT_MAX_FAILED_PROBES,
        }
    }
}

impl GaugeConfig {
    /// Load configuration from a JSON file. A missing file yields defaults.
    #[allow(clippy::missing_errors_doc)]
    pub async fn load(path: &Path) -> Result<Self, GaugeError> {
        match fs::read_to_string(path).await {
            Ok(contents) => {
                let config = serde_json::from_str::<Self>(&contents)?;
                tracing::info!("Loaded configuration from {:?}", path);
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config file found at {:?}, using defaults", path);
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Apply overrides from the environment
    pub fn apply_env(&mut self) {
        if let Ok(port) = std::env::var(PORT_ENV) {
            self.serial_port = port;
        }
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn validate(&self) -> Result<(), GaugeError> {
        if self.serial_port.is_empty() {
            return Err(GaugeError::InvalidConfig("serial_port is empty".to_string()));
        }
        if self.poll_interval_secs == 0 {
            return Err(GaugeError::InvalidConfig(
                "poll_interval_secs must be positive".to_string(),
            ));
        }
        if self.reboot_interval_ms == 0 {
            return Err(GaugeError::InvalidConfig(
                "reboot_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub fn reboot_interval(&self) -> Duration {
        Duration::from_millis(self.reboot_interval_ms)
    }
}
