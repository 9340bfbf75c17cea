//! Driver configuration.
//!
//! Every field has a default matching the controller's factory settings, so a
//! JSON file only needs to name what differs:
//!
//! ```json
//! { "serial": { "port": "/dev/ttyUSB1" }, "safe_slots": { "filter": 3 } }
//! ```

use std::path::Path;
use std::time::Duration;

use plc_protocol::{command::WHEEL_SLOT_MAX, DEFAULT_RX_CAPACITY};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{PlcError, PlcResult};

/// Serial line parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Serial port settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    /// 7 or 8
    pub data_bits: u8,
    pub parity: Parity,
    /// 1 or 2
    pub stop_bits: u8,
    /// Blocking read timeout of the reader thread
    pub read_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyS0".to_string(),
            baud_rate: 9600,
            data_bits: 7,
            parity: Parity::Even,
            stop_bits: 2,
            read_timeout_ms: 100,
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Longest accepted timer period: one day.
pub const MAX_TIMER_MS: u64 = 86_400_000;

/// Session timer periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// How long to wait for any response before giving up on the exchange
    pub response_timeout_ms: u64,
    /// Interval between status polls
    pub status_poll_ms: u64,
    /// Interval between unconditional command re-sends
    pub heartbeat_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: 5000,
            status_poll_ms: 200,
            heartbeat_ms: 60_000,
        }
    }
}

impl TimingConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn status_poll(&self) -> Duration {
        Duration::from_millis(self.status_poll_ms)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }
}

/// Wheel slots that leave the instrument in a safe configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SafeSlots {
    pub aperture: u8,
    pub filter: u8,
}

/// Complete driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlcConfig {
    pub serial: SerialConfig,
    pub timing: TimingConfig,
    /// Frame assembler receive buffer size in bytes
    pub rx_capacity: usize,
    pub safe_slots: SafeSlots,
}

impl Default for PlcConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            timing: TimingConfig::default(),
            rx_capacity: DEFAULT_RX_CAPACITY,
            safe_slots: SafeSlots::default(),
        }
    }
}

impl PlcConfig {
    /// Load and validate a JSON configuration file.
    pub fn load_from_file(path: &Path) -> PlcResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty-printed JSON.
    pub fn save_to_file(&self, path: &Path) -> PlcResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject settings the driver cannot run with.
    pub fn validate(&self) -> PlcResult<()> {
        if !matches!(self.serial.data_bits, 7 | 8) {
            return Err(PlcError::Config(format!(
                "data_bits must be 7 or 8, got {}",
                self.serial.data_bits
            )));
        }
        if !matches!(self.serial.stop_bits, 1 | 2) {
            return Err(PlcError::Config(format!(
                "stop_bits must be 1 or 2, got {}",
                self.serial.stop_bits
            )));
        }
        if self.rx_capacity < plc_protocol::frame::STATUS_RESPONSE_LEN {
            return Err(PlcError::Config(format!(
                "rx_capacity {} is smaller than a status response",
                self.rx_capacity
            )));
        }
        let timing = &self.timing;
        if timing.response_timeout_ms == 0 || timing.status_poll_ms == 0 || timing.heartbeat_ms == 0
        {
            return Err(PlcError::Config("timer periods must be non-zero".into()));
        }
        let longest = timing
            .response_timeout_ms
            .max(timing.status_poll_ms)
            .max(timing.heartbeat_ms);
        if longest > MAX_TIMER_MS {
            return Err(PlcError::Config(format!(
                "timer periods must be at most {MAX_TIMER_MS} ms, got {longest}"
            )));
        }
        if self.safe_slots.aperture > WHEEL_SLOT_MAX || self.safe_slots.filter > WHEEL_SLOT_MAX {
            return Err(PlcError::Config(format!(
                "safe slots must be 0..={WHEEL_SLOT_MAX}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_defaults() {
        let config = PlcConfig::default();
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.parity, Parity::Even);
        assert_eq!(config.timing.response_timeout(), Duration::from_secs(5));
        assert_eq!(config.timing.status_poll(), Duration::from_millis(200));
        assert_eq!(config.timing.heartbeat(), Duration::from_secs(60));
        assert_eq!(config.rx_capacity, 128);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "serial": { "port": "/dev/ttyUSB1", "parity": "none" }, "safe_slots": { "filter": 3 } }"#;
        let config: PlcConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB1");
        assert_eq!(config.serial.parity, Parity::None);
        assert_eq!(config.serial.data_bits, 7);
        assert_eq!(config.safe_slots.filter, 3);
        assert_eq!(config.safe_slots.aperture, 0);
        assert_eq!(config.timing, TimingConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PlcConfig::default();
        config.serial.data_bits = 6;
        assert!(matches!(config.validate(), Err(PlcError::Config(_))));

        let mut config = PlcConfig::default();
        config.rx_capacity = 32;
        assert!(config.validate().is_err());

        let mut config = PlcConfig::default();
        config.safe_slots.aperture = 12;
        assert!(config.validate().is_err());

        let mut config = PlcConfig::default();
        config.timing.status_poll_ms = 0;
        assert!(config.validate().is_err());

        let mut config = PlcConfig::default();
        config.timing.heartbeat_ms = u64::MAX;
        assert!(matches!(config.validate(), Err(PlcError::Config(_))));

        let mut config = PlcConfig::default();
        config.timing.response_timeout_ms = MAX_TIMER_MS;
        assert!(config.validate().is_ok());
        config.timing.response_timeout_ms = MAX_TIMER_MS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("plc_config_{}.json", std::process::id()));
        let mut config = PlcConfig::default();
        config.serial.port = "/dev/ttyUSB3".into();
        config.timing.heartbeat_ms = 30_000;
        config.save_to_file(&path).unwrap();

        let loaded = PlcConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_parity_from_str() {
        assert_eq!(Parity::from_str("odd"), Ok(Parity::Odd));
        assert_eq!(Parity::Even.to_string(), "even");
    }
}
