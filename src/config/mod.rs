// src/config/mod.rs
//! Sensor and session configuration management

pub mod constants;
pub mod loader;

pub use loader::{load_from_path, load_from_str, AcquisitionConfig};

use crate::error::ConfigError;
use crate::hal::types::{Backend, LogicalChannel};
use serde::{Deserialize, Serialize};

/// Operating mode of the bioelectric (EXG) front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExgMode {
    Ecg,
    Emg,
    /// Hardware self-test square wave.
    Test,
    Respiration,
}

impl ExgMode {
    /// Display label, matching what the relay reports in `config` messages.
    pub fn label(&self) -> &'static str {
        match self {
            ExgMode::Ecg => "ECG",
            ExgMode::Emg => "EMG",
            ExgMode::Test => "Test",
            ExgMode::Respiration => "Respiration",
        }
    }
}

/// Per-channel enable toggles plus the requested sampling rate.
///
/// Pure data; the session holds a copy applied at configure time. Defaults
/// are the "sane acquisition" preset: both accelerometers, gyroscope and
/// magnetometer on, everything else off, 51.2 Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfiguration {
    pub sampling_rate_hz: f64,
    pub enable_low_noise_accel: bool,
    pub enable_wide_range_accel: bool,
    pub enable_gyro: bool,
    pub enable_mag: bool,
    pub enable_pressure_temp: bool,
    pub enable_battery: bool,
    pub enable_ext_a6: bool,
    pub enable_ext_a7: bool,
    pub enable_ext_a15: bool,
    pub enable_exg: bool,
    pub exg_mode: ExgMode,
}

impl Default for SensorConfiguration {
    fn default() -> Self {
        Self {
            sampling_rate_hz: constants::clock::DEFAULT_SAMPLING_RATE_HZ,
            enable_low_noise_accel: true,
            enable_wide_range_accel: true,
            enable_gyro: true,
            enable_mag: true,
            enable_pressure_temp: false,
            enable_battery: false,
            enable_ext_a6: false,
            enable_ext_a7: false,
            enable_ext_a15: false,
            enable_exg: false,
            exg_mode: ExgMode::Ecg,
        }
    }
}

impl SensorConfiguration {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sampling_rate_hz > 0.0) {
            return Err(ConfigError::InvalidRate(self.sampling_rate_hz));
        }
        Ok(())
    }

    /// Whether the sensor group owning `channel` is enabled.
    pub fn channel_enabled(&self, channel: LogicalChannel) -> bool {
        match channel {
            LogicalChannel::AccelLnX | LogicalChannel::AccelLnY | LogicalChannel::AccelLnZ => {
                self.enable_low_noise_accel
            }
            LogicalChannel::AccelWrX | LogicalChannel::AccelWrY | LogicalChannel::AccelWrZ => {
                self.enable_wide_range_accel
            }
            LogicalChannel::GyroX | LogicalChannel::GyroY | LogicalChannel::GyroZ => {
                self.enable_gyro
            }
            LogicalChannel::MagX | LogicalChannel::MagY | LogicalChannel::MagZ => self.enable_mag,
            LogicalChannel::Pressure | LogicalChannel::Temperature => self.enable_pressure_temp,
            LogicalChannel::Battery => self.enable_battery,
            LogicalChannel::ExtA6 => self.enable_ext_a6,
            LogicalChannel::ExtA7 => self.enable_ext_a7,
            LogicalChannel::ExtA15 => self.enable_ext_a15,
            LogicalChannel::Exg1Ch1
            | LogicalChannel::Exg1Ch2
            | LogicalChannel::Exg2Ch1
            | LogicalChannel::Exg2Ch2 => self.enable_exg,
        }
    }
}

/// Mandatory pauses between sequential native configuration writes.
///
/// Empirical values; the firmware drops writes issued back-to-back. Exposed
/// as configuration because no documented tolerance exists for slower
/// hardware revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleDelays {
    pub after_stop_ms: u64,
    pub after_rate_write_ms: u64,
    pub after_bitmask_write_ms: u64,
    pub after_metadata_refresh_ms: u64,
    pub after_calibration_ms: u64,
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            after_stop_ms: constants::settle::AFTER_STOP_MS,
            after_rate_write_ms: constants::settle::AFTER_RATE_WRITE_MS,
            after_bitmask_write_ms: constants::settle::AFTER_BITMASK_WRITE_MS,
            after_metadata_refresh_ms: constants::settle::AFTER_METADATA_REFRESH_MS,
            after_calibration_ms: constants::settle::AFTER_CALIBRATION_MS,
        }
    }
}

/// Acknowledgment budgets for the relay backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AckTimeouts {
    pub hello_ms: u64,
    pub open_retry_attempts: u32,
    pub open_retry_spacing_ms: u64,
    pub start_ms: u64,
    pub rate_ms: u64,
    pub config_ms: u64,
}

impl Default for AckTimeouts {
    fn default() -> Self {
        Self {
            hello_ms: constants::relay::HELLO_ACK_TIMEOUT_MS,
            open_retry_attempts: constants::relay::OPEN_RETRY_ATTEMPTS,
            open_retry_spacing_ms: constants::relay::OPEN_RETRY_SPACING_MS,
            start_ms: constants::relay::START_ACK_TIMEOUT_MS,
            rate_ms: constants::relay::RATE_ACK_TIMEOUT_MS,
            config_ms: constants::relay::CONFIG_ACK_TIMEOUT_MS,
        }
    }
}

/// Where a session connects to. Explicit, never a process-wide static.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum TargetAddress {
    Serial { port: String },
    Bluetooth { mac: String },
    Relay { host: String, port: u16, device: String },
}

impl TargetAddress {
    pub fn backend(&self) -> Backend {
        match self {
            TargetAddress::Serial { .. } => Backend::NativeSerial,
            TargetAddress::Bluetooth { .. } => Backend::NativeBluetooth,
            TargetAddress::Relay { .. } => Backend::RelaySocket,
        }
    }

    /// Human-readable target label used in error context and logs.
    pub fn display(&self) -> String {
        match self {
            TargetAddress::Serial { port } => format!("serial://{}", port),
            TargetAddress::Bluetooth { mac } => format!("bt://{}", mac),
            TargetAddress::Relay { host, port, device } => {
                format!("relay://{}:{}/{}", host, port, device)
            }
        }
    }
}

/// Construction-time session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub target: TargetAddress,

    #[serde(default)]
    pub settle: SettleDelays,

    #[serde(default)]
    pub ack: AckTimeouts,

    #[serde(default = "defaults::subscriber_queue_depth")]
    pub subscriber_queue_depth: usize,
}

impl SessionConfig {
    pub fn new(target: TargetAddress) -> Self {
        Self {
            target,
            settle: SettleDelays::default(),
            ack: AckTimeouts::default(),
            subscriber_queue_depth: defaults::subscriber_queue_depth(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.target {
            TargetAddress::Serial { port } if port.is_empty() => Err(ConfigError::Invalid {
                reason: "serial port path cannot be empty".to_string(),
            }),
            TargetAddress::Bluetooth { mac } if mac.is_empty() => Err(ConfigError::Invalid {
                reason: "bluetooth address cannot be empty".to_string(),
            }),
            TargetAddress::Relay { host, device, .. } if host.is_empty() || device.is_empty() => {
                Err(ConfigError::Invalid {
                    reason: "relay host and device id cannot be empty".to_string(),
                })
            }
            _ => {
                if self.subscriber_queue_depth == 0 {
                    return Err(ConfigError::Invalid {
                        reason: "subscriber queue depth must be at least 1".to_string(),
                    });
                }
                Ok(())
            }
        }
    }
}

mod defaults {
    use super::constants;

    pub fn subscriber_queue_depth() -> usize {
        constants::delivery::DEFAULT_SUBSCRIBER_QUEUE_DEPTH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_preset_core_imu_on_exg_off() {
        let cfg = SensorConfiguration::default();
        assert!(cfg.enable_low_noise_accel);
        assert!(cfg.enable_gyro);
        assert!(cfg.enable_mag);
        assert!(!cfg.enable_exg);
        assert!(!cfg.enable_battery);
        assert_eq!(cfg.sampling_rate_hz, 51.2);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_non_positive_rate_rejected() {
        let mut cfg = SensorConfiguration::default();
        cfg.sampling_rate_hz = 0.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidRate(_))));

        cfg.sampling_rate_hz = -5.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidRate(_))));

        cfg.sampling_rate_hz = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_channel_enablement_follows_groups() {
        let mut cfg = SensorConfiguration::default();
        assert!(cfg.channel_enabled(LogicalChannel::GyroY));
        assert!(!cfg.channel_enabled(LogicalChannel::Exg1Ch1));

        cfg.enable_exg = true;
        cfg.enable_gyro = false;
        assert!(cfg.channel_enabled(LogicalChannel::Exg2Ch2));
        assert!(!cfg.channel_enabled(LogicalChannel::GyroY));
    }

    #[test]
    fn test_target_address_labels() {
        let target = TargetAddress::Relay {
            host: "bridge.local".to_string(),
            port: 9801,
            device: "unit-07".to_string(),
        };
        assert_eq!(target.backend(), Backend::RelaySocket);
        assert_eq!(target.display(), "relay://bridge.local:9801/unit-07");
    }

    #[test]
    fn test_session_config_validation() {
        let cfg = SessionConfig::new(TargetAddress::Serial { port: String::new() });
        assert!(cfg.validate().is_err());

        let cfg = SessionConfig::new(TargetAddress::Serial {
            port: "/dev/ttyUSB0".to_string(),
        });
        assert!(cfg.validate().is_ok());
    }
}
