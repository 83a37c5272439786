// src/config/loader.rs
//! TOML configuration loading with validation

use crate::config::{SensorConfiguration, SessionConfig};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete on-disk configuration: where to connect plus what to acquire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    pub session: SessionConfig,

    #[serde(default)]
    pub sensors: SensorConfiguration,
}

impl AcquisitionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session.validate()?;
        self.sensors.validate()?;
        Ok(())
    }
}

/// Load and validate an [`AcquisitionConfig`] from a TOML file.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<AcquisitionConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    let raw = std::fs::read_to_string(path)?;
    load_from_str(&raw)
}

/// Parse and validate an [`AcquisitionConfig`] from TOML text.
pub fn load_from_str(raw: &str) -> Result<AcquisitionConfig, ConfigError> {
    let config: AcquisitionConfig =
        toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExgMode, TargetAddress};

    const RELAY_CONFIG: &str = r#"
        [session]
        subscriber_queue_depth = 64

        [session.target]
        backend = "relay"
        host = "bridge.local"
        port = 9801
        device = "unit-07"

        [session.ack]
        hello_ms = 1500

        [sensors]
        sampling_rate_hz = 102.4
        enable_exg = true
        exg_mode = "respiration"
    "#;

    #[test]
    fn test_load_relay_config() {
        let config = load_from_str(RELAY_CONFIG).expect("parse failed");
        assert_eq!(
            config.session.target,
            TargetAddress::Relay {
                host: "bridge.local".to_string(),
                port: 9801,
                device: "unit-07".to_string(),
            }
        );
        assert_eq!(config.session.subscriber_queue_depth, 64);
        assert_eq!(config.session.ack.hello_ms, 1500);
        // Unspecified ACK fields keep their defaults.
        assert_eq!(config.session.ack.start_ms, 12000);
        assert_eq!(config.sensors.sampling_rate_hz, 102.4);
        assert!(config.sensors.enable_exg);
        assert_eq!(config.sensors.exg_mode, ExgMode::Respiration);
    }

    #[test]
    fn test_sensor_defaults_when_section_missing() {
        let config = load_from_str(
            r#"
            [session.target]
            backend = "serial"
            port = "/dev/ttyUSB0"
        "#,
        )
        .expect("parse failed");
        assert!(config.sensors.enable_gyro);
        assert!(!config.sensors.enable_exg);
    }

    #[test]
    fn test_invalid_rate_rejected_at_load() {
        let result = load_from_str(
            r#"
            [session.target]
            backend = "bluetooth"
            mac = "00:06:66:AA:BB:CC"

            [sensors]
            sampling_rate_hz = -1.0
        "#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidRate(_))));
    }

    #[test]
    fn test_missing_file_reported_with_path() {
        let result = load_from_path("/nonexistent/acquisition.toml");
        match result {
            Err(ConfigError::FileNotFound { path }) => assert!(path.contains("acquisition.toml")),
            other => panic!("expected FileNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_garbage_input_is_a_parse_error() {
        assert!(matches!(
            load_from_str("not toml at all ==="),
            Err(ConfigError::Parse(_))
        ));
    }
}
