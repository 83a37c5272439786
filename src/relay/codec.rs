// src/relay/codec.rs
//! Relay wire protocol codec
//!
//! The relay speaks line-oriented JSON objects with a `type` discriminator.
//! Encoding is straightforward serde; decoding goes through a `Value` first
//! so that unknown message types are ignored without error and a malformed
//! line never takes the receive loop down.

use crate::config::SensorConfiguration;
use crate::error::ProtocolError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Outbound command messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayCommand {
    Hello,
    /// Subscribe to a device address behind the relay.
    Open { address: String },
    GetConfig,
    SetConfig { config: SensorConfiguration },
    SetSamplingRate { rate_hz: f64 },
    Start,
    Stop,
    Close,
}

/// Configuration as reported by the relay in `config` / `config_changed`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub sampling_rate_hz: Option<f64>,
    pub exg_mode: Option<String>,
    pub channel_bitmask: Option<u32>,
}

/// One triaxial sensor group on the wire. Every axis is independently
/// optional and tolerates non-numeric junk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireVec3 {
    #[serde(deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

/// A `sample` message: nested optional groups, every leaf optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireSample {
    #[serde(deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accel_ln: Option<WireVec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accel_wr: Option<WireVec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gyro: Option<WireVec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mag: Option<WireVec3>,
    #[serde(deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub battery: Option<f64>,
    #[serde(deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub ext_a6: Option<f64>,
    #[serde(deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub ext_a7: Option<f64>,
    #[serde(deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub ext_a15: Option<f64>,
    #[serde(deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub exg1_ch1: Option<f64>,
    #[serde(deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub exg1_ch2: Option<f64>,
    #[serde(deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub exg2_ch1: Option<f64>,
    #[serde(deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub exg2_ch2: Option<f64>,
}

/// Inbound control and data messages.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    HelloAck { ok: bool },
    OpenAck { ok: bool },
    Config(RemoteConfig),
    ConfigChanged(RemoteConfig),
    ConfigAck { ok: bool },
    SetSamplingRateAck { ok: bool, applied_hz: Option<f64> },
    StartAck { ok: bool },
    Sample(WireSample),
    Error { message: String },
    /// Recognized JSON with an unknown `type`; dropped without error.
    Ignored,
}

/// Accept a numeric leaf, turn anything else (string, bool, null, absent)
/// into `None` instead of failing the whole message.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_f64())
}

/// Serialize one command to its wire line (no trailing newline).
pub fn encode_command(command: &RelayCommand) -> Result<String, ProtocolError> {
    serde_json::to_string(command).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

/// Decode one wire line into an event.
pub fn decode_line(line: &str) -> Result<RelayEvent, ProtocolError> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?
        .to_string();

    // Absent `ok` on an ack means success; relays older than protocol v2
    // only include it on failure.
    let ok = value.get("ok").and_then(Value::as_bool).unwrap_or(true);

    match kind.as_str() {
        "hello_ack" => Ok(RelayEvent::HelloAck { ok }),
        "open_ack" => Ok(RelayEvent::OpenAck { ok }),
        "config_ack" => Ok(RelayEvent::ConfigAck { ok }),
        "start_ack" => Ok(RelayEvent::StartAck { ok }),
        "set_sampling_rate_ack" => Ok(RelayEvent::SetSamplingRateAck {
            ok,
            applied_hz: value.get("applied_hz").and_then(Value::as_f64),
        }),
        "config" => decode_payload(&kind, value).map(RelayEvent::Config),
        "config_changed" => decode_payload(&kind, value).map(RelayEvent::ConfigChanged),
        "sample" => decode_payload(&kind, value).map(RelayEvent::Sample),
        "error" => Ok(RelayEvent::Error {
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unspecified relay error")
                .to_string(),
        }),
        _ => Ok(RelayEvent::Ignored),
    }
}

fn decode_payload<T: for<'de> Deserialize<'de>>(
    kind: &str,
    value: Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(value).map_err(|e| ProtocolError::Payload {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_encoding_carries_discriminator() {
        let line = encode_command(&RelayCommand::Hello).unwrap();
        assert_eq!(line, r#"{"type":"hello"}"#);

        let line = encode_command(&RelayCommand::Open {
            address: "unit-07".to_string(),
        })
        .unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "open");
        assert_eq!(value["address"], "unit-07");

        let line = encode_command(&RelayCommand::SetSamplingRate { rate_hz: 102.4 }).unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "set_sampling_rate");
        assert_eq!(value["rate_hz"], 102.4);
    }

    #[test]
    fn test_ack_decoding() {
        assert_eq!(
            decode_line(r#"{"type":"hello_ack","ok":true}"#).unwrap(),
            RelayEvent::HelloAck { ok: true }
        );
        assert_eq!(
            decode_line(r#"{"type":"open_ack","ok":false}"#).unwrap(),
            RelayEvent::OpenAck { ok: false }
        );
        // Missing ok defaults to success.
        assert_eq!(
            decode_line(r#"{"type":"start_ack"}"#).unwrap(),
            RelayEvent::StartAck { ok: true }
        );
        assert_eq!(
            decode_line(r#"{"type":"set_sampling_rate_ack","ok":true,"applied_hz":102.4}"#)
                .unwrap(),
            RelayEvent::SetSamplingRateAck { ok: true, applied_hz: Some(102.4) }
        );
    }

    #[test]
    fn test_sample_decoding_with_partial_groups() {
        let event = decode_line(
            r#"{"type":"sample","timestamp":42,"gyro":{"x":1.5,"z":-2.0},"battery":3.7}"#,
        )
        .unwrap();
        match event {
            RelayEvent::Sample(sample) => {
                assert_eq!(sample.timestamp, Some(42.0));
                let gyro = sample.gyro.unwrap();
                assert_eq!(gyro.x, Some(1.5));
                assert_eq!(gyro.y, None);
                assert_eq!(gyro.z, Some(-2.0));
                assert_eq!(sample.battery, Some(3.7));
                assert_eq!(sample.exg1_ch1, None);
            }
            other => panic!("expected sample, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_leaves_become_none() {
        let event = decode_line(
            r#"{"type":"sample","battery":"low","gyro":{"x":"nan","y":2.0},"exg1_ch1":null}"#,
        )
        .unwrap();
        match event {
            RelayEvent::Sample(sample) => {
                assert_eq!(sample.battery, None);
                let gyro = sample.gyro.unwrap();
                assert_eq!(gyro.x, None);
                assert_eq!(gyro.y, Some(2.0));
                assert_eq!(sample.exg1_ch1, None);
            }
            other => panic!("expected sample, got {:?}", other),
        }
    }

    #[test]
    fn test_config_decoding() {
        let event =
            decode_line(r#"{"type":"config","sampling_rate_hz":51.2,"exg_mode":"ECG"}"#).unwrap();
        assert_eq!(
            event,
            RelayEvent::Config(RemoteConfig {
                sampling_rate_hz: Some(51.2),
                exg_mode: Some("ECG".to_string()),
                channel_bitmask: None,
            })
        );
    }

    #[test]
    fn test_unknown_type_ignored() {
        assert_eq!(
            decode_line(r#"{"type":"battery_report","level":0.8}"#).unwrap(),
            RelayEvent::Ignored
        );
    }

    #[test]
    fn test_malformed_lines_error_locally() {
        assert!(matches!(
            decode_line("{truncated"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            decode_line(r#"{"no_type":1}"#),
            Err(ProtocolError::MissingType)
        ));
    }

    #[test]
    fn test_error_message_decoding() {
        assert_eq!(
            decode_line(r#"{"type":"error","message":"device busy"}"#).unwrap(),
            RelayEvent::Error { message: "device busy".to_string() }
        );
        assert_eq!(
            decode_line(r#"{"type":"error"}"#).unwrap(),
            RelayEvent::Error { message: "unspecified relay error".to_string() }
        );
    }

    #[test]
    fn test_set_config_round_trips_sensor_configuration() {
        let mut config = SensorConfiguration::default();
        config.enable_exg = true;
        let line = encode_command(&RelayCommand::SetConfig { config }).unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "set_config");
        assert_eq!(value["config"]["enable_exg"], true);
        assert_eq!(value["config"]["exg_mode"], "ecg");
    }
}
