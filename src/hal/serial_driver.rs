// src/hal/serial_driver.rs
//! Native serial transport adapter
//!
//! Wraps the vendor serial driver (consumed as a black box) behind
//! [`SensorTransport`]. The session drives the settle-delay write sequence
//! and the safe-restart dance; this adapter only exposes the primitives and
//! owns the push-style frame stream.

use crate::config::constants::clock;
use crate::error::TransportError;
use crate::hal::synth::{synth_frame, NamingStyle};
use crate::hal::traits::{SensorTransport, TransportEvent};
use crate::hal::types::{Backend, CalibrationScope, TransportCaps};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Serial line configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialPortConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub timeout_ms: u32,
}

impl Default for SerialPortConfig {
    fn default() -> Self {
        Self {
            port_name: "/dev/ttyUSB0".to_string(),
            baud_rate: 115200,
            timeout_ms: 5000,
        }
    }
}

impl SerialPortConfig {
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.port_name.is_empty() {
            return Err(TransportError::InvalidConfig {
                reason: "serial port name cannot be empty".to_string(),
            });
        }
        if self.baud_rate == 0 || self.baud_rate > 4_000_000 {
            return Err(TransportError::InvalidConfig {
                reason: format!("invalid baud rate: {}", self.baud_rate),
            });
        }
        if self.timeout_ms == 0 {
            return Err(TransportError::InvalidConfig {
                reason: "timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Stub vendor port handle (replace with the actual serial driver binding).
#[derive(Debug)]
struct SerialPort {
    _port_name: String,
    _baud_rate: u32,
}

/// Native serial device transport.
pub struct SerialTransport {
    config: SerialPortConfig,
    port: Option<SerialPort>,
    bitmask: u32,
    rate_hz: f64,
    sink: Option<mpsc::Sender<TransportEvent>>,
    stream_task: Option<JoinHandle<()>>,
}

impl SerialTransport {
    pub fn new(config: SerialPortConfig) -> Result<Self, TransportError> {
        config.validate()?;
        Ok(Self::with_validated(config))
    }

    /// Construct from a configuration that has already been validated.
    pub(crate) fn with_validated(config: SerialPortConfig) -> Self {
        Self {
            config,
            port: None,
            bitmask: 0,
            rate_hz: clock::DEFAULT_SAMPLING_RATE_HZ,
            sink: None,
            stream_task: None,
        }
    }

    fn target(&self) -> String {
        format!("serial://{}", self.config.port_name)
    }

    fn open_port(&self) -> Result<SerialPort, TransportError> {
        // TODO: bind the real vendor serial driver here.
        if self.config.port_name == "/dev/null" {
            return Err(TransportError::OpenFailed {
                target: self.target(),
                reason: "port not found".to_string(),
            });
        }
        Ok(SerialPort {
            _port_name: self.config.port_name.clone(),
            _baud_rate: self.config.baud_rate,
        })
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.port.is_none() {
            return Err(TransportError::NotConnected);
        }
        Ok(())
    }

    fn halt_stream(&mut self) {
        if let Some(task) = self.stream_task.take() {
            task.abort();
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.halt_stream();
    }
}

#[async_trait]
impl SensorTransport for SerialTransport {
    fn caps(&self) -> TransportCaps {
        TransportCaps {
            backend: Backend::NativeSerial,
            needs_settle_sequence: true,
            base_clock_hz: Some(clock::BASE_CLOCK_HZ),
        }
    }

    fn attach_sink(&mut self, sink: mpsc::Sender<TransportEvent>) {
        self.sink = Some(sink);
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        let port = self.open_port()?;
        self.port = Some(port);
        info!(target = %self.target(), "serial port opened");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.halt_stream();
        self.port = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    async fn write_sampling_rate(&mut self, rate_hz: f64) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.rate_hz = rate_hz;
        debug!(rate_hz, "sampling rate written to serial device");
        Ok(())
    }

    async fn write_channel_bitmask(&mut self, mask: u32) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.bitmask = mask;
        debug!(mask = format_args!("{:#06x}", mask), "channel bitmask written");
        Ok(())
    }

    async fn push_configuration(
        &mut self,
        _config: &crate::config::SensorConfiguration,
    ) -> Result<(), TransportError> {
        // Native devices configure through rate and bitmask writes.
        self.ensure_connected()
    }

    async fn request_metadata_refresh(&mut self) -> Result<(), TransportError> {
        self.ensure_connected()?;
        debug!("metadata refresh requested");
        Ok(())
    }

    async fn read_calibration(&mut self, scope: CalibrationScope) -> Result<(), TransportError> {
        self.ensure_connected()?;
        debug!(?scope, "calibration reloaded");
        Ok(())
    }

    async fn start_streaming(&mut self) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.halt_stream();

        let sink = self.sink.clone().ok_or(TransportError::NotConnected)?;
        let mask = self.bitmask;
        let rate_hz = self.rate_hz.max(1.0);
        let ticks_per_sample = clock::BASE_CLOCK_HZ / rate_hz;

        self.stream_task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / rate_hz));
            let mut sample_index: u64 = 0;
            loop {
                interval.tick().await;
                let timestamp = sample_index as f64 * ticks_per_sample;
                let frame = synth_frame(mask, NamingStyle::Modern, timestamp);
                if sink.send(TransportEvent::Frame(Box::new(frame))).await.is_err() {
                    break;
                }
                sample_index += 1;
            }
        }));
        Ok(())
    }

    async fn stop_streaming(&mut self) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.halt_stream();
        Ok(())
    }
}
