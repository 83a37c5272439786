// src/hal/bluetooth_driver.rs
//! Native Bluetooth transport adapter
//!
//! Same primitive surface as the serial adapter, over the vendor Bluetooth
//! radio link. Legacy hardware revisions run the 1024 Hz base clock and an
//! older signal-naming generation; the revision is declared at construction
//! because the radio link offers no reliable runtime query.

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

/// Bluetooth link configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BluetoothConfig {
    /// Device MAC address, e.g. `00:06:66:AA:BB:CC`.
    pub mac: String,
    /// True for the legacy hardware revision (1024 Hz base clock, pre-EXG
    /// naming).
    pub legacy_firmware: bool,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            mac: String::new(),
            legacy_firmware: false,
        }
    }
}

impl BluetoothConfig {
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.mac.is_empty() {
            return Err(TransportError::InvalidConfig {
                reason: "bluetooth address cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Stub vendor radio handle (replace with the actual Bluetooth binding).
#[derive(Debug)]
struct RadioLink {
    _mac: String,
}

/// Native Bluetooth device transport.
pub struct BluetoothTransport {
    config: BluetoothConfig,
    link: Option<RadioLink>,
    bitmask: u32,
    rate_hz: f64,
    sink: Option<mpsc::Sender<TransportEvent>>,
    stream_task: Option<JoinHandle<()>>,
}

impl BluetoothTransport {
    pub fn new(config: BluetoothConfig) -> Result<Self, TransportError> {
        config.validate()?;
        Ok(Self::with_validated(config))
    }

    pub(crate) fn with_validated(config: BluetoothConfig) -> Self {
        Self {
            config,
            link: None,
            bitmask: 0,
            rate_hz: clock::DEFAULT_SAMPLING_RATE_HZ,
            sink: None,
            stream_task: None,
        }
    }

    fn target(&self) -> String {
        format!("bt://{}", self.config.mac)
    }

    fn base_clock(&self) -> f64 {
        if self.config.legacy_firmware {
            clock::LEGACY_BASE_CLOCK_HZ
        } else {
            clock::BASE_CLOCK_HZ
        }
    }

    fn naming_style(&self) -> NamingStyle {
        if self.config.legacy_firmware {
            NamingStyle::Legacy
        } else {
            NamingStyle::Modern
        }
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.link.is_none() {
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

impl Drop for BluetoothTransport {
    fn drop(&mut self) {
        self.halt_stream();
    }
}

#[async_trait]
impl SensorTransport for BluetoothTransport {
    fn caps(&self) -> TransportCaps {
        TransportCaps {
            backend: Backend::NativeBluetooth,
            needs_settle_sequence: true,
            base_clock_hz: Some(self.base_clock()),
        }
    }

    fn attach_sink(&mut self, sink: mpsc::Sender<TransportEvent>) {
        self.sink = Some(sink);
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        // TODO: bind the real vendor radio stack here.
        if self.config.mac.split(':').count() != 6 {
            return Err(TransportError::OpenFailed {
                target: self.target(),
                reason: "malformed bluetooth address".to_string(),
            });
        }
        self.link = Some(RadioLink {
            _mac: self.config.mac.clone(),
        });
        info!(target = %self.target(), legacy = self.config.legacy_firmware, "radio link opened");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.halt_stream();
        self.link = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    async fn write_sampling_rate(&mut self, rate_hz: f64) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.rate_hz = rate_hz;
        debug!(rate_hz, "sampling rate written over radio link");
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
        let style = self.naming_style();
        let ticks_per_sample = self.base_clock() / rate_hz;

        self.stream_task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / rate_hz));
            let mut sample_index: u64 = 0;
            loop {
                interval.tick().await;
                let timestamp = sample_index as f64 * ticks_per_sample;
                let frame = synth_frame(mask, style, timestamp);
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

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> BluetoothConfig {
        BluetoothConfig {
            mac: "00:06:66:AA:BB:CC".to_string(),
            legacy_firmware: false,
        }
    }

    #[test]
    fn test_empty_address_rejected() {
        assert!(BluetoothTransport::new(BluetoothConfig::default()).is_err());
        assert!(BluetoothTransport::new(test_config()).is_ok());
    }

    #[tokio::test]
    async fn test_malformed_address_fails_connect() {
        let mut transport = BluetoothTransport::new(BluetoothConfig {
            mac: "not-a-mac".to_string(),
            legacy_firmware: false,
        })
        .unwrap();
        assert!(matches!(
            transport.connect().await,
            Err(TransportError::OpenFailed { .. })
        ));
    }

    #[test]
    fn test_legacy_revision_reports_legacy_clock() {
        let transport = BluetoothTransport::new(BluetoothConfig {
            mac: "00:06:66:AA:BB:CC".to_string(),
            legacy_firmware: true,
        })
        .unwrap();
        assert_eq!(transport.caps().base_clock_hz, Some(1024.0));

        let transport = BluetoothTransport::new(test_config()).unwrap();
        assert_eq!(transport.caps().base_clock_hz, Some(32768.0));
    }

    #[tokio::test]
    async fn test_legacy_stream_uses_legacy_names() {
        let mut transport = BluetoothTransport::new(BluetoothConfig {
            mac: "00:06:66:AA:BB:CC".to_string(),
            legacy_firmware: true,
        })
        .unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        transport.attach_sink(tx);
        transport.connect().await.unwrap();

        let mut config = crate::config::SensorConfiguration::default();
        config.enable_exg = true;
        transport
            .write_channel_bitmask(crate::acquisition::bitmask::bitmask_for(&config))
            .await
            .unwrap();
        transport.write_sampling_rate(512.0).await.unwrap();
        transport.start_streaming().await.unwrap();

        match rx.recv().await.expect("frame expected") {
            TransportEvent::Frame(frame) => {
                assert!(frame.signal_index("ECG_CH1", None).is_some());
                assert!(frame
                    .signal_index("EXG1_CH1", Some(crate::hal::types::SignalFormat::Cal))
                    .is_none());
            }
            _ => panic!("expected a native frame"),
        }

        transport.disconnect().await.unwrap();
    }
}
