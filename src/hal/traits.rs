// src/hal/traits.rs
//! Transport and frame-schema traits for the acquisition core

use crate::config::SensorConfiguration;
use crate::error::TransportError;
use crate::hal::types::{CalibrationScope, SignalFormat, TransportCaps};
use crate::relay::codec::WireSample;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Schema-queryable raw frame, as pushed by a native driver.
///
/// The vendor driver exposes frames as loosely-typed name/format lookups;
/// this trait is the reflection-free view of that surface. Index resolution
/// (`acquisition::resolver`) probes it once per (re)configuration, after
/// which per-frame access goes through `value_at` only.
pub trait FrameSchema: Send + Sync {
    /// Resolve a signal name (optionally qualified by format) to a physical
    /// field position within this frame layout.
    fn signal_index(&self, name: &str, format: Option<SignalFormat>) -> Option<usize>;

    /// Read the value at a physical field position, if populated.
    fn value_at(&self, index: usize) -> Option<f64>;
}

/// One event on the transport-to-session channel.
pub enum TransportEvent {
    /// A schema-queryable raw frame from a native backend.
    Frame(Box<dyn FrameSchema>),
    /// A parsed sample message from the relay backend.
    Wire(WireSample),
    /// The transport failed mid-stream; no further events will follow.
    Lost { reason: String },
}

/// A transport adapter owned by a `DeviceSession`.
///
/// Three implementations exist: the native serial and Bluetooth drivers and
/// the relay socket client. The session drives the connect/configure/stream
/// sequences through these primitives; backend differences are expressed
/// through [`TransportCaps`], never through downcasting.
#[async_trait]
pub trait SensorTransport: Send {
    /// Static backend capabilities.
    fn caps(&self) -> TransportCaps;

    /// Attach the frame sink. Exactly one sink is active at a time; attaching
    /// replaces any previous one.
    fn attach_sink(&mut self, sink: mpsc::Sender<TransportEvent>);

    /// Open the transport. For the relay backend this includes the full
    /// hello/subscribe/get-config handshake.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Tear down the transport and any internal tasks.
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    async fn write_sampling_rate(&mut self, rate_hz: f64) -> Result<(), TransportError>;

    async fn write_channel_bitmask(&mut self, mask: u32) -> Result<(), TransportError>;

    /// Push a full sensor configuration. Native backends configure through
    /// rate and bitmask writes and treat this as a no-op.
    async fn push_configuration(
        &mut self,
        config: &SensorConfiguration,
    ) -> Result<(), TransportError>;

    async fn request_metadata_refresh(&mut self) -> Result<(), TransportError>;

    async fn read_calibration(&mut self, scope: CalibrationScope) -> Result<(), TransportError>;

    async fn start_streaming(&mut self) -> Result<(), TransportError>;

    async fn stop_streaming(&mut self) -> Result<(), TransportError>;

    /// EXG mode display string, once the far side has reported one.
    fn reported_mode_label(&self) -> Option<String> {
        None
    }

    /// Sampling rate the far side reports as applied, if any.
    fn reported_sampling_rate(&self) -> Option<f64> {
        None
    }
}
