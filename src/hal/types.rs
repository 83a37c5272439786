// src/hal/types.rs
//! Core types shared across the transport abstraction layer

use serde::{Deserialize, Serialize};

/// Transport backend families supported by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    NativeSerial,
    NativeBluetooth,
    RelaySocket,
}

/// Session lifecycle states.
///
/// `Configuring` is re-entered from `Streaming` for a live sampling-rate
/// change. `Faulted` is reached from any state on an unrecoverable transport
/// error and is left only through `connect()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Configuring,
    Streaming,
    Stopping,
    Faulted,
}

impl SessionState {
    /// True while the transport link is expected to be up.
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            SessionState::Connected
                | SessionState::Configuring
                | SessionState::Streaming
                | SessionState::Stopping
        )
    }
}

/// Data-format tags a physical channel may be exposed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalFormat {
    /// Calibrated engineering units. Preferred whenever available.
    Cal,
    Raw,
    Uncal,
}

impl SignalFormat {
    /// Resolution priority order.
    pub const PRIORITY: [SignalFormat; 3] =
        [SignalFormat::Cal, SignalFormat::Raw, SignalFormat::Uncal];
}

/// Scope of a calibration reload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationScope {
    AllSensors,
    ExgOnly,
}

/// Logical channels a sample frame can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalChannel {
    AccelLnX,
    AccelLnY,
    AccelLnZ,
    AccelWrX,
    AccelWrY,
    AccelWrZ,
    GyroX,
    GyroY,
    GyroZ,
    MagX,
    MagY,
    MagZ,
    Pressure,
    Temperature,
    Battery,
    ExtA6,
    ExtA7,
    ExtA15,
    Exg1Ch1,
    Exg1Ch2,
    Exg2Ch1,
    Exg2Ch2,
}

impl LogicalChannel {
    /// All logical channels, in frame-field order.
    pub const ALL: [LogicalChannel; 22] = [
        LogicalChannel::AccelLnX,
        LogicalChannel::AccelLnY,
        LogicalChannel::AccelLnZ,
        LogicalChannel::AccelWrX,
        LogicalChannel::AccelWrY,
        LogicalChannel::AccelWrZ,
        LogicalChannel::GyroX,
        LogicalChannel::GyroY,
        LogicalChannel::GyroZ,
        LogicalChannel::MagX,
        LogicalChannel::MagY,
        LogicalChannel::MagZ,
        LogicalChannel::Pressure,
        LogicalChannel::Temperature,
        LogicalChannel::Battery,
        LogicalChannel::ExtA6,
        LogicalChannel::ExtA7,
        LogicalChannel::ExtA15,
        LogicalChannel::Exg1Ch1,
        LogicalChannel::Exg1Ch2,
        LogicalChannel::Exg2Ch1,
        LogicalChannel::Exg2Ch2,
    ];

    /// True for members of the bioelectric (EXG) channel family.
    pub fn is_exg(&self) -> bool {
        matches!(
            self,
            LogicalChannel::Exg1Ch1
                | LogicalChannel::Exg1Ch2
                | LogicalChannel::Exg2Ch1
                | LogicalChannel::Exg2Ch2
        )
    }
}

/// Static capabilities of a transport backend, populated at construction.
///
/// Replaces runtime capability probing: the session branches on these flags
/// instead of introspecting the adapter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportCaps {
    pub backend: Backend,
    /// Native backends require the settle-delay write sequence and the
    /// safe-restart dance; the relay backend negotiates over ACKs instead.
    pub needs_settle_sequence: bool,
    /// Base sampling clock reported by the transport, if it knows its
    /// hardware revision. `None` means "assume the current revision".
    pub base_clock_hz: Option<f64>,
}
