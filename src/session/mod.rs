// src/session/mod.rs
//! Device session state machine
//!
//! One `DeviceSession` owns one transport (serial, Bluetooth or relay) plus
//! one receive-loop task, and drives the lifecycle
//! `Disconnected → Connecting → Connected → Configuring → Streaming →
//! Stopping`. Backend differences are expressed through `TransportCaps`:
//! native backends get the settle-delay write sequence and the safe-restart
//! dance, the relay backend negotiates over acknowledgments inside its
//! adapter. `Faulted` is reached on unrecoverable transport errors and left
//! only through `connect()`.

pub mod subscribers;

pub use subscribers::{SessionEvent, SubscriptionHandle};

use crate::acquisition::{
    bitmask_for, quantize, quantize_default, SampleFrameBuilder, SignalIndexMap,
};
use crate::config::constants::{clock, relay};
use crate::config::{SensorConfiguration, SessionConfig, SettleDelays, TargetAddress};
use crate::error::{ConfigError, ConnError, RateError, StreamError, TransportError};
use crate::hal::bluetooth_driver::{BluetoothConfig, BluetoothTransport};
use crate::hal::serial_driver::{SerialPortConfig, SerialTransport};
use crate::hal::traits::{SensorTransport, TransportEvent};
use crate::hal::types::{Backend, CalibrationScope, SessionState};
use crate::relay::RelayTransport;
use crate::utils::time;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use subscribers::Subscribers;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Builds a fresh transport adapter. Called at first connect and whenever a
/// reconfiguration forces a native handle to be recreated.
pub type TransportFactory =
    Box<dyn Fn() -> Result<Box<dyn SensorTransport>, TransportError> + Send + Sync>;

/// State the receive loop shares with the session front end.
struct SessionShared {
    active_config: RwLock<Option<SensorConfiguration>>,
    /// Resolved signal layout for the native path. `None` means "rebuild
    /// from the next frame"; invalidated on every (re)configuration.
    index_map: RwLock<Option<SignalIndexMap>>,
    subscribers: Subscribers,
    faulted: AtomicBool,
}

/// A session with one wearable sensor unit.
pub struct DeviceSession {
    config: SessionConfig,
    factory: TransportFactory,
    transport: Option<Box<dyn SensorTransport>>,
    state: SessionState,
    applied_rate_hz: Option<f64>,
    shared: Arc<SessionShared>,
    rx_task: Option<JoinHandle<()>>,
}

impl DeviceSession {
    /// Create a session for the configured target. No I/O happens until
    /// `connect()`.
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let factory = default_factory(&config);
        Ok(Self::with_factory(config, factory))
    }

    /// Create a session over a custom transport factory. This is how tests
    /// substitute a scripted transport for real hardware.
    pub fn with_factory(config: SessionConfig, factory: TransportFactory) -> Self {
        let queue_depth = config.subscriber_queue_depth;
        Self {
            config,
            factory,
            transport: None,
            state: SessionState::Disconnected,
            applied_rate_hz: None,
            shared: Arc::new(SessionShared {
                active_config: RwLock::new(None),
                index_map: RwLock::new(None),
                subscribers: Subscribers::new(queue_depth),
                faulted: AtomicBool::new(false),
            }),
            rx_task: None,
        }
    }

    /// Current lifecycle state. A mid-stream transport fault reported by the
    /// receive loop surfaces here as `Faulted`.
    pub fn state(&self) -> SessionState {
        if self.shared.faulted.load(Ordering::Acquire) && self.state.is_connected() {
            SessionState::Faulted
        } else {
            self.state
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Sampling rate actually in effect, once one has been applied.
    pub fn applied_sampling_rate_hz(&self) -> Option<f64> {
        self.applied_rate_hz
    }

    /// EXG mode display string, populated only once the far side has
    /// reported one. Native backends never report a mode.
    pub fn current_mode_label(&self) -> Option<String> {
        self.transport.as_ref().and_then(|t| t.reported_mode_label())
    }

    /// Register a new frame subscriber.
    pub fn subscribe(&self) -> SubscriptionHandle {
        self.shared.subscribers.subscribe()
    }

    /// Frames discarded because subscriber queues were full.
    pub fn dropped_frames(&self) -> u64 {
        self.shared.subscribers.dropped_frames()
    }

    /// Apply a sensor configuration.
    ///
    /// Allowed while `Disconnected` or `Connected`. The signal index map is
    /// invalidated unconditionally. On a relay-connected session the new
    /// configuration is also pushed to the far side (best effort); native
    /// backends cannot change their channel set on a live handle, so the
    /// transport is disposed and the session returns to `Disconnected`.
    pub async fn configure(&mut self, sensors: SensorConfiguration) -> Result<(), ConfigError> {
        let state = self.state();
        match state {
            SessionState::Disconnected | SessionState::Connected => {}
            state => return Err(ConfigError::InvalidState { state }),
        }
        sensors.validate()?;

        *self.shared.active_config.write() = Some(sensors);
        *self.shared.index_map.write() = None;
        self.applied_rate_hz = None;

        if state == SessionState::Connected {
            if let Some(mut transport) = self.transport.take() {
                if transport.caps().needs_settle_sequence {
                    self.abort_receive_loop();
                    if let Err(e) = transport.disconnect().await {
                        debug!(error = %e, "transport close failed during reconfiguration");
                    }
                    self.state = SessionState::Disconnected;
                    info!(
                        target = %self.config.target.display(),
                        "native transport disposed for reconfiguration, reconnect required"
                    );
                } else {
                    if let Err(e) = transport.push_configuration(&sensors).await {
                        warn!(error = %e, "relay did not confirm the new configuration");
                    }
                    self.applied_rate_hz = transport
                        .reported_sampling_rate()
                        .or_else(|| quantize_default(sensors.sampling_rate_hz).ok());
                    self.transport = Some(transport);
                }
            }
        }
        Ok(())
    }

    /// Open the transport and bring the device to `Connected`.
    ///
    /// Native backends then run the settle sequence (rate, bitmask, metadata
    /// refresh, each followed by its mandatory pause). A handshake timeout
    /// rolls back cleanly to `Disconnected`; other failures leave the
    /// session `Faulted`.
    pub async fn connect(&mut self) -> Result<(), ConnError> {
        match self.state() {
            SessionState::Disconnected | SessionState::Faulted => {}
            state => return Err(ConnError::InvalidState { state }),
        }
        let active = match *self.shared.active_config.read() {
            Some(cfg) => cfg,
            None => return Err(ConnError::NotConfigured),
        };
        let target = self.config.target.display();

        self.shared.faulted.store(false, Ordering::Release);
        self.state = SessionState::Connecting;

        let mut transport = match self.transport.take() {
            Some(t) => t,
            None => match (self.factory)() {
                Ok(t) => t,
                Err(e) => {
                    self.state = SessionState::Faulted;
                    return Err(ConnError::from_transport(&target, e));
                }
            },
        };

        // The receive loop is live before the transport opens so that no
        // early frame is lost.
        let (tx, rx) = mpsc::channel(relay::FRAME_CHANNEL_DEPTH);
        transport.attach_sink(tx);
        self.abort_receive_loop();
        self.rx_task = Some(tokio::spawn(receive_loop(rx, Arc::clone(&self.shared))));

        if let Err(e) = transport.connect().await {
            self.abort_receive_loop();
            self.transport = Some(transport);
            self.state = match e {
                TransportError::HandshakeTimeout { .. } => SessionState::Disconnected,
                _ => SessionState::Faulted,
            };
            return Err(ConnError::from_transport(&target, e));
        }

        let caps = transport.caps();
        if caps.needs_settle_sequence {
            let base = caps.base_clock_hz.unwrap_or(clock::BASE_CLOCK_HZ);
            match settle_sequence(transport.as_mut(), &active, &self.config.settle, base).await {
                Ok(applied) => self.applied_rate_hz = Some(applied),
                Err(e) => {
                    // Partial native setup is rolled back; the device may be
                    // in an unknown state, so the session is faulted.
                    if let Err(close) = transport.disconnect().await {
                        debug!(error = %close, "rollback close failed");
                    }
                    self.abort_receive_loop();
                    self.transport = Some(transport);
                    self.state = SessionState::Faulted;
                    return Err(ConnError::from_transport(&target, e));
                }
            }
        } else {
            self.applied_rate_hz = transport
                .reported_sampling_rate()
                .or_else(|| quantize_default(active.sampling_rate_hz).ok());
        }

        self.transport = Some(transport);
        self.state = SessionState::Connected;
        info!(target = %target, "device session connected");
        Ok(())
    }

    /// Begin streaming.
    ///
    /// Native backends always run the full safe-restart sequence rather than
    /// a bare start; the relay adapter confirms its subscription and awaits
    /// the start acknowledgment. On failure the session stays `Connected`.
    pub async fn start_streaming(&mut self) -> Result<(), StreamError> {
        match self.state() {
            SessionState::Connected => {}
            state => return Err(StreamError::InvalidState { state }),
        }
        let active = match *self.shared.active_config.read() {
            Some(cfg) => cfg,
            None => {
                return Err(StreamError::InvalidState {
                    state: SessionState::Disconnected,
                })
            }
        };
        let target = self.config.target.display();
        self.state = SessionState::Configuring;
        // The restart rewrites the bitmask; any previously resolved layout
        // may no longer match.
        *self.shared.index_map.write() = None;

        let settle = self.config.settle;
        let applied = self.applied_rate_hz.unwrap_or(active.sampling_rate_hz);
        let result = match self.transport.as_mut() {
            Some(transport) if transport.caps().needs_settle_sequence => {
                safe_restart(
                    transport.as_mut(),
                    &active,
                    &settle,
                    applied,
                    CalibrationScope::AllSensors,
                )
                .await
            }
            Some(transport) => transport.start_streaming().await,
            None => Err(TransportError::NotConnected),
        };

        match result {
            Ok(()) => {
                self.state = SessionState::Streaming;
                info!(target = %target, rate_hz = applied, "streaming started");
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Connected;
                Err(StreamError::from_transport(&target, e))
            }
        }
    }

    /// Stop streaming. Best effort: a failed stop command still leaves the
    /// session `Connected`.
    pub async fn stop_streaming(&mut self) -> Result<(), StreamError> {
        match self.state() {
            SessionState::Streaming => {}
            state => return Err(StreamError::InvalidState { state }),
        }
        self.state = SessionState::Stopping;
        let after_stop = self.config.settle.after_stop_ms;
        if let Some(transport) = self.transport.as_mut() {
            let needs_settle = transport.caps().needs_settle_sequence;
            if let Err(e) = transport.stop_streaming().await {
                debug!(error = %e, "stop command failed, treating stream as stopped");
            }
            if needs_settle {
                tokio::time::sleep(Duration::from_millis(after_stop)).await;
            }
        }
        self.state = SessionState::Connected;
        Ok(())
    }

    /// Change the sampling rate, returning the value the firmware clock can
    /// actually produce.
    ///
    /// While `Streaming` on a native backend the change is wrapped in the
    /// safe-restart sequence and the session ends back in `Streaming`; the
    /// relay applies it live through `set_sampling_rate`.
    pub async fn apply_sampling_rate(&mut self, requested_hz: f64) -> Result<f64, RateError> {
        let state = self.state();
        if !matches!(state, SessionState::Connected | SessionState::Streaming) {
            return Err(RateError::InvalidState { state });
        }
        let target = self.config.target.display();
        let caps = match self.transport.as_ref() {
            Some(t) => t.caps(),
            None => {
                return Err(RateError::Transport {
                    target,
                    source: TransportError::NotConnected,
                })
            }
        };
        let base = caps.base_clock_hz.unwrap_or(clock::BASE_CLOCK_HZ);
        let applied = quantize(base, requested_hz)?;
        let active = match *self.shared.active_config.read() {
            Some(mut cfg) => {
                cfg.sampling_rate_hz = requested_hz;
                cfg
            }
            None => return Err(RateError::InvalidState { state }),
        };
        let settle = self.config.settle;

        let result = if caps.needs_settle_sequence && state == SessionState::Streaming {
            self.state = SessionState::Configuring;
            *self.shared.index_map.write() = None;
            let outcome = match self.transport.as_mut() {
                Some(transport) => {
                    safe_restart(
                        transport.as_mut(),
                        &active,
                        &settle,
                        applied,
                        CalibrationScope::ExgOnly,
                    )
                    .await
                }
                None => Err(TransportError::NotConnected),
            };
            match outcome {
                Ok(()) => {
                    self.state = SessionState::Streaming;
                    Ok(())
                }
                Err(e) => {
                    self.state = SessionState::Connected;
                    Err(e)
                }
            }
        } else {
            let outcome = match self.transport.as_mut() {
                Some(transport) => transport.write_sampling_rate(applied).await,
                None => Err(TransportError::NotConnected),
            };
            if outcome.is_ok() && caps.needs_settle_sequence {
                tokio::time::sleep(Duration::from_millis(settle.after_rate_write_ms)).await;
            }
            outcome
        };
        result.map_err(|e| RateError::from_transport(&target, e))?;

        let applied = if caps.backend == Backend::RelaySocket {
            self.transport
                .as_ref()
                .and_then(|t| t.reported_sampling_rate())
                .unwrap_or(applied)
        } else {
            applied
        };
        self.applied_rate_hz = Some(applied);
        if let Some(cfg) = self.shared.active_config.write().as_mut() {
            cfg.sampling_rate_hz = requested_hz;
        }
        debug!(requested_hz, applied_hz = applied, "sampling rate applied");
        Ok(applied)
    }

    /// Tear the session down. Stops streaming if needed, cancels the
    /// receive loop and waits for it to exit, then closes the transport.
    /// No subscriber event fires after this returns.
    pub async fn disconnect(&mut self) -> Result<(), TransportError> {
        if self.state() == SessionState::Streaming {
            if let Some(transport) = self.transport.as_mut() {
                if let Err(e) = transport.stop_streaming().await {
                    debug!(error = %e, "stop during disconnect failed");
                }
            }
        }
        if let Some(task) = self.rx_task.take() {
            task.abort();
            let _ = task.await;
        }
        let result = match self.transport.as_mut() {
            Some(transport) => transport.disconnect().await,
            None => Ok(()),
        };
        self.state = SessionState::Disconnected;
        self.shared.faulted.store(false, Ordering::Release);
        *self.shared.index_map.write() = None;
        info!(target = %self.config.target.display(), "device session closed");
        result
    }

    fn abort_receive_loop(&mut self) {
        if let Some(task) = self.rx_task.take() {
            task.abort();
        }
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.abort_receive_loop();
    }
}

fn default_factory(config: &SessionConfig) -> TransportFactory {
    let target = config.target.clone();
    let ack = config.ack;
    Box::new(move || {
        let transport: Box<dyn SensorTransport> = match &target {
            TargetAddress::Serial { port } => Box::new(SerialTransport::new(SerialPortConfig {
                port_name: port.clone(),
                ..SerialPortConfig::default()
            })?),
            TargetAddress::Bluetooth { mac } => Box::new(BluetoothTransport::new(BluetoothConfig {
                mac: mac.clone(),
                legacy_firmware: false,
            })?),
            TargetAddress::Relay { host, port, device } => Box::new(RelayTransport::new(
                host.clone(),
                *port,
                device.clone(),
                ack,
            )),
        };
        Ok(transport)
    })
}

/// Initial native bring-up: rate, bitmask, metadata refresh, each write
/// followed by its mandatory pause. Returns the applied rate.
async fn settle_sequence(
    transport: &mut dyn SensorTransport,
    config: &SensorConfiguration,
    settle: &SettleDelays,
    base_clock_hz: f64,
) -> Result<f64, TransportError> {
    let applied =
        quantize(base_clock_hz, config.sampling_rate_hz).map_err(|e| {
            TransportError::InvalidConfig { reason: e.to_string() }
        })?;
    transport.write_sampling_rate(applied).await?;
    tokio::time::sleep(Duration::from_millis(settle.after_rate_write_ms)).await;
    transport.write_channel_bitmask(bitmask_for(config)).await?;
    tokio::time::sleep(Duration::from_millis(settle.after_bitmask_write_ms)).await;
    transport.request_metadata_refresh().await?;
    tokio::time::sleep(Duration::from_millis(settle.after_metadata_refresh_ms)).await;
    Ok(applied)
}

/// Native safe-restart sequence. The firmware only accepts configuration
/// writes while stopped, so any (re)start goes through: stop, clear the
/// bitmask, rewrite rate and bitmask, refresh metadata, reload calibration,
/// start. `calibration` is `AllSensors` on a cold start; a live rate change
/// only invalidates the rate-dependent EXG registers.
async fn safe_restart(
    transport: &mut dyn SensorTransport,
    config: &SensorConfiguration,
    settle: &SettleDelays,
    applied_rate_hz: f64,
    calibration: CalibrationScope,
) -> Result<(), TransportError> {
    if let Err(e) = transport.stop_streaming().await {
        // The device may already be idle.
        debug!(error = %e, "stop before restart reported an error");
    }
    tokio::time::sleep(Duration::from_millis(settle.after_stop_ms)).await;
    transport.write_channel_bitmask(0).await?;
    tokio::time::sleep(Duration::from_millis(settle.after_bitmask_write_ms)).await;
    transport.write_sampling_rate(applied_rate_hz).await?;
    tokio::time::sleep(Duration::from_millis(settle.after_rate_write_ms)).await;
    transport.write_channel_bitmask(bitmask_for(config)).await?;
    tokio::time::sleep(Duration::from_millis(settle.after_bitmask_write_ms)).await;
    transport.request_metadata_refresh().await?;
    tokio::time::sleep(Duration::from_millis(settle.after_metadata_refresh_ms)).await;
    transport.read_calibration(calibration).await?;
    tokio::time::sleep(Duration::from_millis(settle.after_calibration_ms)).await;
    transport.start_streaming().await?;
    Ok(())
}

/// Per-session receive loop. Runs until the transport channel closes or the
/// transport reports itself lost; never blocks on a slow subscriber.
async fn receive_loop(mut rx: mpsc::Receiver<TransportEvent>, shared: Arc<SessionShared>) {
    while let Some(event) = rx.recv().await {
        match event {
            TransportEvent::Frame(frame) => {
                let config = match *shared.active_config.read() {
                    Some(cfg) => cfg,
                    None => continue,
                };
                if shared.index_map.read().is_none() {
                    let map = SignalIndexMap::build(frame.as_ref(), &config);
                    debug!(resolved = map.len(), "signal index map rebuilt");
                    *shared.index_map.write() = Some(map);
                }
                let sample = {
                    let guard = shared.index_map.read();
                    match guard.as_ref() {
                        Some(map) => SampleFrameBuilder::from_probe(
                            map,
                            frame.as_ref(),
                            &config,
                            time::current_timestamp_micros(),
                        ),
                        None => continue,
                    }
                };
                shared.subscribers.publish(SessionEvent::Frame(sample));
            }
            TransportEvent::Wire(sample) => {
                let config = match *shared.active_config.read() {
                    Some(cfg) => cfg,
                    None => continue,
                };
                if let Some(frame) = SampleFrameBuilder::from_wire(
                    &sample,
                    &config,
                    time::current_timestamp_micros(),
                ) {
                    shared.subscribers.publish(SessionEvent::Frame(frame));
                }
            }
            TransportEvent::Lost { reason } => {
                warn!(reason = %reason, "transport lost mid-session");
                shared.faulted.store(true, Ordering::Release);
                shared
                    .subscribers
                    .publish(SessionEvent::SessionLost { reason });
                break;
            }
        }
    }
}
