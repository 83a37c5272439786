// src/relay/client.rs
//! Relay socket transport
//!
//! Connects to a relay process that owns the actual hardware link and exposes
//! the line-oriented JSON protocol from `relay::codec`. A dedicated read task
//! decodes incoming lines: acknowledgments resolve their pending-request
//! slots, samples are forwarded to the session sink, and a wire `error` fails
//! everything in flight. Malformed lines are dropped where they are decoded;
//! a corrupt message never takes the read task down.

use crate::config::{AckTimeouts, SensorConfiguration};
use crate::error::{SubscribeError, TransportError};
use crate::hal::traits::{SensorTransport, TransportEvent};
use crate::hal::types::{Backend, CalibrationScope, TransportCaps};
use crate::relay::codec::{self, RelayCommand, RelayEvent};
use crate::relay::pending::{AckPayload, PendingTable, RequestKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// State shared with the read task.
#[derive(Default)]
struct RelayShared {
    connected: AtomicBool,
    subscribed: AtomicBool,
    /// Set while a deliberate disconnect is in progress so the read task
    /// does not report it as a fault.
    closing: AtomicBool,
    mode_label: Mutex<Option<String>>,
    reported_rate: Mutex<Option<f64>>,
}

/// `SensorTransport` adapter for the network-relay backend.
pub struct RelayTransport {
    host: String,
    port: u16,
    device: String,
    timeouts: AckTimeouts,
    writer: Option<OwnedWriteHalf>,
    pending: Arc<PendingTable>,
    shared: Arc<RelayShared>,
    sink: Option<mpsc::Sender<TransportEvent>>,
    read_task: Option<JoinHandle<()>>,
}

impl RelayTransport {
    pub fn new(host: String, port: u16, device: String, timeouts: AckTimeouts) -> Self {
        Self {
            host,
            port,
            device,
            timeouts,
            writer: None,
            pending: Arc::new(PendingTable::new()),
            shared: Arc::new(RelayShared::default()),
            sink: None,
            read_task: None,
        }
    }

    fn target(&self) -> String {
        format!("relay://{}:{}/{}", self.host, self.port, self.device)
    }

    async fn send_line(&mut self, command: &RelayCommand) -> Result<(), TransportError> {
        let line = codec::encode_command(command)
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e.to_string()))?;
        let writer = self.writer.as_mut().ok_or(TransportError::NotConnected)?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Send a command and await its acknowledgment within `timeout_ms`.
    ///
    /// On timeout the pending slot is discarded; the command is not
    /// cancelled, and a late acknowledgment is simply ignored.
    async fn request(
        &mut self,
        kind: RequestKind,
        command: &RelayCommand,
        timeout_ms: u64,
    ) -> Result<AckPayload, TransportError> {
        let rx = self.pending.register(kind)?;
        if let Err(e) = self.send_line(command).await {
            self.pending.discard(kind);
            return Err(e);
        }
        match tokio::time::timeout(Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TransportError::ConnectionLost {
                reason: "receive loop terminated".to_string(),
            }),
            Err(_) => {
                self.pending.discard(kind);
                Err(TransportError::AckTimeout {
                    request: kind.as_str(),
                    elapsed_ms: timeout_ms,
                })
            }
        }
    }

    /// Reissue `open` on a fixed cadence until confirmed or the retry budget
    /// is exhausted. The relay may race with its own device bring-up, so
    /// silence here is "not subscribed yet", not a hard failure.
    async fn try_subscribe(&mut self) -> Result<bool, TransportError> {
        let attempts = self.timeouts.open_retry_attempts;
        let spacing = self.timeouts.open_retry_spacing_ms;
        let command = RelayCommand::Open { address: self.device.clone() };

        for attempt in 1..=attempts {
            match self.request(RequestKind::Open, &command, spacing).await {
                Ok(payload) if payload.ok => {
                    self.shared.subscribed.store(true, Ordering::Release);
                    debug!(target = %self.target(), attempt, "device subscription confirmed");
                    return Ok(true);
                }
                Ok(_) | Err(TransportError::AckTimeout { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        let soft = SubscribeError::NotConfirmed {
            address: self.device.clone(),
            attempts,
        };
        warn!(target = %self.target(), error = %soft, "continuing unsubscribed");
        Ok(false)
    }

    fn teardown(&mut self) {
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
        self.writer = None;
        self.pending.fail_all("transport closed");
        self.shared.connected.store(false, Ordering::Release);
        self.shared.subscribed.store(false, Ordering::Release);
    }
}

impl Drop for RelayTransport {
    fn drop(&mut self) {
        self.shared.closing.store(true, Ordering::Release);
        self.teardown();
    }
}

#[async_trait]
impl SensorTransport for RelayTransport {
    fn caps(&self) -> TransportCaps {
        TransportCaps {
            backend: Backend::RelaySocket,
            needs_settle_sequence: false,
            base_clock_hz: None,
        }
    }

    fn attach_sink(&mut self, sink: mpsc::Sender<TransportEvent>) {
        self.sink = Some(sink);
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        let target = self.target();
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| TransportError::OpenFailed {
                target: target.clone(),
                reason: e.to_string(),
            })?;
        let (read_half, write_half) = stream.into_split();
        self.writer = Some(write_half);
        self.shared.closing.store(false, Ordering::Release);
        self.read_task = Some(tokio::spawn(read_loop(
            read_half,
            Arc::clone(&self.pending),
            Arc::clone(&self.shared),
            self.sink.clone(),
        )));

        // Handshake: hello is a hard gate with a short budget.
        let hello_budget = self.timeouts.hello_ms;
        match self.request(RequestKind::Hello, &RelayCommand::Hello, hello_budget).await {
            Ok(payload) if payload.ok => {}
            Ok(_) => {
                self.teardown();
                return Err(TransportError::HandshakeRefused {
                    target,
                    reason: "relay rejected hello".to_string(),
                });
            }
            Err(TransportError::AckTimeout { .. }) => {
                self.teardown();
                return Err(TransportError::HandshakeTimeout {
                    target,
                    elapsed_ms: hello_budget,
                });
            }
            Err(e) => {
                self.teardown();
                return Err(e);
            }
        }

        // Subscription is soft; current configuration is requested
        // best-effort so the mode label and applied rate populate.
        if let Err(e) = self.try_subscribe().await {
            self.teardown();
            return Err(e);
        }
        let config_budget = self.timeouts.config_ms;
        if let Err(e) = self
            .request(RequestKind::GetConfig, &RelayCommand::GetConfig, config_budget)
            .await
        {
            debug!(target = %self.target(), error = %e, "get_config unanswered after connect");
        }

        self.shared.connected.store(true, Ordering::Release);
        info!(target = %self.target(), "relay session established");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.shared.closing.store(true, Ordering::Release);
        if self.writer.is_some() {
            if let Err(e) = self.send_line(&RelayCommand::Close).await {
                debug!(error = %e, "close notification failed during disconnect");
            }
        }
        // Cancel the read task and wait for it to exit before releasing the
        // socket: no sample callback may fire after this returns.
        if let Some(task) = self.read_task.take() {
            task.abort();
            let _ = task.await;
        }
        self.writer = None;
        self.pending.fail_all("disconnected");
        self.shared.connected.store(false, Ordering::Release);
        self.shared.subscribed.store(false, Ordering::Release);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    async fn write_sampling_rate(&mut self, rate_hz: f64) -> Result<(), TransportError> {
        let budget = self.timeouts.rate_ms;
        let payload = self
            .request(
                RequestKind::SetSamplingRate,
                &RelayCommand::SetSamplingRate { rate_hz },
                budget,
            )
            .await?;
        if !payload.ok {
            return Err(TransportError::NegativeAck { request: "set_sampling_rate" });
        }
        if let Some(applied) = payload.applied_hz {
            *self.shared.reported_rate.lock() = Some(applied);
        }
        Ok(())
    }

    async fn write_channel_bitmask(&mut self, _mask: u32) -> Result<(), TransportError> {
        // The relay configures channels through set_config; there is no raw
        // bitmask command on the wire.
        Ok(())
    }

    async fn push_configuration(
        &mut self,
        config: &SensorConfiguration,
    ) -> Result<(), TransportError> {
        let budget = self.timeouts.config_ms;
        let payload = self
            .request(
                RequestKind::SetConfig,
                &RelayCommand::SetConfig { config: *config },
                budget,
            )
            .await?;
        if !payload.ok {
            return Err(TransportError::NegativeAck { request: "set_config" });
        }
        Ok(())
    }

    async fn request_metadata_refresh(&mut self) -> Result<(), TransportError> {
        let budget = self.timeouts.config_ms;
        self.request(RequestKind::GetConfig, &RelayCommand::GetConfig, budget)
            .await?;
        Ok(())
    }

    async fn read_calibration(&mut self, _scope: CalibrationScope) -> Result<(), TransportError> {
        // Calibration lives behind the relay; nothing to reload client-side.
        Ok(())
    }

    async fn start_streaming(&mut self) -> Result<(), TransportError> {
        if !self.shared.subscribed.load(Ordering::Acquire) {
            self.try_subscribe().await?;
        }
        let budget = self.timeouts.start_ms;
        let payload = self
            .request(RequestKind::Start, &RelayCommand::Start, budget)
            .await?;
        if !payload.ok {
            return Err(TransportError::NegativeAck { request: "start" });
        }
        Ok(())
    }

    async fn stop_streaming(&mut self) -> Result<(), TransportError> {
        // Fire-and-forget: stop is not acknowledged reliably by the relay
        // and the session transitions out of Streaming regardless.
        self.send_line(&RelayCommand::Stop).await
    }

    fn reported_mode_label(&self) -> Option<String> {
        self.shared.mode_label.lock().clone()
    }

    fn reported_sampling_rate(&self) -> Option<f64> {
        *self.shared.reported_rate.lock()
    }
}

async fn read_loop(
    read_half: OwnedReadHalf,
    pending: Arc<PendingTable>,
    shared: Arc<RelayShared>,
    sink: Option<mpsc::Sender<TransportEvent>>,
) {
    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => handle_line(&line, &pending, &shared, sink.as_ref()).await,
            Ok(None) => {
                report_lost(&pending, &shared, sink.as_ref(), "relay closed the connection").await;
                break;
            }
            Err(e) => {
                report_lost(&pending, &shared, sink.as_ref(), &e.to_string()).await;
                break;
            }
        }
    }
}

async fn handle_line(
    line: &str,
    pending: &PendingTable,
    shared: &RelayShared,
    sink: Option<&mpsc::Sender<TransportEvent>>,
) {
    let event = match codec::decode_line(line) {
        Ok(event) => event,
        Err(e) => {
            // A corrupt frame is dropped here and never aborts the loop.
            debug!(error = %e, "dropping malformed wire line");
            return;
        }
    };

    match event {
        RelayEvent::HelloAck { ok } => {
            resolve_ack(pending, RequestKind::Hello, ok, None);
        }
        RelayEvent::OpenAck { ok } => {
            resolve_ack(pending, RequestKind::Open, ok, None);
        }
        RelayEvent::ConfigAck { ok } => {
            resolve_ack(pending, RequestKind::SetConfig, ok, None);
        }
        RelayEvent::StartAck { ok } => {
            resolve_ack(pending, RequestKind::Start, ok, None);
        }
        RelayEvent::SetSamplingRateAck { ok, applied_hz } => {
            if let Some(applied) = applied_hz {
                *shared.reported_rate.lock() = Some(applied);
            }
            resolve_ack(pending, RequestKind::SetSamplingRate, ok, applied_hz);
        }
        RelayEvent::Config(remote) | RelayEvent::ConfigChanged(remote) => {
            if let Some(mode) = remote.exg_mode {
                *shared.mode_label.lock() = Some(mode);
            }
            if let Some(rate) = remote.sampling_rate_hz {
                *shared.reported_rate.lock() = Some(rate);
            }
            pending.resolve(RequestKind::GetConfig, Ok(AckPayload::ok()));
        }
        RelayEvent::Sample(sample) => {
            if let Some(sink) = sink {
                // In-order delivery; the session loop drains fast and never
                // blocks on its subscribers.
                let _ = sink.send(TransportEvent::Wire(sample)).await;
            }
        }
        RelayEvent::Error { message } => {
            warn!(message = %message, "relay reported an error, failing in-flight requests");
            pending.fail_all(&message);
        }
        RelayEvent::Ignored => {}
    }
}

fn resolve_ack(pending: &PendingTable, kind: RequestKind, ok: bool, applied_hz: Option<f64>) {
    let payload = match (ok, applied_hz) {
        (true, None) => AckPayload::ok(),
        (false, None) => AckPayload::rejected(),
        _ => AckPayload { ok, applied_hz },
    };
    pending.resolve(kind, Ok(payload));
}

async fn report_lost(
    pending: &PendingTable,
    shared: &RelayShared,
    sink: Option<&mpsc::Sender<TransportEvent>>,
    reason: &str,
) {
    if shared.closing.load(Ordering::Acquire) {
        return;
    }
    shared.connected.store(false, Ordering::Release);
    shared.subscribed.store(false, Ordering::Release);
    pending.fail_all(reason);
    warn!(reason = %reason, "relay transport lost");
    if let Some(sink) = sink {
        let _ = sink
            .send(TransportEvent::Lost { reason: reason.to_string() })
            .await;
    }
}
