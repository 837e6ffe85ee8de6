//! Stroke sync session.
//!
//! ```text
//! Disconnected --start()--> Connecting --ok--> Open --close()--> Closing
//!      ^                        |               |                   |
//!      |                        | error         | error             |
//!      |                        v               v                   |
//!      +-------------------- Error <------------+                   |
//!      +------------------------------------------------------------+
//! ```
//!
//! A peer-initiated close goes from `Open` straight to `Disconnected`.
//!
//! The session is driven by [`SyncSession::poll`], called once per host tick.
//! The transport handshake runs on a short-lived background thread so that
//! neither `start` nor `close` ever blocks on the network; everything else
//! happens on the caller's thread behind `&mut self`.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use super::connection::{DisconnectReason, ProtocolMode, SessionEvent, SessionState};
use super::stats::SessionStats;
use super::tracking::RecentIdWindow;
use super::transport::{Connector, DefaultConnector, Transport, TransportError};
use crate::codec::{Payload, PayloadWrapper};
use crate::config::SessionConfig;
use crate::stroke::Stroke;
use crate::transform::CoordinateTransform;

type StrokeCallback = Box<dyn FnMut(Stroke) + Send>;
type StatusCallback = Box<dyn FnMut(&SessionEvent) + Send>;
type ConnectResult = Result<Box<dyn Transport>, TransportError>;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("cannot start a session that is {0}")]
    InvalidState(SessionState),
    #[error("failed to spawn connect thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub struct SyncSession {
    config: SessionConfig,
    wrapper: PayloadWrapper,
    transform: CoordinateTransform,
    recent: RecentIdWindow,
    connector: Arc<dyn Connector>,
    state: SessionState,
    transport: Option<Box<dyn Transport>>,
    pending_connect: Option<Receiver<ConnectResult>>,
    send_guard: Option<Instant>,
    send_interval: Duration,
    stats: SessionStats,
    on_stroke: Option<StrokeCallback>,
    on_status: Option<StatusCallback>,
}

impl SyncSession {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_connector(config, Arc::new(DefaultConnector))
    }

    pub fn with_connector(config: SessionConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            wrapper: config.wrapper(),
            transform: config.transform(),
            recent: RecentIdWindow::new(config.recent_window),
            send_interval: config.send_interval(),
            connector,
            state: SessionState::Disconnected,
            transport: None,
            pending_connect: None,
            send_guard: None,
            stats: SessionStats::default(),
            on_stroke: None,
            on_status: None,
            config,
        }
    }

    /// Register the consumer of delivered strokes. Replaces any earlier one.
    pub fn on_stroke_received<F>(&mut self, callback: F)
    where
        F: FnMut(Stroke) + Send + 'static,
    {
        self.on_stroke = Some(Box::new(callback));
    }

    pub fn on_status<F>(&mut self, callback: F)
    where
        F: FnMut(&SessionEvent) + Send + 'static,
    {
        self.on_status = Some(Box::new(callback));
    }

    /// Begin connecting. Returns as soon as the handshake thread is running;
    /// the outcome is reported from a later [`poll`](Self::poll).
    pub fn start(&mut self, address: &str, mode: ProtocolMode) -> Result<(), SessionError> {
        if self.state != SessionState::Disconnected {
            return Err(SessionError::InvalidState(self.state));
        }

        log::info!("Connecting to {} over {}", address, mode);

        let (tx, rx) = mpsc::channel();
        let connector = Arc::clone(&self.connector);
        let target = address.to_string();
        let local_bind = self.config.local_bind.clone();

        thread::Builder::new()
            .name("strokesync-connect".into())
            .spawn(move || {
                let result = connector.connect(&target, mode, &local_bind);
                // The session may have been closed or dropped meanwhile.
                let _ = tx.send(result);
            })?;

        self.pending_connect = Some(rx);
        self.set_state(SessionState::Connecting);
        self.emit(SessionEvent::Connecting {
            address: address.to_string(),
            mode,
        });

        Ok(())
    }

    /// Drive the session: finish a pending connect, drain and dispatch
    /// inbound payloads, flush queued sends. Returns strokes delivered.
    pub fn poll(&mut self) -> usize {
        self.poll_connect();
        self.release_expired_guard();

        if self.state != SessionState::Open {
            return 0;
        }

        let Some(transport) = self.transport.as_mut() else {
            return 0;
        };

        let received = transport.receive();
        let payloads = match received {
            Ok(payloads) => payloads,
            Err(TransportError::Closed) => {
                self.teardown(DisconnectReason::RemoteClosed);
                return 0;
            }
            Err(e) => {
                self.fail(DisconnectReason::TransportFailed, e);
                return 0;
            }
        };

        let mut delivered = 0;
        for payload in &payloads {
            delivered += self.dispatch(payload);
        }

        let flushed = self.transport.as_mut().map_or(Ok(()), |t| t.flush());
        if let Err(e) = flushed {
            self.fail(DisconnectReason::TransportFailed, e);
        }

        delivered
    }

    /// Run one payload through decode, length filter, duplicate suppression
    /// and coordinate transform, handing survivors to the stroke callback.
    pub fn dispatch(&mut self, payload: &Payload) -> usize {
        self.stats.payloads_received += 1;
        self.stats.bytes_received += payload.len() as u64;

        let envelope = match self.wrapper.decode(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::warn!("Dropping {} byte payload: {}", payload.len(), e);
                self.stats.malformed_dropped += 1;
                return 0;
            }
        };

        if envelope.strokes.is_empty() {
            log::debug!("No strokes routed from event '{}'", envelope.event);
            return 0;
        }

        // Strokes of one frame share its index, so the window is consulted
        // once per index per payload and the verdict applies to all of them.
        let mut verdicts: Vec<(i32, bool)> = Vec::new();
        let mut delivered = 0;
        for stroke in envelope.strokes {
            self.stats.strokes_decoded += 1;

            if stroke.len() < self.config.min_points {
                log::trace!(
                    "Stroke {} has {} points, below minimum {}",
                    stroke.index(),
                    stroke.len(),
                    self.config.min_points
                );
                self.stats.short_strokes_dropped += 1;
                continue;
            }

            let index = stroke.index();
            let admitted = match verdicts.iter().find(|(i, _)| *i == index) {
                Some(&(_, admitted)) => admitted,
                None => {
                    let admitted = self.recent.admit(index);
                    verdicts.push((index, admitted));
                    admitted
                }
            };
            if !admitted {
                log::trace!("Duplicate stroke {}", stroke.index());
                self.stats.duplicates_dropped += 1;
                continue;
            }

            let stroke = self.transform.apply_stroke(&stroke);
            self.stats.strokes_delivered += 1;
            delivered += 1;

            if let Some(callback) = self.on_stroke.as_mut() {
                callback(stroke);
            }
        }

        delivered
    }

    /// Encode and hand one stroke to the transport.
    ///
    /// Returns `false` without sending when the session is not open or an
    /// earlier send is still inside its guard interval. Rejected strokes are
    /// dropped, not queued.
    pub fn send_stroke(&mut self, stroke: &Stroke) -> bool {
        self.release_expired_guard();

        if self.state != SessionState::Open {
            log::debug!("Send of stroke {} rejected: session {}", stroke.index(), self.state);
            self.stats.sends_rejected += 1;
            return false;
        }
        if self.send_guard.is_some() {
            log::trace!("Send of stroke {} rejected: send pending", stroke.index());
            self.stats.sends_rejected += 1;
            return false;
        }

        let payload = match self.wrapper.encode(stroke) {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("Failed to encode stroke {}: {}", stroke.index(), e);
                self.stats.sends_rejected += 1;
                return false;
            }
        };

        let Some(transport) = self.transport.as_mut() else {
            self.stats.sends_rejected += 1;
            return false;
        };

        match transport.send(&payload) {
            Ok(bytes) => {
                self.send_guard = Some(Instant::now());
                self.stats.strokes_sent += 1;
                self.stats.bytes_sent += bytes as u64;
                true
            }
            Err(e @ TransportError::PayloadTooLarge { .. }) => {
                log::warn!("Stroke {} not sent: {}", stroke.index(), e);
                self.stats.sends_rejected += 1;
                false
            }
            Err(TransportError::Closed) => {
                self.teardown(DisconnectReason::RemoteClosed);
                false
            }
            Err(e) => {
                self.fail(DisconnectReason::TransportFailed, e);
                false
            }
        }
    }

    /// Shut the session down. Safe to call in any state, any number of times.
    pub fn close(&mut self) {
        match self.state {
            SessionState::Disconnected => {}
            SessionState::Connecting => {
                log::info!("Connect abandoned");
                self.pending_connect = None;
                self.teardown(DisconnectReason::Closed);
            }
            SessionState::Open | SessionState::Closing | SessionState::Error => {
                log::info!("Closing session");
                self.set_state(SessionState::Closing);
                self.teardown(DisconnectReason::Closed);
            }
        }
    }

    pub fn connection_status(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn recent_ids(&self) -> &RecentIdWindow {
        &self.recent
    }

    /// True while a send is inside its guard interval.
    pub fn send_pending(&self) -> bool {
        self.send_guard
            .is_some_and(|sent_at| sent_at.elapsed() < self.send_interval)
    }

    fn poll_connect(&mut self) {
        let Some(rx) = self.pending_connect.as_ref() else {
            return;
        };

        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => Err(TransportError::Closed),
        };
        self.pending_connect = None;

        match result {
            Ok(transport) => {
                let peer = transport.describe();
                log::info!("Connected to {}", peer);
                self.transport = Some(transport);
                self.send_guard = None;
                self.set_state(SessionState::Open);
                self.emit(SessionEvent::Connected { peer });
            }
            Err(e) => self.fail(DisconnectReason::ConnectFailed, e),
        }
    }

    fn release_expired_guard(&mut self) {
        if self
            .send_guard
            .is_some_and(|sent_at| sent_at.elapsed() >= self.send_interval)
        {
            self.send_guard = None;
        }
    }

    fn fail(&mut self, reason: DisconnectReason, error: TransportError) {
        log::warn!("Session error ({}): {}", reason.as_str(), error);
        self.set_state(SessionState::Error);
        self.emit(SessionEvent::Error {
            message: error.to_string(),
        });
        self.teardown(reason);
    }

    fn teardown(&mut self, reason: DisconnectReason) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.send_guard = None;
        self.set_state(SessionState::Disconnected);
        self.emit(SessionEvent::Disconnected { reason });
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            log::debug!("Session {} -> {}", self.state, state);
            self.state = state;
        }
    }

    fn emit(&mut self, event: SessionEvent) {
        if let Some(callback) = self.on_status.as_mut() {
            callback(&event);
        }
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
    }
}
