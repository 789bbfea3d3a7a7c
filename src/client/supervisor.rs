//! Connection supervisor.
//!
//! Owns the reconnect loop and, while connected, the read loop. Exactly one
//! connect attempt or session is active at a time.
//!
//! ```text
//!            ┌──────────── no address ───────────┐
//!            ▼                                   │
//!   ┌─► resolve ──► connect ──ok──► session ──► end ──► wait initial backoff ─┐
//!   │                  │                         │                           │
//!   │                fail                    retarget                        │
//!   │                  ▼                         │                           │
//!   │           wait backoff(n)                  │                           │
//!   └──────────────────┴─────────────────────────┴───────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::config::ClientConfig;
use super::heartbeat::HeartbeatSender;
use super::session::{Session, SessionEnd};
use crate::codec::{DecodeOutcome, decode_payload};
use crate::core::{AddressProvider, Observer};
use crate::transport::{Backoff, ConnectionState, FrameReader, LinkResult, LinkState, ReadEvent, connect};

/// Why an interruptible wait returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Elapsed,
    TargetChanged,
    Cancelled,
}

/// One step of the read loop.
enum Step<'a> {
    Closed,
    TargetChanged,
    Event(LinkResult<ReadEvent<'a>>),
}

pub(crate) struct Supervisor {
    config: ClientConfig,
    state: Arc<LinkState>,
    observer: Arc<dyn Observer>,
    provider: Arc<dyn AddressProvider>,
    /// Explicit target set through the client handle.
    target_rx: watch::Receiver<Option<SocketAddr>>,
    backoff: Backoff,
    cancel: CancellationToken,
}

impl Supervisor {
    pub(crate) fn new(
        config: ClientConfig,
        state: Arc<LinkState>,
        observer: Arc<dyn Observer>,
        provider: Arc<dyn AddressProvider>,
        target_rx: watch::Receiver<Option<SocketAddr>>,
        cancel: CancellationToken,
    ) -> Self {
        let backoff = Backoff::new(config.initial_backoff, config.max_backoff, config.escalation_threshold);
        Self {
            config,
            state,
            observer,
            provider,
            target_rx,
            backoff,
            cancel,
        }
    }

    pub(crate) async fn run(mut self) {
        info!("Connection supervisor started");
        self.state.publish_backoff(&self.backoff);

        while !self.cancel.is_cancelled() {
            let Some(addr) = self.resolve() else {
                trace!("No telemetry address yet");
                self.wait(self.config.address_poll_interval).await;
                continue;
            };

            self.state.set_target(Some(addr));
            self.state.set_connection_state(ConnectionState::Connecting);
            debug!(%addr, attempt = self.backoff.attempt() + 1, "Connecting to telemetry source");

            let attempt = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = connect(addr, self.config.connect_timeout) => result,
            };

            match attempt {
                Ok(stream) => {
                    self.backoff.reset();
                    self.state.publish_backoff(&self.backoff);

                    let end = self.run_session(stream, addr).await;
                    match end {
                        SessionEnd::Stopped => break,
                        end if end.reconnect_immediately() => continue,
                        _ => {
                            self.wait(self.config.initial_backoff).await;
                        }
                    }
                }
                Err(e) => {
                    self.state.set_connection_state(ConnectionState::Disconnected);
                    let step = self.backoff.on_failure();
                    self.state.publish_backoff(&self.backoff);

                    if step.escalate {
                        warn!(
                            %addr,
                            attempts = step.attempt,
                            "Reconnect attempts exhausted, retrying at max backoff"
                        );
                        self.observer.on_reconnect_exhausted();
                    } else if self.backoff.is_escalated() {
                        debug!(%addr, error = %e, attempt = step.attempt, "Reconnect failed");
                    } else {
                        warn!(
                            %addr,
                            error = %e,
                            attempt = step.attempt,
                            delay_ms = step.delay.as_millis() as u64,
                            "Reconnect failed"
                        );
                    }

                    self.wait(step.delay).await;
                }
            }
        }

        self.state.set_connection_state(ConnectionState::Disconnected);
        info!("Connection supervisor stopped");
    }

    /// Explicit target first, then the provider.
    fn resolve(&mut self) -> Option<SocketAddr> {
        let explicit = *self.target_rx.borrow_and_update();
        explicit.or_else(|| self.provider.current_address())
    }

    /// Sleep, waking early on cancellation or a new explicit target.
    ///
    /// A new target resets the backoff so the next attempt is immediate
    /// and starts a fresh streak.
    async fn wait(&mut self, duration: Duration) -> Wake {
        let wake = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Wake::Cancelled,
            changed = self.target_rx.changed() => match changed {
                Ok(()) => Wake::TargetChanged,
                Err(_) => Wake::Cancelled,
            },
            _ = tokio::time::sleep(duration) => Wake::Elapsed,
        };

        if wake == Wake::TargetChanged {
            debug!("Target changed during backoff, reconnecting now");
            self.backoff.reset();
            self.state.publish_backoff(&self.backoff);
        }
        wake
    }

    async fn run_session(&mut self, stream: TcpStream, addr: SocketAddr) -> SessionEnd {
        let (read_half, write_half) = stream.into_split();
        let session = Session::new(&self.cancel);

        self.state.set_connection_state(ConnectionState::Connected);
        self.state.counters().on_connect();
        info!(%addr, "Connected to telemetry source");
        self.observer.on_connection_changed(true);

        let heartbeat = tokio::spawn(
            HeartbeatSender::new(
                write_half,
                self.config.heartbeat_interval,
                self.config.write_timeout,
                session.clone(),
                self.state.clone(),
            )
            .run(),
        );

        let end = self.read_loop(read_half, addr, &session).await;
        session.close(end);
        if let Err(e) = heartbeat.await {
            warn!(error = %e, "Heartbeat task failed");
        }

        self.state.set_connection_state(ConnectionState::Disconnected);
        self.state.counters().on_disconnect();
        if end == SessionEnd::Stopped {
            debug!(%addr, "Session closed by stop");
        } else {
            info!(%addr, reason = %end, "Telemetry session ended");
            self.observer.on_connection_changed(false);
        }
        end
    }

    async fn read_loop(&mut self, read_half: OwnedReadHalf, addr: SocketAddr, session: &Session) -> SessionEnd {
        let mut reader = FrameReader::with_limits(
            read_half,
            self.config.frame_limits(),
            self.config.read_idle_timeout,
            self.config.frame_read_timeout,
        );
        let mut idle_streak: u32 = 0;
        let mut decode_streak: u32 = 0;

        loop {
            // All three branches are cancel-safe; a half-read frame resumes
            // on the next pass.
            let step = tokio::select! {
                biased;
                _ = session.closed() => Step::Closed,
                changed = self.target_rx.changed() => match changed {
                    Ok(()) => Step::TargetChanged,
                    Err(_) => Step::Closed,
                },
                event = reader.next_event() => Step::Event(event),
            };

            let event = match step {
                Step::Closed => return session.end_reason(),
                Step::TargetChanged => {
                    if self.retargeted(addr) {
                        return SessionEnd::Retargeted;
                    }
                    continue;
                }
                Step::Event(event) => event,
            };

            let now = Instant::now();
            match event {
                Ok(ReadEvent::Idle) => {
                    idle_streak += 1;
                    let stalled = self
                        .state
                        .session_data_age(now)
                        .is_some_and(|age| age > self.config.disconnect_clear_threshold);
                    if stalled && idle_streak >= self.config.read_timeout_tolerance {
                        warn!(%addr, idle_streak, "No data from telemetry source, reconnecting");
                        return SessionEnd::ReadStalled;
                    }
                    trace!(idle_streak, "Read idle");
                }
                Ok(ReadEvent::TransportHeartbeat) => {
                    idle_streak = 0;
                    self.state.mark_alive(now);
                    self.state.counters().on_transport_heartbeat();
                    trace!("Transport heartbeat");
                }
                Ok(ReadEvent::Payload(bytes)) => {
                    idle_streak = 0;
                    let outcome = decode_payload(bytes, now.into_std());
                    if outcome.is_liveness() {
                        decode_streak = 0;
                        self.state.mark_alive(now);
                    }
                    match outcome {
                        DecodeOutcome::Data(snapshot) => {
                            let snapshot = Arc::new(snapshot);
                            self.state.publish_snapshot(snapshot.clone());
                            self.state.counters().on_snapshot();
                            self.observer.on_snapshot(Some(snapshot));
                        }
                        DecodeOutcome::EmptyHeartbeat => {
                            self.state.counters().on_application_heartbeat();
                            trace!("Application heartbeat");
                        }
                        DecodeOutcome::Error(e) => {
                            decode_streak += 1;
                            self.state.counters().on_decode_error();
                            debug!(error = %e, decode_streak, len = bytes.len(), "Dropping undecodable payload");
                            if decode_streak >= self.config.decode_error_tolerance {
                                warn!(%addr, decode_streak, "Too many undecodable payloads, reconnecting");
                                return SessionEnd::DecodeErrors;
                            }
                        }
                    }
                }
                Err(e) if e.is_desync() => {
                    warn!(%addr, error = %e, "Framing error, reconnecting");
                    return SessionEnd::FramingError;
                }
                Err(e) => {
                    info!(%addr, error = %e, "Telemetry connection lost");
                    return SessionEnd::TransportError;
                }
            }

            if self.retargeted(addr) {
                return SessionEnd::Retargeted;
            }
        }
    }

    /// Whether a known address now differs from the connected one.
    ///
    /// A provider that temporarily loses the address does not drop a
    /// working connection.
    fn retargeted(&mut self, addr: SocketAddr) -> bool {
        match self.resolve() {
            Some(next) if next != addr => {
                info!(from = %addr, to = %next, "Telemetry target changed");
                true
            }
            _ => false,
        }
    }
}
