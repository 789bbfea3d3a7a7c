//! Outbound heartbeat task.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{trace, warn};

use super::session::{Session, SessionEnd};
use crate::transport::{LinkState, write_probe};

/// Writes a liveness probe on a fixed interval for one session.
///
/// Owns the write half of the socket. A failed or timed-out write closes
/// the session.
pub(crate) struct HeartbeatSender<W> {
    writer: W,
    interval: Duration,
    write_timeout: Duration,
    session: Arc<Session>,
    state: Arc<LinkState>,
}

impl<W: AsyncWrite + Unpin + Send + 'static> HeartbeatSender<W> {
    pub(crate) fn new(
        writer: W,
        interval: Duration,
        write_timeout: Duration,
        session: Arc<Session>,
        state: Arc<LinkState>,
    ) -> Self {
        Self {
            writer,
            interval,
            write_timeout,
            session,
            state,
        }
    }

    /// Run until the session closes.
    pub(crate) async fn run(mut self) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.session.closed() => return,
                _ = ticker.tick() => {}
            }

            let written = tokio::select! {
                biased;
                _ = self.session.closed() => return,
                result = write_probe(&mut self.writer, self.write_timeout) => result,
            };

            match written {
                Ok(()) => {
                    self.state.counters().on_heartbeat_sent();
                    trace!("Heartbeat sent");
                }
                Err(e) => {
                    warn!(error = %e, "Heartbeat write failed, closing session");
                    self.session.close(SessionEnd::HeartbeatFailed);
                    return;
                }
            }
        }
    }
}
