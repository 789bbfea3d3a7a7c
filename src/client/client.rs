//! High-level telemetry client API.
//!
//! Provides [`TelemetryClient`], a handle that owns the background tasks
//! keeping a TCP telemetry link alive and exposes the latest snapshot.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::config::ClientConfig;
use super::monitor::{LivenessTracker, StalenessMonitor};
use super::supervisor::Supervisor;
use crate::codec::Snapshot;
use crate::core::{AddressProvider, ConfigError, Observer};
use crate::transport::{ConnectionState, LinkState, LinkStatus};

/// Errors that can occur in the telemetry client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration rejected.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// `start()` was called outside a Tokio runtime.
    #[error("no tokio runtime available")]
    NoRuntime,
}

/// Background tasks of a started client.
struct Running {
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

/// A telemetry client.
///
/// Connects to a telemetry source over TCP, keeps the link alive with
/// heartbeats and reconnects with backoff, and publishes every decoded
/// [`Snapshot`] to an [`Observer`].
///
/// # Example
///
/// ```ignore
/// use telemetry_link::client::{ChannelObserver, StaticAddress, TelemetryClient};
///
/// let (observer, mut events) = ChannelObserver::new();
/// let client = TelemetryClient::new(ClientConfig::default(), Arc::new(observer))?;
/// client.start(Arc::new(StaticAddress("192.168.1.20:7711".parse()?)))?;
///
/// while let Some(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// ```
pub struct TelemetryClient {
    config: ClientConfig,
    state: Arc<LinkState>,
    observer: Arc<dyn Observer>,
    /// Explicit target override, observed by the supervisor.
    target_tx: watch::Sender<Option<SocketAddr>>,
    running: Mutex<Option<Running>>,
}

impl TelemetryClient {
    /// Create a stopped client.
    pub fn new(config: ClientConfig, observer: Arc<dyn Observer>) -> Result<Self, ClientError> {
        config.validate()?;
        let (target_tx, _) = watch::channel(None);
        Ok(Self {
            config,
            state: Arc::new(LinkState::new()),
            observer,
            target_tx,
            running: Mutex::new(None),
        })
    }

    /// Start the background tasks.
    ///
    /// `provider` is polled for the source address before each connect
    /// attempt and while connected. Calling `start` on a running client
    /// does nothing.
    pub fn start(&self, provider: Arc<dyn AddressProvider>) -> Result<(), ClientError> {
        let mut running = self.lock_running();
        if running.is_some() {
            return Ok(());
        }
        let handle = Handle::try_current().map_err(|_| ClientError::NoRuntime)?;

        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();

        let supervisor = Supervisor::new(
            self.config.clone(),
            self.state.clone(),
            self.observer.clone(),
            provider,
            self.target_tx.subscribe(),
            cancel.child_token(),
        );
        tasks.spawn_on(supervisor.run(), &handle);

        let monitor = StalenessMonitor::new(
            LivenessTracker::new(self.config.stale_threshold, self.config.disconnect_clear_threshold),
            self.config.monitor_tick,
            self.state.clone(),
            self.observer.clone(),
            cancel.child_token(),
        );
        tasks.spawn_on(monitor.run(), &handle);

        info!("Telemetry client started");
        *running = Some(Running { cancel, tasks });
        Ok(())
    }

    /// Stop the background tasks and close the connection.
    ///
    /// Waits up to the configured grace period, then aborts whatever is
    /// still running. The snapshot is cleared and the observer is told
    /// the link is down. Stopping a stopped client does nothing.
    pub async fn stop(&self) {
        let running = self.lock_running().take();
        let Some(mut running) = running else {
            return;
        };

        running.cancel.cancel();
        let drain = async {
            while running.tasks.join_next().await.is_some() {}
        };
        if time::timeout(self.config.shutdown_grace, drain).await.is_err() {
            warn!("Client tasks did not stop within grace period, aborting");
            running.tasks.abort_all();
            while running.tasks.join_next().await.is_some() {}
        }

        self.state.set_connection_state(ConnectionState::Disconnected);
        self.state.clear_snapshot();
        self.state.clear_last_data();
        if self.state.set_stale(false) {
            self.observer.on_stale_changed(false);
        }
        self.observer.on_snapshot(None);
        self.observer.on_connection_changed(false);
        info!("Telemetry client stopped");
    }

    /// Point the client at `addr`, overriding the address provider.
    ///
    /// If this changes the target, the current connection is closed and a
    /// new attempt starts immediately with a fresh backoff.
    pub fn set_target(&self, addr: SocketAddr) {
        let changed = self.target_tx.send_if_modified(|target| {
            if *target == Some(addr) {
                return false;
            }
            *target = Some(addr);
            true
        });
        if changed {
            info!(%addr, "Telemetry target set");
        }
    }

    /// Latest snapshot, if any.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.state.snapshot()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.state.connection_state()
    }

    /// Check if a socket is open.
    pub fn is_connected(&self) -> bool {
        self.connection_state().is_connected()
    }

    /// Connected but no fresh data.
    pub fn is_stale(&self) -> bool {
        self.state.is_stale()
    }

    /// Full status view.
    pub fn status(&self) -> LinkStatus {
        self.state.status(Instant::now())
    }

    /// Check if background tasks are running.
    pub fn is_running(&self) -> bool {
        self.lock_running().is_some()
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn lock_running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TelemetryClient {
    fn drop(&mut self) {
        // Dropping the JoinSet aborts whatever is left.
        if let Some(running) = self.lock_running().take() {
            running.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for TelemetryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryClient")
            .field("state", &self.connection_state())
            .field("target", &self.state.target())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ChannelObserver, ClientEvent, SharedAddress, StaticAddress, TelemetryClientBuilder};
    use crate::codec::{
        CarState, SnapshotData, application_heartbeat_payload, encode_frame, encode_payload, transport_heartbeat_frame,
    };
    use crate::core::constants::HEARTBEAT_PROBE;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn fast_config() -> ClientConfig {
        TelemetryClientBuilder::new()
            .connect_timeout(ms(500))
            .read_idle_timeout(ms(100))
            .frame_read_timeout(ms(300))
            .write_timeout(ms(200))
            .heartbeat_interval(ms(100))
            .stale_threshold(ms(300))
            .disconnect_clear_threshold(ms(2000))
            .monitor_tick(ms(20))
            .address_poll_interval(ms(20))
            .backoff(ms(20), ms(80))
            .escalation_threshold(3)
            .shutdown_grace(ms(500))
            .build()
            .unwrap()
    }

    fn client(config: ClientConfig) -> (TelemetryClient, UnboundedReceiver<ClientEvent>) {
        let (observer, events) = ChannelObserver::new();
        (TelemetryClient::new(config, Arc::new(observer)).unwrap(), events)
    }

    fn data_frame(sequence: i64) -> Vec<u8> {
        let data = SnapshotData {
            car_state: Some(CarState {
                v_ego: 27.5,
                ..Default::default()
            }),
            ..Default::default()
        };
        encode_frame(&encode_payload(sequence, 1_700_000_000.0, &data).unwrap()).unwrap()
    }

    /// Wait for the first event matching `pred`, skipping others.
    async fn next_matching(
        events: &mut UnboundedReceiver<ClientEvent>,
        pred: impl Fn(&ClientEvent) -> bool,
    ) -> ClientEvent {
        time::timeout(Duration::from_secs(5), async {
            loop {
                match events.recv().await {
                    Some(event) if pred(&event) => return event,
                    Some(_) => continue,
                    None => panic!("observer channel closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        time::timeout(Duration::from_secs(5), async {
            while !cond() {
                time::sleep(ms(10)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    async fn listener() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let config = ClientConfig {
            stale_threshold: Duration::from_secs(20),
            ..ClientConfig::default()
        };
        let (observer, _events) = ChannelObserver::new();
        assert!(matches!(
            TelemetryClient::new(config, Arc::new(observer)),
            Err(ClientError::Config(ConfigError::ThresholdOrder))
        ));
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let (client, _events) = client(fast_config());
        let addr: SocketAddr = "127.0.0.1:7711".parse().unwrap();
        assert!(matches!(
            client.start(Arc::new(StaticAddress(addr))),
            Err(ClientError::NoRuntime)
        ));
        assert!(!client.is_running());
    }

    #[tokio::test]
    async fn test_receives_snapshot() {
        let (listener, addr) = listener().await;
        let (client, mut events) = client(fast_config());
        client.start(Arc::new(StaticAddress(addr))).unwrap();

        let (mut server, _) = listener.accept().await.unwrap();
        server.write_all(&data_frame(42)).await.unwrap();

        assert_eq!(
            next_matching(&mut events, |e| matches!(e, ClientEvent::ConnectionChanged(_))).await,
            ClientEvent::ConnectionChanged(true)
        );
        let ClientEvent::Snapshot(Some(snapshot)) =
            next_matching(&mut events, |e| matches!(e, ClientEvent::Snapshot(_))).await
        else {
            panic!("expected a snapshot");
        };
        assert_eq!(snapshot.sequence, 42);
        assert_eq!(snapshot.data.car_state.as_ref().unwrap().v_ego, 27.5);

        assert_eq!(client.snapshot().unwrap().sequence, 42);
        assert!(client.is_connected());
        assert_eq!(client.status().target, Some(addr));

        client.stop().await;
    }

    #[tokio::test]
    async fn test_heartbeats_then_bad_length_forces_reconnect() {
        let (listener, addr) = listener().await;
        let (client, mut events) = client(fast_config());
        client.start(Arc::new(StaticAddress(addr))).unwrap();

        let (mut server, _) = listener.accept().await.unwrap();
        let mut stream = Vec::new();
        stream.extend_from_slice(&0u32.to_be_bytes());
        stream.extend_from_slice(&0u32.to_be_bytes());
        stream.extend_from_slice(&data_frame(1));
        stream.extend_from_slice(&0u32.to_be_bytes());
        stream.extend_from_slice(&(-5i32).to_be_bytes());
        server.write_all(&stream).await.unwrap();

        next_matching(&mut events, |e| matches!(e, ClientEvent::Snapshot(Some(_)))).await;
        assert_eq!(
            next_matching(&mut events, |e| matches!(e, ClientEvent::ConnectionChanged(false))).await,
            ClientEvent::ConnectionChanged(false)
        );

        let stats = client.status().stats;
        assert_eq!(stats.transport_heartbeats, 3);
        assert_eq!(stats.snapshots, 1);
        assert_eq!(stats.disconnects, 1);

        // Reconnects after the initial backoff.
        let (_server, _) = time::timeout(Duration::from_secs(2), listener.accept())
            .await
            .unwrap()
            .unwrap();
        next_matching(&mut events, |e| matches!(e, ClientEvent::ConnectionChanged(true))).await;
        assert_eq!(client.status().stats.connects, 2);

        client.stop().await;
    }

    #[tokio::test]
    async fn test_heartbeat_frames_do_not_notify_snapshot() {
        let (listener, addr) = listener().await;
        let (client, mut events) = client(fast_config());
        client.start(Arc::new(StaticAddress(addr))).unwrap();

        let (mut server, _) = listener.accept().await.unwrap();
        server.write_all(&0u32.to_be_bytes()).await.unwrap();
        server
            .write_all(&encode_frame(&application_heartbeat_payload(9, 0.0).unwrap()).unwrap())
            .await
            .unwrap();

        wait_until(|| {
            let stats = client.status().stats;
            stats.transport_heartbeats == 1 && stats.application_heartbeats == 1
        })
        .await;

        assert!(client.snapshot().is_none());
        assert!(client.status().data_age.is_some());
        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, ClientEvent::Snapshot(_)), "unexpected {event:?}");
        }

        client.stop().await;
    }

    #[tokio::test]
    async fn test_sends_heartbeat_probes() {
        let (listener, addr) = listener().await;
        let (client, _events) = client(fast_config());
        client.start(Arc::new(StaticAddress(addr))).unwrap();

        let (mut server, _) = listener.accept().await.unwrap();
        let mut probe = [0xFFu8; 4];
        time::timeout(Duration::from_secs(2), server.read_exact(&mut probe))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(probe, HEARTBEAT_PROBE);

        wait_until(|| client.status().stats.heartbeats_sent >= 1).await;
        client.stop().await;
    }

    #[tokio::test]
    async fn test_stale_edges_fire_once() {
        let (listener, addr) = listener().await;
        let (client, mut events) = client(fast_config());
        client.start(Arc::new(StaticAddress(addr))).unwrap();

        let (mut server, _) = listener.accept().await.unwrap();
        server.write_all(&data_frame(1)).await.unwrap();
        next_matching(&mut events, |e| matches!(e, ClientEvent::Snapshot(Some(_)))).await;

        assert_eq!(
            next_matching(&mut events, |e| matches!(e, ClientEvent::StaleChanged(_))).await,
            ClientEvent::StaleChanged(true)
        );
        assert!(client.is_stale());
        assert!(client.is_connected());

        // Stay stale for a while; no repeated edge.
        time::sleep(ms(200)).await;
        server.write_all(&data_frame(2)).await.unwrap();

        let mut stale_edges = Vec::new();
        loop {
            match next_matching(&mut events, |e| matches!(e, ClientEvent::StaleChanged(_) | ClientEvent::Snapshot(_))).await {
                ClientEvent::StaleChanged(stale) => {
                    stale_edges.push(stale);
                    if !stale {
                        break;
                    }
                }
                _ => continue,
            }
        }
        assert_eq!(stale_edges, vec![false]);
        assert!(!client.is_stale());

        client.stop().await;
    }

    #[tokio::test]
    async fn test_decode_errors_force_reconnect() {
        let (listener, addr) = listener().await;
        let config = TelemetryClientBuilder::new()
            .read_idle_timeout(ms(100))
            .heartbeat_interval(ms(100))
            .monitor_tick(ms(20))
            .backoff(ms(20), ms(80))
            .decode_error_tolerance(3)
            .build()
            .unwrap();
        let (client, mut events) = client(config);
        client.start(Arc::new(StaticAddress(addr))).unwrap();

        let (mut server, _) = listener.accept().await.unwrap();
        for _ in 0..3 {
            server.write_all(&encode_frame(b"not json").unwrap()).await.unwrap();
        }

        next_matching(&mut events, |e| matches!(e, ClientEvent::ConnectionChanged(false))).await;
        assert_eq!(client.status().stats.decode_errors, 3);
        assert!(client.snapshot().is_none());

        client.stop().await;
    }

    #[tokio::test]
    async fn test_decode_error_streak_resets_on_good_payload() {
        let (listener, addr) = listener().await;
        let config = TelemetryClientBuilder::new()
            .read_idle_timeout(ms(100))
            .monitor_tick(ms(20))
            .decode_error_tolerance(3)
            .build()
            .unwrap();
        let (client, mut events) = client(config);
        client.start(Arc::new(StaticAddress(addr))).unwrap();

        let (mut server, _) = listener.accept().await.unwrap();
        let garbage = encode_frame(b"{").unwrap();
        let mut stream = Vec::new();
        for sequence in 0..3 {
            stream.extend_from_slice(&garbage);
            stream.extend_from_slice(&garbage);
            stream.extend_from_slice(&data_frame(sequence));
        }
        server.write_all(&stream).await.unwrap();

        wait_until(|| client.status().stats.snapshots == 3).await;
        assert_eq!(client.status().stats.decode_errors, 6);
        assert_eq!(client.status().stats.disconnects, 0);
        assert!(client.is_connected());
        while let Ok(event) = events.try_recv() {
            assert_ne!(event, ClientEvent::ConnectionChanged(false));
        }

        client.stop().await;
    }

    #[tokio::test]
    async fn test_reconnect_exhausted_fires_once() {
        // Bind then drop to get a port nobody listens on.
        let (listener, addr) = listener().await;
        drop(listener);

        let (client, mut events) = client(fast_config());
        client.start(Arc::new(StaticAddress(addr))).unwrap();

        assert_eq!(
            next_matching(&mut events, |e| matches!(e, ClientEvent::ReconnectExhausted)).await,
            ClientEvent::ReconnectExhausted
        );
        let status = client.status();
        assert!(status.escalated);
        assert!(status.reconnect_attempt >= 3);

        // Keeps retrying at max backoff without signalling again.
        time::sleep(ms(400)).await;
        assert!(client.status().reconnect_attempt > status.reconnect_attempt);
        assert_eq!(client.status().next_backoff, ms(80));
        while let Ok(event) = events.try_recv() {
            assert_ne!(event, ClientEvent::ReconnectExhausted);
        }

        client.stop().await;
    }

    #[tokio::test]
    async fn test_set_target_moves_connection() {
        let (first, first_addr) = listener().await;
        let (second, second_addr) = listener().await;
        let (client, mut events) = client(fast_config());
        client.start(Arc::new(StaticAddress(first_addr))).unwrap();

        let (mut old_server, _) = first.accept().await.unwrap();
        next_matching(&mut events, |e| matches!(e, ClientEvent::ConnectionChanged(true))).await;

        client.set_target(second_addr);
        let (_new_server, _) = time::timeout(Duration::from_secs(2), second.accept())
            .await
            .unwrap()
            .unwrap();

        // The old connection gets closed.
        let mut buf = [0u8; 64];
        let closed = time::timeout(Duration::from_secs(2), async {
            loop {
                match old_server.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => continue,
                }
            }
        })
        .await;
        assert!(closed.is_ok());

        wait_until(|| client.is_connected() && client.status().target == Some(second_addr)).await;
        assert_eq!(client.status().reconnect_attempt, 0);

        client.stop().await;
    }

    #[tokio::test]
    async fn test_set_target_same_address_keeps_connection() {
        let (listener, addr) = listener().await;
        let (client, mut events) = client(fast_config());
        client.start(Arc::new(StaticAddress(addr))).unwrap();

        let (_server, _) = listener.accept().await.unwrap();
        next_matching(&mut events, |e| matches!(e, ClientEvent::ConnectionChanged(true))).await;

        client.set_target(addr);
        time::sleep(ms(200)).await;

        assert!(client.is_connected());
        assert_eq!(client.status().stats.connects, 1);

        client.stop().await;
    }

    #[tokio::test]
    async fn test_set_target_mid_frame_keeps_stream_in_sync() {
        let (listener, addr) = listener().await;
        let (client, mut events) = client(fast_config());
        client.start(Arc::new(StaticAddress(addr))).unwrap();

        let (mut server, _) = listener.accept().await.unwrap();
        next_matching(&mut events, |e| matches!(e, ClientEvent::ConnectionChanged(true))).await;

        // Header plus the first bytes of the payload, then a target update
        // that resolves to the connected address.
        let first = data_frame(1);
        server.write_all(&first[..14]).await.unwrap();
        time::sleep(ms(30)).await;
        client.set_target(addr);
        time::sleep(ms(30)).await;
        server.write_all(&first[14..]).await.unwrap();
        server.write_all(&data_frame(2)).await.unwrap();

        wait_until(|| client.status().stats.snapshots == 2).await;
        let stats = client.status().stats;
        assert_eq!(stats.connects, 1);
        assert_eq!(stats.disconnects, 0);
        assert_eq!(stats.decode_errors, 0);
        assert_eq!(client.snapshot().unwrap().sequence, 2);

        client.stop().await;
    }

    #[tokio::test]
    async fn test_waits_for_address() {
        let (listener, addr) = listener().await;
        let discovery = SharedAddress::new();
        let (client, mut events) = client(fast_config());
        client.start(Arc::new(discovery.clone())).unwrap();

        time::sleep(ms(100)).await;
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert_eq!(client.status().reconnect_attempt, 0);
        assert!(events.try_recv().is_err());

        discovery.set(Some(addr));
        let (_server, _) = time::timeout(Duration::from_secs(2), listener.accept())
            .await
            .unwrap()
            .unwrap();
        next_matching(&mut events, |e| matches!(e, ClientEvent::ConnectionChanged(true))).await;

        client.stop().await;
    }

    #[tokio::test]
    async fn test_stop_notifies_and_closes_socket() {
        let (listener, addr) = listener().await;
        let (client, mut events) = client(fast_config());
        client.start(Arc::new(StaticAddress(addr))).unwrap();
        // Second start is a no-op.
        client.start(Arc::new(StaticAddress(addr))).unwrap();

        let (mut server, _) = listener.accept().await.unwrap();
        server.write_all(&data_frame(5)).await.unwrap();
        next_matching(&mut events, |e| matches!(e, ClientEvent::Snapshot(Some(_)))).await;

        client.stop().await;
        assert!(!client.is_running());
        assert!(client.snapshot().is_none());
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);

        let mut tail = Vec::new();
        while let Ok(event) = events.try_recv() {
            tail.push(event);
        }
        assert!(tail.ends_with(&[ClientEvent::Snapshot(None), ClientEvent::ConnectionChanged(false)]));

        let mut buf = [0u8; 64];
        let closed = time::timeout(Duration::from_secs(2), async {
            loop {
                match server.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => continue,
                }
            }
        })
        .await;
        assert!(closed.is_ok());

        // No accepts happen after stop.
        assert!(time::timeout(ms(200), listener.accept()).await.is_err());
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let (listener, addr) = listener().await;
        let (client, mut events) = client(fast_config());

        client.start(Arc::new(StaticAddress(addr))).unwrap();
        let (_first, _) = listener.accept().await.unwrap();
        next_matching(&mut events, |e| matches!(e, ClientEvent::ConnectionChanged(true))).await;
        client.stop().await;

        client.start(Arc::new(StaticAddress(addr))).unwrap();
        let (_second, _) = listener.accept().await.unwrap();
        next_matching(&mut events, |e| matches!(e, ClientEvent::ConnectionChanged(true))).await;
        assert!(client.is_running());

        client.stop().await;
    }

    #[tokio::test]
    async fn test_silent_source_is_dropped() {
        let (listener, addr) = listener().await;
        let config = TelemetryClientBuilder::new()
            .read_idle_timeout(ms(50))
            .heartbeat_interval(ms(1000))
            .stale_threshold(ms(100))
            .disconnect_clear_threshold(ms(300))
            .monitor_tick(ms(20))
            .backoff(ms(20), ms(80))
            .read_timeout_tolerance(3)
            .build()
            .unwrap();
        let (client, mut events) = client(config);
        client.start(Arc::new(StaticAddress(addr))).unwrap();

        // Accept but never send anything.
        let (_server, _) = listener.accept().await.unwrap();
        next_matching(&mut events, |e| matches!(e, ClientEvent::ConnectionChanged(true))).await;
        next_matching(&mut events, |e| matches!(e, ClientEvent::ConnectionChanged(false))).await;

        assert_eq!(client.status().stats.disconnects, 1);
        client.stop().await;
    }

    #[tokio::test]
    async fn test_idle_timeouts_tolerated_while_heartbeats_arrive() {
        let (listener, addr) = listener().await;
        let config = TelemetryClientBuilder::new()
            .read_idle_timeout(ms(50))
            .heartbeat_interval(ms(1000))
            .stale_threshold(ms(250))
            .disconnect_clear_threshold(ms(600))
            .monitor_tick(ms(20))
            .backoff(ms(20), ms(80))
            .read_timeout_tolerance(3)
            .build()
            .unwrap();
        let (client, mut events) = client(config);
        client.start(Arc::new(StaticAddress(addr))).unwrap();

        let (mut server, _) = listener.accept().await.unwrap();
        next_matching(&mut events, |e| matches!(e, ClientEvent::ConnectionChanged(true))).await;

        // Each gap spans about four idle timeouts, more than the tolerance,
        // but the data never ages past the clear threshold.
        for _ in 0..6 {
            time::sleep(ms(200)).await;
            server.write_all(&transport_heartbeat_frame()).await.unwrap();
        }
        time::sleep(ms(100)).await;

        let stats = client.status().stats;
        assert!(client.is_connected());
        assert_eq!(stats.connects, 1);
        assert_eq!(stats.disconnects, 0);
        assert_eq!(stats.transport_heartbeats, 6);

        client.stop().await;
    }

    #[tokio::test]
    async fn test_connect_timeout_counts_as_failure() {
        // Non-routable address: connect never completes.
        let addr: SocketAddr = "10.255.255.1:7711".parse().unwrap();
        let config = TelemetryClientBuilder::new()
            .connect_timeout(ms(50))
            .backoff(ms(20), ms(40))
            .build()
            .unwrap();
        let (client, _events) = client(config);
        client.start(Arc::new(StaticAddress(addr))).unwrap();

        wait_until(|| client.status().reconnect_attempt >= 2).await;
        assert!(!client.is_connected());

        client.stop().await;
    }

    #[tokio::test]
    async fn test_closure_provider_drives_client() {
        let (listener, addr) = listener().await;
        let (client, mut events) = client(fast_config());
        client.start(Arc::new(move || Some(addr))).unwrap();

        let (_server, _) = listener.accept().await.unwrap();
        next_matching(&mut events, |e| matches!(e, ClientEvent::ConnectionChanged(true))).await;
        client.stop().await;
    }
}
