//! Monitor mode.
//!
//! Connects to a telemetry source and logs what arrives. The source host is
//! re-resolved periodically so a source that changes address is followed.

use std::sync::Arc;
use std::time::Duration;

use telemetry_link::ClientConfig;
use telemetry_link::client::{ChannelObserver, ClientEvent, SharedAddress, TelemetryClient};
use tokio::net::lookup_host;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::health::{HealthState, start_health_server};
use crate::{DemoConfig, DemoError};

const RESOLVE_INTERVAL: Duration = Duration::from_secs(5);

/// Log one client event.
fn log_event(event: &ClientEvent) {
    match event {
        ClientEvent::Snapshot(Some(snapshot)) => {
            let data = &snapshot.data;
            debug!(
                sequence = snapshot.sequence,
                age_ms = snapshot.age().as_millis() as u64,
                v_ego = data.car_state.as_ref().map(|c| c.v_ego),
                lead_distance = data.model_v2.as_ref().and_then(|m| m.lead0.as_ref()).map(|l| l.x),
                overtake = data.overtake_status.as_ref().map(|o| o.status_text.as_str()),
                "Snapshot"
            );
        }
        ClientEvent::Snapshot(None) => info!("No telemetry"),
        ClientEvent::ConnectionChanged(connected) => info!(connected, "Link changed"),
        ClientEvent::StaleChanged(true) => warn!("Telemetry stale"),
        ClientEvent::StaleChanged(false) => info!("Telemetry fresh"),
        ClientEvent::ReconnectExhausted => warn!("Source unreachable, still retrying"),
    }
}

/// Keep `address` pointed at the first resolved address of `host:port`.
async fn resolve_loop(host: String, port: u16, address: SharedAddress, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(RESOLVE_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        match lookup_host((host.as_str(), port)).await {
            Ok(mut addrs) => {
                let next = addrs.next();
                if next != address.get() {
                    info!(host = %host, addr = ?next, "Resolved telemetry source");
                    address.set(next);
                }
            }
            Err(e) => debug!(host = %host, error = %e, "Lookup failed"),
        }
    }
}

/// Run monitor mode until Ctrl-C.
pub async fn run(config: &DemoConfig) -> Result<(), DemoError> {
    let (observer, mut events) = ChannelObserver::new();
    let client = Arc::new(TelemetryClient::new(ClientConfig::default(), Arc::new(observer))?);
    let address = SharedAddress::new();
    let cancel = CancellationToken::new();

    let resolver = tokio::spawn(resolve_loop(
        config.host.clone(),
        config.port,
        address.clone(),
        cancel.clone(),
    ));
    client.start(Arc::new(address))?;

    let health = tokio::spawn(start_health_server(
        config.health_addr,
        HealthState::Monitor(client.clone()),
    ));

    info!(host = %config.host, port = config.port, "Monitoring telemetry");
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                break;
            }
            Some(event) = events.recv() => log_event(&event),
        }
    }
    info!("Shutting down");

    cancel.cancel();
    health.abort();
    client.stop().await;
    let _ = resolver.await;
    Ok(())
}
