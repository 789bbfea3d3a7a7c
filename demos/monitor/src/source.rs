//! Source mode.
//!
//! A mock telemetry source: serves synthetic snapshots at 10 Hz to every
//! connected consumer, with transport and application heartbeats mixed in.

use std::f64::consts::TAU;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use telemetry_link::codec::{
    CarState, LeadVehicle, ModelV2, OvertakeStatus, SnapshotData, SystemState, application_heartbeat_payload,
    encode_frame, encode_payload, transport_heartbeat_frame,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::health::{HealthState, start_health_server};
use crate::{DemoConfig, DemoError};

const SEND_INTERVAL: Duration = Duration::from_millis(100);

/// Every Nth tick sends a zero-length frame before the snapshot.
const TRANSPORT_HEARTBEAT_EVERY: u64 = 10;

/// Every Nth tick sends an empty-data payload instead of a snapshot.
const APPLICATION_HEARTBEAT_EVERY: u64 = 25;

/// Synthetic vehicle state at tick `n`.
pub fn synthetic_data(n: u64) -> SnapshotData {
    let phase = (n % 600) as f64 / 600.0 * TAU;
    let v_ego = 25.0 + 5.0 * phase.sin();
    let lead_distance = 40.0 + 15.0 * (phase * 2.0).cos();

    SnapshotData {
        car_state: Some(CarState {
            v_ego,
            steering_angle_deg: 3.0 * (phase * 3.0).sin(),
            left_lat_dist: 1.6,
            left_blindspot: false,
            right_blindspot: n % 300 < 20,
        }),
        model_v2: Some(ModelV2 {
            lead0: Some(LeadVehicle {
                x: lead_distance,
                y: 0.2,
                v: v_ego - 2.0,
                prob: 0.9,
            }),
            lane_line_probs: vec![0.7, 0.95, 0.95, 0.6],
            ..Default::default()
        }),
        system_state: Some(SystemState {
            enabled: true,
            active: true,
        }),
        overtake_status: Some(OvertakeStatus {
            status_text: if lead_distance < 30.0 { "Following" } else { "Cruising" }.to_string(),
            can_overtake: lead_distance < 30.0 && n % 300 >= 20,
            current_lane: 2,
            total_lanes: 3,
            ..Default::default()
        }),
    }
}

fn unix_time() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Bytes to send on tick `n`.
pub fn frames_for_tick(n: u64, timestamp: f64) -> Result<Vec<u8>, DemoError> {
    let mut out = Vec::new();
    if n % TRANSPORT_HEARTBEAT_EVERY == 0 {
        out.extend_from_slice(&transport_heartbeat_frame());
    }

    let sequence = n as i64;
    let payload = if n % APPLICATION_HEARTBEAT_EVERY == 0 {
        application_heartbeat_payload(sequence, timestamp)
    } else {
        encode_payload(sequence, timestamp, &synthetic_data(n))
    }
    .map_err(std::io::Error::other)?;

    out.extend(encode_frame(&payload).map_err(std::io::Error::other)?);
    Ok(out)
}

/// Stream to one consumer until it goes away.
async fn serve(stream: TcpStream, peer: SocketAddr) -> Result<(), DemoError> {
    stream.set_nodelay(true)?;
    let (mut reader, mut writer) = stream.into_split();

    // Drain inbound heartbeat probes.
    let drain = tokio::spawn(async move {
        let mut buf = [0u8; 256];
        let mut probes = 0u64;
        while let Ok(n) = reader.read(&mut buf).await {
            if n == 0 {
                break;
            }
            probes += (n / 4) as u64;
        }
        probes
    });

    let mut ticker = time::interval(SEND_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut n = 0u64;
    let result: Result<(), std::io::Error> = loop {
        ticker.tick().await;
        let frames = frames_for_tick(n, unix_time())?;
        if let Err(e) = writer.write_all(&frames).await {
            break Err(e);
        }
        n += 1;
    };

    drain.abort();
    if let Ok(probes) = drain.await {
        debug!(%peer, probes, "Probe reader finished");
    }
    if let Err(e) = result {
        info!(%peer, sent = n, error = %e, "Consumer disconnected");
    }
    Ok(())
}

/// Run source mode until Ctrl-C.
pub async fn run(config: &DemoConfig) -> Result<(), DemoError> {
    let listener = TcpListener::bind(config.bind_addr).await?;
    let sessions = Arc::new(AtomicUsize::new(0));
    info!(addr = %config.bind_addr, "Telemetry source listening");

    let health = tokio::spawn(start_health_server(
        config.health_addr,
        HealthState::Source(sessions.clone()),
    ));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                info!(%peer, "Consumer connected");
                let sessions = sessions.clone();
                sessions.fetch_add(1, Ordering::Relaxed);
                tokio::spawn(async move {
                    if let Err(e) = serve(stream, peer).await {
                        warn!(%peer, error = %e, "Session failed");
                    }
                    sessions.fetch_sub(1, Ordering::Relaxed);
                });
            }
        }
    }

    info!("Shutting down");
    health.abort();
    Ok(())
}
