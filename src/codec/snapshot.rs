//! Decoded telemetry snapshot and its sub-records.
//!
//! Every sub-record is optional and every field inside one has a default,
//! so a source that omits parts of the state still produces a snapshot.
//! Field names follow the source's camelCase JSON keys.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// One decoded telemetry update.
///
/// Snapshots are immutable. A newer one replaces the previous one as a
/// whole; consumers holding an `Arc<Snapshot>` never see partial updates.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Server-assigned sequence number. Advisory; gaps are allowed.
    pub sequence: i64,
    /// Server clock at emission, in seconds. Not comparable to local time.
    pub source_timestamp: f64,
    /// Local clock at receipt. Authoritative for freshness.
    pub receive_time: Instant,
    /// Decoded state.
    pub data: SnapshotData,
}

impl Snapshot {
    /// Time elapsed since this snapshot was received.
    pub fn age(&self) -> std::time::Duration {
        self.receive_time.elapsed()
    }
}

/// The `data` object of a payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SnapshotData {
    /// Vehicle kinematics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub car_state: Option<CarState>,
    /// Lane and road geometry from the driving model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_v2: Option<ModelV2>,
    /// Driving system enablement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_state: Option<SystemState>,
    /// Overtake assistant status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overtake_status: Option<OvertakeStatus>,
}

impl SnapshotData {
    /// True if no sub-record is present.
    pub fn is_empty(&self) -> bool {
        self.car_state.is_none()
            && self.model_v2.is_none()
            && self.system_state.is_none()
            && self.overtake_status.is_none()
    }
}

/// Vehicle kinematics and blind-spot state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CarState {
    /// Ego speed in m/s.
    pub v_ego: f64,
    /// Steering wheel angle in degrees.
    pub steering_angle_deg: f64,
    /// Lateral distance to the left lane line in metres.
    pub left_lat_dist: f64,
    /// Vehicle detected in the left blind spot.
    pub left_blindspot: bool,
    /// Vehicle detected in the right blind spot.
    pub right_blindspot: bool,
}

/// Driving model output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelV2 {
    /// Closest lead vehicle in the ego lane.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead0: Option<LeadVehicle>,
    /// Lead vehicle in the left lane.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_left: Option<SideLead>,
    /// Lead vehicle in the right lane.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_right: Option<SideLead>,
    /// Confidence of the left and right lane lines.
    pub lane_line_probs: Vec<f64>,
    /// Road edge distances.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<RoadMeta>,
    /// Path curvature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curvature: Option<Curvature>,
}

/// Lead vehicle as tracked by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadVehicle {
    /// Longitudinal distance in metres.
    pub x: f64,
    /// Lateral offset in metres.
    pub y: f64,
    /// Speed in m/s.
    pub v: f64,
    /// Detection probability.
    pub prob: f64,
}

/// Lead vehicle in an adjacent lane.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SideLead {
    /// Relative distance in metres.
    pub d_rel: f64,
    /// Relative speed in m/s.
    pub v_rel: f64,
    /// Whether the lead is tracked.
    pub status: bool,
}

/// Road edge distances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoadMeta {
    /// Distance to the left road edge in metres.
    pub distance_to_road_edge_left: f64,
    /// Distance to the right road edge in metres.
    pub distance_to_road_edge_right: f64,
}

/// Path curvature summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Curvature {
    /// Maximum orientation rate along the planned path.
    pub max_orientation_rate: f64,
}

/// Driving system enablement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemState {
    /// System is enabled by the driver.
    pub enabled: bool,
    /// System is actively controlling.
    pub active: bool,
}

/// Overtake assistant status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OvertakeStatus {
    /// Human-readable status line.
    pub status_text: String,
    /// Conditions currently allow an overtake.
    pub can_overtake: bool,
    /// Remaining cooldown, if one is running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_remaining: Option<f64>,
    /// Direction of the last lane change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_direction: Option<String>,
    /// Why an overtake is currently blocked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocking_reason: Option<String>,
    /// Current lane, counted from the left.
    pub current_lane: i32,
    /// Number of lanes on the road.
    pub total_lanes: i32,
    /// Reminder shown when the vehicle should return to its lane.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lane_reminder: Option<String>,
}
