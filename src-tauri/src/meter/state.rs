use chrono::{DateTime, Utc};
use serde::Serialize;

use super::exposure::ExposureResult;
use super::frame::RawFrame;
use super::window::LuxStats;

/// What the meter currently knows about the sensor.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterState {
    /// Set once the first sensor frame arrives.
    pub synced: bool,
    pub frame: Option<RawFrame>,
    /// Last computed lux; carried into every cycle until a new reading replaces it.
    pub lux: f64,
    pub stats: LuxStats,
    pub result: Option<ExposureResult>,
    pub status: String,
    pub last_frame_at: Option<DateTime<Utc>>,
}

impl MeterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_frame(&mut self, frame: RawFrame, at: DateTime<Utc>) {
        self.lux = frame.lux();
        self.frame = Some(frame);
        self.last_frame_at = Some(at);
    }

    /// Channel counts of the last frame, zero before the first one.
    pub fn channels(&self) -> (u16, u16) {
        self.frame.map_or((0, 0), |f| (f.ch0, f.ch1))
    }

    pub fn debug_line(&self, host_lux: f64) -> String {
        let frame = self.frame.unwrap_or_default();
        format!(
            "Debug: ch:{},{} par:{},{},{} lux:{}",
            frame.ch0,
            frame.ch1,
            frame.mode.bits(),
            frame.high_gain,
            frame.int_time_ms,
            host_lux
        )
    }
}

/// Serializable view of a running meter session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterSnapshot {
    pub session_id: String,
    pub state: MeterState,
    pub mean_ev: Option<f64>,
    pub max_ev: Option<f64>,
    pub profile: String,
    pub profile_step: usize,
    pub poll_ms: u64,
}
