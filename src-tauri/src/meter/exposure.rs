//! Exposure triangle solver.
//!
//! Two of aperture, shutter and ISO come from the user's selection, the third is solved from
//! the metered EV and snapped to the nearest stop on its dial.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

pub const ISO_SCALE: &[&str] = &["100", "200", "400", "800", "1600", "3200", "6400"];

pub const SHUTTER_SCALE: &[&str] = &[
    "30", "15", "8", "4", "2", "1", "1/2", "1/4", "1/8", "1/15", "1/30", "1/60", "1/125",
    "1/250", "1/500", "1/1000", "1/2000", "1/4000", "1/8000",
];

pub const APERTURE_SCALE: &[&str] = &[
    "1", "1.4", "2", "2.8", "4", "5.6", "8", "11", "16", "22", "32",
];

/// ISO the metered EV refers to.
const BASE_ISO: f64 = 100.0;

/// Which leg of the exposure triangle gets solved.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum CalcMode {
    #[default]
    #[serde(rename = "Av")]
    Aperture,
    #[serde(rename = "Tv")]
    Shutter,
    #[serde(rename = "ISO")]
    Iso,
}

/// Parses a dial label; `1/x` labels denote fractions of a second.
pub fn parse_stop(label: &str) -> Result<f64> {
    let value = match label.strip_prefix("1/") {
        Some(denominator) => denominator.parse::<f64>().map(|d| 1.0 / d),
        None => label.parse::<f64>(),
    };
    value.map_err(|_| anyhow!("not a numeric stop: {label:?}"))
}

/// Returns the scale entry closest to `value`.
///
/// Entries are scanned in order and only a strictly smaller distance replaces the current
/// pick, so on a tie the earlier entry wins.
pub fn find_near(value: f64, scale: &[&'static str]) -> &'static str {
    let mut best = scale[0];
    let mut best_diff = f64::INFINITY;
    for &label in scale {
        let Ok(stop) = parse_stop(label) else {
            continue;
        };
        let diff = (stop - value).abs();
        if diff < best_diff {
            best = label;
            best_diff = diff;
        }
    }
    best
}

/// The two fixed legs plus ISO, all as numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureInputs {
    pub iso: f64,
    pub aperture: f64,
    pub shutter: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExposureResult {
    pub mode: CalcMode,
    /// Snapped dial label, e.g. `1/125`.
    pub stop: String,
    /// Text for the result display, e.g. `1/125 s`.
    pub display: String,
    /// EV (at ISO 100) that the snapped settings expose for.
    pub setting_ev: f64,
}

fn setting_ev(aperture: f64, shutter: f64) -> f64 {
    (aperture.powi(2) / shutter).log2()
}

pub fn solve(mode: CalcMode, ev: f64, inputs: &ExposureInputs) -> Result<ExposureResult> {
    let iso_delta = (inputs.iso / BASE_ISO).log2();

    let (stop, display, ev_out) = match mode {
        CalcMode::Shutter => {
            let shutter = inputs.aperture.powi(2) / (ev + iso_delta).exp2();
            let stop = find_near(shutter, SHUTTER_SCALE);
            let ev_out = setting_ev(inputs.aperture, parse_stop(stop)?) - iso_delta;
            (stop, format!("{stop} s"), ev_out)
        }
        CalcMode::Aperture => {
            let aperture = ((ev + iso_delta).exp2() * inputs.shutter).sqrt();
            let stop = find_near(aperture, APERTURE_SCALE);
            let ev_out = setting_ev(parse_stop(stop)?, inputs.shutter) - iso_delta;
            (stop, format!("f/{stop}"), ev_out)
        }
        CalcMode::Iso => {
            let base_ev = setting_ev(inputs.aperture, inputs.shutter);
            let iso = (base_ev - ev).exp2() * BASE_ISO;
            let stop = find_near(iso, ISO_SCALE);
            let ev_out = base_ev - (parse_stop(stop)? / BASE_ISO).log2();
            (stop, format!("{stop} ISO"), ev_out)
        }
    };

    Ok(ExposureResult {
        mode,
        stop: stop.to_string(),
        display,
        setting_ev: ev_out,
    })
}
