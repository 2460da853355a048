use serde::Serialize;

use crate::meter::{exposure::ExposureResult, window::LuxStats};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Figures for the lux / EV readout panel.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Readouts {
    pub mean_lux: f64,
    pub max_lux: f64,
    pub mean_ev: Option<f64>,
    pub max_ev: Option<f64>,
}

impl From<LuxStats> for Readouts {
    fn from(stats: LuxStats) -> Self {
        Self {
            mean_lux: stats.mean,
            max_lux: stats.max,
            mean_ev: stats.mean_ev(),
            max_ev: stats.max_ev(),
        }
    }
}

fn ev_text(ev: Option<f64>) -> String {
    ev.map_or_else(|| "N/A".to_string(), |ev| format!("{ev:.1}"))
}

impl Readouts {
    pub fn lux_text(&self) -> String {
        format!("Lux: {:.2}", self.mean_lux)
    }

    pub fn max_lux_text(&self) -> String {
        format!("MaxLux: {:.2}", self.max_lux)
    }

    pub fn ev_text(&self) -> String {
        format!("EV: {}", ev_text(self.mean_ev))
    }

    pub fn max_ev_text(&self) -> String {
        format!("MaxEV: {}", ev_text(self.max_ev))
    }
}

/// Device settings echoed back into the mode / gain / time controls.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ControlsSync {
    pub mode_label: String,
    pub high_gain: bool,
    pub custom_time_ms: u16,
}

/// The page elements the meter writes into.
pub trait MeterView: Send {
    fn show_status(&mut self, text: &str);
    fn show_readouts(&mut self, readouts: &Readouts);
    /// `None` when no EV is available to solve from.
    fn show_result(&mut self, result: Option<&ExposureResult>);
    fn sync_controls(&mut self, controls: &ControlsSync);
}

pub fn result_text(result: Option<&ExposureResult>) -> String {
    result.map_or_else(|| "N/A".to_string(), |r| r.display.clone())
}

/// Headless view: writes changes to the log, skipping repeats.
#[derive(Default)]
pub struct LogView {
    last_status: String,
    last_readouts: Option<[String; 4]>,
    last_result: String,
}

impl LogView {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MeterView for LogView {
    fn show_status(&mut self, text: &str) {
        if self.last_status != text {
            log_info!("{text}");
            self.last_status = text.to_string();
        }
    }

    fn show_readouts(&mut self, readouts: &Readouts) {
        let lines = [
            readouts.lux_text(),
            readouts.max_lux_text(),
            readouts.ev_text(),
            readouts.max_ev_text(),
        ];
        if self.last_readouts.as_ref() != Some(&lines) {
            log_info!("{}", lines.join("  "));
            self.last_readouts = Some(lines);
        }
    }

    fn show_result(&mut self, result: Option<&ExposureResult>) {
        let text = result_text(result);
        if self.last_result != text {
            log_info!("Exposure: {text}");
            self.last_result = text;
        }
    }

    fn sync_controls(&mut self, controls: &ControlsSync) {
        log_info!(
            "Sensor set to {} gain={} time={}ms",
            controls.mode_label,
            if controls.high_gain { "hi" } else { "lo" },
            controls.custom_time_ms
        );
    }
}

#[cfg(feature = "desktop")]
pub use desktop::TauriView;

#[cfg(feature = "desktop")]
mod desktop {
    use serde::Serialize;
    use tauri::{AppHandle, Emitter};

    use super::*;
    use crate::log_error;

    #[derive(Serialize, Clone)]
    #[serde(rename_all = "camelCase")]
    struct ReadoutsEvent {
        readouts: Readouts,
        lux: String,
        max_lux: String,
        ev: String,
        max_ev: String,
    }

    #[derive(Serialize, Clone)]
    #[serde(rename_all = "camelCase")]
    struct ResultEvent {
        result: Option<ExposureResult>,
        text: String,
    }

    /// Pushes updates to the web view as events.
    pub struct TauriView {
        app_handle: AppHandle,
    }

    impl TauriView {
        pub fn new(app_handle: AppHandle) -> Self {
            Self { app_handle }
        }

        fn emit<S: Serialize + Clone>(&self, event: &str, payload: S) {
            if let Err(err) = self.app_handle.emit(event, payload) {
                log_error!("failed to emit {event}: {err}");
            }
        }
    }

    impl MeterView for TauriView {
        fn show_status(&mut self, text: &str) {
            self.emit("meter-status", text.to_string());
        }

        fn show_readouts(&mut self, readouts: &Readouts) {
            self.emit(
                "meter-readouts",
                ReadoutsEvent {
                    readouts: *readouts,
                    lux: readouts.lux_text(),
                    max_lux: readouts.max_lux_text(),
                    ev: readouts.ev_text(),
                    max_ev: readouts.max_ev_text(),
                },
            );
        }

        fn show_result(&mut self, result: Option<&ExposureResult>) {
            self.emit(
                "exposure-result",
                ResultEvent {
                    result: result.cloned(),
                    text: result_text(result),
                },
            );
        }

        fn sync_controls(&mut self, controls: &ControlsSync) {
            self.emit("controls-synced", controls.clone());
        }
    }
}
