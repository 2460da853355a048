use std::time::Duration;

use anyhow::Result;
use chrono::Utc;

use crate::settings::MeterSettings;
use crate::ui::{
    selection::Selection,
    view::{ControlsSync, MeterView, Readouts},
};

use super::{
    bridge::MeterBridge,
    exposure::{self, ExposureResult},
    frame::{status_text, BridgeMessage, RawFrame},
    profile::{ActiveProfile, ConfigCommand, ProfileController, ProfileTable, SensorConfig},
    state::{MeterSnapshot, MeterState},
    window::RollingWindow,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Delay before the first poll and after startup.
pub const INITIAL_POLL_MS: u64 = 402;

/// All state touched by one poll cycle.
pub struct MeterSession {
    id: String,
    pub state: MeterState,
    pub selection: Selection,
    window: RollingWindow,
    profiles: ProfileTable,
    controller: ProfileController,
    poll_ms: u64,
    verbose: bool,
}

impl MeterSession {
    pub fn new(id: String, settings: &MeterSettings, verbose: bool) -> Result<Self> {
        Ok(Self {
            id,
            state: MeterState::new(),
            selection: Selection::new(&settings.initial)?,
            window: RollingWindow::new(settings.window_ms),
            profiles: settings.profiles.clone(),
            controller: ProfileController::new(),
            poll_ms: INITIAL_POLL_MS,
            verbose,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn profiles(&self) -> &ProfileTable {
        &self.profiles
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn set_profile(&mut self, name: &str) -> Result<()> {
        self.selection.profile = ActiveProfile::from_name(name, &self.profiles)?;
        self.controller.mark_changed();
        log_info!("Profile set to {name}");
        Ok(())
    }

    /// Applies edited settings; the current profile falls back to manual if it disappeared.
    pub fn apply_settings(&mut self, settings: &MeterSettings) {
        self.window.set_span_ms(settings.window_ms);
        self.profiles = settings.profiles.clone();
        let name = self.selection.profile.name().to_string();
        if self.selection.profile != ActiveProfile::Manual && self.profiles.get(&name).is_none() {
            log_warn!("Profile {name} no longer exists, switching to manual");
            self.selection.profile = ActiveProfile::Manual;
        }
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        MeterSnapshot {
            session_id: self.id.clone(),
            state: self.state.clone(),
            mean_ev: self.state.stats.mean_ev(),
            max_ev: self.state.stats.max_ev(),
            profile: self.selection.profile.name().to_string(),
            profile_step: self.controller.cursor(),
            poll_ms: self.poll_ms,
        }
    }

    /// One serialized poll: read the bridge, update statistics, solve the exposure, steer
    /// the sensor profile and write everything to `view`. Returns the delay until the next
    /// poll.
    pub fn run_cycle(
        &mut self,
        bridge: &mut dyn MeterBridge,
        view: &mut dyn MeterView,
        now_ms: u64,
    ) -> Duration {
        let line = bridge.get_data();
        let message = BridgeMessage::parse(&line);
        let bridge_status = bridge.get_status();

        match &message {
            BridgeMessage::Frame(frame) => {
                self.state.apply_frame(*frame, Utc::now());
                if !self.state.synced {
                    self.state.synced = true;
                    log_info!("Meter synced, session {}", self.id);
                    self.sync_controls(view, frame);
                }
            }
            BridgeMessage::Lux(lux) => self.state.lux = *lux,
            BridgeMessage::Unexpected(_) => {
                log_warn!("Unexpected bridge read {line:?} (status: {bridge_status})");
            }
            _ => {}
        }
        if let Some(text) = status_text(&message, &bridge_status) {
            self.show_status(view, text);
        }

        self.state.stats = self.window.push(now_ms, self.state.lux);
        view.show_readouts(&Readouts::from(self.state.stats));

        self.state.result = self.solve_exposure();
        view.show_result(self.state.result.as_ref());

        if self.state.synced {
            self.run_profile(bridge, view, now_ms);
            let debug = self.state.debug_line(bridge.get_lux());
            self.show_status(view, debug);
        }

        if self.verbose {
            log_info!(
                "cycle t={}ms lux={:.2} mean={:.2} max={:.2} next={}ms",
                now_ms,
                self.state.lux,
                self.state.stats.mean,
                self.state.stats.max,
                self.poll_ms
            );
        }

        self.poll_interval()
    }

    fn show_status(&mut self, view: &mut dyn MeterView, text: String) {
        view.show_status(&text);
        self.state.status = text;
    }

    fn solve_exposure(&self) -> Option<ExposureResult> {
        let stats = &self.state.stats;
        let source_ev = if self.selection.flash {
            stats.max_ev()
        } else {
            stats.mean_ev()
        };
        let ev = source_ev?;

        let solved = self
            .selection
            .exposure_inputs()
            .and_then(|inputs| exposure::solve(self.selection.calc_mode, ev, &inputs));
        match solved {
            Ok(result) => Some(result),
            Err(err) => {
                log_error!("exposure calculation failed: {err:#}");
                None
            }
        }
    }

    fn run_profile(&mut self, bridge: &mut dyn MeterBridge, view: &mut dyn MeterView, now_ms: u64) {
        let ActiveProfile::Auto(name) = self.selection.profile.clone() else {
            if let Some((config, int_time_ms)) = self.selection.take_manual_change() {
                self.send_config(bridge, config, int_time_ms);
            }
            return;
        };

        let Some(profile) = self.profiles.get(&name) else {
            log_warn!("Unknown profile {name}, falling back to manual");
            self.selection.profile = ActiveProfile::Manual;
            return;
        };
        let (ch0, ch1) = self.state.channels();
        if let Some(config) = self.controller.step(profile, ch0, ch1, now_ms) {
            let int_time_ms = self.selection.custom_time_ms;
            self.send_config(bridge, config, int_time_ms);
        }
        if let Some(frame) = self.state.frame {
            self.sync_controls(view, &frame);
        }
    }

    fn send_config(&mut self, bridge: &mut dyn MeterBridge, config: SensorConfig, int_time_ms: u16) {
        let command = ConfigCommand::encode(config, int_time_ms);
        match bridge.set_parameters(&command.parameters) {
            Ok(()) => {
                log_info!(
                    "Sensor configured: {} (poll every {}ms)",
                    command.parameters,
                    command.poll_ms
                );
                self.poll_ms = command.poll_ms;
            }
            Err(err) => log_error!("failed to configure sensor with {}: {err:#}", command.parameters),
        }
    }

    fn sync_controls(&mut self, view: &mut dyn MeterView, frame: &RawFrame) {
        self.selection.sync_from_frame(frame);
        view.sync_controls(&ControlsSync {
            mode_label: frame.mode.label().to_string(),
            high_gain: frame.high_gain,
            custom_time_ms: frame.int_time_ms,
        });
    }
}
