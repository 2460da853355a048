use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

use crate::meter::{
    exposure::{parse_stop, CalcMode, ExposureInputs, APERTURE_SCALE, ISO_SCALE, SHUTTER_SCALE},
    frame::RawFrame,
    lux::IntegrationMode,
    profile::{ActiveProfile, ProfileTable, SensorConfig},
};

pub const MODE_CHOICES: &[&str] = &["13.7ms", "101ms", "402ms", "Custom:"];

/// A dropdown on the meter page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Control {
    Iso,
    Aperture,
    Shutter,
    Mode,
}

impl Control {
    pub fn choices(self) -> &'static [&'static str] {
        match self {
            Control::Iso => ISO_SCALE,
            Control::Aperture => APERTURE_SCALE,
            Control::Shutter => SHUTTER_SCALE,
            Control::Mode => MODE_CHOICES,
        }
    }
}

/// Everything the page needs to build its dropdowns and toggles.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Choices {
    pub iso: Vec<&'static str>,
    pub aperture: Vec<&'static str>,
    pub shutter: Vec<&'static str>,
    pub mode: Vec<&'static str>,
    pub profiles: Vec<String>,
}

impl Choices {
    pub fn new(profiles: &ProfileTable) -> Self {
        let mut names = vec![crate::meter::profile::MANUAL_PROFILE.to_string()];
        names.extend(profiles.names().map(str::to_string));
        Self {
            iso: ISO_SCALE.to_vec(),
            aperture: APERTURE_SCALE.to_vec(),
            shutter: SHUTTER_SCALE.to_vec(),
            mode: MODE_CHOICES.to_vec(),
            profiles: names,
        }
    }
}

/// Initial dropdown values, read from settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitialSelection {
    pub iso: String,
    pub aperture: String,
    pub shutter: String,
    pub calc_mode: CalcMode,
}

impl Default for InitialSelection {
    fn default() -> Self {
        Self {
            iso: "100".into(),
            aperture: "1".into(),
            shutter: "1".into(),
            calc_mode: CalcMode::Aperture,
        }
    }
}

/// The user's choices on the meter page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    values: HashMap<Control, String>,
    pub calc_mode: CalcMode,
    pub flash: bool,
    pub profile: ActiveProfile,
    pub high_gain: bool,
    pub custom_time_ms: u16,
    #[serde(skip)]
    manual_pending: bool,
}

impl Selection {
    pub fn new(initial: &InitialSelection) -> Result<Self> {
        let mut selection = Self {
            values: HashMap::new(),
            calc_mode: initial.calc_mode,
            flash: false,
            profile: ActiveProfile::Manual,
            high_gain: false,
            custom_time_ms: 0,
            manual_pending: false,
        };
        selection.select(Control::Iso, &initial.iso)?;
        selection.select(Control::Aperture, &initial.aperture)?;
        selection.select(Control::Shutter, &initial.shutter)?;
        selection
            .values
            .insert(Control::Mode, IntegrationMode::Slow.label().to_string());
        selection.manual_pending = false;
        Ok(selection)
    }

    pub fn get(&self, control: Control) -> Option<&str> {
        self.values.get(&control).map(String::as_str)
    }

    pub fn select(&mut self, control: Control, value: &str) -> Result<()> {
        if !control.choices().contains(&value) {
            bail!("{value:?} is not a valid {control:?} choice");
        }
        self.values.insert(control, value.to_string());
        if control == Control::Mode {
            self.manual_pending = true;
        }
        Ok(())
    }

    pub fn set_high_gain(&mut self, high_gain: bool) {
        self.high_gain = high_gain;
        self.manual_pending = true;
    }

    pub fn set_custom_time(&mut self, ms: u16) -> Result<()> {
        if ms == 0 {
            bail!("custom integration time must be at least 1 ms");
        }
        self.custom_time_ms = ms;
        self.manual_pending = true;
        Ok(())
    }

    pub fn mode(&self) -> IntegrationMode {
        self.get(Control::Mode)
            .and_then(IntegrationMode::from_label)
            .unwrap_or(IntegrationMode::Custom)
    }

    /// Takes the manual configuration if the user touched mode, gain or time since the
    /// last call.
    pub fn take_manual_change(&mut self) -> Option<(SensorConfig, u16)> {
        if !std::mem::take(&mut self.manual_pending) {
            return None;
        }
        Some((
            SensorConfig::new(self.high_gain, self.mode()),
            self.custom_time_ms,
        ))
    }

    /// Mirrors the device's own configuration into the controls.
    pub fn sync_from_frame(&mut self, frame: &RawFrame) {
        self.values
            .insert(Control::Mode, frame.mode.label().to_string());
        self.high_gain = frame.high_gain;
        self.custom_time_ms = frame.int_time_ms;
    }

    pub fn exposure_inputs(&self) -> Result<ExposureInputs> {
        let stop = |control: Control| -> Result<f64> {
            let label = self
                .get(control)
                .ok_or_else(|| anyhow!("no {control:?} selected"))?;
            parse_stop(label)
        };
        Ok(ExposureInputs {
            iso: stop(Control::Iso)?,
            aperture: stop(Control::Aperture)?,
            shutter: stop(Control::Shutter)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection() -> Selection {
        Selection::new(&InitialSelection::default()).unwrap()
    }

    #[test]
    fn defaults_feed_the_calculator() {
        let selection = selection();
        assert_eq!(
            selection.exposure_inputs().unwrap(),
            ExposureInputs {
                iso: 100.0,
                aperture: 1.0,
                shutter: 1.0
            }
        );
        assert_eq!(selection.calc_mode, CalcMode::Aperture);
        assert!(!selection.flash);
    }

    #[test]
    fn rejects_values_off_the_dial() {
        let mut selection = selection();
        assert!(selection.select(Control::Iso, "125").is_err());
        assert!(selection.select(Control::Shutter, "1/3").is_err());
        selection.select(Control::Shutter, "1/125").unwrap();
        assert_eq!(selection.get(Control::Shutter), Some("1/125"));
        assert!((selection.exposure_inputs().unwrap().shutter - 0.008).abs() < 1e-12);
    }

    #[test]
    fn manual_change_is_taken_once() {
        let mut selection = selection();
        assert_eq!(selection.take_manual_change(), None);

        selection.select(Control::Mode, "101ms").unwrap();
        selection.set_high_gain(true);
        assert_eq!(
            selection.take_manual_change(),
            Some((SensorConfig::new(true, IntegrationMode::Medium), 0))
        );
        assert_eq!(selection.take_manual_change(), None);

        selection.set_custom_time(250).unwrap();
        selection.select(Control::Mode, "Custom:").unwrap();
        assert_eq!(
            selection.take_manual_change(),
            Some((SensorConfig::new(true, IntegrationMode::Custom), 250))
        );
    }

    #[test]
    fn exposure_picks_do_not_touch_the_sensor() {
        let mut selection = selection();
        selection.select(Control::Aperture, "8").unwrap();
        selection.select(Control::Iso, "400").unwrap();
        assert_eq!(selection.take_manual_change(), None);
    }

    #[test]
    fn zero_custom_time_is_rejected() {
        let mut selection = selection();
        assert!(selection.set_custom_time(0).is_err());
        assert_eq!(selection.take_manual_change(), None);
    }

    #[test]
    fn syncs_controls_from_device() {
        let mut selection = selection();
        let frame = RawFrame {
            version: 1,
            run: 0,
            ch0: 10,
            ch1: 5,
            mode: IntegrationMode::Fast,
            high_gain: true,
            int_time_ms: 300,
        };
        selection.sync_from_frame(&frame);
        assert_eq!(selection.get(Control::Mode), Some("13.7ms"));
        assert!(selection.high_gain);
        assert_eq!(selection.custom_time_ms, 300);
        assert_eq!(selection.take_manual_change(), None);
    }

    #[test]
    fn choices_list_manual_first() {
        let choices = Choices::new(&ProfileTable::default());
        assert_eq!(choices.profiles, ["manual", "all", "fast", "logain"]);
        assert_eq!(choices.mode.len(), 4);
        assert_eq!(choices.iso.first(), Some(&"100"));
    }
}
