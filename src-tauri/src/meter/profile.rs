use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::lux::IntegrationMode;

pub const DEFAULT_PROFILE_MIN: u16 = 100;
pub const DEFAULT_PROFILE_MAX: u16 = 5000;

/// Minimum spacing between two automatic profile steps.
pub const PROFILE_STEP_MS: u64 = 1000;

/// Floor for the poll delay so a zero custom time can't spin the loop.
pub const MIN_POLL_MS: u64 = 10;

const HIGH_GAIN_FLAG: u8 = 0x10;

/// Gain and integration setting pushed to the sensor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SensorConfig {
    pub high_gain: bool,
    pub mode: IntegrationMode,
}

impl SensorConfig {
    pub const fn new(high_gain: bool, mode: IntegrationMode) -> Self {
        Self { high_gain, mode }
    }
}

/// A configuration ready for the bridge, together with the poll delay it implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigCommand {
    pub parameters: String,
    pub poll_ms: u64,
}

impl ConfigCommand {
    /// Encodes `mode lsb msb` as unpadded lowercase hex, the layout the firmware reads.
    pub fn encode(config: SensorConfig, int_time_ms: u16) -> Self {
        let mut mode = config.mode.bits();
        if config.high_gain {
            mode |= HIGH_GAIN_FLAG;
        }
        let [lsb, msb] = int_time_ms.to_le_bytes();

        let poll_ms = match config.mode {
            IntegrationMode::Fast => 14,
            IntegrationMode::Medium => 101,
            IntegrationMode::Slow => 402,
            IntegrationMode::Custom => u64::from(int_time_ms),
        };

        Self {
            parameters: format!("{mode:x} {lsb:x} {msb:x}"),
            poll_ms: poll_ms.max(MIN_POLL_MS),
        }
    }
}

/// An automatic profile: ordered from least to most sensitive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSpec {
    /// Step to a more sensitive setting when a channel reads below this.
    pub min: u16,
    /// Step to a less sensitive setting when a channel reads above this.
    pub max: u16,
    pub steps: Vec<SensorConfig>,
}

impl ProfileSpec {
    fn with_defaults(steps: &[(bool, IntegrationMode)]) -> Self {
        Self {
            min: DEFAULT_PROFILE_MIN,
            max: DEFAULT_PROFILE_MAX,
            steps: steps
                .iter()
                .map(|&(high_gain, mode)| SensorConfig::new(high_gain, mode))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ProfileTable(BTreeMap<String, ProfileSpec>);

impl ProfileTable {
    pub fn get(&self, name: &str) -> Option<&ProfileSpec> {
        self.0.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, spec) in &self.0 {
            if name == MANUAL_PROFILE {
                bail!("profile name {name:?} is reserved");
            }
            if spec.steps.is_empty() {
                bail!("profile {name:?} has no steps");
            }
            if spec.min >= spec.max {
                bail!("profile {name:?} needs min < max");
            }
        }
        Ok(())
    }
}

impl Default for ProfileTable {
    fn default() -> Self {
        use IntegrationMode::{Fast, Medium, Slow};

        let mut table = BTreeMap::new();
        table.insert(
            "all".to_string(),
            ProfileSpec::with_defaults(&[
                (false, Fast),
                (false, Medium),
                (true, Fast),
                (false, Slow),
                (true, Medium),
                (true, Slow),
            ]),
        );
        table.insert(
            "fast".to_string(),
            ProfileSpec::with_defaults(&[(false, Fast), (true, Fast), (true, Medium), (true, Slow)]),
        );
        table.insert(
            "logain".to_string(),
            ProfileSpec::with_defaults(&[
                (false, Fast),
                (false, Medium),
                (false, Slow),
                (true, Slow),
            ]),
        );
        Self(table)
    }
}

pub const MANUAL_PROFILE: &str = "manual";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind", content = "name")]
pub enum ActiveProfile {
    #[default]
    Manual,
    Auto(String),
}

impl ActiveProfile {
    pub fn from_name(name: &str, table: &ProfileTable) -> Result<Self> {
        if name == MANUAL_PROFILE {
            return Ok(ActiveProfile::Manual);
        }
        if table.get(name).is_none() {
            bail!("unknown profile {name:?}");
        }
        Ok(ActiveProfile::Auto(name.to_string()))
    }

    pub fn name(&self) -> &str {
        match self {
            ActiveProfile::Manual => MANUAL_PROFILE,
            ActiveProfile::Auto(name) => name,
        }
    }
}

/// Walks the active automatic profile up and down based on channel saturation.
#[derive(Debug, Clone, Default)]
pub struct ProfileController {
    cursor: usize,
    last_check_ms: Option<u64>,
    changed: bool,
}

impl ProfileController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Forces the current step to be resent on the next automatic cycle.
    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    /// Returns the configuration to send, if the step changed.
    pub fn step(
        &mut self,
        profile: &ProfileSpec,
        ch0: u16,
        ch1: u16,
        now_ms: u64,
    ) -> Option<SensorConfig> {
        if profile.steps.is_empty() {
            return None;
        }
        let last = profile.steps.len() - 1;
        self.cursor = self.cursor.min(last);

        let due = self
            .last_check_ms
            .map_or(true, |prev| now_ms > prev + PROFILE_STEP_MS);
        if due {
            self.last_check_ms = Some(now_ms);
            if ch0 < profile.min && ch1 < profile.min && self.cursor < last {
                self.cursor += 1;
                self.changed = true;
            }
            if (ch0 > profile.max || ch1 > profile.max) && self.cursor > 0 {
                self.cursor -= 1;
                self.changed = true;
            }
        }

        if std::mem::take(&mut self.changed) {
            Some(profile.steps[self.cursor])
        } else {
            None
        }
    }
}
