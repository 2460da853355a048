use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

use crate::meter::{profile::ProfileTable, window::DEFAULT_WINDOW_MS};
use crate::ui::selection::{InitialSelection, Selection};

const DEFAULT_SIM_LUX: f64 = 320.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MeterSettings {
    /// Span of the rolling lux window.
    pub window_ms: u64,
    pub profiles: ProfileTable,
    pub initial: InitialSelection,
}

impl Default for MeterSettings {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            profiles: ProfileTable::default(),
            initial: InitialSelection::default(),
        }
    }
}

impl MeterSettings {
    pub fn validate(&self) -> Result<()> {
        if self.window_ms == 0 {
            anyhow::bail!("window_ms must be greater than zero");
        }
        self.profiles.validate()?;
        Selection::new(&self.initial).context("invalid initial selection")?;
        Ok(())
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<MeterSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            let parsed: MeterSettings = serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring unreadable settings at {}: {err}", path.display());
                MeterSettings::default()
            });
            if let Err(err) = parsed.validate() {
                log::warn!("Ignoring invalid settings at {}: {err:#}", path.display());
                MeterSettings::default()
            } else {
                parsed
            }
        } else {
            MeterSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn meter(&self) -> MeterSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_meter(&self, settings: MeterSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &MeterSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

/// Knobs read from the environment at startup.
#[derive(Debug, Clone)]
pub struct EnvOverrides {
    pub settings_path: PathBuf,
    pub sim_lux: f64,
    /// Profile to start in instead of manual.
    pub profile: Option<String>,
    pub debug: bool,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let settings_path = lookup("BLM_SETTINGS")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("bluelightmeter.json"));
        let sim_lux = lookup("BLM_SIM_LUX")
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|lux| *lux >= 0.0)
            .unwrap_or(DEFAULT_SIM_LUX);
        let profile = lookup("BLM_PROFILE").filter(|name| !name.is_empty());
        let debug = lookup("BLM_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            settings_path,
            sim_lux,
            profile,
            debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meter::exposure::CalcMode;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("blm-settings-{}", uuid::Uuid::new_v4()))
            .join("settings.json")
    }

    #[test]
    fn missing_file_gives_defaults() {
        let store = SettingsStore::new(temp_path()).unwrap();
        assert_eq!(store.meter(), MeterSettings::default());
    }

    #[test]
    fn updates_are_persisted() {
        let path = temp_path();
        let store = SettingsStore::new(path.clone()).unwrap();
        let mut settings = store.meter();
        settings.window_ms = 1500;
        settings.initial.calc_mode = CalcMode::Iso;
        store.update_meter(settings.clone()).unwrap();

        let reloaded = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(reloaded.meter(), settings);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn invalid_update_is_rejected() {
        let store = SettingsStore::new(temp_path()).unwrap();
        let mut settings = store.meter();
        settings.initial.aperture = "3".into();
        assert!(store.update_meter(settings).is_err());

        let mut settings = store.meter();
        settings.window_ms = 0;
        assert!(store.update_meter(settings).is_err());
        assert_eq!(store.meter(), MeterSettings::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = temp_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{ "windowMs": 5000 }"#).unwrap();

        let store = SettingsStore::new(path.clone()).unwrap();
        let settings = store.meter();
        assert_eq!(settings.window_ms, 5000);
        assert_eq!(settings.profiles, ProfileTable::default());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn env_overrides() {
        let env = EnvOverrides::from_lookup(|key| match key {
            "BLM_SIM_LUX" => Some("12.5".into()),
            "BLM_DEBUG" => Some("TRUE".into()),
            "BLM_PROFILE" => Some("fast".into()),
            _ => None,
        });
        assert_eq!(env.profile.as_deref(), Some("fast"));
        assert_eq!(env.sim_lux, 12.5);
        assert!(env.debug);
        assert_eq!(env.settings_path, PathBuf::from("bluelightmeter.json"));

        let env = EnvOverrides::from_lookup(|key| (key == "BLM_SIM_LUX").then(|| "-4".into()));
        assert_eq!(env.sim_lux, DEFAULT_SIM_LUX);
        assert!(!env.debug);
        assert_eq!(env.profile, None);
    }
}
