use anyhow::{bail, Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::lux::IntegrationMode;
use super::profile::SensorConfig;

/// Host side of the meter connection.
///
/// On the phone this is the Bluetooth driver object; every call is cheap and non-blocking,
/// returning whatever the driver last received.
pub trait MeterBridge: Send {
    /// Latest status line, e.g. `blm: 01 00 64 00 5A 00 02 00 00`.
    fn get_data(&mut self) -> String;

    /// Human readable connection state.
    fn get_status(&self) -> String;

    /// Reading from the host's own light sensor, negative when unavailable.
    fn get_lux(&self) -> f64;

    /// Sends a `mode lsb msb` hex configuration to the sensor.
    fn set_parameters(&mut self, parameters: &str) -> Result<()>;
}

/// Decodes a `mode lsb msb` configuration string.
pub fn parse_parameters(parameters: &str) -> Result<(SensorConfig, u16)> {
    let bytes = parameters
        .split_whitespace()
        .map(|token| u8::from_str_radix(token, 16))
        .collect::<Result<Vec<u8>, _>>()
        .with_context(|| format!("bad configuration string {parameters:?}"))?;
    let [mode, lsb, msb] = bytes[..] else {
        bail!("configuration needs three bytes, got {parameters:?}");
    };

    let config = SensorConfig::new(mode & 0x10 != 0, IntegrationMode::from_bits(mode));
    Ok((config, u16::from_le_bytes([lsb, msb])))
}

/// Polls answered with `initializing:` before the first frame.
const SIM_WARMUP_POLLS: u32 = 2;

/// Channel 1 / channel 0 ratio of the simulated light source (daylight-ish).
const SIM_RATIO: f64 = 0.4;

/// Relative noise applied to each simulated reading.
const SIM_JITTER: f64 = 0.02;

/// Stand-in for the Bluetooth meter: synthesises frames for a scene of known illuminance and
/// tracks the gain / integration setting pushed to it.
pub struct SimulatedBridge {
    scene_lux: f64,
    config: SensorConfig,
    int_time_ms: u16,
    run: u8,
    polls: u32,
    rng: StdRng,
}

impl SimulatedBridge {
    pub fn new(scene_lux: f64) -> Self {
        Self {
            scene_lux,
            config: SensorConfig::new(false, IntegrationMode::Slow),
            int_time_ms: 0,
            run: 0,
            polls: 0,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(scene_lux: f64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ..Self::new(scene_lux)
        }
    }

    pub fn set_scene_lux(&mut self, lux: f64) {
        self.scene_lux = lux.max(0.0);
    }

    pub fn config(&self) -> (SensorConfig, u16) {
        (self.config, self.int_time_ms)
    }

    /// Inverts the lowest ratio band of the lux formula for the current setting.
    fn channel_counts(&mut self) -> (u16, u16) {
        let per_count = 0.0304 - 0.062 * SIM_RATIO.powf(1.4);
        let mut normalised = self.scene_lux / per_count;
        if SIM_JITTER > 0.0 {
            normalised *= 1.0 + self.rng.gen_range(-SIM_JITTER..SIM_JITTER);
        }

        let integration_ms = self.config.mode.integration_ms(self.int_time_ms);
        let gain = if self.config.high_gain { 1.0 } else { 16.0 };
        let ch0 = normalised * integration_ms / 402.0 / gain;
        let to_count = |v: f64| v.round().clamp(0.0, f64::from(u16::MAX)) as u16;
        (to_count(ch0), to_count(ch0 * SIM_RATIO))
    }
}

impl MeterBridge for SimulatedBridge {
    fn get_data(&mut self) -> String {
        self.polls = self.polls.saturating_add(1);
        if self.polls <= SIM_WARMUP_POLLS {
            return "initializing:".to_string();
        }

        let (ch0, ch1) = self.channel_counts();
        self.run = self.run.wrapping_add(1);
        let mut mode = self.config.mode.bits();
        if self.config.high_gain {
            mode |= 0x10;
        }
        let [c0l, c0h] = ch0.to_le_bytes();
        let [c1l, c1h] = ch1.to_le_bytes();
        let [tl, th] = self.int_time_ms.to_le_bytes();
        let bytes = [1, self.run, c0l, c0h, c1l, c1h, mode, tl, th];

        let mut line = String::from("blm: ");
        for byte in bytes {
            line.push_str(&format!("{byte:02X} "));
        }
        line
    }

    fn get_status(&self) -> String {
        if self.polls <= SIM_WARMUP_POLLS {
            "connecting to simulated meter".to_string()
        } else {
            "simulated meter".to_string()
        }
    }

    fn get_lux(&self) -> f64 {
        self.scene_lux
    }

    fn set_parameters(&mut self, parameters: &str) -> Result<()> {
        let (config, int_time_ms) = parse_parameters(parameters)?;
        self.config = config;
        self.int_time_ms = int_time_ms;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::meter::frame::BridgeMessage;

    #[test]
    fn parses_configuration_strings() {
        let (config, time) = parse_parameters("12 0 0").unwrap();
        assert_eq!(config, SensorConfig::new(true, IntegrationMode::Slow));
        assert_eq!(time, 0);

        let (config, time) = parse_parameters("3 9a 2").unwrap();
        assert_eq!(config, SensorConfig::new(false, IntegrationMode::Custom));
        assert_eq!(time, 666);

        assert!(parse_parameters("3 9a").is_err());
        assert!(parse_parameters("x 0 0").is_err());
    }

    #[test]
    fn simulated_meter_warms_up_then_reports_frames() {
        let mut bridge = SimulatedBridge::with_seed(200.0, 7);
        assert_eq!(bridge.get_data(), "initializing:");
        assert_eq!(bridge.get_data(), "initializing:");

        let line = bridge.get_data();
        let BridgeMessage::Frame(frame) = BridgeMessage::parse(&line) else {
            panic!("expected a frame, got {line:?}");
        };
        assert_eq!(frame.mode, IntegrationMode::Slow);
        assert!(!frame.high_gain);
        let lux = frame.lux();
        assert!((lux - 200.0).abs() / 200.0 < 0.05, "lux {lux}");
    }

    #[test]
    fn simulated_meter_follows_configuration() {
        let mut bridge = SimulatedBridge::with_seed(50.0, 1);
        bridge.set_parameters("10 0 0").unwrap();
        bridge.get_data();
        bridge.get_data();

        let BridgeMessage::Frame(frame) = BridgeMessage::parse(&bridge.get_data()) else {
            panic!("expected a frame");
        };
        assert_eq!(frame.mode, IntegrationMode::Fast);
        assert!(frame.high_gain);
        let lux = frame.lux();
        assert!((lux - 50.0).abs() / 50.0 < 0.1, "lux {lux}");
    }

    #[test]
    fn simulated_meter_saturates() {
        let mut bridge = SimulatedBridge::with_seed(1.0e7, 3);
        bridge.set_parameters("12 0 0").unwrap();
        bridge.get_data();
        bridge.get_data();
        let BridgeMessage::Frame(frame) = BridgeMessage::parse(&bridge.get_data()) else {
            panic!("expected a frame");
        };
        assert_eq!(frame.ch0, u16::MAX);
        assert_eq!(frame.lux(), -1.0);
    }
}
