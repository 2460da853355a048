use serde::{Deserialize, Serialize};

/// Returned when either channel reads `0xFFFF`.
pub const SATURATED_LUX: f64 = -1.0;

/// Integration time all channel counts are normalised to.
const REFERENCE_INTEGRATION_MS: f64 = 402.0;

/// Low gain reads 16x fewer counts than high gain.
const LOW_GAIN_FACTOR: f64 = 16.0;

/// Sensor integration time selector, as carried in the low two bits of the mode byte.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum IntegrationMode {
    #[default]
    Fast,
    Medium,
    Slow,
    Custom,
}

impl IntegrationMode {
    pub const ALL: [IntegrationMode; 4] = [
        IntegrationMode::Fast,
        IntegrationMode::Medium,
        IntegrationMode::Slow,
        IntegrationMode::Custom,
    ];

    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => IntegrationMode::Fast,
            1 => IntegrationMode::Medium,
            2 => IntegrationMode::Slow,
            _ => IntegrationMode::Custom,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            IntegrationMode::Fast => 0,
            IntegrationMode::Medium => 1,
            IntegrationMode::Slow => 2,
            IntegrationMode::Custom => 3,
        }
    }

    /// Label shown in the mode dropdown.
    pub fn label(self) -> &'static str {
        match self {
            IntegrationMode::Fast => "13.7ms",
            IntegrationMode::Medium => "101ms",
            IntegrationMode::Slow => "402ms",
            IntegrationMode::Custom => "Custom:",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.label() == label)
    }

    /// Effective integration time used to normalise channel counts.
    pub fn integration_ms(self, custom_ms: u16) -> f64 {
        match self {
            IntegrationMode::Fast => 13.7,
            IntegrationMode::Medium => 101.0,
            IntegrationMode::Slow => REFERENCE_INTEGRATION_MS,
            IntegrationMode::Custom => f64::from(custom_ms),
        }
    }
}

/// Converts raw channel counts into lux.
///
/// Channel 0 is the broadband photodiode, channel 1 the infrared one. The coefficients are
/// the piecewise approximation from the TSL2561 datasheet, selected by the channel ratio.
/// Saturated readings yield [`SATURATED_LUX`]. A dark channel or a zero integration time
/// yields zero.
pub fn calc_lux(ch0: u16, ch1: u16, high_gain: bool, integration_ms: f64) -> f64 {
    if ch0 == u16::MAX || ch1 == u16::MAX {
        return SATURATED_LUX;
    }
    if ch0 == 0 || ch1 == 0 || integration_ms <= 0.0 || integration_ms.is_nan() {
        return 0.0;
    }

    let ratio = f64::from(ch1) / f64::from(ch0);
    let scale = REFERENCE_INTEGRATION_MS / integration_ms;
    let gain = if high_gain { 1.0 } else { LOW_GAIN_FACTOR };
    let d0 = f64::from(ch0) * scale * gain;
    let d1 = f64::from(ch1) * scale * gain;

    if ratio < 0.5 {
        0.0304 * d0 - 0.062 * d0 * ratio.powf(1.4)
    } else if ratio < 0.61 {
        0.0224 * d0 - 0.031 * d1
    } else if ratio < 0.80 {
        0.0128 * d0 - 0.0153 * d1
    } else if ratio < 1.30 {
        0.00146 * d0 - 0.00112 * d1
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn saturated_channel_returns_sentinel() {
        assert_eq!(calc_lux(0xFFFF, 10, true, 402.0), -1.0);
        assert_eq!(calc_lux(10, 0xFFFF, false, 13.7), -1.0);
    }

    #[test]
    fn zero_channel_is_dark() {
        assert_eq!(calc_lux(0, 0, true, 402.0), 0.0);
        assert_eq!(calc_lux(0, 25, true, 402.0), 0.0);
        assert_eq!(calc_lux(25, 0, true, 402.0), 0.0);
    }

    #[test]
    fn zero_integration_time_is_degenerate() {
        assert_eq!(calc_lux(100, 90, true, 0.0), 0.0);
        assert_eq!(calc_lux(100, 90, false, -5.0), 0.0);
    }

    #[test]
    fn low_ratio_band() {
        // ratio 0.25 at reference integration and high gain
        let expected = 0.0304 * 400.0 - 0.062 * 400.0 * 0.25_f64.powf(1.4);
        assert_close(calc_lux(400, 100, true, 402.0), expected);
    }

    #[test]
    fn second_band() {
        // ratio 0.55
        assert_close(calc_lux(100, 55, true, 402.0), 0.0224 * 100.0 - 0.031 * 55.0);
    }

    #[test]
    fn third_band() {
        // ratio 0.7
        assert_close(calc_lux(100, 70, true, 402.0), 0.0128 * 100.0 - 0.0153 * 70.0);
    }

    #[test]
    fn fourth_band_uses_smallest_coefficients() {
        // ratio 0.9
        assert_close(calc_lux(100, 90, true, 402.0), 0.00146 * 100.0 - 0.00112 * 90.0);
    }

    #[test]
    fn high_ratio_reads_zero() {
        assert_eq!(calc_lux(100, 140, true, 402.0), 0.0);
    }

    #[test]
    fn low_gain_and_short_integration_scale_counts() {
        let scale = 402.0 / 13.7 * 16.0;
        let expected = 0.00146 * 100.0 * scale - 0.00112 * 90.0 * scale;
        assert_close(calc_lux(100, 90, false, 13.7), expected);
    }

    #[test]
    fn band_edge_belongs_to_upper_band() {
        // ratio exactly 0.5 is not "< 0.5"
        assert_close(calc_lux(200, 100, true, 402.0), 0.0224 * 200.0 - 0.031 * 100.0);
    }

    #[test]
    fn mode_bits_round_through_labels() {
        for mode in IntegrationMode::ALL {
            assert_eq!(IntegrationMode::from_bits(mode.bits()), mode);
            assert_eq!(IntegrationMode::from_label(mode.label()), Some(mode));
        }
        assert_eq!(IntegrationMode::from_bits(0x12), IntegrationMode::Slow);
        assert_eq!(IntegrationMode::Custom.integration_ms(666), 666.0);
        assert_eq!(IntegrationMode::default(), IntegrationMode::Fast);
    }
}
