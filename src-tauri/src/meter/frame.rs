use serde::{Deserialize, Serialize};

use super::lux::{calc_lux, IntegrationMode};

/// Marker plus the seven bytes up to and including the mode byte.
const MIN_FRAME_TOKENS: usize = 8;

const HIGH_GAIN_BIT: u8 = 0x10;

/// One sensor update as sent by the meter firmware.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawFrame {
    pub version: u8,
    pub run: u8,
    pub ch0: u16,
    pub ch1: u16,
    pub mode: IntegrationMode,
    pub high_gain: bool,
    pub int_time_ms: u16,
}

impl RawFrame {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < MIN_FRAME_TOKENS - 1 {
            return None;
        }
        let byte = |idx: usize| bytes.get(idx).copied().unwrap_or(0);

        let frame = Self {
            version: byte(0),
            run: byte(1),
            ch0: u16::from_le_bytes([byte(2), byte(3)]),
            ch1: u16::from_le_bytes([byte(4), byte(5)]),
            mode: IntegrationMode::from_bits(byte(6)),
            high_gain: byte(6) & HIGH_GAIN_BIT != 0,
            int_time_ms: u16::from_le_bytes([byte(7), byte(8)]),
        };
        // custom integration needs a time to normalise against
        if frame.mode == IntegrationMode::Custom && frame.int_time_ms == 0 {
            return None;
        }
        Some(frame)
    }

    pub fn integration_ms(&self) -> f64 {
        self.mode.integration_ms(self.int_time_ms)
    }

    pub fn lux(&self) -> f64 {
        calc_lux(self.ch0, self.ch1, self.high_gain, self.integration_ms())
    }
}

/// A bridge line decoded once at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeMessage {
    Initializing,
    /// Neither the meter nor the phone's light sensor is available.
    NoLux,
    Status,
    NoData,
    /// Fallback reading from the phone's own light sensor.
    Lux(f64),
    Frame(RawFrame),
    /// A `blm:` line that was cut short or carried garbage.
    Incomplete,
    Unexpected(String),
}

impl BridgeMessage {
    pub fn parse(line: &str) -> Self {
        let mut tokens = line.split_whitespace();
        let Some(head) = tokens.next() else {
            return BridgeMessage::Unexpected(line.to_string());
        };

        match head {
            "initializing:" => BridgeMessage::Initializing,
            "nolux:" => BridgeMessage::NoLux,
            "status:" => BridgeMessage::Status,
            "nodata:" => BridgeMessage::NoData,
            "lux:" => match tokens.next().map(str::parse::<f64>) {
                Some(Ok(lux)) if lux.is_finite() => BridgeMessage::Lux(lux),
                _ => BridgeMessage::Unexpected(line.to_string()),
            },
            "blm:" => parse_frame(tokens),
            _ => BridgeMessage::Unexpected(line.to_string()),
        }
    }
}

fn parse_frame<'a>(tokens: impl Iterator<Item = &'a str>) -> BridgeMessage {
    let bytes: Result<Vec<u8>, _> = tokens.map(|token| u8::from_str_radix(token, 16)).collect();
    match bytes {
        Ok(bytes) => RawFrame::from_bytes(&bytes)
            .map(BridgeMessage::Frame)
            .unwrap_or(BridgeMessage::Incomplete),
        Err(err) => {
            log::warn!("discarding sensor frame with bad byte: {err}");
            BridgeMessage::Incomplete
        }
    }
}

/// Status line shown for messages that carry no reading of their own.
pub fn status_text(message: &BridgeMessage, bridge_status: &str) -> Option<String> {
    match message {
        BridgeMessage::Initializing => Some(format!("Status: initializing({bridge_status}).")),
        BridgeMessage::NoLux => Some(format!("Status: ERROR({bridge_status}).")),
        BridgeMessage::Status | BridgeMessage::NoData => Some(format!("Status: {bridge_status}.")),
        BridgeMessage::Lux(_) => Some(format!(
            "Status: no BLM, using internal light meter({bridge_status})."
        )),
        BridgeMessage::Unexpected(line) => Some(format!(
            "Status: INTERNAL ERROR, unexpected read: {line}(status: {bridge_status})."
        )),
        BridgeMessage::Frame(_) | BridgeMessage::Incomplete => None,
    }
}
