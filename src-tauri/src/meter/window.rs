use std::collections::VecDeque;

use serde::Serialize;

pub const DEFAULT_WINDOW_MS: u64 = 3000;

/// Divisor turning lux into an exposure value at ISO 100.
const EV_CALIBRATION: f64 = 2.5;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LuxStats {
    pub mean: f64,
    pub max: f64,
}

impl LuxStats {
    pub fn mean_ev(&self) -> Option<f64> {
        lux_to_ev(self.mean)
    }

    pub fn max_ev(&self) -> Option<f64> {
        lux_to_ev(self.max)
    }
}

/// `None` for readings that are dark or flagged as saturated.
pub fn lux_to_ev(lux: f64) -> Option<f64> {
    (lux > 0.0).then(|| (lux / EV_CALIBRATION).log2())
}

/// Trailing window of timestamped lux samples.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    span_ms: u64,
    samples: VecDeque<(u64, f64)>,
}

impl RollingWindow {
    pub fn new(span_ms: u64) -> Self {
        Self {
            span_ms,
            samples: VecDeque::new(),
        }
    }

    pub fn span_ms(&self) -> u64 {
        self.span_ms
    }

    pub fn set_span_ms(&mut self, span_ms: u64) {
        self.span_ms = span_ms;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn oldest_ms(&self) -> Option<u64> {
        self.samples.front().map(|(ts, _)| *ts)
    }

    /// Records a sample taken at `now_ms`, prunes everything older than the span and
    /// rescans the survivors.
    pub fn push(&mut self, now_ms: u64, lux: f64) -> LuxStats {
        self.samples.push_back((now_ms, lux));
        let cutoff = now_ms.saturating_sub(self.span_ms);
        while self.samples.front().is_some_and(|(ts, _)| *ts < cutoff) {
            self.samples.pop_front();
        }
        self.stats()
    }

    pub fn stats(&self) -> LuxStats {
        if self.samples.is_empty() {
            return LuxStats::default();
        }
        let mut sum = 0.0;
        let mut max = 0.0_f64;
        for (_, lux) in &self.samples {
            sum += lux;
            if *lux > max {
                max = *lux;
            }
        }
        LuxStats {
            mean: sum / self.samples.len() as f64,
            max,
        }
    }
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_MS)
    }
}
