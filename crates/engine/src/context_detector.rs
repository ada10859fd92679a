// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context Detector: zone/trend/projection over a rolling buffer of usage
//! readings per agent (`spec.md` §4.7).

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A single usage reading fed in by an external monitor.
#[derive(Debug, Clone, Copy)]
pub struct UsageReading {
    pub timestamp: DateTime<Utc>,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Green,
    Yellow,
    Orange,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Rising,
    Falling,
    Stable,
}

#[derive(Debug, Clone, Copy)]
pub struct ZoneThresholds {
    pub yellow: f64,
    pub orange: f64,
    pub red: f64,
}

impl Default for ZoneThresholds {
    fn default() -> Self {
        Self {
            yellow: 0.70,
            orange: 0.80,
            red: 0.90,
        }
    }
}

impl ZoneThresholds {
    fn classify(self, usage_percent: f64) -> Zone {
        if usage_percent >= self.red {
            Zone::Red
        } else if usage_percent >= self.orange {
            Zone::Orange
        } else if usage_percent >= self.yellow {
            Zone::Yellow
        } else {
            Zone::Green
        }
    }
}

/// Slope magnitude below which the trend is classified `stable`.
const TREND_EPSILON: f64 = 1e-4;

/// How many trailing readings the linear fit uses.
const TREND_WINDOW: usize = 5;

/// Fixed-capacity ring of readings plus the last-observed zone, kept per
/// agent by [`ContextDetector`].
#[derive(Debug, Clone, Default)]
struct AgentHistory {
    readings: Vec<UsageReading>,
    last_zone: Option<Zone>,
}

pub struct ContextDetector {
    thresholds: ZoneThresholds,
    history: HashMap<String, AgentHistory>,
}

/// Emitted the instant a reading moves an agent across a zone boundary it
/// was not already in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneCrossing {
    EnteredOrange,
    EnteredRed,
}

impl ContextDetector {
    pub fn new(thresholds: ZoneThresholds) -> Self {
        Self {
            thresholds,
            history: HashMap::new(),
        }
    }

    /// Records `reading` for `agent_id` and returns the zone crossing it
    /// caused, if any. Crossing into `red` is what the coordinator wires
    /// up to trigger replacement.
    pub fn record(&mut self, agent_id: &str, reading: UsageReading) -> Option<ZoneCrossing> {
        let history = self.history.entry(agent_id.to_string()).or_default();
        let zone = self.thresholds.classify(reading.usage_percent);
        let crossing = match (history.last_zone, zone) {
            (Some(Zone::Green) | Some(Zone::Yellow) | None, Zone::Orange) => Some(ZoneCrossing::EnteredOrange),
            (prev, Zone::Red) if prev != Some(Zone::Red) => Some(ZoneCrossing::EnteredRed),
            _ => None,
        };
        history.readings.push(reading);
        if history.readings.len() > TREND_WINDOW {
            let excess = history.readings.len() - TREND_WINDOW;
            history.readings.drain(..excess);
        }
        history.last_zone = Some(zone);
        crossing
    }

    pub fn zone(&self, agent_id: &str) -> Option<Zone> {
        self.history.get(agent_id).and_then(|h| h.last_zone)
    }

    /// Linear-fit trend over the last [`TREND_WINDOW`] readings. Returns
    /// `None` if fewer than two readings exist.
    pub fn trend(&self, agent_id: &str) -> Option<Trend> {
        let readings = &self.history.get(agent_id)?.readings;
        let slope = linear_fit_slope(trailing_window(readings))?;
        Some(if slope > TREND_EPSILON {
            Trend::Rising
        } else if slope < -TREND_EPSILON {
            Trend::Falling
        } else {
            Trend::Stable
        })
    }

    /// Linearly extrapolates from `current` at `slope` (usage-fraction per
    /// second) to `target_threshold`, returning `None` when the slope is
    /// non-positive or the threshold has already been passed.
    pub fn predict_handoff_time(
        &self,
        current: UsageReading,
        slope_per_second: f64,
        target_threshold: f64,
    ) -> Option<DateTime<Utc>> {
        if slope_per_second <= 0.0 || current.usage_percent >= target_threshold {
            return None;
        }
        let seconds = (target_threshold - current.usage_percent) / slope_per_second;
        current.timestamp.checked_add_signed(chrono::Duration::seconds(seconds.ceil() as i64))
    }
}

fn trailing_window(readings: &[UsageReading]) -> &[UsageReading] {
    let start = readings.len().saturating_sub(TREND_WINDOW);
    &readings[start..]
}

/// Ordinary least-squares slope of `usage_percent` against elapsed seconds
/// since the first reading in `readings`. `None` when fewer than two
/// points or all points share the same timestamp.
fn linear_fit_slope(readings: &[UsageReading]) -> Option<f64> {
    if readings.len() < 2 {
        return None;
    }
    let t0 = readings[0].timestamp;
    let xs: Vec<f64> = readings
        .iter()
        .map(|r| (r.timestamp - t0).num_milliseconds() as f64 / 1000.0)
        .collect();
    let ys: Vec<f64> = readings.iter().map(|r| r.usage_percent).collect();

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        numerator += (x - mean_x) * (y - mean_y);
        denominator += (x - mean_x).powi(2);
    }

    if denominator == 0.0 {
        return None;
    }
    Some(numerator / denominator)
}
