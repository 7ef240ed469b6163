//! Accelerometer shake detection

use crate::config::ShakeConfig;
use std::time::{Duration, Instant};

/// One accelerometer sample in g
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Acceleration {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Sum of absolute components
    pub fn total(&self) -> f64 {
        self.x.abs() + self.y.abs() + self.z.abs()
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Turns a stream of samples into debounced shake triggers
#[derive(Debug, Clone)]
pub struct ShakeDetector {
    threshold: f64,
    min_interval: Duration,
    last_trigger: Option<Instant>,
    enabled: bool,
}

impl ShakeDetector {
    pub fn new(config: &ShakeConfig) -> Self {
        Self {
            threshold: config.threshold,
            min_interval: Duration::from_millis(config.min_interval_ms),
            last_trigger: None,
            enabled: true,
        }
    }

    /// Feed a sample; returns `true` when it counts as a shake
    pub fn on_sample(&mut self, sample: Acceleration, now: Instant) -> bool {
        if !self.enabled {
            return false;
        }

        let total = sample.total();
        let magnitude = sample.magnitude();
        if total <= self.threshold * 1.2 && magnitude <= self.threshold {
            return false;
        }

        if let Some(last) = self.last_trigger {
            if now.saturating_duration_since(last) <= self.min_interval {
                return false;
            }
        }

        self.last_trigger = Some(now);
        tracing::debug!("Shake detected (total {:.2}, magnitude {:.2})", total, magnitude);
        true
    }

    /// Disabled detectors ignore every sample
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for ShakeDetector {
    fn default() -> Self {
        Self::new(&ShakeConfig::default())
    }
}

/// Parse an `x y z` sample line; commas are accepted as separators
pub fn parse_sample(line: &str) -> Option<Acceleration> {
    let mut values = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<f64>());

    let x = values.next()?.ok()?;
    let y = values.next()?.ok()?;
    let z = values.next()?.ok()?;
    if values.next().is_some() {
        return None;
    }
    Some(Acceleration { x, y, z })
}
