// Threshold sets: the resolved low/high limits and persistence windows in effect at a
// given moment.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::{AlertKind, Classification};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThresholdError {
    #[error("low threshold must be a positive number, got {0}")]
    InvalidLow(f64),
    #[error("high threshold ({high}) must be greater than low threshold ({low})")]
    HighNotAboveLow { low: f64, high: f64 },
}

/// Effective alert limits in mmol/L.
///
/// Construction goes through [`ThresholdSet::new`] (or deserialization, which calls it),
/// so `high > low > 0` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholds")]
pub struct ThresholdSet {
    low_threshold: f64,
    high_threshold: f64,
    low_persist_minutes: u32,
    high_persist_minutes: u32,
}

#[derive(Deserialize)]
struct RawThresholds {
    #[serde(default = "default_low")]
    low_threshold: f64,
    #[serde(default = "default_high")]
    high_threshold: f64,
    #[serde(default)]
    low_persist_minutes: u32,
    #[serde(default)]
    high_persist_minutes: u32,
}

fn default_low() -> f64 {
    3.9
}

fn default_high() -> f64 {
    15.0
}

impl TryFrom<RawThresholds> for ThresholdSet {
    type Error = ThresholdError;

    fn try_from(raw: RawThresholds) -> Result<Self, Self::Error> {
        Self::new(
            raw.low_threshold,
            raw.high_threshold,
            raw.low_persist_minutes,
            raw.high_persist_minutes,
        )
    }
}

impl ThresholdSet {
    pub fn new(
        low_threshold: f64,
        high_threshold: f64,
        low_persist_minutes: u32,
        high_persist_minutes: u32,
    ) -> Result<Self, ThresholdError> {
        if !low_threshold.is_finite() || low_threshold <= 0.0 {
            return Err(ThresholdError::InvalidLow(low_threshold));
        }
        // NaN high fails this comparison too
        if !(high_threshold > low_threshold) || !high_threshold.is_finite() {
            return Err(ThresholdError::HighNotAboveLow {
                low: low_threshold,
                high: high_threshold,
            });
        }
        Ok(Self {
            low_threshold,
            high_threshold,
            low_persist_minutes,
            high_persist_minutes,
        })
    }

    pub fn low_threshold(&self) -> f64 {
        self.low_threshold
    }

    pub fn high_threshold(&self) -> f64 {
        self.high_threshold
    }

    pub fn low_persist_minutes(&self) -> u32 {
        self.low_persist_minutes
    }

    pub fn high_persist_minutes(&self) -> u32 {
        self.high_persist_minutes
    }

    pub fn persist_minutes(&self, kind: AlertKind) -> u32 {
        match kind {
            AlertKind::Low => self.low_persist_minutes,
            AlertKind::High => self.high_persist_minutes,
        }
    }

    /// Classify a reading. The boundaries are the thresholds themselves, inclusive.
    pub fn classify(&self, value_mmol: f64) -> Classification {
        if value_mmol <= self.low_threshold {
            Classification::Low
        } else if value_mmol >= self.high_threshold {
            Classification::High
        } else {
            Classification::Normal
        }
    }
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            low_threshold: default_low(),
            high_threshold: default_high(),
            low_persist_minutes: 0,
            high_persist_minutes: 0,
        }
    }
}
