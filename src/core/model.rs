use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Conversion factor used when displaying readings in mg/dL.
pub const MMOL_TO_MGDL: f64 = 18.0;

/// Glucose trend direction as reported by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrendDirection {
    #[default]
    None,
    DoubleUp,
    SingleUp,
    FortyFiveUp,
    Flat,
    FortyFiveDown,
    SingleDown,
    DoubleDown,
    NotComputable,
    RateOutOfRange,
}

impl TrendDirection {
    /// Parse the sensor's trend name. Unknown names map to `None`.
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "DoubleUp" => Self::DoubleUp,
            "SingleUp" => Self::SingleUp,
            "FortyFiveUp" => Self::FortyFiveUp,
            "Flat" => Self::Flat,
            "FortyFiveDown" => Self::FortyFiveDown,
            "SingleDown" => Self::SingleDown,
            "DoubleDown" => Self::DoubleDown,
            "NotComputable" => Self::NotComputable,
            "RateOutOfRange" => Self::RateOutOfRange,
            _ => Self::None,
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            Self::DoubleUp => "⬆⬆",
            Self::SingleUp => "⬆",
            Self::FortyFiveUp => "↗",
            Self::Flat => "→",
            Self::FortyFiveDown => "↘",
            Self::SingleDown => "⬇",
            Self::DoubleDown => "⬇⬇",
            Self::None | Self::NotComputable | Self::RateOutOfRange => "?",
        }
    }
}

/// A single glucose reading in mmol/L.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub taken_at: NaiveDateTime,
    pub value_mmol: f64,
    pub trend: Option<TrendDirection>,
}

impl Reading {
    pub fn new(taken_at: NaiveDateTime, value_mmol: f64) -> Self {
        Self {
            taken_at,
            value_mmol,
            trend: None,
        }
    }

    pub fn with_trend(mut self, trend: TrendDirection) -> Self {
        self.trend = Some(trend);
        self
    }

    pub fn mgdl(&self) -> u32 {
        (self.value_mmol * MMOL_TO_MGDL).round().max(0.0) as u32
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = self.trend.unwrap_or_default().arrow();
        write!(f, "{:.1} mmol/L {}", self.value_mmol, arrow)
    }
}

/// The two alarming conditions. Keys escalation state and selects the alarm sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Low,
    High,
}

impl AlertKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Where a reading falls relative to the effective thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Normal,
    Low,
    High,
}

impl Classification {
    pub fn alert_kind(&self) -> Option<AlertKind> {
        match self {
            Self::Normal => None,
            Self::Low => Some(AlertKind::Low),
            Self::High => Some(AlertKind::High),
        }
    }
}

/// Result of evaluating one reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "kind", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    /// In range. Any alarm has been cleared.
    Normal,
    /// A snooze is active; no alarm was started. An alarm left over from an urgent
    /// low is stopped once the reading is back in range.
    Suppressed,
    /// Out of range but not yet held for the configured persistence window.
    PersistingUnderThreshold(AlertKind),
    Alarming(AlertKind),
    /// At or below the urgent low threshold. Bypasses snooze and persistence.
    UrgentAlarming,
}
