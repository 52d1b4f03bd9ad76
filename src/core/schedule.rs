// Time-windowed threshold overrides.
//
// Resolution is a pure function of the wall-clock time and the configured rules, so it
// is re-evaluated every tick and never cached.

use chrono::{Datelike, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::thresholds::{ThresholdError, ThresholdSet};

/// A named rule that overrides the default thresholds during a weekly time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRule {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Higher priority wins when windows overlap
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// Days of week, 0 = Monday .. 6 = Sunday
    #[serde(default = "default_days")]
    pub days: Vec<u8>,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    /// Earlier than `start_time` means the window wraps past midnight
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_persist_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_persist_minutes: Option<u32>,
}

fn default_enabled() -> bool {
    true
}

fn default_priority() -> u32 {
    1
}

fn default_days() -> Vec<u8> {
    vec![0, 1, 2, 3, 4]
}

impl ScheduleRule {
    /// Enabled rule for the given days and window with no overrides.
    pub fn new(name: impl Into<String>, days: Vec<u8>, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            priority: default_priority(),
            days,
            start_time,
            end_time,
            low_threshold: None,
            high_threshold: None,
            low_persist_minutes: None,
            high_persist_minutes: None,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Whether the rule is enabled and `now` falls on one of its days and inside its window.
    pub fn is_active_at(&self, now: NaiveDateTime) -> bool {
        if !self.enabled {
            return false;
        }

        let weekday = now.weekday().num_days_from_monday();
        if !self.days.iter().any(|d| u32::from(*d) == weekday) {
            return false;
        }

        let time = now.time();
        if self.start_time <= self.end_time {
            self.start_time <= time && time <= self.end_time
        } else {
            time >= self.start_time || time <= self.end_time
        }
    }

    /// The default thresholds with this rule's overrides applied.
    pub fn apply_to(&self, default: &ThresholdSet) -> Result<ThresholdSet, ThresholdError> {
        ThresholdSet::new(
            self.low_threshold.unwrap_or(default.low_threshold()),
            self.high_threshold.unwrap_or(default.high_threshold()),
            self.low_persist_minutes.unwrap_or(default.low_persist_minutes()),
            self.high_persist_minutes.unwrap_or(default.high_persist_minutes()),
        )
    }
}

/// The highest-priority rule active at `now`. On equal priority the first declared wins.
pub fn active_rule(now: NaiveDateTime, rules: &[ScheduleRule]) -> Option<&ScheduleRule> {
    let mut winner: Option<&ScheduleRule> = None;
    for rule in rules.iter().filter(|r| r.is_active_at(now)) {
        match winner {
            Some(current) if current.priority >= rule.priority => {}
            _ => winner = Some(rule),
        }
    }
    winner
}

/// Resolve the thresholds in effect at `now`.
///
/// Configuration validation rejects rules whose merged thresholds are invalid, but if one
/// slips through (e.g. an unvalidated hot reload) the default set is used and a warning
/// is logged.
pub fn resolve(now: NaiveDateTime, default: &ThresholdSet, rules: &[ScheduleRule]) -> ThresholdSet {
    let Some(rule) = active_rule(now, rules) else {
        return *default;
    };

    match rule.apply_to(default) {
        Ok(thresholds) => thresholds,
        Err(e) => {
            log::warn!("Schedule '{}' has invalid thresholds ({}), using defaults", rule.name, e);
            *default
        }
    }
}

/// `"HH:MM"` serde representation for times of day.
mod hhmm {
    use chrono::{NaiveTime, Timelike};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:02}:{:02}", time.hour(), time.minute()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(serde::de::Error::custom)
    }
}
