// Persistence debouncing: an out-of-range condition must hold continuously for the
// configured number of minutes before it alarms.

use chrono::{Duration, NaiveDateTime};

use super::model::{AlertKind, Classification};
use super::thresholds::ThresholdSet;

/// Classify a reading against the effective thresholds. No hysteresis band is applied.
pub fn classify(value_mmol: f64, thresholds: &ThresholdSet) -> Classification {
    thresholds.classify(value_mmol)
}

/// Start times of the current low or high condition. At most one is set at a time.
#[derive(Debug, Default, Clone)]
pub struct PersistenceTracker {
    low_started_at: Option<NaiveDateTime>,
    high_started_at: Option<NaiveDateTime>,
}

impl PersistenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record this tick's classification.
    ///
    /// The first observation of a kind starts its clock and clears the other kind.
    /// `Normal` clears both, so a later recurrence starts again from zero.
    pub fn observe(&mut self, classification: Classification, now: NaiveDateTime) {
        match classification {
            Classification::Low => {
                if self.low_started_at.is_none() {
                    log::info!("Low condition started at {}", now);
                    self.low_started_at = Some(now);
                }
                self.high_started_at = None;
            }
            Classification::High => {
                if self.high_started_at.is_none() {
                    log::info!("High condition started at {}", now);
                    self.high_started_at = Some(now);
                }
                self.low_started_at = None;
            }
            Classification::Normal => self.reset(),
        }
    }

    pub fn reset(&mut self) {
        self.low_started_at = None;
        self.high_started_at = None;
    }

    pub fn started_at(&self, kind: AlertKind) -> Option<NaiveDateTime> {
        match kind {
            AlertKind::Low => self.low_started_at,
            AlertKind::High => self.high_started_at,
        }
    }

    /// How long the condition of `kind` has held, if it is currently held.
    pub fn elapsed(&self, kind: AlertKind, now: NaiveDateTime) -> Option<Duration> {
        self.started_at(kind).map(|started| now - started)
    }

    /// True once the condition has held for at least its persistence window.
    /// A window of zero alarms on the first observation.
    pub fn should_alarm(&self, kind: AlertKind, now: NaiveDateTime, thresholds: &ThresholdSet) -> bool {
        let required = Duration::minutes(i64::from(thresholds.persist_minutes(kind)));
        match self.elapsed(kind, now) {
            Some(elapsed) => elapsed >= required,
            None => false,
        }
    }
}
