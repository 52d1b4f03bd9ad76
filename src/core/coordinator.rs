use chrono::{Duration, NaiveDateTime};

use super::alerts::engine::AlertEvaluator;
use super::model::EvaluationOutcome;
use super::source::ReadingSource;

/// Consecutive source failures before the problem is logged at error level.
pub const ERROR_LOG_THRESHOLD: u32 = 5;

/// Polls a reading source and feeds new readings to the evaluator.
pub struct Coordinator {
    source: Box<dyn ReadingSource>,
    evaluator: AlertEvaluator,
    max_reading_age: Option<Duration>,
    last_evaluated: Option<NaiveDateTime>,
    consecutive_errors: u32,
}

impl Coordinator {
    pub fn new(source: Box<dyn ReadingSource>, evaluator: AlertEvaluator) -> Self {
        Self {
            source,
            evaluator,
            max_reading_age: None,
            last_evaluated: None,
            consecutive_errors: 0,
        }
    }

    /// Readings older than this are skipped. `0` disables the check.
    pub fn with_max_reading_age(mut self, minutes: u64) -> Self {
        self.set_max_reading_age(minutes);
        self
    }

    pub fn set_max_reading_age(&mut self, minutes: u64) {
        self.max_reading_age = match i64::try_from(minutes) {
            Ok(0) | Err(_) => None,
            Ok(minutes) => Some(Duration::minutes(minutes)),
        };
    }

    /// One poll. Returns `None` when there was nothing to evaluate.
    pub fn tick(&mut self, now: NaiveDateTime) -> Option<EvaluationOutcome> {
        let reading = match self.source.get_reading() {
            Ok(reading) => {
                self.consecutive_errors = 0;
                reading
            }
            Err(e) => {
                self.consecutive_errors += 1;
                if self.consecutive_errors >= ERROR_LOG_THRESHOLD {
                    log::error!(
                        "Failed to get a reading {} times in a row, check your connection: {}",
                        self.consecutive_errors,
                        e
                    );
                } else {
                    log::warn!("Failed to get reading: {}", e);
                }
                return None;
            }
        };

        let Some(reading) = reading else {
            log::debug!("No new reading");
            return None;
        };

        if self.last_evaluated.is_some_and(|last| reading.taken_at <= last) {
            log::debug!("Ignoring reading from {} (already evaluated)", reading.taken_at);
            return None;
        }
        if let Some(max_age) = self.max_reading_age {
            if now - reading.taken_at > max_age {
                log::warn!(
                    "Latest reading is stale ({} from {}), not evaluating",
                    reading,
                    reading.taken_at
                );
                return None;
            }
        }

        self.last_evaluated = Some(reading.taken_at);
        self.evaluator.on_reading(&reading, now)
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn evaluator(&self) -> &AlertEvaluator {
        &self.evaluator
    }

    pub fn shutdown(&mut self) {
        self.evaluator.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alerts::engine::AlertSettings;
    use crate::core::alerts::player::tests::RecordingPlayer;
    use crate::core::audit::NullAuditSink;
    use crate::core::model::{AlertKind, Reading};
    use crate::core::notify::LogNotifier;
    use crate::core::source::SourceError;
    use chrono::NaiveDate;
    use std::collections::VecDeque;
    use std::sync::Arc;

    struct ScriptedSource(VecDeque<Result<Option<Reading>, SourceError>>);

    impl ReadingSource for ScriptedSource {
        fn get_reading(&mut self) -> Result<Option<Reading>, SourceError> {
            self.0.pop_front().unwrap_or(Ok(None))
        }
    }

    fn minute(m: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
            + Duration::minutes(m)
    }

    fn io_error() -> SourceError {
        SourceError::Read {
            path: "readings.csv".to_string(),
            source: std::io::Error::other("disconnected"),
        }
    }

    fn coordinator(script: Vec<Result<Option<Reading>, SourceError>>) -> Coordinator {
        let evaluator = AlertEvaluator::new(
            AlertSettings::default(),
            Arc::new(RecordingPlayer::default()),
            Box::new(LogNotifier),
            Box::new(NullAuditSink),
        );
        Coordinator::new(Box::new(ScriptedSource(script.into())), evaluator).with_max_reading_age(15)
    }

    #[test]
    fn test_tick_evaluates_new_reading() {
        let mut coord = coordinator(vec![Ok(Some(Reading::new(minute(0), 3.5)))]);
        assert_eq!(coord.tick(minute(1)), Some(EvaluationOutcome::Alarming(AlertKind::Low)));
        assert_eq!(coord.tick(minute(6)), None);
        coord.shutdown();
    }

    #[test]
    fn test_duplicate_and_stale_readings_skipped() {
        let mut coord = coordinator(vec![
            Ok(Some(Reading::new(minute(0), 6.0))),
            Ok(Some(Reading::new(minute(0), 6.0))),
            Ok(Some(Reading::new(minute(10), 3.0))),
        ]);
        assert_eq!(coord.tick(minute(1)), Some(EvaluationOutcome::Normal));
        assert_eq!(coord.tick(minute(6)), None);
        // 30 minutes old at evaluation time
        assert_eq!(coord.tick(minute(40)), None);
        assert!(!coord.evaluator().current_alarm_state().is_alerting());
    }

    #[test]
    fn test_consecutive_errors_counted_and_reset() {
        let mut script: Vec<_> = (0..ERROR_LOG_THRESHOLD).map(|_| Err(io_error())).collect();
        script.push(Ok(None));
        let mut coord = coordinator(script);

        for m in 0..i64::from(ERROR_LOG_THRESHOLD) {
            assert_eq!(coord.tick(minute(m)), None);
        }
        assert_eq!(coord.consecutive_errors(), ERROR_LOG_THRESHOLD);

        coord.tick(minute(10));
        assert_eq!(coord.consecutive_errors(), 0);
    }

    #[test]
    fn test_age_check_can_be_disabled() {
        let mut coord = coordinator(vec![Ok(Some(Reading::new(minute(0), 12.0)))]);
        coord.set_max_reading_age(0);
        assert!(coord.tick(minute(120)).is_some());
    }
}
