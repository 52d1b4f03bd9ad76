// User snooze: a time-boxed suppression of non-urgent alarms.
//
// Expiry is detected lazily on the next evaluation tick; there is no background timer.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnoozeWindow {
    pub started_at: NaiveDateTime,
    pub duration_minutes: u32,
}

impl SnoozeWindow {
    pub fn ends_at(&self) -> NaiveDateTime {
        self.started_at + Duration::minutes(i64::from(self.duration_minutes))
    }

    pub fn is_active(&self, now: NaiveDateTime) -> bool {
        now < self.ends_at()
    }
}

/// Snooze state as seen by one evaluation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnoozeCheck {
    NotSnoozed,
    Suppressed { until: NaiveDateTime },
    /// The window ran out since the last tick and has now been cleared.
    JustExpired(SnoozeWindow),
}

#[derive(Debug, Default)]
pub struct SnoozeController {
    current: Option<SnoozeWindow>,
}

impl SnoozeController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new snooze, replacing any current one.
    pub fn snooze(&mut self, now: NaiveDateTime, minutes: u32) -> SnoozeWindow {
        let window = SnoozeWindow {
            started_at: now,
            duration_minutes: minutes,
        };
        log::info!("Snoozed for {} minutes until {}", minutes, window.ends_at());
        self.current = Some(window);
        window
    }

    /// End the current snooze early. The returned window is truncated to the time
    /// actually elapsed, for audit records.
    pub fn cancel(&mut self, now: NaiveDateTime) -> Option<SnoozeWindow> {
        let window = self.current.take()?;
        let elapsed = (now - window.started_at).num_minutes().max(0);
        let elapsed = u32::try_from(elapsed).unwrap_or(u32::MAX);
        log::info!("Snooze cancelled after {} minutes", elapsed);
        Some(SnoozeWindow {
            duration_minutes: elapsed.min(window.duration_minutes),
            ..window
        })
    }

    /// Whether an alarm would be suppressed right now. Urgent alarms never are.
    pub fn is_suppressed(&self, now: NaiveDateTime, is_urgent: bool) -> bool {
        if is_urgent {
            return false;
        }
        self.current.is_some_and(|w| w.is_active(now))
    }

    /// Time left on the current snooze, if any.
    pub fn remaining(&self, now: NaiveDateTime) -> Option<Duration> {
        self.current
            .filter(|w| w.is_active(now))
            .map(|w| w.ends_at() - now)
    }

    pub fn current(&self) -> Option<&SnoozeWindow> {
        self.current.as_ref()
    }

    /// Per-tick check. An expired window is cleared here, exactly once.
    pub fn check(&mut self, now: NaiveDateTime) -> SnoozeCheck {
        match self.current {
            None => SnoozeCheck::NotSnoozed,
            Some(window) if window.is_active(now) => SnoozeCheck::Suppressed {
                until: window.ends_at(),
            },
            Some(window) => {
                log::info!("Snooze expired at {}", window.ends_at());
                self.current = None;
                SnoozeCheck::JustExpired(window)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn minute(m: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            + Duration::minutes(m)
    }

    #[test]
    fn test_snooze_suppresses_until_end() {
        let mut snooze = SnoozeController::new();
        snooze.snooze(minute(0), 30);

        assert!(snooze.is_suppressed(minute(0), false));
        assert!(snooze.is_suppressed(minute(29), false));
        assert!(!snooze.is_suppressed(minute(30), false));
        assert_eq!(snooze.remaining(minute(10)), Some(Duration::minutes(20)));
        assert_eq!(snooze.remaining(minute(30)), None);
    }

    #[test]
    fn test_urgent_is_never_suppressed() {
        let mut snooze = SnoozeController::new();
        snooze.snooze(minute(0), 60);
        assert!(!snooze.is_suppressed(minute(1), true));
    }

    #[test]
    fn test_check_clears_expired_window_once() {
        let mut snooze = SnoozeController::new();
        let window = snooze.snooze(minute(0), 30);

        assert_eq!(snooze.check(minute(5)), SnoozeCheck::Suppressed { until: minute(30) });
        assert_eq!(snooze.check(minute(31)), SnoozeCheck::JustExpired(window));
        assert_eq!(snooze.check(minute(32)), SnoozeCheck::NotSnoozed);
        assert!(snooze.current().is_none());
    }

    #[test]
    fn test_cancel_truncates_window() {
        let mut snooze = SnoozeController::new();
        snooze.snooze(minute(0), 60);

        let cancelled = snooze.cancel(minute(12)).unwrap();
        assert_eq!(cancelled.duration_minutes, 12);
        assert!(!cancelled.is_active(minute(12)));
        assert!(!snooze.is_suppressed(minute(13), false));
        assert!(snooze.cancel(minute(14)).is_none());
    }

    #[test]
    fn test_new_snooze_replaces_current() {
        let mut snooze = SnoozeController::new();
        snooze.snooze(minute(0), 60);
        snooze.snooze(minute(10), 5);
        assert!(!snooze.is_suppressed(minute(16), false));
    }
}
