// Escalation rate limiting: at most one notification per contact and alert kind per
// contact-configured window. Independent of the audio alarm, so it survives the alarm
// clearing.

use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDateTime};

use crate::core::model::AlertKind;

type EscalationKey = (String, AlertKind);

#[derive(Debug, Default)]
pub struct EscalationController {
    /// Time-based re-send suppression, keyed by contact and kind
    suppressed_until: HashMap<EscalationKey, NaiveDateTime>,
    /// Contacts notified during the current out-of-range episode
    episode: HashSet<EscalationKey>,
}

impl EscalationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_escalate(&self, contact: &str, kind: AlertKind, now: NaiveDateTime) -> bool {
        match self.suppressed_until.get(&(contact.to_string(), kind)) {
            Some(until) => now >= *until,
            None => true,
        }
    }

    /// Record a successful send. Failed sends must not be recorded so they are retried.
    pub fn record_sent(&mut self, contact: &str, kind: AlertKind, now: NaiveDateTime, snooze_minutes: u32) {
        let key = (contact.to_string(), kind);
        let until = now + Duration::minutes(i64::from(snooze_minutes));
        log::info!("Message snooze set for {} ({}) until {}", contact, kind, until);
        self.suppressed_until.insert(key.clone(), until);
        self.episode.insert(key);
    }

    pub fn suppressed_until(&self, contact: &str, kind: AlertKind) -> Option<NaiveDateTime> {
        self.suppressed_until.get(&(contact.to_string(), kind)).copied()
    }

    pub fn notified_this_episode(&self, contact: &str, kind: AlertKind) -> bool {
        self.episode.contains(&(contact.to_string(), kind))
    }

    /// Forget which contacts were notified this episode. Time-based suppression is kept.
    pub fn end_episode(&mut self) {
        self.episode.clear();
    }

    /// Drop suppression entries that have already run out.
    pub fn prune(&mut self, now: NaiveDateTime) {
        self.suppressed_until.retain(|_, until| *until > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn minute(m: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(2, 0, 0)
            .unwrap()
            + Duration::minutes(m)
    }

    #[test]
    fn test_rate_limit_window() {
        let mut escalation = EscalationController::new();
        assert!(escalation.should_escalate("555", AlertKind::Low, minute(0)));
        escalation.record_sent("555", AlertKind::Low, minute(0), 30);

        assert!(!escalation.should_escalate("555", AlertKind::Low, minute(5)));
        assert!(!escalation.should_escalate("555", AlertKind::Low, minute(29)));
        assert!(escalation.should_escalate("555", AlertKind::Low, minute(30)));
        assert!(escalation.should_escalate("555", AlertKind::Low, minute(31)));
    }

    #[test]
    fn test_keys_are_per_contact_and_kind() {
        let mut escalation = EscalationController::new();
        escalation.record_sent("555", AlertKind::Low, minute(0), 30);
        assert!(escalation.should_escalate("555", AlertKind::High, minute(1)));
        assert!(escalation.should_escalate("777", AlertKind::Low, minute(1)));
    }

    #[test]
    fn test_end_episode_keeps_time_suppression() {
        let mut escalation = EscalationController::new();
        escalation.record_sent("555", AlertKind::High, minute(0), 60);
        assert!(escalation.notified_this_episode("555", AlertKind::High));

        escalation.end_episode();
        assert!(!escalation.notified_this_episode("555", AlertKind::High));
        assert!(!escalation.should_escalate("555", AlertKind::High, minute(2)));
        assert_eq!(escalation.suppressed_until("555", AlertKind::High), Some(minute(60)));
    }

    #[test]
    fn test_prune_drops_expired_entries() {
        let mut escalation = EscalationController::new();
        escalation.record_sent("555", AlertKind::Low, minute(0), 30);
        escalation.record_sent("777", AlertKind::Low, minute(0), 90);
        escalation.prune(minute(45));
        assert_eq!(escalation.suppressed_until("555", AlertKind::Low), None);
        assert!(escalation.suppressed_until("777", AlertKind::Low).is_some());
    }
}
