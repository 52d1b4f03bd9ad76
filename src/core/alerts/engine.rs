// Alert evaluator - runs the per-reading state machine over schedules, persistence,
// snooze, the alarm player and escalation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::escalation::EscalationController;
use super::model::{AlarmSounds, AlarmState, EmergencyContact};
use super::player::{AlarmPlayer, SoundPlayer};
use crate::core::audit::{AuditEvent, AuditSink};
use crate::core::config::{validate_alerts, ConfigError};
use crate::core::model::{AlertKind, Classification, EvaluationOutcome, Reading};
use crate::core::notify::{Notifier, NotifierConfig};
use crate::core::persistence::{self, PersistenceTracker};
use crate::core::schedule::{self, ScheduleRule};
use crate::core::snooze::{SnoozeCheck, SnoozeController, SnoozeWindow};
use crate::core::thresholds::ThresholdSet;

/// Alert configuration - persisted in settings.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSettings {
    /// Always alarms immediately, bypassing snooze, schedules and persistence
    #[serde(default = "default_urgent_low")]
    pub urgent_low: f64,
    /// Thresholds used when no schedule is active
    #[serde(default)]
    pub thresholds: ThresholdSet,
    #[serde(default = "default_sound")]
    pub low_alert_sound: PathBuf,
    #[serde(default = "default_sound")]
    pub high_alert_sound: PathBuf,
    /// Seconds between repeats of a playing alarm
    #[serde(default = "default_alert_interval")]
    pub alert_interval_secs: u64,
    #[serde(default)]
    pub schedules: Vec<ScheduleRule>,
    #[serde(default)]
    pub emergency_contacts: Vec<EmergencyContact>,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

fn default_urgent_low() -> f64 {
    2.8
}

fn default_sound() -> PathBuf {
    PathBuf::from("sounds/siren.mp3")
}

fn default_alert_interval() -> u64 {
    300
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            urgent_low: default_urgent_low(),
            thresholds: ThresholdSet::default(),
            low_alert_sound: default_sound(),
            high_alert_sound: default_sound(),
            alert_interval_secs: default_alert_interval(),
            schedules: Vec::new(),
            emergency_contacts: Vec::new(),
            notifier: NotifierConfig::default(),
        }
    }
}

impl AlertSettings {
    pub fn sounds(&self) -> AlarmSounds {
        AlarmSounds {
            low: self.low_alert_sound.clone(),
            high: self.high_alert_sound.clone(),
        }
    }

    pub fn alert_interval(&self) -> Duration {
        Duration::from_secs(self.alert_interval_secs)
    }

    /// Thresholds in effect at `now`, considering schedules.
    pub fn effective_thresholds(&self, now: NaiveDateTime) -> ThresholdSet {
        schedule::resolve(now, &self.thresholds, &self.schedules)
    }
}

/// Owns all alert state. Driven by one caller; not shared between threads.
pub struct AlertEvaluator {
    settings: AlertSettings,
    player: AlarmPlayer,
    persistence: PersistenceTracker,
    snooze: SnoozeController,
    escalation: EscalationController,
    notifier: Box<dyn Notifier>,
    audit: Box<dyn AuditSink>,
    last_reading: Option<Reading>,
}

impl AlertEvaluator {
    pub fn new(
        settings: AlertSettings,
        sound_player: Arc<dyn SoundPlayer>,
        notifier: Box<dyn Notifier>,
        audit: Box<dyn AuditSink>,
    ) -> Self {
        let player = AlarmPlayer::new(settings.sounds(), settings.alert_interval(), sound_player);
        Self {
            settings,
            player,
            persistence: PersistenceTracker::new(),
            snooze: SnoozeController::new(),
            escalation: EscalationController::new(),
            notifier,
            audit,
            last_reading: None,
        }
    }

    /// Replace the settings (hot-reload friendly). Persistence, snooze and escalation
    /// state carry over; sound changes apply from the next alarm started. Invalid
    /// settings are rejected and the current ones stay in effect.
    pub fn update_settings(&mut self, settings: AlertSettings) -> Result<(), ConfigError> {
        validate_alerts(&settings)?;
        self.player.reconfigure(settings.sounds(), settings.alert_interval());
        self.settings = settings;
        Ok(())
    }

    pub fn settings(&self) -> &AlertSettings {
        &self.settings
    }

    /// Evaluate one reading. Returns `None` for a non-finite value, leaving all state as is.
    pub fn on_reading(&mut self, reading: &Reading, now: NaiveDateTime) -> Option<EvaluationOutcome> {
        let value = reading.value_mmol;
        if !value.is_finite() {
            log::warn!("Ignoring non-finite reading from {}", reading.taken_at);
            return None;
        }
        self.last_reading = Some(reading.clone());
        self.escalation.prune(now);
        Some(self.evaluate(reading, now))
    }

    fn evaluate(&mut self, reading: &Reading, now: NaiveDateTime) -> EvaluationOutcome {
        let value = reading.value_mmol;

        // Urgent low skips snooze, schedules and persistence entirely
        if value <= self.settings.urgent_low {
            log::error!(
                "URGENT LOW: {:.1} mmol/L (urgent threshold {:.1})",
                value,
                self.settings.urgent_low
            );
            self.persistence.observe(Classification::Low, now);
            self.start_alarm(AlertKind::Low, value, true, now);
            self.escalate(AlertKind::Low, now);
            return EvaluationOutcome::UrgentAlarming;
        }

        let thresholds = self.settings.effective_thresholds(now);
        let classification = persistence::classify(value, &thresholds);

        match self.snooze.check(now) {
            SnoozeCheck::Suppressed { until } => {
                // Keep the persistence clock running so expiry resumes where it left off
                self.persistence.observe(classification, now);
                // Only an urgent low can be playing here; it stops once no longer low
                if classification != Classification::Low {
                    self.clear_alarm(now);
                }
                if classification == Classification::Normal {
                    self.escalation.end_episode();
                }
                log::debug!("Snoozed until {}, not alerting ({})", until, reading);
                return EvaluationOutcome::Suppressed;
            }
            SnoozeCheck::JustExpired(_) => {
                self.audit.record(&AuditEvent::SnoozeExpired { at: now });
            }
            SnoozeCheck::NotSnoozed => {}
        }

        log::info!(
            "Glucose: {} (thresholds: {:.1} - {:.1})",
            reading,
            thresholds.low_threshold(),
            thresholds.high_threshold()
        );
        self.persistence.observe(classification, now);

        let Some(kind) = classification.alert_kind() else {
            if self.player.is_alerting() {
                log::info!("Glucose returned to normal range");
            }
            self.clear_alarm(now);
            self.escalation.end_episode();
            return EvaluationOutcome::Normal;
        };

        if self.persistence.should_alarm(kind, now, &thresholds) {
            log::warn!("{} GLUCOSE (persistent): {:.1}", kind.display_name().to_uppercase(), value);
            self.start_alarm(kind, value, false, now);
            self.escalate(kind, now);
            return EvaluationOutcome::Alarming(kind);
        }

        // An alarm for the opposite condition no longer applies
        if self.player.state().alert_kind().is_some_and(|playing| playing != kind) {
            self.clear_alarm(now);
        }
        if let Some(elapsed) = self.persistence.elapsed(kind, now) {
            log::debug!(
                "{} glucose, waiting for persistence ({}/{}m)",
                kind,
                elapsed.num_minutes(),
                thresholds.persist_minutes(kind)
            );
        }
        EvaluationOutcome::PersistingUnderThreshold(kind)
    }

    /// Re-run the evaluation with the most recent reading, e.g. after a snooze is cancelled.
    pub fn reevaluate(&mut self, now: NaiveDateTime) -> Option<EvaluationOutcome> {
        let reading = self.last_reading.clone()?;
        self.on_reading(&reading, now)
    }

    /// Silence non-urgent alarms for `minutes`. Stops the current alarm immediately.
    pub fn snooze(&mut self, now: NaiveDateTime, minutes: u32) -> SnoozeWindow {
        let window = self.snooze.snooze(now, minutes);
        self.audit.record(&AuditEvent::Snoozed {
            at: now,
            minutes,
            until: window.ends_at(),
        });
        self.clear_alarm(now);
        window
    }

    pub fn cancel_snooze(&mut self, now: NaiveDateTime) -> bool {
        match self.snooze.cancel(now) {
            Some(window) => {
                self.audit.record(&AuditEvent::SnoozeCancelled {
                    at: now,
                    elapsed_minutes: window.duration_minutes,
                });
                true
            }
            None => false,
        }
    }

    pub fn snooze_remaining(&self, now: NaiveDateTime) -> Option<chrono::Duration> {
        self.snooze.remaining(now)
    }

    pub fn is_snoozed(&self, now: NaiveDateTime) -> bool {
        self.snooze.is_suppressed(now, false)
    }

    pub fn current_alarm_state(&self) -> AlarmState {
        self.player.state()
    }

    pub fn escalation(&self) -> &EscalationController {
        &self.escalation
    }

    pub fn shutdown(&mut self) {
        self.player.shutdown();
    }

    fn start_alarm(&mut self, kind: AlertKind, value_mmol: f64, urgent: bool, now: NaiveDateTime) {
        if self.player.trigger(kind) {
            self.audit.record(&AuditEvent::AlarmStarted {
                at: now,
                kind,
                value_mmol,
                urgent,
            });
        }
    }

    fn clear_alarm(&mut self, now: NaiveDateTime) {
        if self.player.clear() {
            self.audit.record(&AuditEvent::AlarmCleared { at: now });
        }
    }

    /// Notify every enabled contact that opted into `kind`, subject to rate limiting.
    fn escalate(&mut self, kind: AlertKind, now: NaiveDateTime) -> usize {
        let mut sent = 0;
        for contact in &self.settings.emergency_contacts {
            let Some((message, snooze_minutes)) = contact.escalation_for(kind) else {
                continue;
            };
            let key = contact.key();
            if !self.escalation.should_escalate(&key, kind, now) {
                log::debug!(
                    "Message to {} snoozed until {:?}",
                    contact.name,
                    self.escalation.suppressed_until(&key, kind)
                );
                continue;
            }

            log::warn!("Sending {} alert message to {}", kind, contact.name);
            match self.notifier.notify(contact, message) {
                Ok(()) => {
                    self.escalation.record_sent(&key, kind, now, snooze_minutes);
                    self.audit.record(&AuditEvent::EscalationSent {
                        at: now,
                        contact: contact.name.clone(),
                        kind,
                    });
                    sent += 1;
                }
                Err(e) => {
                    // Not recorded as sent: retried on the next alarming tick
                    log::error!("Failed to notify {}: {}", contact.name, e);
                    self.audit.record(&AuditEvent::EscalationFailed {
                        at: now,
                        contact: contact.name.clone(),
                        kind,
                        error: e.to_string(),
                    });
                }
            }
        }
        sent
    }
}
