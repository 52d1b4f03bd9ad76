use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::alerts::engine::AlertSettings;
use super::notify::NotifierConfig;

/// Shortest allowed re-send window for a contact.
pub const MIN_CONTACT_SNOOZE_MINUTES: u32 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("failed to write config file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Validation(String),
}

/// Application settings, persisted as settings.json.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Append-only file of `timestamp,mmol[,trend]` lines
    pub readings_path: PathBuf,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Minutes to wait after startup before the first poll
    #[serde(default)]
    pub startup_delay_minutes: u64,
    /// Readings older than this are ignored. 0 disables the check.
    #[serde(default = "default_max_reading_age")]
    pub max_reading_age_minutes: u64,
    #[serde(default)]
    pub audit_path: Option<PathBuf>,
    #[serde(default)]
    pub alerts: AlertSettings,
}

fn default_poll_interval() -> u64 {
    300
}

fn default_max_reading_age() -> u64 {
    15
}

impl Default for Settings {
    fn default() -> Self {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());

        Self {
            readings_path: PathBuf::from(home).join(".bear-alarm").join("readings.csv"),
            poll_interval_secs: default_poll_interval(),
            startup_delay_minutes: 0,
            max_reading_age_minutes: default_max_reading_age(),
            audit_path: None,
            alerts: AlertSettings::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "poll_interval_secs must be greater than 0".to_string(),
            ));
        }
        validate_alerts(&self.alerts)
    }
}

pub fn validate_alerts(alerts: &AlertSettings) -> Result<(), ConfigError> {
    let low = alerts.thresholds.low_threshold();
    if alerts.urgent_low <= 0.0 || alerts.urgent_low >= low {
        return Err(ConfigError::Validation(format!(
            "urgent_low ({}) must be above 0 and below the low threshold ({})",
            alerts.urgent_low, low
        )));
    }
    if alerts.alert_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "alert_interval_secs must be greater than 0".to_string(),
        ));
    }

    for rule in &alerts.schedules {
        if rule.name.trim().is_empty() {
            return Err(ConfigError::Validation("schedule name cannot be empty".to_string()));
        }
        if rule.priority == 0 {
            return Err(ConfigError::Validation(format!(
                "schedule '{}': priority must be at least 1",
                rule.name
            )));
        }
        if let Some(day) = rule.days.iter().find(|day| **day > 6) {
            return Err(ConfigError::Validation(format!(
                "schedule '{}': day {} is out of range (0 = Monday .. 6 = Sunday)",
                rule.name, day
            )));
        }
        rule.apply_to(&alerts.thresholds)
            .map_err(|e| ConfigError::Validation(format!("schedule '{}': {}", rule.name, e)))?;
    }

    for contact in &alerts.emergency_contacts {
        let opted_in = contact.message_on_low || contact.message_on_high;
        if contact.enabled && opted_in && contact.phone.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "contact '{}' has messages enabled but no phone number",
                contact.name
            )));
        }
        for (label, minutes) in [
            ("message_on_low_snooze", contact.message_on_low_snooze),
            ("message_on_high_snooze", contact.message_on_high_snooze),
        ] {
            if minutes < MIN_CONTACT_SNOOZE_MINUTES {
                return Err(ConfigError::Validation(format!(
                    "contact '{}': {} must be at least {} minutes",
                    contact.name, label, MIN_CONTACT_SNOOZE_MINUTES
                )));
            }
        }
    }

    if let NotifierConfig::Command { program, .. } = &alerts.notifier {
        if program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "command notifier needs a program".to_string(),
            ));
        }
    }
    Ok(())
}

pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(app_config_dir: PathBuf) -> Self {
        Self {
            config_path: app_config_dir.join("settings.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Load and validate settings. A missing file yields the defaults.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            log::info!(
                "No settings at {}, using defaults",
                self.config_path.display()
            );
            return Ok(Settings::default());
        }

        let path = self.config_path.display().to_string();
        let content = fs::read_to_string(&self.config_path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let settings: Settings =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path, source })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        let write_error = |source| ConfigError::Write {
            path: self.config_path.display().to_string(),
            source,
        };
        settings.validate()?;
        // Ensure directory exists
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| write_error(std::io::Error::other(e)))?;
        fs::write(&self.config_path, content).map_err(write_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alerts::model::EmergencyContact;
    use crate::core::schedule::ScheduleRule;
    use chrono::NaiveTime;
    use tempfile::tempdir;

    fn night_rule() -> ScheduleRule {
        ScheduleRule::new(
            "Night",
            vec![0, 1, 2, 3, 4],
            NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());

        let default = manager.load().unwrap();
        assert_eq!(default.poll_interval_secs, 300);
        assert_eq!(default.max_reading_age_minutes, 15);

        let mut new_settings = Settings {
            readings_path: PathBuf::from("/tmp/readings.csv"),
            poll_interval_secs: 60,
            ..Settings::default()
        };
        new_settings.alerts.schedules.push(night_rule());
        new_settings
            .alerts
            .emergency_contacts
            .push(EmergencyContact::new("Mum", "555-0100"));

        manager.save(&new_settings).unwrap();
        let loaded = manager.load().unwrap();

        assert_eq!(loaded, new_settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());
        fs::write(
            manager.path(),
            r#"{
                "readings_path": "/data/cgm.csv",
                "alerts": {
                    "thresholds": {"low_threshold": 4.0, "high_threshold": 12.0, "low_persist_minutes": 10},
                    "schedules": [
                        {"name": "Sleep", "days": [5, 6], "start_time": "23:00", "end_time": "07:00", "high_threshold": 14.0}
                    ]
                }
            }"#,
        )
        .unwrap();

        let settings = manager.load().unwrap();
        assert_eq!(settings.readings_path, PathBuf::from("/data/cgm.csv"));
        assert_eq!(settings.alerts.thresholds.low_persist_minutes(), 10);
        assert_eq!(settings.alerts.thresholds.high_persist_minutes(), 0);
        assert_eq!(settings.alerts.urgent_low, 2.8);
        assert_eq!(settings.alerts.schedules[0].priority, 1);
        assert!(settings.alerts.schedules[0].enabled);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());
        fs::write(manager.path(), "{ not json").unwrap();
        assert!(matches!(manager.load(), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_invalid_thresholds_rejected_on_load() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());
        fs::write(
            manager.path(),
            r#"{"readings_path": "r.csv", "alerts": {"thresholds": {"low_threshold": 9.0, "high_threshold": 5.0}}}"#,
        )
        .unwrap();
        assert!(matches!(manager.load(), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_validation_rules() {
        let valid = Settings::default();
        assert!(valid.validate().is_ok());

        let mut settings = Settings::default();
        settings.alerts.urgent_low = 4.5;
        assert!(matches!(settings.validate(), Err(ConfigError::Validation(_))));

        let mut settings = Settings::default();
        settings.poll_interval_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        let mut rule = night_rule();
        rule.days.push(7);
        settings.alerts.schedules.push(rule);
        assert!(settings.validate().is_err());

        // Override that would put high below the default low
        let mut settings = Settings::default();
        let mut rule = night_rule();
        rule.high_threshold = Some(3.0);
        settings.alerts.schedules.push(rule);
        let err = settings.validate().unwrap_err().to_string();
        assert!(err.contains("Night"), "{}", err);

        let mut settings = Settings::default();
        let mut contact = EmergencyContact::new("Sam", "");
        contact.message_on_low = true;
        settings.alerts.emergency_contacts.push(contact);
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        let mut contact = EmergencyContact::new("Sam", "555");
        contact.message_on_high_snooze = 2;
        settings.alerts.emergency_contacts.push(contact);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_save_refuses_invalid_settings() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());
        let mut settings = Settings::default();
        settings.alerts.alert_interval_secs = 0;
        assert!(manager.save(&settings).is_err());
        assert!(!manager.path().exists());
    }
}
