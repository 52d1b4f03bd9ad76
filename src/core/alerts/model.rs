// Alarm and escalation model types.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::model::AlertKind;

/// The alarm currently playing. At most one non-`Normal` state is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmState {
    #[default]
    Normal,
    LowAlert,
    HighAlert,
}

impl AlarmState {
    pub fn is_alerting(&self) -> bool {
        *self != Self::Normal
    }

    pub fn alert_kind(&self) -> Option<AlertKind> {
        match self {
            Self::Normal => None,
            Self::LowAlert => Some(AlertKind::Low),
            Self::HighAlert => Some(AlertKind::High),
        }
    }
}

impl From<AlertKind> for AlarmState {
    fn from(kind: AlertKind) -> Self {
        match kind {
            AlertKind::Low => Self::LowAlert,
            AlertKind::High => Self::HighAlert,
        }
    }
}

/// Sound files played by the alarm loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmSounds {
    pub low: PathBuf,
    pub high: PathBuf,
}

impl AlarmSounds {
    pub fn for_kind(&self, kind: AlertKind) -> &Path {
        match kind {
            AlertKind::Low => &self.low,
            AlertKind::High => &self.high,
        }
    }
}

/// A person notified when an alarm fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    /// Phone number or messaging handle
    pub phone: String,
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub message_on_low: bool,
    /// Minutes before the low message may be re-sent
    #[serde(default = "default_low_snooze")]
    pub message_on_low_snooze: u32,
    #[serde(default = "default_low_message")]
    pub low_message_text: String,

    #[serde(default)]
    pub message_on_high: bool,
    /// Minutes before the high message may be re-sent
    #[serde(default = "default_high_snooze")]
    pub message_on_high_snooze: u32,
    #[serde(default = "default_high_message")]
    pub high_message_text: String,
}

fn default_true() -> bool {
    true
}

fn default_low_snooze() -> u32 {
    30
}

fn default_high_snooze() -> u32 {
    60
}

fn default_low_message() -> String {
    "⚠️ LOW glucose alert! Please check on me.".to_string()
}

fn default_high_message() -> String {
    "⚠️ HIGH glucose alert - prolonged high blood sugar.".to_string()
}

impl EmergencyContact {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            enabled: true,
            message_on_low: false,
            message_on_low_snooze: default_low_snooze(),
            low_message_text: default_low_message(),
            message_on_high: false,
            message_on_high_snooze: default_high_snooze(),
            high_message_text: default_high_message(),
        }
    }

    /// Identity used to key escalation rate limiting: the phone without spaces or dashes.
    pub fn key(&self) -> String {
        normalize_phone(&self.phone)
    }

    /// Message text and re-send window for `kind`, if this contact wants that alert.
    pub fn escalation_for(&self, kind: AlertKind) -> Option<(&str, u32)> {
        if !self.enabled {
            return None;
        }
        match kind {
            AlertKind::Low if self.message_on_low => {
                Some((self.low_message_text.as_str(), self.message_on_low_snooze))
            }
            AlertKind::High if self.message_on_high => {
                Some((self.high_message_text.as_str(), self.message_on_high_snooze))
            }
            _ => None,
        }
    }
}

pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| *c != ' ' && *c != '-').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alarm_state_kind_mapping() {
        assert_eq!(AlarmState::from(AlertKind::Low), AlarmState::LowAlert);
        assert_eq!(AlarmState::HighAlert.alert_kind(), Some(AlertKind::High));
        assert!(!AlarmState::Normal.is_alerting());
    }

    #[test]
    fn test_contact_escalation_respects_opt_in() {
        let mut contact = EmergencyContact::new("Mum", "+44 7700-900 123");
        contact.message_on_low = true;

        assert_eq!(contact.key(), "+447700900123");
        let (text, minutes) = contact.escalation_for(AlertKind::Low).unwrap();
        assert!(text.contains("LOW"));
        assert_eq!(minutes, 30);
        assert!(contact.escalation_for(AlertKind::High).is_none());

        contact.enabled = false;
        assert!(contact.escalation_for(AlertKind::Low).is_none());
    }

    #[test]
    fn test_contact_defaults_from_json() {
        let contact: EmergencyContact =
            serde_json::from_str(r#"{"name": "Sam", "phone": "555-0100", "message_on_high": true}"#).unwrap();
        assert!(contact.enabled);
        assert_eq!(contact.escalation_for(AlertKind::High).unwrap().1, 60);
    }
}
