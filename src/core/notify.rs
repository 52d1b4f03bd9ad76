// Outbound notification transports used for escalation.

use std::process::Command;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::alerts::model::{normalize_phone, EmergencyContact};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Failed { program: String, status: String },
}

/// Delivers a message to a contact. `Ok` means the transport accepted it.
pub trait Notifier: Send {
    fn notify(&self, contact: &EmergencyContact, message: &str) -> Result<(), NotifyError>;
}

/// Which notifier to build from settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifierConfig {
    /// Only log the message
    #[default]
    Log,
    /// Run an external program. `{phone}` and `{message}` in `args` are substituted.
    Command { program: String, args: Vec<String> },
}

impl NotifierConfig {
    pub fn build(&self) -> Box<dyn Notifier> {
        match self {
            Self::Log => Box::new(LogNotifier),
            Self::Command { program, args } => Box::new(CommandNotifier::new(program.clone(), args.clone())),
        }
    }
}

#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, contact: &EmergencyContact, message: &str) -> Result<(), NotifyError> {
        log::warn!("Notify {} <{}>: {}", contact.name, contact.phone, message);
        Ok(())
    }
}

/// Sends through an external command, e.g. an `osascript` Messages script or an SMS CLI.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
}

impl CommandNotifier {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn render_args(&self, phone: &str, message: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace("{phone}", phone).replace("{message}", message))
            .collect()
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, contact: &EmergencyContact, message: &str) -> Result<(), NotifyError> {
        let phone = normalize_phone(&contact.phone);
        let output = Command::new(&self.program)
            .args(self.render_args(&phone, message))
            .output()
            .map_err(|source| NotifyError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(NotifyError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
            });
        }
        log::info!("Message sent to {}", contact.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_args_substitutes_placeholders() {
        let notifier = CommandNotifier::new(
            "osascript",
            vec!["-e".to_string(), "send \"{message}\" to buddy \"{phone}\"".to_string()],
        );
        let args = notifier.render_args("5550100", "LOW!");
        assert_eq!(args[1], "send \"LOW!\" to buddy \"5550100\"");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_exit_status_decides_success() {
        let contact = EmergencyContact::new("Sam", "555 0100");
        assert!(CommandNotifier::new("true", vec![]).notify(&contact, "hi").is_ok());
        assert!(matches!(
            CommandNotifier::new("false", vec![]).notify(&contact, "hi"),
            Err(NotifyError::Failed { .. })
        ));
        assert!(matches!(
            CommandNotifier::new("/nonexistent/notifier", vec![]).notify(&contact, "hi"),
            Err(NotifyError::Launch { .. })
        ));
    }

    #[test]
    fn test_config_json_shapes() {
        let config: NotifierConfig =
            serde_json::from_str(r#"{"type": "command", "program": "sms", "args": ["{phone}", "{message}"]}"#)
                .unwrap();
        assert!(matches!(config, NotifierConfig::Command { .. }));
        let log: NotifierConfig = serde_json::from_str(r#"{"type": "log"}"#).unwrap();
        assert_eq!(log, NotifierConfig::Log);
    }
}
