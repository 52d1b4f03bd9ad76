// Alarm player: owns the repeating audio loop.
//
// The loop runs on its own thread and waits on a stop channel between plays, so a
// stop request is observed within one receive rather than after a full interval.
// Starting a new loop always waits for the previous one to acknowledge its stop.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;

use super::model::{AlarmSounds, AlarmState};
use crate::core::model::AlertKind;

/// Upper bound on waiting for a loop to acknowledge a stop request.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("alert sound file not found: {0}")]
    MissingFile(PathBuf),
    #[error("alert sound path is not a file: {0}")]
    NotAFile(PathBuf),
    #[error("audio output unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Starts playback of a sound file and returns without waiting for it to finish.
pub trait SoundPlayer: Send + Sync {
    fn play(&self, sound: &Path) -> Result<(), PlaybackError>;
}

/// Check that a sound path points at an existing file.
pub fn validate_sound_file(sound: &Path) -> Result<(), PlaybackError> {
    if !sound.exists() {
        return Err(PlaybackError::MissingFile(sound.to_path_buf()));
    }
    if !sound.is_file() {
        return Err(PlaybackError::NotAFile(sound.to_path_buf()));
    }
    Ok(())
}

struct AlarmLoop {
    kind: AlertKind,
    stop_tx: mpsc::Sender<()>,
    done_rx: mpsc::Receiver<()>,
    handle: thread::JoinHandle<()>,
}

impl AlarmLoop {
    fn spawn(
        kind: AlertKind,
        sound: PathBuf,
        interval: Duration,
        backend: Arc<dyn SoundPlayer>,
    ) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            log::info!("Starting {} alarm loop", kind);
            loop {
                // A broken sound must not stop the loop
                if let Err(e) = backend.play(&sound) {
                    log::error!("Failed to play {} alarm sound: {}", kind, e);
                }
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            log::info!("{} alarm loop stopped", kind);
            let _ = done_tx.send(());
        });

        Self {
            kind,
            stop_tx,
            done_rx,
            handle,
        }
    }

    /// Signal the loop and wait (bounded) for it to exit.
    fn stop(self) {
        let _ = self.stop_tx.send(());
        match self.done_rx.recv_timeout(STOP_TIMEOUT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    log::error!("{} alarm loop panicked", self.kind);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "{} alarm loop did not stop within {:?}, detaching",
                    self.kind,
                    STOP_TIMEOUT
                );
            }
        }
    }
}

/// Plays the low or high alarm on repeat until cleared.
pub struct AlarmPlayer {
    sounds: AlarmSounds,
    interval: Duration,
    backend: Arc<dyn SoundPlayer>,
    state: AlarmState,
    active: Option<AlarmLoop>,
}

impl AlarmPlayer {
    pub fn new(sounds: AlarmSounds, interval: Duration, backend: Arc<dyn SoundPlayer>) -> Self {
        Self {
            sounds,
            interval,
            backend,
            state: AlarmState::Normal,
            active: None,
        }
    }

    /// Change sounds and repeat interval. Applies from the next loop started.
    pub fn reconfigure(&mut self, sounds: AlarmSounds, interval: Duration) {
        self.sounds = sounds;
        self.interval = interval;
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn is_alerting(&self) -> bool {
        self.state.is_alerting()
    }

    pub fn trigger_low(&mut self) -> bool {
        self.trigger(AlertKind::Low)
    }

    pub fn trigger_high(&mut self) -> bool {
        self.trigger(AlertKind::High)
    }

    /// Start the alarm for `kind`, replacing any other alarm.
    ///
    /// Returns false (and leaves the running loop untouched) if that alarm is already
    /// playing, so repeated ticks keep the original cadence.
    pub fn trigger(&mut self, kind: AlertKind) -> bool {
        let requested = AlarmState::from(kind);
        if self.state == requested {
            log::debug!("{} alert already active", kind);
            return false;
        }

        match kind {
            AlertKind::Low => log::warn!("LOW GLUCOSE ALERT TRIGGERED"),
            AlertKind::High => log::warn!("HIGH GLUCOSE ALERT TRIGGERED"),
        }

        self.stop_active();
        self.active = Some(AlarmLoop::spawn(
            kind,
            self.sounds.for_kind(kind).to_path_buf(),
            self.interval,
            Arc::clone(&self.backend),
        ));
        self.state = requested;
        true
    }

    /// Stop the alarm. Returns false if nothing was playing.
    pub fn clear(&mut self) -> bool {
        if self.state == AlarmState::Normal {
            return false;
        }
        log::info!("Clearing {:?}", self.state);
        self.stop_active();
        self.state = AlarmState::Normal;
        true
    }

    pub fn shutdown(&mut self) {
        log::info!("Shutting down alarm player");
        self.clear();
    }

    fn stop_active(&mut self) {
        if let Some(active) = self.active.take() {
            active.stop();
        }
    }
}

impl Drop for AlarmPlayer {
    fn drop(&mut self) {
        self.stop_active();
    }
}
