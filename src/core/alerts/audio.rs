// Sound output backends for the alarm player.

use std::path::Path;

use super::player::{validate_sound_file, PlaybackError, SoundPlayer};

/// Logs instead of playing. Used when the crate is built without audio output.
#[derive(Debug, Default)]
pub struct LoggingSoundPlayer;

impl SoundPlayer for LoggingSoundPlayer {
    fn play(&self, sound: &Path) -> Result<(), PlaybackError> {
        validate_sound_file(sound)?;
        log::warn!("ALARM (audio disabled): {}", sound.display());
        Ok(())
    }
}

#[cfg(feature = "audio")]
pub use rodio_backend::RodioSoundPlayer;

#[cfg(feature = "audio")]
mod rodio_backend {
    use std::fs::File;
    use std::io::BufReader;
    use std::path::{Path, PathBuf};
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::thread;

    use super::super::player::{validate_sound_file, PlaybackError, SoundPlayer};

    /// Plays sounds through the default output device.
    ///
    /// A dedicated thread owns the output stream; `play` only queues the file, so it
    /// never blocks the alarm loop. Overlapping requests are mixed.
    pub struct RodioSoundPlayer {
        requests: Mutex<mpsc::Sender<PathBuf>>,
    }

    impl RodioSoundPlayer {
        pub fn new() -> Result<Self, PlaybackError> {
            let (tx, rx) = mpsc::channel::<PathBuf>();
            let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

            thread::Builder::new()
                .name("alarm-audio".to_string())
                .spawn(move || {
                    let stream = match rodio::OutputStreamBuilder::open_default_stream() {
                        Ok(stream) => {
                            let _ = ready_tx.send(Ok(()));
                            stream
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e.to_string()));
                            return;
                        }
                    };
                    log::info!("Audio system initialized successfully");

                    for path in rx {
                        let file = match File::open(&path) {
                            Ok(file) => file,
                            Err(e) => {
                                log::error!("Failed to open sound {}: {}", path.display(), e);
                                continue;
                            }
                        };
                        match rodio::play(stream.mixer(), BufReader::new(file)) {
                            Ok(sink) => {
                                log::debug!("Playing alert sound: {}", path.display());
                                sink.detach();
                            }
                            Err(e) => log::error!("Failed to play sound {}: {}", path.display(), e),
                        }
                    }
                })
                .map_err(|e| PlaybackError::DeviceUnavailable(e.to_string()))?;

            match ready_rx.recv() {
                Ok(Ok(())) => Ok(Self {
                    requests: Mutex::new(tx),
                }),
                Ok(Err(e)) => Err(PlaybackError::DeviceUnavailable(e)),
                Err(_) => Err(PlaybackError::DeviceUnavailable(
                    "audio thread exited during startup".to_string(),
                )),
            }
        }
    }

    impl SoundPlayer for RodioSoundPlayer {
        fn play(&self, sound: &Path) -> Result<(), PlaybackError> {
            validate_sound_file(sound)?;
            let requests = self
                .requests
                .lock()
                .map_err(|_| PlaybackError::DeviceUnavailable("audio queue poisoned".to_string()))?;
            requests
                .send(sound.to_path_buf())
                .map_err(|_| PlaybackError::DeviceUnavailable("audio thread has stopped".to_string()))
        }
    }
}
