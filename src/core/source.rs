// Reading sources. The evaluator only sees `Reading`s; where they come from is pluggable.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::log_io::LogTailer;
use super::model::Reading;
use super::parser;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open readings file {path}: {source}")]
    Open { path: String, source: io::Error },
    #[error("failed to read readings file {path}: {source}")]
    Read { path: String, source: io::Error },
}

/// Supplies the latest glucose reading. `Ok(None)` means nothing new is available.
pub trait ReadingSource: Send {
    fn get_reading(&mut self) -> Result<Option<Reading>, SourceError>;
}

/// Tails a `timestamp,mmol[,trend]` file and yields the newest appended reading.
///
/// The first successful read returns the last valid line already in the file, so a
/// restart picks up the current value without waiting for the next append.
pub struct TailingReadingSource {
    path: PathBuf,
    tailer: Option<LogTailer>,
}

impl TailingReadingSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tailer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tailer(&mut self) -> Result<&mut LogTailer, SourceError> {
        let tailer = match self.tailer.take() {
            Some(tailer) => tailer,
            None => {
                let tailer = LogTailer::open_from_start(&self.path).map_err(|source| SourceError::Open {
                    path: self.path.display().to_string(),
                    source,
                })?;
                log::info!("Reading glucose values from {}", self.path.display());
                tailer
            }
        };
        Ok(self.tailer.insert(tailer))
    }
}

impl ReadingSource for TailingReadingSource {
    fn get_reading(&mut self) -> Result<Option<Reading>, SourceError> {
        let lines = match self.tailer()?.read_new_lines() {
            Ok(lines) => lines,
            Err(source) => {
                // Reopen on the next poll in case the file was replaced
                self.tailer = None;
                return Err(SourceError::Read {
                    path: self.path.display().to_string(),
                    source,
                });
            }
        };

        let mut latest: Option<Reading> = None;
        for line in &lines {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match parser::parse_reading_line(trimmed) {
                Some(reading) => {
                    if latest.as_ref().map_or(true, |prev| reading.taken_at >= prev.taken_at) {
                        latest = Some(reading);
                    }
                }
                None => log::warn!("Skipping unparseable reading line: {:?}", trimmed),
            }
        }
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_first_read_returns_last_existing_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("readings.csv");
        std::fs::write(
            &path,
            "# timestamp,mmol,trend\n2025-01-06 07:00:00,5.0\n2025-01-06 07:05:00,5.6,FortyFiveUp\n",
        )
        .unwrap();

        let mut source = TailingReadingSource::new(&path);
        let reading = source.get_reading().unwrap().unwrap();
        assert_eq!(reading.value_mmol, 5.6);

        assert!(source.get_reading().unwrap().is_none());
    }

    #[test]
    fn test_appended_lines_and_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("readings.csv");
        std::fs::write(&path, "").unwrap();

        let mut source = TailingReadingSource::new(&path);
        assert!(source.get_reading().unwrap().is_none());

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "2025-01-06 07:10:00,4.1").unwrap();
        writeln!(file, "garbage").unwrap();
        assert_eq!(source.get_reading().unwrap().unwrap().value_mmol, 4.1);
    }

    #[test]
    fn test_out_of_order_lines_keep_newest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("readings.csv");
        std::fs::write(&path, "2025-01-06 07:10:00,4.1\n2025-01-06 07:05:00,9.9\n").unwrap();

        let mut source = TailingReadingSource::new(&path);
        assert_eq!(source.get_reading().unwrap().unwrap().value_mmol, 4.1);
    }

    #[test]
    fn test_missing_file_is_error_until_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("later.csv");
        let mut source = TailingReadingSource::new(&path);

        assert!(matches!(source.get_reading(), Err(SourceError::Open { .. })));

        std::fs::write(&path, "2025-01-06 07:10:00,7.7\n").unwrap();
        assert_eq!(source.get_reading().unwrap().unwrap().value_mmol, 7.7);
        assert_eq!(source.path(), path.as_path());
    }
}
