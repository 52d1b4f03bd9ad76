use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Follows an append-only text file, returning only the lines added since the last read.
pub struct LogTailer {
    file: File,
    position: u64,
    path: PathBuf,
}

impl LogTailer {
    /// Open positioned at the end of the file; only later appends are returned.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let mut tailer = Self::open_from_start(path)?;
        tailer.position = tailer.file.metadata()?.len();
        Ok(tailer)
    }

    /// Open positioned at the start; the first read returns the whole file.
    pub fn open_from_start(path: impl AsRef<Path>) -> io::Result<Self> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref)?;
        Ok(Self {
            file,
            position: 0,
            path: path_ref.to_path_buf(),
        })
    }

    pub fn read_new_lines(&mut self) -> io::Result<Vec<String>> {
        let len = self.file.metadata()?.len();
        if len < self.position {
            log::warn!(
                "{} shrank from {} to {} bytes, reading from the start",
                self.path.display(),
                self.position,
                len
            );
            self.position = 0;
        }

        let mut lines = Vec::new();
        self.file.seek(SeekFrom::Start(self.position))?;
        let mut reader = BufReader::new(&self.file);
        let mut buffer = String::new();

        loop {
            buffer.clear();
            let bytes_read = reader.read_line(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            // Leave a partially written last line for the next read
            if !buffer.ends_with('\n') {
                break;
            }
            self.position += bytes_read as u64;
            let line = buffer.trim_end_matches(&['\r', '\n'][..]).to_string();
            lines.push(line);
        }

        Ok(lines)
    }

    pub fn rewind(&mut self) -> io::Result<()> {
        self.position = 0;
        self.file.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
