//! Console writer with rotation

use mcpanel_core::Result;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::rotation::RotationConfig;

/// Append-only console log that rolls over by size
pub struct LogWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    config: RotationConfig,
    current_size: u64,
}

impl LogWriter {
    pub fn new(path: PathBuf, config: RotationConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let current_size = file.metadata()?.len();

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            config,
            current_size,
        })
    }

    /// Write terminal output as-is
    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        self.current_size += data.len() as u64;

        if self.current_size >= self.config.max_size_bytes {
            self.rotate()?;
        }

        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        debug!("Rotating console log: {}", self.path.display());
        self.writer.flush()?;

        // .3 -> .4, .2 -> .3, ...; renaming onto the last slot drops the oldest
        for i in (1..self.config.max_files).rev() {
            let old_path = rotated_path(&self.path, i);
            if old_path.exists() {
                fs::rename(&old_path, rotated_path(&self.path, i + 1))?;
            }
        }

        if self.config.max_files > 0 && self.path.exists() {
            fs::rename(&self.path, rotated_path(&self.path, 1))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;

        self.writer = BufWriter::new(file);
        self.current_size = 0;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current_size(&self) -> u64 {
        self.current_size
    }
}

fn rotated_path(base: &Path, index: usize) -> PathBuf {
    let name = base
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    base.with_file_name(format!("{}.{}", name, index))
}

/// Drain a blocking reader (the pty master) into the console log until EOF.
///
/// A pty master reports EIO once the last slave handle closes; that is
/// treated as end of stream.
pub fn spawn_console_capture<R>(mut source: R, mut writer: LogWriter) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; 4096];
        loop {
            match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if let Err(e) = writer.write_raw(&buf[..n]) {
                        warn!("Failed to write console output: {}", e);
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("Console capture ended: {}", e);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writer_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("console.log");

        let writer = LogWriter::new(path.clone(), RotationConfig::default()).unwrap();
        assert!(path.exists());
        assert_eq!(writer.current_size(), 0);
    }

    #[test]
    fn test_write_raw_keeps_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("console.log");

        let mut writer = LogWriter::new(path.clone(), RotationConfig::default()).unwrap();
        writer.write_raw(b"[12:00:00 INFO]: Done (3.2s)!\r\n").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "[12:00:00 INFO]: Done (3.2s)!\r\n");
    }

    #[test]
    fn test_rotation_keeps_bounded_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("console.log");

        let mut writer = LogWriter::new(path.clone(), RotationConfig::new(64, 2)).unwrap();
        for i in 0..20 {
            writer
                .write_raw(format!("line {} of console output\n", i).as_bytes())
                .unwrap();
        }

        assert!(path.exists());
        assert!(dir.path().join("console.log.1").exists());
        assert!(dir.path().join("console.log.2").exists());
        assert!(!dir.path().join("console.log.3").exists());
    }

    #[test]
    fn test_rotated_path() {
        let base = PathBuf::from("/var/log/server-1-console.log");
        assert_eq!(
            rotated_path(&base, 2),
            PathBuf::from("/var/log/server-1-console.log.2")
        );
    }

    #[tokio::test]
    async fn test_capture_drains_until_eof() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("console.log");
        let writer = LogWriter::new(path.clone(), RotationConfig::default()).unwrap();

        let source = std::io::Cursor::new(b"hello\nworld\n".to_vec());
        spawn_console_capture(source, writer).await.unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\nworld\n");
    }
}
