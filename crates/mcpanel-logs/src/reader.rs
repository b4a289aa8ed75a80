//! Tail reader for console and server logs

use mcpanel_core::Result;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

pub struct LogReader {
    path: PathBuf,
}

impl LogReader {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Last `n` lines, reading backwards from the end in chunks.
    ///
    /// A missing file reads as empty.
    pub fn tail(&self, n: usize) -> Result<Vec<String>> {
        if n == 0 || !self.path.exists() {
            return Ok(vec![]);
        }

        let mut file = File::open(&self.path)?;
        let file_size = file.metadata()?.len();
        if file_size == 0 {
            return Ok(vec![]);
        }

        let chunk_size = 8192u64;
        let mut position = file_size;
        let mut tail_bytes: Vec<u8> = Vec::new();

        // Stop once the buffer holds more than `n` line breaks
        while position > 0 && bytecount_newlines(&tail_bytes) <= n {
            let read_size = std::cmp::min(chunk_size, position);
            position -= read_size;
            file.seek(SeekFrom::Start(position))?;

            let mut chunk = vec![0u8; read_size as usize];
            file.read_exact(&mut chunk)?;
            chunk.extend_from_slice(&tail_bytes);
            tail_bytes = chunk;
        }

        let text = String::from_utf8_lossy(&tail_bytes);
        let lines: Vec<&str> = text.lines().collect();
        let skip = lines.len().saturating_sub(n);
        Ok(lines[skip..].iter().map(|l| l.to_string()).collect())
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> Result<u64> {
        if !self.path.exists() {
            return Ok(0);
        }
        Ok(std::fs::metadata(&self.path)?.len())
    }
}

fn bytecount_newlines(bytes: &[u8]) -> usize {
    bytes.iter().filter(|b| **b == b'\n').count()
}
