//! Per-run log sink and the tailer that feeds `/stream/:id`.

use crate::sessions::SessionId;
use std::fs::{File, OpenOptions};
use std::io::{SeekFrom, Write as _};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::Level;

/// Append-only `<timestamp> <LEVEL> <message>` file owned by one run. Every
/// line is mirrored to `tracing` with the session id attached. The file is
/// closed when the value is dropped.
pub struct RunLog {
    session_id: SessionId,
    file: File,
}

impl RunLog {
    pub fn create(path: &Path, session_id: SessionId) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { session_id, file })
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        self.write(Level::INFO, msg.as_ref());
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        self.write(Level::WARN, msg.as_ref());
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        self.write(Level::ERROR, msg.as_ref());
    }

    fn write(&self, level: Level, msg: &str) {
        let sid = self.session_id.as_str();
        match level {
            Level::ERROR => tracing::error!(session_id = sid, "{}", msg),
            Level::WARN => tracing::warn!(session_id = sid, "{}", msg),
            _ => tracing::info!(session_id = sid, "{}", msg),
        }
        let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f");
        let line = format!("{} {} {}\n", ts, level, msg.replace(['\r', '\n'], " "));
        if let Err(e) = (&self.file).write_all(line.as_bytes()) {
            tracing::warn!(session_id = sid, error = %e, "run log write failed");
        }
    }
}

/// Incremental reader over a growing log file. Only complete lines are
/// returned; a trailing partial line waits for its newline.
pub struct LogTail {
    path: PathBuf,
    offset: u64,
    partial: Vec<u8>,
}

impl LogTail {
    pub fn new(path: PathBuf) -> Self {
        Self { path, offset: 0, partial: vec![] }
    }

    pub async fn read_new_lines(&mut self) -> std::io::Result<Vec<String>> {
        let mut f = match tokio::fs::File::open(&self.path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e),
        };
        f.seek(SeekFrom::Start(self.offset)).await?;
        let mut buf = Vec::new();
        f.read_to_end(&mut buf).await?;
        self.offset += buf.len() as u64;
        self.partial.extend_from_slice(&buf);
        let mut lines = vec![];
        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let line = self.partial.drain(..=pos).collect::<Vec<u8>>();
            lines.push(String::from_utf8_lossy(&line).trim_end_matches(['\r', '\n']).to_string());
        }
        Ok(lines)
    }

    /// Whatever is left after the last newline.
    pub fn take_partial(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.partial);
        Some(String::from_utf8_lossy(&rest).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_timestamp_level_message_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("x.log");
        {
            let log = RunLog::create(&path, SessionId::parse("x").unwrap()).unwrap();
            log.info("hello");
            log.warn("two\nlines");
        }
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" INFO hello"), "{}", lines[0]);
        assert!(lines[1].ends_with(" WARN two lines"), "{}", lines[1]);
        // "YYYY-MM-DD HH:MM:SS,mmm"
        assert_eq!(lines[0].split(' ').next().map(|d| d.len()), Some(10));
        assert_eq!(lines[0].split(' ').nth(1).map(|t| t.len()), Some(12));
    }

    #[test]
    fn reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        RunLog::create(&path, SessionId::parse("a").unwrap()).unwrap().info("first");
        RunLog::create(&path, SessionId::parse("a").unwrap()).unwrap().info("second");
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("first") && text.contains("second"));
    }

    #[tokio::test]
    async fn tail_returns_only_new_complete_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.log");
        let mut tail = LogTail::new(path.clone());
        assert!(tail.read_new_lines().await.unwrap().is_empty());

        std::fs::write(&path, "one\ntwo\nthr").unwrap();
        assert_eq!(tail.read_new_lines().await.unwrap(), vec!["one", "two"]);

        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"ee\nfour").unwrap();
        assert_eq!(tail.read_new_lines().await.unwrap(), vec!["three"]);
        assert!(tail.read_new_lines().await.unwrap().is_empty());
        assert_eq!(tail.take_partial().as_deref(), Some("four"));
        assert_eq!(tail.take_partial(), None);
    }
}
