//! On-disk session artifacts: `<dir>/<id>.json` (the record, written once per
//! run) and `<dir>/<id>.log` (the run log).

use papermill_types::SessionRecord;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid session id: {0:?}")]
    InvalidId(String),
    #[error("session I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed session file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

const MAX_ID_LEN: usize = 128;
const DERIVED_ID_LEN: usize = 40;

fn allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// A run identifier that is safe to use as a file stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let ok = !raw.is_empty()
            && raw.len() <= MAX_ID_LEN
            && !raw.starts_with('.')
            && raw.chars().all(allowed);
        if ok { Ok(Self(raw.to_string())) } else { Err(StoreError::InvalidId(raw.to_string())) }
    }

    /// Title with spaces (and anything else unsafe) replaced by `_`, cut to
    /// 40 characters.
    pub fn from_title(title: &str) -> Self {
        let mut id: String = title
            .chars()
            .map(|c| if allowed(c) { c } else { '_' })
            .take(DERIVED_ID_LEN)
            .collect();
        if id.starts_with('.') {
            id.replace_range(..1, "_");
        }
        if id.is_empty() {
            id.push_str("session");
        }
        Self(id)
    }

    /// `job_<unix seconds>`.
    pub fn from_clock() -> Self {
        Self(format!("job_{}", chrono::Utc::now().timestamp()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn json_path(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    pub fn log_path(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{}.log", id))
    }

    pub async fn exists(&self, id: &SessionId) -> bool {
        tokio::fs::metadata(self.json_path(id)).await.is_ok()
    }

    pub async fn has_log(&self, id: &SessionId) -> bool {
        tokio::fs::metadata(self.log_path(id)).await.is_ok()
    }

    /// `Ok(None)` when no record has been written for `id` yet.
    pub async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        let path = self.json_path(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Json { path, source })
    }

    /// Whole-file overwrite through a temporary sibling and a rename, so
    /// readers see either the previous record or the new one.
    pub async fn save(&self, id: &SessionId, record: &SessionRecord) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::Io { path: self.dir.clone(), source })?;
        let path = self.json_path(id);
        let tmp = self.dir.join(format!(".{}.json.tmp", id));
        let bytes = serde_json::to_vec_pretty(record).map_err(|source| StoreError::Json { path: path.clone(), source })?;
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|source| StoreError::Io { path: tmp.clone(), source })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| StoreError::Io { path: path.clone(), source })?;
        tracing::info!(session_id = %id, path = %path.display(), "saved session");
        Ok(())
    }
}
