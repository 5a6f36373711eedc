use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    pub bind: Option<String>,
    /// Poll interval of the log stream, in milliseconds.
    #[serde(default)]
    pub stream_poll_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    pub sessions_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchConfig {
    pub base_url: Option<String>,
    #[serde(default)]
    pub default_max_results: Option<usize>,
    /// Unset means no timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenerationBackend {
    /// Gemini when an API key is present, otherwise the template writer.
    #[default]
    Auto,
    Gemini,
    Template,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationConfig {
    #[serde(default)]
    pub backend: GenerationBackend,
    pub model: Option<String>,
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompactionConfig {
    pub max_chars: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub server: Option<ServerConfig>,
    pub storage: Option<StorageConfig>,
    pub search: Option<SearchConfig>,
    pub generation: Option<GenerationConfig>,
    pub compaction: Option<CompactionConfig>,
}

pub const DEFAULT_MAX_RESULTS: usize = 5;
pub const MAX_RESULTS_CAP: usize = 50;
pub const DEFAULT_CONTEXT_CHARS: usize = 4000;
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";
pub const DEFAULT_GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

impl Config {
    /// Reads `PAPERMILL_CONFIG` (default `config/papermill.toml`). A missing
    /// file yields defaults; a malformed one is an error.
    pub fn load() -> anyhow::Result<(Self, PathBuf)> {
        let cfg_path = env::var("PAPERMILL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/papermill.toml"));
        let mut cfg: Config = match fs::read_to_string(&cfg_path) {
            Ok(text) => toml::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(e.into()),
        };

        if let Ok(bind) = env::var("PAPERMILL_BIND") {
            cfg.server.get_or_insert_with(Default::default).bind = Some(bind);
        } else if let Ok(port) = env::var("PORT") {
            cfg.server.get_or_insert_with(Default::default).bind = Some(format!("0.0.0.0:{}", port));
        }
        if let Ok(dir) = env::var("PAPERMILL_SESSIONS_DIR") {
            cfg.storage.get_or_insert_with(Default::default).sessions_dir = Some(dir);
        }

        Ok((cfg, cfg_path))
    }

    pub fn bind_addr(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.bind.clone())
            .unwrap_or_else(|| "127.0.0.1:5000".to_string())
    }

    pub fn stream_poll(&self) -> Duration {
        let ms = self.server.as_ref().and_then(|s| s.stream_poll_ms).unwrap_or(500);
        Duration::from_millis(ms.max(10))
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.storage
            .as_ref()
            .and_then(|s| s.sessions_dir.as_ref())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("sessions"))
    }

    pub fn search_base(&self) -> String {
        self.search
            .as_ref()
            .and_then(|s| s.base_url.clone())
            .unwrap_or_else(|| papermill_arxiv::DEFAULT_BASE.to_string())
    }

    pub fn search_timeout(&self) -> Option<Duration> {
        self.search.as_ref().and_then(|s| s.timeout_secs).map(Duration::from_secs)
    }

    pub fn default_max_results(&self) -> usize {
        self.search
            .as_ref()
            .and_then(|s| s.default_max_results)
            .map(clamp_max_results)
            .unwrap_or(DEFAULT_MAX_RESULTS)
    }

    pub fn context_chars(&self) -> usize {
        self.compaction.as_ref().and_then(|c| c.max_chars).unwrap_or(DEFAULT_CONTEXT_CHARS)
    }

    pub fn generation(&self) -> GenerationConfig {
        self.generation.clone().unwrap_or_default()
    }
}

pub fn clamp_max_results(n: usize) -> usize {
    n.clamp(1, MAX_RESULTS_CAP)
}

/// API key for the hosted generation backend, if any.
pub fn generation_api_key() -> Option<String> {
    env::var("GEMINI_API_KEY")
        .or_else(|_| env::var("GOOGLE_API_KEY"))
        .ok()
        .filter(|k| !k.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let cfg = Config::default();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:5000");
        assert_eq!(cfg.sessions_dir(), PathBuf::from("sessions"));
        assert_eq!(cfg.default_max_results(), 5);
        assert_eq!(cfg.context_chars(), 4000);
        assert_eq!(cfg.generation().backend, GenerationBackend::Auto);
        assert!(cfg.search_timeout().is_none());
        assert_eq!(cfg.stream_poll(), Duration::from_millis(500));
    }

    #[test]
    fn parses_toml_sections() {
        let text = r#"
[server]
bind = "0.0.0.0:8080"
stream_poll_ms = 100

[storage]
sessions_dir = "/tmp/runs"

[search]
default_max_results = 500
timeout_secs = 20

[generation]
backend = "template"

[compaction]
max_chars = 1000
"#;
        let cfg: Config = toml::from_str(text).unwrap();
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8080");
        assert_eq!(cfg.sessions_dir(), PathBuf::from("/tmp/runs"));
        assert_eq!(cfg.default_max_results(), MAX_RESULTS_CAP);
        assert_eq!(cfg.search_timeout(), Some(Duration::from_secs(20)));
        assert_eq!(cfg.generation().backend, GenerationBackend::Template);
        assert_eq!(cfg.context_chars(), 1000);
        assert_eq!(cfg.stream_poll(), Duration::from_millis(100));
    }

    #[test]
    fn clamps_result_counts() {
        assert_eq!(clamp_max_results(0), 1);
        assert_eq!(clamp_max_results(7), 7);
        assert_eq!(clamp_max_results(1000), 50);
    }

    #[test]
    fn shipped_sample_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/papermill.toml");
        let cfg: Config = toml::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        let d = Config::default();
        assert_eq!(cfg.bind_addr(), d.bind_addr());
        assert_eq!(cfg.sessions_dir(), d.sessions_dir());
        assert_eq!(cfg.search_base(), d.search_base());
        assert_eq!(cfg.default_max_results(), d.default_max_results());
        assert_eq!(cfg.context_chars(), d.context_chars());
        assert_eq!(cfg.stream_poll(), d.stream_poll());
        assert_eq!(cfg.generation().model.as_deref(), Some(DEFAULT_GEMINI_MODEL));
        assert_eq!(cfg.generation().base_url.as_deref(), Some(DEFAULT_GEMINI_BASE));
    }
}
