use crate::config::{generation_api_key, Config, GenerationBackend, DEFAULT_GEMINI_BASE, DEFAULT_GEMINI_MODEL};
use crate::genai::GeminiClient;
use crate::pages::Pages;
use crate::research::agents::researcher::PaperSearch;
use crate::research::agents::writer::DraftWriter;
use crate::research::Pipeline;
use crate::runs::RunsSupervisor;
use crate::sessions::SessionStore;
use papermill_arxiv::ArxivClient;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub version: &'static str,
    pub config: Arc<RwLock<Config>>,
    pub store: SessionStore,
    pub pipeline: Arc<Pipeline>,
    pub runs: RunsSupervisor,
    pub pages: Arc<Pages>,
}

pub type SharedState = Arc<AppState>;

/// Picks the draft writer once, from configuration and the environment.
pub fn select_writer(config: &Config) -> anyhow::Result<DraftWriter> {
    let gen_cfg = config.generation();
    let key = generation_api_key();
    let use_gemini = match (gen_cfg.backend, key.is_some()) {
        (GenerationBackend::Template, _) => false,
        (GenerationBackend::Auto, has_key) => has_key,
        (GenerationBackend::Gemini, true) => true,
        (GenerationBackend::Gemini, false) => {
            tracing::warn!("generation backend 'gemini' configured without GEMINI_API_KEY/GOOGLE_API_KEY; using template writer");
            false
        }
    };
    match key {
        Some(key) if use_gemini => {
            let client = GeminiClient::new(
                gen_cfg.base_url.as_deref().unwrap_or(DEFAULT_GEMINI_BASE),
                gen_cfg.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL),
                key,
                gen_cfg.timeout_secs.map(Duration::from_secs),
            )?;
            tracing::info!(model = client.model(), "draft writer: gemini");
            Ok(DraftWriter::Delegated(Arc::new(client)))
        }
        _ => {
            tracing::info!("draft writer: template");
            Ok(DraftWriter::Templated)
        }
    }
}

/// Pipeline wired to arXiv and the configured writer.
pub fn build_pipeline(config: &Config) -> anyhow::Result<Pipeline> {
    let arxiv = ArxivClient::new(&config.search_base(), config.search_timeout())?;
    tracing::info!(base = arxiv.base(), "paper search: arxiv");
    let search: Arc<dyn PaperSearch> = Arc::new(arxiv);
    let writer = select_writer(config)?;
    let store = SessionStore::new(config.sessions_dir());
    Ok(Pipeline::new(search, writer, store, config.context_chars()))
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<SharedState> {
        let pipeline = build_pipeline(&config)?;
        Self::with_pipeline(config, pipeline)
    }

    /// State around an already assembled pipeline; its store is the one the
    /// HTTP layer reads from.
    pub fn with_pipeline(config: Config, pipeline: Pipeline) -> anyhow::Result<SharedState> {
        let pages = Pages::new()?;
        tracing::info!(sessions_dir = %pipeline.store().dir().display(), writer = pipeline.writer().name(), "app state ready");
        Ok(Arc::new(AppState {
            version: env!("CARGO_PKG_VERSION"),
            config: Arc::new(RwLock::new(config)),
            store: pipeline.store().clone(),
            pipeline: Arc::new(pipeline),
            runs: RunsSupervisor::new(),
            pages: Arc::new(pages),
        }))
    }
}
