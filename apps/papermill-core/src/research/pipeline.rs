use super::agents::{editor, plagiarism, researcher, writer::DraftWriter};
use super::agents::researcher::PaperSearch;
use super::pack::compact_context;
use super::types::{RunOutcome, RunRequest};
use crate::runlog::RunLog;
use crate::runs::CancelToken;
use crate::sessions::{SessionStore, StoreError};
use papermill_types::{excerpt, RunMetrics, SessionRecord, Stage, StepRecord, EXCERPT_CHARS};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("run cancelled during {} stage", .0.as_str())]
    Cancelled(Stage),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// search -> compact -> draft -> edit -> plagiarism, strictly in order.
pub struct Pipeline {
    search: Arc<dyn PaperSearch>,
    writer: DraftWriter,
    store: SessionStore,
    context_chars: usize,
}

fn finish_stage(stage: Stage, t0: Instant) -> f64 {
    let dt = t0.elapsed().as_secs_f64();
    papermill_telemetry::observe_stage(stage.as_str(), dt);
    dt
}

impl Pipeline {
    pub fn new(search: Arc<dyn PaperSearch>, writer: DraftWriter, store: SessionStore, context_chars: usize) -> Self {
        Self { search, writer, store, context_chars }
    }

    pub fn store(&self) -> &SessionStore { &self.store }

    pub fn writer(&self) -> &DraftWriter { &self.writer }

    fn cancelled(&self, stage: Stage, log: &RunLog) -> RunError {
        log.warn(format!("Run cancelled during {} stage; no session written", stage.as_str()));
        RunError::Cancelled(stage)
    }

    fn checkpoint(&self, cancel: &CancelToken, stage: Stage, log: &RunLog) -> Result<(), RunError> {
        if cancel.is_cancelled() { Err(self.cancelled(stage, log)) } else { Ok(()) }
    }

    /// One full pass. The prior record for this id, if any, is read and
    /// replaced by a fresh one; the only write happens at the end.
    pub async fn run(&self, req: &RunRequest, log: &RunLog, cancel: &CancelToken) -> Result<RunOutcome, RunError> {
        let started = Instant::now();
        let id = &req.session_id;
        log.info(format!("Starting workflow for '{}' (session {}, max_results={})", req.title, id, req.max_results));
        match self.store.load(id).await {
            Ok(Some(prev)) => log.info(format!("Replacing prior session record ({} steps)", prev.steps.len())),
            Ok(None) => {}
            Err(StoreError::Json { path, source }) => {
                log.warn(format!("Ignoring unreadable prior session {}: {}", path.display(), source))
            }
            Err(e) => return Err(e.into()),
        }
        let mut session = SessionRecord::new(&req.title);

        self.checkpoint(cancel, Stage::Research, log)?;
        let t0 = Instant::now();
        let papers = cancel
            .guard(researcher::run(self.search.as_ref(), &req.title, req.max_results, log))
            .await
            .ok_or_else(|| self.cancelled(Stage::Research, log))?;
        session.push_step(StepRecord::timed(Stage::Research, finish_stage(Stage::Research, t0)).with_count(papers.len()));

        self.checkpoint(cancel, Stage::Compact, log)?;
        let t0 = Instant::now();
        let context = compact_context(&req.title, &papers, self.context_chars);
        let context_chars = context.chars().count();
        log.info(format!("Compacted {} papers into {} chars of context", papers.len(), context_chars));
        session.push_step(StepRecord::timed(Stage::Compact, finish_stage(Stage::Compact, t0)).with_chars(context_chars));

        self.checkpoint(cancel, Stage::Draft, log)?;
        let t0 = Instant::now();
        let draft = cancel
            .guard(self.writer.run(&req.title, &context, log))
            .await
            .ok_or_else(|| self.cancelled(Stage::Draft, log))?;
        session.push_step(StepRecord::timed(Stage::Draft, finish_stage(Stage::Draft, t0)));

        self.checkpoint(cancel, Stage::Edit, log)?;
        let t0 = Instant::now();
        let edited = editor::run(&draft, log);
        session.push_step(StepRecord::timed(Stage::Edit, finish_stage(Stage::Edit, t0)));

        self.checkpoint(cancel, Stage::Plagiarism, log)?;
        let t0 = Instant::now();
        let abstracts: Vec<&str> = papers.iter().map(|p| p.abstract_text.as_str()).collect();
        let report = plagiarism::run(&edited, &abstracts, log);
        session.push_step(StepRecord::timed(Stage::Plagiarism, finish_stage(Stage::Plagiarism, t0)));

        // last chance to abort without leaving an artifact
        self.checkpoint(cancel, Stage::Plagiarism, log)?;
        let total_time = started.elapsed().as_secs_f64();
        let num_papers = papers.len();
        session.metrics = RunMetrics { total_time, num_papers };
        session.papers = papers;
        session.draft = excerpt(&draft, EXCERPT_CHARS);
        session.edited = excerpt(&edited, EXCERPT_CHARS);
        session.plagiarism = report.clone();
        self.store.save(id, &session).await?;
        log.info(format!("Saved session {}", id));
        log.info(format!("Workflow complete: total_time={:.2}s, num_papers={}", total_time, num_papers));

        Ok(RunOutcome { session_id: id.clone(), session, draft, edited, plagiarism: report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::agents::editor::SECTION_HEADERS;
    use crate::runs::RunsSupervisor;
    use crate::sessions::SessionId;
    use async_trait::async_trait;
    use papermill_types::Paper;

    struct Stub(Vec<Paper>);

    #[async_trait]
    impl PaperSearch for Stub {
        async fn search(&self, _q: &str, _n: usize) -> anyhow::Result<Vec<Paper>> {
            Ok(self.0.clone())
        }
    }

    struct Hang;

    #[async_trait]
    impl PaperSearch for Hang {
        async fn search(&self, _q: &str, _n: usize) -> anyhow::Result<Vec<Paper>> {
            std::future::pending().await
        }
    }

    fn setup(search: Arc<dyn PaperSearch>, dir: &tempfile::TempDir, id: &str) -> (Pipeline, RunLog, RunRequest) {
        let store = SessionStore::new(dir.path());
        let sid = SessionId::parse(id).unwrap();
        let log = RunLog::create(&store.log_path(&sid), sid.clone()).unwrap();
        let req = RunRequest { title: "Graph Neural Networks for Traffic Forecasting".into(), session_id: sid, max_results: 5 };
        (Pipeline::new(search, DraftWriter::Templated, store, 4000), log, req)
    }

    #[tokio::test]
    async fn empty_search_still_produces_a_full_record() {
        let dir = tempfile::tempdir().unwrap();
        let (p, log, req) = setup(Arc::new(Stub(vec![])), &dir, "empty");
        let out = p.run(&req, &log, &CancelToken::never()).await.unwrap();
        assert_eq!(out.session.metrics.num_papers, 0);
        assert_eq!(out.plagiarism.flags, Vec::<String>::new());
        assert_eq!(out.plagiarism.max_similarity, 0.0);
        for h in SECTION_HEADERS {
            assert!(out.session.draft.contains(h));
        }
        let steps: Vec<Stage> = out.session.steps.iter().map(|s| s.step).collect();
        assert_eq!(steps, vec![Stage::Research, Stage::Compact, Stage::Draft, Stage::Edit, Stage::Plagiarism]);
        assert_eq!(out.session.steps[0].count, Some(0));
        assert_eq!(out.session.steps[1].chars, Some(0));

        let saved = p.store().load(&req.session_id).await.unwrap().unwrap();
        assert_eq!(saved, out.session);
        let text = std::fs::read_to_string(p.store().log_path(&req.session_id)).unwrap();
        assert!(text.contains("Workflow complete: total_time="));
    }

    #[tokio::test]
    async fn prior_record_is_replaced_not_extended() {
        let dir = tempfile::tempdir().unwrap();
        let paper = Paper { title: "Traffic graphs".into(), authors: "A, B".into(), abstract_text: "Forecasting traffic with graph networks.".into(), url: "http://arxiv.org/abs/1".into() };
        let (p, log, req) = setup(Arc::new(Stub(vec![paper])), &dir, "again");
        p.run(&req, &log, &CancelToken::never()).await.unwrap();
        let second = p.run(&req, &log, &CancelToken::never()).await.unwrap();
        assert_eq!(second.session.steps.len(), 5);
        assert_eq!(second.session.papers.len(), 1);
        assert!(second.session.draft.contains("Forecasting traffic"));
    }

    #[tokio::test]
    async fn long_texts_are_excerpted_in_the_record_only() {
        let dir = tempfile::tempdir().unwrap();
        let papers: Vec<Paper> = (0..5)
            .map(|i| Paper { title: format!("Graph paper {i}"), authors: "X".into(), abstract_text: "graph ".repeat(150), url: format!("u{i}") })
            .collect();
        let (p, log, req) = setup(Arc::new(Stub(papers)), &dir, "long");
        let out = p.run(&req, &log, &CancelToken::never()).await.unwrap();
        assert!(out.draft.chars().count() > EXCERPT_CHARS);
        assert_eq!(out.session.draft.chars().count(), EXCERPT_CHARS);
        assert!(out.draft.starts_with(&out.session.draft));
    }

    #[tokio::test]
    async fn cancellation_interrupts_search_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (p, log, req) = setup(Arc::new(Hang), &dir, "stuck");
        let sup = RunsSupervisor::new();
        let token = sup.begin(&req.session_id).unwrap();
        let sid = req.session_id.clone();
        let sup2 = sup.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(30)).await;
            sup2.cancel(&sid);
        });
        let err = p.run(&req, &log, &token).await.unwrap_err();
        assert!(matches!(err, RunError::Cancelled(Stage::Research)));
        assert!(!p.store().exists(&req.session_id).await);
        let text = std::fs::read_to_string(p.store().log_path(&req.session_id)).unwrap();
        assert!(text.contains("WARN Run cancelled during research stage"));
    }
}
