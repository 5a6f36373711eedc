use crate::sessions::SessionId;
use papermill_types::{SessionRecord, SimilarityReport};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub title: String,
    pub session_id: SessionId,
    pub max_results: usize,
}

/// Everything a finished run produced. Unlike the persisted record, `draft`
/// and `edited` are the full texts.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub session_id: SessionId,
    pub session: SessionRecord,
    pub draft: String,
    pub edited: String,
    pub plagiarism: SimilarityReport,
}
