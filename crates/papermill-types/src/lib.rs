//! Shared data model for pipeline runs and their persisted sessions.

use serde::{Deserialize, Serialize};

/// Number of characters of the draft/edited texts kept in a session record.
pub const EXCERPT_CHARS: usize = 2000;

/// A retrieved paper. `authors` is already comma-joined and `abstract_text`
/// holds no newlines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Paper {
    pub title: String,
    pub authors: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Research,
    Compact,
    Draft,
    Edit,
    Plagiarism,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Research => "research",
            Stage::Compact => "compact",
            Stage::Draft => "draft",
            Stage::Edit => "edit",
            Stage::Plagiarism => "plagiarism",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepRecord {
    pub step: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chars: Option<usize>,
    /// Wall-clock seconds.
    pub time: f64,
}

impl StepRecord {
    pub fn timed(step: Stage, time: f64) -> Self {
        Self { step, count: None, chars: None, time }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_chars(mut self, chars: usize) -> Self {
        self.chars = Some(chars);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RunMetrics {
    pub total_time: f64,
    pub num_papers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SimilarityReport {
    /// Percentage, rounded to two decimals.
    pub max_similarity: f64,
    /// Percentage, rounded to two decimals.
    pub avg_similarity: f64,
    #[serde(default)]
    pub flags: Vec<String>,
}

impl SimilarityReport {
    pub fn is_flagged(&self) -> bool {
        !self.flags.is_empty()
    }
}

/// The persisted record of one run. `draft` and `edited` are excerpts, see
/// [`EXCERPT_CHARS`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SessionRecord {
    pub title: String,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
    #[serde(default)]
    pub metrics: RunMetrics,
    #[serde(default)]
    pub papers: Vec<Paper>,
    #[serde(default)]
    pub draft: String,
    #[serde(default)]
    pub edited: String,
    #[serde(default)]
    pub plagiarism: SimilarityReport,
}

impl SessionRecord {
    pub fn new(title: &str) -> Self {
        Self { title: title.to_string(), ..Default::default() }
    }

    pub fn push_step(&mut self, step: StepRecord) {
        self.steps.push(step);
    }
}

/// First `max` characters of `s` (not bytes).
pub fn excerpt(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((ix, _)) => s[..ix].to_string(),
        None => s.to_string(),
    }
}
