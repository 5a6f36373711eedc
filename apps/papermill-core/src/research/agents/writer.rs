use crate::genai::TextGenerator;
use crate::runlog::RunLog;
use std::sync::Arc;

const ABSTRACT_CHARS: usize = 800;
const INTRO_CHARS: usize = 1500;

const METHODS: &str = "Methods:\nThis is a simulated demo. Methods would include literature review and synthesis.";
const RESULTS: &str = "Results:\nThis run produces a synthetic paper draft based on retrieved abstracts.";
const DISCUSSION: &str = "Discussion:\nInterpretation of results and limitations.";
const CONCLUSION: &str = "Conclusion:\nSummary and future work.";
const REFERENCES: &str = "References:\n(See arXiv links in context.)";

/// Draft generation capability, chosen once from configuration.
#[derive(Clone)]
pub enum DraftWriter {
    /// Hosted generation; falls back to the template when the call fails.
    Delegated(Arc<dyn TextGenerator>),
    Templated,
}

impl std::fmt::Debug for DraftWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DraftWriter::Delegated(_) => f.write_str("DraftWriter::Delegated"),
            DraftWriter::Templated => f.write_str("DraftWriter::Templated"),
        }
    }
}

impl DraftWriter {
    pub fn name(&self) -> &'static str {
        match self {
            DraftWriter::Delegated(_) => "delegated",
            DraftWriter::Templated => "template",
        }
    }

    /// Always produces a draft.
    pub async fn run(&self, title: &str, context: &str, log: &RunLog) -> String {
        log.info(format!("WriterAgent generating draft for: {}", title));
        if let DraftWriter::Delegated(generator) = self {
            match generator.complete(&build_prompt(title, context)).await {
                Ok(text) if !text.trim().is_empty() => return text,
                Ok(_) => log.warn("GenAI write returned no text, falling back to template"),
                Err(e) => log.warn(format!("GenAI write failed, falling back to template: {:#}", e)),
            }
        }
        template_draft(title, context)
    }
}

pub fn build_prompt(title: &str, context: &str) -> String {
    format!(
        "Write a detailed academic paper in IMRaD format for the title: '{}'. Include Abstract, Introduction, Methods, Results, Discussion, Conclusion, and References. Use the following research context:\n{}",
        title, context
    )
}

fn head(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// Seven-section document built from the compacted context.
pub fn template_draft(title: &str, context: &str) -> String {
    let abstract_text = match head(context, ABSTRACT_CHARS).trim() {
        "" => format!("This paper discusses {}", title),
        s => s.to_string(),
    };
    let intro = format!(
        "Introduction:\nThis paper addresses {}. Context and related work: {}",
        title,
        head(context, INTRO_CHARS)
    );
    [
        format!("Abstract:\n{}", abstract_text),
        intro,
        METHODS.to_string(),
        RESULTS.to_string(),
        DISCUSSION.to_string(),
        CONCLUSION.to_string(),
        REFERENCES.to_string(),
    ]
    .join("\n\n")
}
