use papermill_types::Paper;
use serde::{Deserialize, Serialize};

/// One Atom `<entry>`, reduced to what the pipeline keeps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PaperCard {
    pub entry_id: String,      // raw <id>, e.g. http://arxiv.org/abs/2501.01234v1
    pub title: String,
    pub authors: Vec<String>,
    pub summary: Option<String>,
    pub html_url: Option<String>, // rel="alternate" link
}

impl PaperCard {
    /// Flatten into the pipeline's paper record: authors comma-joined,
    /// newlines in the abstract replaced by spaces.
    pub fn into_paper(self) -> Paper {
        let title = self.title.split_whitespace().collect::<Vec<_>>().join(" ");
        let abstract_text = self.summary.unwrap_or_default().replace('\n', " ");
        let url = if self.entry_id.is_empty() {
            self.html_url.unwrap_or_default()
        } else {
            self.entry_id
        };
        Paper { title, authors: self.authors.join(", "), abstract_text, url }
    }
}
