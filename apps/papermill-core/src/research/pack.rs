use papermill_types::Paper;
use std::collections::HashSet;

fn title_tokens(title: &str) -> HashSet<String> {
    title.split_whitespace().map(|t| t.to_lowercase()).collect()
}

/// Number of title tokens occurring as substrings of the paper's lowercased
/// title and abstract.
fn overlap_score(tokens: &HashSet<String>, paper: &Paper) -> usize {
    let text = format!("{} {}", paper.title, paper.abstract_text).to_lowercase();
    tokens.iter().filter(|t| text.contains(t.as_str())).count()
}

fn block(paper: &Paper) -> String {
    format!(
        "Title: {}\nAuthors: {}\nAbstract: {}\nURL: {}\n\n",
        paper.title, paper.authors, paper.abstract_text, paper.url
    )
}

/// Concatenate paper blocks, best title overlap first, until the next block
/// would push the blob past `max_chars` characters. Blocks are never cut;
/// the first block that does not fit ends the blob.
pub fn compact_context(title: &str, papers: &[Paper], max_chars: usize) -> String {
    let tokens = title_tokens(title);
    let mut ranked: Vec<(usize, &Paper)> = papers.iter().map(|p| (overlap_score(&tokens, p), p)).collect();
    // stable: equal scores keep search order
    ranked.sort_by(|a, b| b.0.cmp(&a.0));

    let mut out = String::new();
    let mut out_chars = 0usize;
    for (_, p) in ranked {
        let chunk = block(p);
        let chunk_chars = chunk.chars().count();
        if out_chars + chunk_chars > max_chars {
            break;
        }
        out.push_str(&chunk);
        out_chars += chunk_chars;
    }
    out
}
