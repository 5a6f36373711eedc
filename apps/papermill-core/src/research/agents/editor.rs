use crate::runlog::RunLog;

pub const SECTION_HEADERS: [&str; 7] =
    ["Abstract:", "Introduction:", "Methods:", "Results:", "Discussion:", "Conclusion:", "References:"];

/// Lightweight normalization. Missing headers are prepended in canonical
/// order (so later ones end up first); existing headers are neither moved
/// nor deduplicated.
pub fn edit(draft: &str) -> String {
    let mut text = draft.trim().to_string();
    for h in SECTION_HEADERS {
        if !text.contains(h) {
            text = format!("{}\n{}", h, text);
        }
    }
    let mut cleaned: Vec<&str> = vec![];
    let mut prev_blank = false;
    for line in split_lines(&text).map(trim_line_end) {
        if line.is_empty() {
            if !prev_blank {
                cleaned.push("");
            }
            prev_blank = true;
        } else {
            cleaned.push(line);
            prev_blank = false;
        }
    }
    cleaned.join("\n")
}

fn is_line_break(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}')
}

/// Splits on every line boundary, `\r\n` counting as one. A trailing
/// boundary does not yield an empty last line.
fn split_lines<'a>(text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        match rest.char_indices().find(|&(_, c)| is_line_break(c)) {
            Some((i, c)) => {
                let line = &rest[..i];
                let mut next = i + c.len_utf8();
                if c == '\r' && rest[next..].starts_with('\n') {
                    next += 1;
                }
                rest = &rest[next..];
                Some(line)
            }
            None => {
                let line = rest;
                rest = "";
                Some(line)
            }
        }
    })
}

fn trim_line_end(line: &str) -> &str {
    line.trim_end_matches(|c: char| c.is_whitespace() || c == '\x1f')
}

pub fn run(draft: &str, log: &RunLog) -> String {
    log.info("EditorAgent editing paper (lightweight edits)");
    edit(draft)
}
