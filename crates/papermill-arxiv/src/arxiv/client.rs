use super::types::PaperCard;
use anyhow::{anyhow, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_BASE: &str = "https://export.arxiv.org/api/query";

#[derive(Clone)]
pub struct ArxivClient {
    http: Client,
    base: String,
}

impl ArxivClient {
    /// `timeout` of `None` leaves requests unbounded.
    pub fn new(base: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().user_agent(concat!("papermill-arxiv/", env!("CARGO_PKG_VERSION")));
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self { http: builder.build()?, base: base.to_string() })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn build_query(q: &str) -> String {
        let q = q.trim();
        if q.is_empty() { "all:*".into() } else { q.to_string() }
    }

    /// Relevance-ranked search, at most `max_results` entries.
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<PaperCard>> {
        use reqwest::header::{ACCEPT, CONTENT_TYPE};
        let search_query = Self::build_query(query);
        let max_results = max_results.max(1);
        let resp = self.http
            .get(&self.base)
            .query(&[("search_query", search_query.as_str())])
            .query(&[("start", 0usize), ("max_results", max_results)])
            .query(&[("sortBy", "relevance"), ("sortOrder", "descending")])
            .header(ACCEPT, "application/atom+xml, application/xml;q=0.9, text/xml;q=0.8")
            .send().await?;
        let status = resp.status();
        let ctype: String = resp.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(|s| s.to_string()).unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!("arXiv API error: HTTP {}", status));
        }
        if !(ctype.contains("xml") || ctype.contains("atom")) {
            let snip = resp.text().await.unwrap_or_default();
            let preview: String = snip.trim().chars().take(200).collect();
            return Err(anyhow!("arXiv API unexpected content-type: {} body: {}", ctype, preview));
        }
        let text = resp.text().await?;
        let mut cards = parse_atom_feed(&text)?;
        cards.truncate(max_results);
        tracing::debug!(query = %search_query, returned = cards.len(), "arxiv search");
        Ok(cards)
    }
}

fn local_name(raw: &[u8]) -> &[u8] {
    match raw.iter().position(|b| *b == b':') {
        Some(ix) => &raw[ix + 1..],
        None => raw,
    }
}

pub(crate) fn parse_atom_feed(xml: &str) -> Result<Vec<PaperCard>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut out: Vec<PaperCard> = vec![];

    let mut in_entry = false;
    let mut cur = PaperCard::default();
    let mut text_target: Option<&'static str> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name_buf: Vec<u8> = e.name().as_ref().to_vec();
                match local_name(&name_buf) {
                    b"entry" => {
                        in_entry = true;
                        cur = PaperCard::default();
                        text_target = None;
                    }
                    b"id" if in_entry => text_target = Some("id"),
                    b"title" if in_entry => text_target = Some("title"),
                    b"summary" if in_entry => text_target = Some("summary"),
                    b"name" if in_entry => text_target = Some("author"),
                    b"link" if in_entry => read_link(&e, &mut cur),
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) if in_entry => {
                let name_buf: Vec<u8> = e.name().as_ref().to_vec();
                if local_name(&name_buf) == b"link" {
                    read_link(&e, &mut cur);
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(tag) = text_target.take() {
                    let txt = t.unescape().map(|s| s.to_string()).unwrap_or_default();
                    match tag {
                        "id" => cur.entry_id = txt,
                        "title" => cur.title = txt,
                        "summary" => cur.summary = Some(txt),
                        "author" => cur.authors.push(txt),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                let end_name_buf: Vec<u8> = e.name().as_ref().to_vec();
                if local_name(&end_name_buf) == b"entry" && in_entry {
                    in_entry = false;
                    out.push(std::mem::take(&mut cur));
                }
                text_target = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("XML parse error: {}", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn read_link(e: &quick_xml::events::BytesStart<'_>, card: &mut PaperCard) {
    if card.html_url.is_some() {
        return;
    }
    let mut rel: Option<String> = None;
    let mut href: Option<String> = None;
    for a in e.attributes().flatten() {
        let v = String::from_utf8_lossy(&a.value).to_string();
        match a.key.as_ref() {
            b"rel" => rel = Some(v),
            b"href" => href = Some(v),
            _ => {}
        }
    }
    if rel.as_deref() == Some("alternate") {
        card.html_url = href;
    }
}
