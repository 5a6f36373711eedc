//! Hosted text generation used by the delegated draft writer.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::time::Duration;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Single completion for `prompt`. An empty completion is an error.
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Google Generative Language `generateContent` client.
#[derive(Clone)]
pub struct GeminiClient {
    http: HttpClient,
    base: String,
    model: String,
    key: String,
}

impl GeminiClient {
    pub fn new(base: &str, model: &str, key: String, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = HttpClient::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            http: builder.build()?,
            base: base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base, self.model)
    }
}

#[derive(serde::Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(serde::Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(serde::Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(serde::Deserialize)]
struct GenerateResp {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

fn first_candidate_text(resp: GenerateResp) -> String {
    resp.candidates
        .into_iter()
        .next()
        .map(|c| c.content.parts.into_iter().filter_map(|p| p.text).collect::<String>())
        .unwrap_or_default()
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let body = serde_json::json!({"contents": [{"parts": [{"text": prompt}]}]});
        let resp = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.key.as_str())])
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let txt = resp.text().await.unwrap_or_default();
            let snip: String = txt.chars().take(400).collect();
            anyhow::bail!("gemini http {}: {}", status, snip);
        }
        let text = first_candidate_text(resp.json().await?);
        if text.trim().is_empty() {
            anyhow::bail!("gemini returned no text");
        }
        Ok(text)
    }
}
