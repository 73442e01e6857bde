use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{ChatError, Result};

/// Turns text into a fixed-length vector. One remote call per `embed`.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Gemini `embedContent` API
pub struct GeminiEmbedder {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GeminiEmbedder {
    pub fn new(endpoint: &str, model: &str, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
        }
    }

    fn url(&self, api_key: &str) -> String {
        format!(
            "{}/models/{}:embedContent?key={}",
            self.endpoint, self.model, api_key
        )
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ChatError::Auth("No Gemini API key configured for embeddings".into()))?;

        let response = self
            .client
            .post(self.url(api_key))
            .json(&serde_json::json!({
                "content": {
                    "parts": [{ "text": text }]
                }
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("Gemini embedding error: {} {}", status, body);
            return Err(ChatError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let result: serde_json::Value = response.json().await?;
        parse_gemini_embedding(&result)
    }
}

fn parse_gemini_embedding(result: &serde_json::Value) -> Result<Vec<f32>> {
    let values = result
        .get("embedding")
        .and_then(|e| e.get("values"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| ChatError::UpstreamMessage("Invalid Gemini embedding response".into()))?;

    values
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                ChatError::UpstreamMessage(format!("Non-numeric embedding value: {}", v))
            })
        })
        .collect()
}

/// A plain `{text} -> {embedding}` service, the shape the chat server exposes
/// to local clients so they never hold the credential themselves.
pub struct RemoteEmbedder {
    url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct RemoteEmbeddingResponse {
    embedding: Vec<f32>,
}

impl RemoteEmbedder {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("Embedding service error: {} {}", status, body);
            return Err(ChatError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let result: RemoteEmbeddingResponse = response.json().await?;
        Ok(result.embedding)
    }
}
