use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};

use super::message::GenerateRequest;
use super::prompts::NO_RESPONSE_FALLBACK;
use crate::config::Config;
use crate::error::{ChatError, Result};
use crate::stream::parser::candidate_text;

/// Raw response body, fragment by fragment
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// Source of streamed generations
#[async_trait]
pub trait Generator: Send + Sync {
    async fn open_stream(&self, request: &GenerateRequest) -> Result<ByteStream>;
}

/// Gemini generateContent client
pub struct GenerationClient {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GenerationClient {
    pub fn new(config: &Config, api_key: Option<String>) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
        }
    }

    fn url(&self, method: &str, api_key: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            self.endpoint, self.model, method, api_key
        )
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            ChatError::Auth(
                "Gemini API key not provided. Set it with `ragchat auth set-key` or configure GEMINI_API_KEY.".into(),
            )
        })
    }

    async fn post(&self, method: &str, request: &GenerateRequest) -> Result<reqwest::Response> {
        let url = self.url(method, self.api_key()?);
        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("Gemini API error: {} {}", status, body);
            return Err(ChatError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Single-shot generation; returns the first candidate's text
    pub async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let response = self.post("generateContent", request).await?;
        let json: serde_json::Value = response.json().await?;
        Ok(reply_text(&json))
    }
}

#[async_trait]
impl Generator for GenerationClient {
    async fn open_stream(&self, request: &GenerateRequest) -> Result<ByteStream> {
        let response = self.post("streamGenerateContent", request).await?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ChatError::from))
            .boxed())
    }
}

fn reply_text(json: &serde_json::Value) -> String {
    candidate_text(json)
        .filter(|t| !t.is_empty())
        .unwrap_or(NO_RESPONSE_FALLBACK)
        .to_string()
}
