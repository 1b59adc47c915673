use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use procura_ai::{AiError, Prompt, TextGenerator};

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Text generation through a local Ollama server (`POST {base}/api/generate`).
#[derive(Debug, Clone)]
pub struct OllamaTextGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaTextGenerator {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AiError::Internal(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl TextGenerator for OllamaTextGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<String, AiError> {
        let request = OllamaRequest {
            model: &self.model,
            prompt: prompt.render(),
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Timeout
                } else {
                    AiError::Unavailable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(AiError::Unavailable(format!("HTTP {}", response.status())));
        }

        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| AiError::InferenceFailed(format!("invalid response: {e}")))?;

        let text = body.response.trim();
        if text.is_empty() {
            return Err(AiError::InferenceFailed("empty response".to_string()));
        }
        Ok(text.to_string())
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}
