//! Gemini API client
//!
//! Thin wrapper over `generateContent`. Uses a long-lived reqwest::Client
//! for connection pooling. No request timeout is set: a stalled upstream
//! blocks the query that issued it.

use crate::error::AgentError;
use crate::extractor::TextGenerator;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    max_output_tokens: Option<u32>,
}

impl GeminiClient {
    pub fn new(api_key: String, model: &str) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/{}:generateContent", GEMINI_BASE_URL, model),
            max_output_tokens: None,
        })
    }

    /// Cap the response length. Unset leaves the model's own limit, which
    /// keeps long exchange listings from being cut mid-JSON.
    pub fn with_max_output_tokens(mut self, limit: Option<u32>) -> Self {
        self.max_output_tokens = limit;
        self
    }

    fn build_request(&self, prompt: &str) -> GeminiRequest {
        GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }

    /// Send a single-turn prompt and return the first candidate's text.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(AgentError::Config("GEMINI_API_KEY not configured".to_string()));
        }

        let request = self.build_request(prompt);

        info!("Calling Gemini API");

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                AgentError::Llm(format!("Gemini API request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini API error response: {}", error_text);
            return Err(AgentError::Llm(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let body = response.text().await?;
        let answer = extract_answer(&body)?;

        info!(chars = answer.len(), "Gemini response received");
        Ok(answer)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        GeminiClient::generate(self, prompt).await
    }
}

/// Pull `candidates[0].content.parts[0].text` out of a response body.
fn extract_answer(body: &str) -> Result<String> {
    let gemini_response: GeminiResponse = serde_json::from_str(body).map_err(|e| {
        error!("Failed to parse Gemini response: {}", e);
        AgentError::Llm(format!("Gemini parse error: {}", e))
    })?;

    let candidate = gemini_response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::Llm("No response from Gemini API".to_string()))?;

    candidate
        .content
        .and_then(|content| content.parts.into_iter().next())
        .map(|part| part.text)
        .ok_or_else(|| AgentError::Llm("Empty response from Gemini".to_string()))
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}
