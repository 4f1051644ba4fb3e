//! Ollama HTTP client for local LLM inference
//!
//! Talks to the three Ollama endpoints the assistant needs:
//!
//! - `GET  /api/tags` lists the pulled models
//! - `GET  /api/version` reports the server version (health output)
//! - `POST /api/chat` runs a non-streaming chat completion
//!
//! # Example
//!
//! ```no_run
//! use meetdesk::llm::{ChatMessage, LLMClient, LLMRequest, OllamaClient};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::with_timeout("http://localhost:11434", Duration::from_secs(30))?;
//!
//! if client.health_check().await? {
//!     let request = LLMRequest::new("gemma:2b", vec![ChatMessage::user("Hello")]);
//!     let response = client.chat(request).await?;
//!     println!("{}", response.content);
//! }
//! # Ok(())
//! # }
//! ```

use super::client::LLMClient;
use super::error::BackendError;
use super::types::{ChatMessage, LLMRequest, LLMResponse};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Default request timeout for Ollama API calls
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Ollama client for local LLM inference
///
/// Holds one pooled `reqwest::Client`; safe to share across tasks via `Arc`.
pub struct OllamaClient {
    /// Base URL without trailing slash (e.g. "http://localhost:11434")
    endpoint: String,

    /// Shared HTTP client with connection pooling
    http_client: Client,

    /// Request timeout duration
    timeout: Duration,
}

impl OllamaClient {
    /// Creates a client with the default 30 second timeout
    pub fn new(endpoint: impl Into<String>) -> Result<Self, BackendError> {
        Self::with_timeout(endpoint, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a client with a custom per-request timeout
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let http_client = Client::builder().timeout(timeout).build().map_err(|e| {
            BackendError::ConfigurationError {
                message: format!("Failed to build HTTP client: {}", e),
            }
        })?;

        let endpoint = endpoint.into().trim_end_matches('/').to_string();

        Ok(Self {
            endpoint,
            http_client,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Checks if the Ollama server is reachable
    ///
    /// Returns `Ok(false)` when the server is down or times out, and `Err`
    /// only for unexpected transport failures.
    pub async fn health_check(&self) -> Result<bool, BackendError> {
        let url = format!("{}/api/tags", self.endpoint);

        debug!("Checking Ollama health at {}", url);

        match self.http_client.get(&url).send().await {
            Ok(response) => {
                let is_healthy = response.status().is_success();
                if is_healthy {
                    info!("Ollama health check successful");
                } else {
                    warn!(
                        "Ollama health check failed with status: {}",
                        response.status()
                    );
                }
                Ok(is_healthy)
            }
            Err(e) => {
                if e.is_timeout() {
                    warn!("Ollama health check timed out");
                    Ok(false)
                } else if e.is_connect() {
                    warn!("Cannot connect to Ollama at {}", self.endpoint);
                    Ok(false)
                } else {
                    error!("Ollama health check error: {}", e);
                    Err(BackendError::NetworkError {
                        message: format!("Health check failed: {}", e),
                    })
                }
            }
        }
    }

    /// Returns the server version reported by `/api/version`
    pub async fn version(&self) -> Result<String, BackendError> {
        let url = format!("{}/api/version", self.endpoint);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(BackendError::ApiError {
                message: format!("version request returned HTTP {}", status),
                status_code: Some(status.as_u16()),
            });
        }

        let body: VersionResponse =
            response
                .json()
                .await
                .map_err(|e| BackendError::InvalidResponse {
                    message: format!("JSON parse error: {}", e),
                    raw_response: None,
                })?;

        Ok(body.version)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            error!("Ollama request timed out after {:?}", self.timeout);
            BackendError::timeout(self.timeout)
        } else if e.is_connect() {
            error!("Cannot connect to Ollama at {}", self.endpoint);
            BackendError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else {
            error!("Ollama request error: {}", e);
            BackendError::NetworkError {
                message: format!("Request failed: {}", e),
            }
        }
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        let url = format!("{}/api/chat", self.endpoint);

        let body = OllamaChatRequest {
            model: request.model.clone(),
            messages: request.messages,
            stream: false,
            options: request
                .temperature
                .map(|temperature| OllamaOptions { temperature }),
        };

        debug!(
            "Sending chat request to Ollama: model={}, messages={}",
            body.model,
            body.messages.len()
        );

        let start = Instant::now();

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            error!("Ollama API returned error status {}: {}", status, text);

            if status.as_u16() == 404 && text.contains("model") {
                return Err(BackendError::ModelNotFound {
                    model: request.model,
                });
            }

            return Err(BackendError::ApiError {
                message: format!("HTTP {}: {}", status, text),
                status_code: Some(status.as_u16()),
            });
        }

        let raw = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let parsed: OllamaChatResponse =
            serde_json::from_str(&raw).map_err(|e| {
                error!("Failed to parse Ollama response: {}", e);
                BackendError::InvalidResponse {
                    message: format!("JSON parse error: {}", e),
                    raw_response: Some(raw.chars().take(200).collect()),
                }
            })?;

        let content = parsed
            .message
            .map(|m| m.content)
            .ok_or_else(|| BackendError::InvalidResponse {
                message: "response has no message.content".to_string(),
                raw_response: Some(raw.chars().take(200).collect()),
            })?;

        let elapsed = start.elapsed();
        info!(
            "Ollama chat completed in {:.2}s (model={})",
            elapsed.as_secs_f64(),
            request.model
        );
        debug!(
            "Ollama stats: eval_tokens={}, total_duration={:?}",
            parsed.eval_count.unwrap_or(0),
            parsed.total_duration
        );

        Ok(LLMResponse::text(
            content,
            parsed.model.unwrap_or(request.model),
            elapsed,
        ))
    }

    async fn list_models(&self) -> Result<Vec<String>, BackendError> {
        let url = format!("{}/api/tags", self.endpoint);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(BackendError::ApiError {
                message: format!("model listing returned HTTP {}", status),
                status_code: Some(status.as_u16()),
            });
        }

        let tags: TagsResponse =
            response
                .json()
                .await
                .map_err(|e| BackendError::InvalidResponse {
                    message: format!("JSON parse error: {}", e),
                    raw_response: None,
                })?;

        let names: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
        debug!("Ollama serves {} model(s): {:?}", names.len(), names);
        Ok(names)
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn endpoint_info(&self) -> Option<String> {
        Some(self.endpoint.clone())
    }
}

impl fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OllamaClient")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Request body for `/api/chat`
#[derive(Debug, Clone, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Clone, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Response body for a non-streaming `/api/chat` call
#[derive(Debug, Clone, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    model: Option<String>,

    #[serde(default)]
    message: Option<OllamaResponseMessage>,

    /// Total duration in nanoseconds
    #[serde(default)]
    total_duration: Option<u64>,

    /// Number of tokens generated
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Clone, Deserialize)]
struct TagModel {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct VersionResponse {
    version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_client_creation() {
        let client = OllamaClient::new("http://localhost:11434/").unwrap();

        assert_eq!(client.endpoint, "http://localhost:11434");
        assert_eq!(client.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(client.name(), "ollama");
        assert_eq!(
            client.endpoint_info().as_deref(),
            Some("http://localhost:11434")
        );
    }

    #[test]
    fn test_chat_request_serialization() {
        let request = OllamaChatRequest {
            model: "gemma:2b".to_string(),
            messages: vec![ChatMessage::system("be nice"), ChatMessage::user("hi")],
            stream: false,
            options: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gemma:2b");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert!(json.get("options").is_none());
    }

    #[test]
    fn test_chat_response_deserialization() {
        let json = r#"{
            "model": "gemma:2b",
            "created_at": "2024-01-01T00:00:00Z",
            "message": {"role": "assistant", "content": "Sure, Tuesday works."},
            "done": true,
            "total_duration": 1000000,
            "eval_count": 12
        }"#;

        let response: OllamaChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.model.as_deref(), Some("gemma:2b"));
        assert_eq!(response.message.unwrap().content, "Sure, Tuesday works.");
        assert_eq!(response.eval_count, Some(12));
    }

    #[test]
    fn test_tags_response_deserialization() {
        let json = r#"{"models":[{"name":"gemma:2b","size":1},{"name":"llama2:latest"}]}"#;
        let tags: TagsResponse = serde_json::from_str(json).unwrap();
        let names: Vec<_> = tags.models.into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["gemma:2b", "llama2:latest"]);
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let client =
            OllamaClient::with_timeout("http://localhost:59999", Duration::from_millis(100))
                .unwrap();

        let result = client.health_check().await;
        assert!(result.is_ok());
        assert!(!result.unwrap());
    }
}
