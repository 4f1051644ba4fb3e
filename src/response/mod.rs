//! Reply generation against the completion endpoint
//!
//! [`ResponseGenerator`] walks a preference-ordered model list, skipping
//! models the endpoint does not serve, and gives each remaining model its
//! own retry budget. When every attempt fails the caller still gets text:
//! a canned reply that reflects the client lookup.

pub mod prompt;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::directory::LookupResult;
use crate::llm::{retry_with_timeout, BackendError, LLMClient, LLMRequest, RetryPolicy};

pub use prompt::{build_messages, fallback_response, system_instruction};

/// Default model preference, smallest first
pub const DEFAULT_MODELS: &[&str] = &["gemma:2b", "llama2", "mistral"];

/// Preferred models matched against what the endpoint actually serves
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelCatalog {
    preferred: Vec<String>,
    available: Vec<String>,
}

impl ModelCatalog {
    pub fn new(preferred: Vec<String>, available: Vec<String>) -> Self {
        Self {
            preferred,
            available,
        }
    }

    pub fn preferred(&self) -> &[String] {
        &self.preferred
    }

    pub fn available(&self) -> &[String] {
        &self.available
    }

    /// Served name for a preferred model
    ///
    /// An untagged name (`llama2`) also matches the endpoint's default tag
    /// (`llama2:latest`).
    pub fn resolve(&self, preferred: &str) -> Option<&str> {
        if let Some(exact) = self.available.iter().find(|m| *m == preferred) {
            return Some(exact.as_str());
        }
        if preferred.contains(':') {
            return None;
        }
        let tagged = format!("{}:latest", preferred);
        self.available
            .iter()
            .find(|m| **m == tagged)
            .map(String::as_str)
    }

    /// Served names of the preferred models, in preference order
    pub fn usable(&self) -> Vec<String> {
        let mut usable: Vec<String> = Vec::new();
        for preferred in &self.preferred {
            if let Some(model) = self.resolve(preferred) {
                if !usable.iter().any(|m| m == model) {
                    usable.push(model.to_string());
                }
            }
        }
        usable
    }
}

/// Where the text of a [`GeneratedResponse`] came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Model(String),
    Fallback,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseSource::Model(model) => write!(f, "model {}", model),
            ResponseSource::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedResponse {
    pub text: String,
    pub source: ResponseSource,
}

impl GeneratedResponse {
    pub fn is_fallback(&self) -> bool {
        self.source == ResponseSource::Fallback
    }
}

pub struct ResponseGenerator {
    client: Arc<dyn LLMClient>,
    catalog: ModelCatalog,
    policy: RetryPolicy,
}

impl ResponseGenerator {
    /// Queries the endpoint's model list once and keeps it for the
    /// generator's lifetime
    ///
    /// A failed listing is logged and leaves the generator with no usable
    /// model, so every reply is the fallback.
    pub async fn initialize(
        client: Arc<dyn LLMClient>,
        preferred: Vec<String>,
        policy: RetryPolicy,
    ) -> Self {
        let available = match client.list_models().await {
            Ok(models) => {
                info!(
                    "{} serves {} model(s): {}",
                    client.name(),
                    models.len(),
                    models.join(", ")
                );
                models
            }
            Err(e) => {
                warn!(
                    error_kind = e.kind(),
                    "Could not list models from {}: {}",
                    client.name(),
                    e
                );
                Vec::new()
            }
        };

        Self::with_available(client, preferred, available, policy)
    }

    /// Builds a generator from an already known model list
    pub fn with_available(
        client: Arc<dyn LLMClient>,
        preferred: Vec<String>,
        available: Vec<String>,
        policy: RetryPolicy,
    ) -> Self {
        let catalog = ModelCatalog::new(preferred, available);
        if catalog.usable().is_empty() {
            warn!(
                preferred = ?catalog.preferred(),
                "None of the preferred models is available; replies will use the fallback"
            );
        }
        Self {
            client,
            catalog,
            policy,
        }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn usable_models(&self) -> Vec<String> {
        self.catalog.usable()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn client(&self) -> &Arc<dyn LLMClient> {
        &self.client
    }

    /// Produces a reply to `prompt`; the text is never empty
    pub async fn generate(&self, prompt: &str, lookup: &LookupResult) -> GeneratedResponse {
        let messages = build_messages(prompt, lookup);

        for model in self.catalog.usable() {
            let request = LLMRequest::new(model.clone(), messages.clone());
            let outcome = retry_with_timeout(&self.policy, &model, |_| {
                let client = Arc::clone(&self.client);
                let request = request.clone();
                async move {
                    let response = client.chat(request).await?;
                    let text = response.content.trim();
                    if text.is_empty() {
                        return Err(BackendError::InvalidResponse {
                            message: "empty completion".to_string(),
                            raw_response: None,
                        });
                    }
                    Ok(text.to_string())
                }
            })
            .await;

            match outcome {
                Ok(text) => {
                    info!(model = %model, "Generated reply ({} chars)", text.len());
                    return GeneratedResponse {
                        text,
                        source: ResponseSource::Model(model),
                    };
                }
                Err(e) => warn!(model = %model, "Giving up on model: {}", e),
            }
        }

        warn!("All models failed; using fallback reply");
        GeneratedResponse {
            text: fallback_response(lookup),
            source: ResponseSource::Fallback,
        }
    }
}

impl fmt::Debug for ResponseGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseGenerator")
            .field("client", &self.client.name())
            .field("catalog", &self.catalog)
            .field("policy", &self.policy)
            .finish()
    }
}
