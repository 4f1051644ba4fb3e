//! Entity recognition delegated to the completion endpoint
//!
//! The model is asked for a JSON object of the form
//! `{"entities": [{"label": "PERSON", "text": "John Doe"}]}`. Replies wrapped
//! in prose or markdown fences are accepted; a reply that does not parse
//! counts as a failed attempt and is retried like any transport error.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Entity, EntityLabel, EntityRecognizer, ExtractionError};
use crate::llm::parse::extract_json_object;
use crate::llm::{
    retry_with_timeout, BackendError, ChatMessage, LLMClient, LLMRequest, RetryPolicy,
};

const SYSTEM_PROMPT: &str = "You are a named-entity recognizer. \
Label every person, organization, location and date mentioned in the user's text. \
Respond with JSON only, in this exact shape: \
{\"entities\": [{\"label\": \"PERSON\", \"text\": \"...\"}]}. \
Use the labels PERSON, ORG, LOC and DATE. \
Copy each text exactly as written and list entities in the order they appear. \
If there are none, respond with {\"entities\": []}.";

#[derive(Debug, Deserialize)]
struct EntityPayload {
    #[serde(default)]
    entities: Vec<RawEntity>,
}

#[derive(Debug, Deserialize)]
struct RawEntity {
    #[serde(alias = "type")]
    label: String,
    text: String,
}

fn parse_entities(content: &str) -> Result<Vec<Entity>, BackendError> {
    let invalid = |message: String| BackendError::InvalidResponse {
        message,
        raw_response: Some(content.to_string()),
    };

    let json = extract_json_object(content).map_err(|e| invalid(e.to_string()))?;
    let payload: EntityPayload =
        serde_json::from_str(&json).map_err(|e| invalid(format!("bad entity JSON: {}", e)))?;

    Ok(payload
        .entities
        .into_iter()
        .filter(|e| !e.text.trim().is_empty())
        .map(|e| Entity::new(EntityLabel::from_tag(&e.label), e.text.trim()))
        .collect())
}

pub struct LlmRecognizer {
    client: Arc<dyn LLMClient>,
    models: Vec<String>,
    policy: RetryPolicy,
}

impl LlmRecognizer {
    /// `models` are tried in order, each with the full retry budget
    pub fn new(client: Arc<dyn LLMClient>, models: Vec<String>, policy: RetryPolicy) -> Self {
        Self {
            client,
            models,
            policy,
        }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }
}

#[async_trait]
impl EntityRecognizer for LlmRecognizer {
    async fn recognize(&self, text: &str) -> Result<Vec<Entity>, ExtractionError> {
        let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(text)];
        let mut last_failure = String::from("no model configured");

        for model in &self.models {
            let request = LLMRequest::new(model.clone(), messages.clone()).with_temperature(0.0);
            let outcome = retry_with_timeout(&self.policy, model, |_| {
                let client = Arc::clone(&self.client);
                let request = request.clone();
                async move {
                    let response = client.chat(request).await?;
                    parse_entities(&response.content)
                }
            })
            .await;

            match outcome {
                Ok(entities) => {
                    debug!(model = %model, "Model labelled {} entit(ies)", entities.len());
                    return Ok(entities);
                }
                Err(e) => {
                    warn!(model = %model, "Entity recognition failed: {}", e);
                    last_failure = e.to_string();
                }
            }
        }

        Err(ExtractionError::Recognizer {
            recognizer: self.name().to_string(),
            message: last_failure,
        })
    }

    fn name(&self) -> &str {
        "llm"
    }
}

impl std::fmt::Debug for LlmRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmRecognizer")
            .field("client", &self.client.name())
            .field("models", &self.models)
            .field("policy", &self.policy)
            .finish()
    }
}
