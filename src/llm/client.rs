use super::error::BackendError;
use super::types::{LLMRequest, LLMResponse};
use async_trait::async_trait;

/// A chat-completion endpoint
///
/// Implementations must be cheap to share behind an `Arc`; the assistant
/// builds one client at startup and hands it to every component that talks
/// to the model.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Sends one non-streaming chat request
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError>;

    /// Lists the model identifiers the endpoint currently serves
    async fn list_models(&self) -> Result<Vec<String>, BackendError>;

    fn name(&self) -> &str;

    fn endpoint_info(&self) -> Option<String> {
        None
    }
}
