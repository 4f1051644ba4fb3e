use super::client::LLMClient;
use super::error::BackendError;
use super::types::{LLMRequest, LLMResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted completion endpoint for tests
///
/// Responses are served in FIFO order regardless of the requested model;
/// every request is recorded so tests can assert on models and prompts.
pub struct MockLLMClient {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<LLMRequest>>,
    models: Mutex<Result<Vec<String>, BackendError>>,
    name: String,
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub content: String,
    pub error: Option<BackendError>,
    pub delay: Option<Duration>,
}

impl MockResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            error: None,
            delay: None,
        }
    }

    pub fn error(error: BackendError) -> Self {
        Self {
            content: String::new(),
            error: Some(error),
            delay: None,
        }
    }

    /// A response that only arrives after `delay`, for timeout tests
    pub fn delayed(content: impl Into<String>, delay: Duration) -> Self {
        Self {
            content: content.into(),
            error: None,
            delay: Some(delay),
        }
    }
}

impl MockLLMClient {
    pub fn new() -> Self {
        Self::with_name("MockLLM")
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            models: Mutex::new(Ok(Vec::new())),
            name: name.into(),
        }
    }

    /// Sets the model list returned by `list_models`
    pub fn with_models<I, S>(self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.models.lock().unwrap() = Ok(models.into_iter().map(Into::into).collect());
        self
    }

    /// Makes `list_models` fail with the given error
    pub fn with_model_listing_error(self, error: BackendError) -> Self {
        *self.models.lock().unwrap() = Err(error);
        self
    }

    pub fn add_response(&self, response: MockResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn add_responses(&self, responses: impl IntoIterator<Item = MockResponse>) {
        let mut queue = self.responses.lock().unwrap();
        for response in responses {
            queue.push_back(response);
        }
    }

    pub fn remaining_responses(&self) -> usize {
        self.responses.lock().unwrap().len()
    }

    /// All chat requests received so far, oldest first
    pub fn requests(&self) -> Vec<LLMRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Models of all chat requests received so far, oldest first
    pub fn requested_models(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.model.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Default for MockLLMClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);

        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BackendError::Other {
                message: "MockLLMClient: No more responses in queue".to_string(),
            })?;

        if let Some(delay) = response.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = response.error {
            return Err(error);
        }

        Ok(LLMResponse::text(
            response.content,
            model,
            Duration::from_millis(10),
        ))
    }

    async fn list_models(&self) -> Result<Vec<String>, BackendError> {
        self.models.lock().unwrap().clone()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint_info(&self) -> Option<String> {
        Some("mock://llm".to_string())
    }
}

impl std::fmt::Debug for MockLLMClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLLMClient")
            .field("name", &self.name)
            .field("remaining_responses", &self.remaining_responses())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;

    fn request(model: &str) -> LLMRequest {
        LLMRequest::new(model, vec![ChatMessage::user("hi")])
    }

    #[tokio::test]
    async fn test_mock_client_basic() {
        let client = MockLLMClient::new();
        client.add_response(MockResponse::text("Hello!"));

        let response = client.chat(request("gemma:2b")).await.unwrap();

        assert_eq!(response.content, "Hello!");
        assert_eq!(response.model, "gemma:2b");
        assert_eq!(client.requested_models(), vec!["gemma:2b"]);
    }

    #[tokio::test]
    async fn test_mock_client_error() {
        let client = MockLLMClient::new();
        client.add_response(MockResponse::error(BackendError::TimeoutError {
            millis: 30_000,
        }));

        assert!(client.chat(request("m")).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_client_no_responses() {
        let client = MockLLMClient::new();
        assert!(client.chat(request("m")).await.is_err());
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_client_multiple_responses() {
        let client = MockLLMClient::new();
        client.add_responses(vec![
            MockResponse::text("First"),
            MockResponse::text("Second"),
            MockResponse::text("Third"),
        ]);

        assert_eq!(client.remaining_responses(), 3);
        assert_eq!(client.chat(request("m")).await.unwrap().content, "First");
        assert_eq!(client.chat(request("m")).await.unwrap().content, "Second");
        assert_eq!(client.remaining_responses(), 1);
    }

    #[tokio::test]
    async fn test_model_listing() {
        let client = MockLLMClient::new().with_models(["gemma:2b", "mistral:latest"]);
        assert_eq!(
            client.list_models().await.unwrap(),
            vec!["gemma:2b", "mistral:latest"]
        );

        let broken = MockLLMClient::new().with_model_listing_error(BackendError::NetworkError {
            message: "refused".to_string(),
        });
        assert!(broken.list_models().await.is_err());
    }
}
