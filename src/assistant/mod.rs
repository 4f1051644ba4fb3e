//! Request orchestration
//!
//! One request walks `Idle -> NameExtracted -> ClientResolved ->
//! ResponseReady -> Presented`. It leaves early through `Rejected` (empty
//! prompt, no usable name) or `DirectoryUnavailable` (the client store was
//! unreachable at startup and has not been reconnected). Early exits never
//! touch the components further down the chain.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::directory::{ClientDirectory, ClientStore, DirectoryError, LookupOutcome};
use crate::extract::NameExtractor;
use crate::response::{ResponseGenerator, ResponseSource};

pub const EMPTY_PROMPT_MESSAGE: &str = "Please enter a prompt";
pub const NO_NAME_MESSAGE: &str = "Could not extract a valid person name from the prompt";
pub const DIRECTORY_UNAVAILABLE_MESSAGE: &str =
    "The client database is unavailable. Please check that it is running and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistantState {
    Idle,
    NameExtracted,
    ClientResolved,
    ResponseReady,
    Presented,
    Rejected,
    DirectoryUnavailable,
}

/// Client indicator shown next to the reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClientStatus {
    Found { email: String },
    NotFound,
    Rejected { reason: String },
    DirectoryUnavailable { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct AssistantReply {
    pub prompt: String,
    pub client_name: Option<String>,
    pub status: ClientStatus,
    pub response: Option<String>,
    pub source: Option<ResponseSource>,
    pub lookup: Option<LookupOutcome>,
    pub trace: Vec<AssistantState>,
}

impl AssistantReply {
    fn stopped(prompt: &str, mut trace: Vec<AssistantState>, status: ClientStatus) -> Self {
        trace.push(match status {
            ClientStatus::DirectoryUnavailable { .. } => AssistantState::DirectoryUnavailable,
            _ => AssistantState::Rejected,
        });
        Self {
            prompt: prompt.to_string(),
            client_name: None,
            status,
            response: None,
            source: None,
            lookup: None,
            trace,
        }
    }

    pub fn final_state(&self) -> AssistantState {
        self.trace.last().copied().unwrap_or(AssistantState::Idle)
    }

    pub fn is_presented(&self) -> bool {
        self.final_state() == AssistantState::Presented
    }
}

/// Connection state of the client directory
pub enum DirectoryHandle {
    Connected(ClientDirectory),
    Unavailable {
        store: Arc<dyn ClientStore>,
        threshold: u8,
        reason: String,
    },
}

impl DirectoryHandle {
    /// Connects once; an unreachable store yields `Unavailable`, not an error
    pub async fn open(store: Arc<dyn ClientStore>, threshold: u8) -> Self {
        match ClientDirectory::connect(Arc::clone(&store), threshold).await {
            Ok(directory) => DirectoryHandle::Connected(directory),
            Err(e) => DirectoryHandle::Unavailable {
                store,
                threshold,
                reason: e.to_string(),
            },
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, DirectoryHandle::Connected(_))
    }

    pub fn directory(&self) -> Option<&ClientDirectory> {
        match self {
            DirectoryHandle::Connected(directory) => Some(directory),
            DirectoryHandle::Unavailable { .. } => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DirectoryHandle::Connected(directory) => directory.store().describe(),
            DirectoryHandle::Unavailable { store, .. } => store.describe(),
        }
    }
}

pub struct Assistant {
    extractor: NameExtractor,
    directory: DirectoryHandle,
    generator: ResponseGenerator,
}

impl Assistant {
    pub fn new(
        extractor: NameExtractor,
        directory: DirectoryHandle,
        generator: ResponseGenerator,
    ) -> Self {
        if let DirectoryHandle::Unavailable { reason, .. } = &directory {
            warn!("Assistant starting without a client directory: {}", reason);
        }
        Self {
            extractor,
            directory,
            generator,
        }
    }

    pub fn directory(&self) -> &DirectoryHandle {
        &self.directory
    }

    pub fn extractor(&self) -> &NameExtractor {
        &self.extractor
    }

    pub fn generator(&self) -> &ResponseGenerator {
        &self.generator
    }

    /// Retries the store ping when the directory is unavailable
    pub async fn reconnect(&mut self) -> Result<(), DirectoryError> {
        let DirectoryHandle::Unavailable {
            store, threshold, ..
        } = &self.directory
        else {
            return Ok(());
        };

        let directory = ClientDirectory::connect(Arc::clone(store), *threshold).await?;
        info!("Client directory reconnected");
        self.directory = DirectoryHandle::Connected(directory);
        Ok(())
    }

    /// Runs one request through the whole pipeline
    pub async fn handle(&self, prompt: &str) -> AssistantReply {
        let mut trace = vec![AssistantState::Idle];

        if prompt.trim().is_empty() {
            return AssistantReply::stopped(
                prompt,
                trace,
                ClientStatus::Rejected {
                    reason: EMPTY_PROMPT_MESSAGE.to_string(),
                },
            );
        }

        let directory = match &self.directory {
            DirectoryHandle::Connected(directory) => directory,
            DirectoryHandle::Unavailable { reason, .. } => {
                warn!("Refusing request, client directory unavailable: {}", reason);
                return AssistantReply::stopped(
                    prompt,
                    trace,
                    ClientStatus::DirectoryUnavailable {
                        reason: DIRECTORY_UNAVAILABLE_MESSAGE.to_string(),
                    },
                );
            }
        };

        let name = match self.extractor.extract(prompt).await {
            Ok(result) => result.name,
            Err(e) => {
                error!("Name extraction failed: {}", e);
                None
            }
        };
        let Some(name) = name else {
            info!("No person name in prompt");
            return AssistantReply::stopped(
                prompt,
                trace,
                ClientStatus::Rejected {
                    reason: NO_NAME_MESSAGE.to_string(),
                },
            );
        };
        trace.push(AssistantState::NameExtracted);
        debug!(name = %name, "Extracted client name");

        let outcome = directory.lookup(&name).await;
        let lookup = outcome.to_result();
        trace.push(AssistantState::ClientResolved);

        let generated = self.generator.generate(prompt, &lookup).await;
        trace.push(AssistantState::ResponseReady);

        let status = match lookup.email {
            Some(email) if lookup.exists => ClientStatus::Found { email },
            _ => ClientStatus::NotFound,
        };
        trace.push(AssistantState::Presented);

        info!(
            client = %name,
            found = matches!(status, ClientStatus::Found { .. }),
            source = %generated.source,
            "Request handled"
        );

        AssistantReply {
            prompt: prompt.to_string(),
            client_name: Some(name),
            status,
            response: Some(generated.text),
            source: Some(generated.source),
            lookup: Some(outcome),
            trace,
        }
    }
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("extractor", &self.extractor)
            .field("directory", &self.directory.describe())
            .field("connected", &self.directory.is_connected())
            .field("generator", &self.generator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{ClientRecord, InMemoryClientStore, DEFAULT_MATCH_THRESHOLD};
    use crate::extract::LlmRecognizer;
    use crate::llm::{MockLLMClient, MockResponse, RetryPolicy};
    use std::time::Duration;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(200))
    }

    async fn assistant(
        records: Vec<ClientRecord>,
    ) -> (Assistant, Arc<InMemoryClientStore>, Arc<MockLLMClient>) {
        let store = Arc::new(InMemoryClientStore::new(records));
        let client = Arc::new(MockLLMClient::new());
        let generator = ResponseGenerator::with_available(
            client.clone(),
            vec!["gemma:2b".to_string()],
            vec!["gemma:2b".to_string()],
            policy(),
        );
        let directory = DirectoryHandle::open(store.clone(), DEFAULT_MATCH_THRESHOLD).await;
        let assistant = Assistant::new(NameExtractor::rule_based(), directory, generator);
        (assistant, store, client)
    }

    #[tokio::test]
    async fn test_known_client_flow() {
        let (assistant, _, client) =
            assistant(vec![ClientRecord::new("John Doe", "john@x.com")]).await;
        client.add_response(MockResponse::text(
            "Of course. I'll reach John at john@x.com to confirm tomorrow.",
        ));

        let reply = assistant
            .handle("Schedule a meeting with John Doe tomorrow")
            .await;

        assert_eq!(reply.client_name.as_deref(), Some("John Doe"));
        assert_eq!(
            reply.status,
            ClientStatus::Found {
                email: "john@x.com".to_string()
            }
        );
        assert!(reply.response.as_deref().unwrap().contains("john@x.com"));
        assert_eq!(
            reply.trace,
            vec![
                AssistantState::Idle,
                AssistantState::NameExtracted,
                AssistantState::ClientResolved,
                AssistantState::ResponseReady,
                AssistantState::Presented,
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_client_falls_back_to_registration() {
        let (assistant, _, _) = assistant(vec![]).await;

        let reply = assistant.handle("Schedule a meeting with Alice Smith").await;

        assert_eq!(reply.status, ClientStatus::NotFound);
        assert_eq!(reply.source, Some(ResponseSource::Fallback));
        assert!(reply.response.as_deref().unwrap().contains("register"));
        assert!(reply.is_presented());
    }

    #[tokio::test]
    async fn test_no_name_is_rejected_without_downstream_calls() {
        let (assistant, store, client) =
            assistant(vec![ClientRecord::new("John Doe", "john@x.com")]).await;

        let reply = assistant.handle("Schedule something tomorrow").await;

        assert_eq!(
            reply.status,
            ClientStatus::Rejected {
                reason: NO_NAME_MESSAGE.to_string()
            }
        );
        assert_eq!(reply.final_state(), AssistantState::Rejected);
        assert_eq!(store.fetch_count(), 0);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_prompt_is_rejected() {
        let (assistant, _, _) = assistant(vec![]).await;
        let reply = assistant.handle("   ").await;
        assert_eq!(
            reply.status,
            ClientStatus::Rejected {
                reason: EMPTY_PROMPT_MESSAGE.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_failing_recognizer_is_a_rejection() {
        let store = Arc::new(InMemoryClientStore::default());
        let client = Arc::new(MockLLMClient::new());
        let recognizer = LlmRecognizer::new(client.clone(), vec!["gemma:2b".to_string()], policy());
        let generator =
            ResponseGenerator::with_available(client.clone(), vec![], vec![], policy());
        let assistant = Assistant::new(
            NameExtractor::new(Arc::new(recognizer)),
            DirectoryHandle::open(store.clone(), DEFAULT_MATCH_THRESHOLD).await,
            generator,
        );

        let reply = assistant.handle("Meet John Doe").await;

        assert_eq!(reply.final_state(), AssistantState::Rejected);
        assert_eq!(store.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_query_failure_is_treated_as_not_found() {
        let (assistant, store, _) =
            assistant(vec![ClientRecord::new("John Doe", "john@x.com")]).await;
        store.fail_with("cursor killed");

        let reply = assistant.handle("Book lunch with John Doe").await;

        assert_eq!(reply.status, ClientStatus::NotFound);
        assert!(matches!(reply.lookup, Some(LookupOutcome::Failed { .. })));
        assert!(reply.is_presented());
    }

    #[tokio::test]
    async fn test_unavailable_directory_refuses_until_reconnected() {
        let store = Arc::new(InMemoryClientStore::new(vec![ClientRecord::new(
            "John Doe",
            "john@x.com",
        )]));
        store.fail_with("connection refused");
        let client = Arc::new(MockLLMClient::new());
        let generator = ResponseGenerator::with_available(
            client.clone(),
            vec!["gemma:2b".to_string()],
            vec!["gemma:2b".to_string()],
            policy(),
        );
        let mut assistant = Assistant::new(
            NameExtractor::rule_based(),
            DirectoryHandle::open(store.clone(), DEFAULT_MATCH_THRESHOLD).await,
            generator,
        );

        let reply = assistant.handle("Meet John Doe").await;
        assert_eq!(reply.final_state(), AssistantState::DirectoryUnavailable);
        assert_eq!(store.fetch_count(), 0);
        assert_eq!(client.call_count(), 0);

        assert!(assistant.reconnect().await.is_err());
        store.recover();
        assistant.reconnect().await.unwrap();
        assert!(assistant.directory().is_connected());

        let reply = assistant.handle("Meet John Doe").await;
        assert!(matches!(reply.status, ClientStatus::Found { .. }));
    }
}
