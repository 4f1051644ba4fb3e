//! End-to-end request handling with a scripted completion endpoint

use meetdesk::cli::handlers::build_assistant;
use meetdesk::directory::{ClientRecord, InMemoryClientStore};
use meetdesk::llm::{BackendError, LLMClient, MockLLMClient, MockResponse, RetryPolicy};
use meetdesk::{
    Assistant, AssistantConfig, AssistantState, ClientStatus, DirectoryHandle, NameExtractor,
    ResponseGenerator, ResponseSource,
};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn unreachable() -> BackendError {
    BackendError::NetworkError {
        message: "Connection failed: connection refused".to_string(),
    }
}

fn quick_config(clients_file: std::path::PathBuf) -> AssistantConfig {
    AssistantConfig {
        clients_file: Some(clients_file),
        models: vec!["gemma:2b".to_string(), "llama2".to_string(), "mistral".to_string()],
        retry_delay_ms: 1,
        ..AssistantConfig::default()
    }
}

async fn assistant_from_file(dir: &TempDir, clients: &str, client: Arc<MockLLMClient>) -> Assistant {
    let path = dir.path().join("clients.json");
    fs::write(&path, clients).unwrap();
    let llm: Arc<dyn LLMClient> = client;
    build_assistant(&quick_config(path), llm).await.unwrap()
}

#[tokio::test]
async fn test_registered_client_reply_carries_email() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(MockLLMClient::new().with_models(["gemma:2b", "llama2:latest"]));
    client.add_response(MockResponse::text(
        "Of course. I'll send the invitation to john@x.com.",
    ));
    let assistant = assistant_from_file(
        &dir,
        r#"[{"name": "John Doe", "email": "john@x.com"}]"#,
        Arc::clone(&client),
    )
    .await;

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
    assert_eq!(reply.final_state(), AssistantState::Presented);

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].messages[0].content.contains("john@x.com"));
    assert_eq!(
        requests[0].messages[1].content,
        "Schedule a meeting with John Doe tomorrow"
    );
}

#[tokio::test]
async fn test_unknown_person_is_invited_to_register() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(MockLLMClient::new().with_models(["gemma:2b"]));
    client.add_response(MockResponse::text(
        "Alice Smith is not a client yet; she can register on our website.",
    ));
    let assistant = assistant_from_file(&dir, "[]", Arc::clone(&client)).await;

    let reply = assistant
        .handle("Schedule a meeting with Alice Smith")
        .await;

    assert_eq!(reply.client_name.as_deref(), Some("Alice Smith"));
    assert_eq!(reply.status, ClientStatus::NotFound);
    assert!(reply.is_presented());
    assert!(client.requests()[0].messages[0]
        .content
        .contains("not found in our client database"));
}

#[tokio::test]
async fn test_prompt_without_person_touches_nothing() {
    let store = Arc::new(InMemoryClientStore::new(vec![ClientRecord::new(
        "John Doe",
        "john@x.com",
    )]));
    let client = Arc::new(MockLLMClient::new().with_models(["gemma:2b"]));
    let generator = ResponseGenerator::initialize(
        client.clone(),
        vec!["gemma:2b".to_string()],
        RetryPolicy::default(),
    )
    .await;
    let assistant = Assistant::new(
        NameExtractor::rule_based(),
        DirectoryHandle::open(store.clone(), 90).await,
        generator,
    );

    let reply = assistant.handle("Schedule something tomorrow").await;

    assert!(matches!(reply.status, ClientStatus::Rejected { .. }));
    assert_eq!(reply.response, None);
    assert_eq!(reply.final_state(), AssistantState::Rejected);
    assert_eq!(store.fetch_count(), 0);
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_unreachable_endpoint_yields_fallback() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(MockLLMClient::new().with_models(["gemma:2b", "llama2:latest", "mistral:latest"]));
    client.add_responses((0..9).map(|_| MockResponse::error(unreachable())));
    let assistant = assistant_from_file(
        &dir,
        r#"[{"name": "John Doe", "email": "john@x.com"}]"#,
        Arc::clone(&client),
    )
    .await;

    let reply = assistant.handle("Meet John Doe on Friday").await;

    assert_eq!(reply.source, Some(ResponseSource::Fallback));
    assert_eq!(client.call_count(), 9);
    let text = reply.response.unwrap();
    assert!(text.contains("registered client"));
    assert!(text.contains("john@x.com"));
}

#[tokio::test]
async fn test_unlisted_models_yield_registration_fallback() {
    let dir = TempDir::new().unwrap();
    let client = Arc::new(
        MockLLMClient::new().with_model_listing_error(unreachable()),
    );
    let assistant = assistant_from_file(&dir, "[]", Arc::clone(&client)).await;

    let reply = assistant.handle("Book a call with Alice Smith").await;

    assert_eq!(reply.source, Some(ResponseSource::Fallback));
    assert!(reply.response.unwrap().contains("register as a new client"));
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_directory_outage_then_recovery() {
    let store = Arc::new(InMemoryClientStore::new(vec![ClientRecord::new(
        "John Doe",
        "john@x.com",
    )]));
    store.fail_with("server selection timeout");
    let client = Arc::new(MockLLMClient::new().with_models(["gemma:2b"]));
    client.add_response(MockResponse::text("See you then."));
    let generator = ResponseGenerator::initialize(
        client.clone(),
        vec!["gemma:2b".to_string()],
        RetryPolicy::new(1, Duration::from_millis(1), Duration::from_secs(5)),
    )
    .await;
    let mut assistant = Assistant::new(
        NameExtractor::rule_based(),
        DirectoryHandle::open(store.clone(), 90).await,
        generator,
    );

    let reply = assistant.handle("Meet John Doe").await;
    assert!(matches!(
        reply.status,
        ClientStatus::DirectoryUnavailable { .. }
    ));
    assert_eq!(client.call_count(), 0);

    assert!(assistant.reconnect().await.is_err());
    store.recover();
    assistant.reconnect().await.unwrap();

    let reply = assistant.handle("Meet John Doe").await;
    assert!(matches!(reply.status, ClientStatus::Found { .. }));
    assert_eq!(reply.response.as_deref(), Some("See you then."));
}
