//! meetdesk - meeting-request assistant
//!
//! Reads a free-text meeting request, picks out the person it mentions,
//! checks that person against the client directory and drafts a reply with
//! a local Ollama model. When no model answers, a canned reply stands in.
//!
//! # Core Concepts
//!
//! - **Name extraction**: an [`extract::EntityRecognizer`] labels entities and
//!   the first plausible PERSON becomes the client candidate
//! - **Client directory**: fuzzy lookup over a [`directory::ClientStore`]
//!   (MongoDB or a JSON file); a match must score above the threshold
//! - **Response generation**: preferred models are tried in order, each with
//!   bounded retries and a per-attempt timeout
//! - **Assistant**: runs one request through the steps above and reports the
//!   client status next to the reply
//!
//! # Example Usage
//!
//! ```ignore
//! use meetdesk::{AssistantConfig, cli::handlers::build_assistant};
//! use meetdesk::llm::{LLMClient, OllamaClient};
//! use std::sync::Arc;
//!
//! async fn answer(prompt: &str) -> anyhow::Result<()> {
//!     let config = AssistantConfig::load(None)?;
//!     let client: Arc<dyn LLMClient> = Arc::new(OllamaClient::new(&config.ollama_endpoint)?);
//!     let assistant = build_assistant(&config, client).await?;
//!
//!     let reply = assistant.handle(prompt).await;
//!     println!("{:?}: {:?}", reply.status, reply.response);
//!     Ok(())
//! }
//! ```
//!
//! # Project Structure
//!
//! - [`extract`]: entity recognizers and the name extractor
//! - [`directory`]: client stores and fuzzy lookup
//! - [`response`]: model selection, prompts and the fallback reply
//! - [`assistant`]: per-request orchestration
//! - [`schedule`]: calendar event and invitation drafts
//! - [`llm`]: completion client abstraction, Ollama client and retries

pub mod assistant;
pub mod cli;
pub mod config;
pub mod directory;
pub mod extract;
pub mod llm;
pub mod response;
pub mod schedule;
pub mod util;

pub use assistant::{Assistant, AssistantReply, AssistantState, ClientStatus, DirectoryHandle};
pub use config::{AssistantConfig, ConfigError, RecognizerKind};
pub use directory::{
    ClientDirectory, ClientRecord, ClientStore, DirectoryError, InMemoryClientStore,
    LookupOutcome, LookupResult, MongoClientStore,
};
pub use extract::{Entity, EntityLabel, EntityRecognizer, ExtractionResult, NameExtractor};
pub use llm::{BackendError, LLMClient, OllamaClient, RetryPolicy};
pub use response::{GeneratedResponse, ResponseGenerator, ResponseSource};
pub use schedule::{MeetingPlan, MeetingPlanner, ScheduleError};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
