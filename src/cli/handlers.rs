//! Subcommand handlers
//!
//! Every handler returns the process exit code. Results go to stdout in the
//! requested format; logs and the chat input marker go to stderr.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use super::commands::{AskArgs, ChatArgs, CliArgs, HealthArgs, ScheduleArgs};
use super::output::{HealthReport, HealthStatus, OutputFormat, OutputFormatter};
use crate::assistant::{Assistant, ClientStatus, DirectoryHandle};
use crate::config::{AssistantConfig, ConfigError, RecognizerKind};
use crate::directory::{ClientStore, InMemoryClientStore, MongoClientStore};
use crate::extract::{LlmRecognizer, NameExtractor};
use crate::llm::{LLMClient, OllamaClient};
use crate::response::{ModelCatalog, ResponseGenerator};
use crate::schedule::{MeetingPlanner, ScheduleError};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_DIRECTORY_UNAVAILABLE: i32 = 2;

const EXIT_COMMANDS: &[&str] = &["exit", "quit"];

/// Exit code for a finished request
pub fn exit_code(status: &ClientStatus) -> i32 {
    match status {
        ClientStatus::Found { .. } | ClientStatus::NotFound => EXIT_OK,
        ClientStatus::Rejected { .. } => EXIT_FAILURE,
        ClientStatus::DirectoryUnavailable { .. } => EXIT_DIRECTORY_UNAVAILABLE,
    }
}

/// Environment and config file settings, with command-line overrides applied
pub fn load_config(args: &CliArgs) -> Result<AssistantConfig, ConfigError> {
    let mut config = AssistantConfig::load(args.config.as_deref())?;
    if let Some(ref path) = args.clients_file {
        config.clients_file = Some(path.clone());
        config.validate()?;
    }
    Ok(config)
}

/// JSON client file when configured, MongoDB otherwise
pub async fn build_store(config: &AssistantConfig) -> Result<Arc<dyn ClientStore>> {
    if let Some(ref path) = config.clients_file {
        let store = InMemoryClientStore::from_json_file(path)
            .with_context(|| format!("Failed to load clients from {}", path.display()))?;
        return Ok(Arc::new(store));
    }

    let store = MongoClientStore::connect(
        &config.mongodb_uri,
        &config.database,
        &config.collection,
        config.store_timeout(),
    )
    .await
    .context("Failed to configure the MongoDB client store")?;
    Ok(Arc::new(store))
}

pub fn build_ollama(config: &AssistantConfig) -> Result<OllamaClient> {
    OllamaClient::with_timeout(config.ollama_endpoint.clone(), config.request_timeout())
        .with_context(|| format!("Failed to create Ollama client for {}", config.ollama_endpoint))
}

fn build_extractor(
    config: &AssistantConfig,
    client: Arc<dyn LLMClient>,
    models: Vec<String>,
) -> NameExtractor {
    match config.recognizer {
        RecognizerKind::Rules => NameExtractor::rule_based(),
        RecognizerKind::Llm => NameExtractor::new(Arc::new(LlmRecognizer::new(
            client,
            models,
            config.retry_policy(),
        ))),
    }
}

/// Wires extractor, directory and generator from `config`
///
/// An unreachable client store does not fail the build; the assistant starts
/// with an unavailable directory instead.
pub async fn build_assistant(
    config: &AssistantConfig,
    client: Arc<dyn LLMClient>,
) -> Result<Assistant> {
    let store = build_store(config).await?;
    let directory = DirectoryHandle::open(store, config.match_threshold).await;

    let generator = ResponseGenerator::initialize(
        Arc::clone(&client),
        config.models.clone(),
        config.retry_policy(),
    )
    .await;

    let extractor = build_extractor(config, client, generator.usable_models());
    debug!(
        recognizer = extractor.recognizer_name(),
        directory = %directory.describe(),
        models = ?generator.usable_models(),
        "Assistant ready"
    );

    Ok(Assistant::new(extractor, directory, generator))
}

async fn startup(config: &AssistantConfig) -> Result<Assistant> {
    let client: Arc<dyn LLMClient> = Arc::new(build_ollama(config)?);
    build_assistant(config, client).await
}

/// Answers one prompt, returning the formatted reply and its exit code
pub async fn respond(
    assistant: &Assistant,
    prompt: &str,
    formatter: &OutputFormatter,
) -> Result<(String, i32)> {
    let reply = assistant.handle(prompt).await;
    let code = exit_code(&reply.status);
    Ok((formatter.format_reply(&reply)?, code))
}

pub async fn handle_ask(args: &AskArgs, format: OutputFormat, config: &AssistantConfig) -> i32 {
    let assistant = match startup(config).await {
        Ok(assistant) => assistant,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            return EXIT_FAILURE;
        }
    };

    let formatter = OutputFormatter::new(format);
    match respond(&assistant, &args.prompt_text(), &formatter).await {
        Ok((output, code)) => {
            println!("{}", output.trim_end());
            code
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_FAILURE
        }
    }
}

/// Reads one request per line until EOF or an exit command
///
/// An unavailable directory is reconnected before each request.
pub async fn run_chat<R, W>(
    assistant: &mut Assistant,
    input: R,
    output: &mut W,
    formatter: &OutputFormatter,
    show_marker: bool,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut answered = 0;

    loop {
        if show_marker {
            eprint!("> ");
        }

        let Some(line) = lines
            .next_line()
            .await
            .context("Failed to read from stdin")?
        else {
            break;
        };

        let prompt = line.trim();
        if EXIT_COMMANDS.contains(&prompt.to_lowercase().as_str()) {
            break;
        }

        if !assistant.directory().is_connected() {
            if let Err(e) = assistant.reconnect().await {
                warn!("Client directory still unavailable: {}", e);
            }
        }

        let (text, _) = respond(assistant, prompt, formatter).await?;
        writeln!(output, "{}\n", text.trim_end()).context("Failed to write reply")?;
        output.flush().context("Failed to write reply")?;
        answered += 1;
    }

    info!("Chat ended after {} request(s)", answered);
    Ok(answered)
}

pub async fn handle_chat(args: &ChatArgs, format: OutputFormat, config: &AssistantConfig) -> i32 {
    let mut assistant = match startup(config).await {
        Ok(assistant) => assistant,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return EXIT_FAILURE;
        }
    };

    let formatter = OutputFormatter::new(format);
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();

    match run_chat(&mut assistant, stdin, &mut stdout, &formatter, !args.no_prompt).await {
        Ok(_) => EXIT_OK,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_FAILURE
        }
    }
}

fn schedule_exit_code(error: &ScheduleError) -> i32 {
    match error {
        ScheduleError::Directory { .. } => EXIT_DIRECTORY_UNAVAILABLE,
        _ => EXIT_FAILURE,
    }
}

/// Drafts the meeting for `request`, returning the formatted plan and exit code
pub async fn run_schedule(
    assistant: &Assistant,
    planner: &MeetingPlanner,
    request: &str,
    organizer: &str,
    formatter: &OutputFormatter,
) -> Result<(String, i32)> {
    let Some(directory) = assistant.directory().directory() else {
        return Ok((
            format!("Error: {}", crate::assistant::DIRECTORY_UNAVAILABLE_MESSAGE),
            EXIT_DIRECTORY_UNAVAILABLE,
        ));
    };

    match planner
        .plan(request, organizer, assistant.extractor(), directory)
        .await
    {
        Ok(plan) => Ok((formatter.format_plan(&plan)?, EXIT_OK)),
        Err(e) => {
            warn!("Scheduling failed: {}", e);
            Ok((format!("Error: {}", e), schedule_exit_code(&e)))
        }
    }
}

pub async fn handle_schedule(
    args: &ScheduleArgs,
    format: OutputFormat,
    config: &AssistantConfig,
) -> i32 {
    let client: Arc<dyn LLMClient> = match build_ollama(config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return EXIT_FAILURE;
        }
    };
    let assistant = match build_assistant(config, Arc::clone(&client)).await {
        Ok(assistant) => assistant,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return EXIT_FAILURE;
        }
    };

    let generator = assistant.generator();
    let planner = MeetingPlanner::new(client, generator.usable_models(), *generator.policy());
    let formatter = OutputFormatter::new(format);

    match run_schedule(
        &assistant,
        &planner,
        &args.request_text(),
        &args.organizer,
        &formatter,
    )
    .await
    {
        Ok((output, code)) => {
            if code == EXIT_OK {
                println!("{}", output.trim_end());
            } else {
                eprintln!("{}", output);
            }
            code
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_FAILURE
        }
    }
}

/// Probes the completion endpoint and the client store
pub async fn collect_health(
    ollama: &OllamaClient,
    store: Result<Arc<dyn ClientStore>>,
    preferred: &[String],
) -> HealthReport {
    let mut report = HealthReport::new();

    let reachable = matches!(ollama.health_check().await, Ok(true));
    let mut available_models = Vec::new();
    if reachable {
        let version = ollama
            .version()
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        let mut status = HealthStatus::available(format!("Ollama {} is running", version));
        match ollama.list_models().await {
            Ok(models) => {
                status = status.with_details(format!("Served models: {}", models.join(", ")));
                available_models = models;
            }
            Err(e) => status = status.with_details(format!("Model listing failed: {}", e)),
        }
        report.insert("Ollama".to_string(), status);
    } else {
        report.insert(
            "Ollama".to_string(),
            HealthStatus::unavailable(format!("Cannot reach {}", ollama.endpoint()))
                .with_details("Start Ollama with 'ollama serve' or set MEETDESK_OLLAMA_ENDPOINT"),
        );
    }

    let usable = ModelCatalog::new(preferred.to_vec(), available_models).usable();
    let models_status = if usable.is_empty() {
        HealthStatus::unavailable("No preferred model is available; replies use the fallback")
            .with_details(format!("Preferred: {}", preferred.join(", ")))
    } else {
        HealthStatus::available(format!("Usable: {}", usable.join(", ")))
    };
    report.insert("Models".to_string(), models_status);

    let store_status = match store {
        Ok(store) => match store.ping().await {
            Ok(()) => HealthStatus::available(format!("Connected to {}", store.describe())),
            Err(e) => HealthStatus::unavailable(format!("Cannot reach {}", store.describe()))
                .with_details(e.to_string()),
        },
        Err(e) => HealthStatus::unavailable("Client store is misconfigured")
            .with_details(format!("{:#}", e)),
    };
    report.insert("Client store".to_string(), store_status);

    report
}

pub async fn handle_health(args: &HealthArgs, format: OutputFormat, config: &AssistantConfig) -> i32 {
    let ollama = match build_ollama(config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return EXIT_FAILURE;
        }
    };

    let store = build_store(config).await;
    let report = collect_health(&ollama, store, &config.models).await;
    let formatter = OutputFormatter::new(format);

    match formatter.format_health(&report) {
        Ok(output) => println!("{}", output.trim_end()),
        Err(e) => {
            eprintln!("Error formatting health status: {:#}", e);
            return EXIT_FAILURE;
        }
    }

    if args.show_config {
        match formatter.format_config(config) {
            Ok(output) => println!("\n{}", output.trim_end()),
            Err(e) => {
                eprintln!("Error formatting configuration: {:#}", e);
                return EXIT_FAILURE;
            }
        }
    }

    if report.values().all(|status| status.available) {
        EXIT_OK
    } else {
        EXIT_FAILURE
    }
}
