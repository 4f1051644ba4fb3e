use meetdesk::cli::commands::{CliArgs, Commands};
use meetdesk::cli::handlers::{
    handle_ask, handle_chat, handle_health, handle_schedule, load_config, EXIT_FAILURE,
};
use meetdesk::util::logging;
use meetdesk::VERSION;

use clap::Parser;
use tracing::debug;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(EXIT_FAILURE);
        }
    };

    logging::with_level(args.requested_log_level().unwrap_or(&config.log_level));

    debug!("meetdesk v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let format = args.format.into();
    let exit_code = match &args.command {
        Commands::Ask(ask_args) => handle_ask(ask_args, format, &config).await,
        Commands::Chat(chat_args) => handle_chat(chat_args, format, &config).await,
        Commands::Schedule(schedule_args) => handle_schedule(schedule_args, format, &config).await,
        Commands::Health(health_args) => handle_health(health_args, format, &config).await,
    };

    std::process::exit(exit_code);
}
