use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Meeting-request assistant backed by a client directory and a local LLM
#[derive(Parser, Debug)]
#[command(
    name = "meetdesk",
    about = "Meeting-request assistant backed by a client directory and a local LLM",
    version,
    author,
    long_about = "meetdesk reads free-text meeting requests, picks out the person they \
                  mention, checks that person against the client directory and drafts a \
                  reply with a local Ollama model. When no model answers, a canned reply \
                  is used instead."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'c',
        long,
        global = true,
        value_name = "FILE",
        help = "TOML config file overriding environment settings"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "Read clients from a JSON file instead of MongoDB"
    )]
    pub clients_file: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        global = true,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Verbose logging (debug level)")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - only log errors"
    )]
    pub quiet: bool,
}

impl CliArgs {
    /// Level requested on the command line, if any
    pub fn requested_log_level(&self) -> Option<&str> {
        if let Some(level) = self.log_level.as_deref() {
            Some(level)
        } else if self.verbose {
            Some("debug")
        } else if self.quiet {
            Some("error")
        } else {
            None
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Answer a single meeting request",
        long_about = "Extracts the person named in the request, looks them up in the client \
                      directory and prints a reply together with their client status.\n\n\
                      Examples:\n  \
                      meetdesk ask \"Schedule a meeting with John Doe tomorrow\"\n  \
                      meetdesk ask --format json Book lunch with Ann Lee"
    )]
    Ask(AskArgs),

    #[command(
        about = "Answer meeting requests read from stdin, one per line",
        long_about = "Reads one request per line and answers each in turn. Type 'exit' or \
                      'quit' (or send EOF) to stop. If the client directory is down, every \
                      request first retries the connection."
    )]
    Chat(ChatArgs),

    #[command(
        about = "Draft a calendar event and invitation email",
        long_about = "Reads the meeting date, time and duration from the request, resolves \
                      the client and prints the calendar event and invitation drafts.\n\n\
                      Examples:\n  \
                      meetdesk schedule --organizer me@corp.com \"Meet John Doe tomorrow at 2 PM for 30 minutes\""
    )]
    Schedule(ScheduleArgs),

    #[command(
        about = "Check client store and completion endpoint availability",
        long_about = "Pings the client store, queries the Ollama endpoint for its version \
                      and models, and reports which preferred models can be used."
    )]
    Health(HealthArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct AskArgs {
    #[arg(
        value_name = "PROMPT",
        required = true,
        num_args = 1..,
        help = "Meeting request (quoting is optional)"
    )]
    pub prompt: Vec<String>,
}

impl AskArgs {
    pub fn prompt_text(&self) -> String {
        self.prompt.join(" ")
    }
}

#[derive(Parser, Debug, Clone)]
pub struct ChatArgs {
    #[arg(long, help = "Do not print the input marker")]
    pub no_prompt: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ScheduleArgs {
    #[arg(value_name = "REQUEST", required = true, num_args = 1.., help = "Meeting request")]
    pub request: Vec<String>,

    #[arg(
        short = 'o',
        long,
        value_name = "EMAIL",
        help = "Organizer email, added to the attendees"
    )]
    pub organizer: String,
}

impl ScheduleArgs {
    pub fn request_text(&self) -> String {
        self.request.join(" ")
    }
}

#[derive(Parser, Debug, Clone)]
pub struct HealthArgs {
    #[arg(long, help = "Also print the effective configuration")]
    pub show_config: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_ask_joins_words() {
        let args = CliArgs::parse_from([
            "meetdesk",
            "ask",
            "Schedule",
            "a",
            "meeting",
            "with",
            "John Doe",
        ]);
        match args.command {
            Commands::Ask(ask) => {
                assert_eq!(ask.prompt_text(), "Schedule a meeting with John Doe");
            }
            _ => panic!("Expected Ask command"),
        }
        assert_eq!(args.format, OutputFormatArg::Human);
    }

    #[test]
    fn test_ask_requires_prompt() {
        assert!(CliArgs::try_parse_from(["meetdesk", "ask"]).is_err());
    }

    #[test]
    fn test_schedule_requires_organizer() {
        assert!(CliArgs::try_parse_from(["meetdesk", "schedule", "Meet John"]).is_err());

        let args = CliArgs::parse_from([
            "meetdesk",
            "schedule",
            "--organizer",
            "me@corp.com",
            "Meet John Doe at 2pm",
        ]);
        match args.command {
            Commands::Schedule(schedule) => {
                assert_eq!(schedule.organizer, "me@corp.com");
                assert_eq!(schedule.request_text(), "Meet John Doe at 2pm");
            }
            _ => panic!("Expected Schedule command"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = CliArgs::parse_from([
            "meetdesk",
            "health",
            "--format",
            "json",
            "--clients-file",
            "/tmp/clients.json",
            "--config",
            "/tmp/meetdesk.toml",
        ]);

        assert_eq!(args.format, OutputFormatArg::Json);
        assert_eq!(args.clients_file, Some(PathBuf::from("/tmp/clients.json")));
        assert_eq!(args.config, Some(PathBuf::from("/tmp/meetdesk.toml")));
    }

    #[test]
    fn test_requested_log_level() {
        let args = CliArgs::parse_from(["meetdesk", "-v", "chat"]);
        assert_eq!(args.requested_log_level(), Some("debug"));

        let args = CliArgs::parse_from(["meetdesk", "-q", "chat"]);
        assert_eq!(args.requested_log_level(), Some("error"));

        let args = CliArgs::parse_from(["meetdesk", "--log-level", "trace", "-v", "chat"]);
        assert_eq!(args.requested_log_level(), Some("trace"));

        let args = CliArgs::parse_from(["meetdesk", "chat"]);
        assert_eq!(args.requested_log_level(), None);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(CliArgs::try_parse_from(["meetdesk", "-q", "-v", "chat"]).is_err());
    }
}
