pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{
    AskArgs, ChatArgs, CliArgs, Commands, HealthArgs, OutputFormatArg, ScheduleArgs,
};
pub use output::{HealthReport, HealthStatus, OutputFormat, OutputFormatter};
