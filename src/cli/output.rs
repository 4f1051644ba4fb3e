//! Output formatting for multiple formats
//!
//! Replies, scheduling drafts, health checks and configuration can be
//! printed as JSON, YAML or human-readable text.
//!
//! # Example
//!
//! ```ignore
//! use meetdesk::cli::output::{OutputFormat, OutputFormatter};
//!
//! let reply = assistant.handle("Schedule a meeting with John Doe").await;
//! let formatter = OutputFormatter::new(OutputFormat::Json);
//! println!("{}", formatter.format_reply(&reply)?);
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::assistant::{AssistantReply, ClientStatus};
use crate::config::AssistantConfig;
use crate::response::ResponseSource;
use crate::schedule::MeetingPlan;

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format
    Yaml,
    /// Human-readable formatted text
    Human,
}

/// Health status for one dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub available: bool,
    pub message: String,
    pub details: Option<String>,
}

impl HealthStatus {
    pub fn available(message: impl Into<String>) -> Self {
        Self {
            available: true,
            message: message.into(),
            details: None,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            available: false,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Health of every dependency, keyed by a display name
pub type HealthReport = BTreeMap<String, HealthStatus>;

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn format_reply(&self, reply: &AssistantReply) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(reply).context("Failed to serialize reply to JSON")
            }
            OutputFormat::Yaml => {
                serde_yaml::to_string(reply).context("Failed to serialize reply to YAML")
            }
            OutputFormat::Human => Ok(self.format_reply_human(reply)),
        }
    }

    pub fn format_plan(&self, plan: &MeetingPlan) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(plan)
                .context("Failed to serialize meeting plan to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(plan).context("Failed to serialize meeting plan to YAML")
            }
            OutputFormat::Human => Ok(self.format_plan_human(plan)),
        }
    }

    pub fn format_health(&self, report: &HealthReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report)
                .context("Failed to serialize health status to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(report).context("Failed to serialize health status to YAML")
            }
            OutputFormat::Human => Ok(self.format_health_human(report)),
        }
    }

    pub fn format_config(&self, config: &AssistantConfig) -> Result<String> {
        let config_map: BTreeMap<_, _> = config.to_display_map().into_iter().collect();
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&config_map)
                .context("Failed to serialize config to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(&config_map).context("Failed to serialize config to YAML")
            }
            OutputFormat::Human => Ok(config.to_string()),
        }
    }

    fn format_reply_human(&self, reply: &AssistantReply) -> String {
        let mut output = String::new();
        let name = reply.client_name.as_deref().unwrap_or("The person");

        if let Some(ref response) = reply.response {
            output.push_str("Response:\n");
            output.push_str(response.trim_end());
            output.push_str("\n\n");
        }

        output.push_str("Client Status:\n");
        match &reply.status {
            ClientStatus::Found { email } => {
                output.push_str(&format!("\u{2713} {} is a registered client\n", name));
                output.push_str(&format!("  Email: {}\n", email));
            }
            ClientStatus::NotFound => {
                output.push_str(&format!(
                    "\u{26A0} {} is not found in our client database\n",
                    name
                ));
            }
            ClientStatus::Rejected { reason } | ClientStatus::DirectoryUnavailable { reason } => {
                output.push_str(&format!("\u{2717} {}\n", reason));
            }
        }

        if let Some(ResponseSource::Fallback) = reply.source {
            output.push_str("\nNote: no language model answered, this is a standard reply.\n");
        }

        output
    }

    fn format_plan_human(&self, plan: &MeetingPlan) -> String {
        let mut output = String::new();

        output.push_str("\u{2713} Meeting Drafted\n");
        output.push_str(RULE);
        output.push_str("\n\n");

        output.push_str("Calendar Event:\n");
        output.push_str(&format!("\u{251C}\u{2500} Subject:   {}\n", plan.event.subject));
        output.push_str(&format!(
            "\u{251C}\u{2500} Start:     {}\n",
            plan.event.start.format("%Y-%m-%d %H:%M")
        ));
        output.push_str(&format!(
            "\u{251C}\u{2500} End:       {}\n",
            plan.event.end.format("%Y-%m-%d %H:%M")
        ));
        output.push_str(&format!(
            "\u{2514}\u{2500} Attendees: {}\n\n",
            plan.event.attendees.join(", ")
        ));

        output.push_str("Invitation Email:\n");
        output.push_str(&format!("\u{251C}\u{2500} To:      {}\n", plan.email.to));
        output.push_str(&format!("\u{2514}\u{2500} Subject: {}\n\n", plan.email.subject));
        for line in plan.email.body.lines() {
            output.push_str(&format!("    {}\n", line));
        }

        output.push_str(&format!("\nDetails read by {}\n", plan.model));
        output
    }

    fn format_health_human(&self, report: &HealthReport) -> String {
        let mut output = String::new();

        output.push_str("Health Status\n");
        output.push_str(RULE);
        output.push_str("\n\n");

        for (name, status) in report {
            let symbol = if status.available {
                "\u{2713}"
            } else {
                "\u{2717}"
            };

            output.push_str(&format!("{} {}\n", symbol, name));
            output.push_str(&format!(
                "  Status: {}\n",
                if status.available {
                    "Available"
                } else {
                    "Unavailable"
                }
            ));
            output.push_str(&format!("  Message: {}\n", status.message));
            if let Some(ref details) = status.details {
                output.push_str(&format!("  Details: {}\n", details));
            }
            output.push('\n');
        }

        output
    }
}
