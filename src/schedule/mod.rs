//! Meeting scheduling drafts
//!
//! [`MeetingPlanner`] reads a request such as "Schedule a meeting with John
//! Doe tomorrow at 2 PM for 30 minutes", resolves the client through the
//! directory and drafts a calendar event plus an invitation email. Nothing
//! is delivered; the caller decides what to do with the drafts.

mod types;

pub use types::{
    CalendarEventDraft, EmailDraft, MeetingDetails, MeetingPlan, DEFAULT_DURATION_MINUTES,
    INVITATION_SUBJECT,
};

use std::sync::{Arc, OnceLock};

use chrono::{Local, NaiveDate, NaiveTime};
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::directory::{ClientDirectory, LookupOutcome};
use crate::extract::{is_plausible_name, NameExtractor};
use crate::llm::parse::extract_json_object;
use crate::llm::{
    retry_with_timeout, BackendError, ChatMessage, LLMClient, LLMRequest, RetryPolicy,
};

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("organizer email {0:?} is not a valid address")]
    InvalidOrganizer(String),

    #[error("meeting request is empty")]
    EmptyRequest,

    #[error("no completion model is available to read the request")]
    NoModelAvailable,

    #[error("could not read meeting details: {0}")]
    Details(String),

    #[error("could not tell who the meeting is with")]
    MissingClientName,

    #[error("{name} is not in the client database")]
    ClientNotFound { name: String },

    #[error("client lookup failed: {reason}")]
    Directory { reason: String },
}

fn email_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid"))
}

pub fn is_valid_email(address: &str) -> bool {
    email_pattern().is_match(address)
}

/// Model reply, before validation
#[derive(Debug, Deserialize)]
struct RawDetails {
    #[serde(default)]
    client_name: Option<String>,
    meeting_date: String,
    meeting_time: String,
    #[serde(default)]
    duration: Option<serde_json::Value>,
}

/// Accepts `14:00`, `14:00:00`, `2:30 PM`, `2PM` and similar
fn parse_time(raw: &str) -> Option<NaiveTime> {
    let text = raw.trim().to_ascii_uppercase();
    for format in ["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p"] {
        if let Ok(time) = NaiveTime::parse_from_str(&text, format) {
            return Some(time);
        }
    }

    let split = text.find(|c: char| !c.is_ascii_digit())?;
    let (hour, meridiem) = text.split_at(split);
    let hour: u32 = hour.parse().ok()?;
    if !(1..=12).contains(&hour) {
        return None;
    }
    let hour = match meridiem.trim() {
        "AM" => hour % 12,
        "PM" => hour % 12 + 12,
        _ => return None,
    };
    NaiveTime::from_hms_opt(hour, 0, 0)
}

fn parse_duration(raw: Option<&serde_json::Value>) -> u32 {
    let minutes = match raw {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s
            .split_whitespace()
            .next()
            .and_then(|n| n.parse::<u64>().ok()),
        _ => None,
    };
    match minutes.and_then(|m| u32::try_from(m).ok()) {
        Some(0) | None => DEFAULT_DURATION_MINUTES,
        Some(m) => m,
    }
}

fn parse_details(content: &str) -> Result<MeetingDetails, BackendError> {
    let invalid = |message: String| BackendError::InvalidResponse {
        message,
        raw_response: Some(content.to_string()),
    };

    let json = extract_json_object(content).map_err(|e| invalid(e.to_string()))?;
    let raw: RawDetails = serde_json::from_str(&json)
        .map_err(|e| invalid(format!("bad meeting JSON: {}", e)))?;

    let date = NaiveDate::parse_from_str(raw.meeting_date.trim(), "%Y-%m-%d")
        .map_err(|e| invalid(format!("bad meeting_date {:?}: {}", raw.meeting_date, e)))?;
    let time = parse_time(&raw.meeting_time)
        .ok_or_else(|| invalid(format!("bad meeting_time {:?}", raw.meeting_time)))?;

    Ok(MeetingDetails {
        client_name: raw
            .client_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        date,
        time,
        duration_minutes: parse_duration(raw.duration.as_ref()),
    })
}

fn system_prompt(today: NaiveDate) -> String {
    format!(
        "You extract meeting details from scheduling requests. Today is {} ({}). \
         Respond with JSON only, in this exact shape: \
         {{\"client_name\": \"...\", \"meeting_date\": \"YYYY-MM-DD\", \"meeting_time\": \"HH:MM\", \"duration\": 60}}. \
         Use 24-hour time, resolve relative dates such as \"tomorrow\" against today, \
         and give the duration in minutes.",
        today.format("%Y-%m-%d"),
        today.format("%A")
    )
}

pub struct MeetingPlanner {
    client: Arc<dyn LLMClient>,
    models: Vec<String>,
    policy: RetryPolicy,
    today: Option<NaiveDate>,
}

impl MeetingPlanner {
    /// `models` should be names the endpoint serves, in preference order
    pub fn new(client: Arc<dyn LLMClient>, models: Vec<String>, policy: RetryPolicy) -> Self {
        Self {
            client,
            models,
            policy,
            today: None,
        }
    }

    /// Pins the date relative requests are resolved against
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    async fn read_details(&self, request: &str) -> Result<(MeetingDetails, String), ScheduleError> {
        if self.models.is_empty() {
            return Err(ScheduleError::NoModelAvailable);
        }

        let messages = vec![
            ChatMessage::system(system_prompt(self.today())),
            ChatMessage::user(request),
        ];
        let mut last_failure = String::new();

        for model in &self.models {
            let llm_request =
                LLMRequest::new(model.clone(), messages.clone()).with_temperature(0.0);
            let outcome = retry_with_timeout(&self.policy, model, |_| {
                let client = Arc::clone(&self.client);
                let llm_request = llm_request.clone();
                async move {
                    let response = client.chat(llm_request).await?;
                    parse_details(&response.content)
                }
            })
            .await;

            match outcome {
                Ok(details) => return Ok((details, model.clone())),
                Err(e) => {
                    warn!(model = %model, "Could not read meeting details: {}", e);
                    last_failure = e.to_string();
                }
            }
        }

        Err(ScheduleError::Details(last_failure))
    }

    /// Drafts the event and invitation for `request`
    ///
    /// The client name comes from the model's reply; when the model leaves it
    /// out (or returns something that is not a name) `extractor` is asked.
    pub async fn plan(
        &self,
        request: &str,
        organizer_email: &str,
        extractor: &NameExtractor,
        directory: &ClientDirectory,
    ) -> Result<MeetingPlan, ScheduleError> {
        let organizer = organizer_email.trim();
        if !is_valid_email(organizer) {
            return Err(ScheduleError::InvalidOrganizer(organizer.to_string()));
        }
        if request.trim().is_empty() {
            return Err(ScheduleError::EmptyRequest);
        }

        let (details, model) = self.read_details(request).await?;
        debug!(?details, model = %model, "Meeting details");

        let name = match details.client_name.as_deref().filter(|n| is_plausible_name(n)) {
            Some(name) => name.to_string(),
            None => extractor
                .extract(request)
                .await
                .map_err(|e| ScheduleError::Details(e.to_string()))?
                .name
                .ok_or(ScheduleError::MissingClientName)?,
        };

        let client = match directory.lookup(&name).await {
            LookupOutcome::Found { record, .. } => record,
            LookupOutcome::NotFound { .. } => return Err(ScheduleError::ClientNotFound { name }),
            LookupOutcome::Failed { reason } => return Err(ScheduleError::Directory { reason }),
        };

        let plan = MeetingPlan::new(client, organizer, details, model);
        info!(
            client = %plan.client.name,
            start = %plan.event.start,
            end = %plan.event.end,
            "Meeting drafted"
        );
        Ok(plan)
    }
}

impl std::fmt::Debug for MeetingPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeetingPlanner")
            .field("client", &self.client.name())
            .field("models", &self.models)
            .field("today", &self.today)
            .finish()
    }
}
