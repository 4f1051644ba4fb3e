use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::directory::ClientRecord;

pub const DEFAULT_DURATION_MINUTES: u32 = 60;
pub const INVITATION_SUBJECT: &str = "Meeting Invitation";

/// What the request asks for, after the model has read it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeetingDetails {
    pub client_name: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: u32,
}

impl MeetingDetails {
    pub fn start(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    pub fn end(&self) -> NaiveDateTime {
        self.start() + Duration::minutes(i64::from(self.duration_minutes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEventDraft {
    pub subject: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub attendees: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailDraft {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Everything needed to book the meeting; nothing has been sent yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeetingPlan {
    pub client: ClientRecord,
    pub organizer: String,
    pub details: MeetingDetails,
    pub event: CalendarEventDraft,
    pub email: EmailDraft,
    pub model: String,
}

impl MeetingPlan {
    pub fn new(
        client: ClientRecord,
        organizer: impl Into<String>,
        details: MeetingDetails,
        model: impl Into<String>,
    ) -> Self {
        let organizer = organizer.into();

        let event = CalendarEventDraft {
            subject: format!("Meeting with {}", client.name),
            start: details.start(),
            end: details.end(),
            attendees: vec![organizer.clone(), client.email.clone()],
        };

        let email = EmailDraft {
            to: client.email.clone(),
            subject: INVITATION_SUBJECT.to_string(),
            body: format!(
                "Meeting Details:\nDate: {}\nTime: {}\nDuration: {} minutes\nOrganizer: {}\n",
                details.date.format("%Y-%m-%d"),
                details.time.format("%H:%M"),
                details.duration_minutes,
                organizer
            ),
        };

        Self {
            client,
            organizer,
            details,
            event,
            email,
            model: model.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(time: (u32, u32), duration_minutes: u32) -> MeetingDetails {
        MeetingDetails {
            client_name: Some("John Doe".to_string()),
            date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            time: NaiveTime::from_hms_opt(time.0, time.1, 0).unwrap(),
            duration_minutes,
        }
    }

    #[test]
    fn test_end_is_start_plus_duration() {
        let details = details((14, 0), 45);
        assert_eq!(details.end() - details.start(), Duration::minutes(45));
    }

    #[test]
    fn test_end_rolls_over_midnight() {
        let details = details((23, 30), 60);
        assert_eq!(
            details.end(),
            NaiveDate::from_ymd_opt(2024, 5, 3)
                .unwrap()
                .and_hms_opt(0, 30, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_plan_drafts() {
        let plan = MeetingPlan::new(
            ClientRecord::new("John Doe", "john@x.com"),
            "me@corp.com",
            details((9, 15), 30),
            "gemma:2b",
        );

        assert_eq!(plan.event.subject, "Meeting with John Doe");
        assert_eq!(plan.event.attendees, vec!["me@corp.com", "john@x.com"]);
        assert_eq!(plan.email.to, "john@x.com");
        assert_eq!(plan.email.subject, INVITATION_SUBJECT);
        assert!(plan.email.body.contains("Date: 2024-05-02"));
        assert!(plan.email.body.contains("Time: 09:15"));
        assert!(plan.email.body.contains("Duration: 30 minutes"));
    }
}
