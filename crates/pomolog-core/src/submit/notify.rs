//! Notification relay -- post a summary of each stored batch.
//!
//! The relay is fire-and-forget from the timer's point of view: it runs
//! after a batch is safely stored and its failure never undoes the store.

use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::json;

use crate::error::NotifyError;
use crate::session::SessionRecord;

/// Something that can deliver a human-readable summary.
pub trait Notifier {
    fn notify(&self, summary: &str) -> Result<(), NotifyError>;
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&self, summary: &str) -> Result<(), NotifyError> {
        (**self).notify(summary)
    }
}

/// Used when no relay is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _summary: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Posts `{"subject", "text"}` JSON to an HTTP relay which forwards it as
/// an e-mail.
pub struct WebhookNotifier {
    webhook_url: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self, NotifyError> {
        let webhook_url = webhook_url.into();
        if webhook_url.trim().is_empty() {
            return Err(NotifyError::NotConfigured);
        }
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            webhook_url,
            client,
        })
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, summary: &str) -> Result<(), NotifyError> {
        let subject = summary.lines().next().unwrap_or("Sessions recorded");
        let body = json!({ "subject": subject, "text": summary });

        let resp = self.client.post(&self.webhook_url).json(&body).send()?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.text().unwrap_or_default();
            Err(NotifyError::Http {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Summary text: a heading line, then one line per record.
pub fn summarize(records: &[SessionRecord]) -> String {
    let work_minutes: f64 = records
        .iter()
        .filter(|r| r.is_work())
        .map(|r| r.elapsed_minutes)
        .sum();
    let mut out = format!(
        "{} session(s) recorded, {} Work minute(s)",
        records.len(),
        work_minutes
    );
    for r in records {
        out.push('\n');
        out.push_str(&format!("{} {} min", r.phase_kind, r.elapsed_minutes));
        let mut details = Vec::new();
        if !r.category.is_empty() {
            details.push(r.category.clone());
        }
        if r.focus_rating.is_rated() {
            details.push(format!("focus {}/5", r.focus_rating.value()));
        }
        if !details.is_empty() {
            out.push_str(&format!(" ({})", details.join(", ")));
        }
        out.push_str(&format!(
            " {}-{}",
            r.start_time.format("%H:%M"),
            r.end_time.format("%H:%M")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FocusRating;
    use crate::timer::PhaseKind;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn records() -> Vec<SessionRecord> {
        let end = Utc.with_ymd_and_hms(2025, 5, 24, 9, 30, 0).unwrap();
        vec![
            SessionRecord {
                start_time: end - ChronoDuration::minutes(30),
                end_time: end,
                elapsed_minutes: 30.0,
                phase_kind: PhaseKind::Work,
                focus_rating: FocusRating::new(4).unwrap(),
                category: "Job".into(),
            },
            SessionRecord {
                start_time: end,
                end_time: end + ChronoDuration::minutes(5),
                elapsed_minutes: 5.0,
                phase_kind: PhaseKind::Rest,
                focus_rating: FocusRating::UNRATED,
                category: String::new(),
            },
        ]
    }

    #[test]
    fn summary_lists_every_record() {
        let text = summarize(&records());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "2 session(s) recorded, 30 Work minute(s)");
        assert_eq!(lines[1], "Work 30 min (Job, focus 4/5) 09:00-09:30");
        assert_eq!(lines[2], "Rest 5 min 09:30-09:35");
    }

    #[test]
    fn empty_url_is_not_configured() {
        assert!(matches!(
            WebhookNotifier::new("  "),
            Err(NotifyError::NotConfigured)
        ));
    }

    #[test]
    fn webhook_posts_summary() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/relay")
            .match_body(mockito::Matcher::PartialJson(json!({
                "subject": "2 session(s) recorded, 30 Work minute(s)"
            })))
            .with_status(202)
            .create();

        let notifier = WebhookNotifier::new(format!("{}/relay", server.url())).unwrap();
        notifier.notify(&summarize(&records())).unwrap();
        mock.assert();
    }

    #[test]
    fn webhook_reports_http_failure() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/relay")
            .with_status(502)
            .with_body("smtp down")
            .create();

        let notifier = WebhookNotifier::new(format!("{}/relay", server.url())).unwrap();
        match notifier.notify("hello") {
            Err(NotifyError::Http { status, body }) => {
                assert_eq!(status, 502);
                assert_eq!(body, "smtp down");
            }
            other => panic!("Expected Http error, got {other:?}"),
        }
    }
}
