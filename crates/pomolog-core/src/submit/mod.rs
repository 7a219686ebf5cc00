pub mod coordinator;
pub mod notify;

pub use coordinator::{complete, prepare, submit, Submission, SubmissionOutcome};
pub use notify::{summarize, NoopNotifier, Notifier, WebhookNotifier};
