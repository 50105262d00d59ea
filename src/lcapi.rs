//! Narrow seams to the outside world: where reports are delivered and where repositories are
//! listed from. The core never retries through these; a failure is an ordinary error result.

pub mod delivery;
pub mod github;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{DailyRecord, JobKind, ProblemReminder, Repository, WeeklyReport};

pub use delivery::{DiscordDelivery, LogDelivery};
pub use github::GitHubClient;

/// Data handed to a [`ReportDelivery`] for one notification.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ReportPayload {
    DailySummary(DailyRecord),
    WeeklyReport(WeeklyReport),
    ProblemReminder(ProblemReminder),
}

impl ReportPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::DailySummary(_) => JobKind::DailySummary,
            Self::WeeklyReport(_) => JobKind::WeeklyReport,
            Self::ProblemReminder(_) => JobKind::ProblemReminder,
        }
    }
}

impl fmt::Display for ReportPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DailySummary(record) => record.fmt(f),
            Self::WeeklyReport(report) => report.fmt(f),
            Self::ProblemReminder(reminder) => reminder.fmt(f),
        }
    }
}

/// Sends a report to a recipient (email address, chat channel, ...).
#[async_trait]
pub trait ReportDelivery: Send + Sync {
    async fn deliver(&self, recipient: &str, payload: &ReportPayload) -> Result<()>;
}

/// Lists repositories for the credential it was built with.
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Login name of the account behind the credential.
    async fn login(&self) -> Result<String>;

    async fn list_repositories(&self) -> Result<Vec<Repository>>;
}
