//! Job bindings: registration helpers that tie a report generator and a delivery collaborator
//! to a trigger, plus manual one-shot variants of each job.

use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use anyhow::{Context, anyhow};
use regex::Regex;

use crate::error::{LcError, LcResult};
use crate::lcapi::{GitHubClient, ReportDelivery, ReportPayload, RepositorySource};
use crate::lcdb::{PreferencesStore, StatisticsStore};
use crate::lcreport::{self, backup};
use crate::lcsched::registry::{ReminderFrequency, ScheduledJob, Trigger, job_action, parse_time};
use crate::lcsched::{Clock, Scheduler, system_clock};
use crate::models::{BackupOutcome, JobKind};

static USER_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap_or_else(|err| panic!("user id pattern: {err}"))
});

/// Rejects anything that does not look like an email address.
pub fn validate_user_id(user_id: &str) -> LcResult<()> {
    if USER_ID.is_match(user_id) {
        Ok(())
    } else {
        Err(LcError::config(format!("'{user_id}' is not a valid user identifier")))
    }
}

/// Keeps only the last four characters of a credential.
pub fn redact(secret: &str) -> String {
    let chars: Vec<char> = secret.trim().chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("****{tail}")
}

/// Everything a job action needs, cheaply cloneable into each action closure.
#[derive(Clone)]
pub struct Notifier {
    stats: Arc<StatisticsStore>,
    prefs: Arc<PreferencesStore>,
    delivery: Arc<dyn ReportDelivery>,
    backup_dir: PathBuf,
    clock: Clock,
}

impl Notifier {
    pub fn new(
        stats: Arc<StatisticsStore>,
        prefs: Arc<PreferencesStore>,
        delivery: Arc<dyn ReportDelivery>,
        backup_dir: impl Into<PathBuf>,
    ) -> Self {
        Self { stats, prefs, delivery, backup_dir: backup_dir.into(), clock: system_clock() }
    }

    /// Report dates are taken from `clock` instead of the system time.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn stats(&self) -> &StatisticsStore {
        &self.stats
    }

    pub fn prefs(&self) -> &PreferencesStore {
        &self.prefs
    }

    pub fn schedule_daily_summary(&self, scheduler: &Scheduler, user_id: &str, send_time: &str) -> LcResult<()> {
        validate_user_id(user_id)?;
        let trigger = Trigger::daily(send_time)?;

        let notifier = self.clone();
        let user = user_id.to_string();
        self.register(scheduler, JobKind::DailySummary, user_id, trigger, move || {
            let notifier = notifier.clone();
            let user = user.clone();
            async move { notifier.send_daily_summary(&user).await }
        });
        Ok(())
    }

    pub fn schedule_weekly_report(
        &self,
        scheduler: &Scheduler,
        user_id: &str,
        day: &str,
        send_time: &str,
    ) -> LcResult<()> {
        validate_user_id(user_id)?;
        let trigger = Trigger::weekly(day, send_time)?;

        let notifier = self.clone();
        let user = user_id.to_string();
        self.register(scheduler, JobKind::WeeklyReport, user_id, trigger, move || {
            let notifier = notifier.clone();
            let user = user.clone();
            async move { notifier.send_weekly_report(&user).await }
        });
        Ok(())
    }

    /// `frequency` is `daily`, `weekly` (Mondays) or `weekdays` (Monday to Friday).
    pub fn schedule_problem_reminder(
        &self,
        scheduler: &Scheduler,
        user_id: &str,
        frequency: &str,
        send_time: &str,
    ) -> LcResult<()> {
        validate_user_id(user_id)?;
        let frequency: ReminderFrequency = frequency.parse()?;
        let trigger = Trigger::new(parse_time(send_time)?, frequency.days());

        let notifier = self.clone();
        let user = user_id.to_string();
        self.register(scheduler, JobKind::ProblemReminder, user_id, trigger, move || {
            let notifier = notifier.clone();
            let user = user.clone();
            async move { notifier.send_problem_reminder(&user).await }
        });
        Ok(())
    }

    /// Daily backup of every repository the token can see.
    pub fn schedule_repository_backup(&self, scheduler: &Scheduler, token: &str, send_time: &str) -> LcResult<()> {
        parse_time(send_time)?;
        let client = GitHubClient::new(token)?;
        self.schedule_backup_from(scheduler, Arc::new(client), &redact(token), send_time)
    }

    /// Like [`Self::schedule_repository_backup`] with an arbitrary repository source.
    /// `label` is the job target shown in logs; it must not contain a secret.
    pub fn schedule_backup_from(
        &self,
        scheduler: &Scheduler,
        source: Arc<dyn RepositorySource>,
        label: &str,
        send_time: &str,
    ) -> LcResult<()> {
        let trigger = Trigger::daily(send_time)?;

        let notifier = self.clone();
        self.register(scheduler, JobKind::RepositoryBackup, label, trigger, move || {
            let notifier = notifier.clone();
            let source = Arc::clone(&source);
            async move {
                let outcome = notifier.backup_with(source.as_ref()).await;
                match outcome.error {
                    None if outcome.success => Ok(()),
                    error => Err(anyhow!(error.unwrap_or_else(|| String::from("backup failed")))),
                }
            }
        });
        Ok(())
    }

    pub async fn send_daily_summary(&self, user_id: &str) -> anyhow::Result<()> {
        let payload = lcreport::daily_summary(&self.stats, user_id, (self.clock)().date());
        self.deliver(user_id, payload).await
    }

    pub async fn send_weekly_report(&self, user_id: &str) -> anyhow::Result<()> {
        let payload = lcreport::weekly_report(&self.stats, user_id, (self.clock)().date());
        self.deliver(user_id, payload).await
    }

    pub async fn send_problem_reminder(&self, user_id: &str) -> anyhow::Result<()> {
        let payload = lcreport::problem_reminder(&self.stats, &self.prefs, user_id, (self.clock)().date());
        self.deliver(user_id, payload).await
    }

    /// Manual backup trigger. Never fails; a bad token comes back as a failed outcome.
    pub async fn backup_now(&self, token: &str) -> BackupOutcome {
        match GitHubClient::new(token) {
            Ok(client) => self.backup_with(&client).await,
            Err(err) => {
                log::error!("[Notifier::backup_now] Backup for {} not started: {err}", redact(token));
                BackupOutcome::failed(err.to_string())
            }
        }
    }

    pub async fn backup_with(&self, source: &dyn RepositorySource) -> BackupOutcome {
        backup::backup_repositories(source, &self.backup_dir, (self.clock)()).await
    }

    async fn deliver(&self, user_id: &str, payload: ReportPayload) -> anyhow::Result<()> {
        let kind = payload.kind();
        self.delivery
            .deliver(user_id, &payload)
            .await
            .with_context(|| format!("Delivering {kind} to {user_id}"))
    }

    fn register<F, Fut>(&self, scheduler: &Scheduler, kind: JobKind, target: &str, trigger: Trigger, action: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        log::info!("[Notifier::register] Scheduled {kind} for {target} {trigger}");
        scheduler.register(ScheduledJob::new(kind, target, trigger, job_action(action)));
    }
}
