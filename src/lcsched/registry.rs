use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{Datelike, NaiveDateTime, NaiveTime, TimeDelta, Weekday};

use crate::error::{LcError, LcResult};
use crate::models::JobKind;

pub type JobFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// What a job does when it fires. Called once per due occurrence.
pub type JobAction = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// Wraps an async closure into a [`JobAction`].
pub fn job_action<F, Fut>(f: F) -> JobAction
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || -> JobFuture { Box::pin(f()) })
}

/// Parses a full, case-insensitive English weekday name.
pub fn parse_weekday(name: &str) -> LcResult<Weekday> {
    match name.trim().to_ascii_lowercase().as_str() {
        "monday" => Ok(Weekday::Mon),
        "tuesday" => Ok(Weekday::Tue),
        "wednesday" => Ok(Weekday::Wed),
        "thursday" => Ok(Weekday::Thu),
        "friday" => Ok(Weekday::Fri),
        "saturday" => Ok(Weekday::Sat),
        "sunday" => Ok(Weekday::Sun),
        other => Err(LcError::config(format!("unknown weekday '{other}'"))),
    }
}

/// Parses a 24-hour `HH:MM` wall-clock time.
pub fn parse_time(time: &str) -> LcResult<NaiveTime> {
    NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .map_err(|_| LcError::config(format!("invalid time '{time}', expected HH:MM")))
}

/// Which days a trigger is allowed to fire on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaySpec {
    Every,
    On(Weekday),
    AnyOf(Vec<Weekday>),
}

impl DaySpec {
    /// Monday through Friday.
    pub fn weekdays() -> Self {
        Self::AnyOf(vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri])
    }

    pub fn matches(&self, day: Weekday) -> bool {
        match self {
            Self::Every => true,
            Self::On(only) => *only == day,
            Self::AnyOf(days) => days.contains(&day),
        }
    }
}

/// How often a problem reminder goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderFrequency {
    Daily,
    /// Mondays only.
    Weekly,
    /// Monday to Friday.
    Weekdays,
}

impl ReminderFrequency {
    pub fn days(self) -> DaySpec {
        match self {
            Self::Daily => DaySpec::Every,
            Self::Weekly => DaySpec::On(Weekday::Mon),
            Self::Weekdays => DaySpec::weekdays(),
        }
    }
}

impl FromStr for ReminderFrequency {
    type Err = LcError;

    fn from_str(s: &str) -> LcResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "weekdays" => Ok(Self::Weekdays),
            other => Err(LcError::config(format!(
                "unknown reminder frequency '{other}', expected daily, weekly or weekdays"
            ))),
        }
    }
}

/// A wall-clock time of day, optionally restricted to certain weekdays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub at: NaiveTime,
    pub days: DaySpec,
}

impl Trigger {
    pub fn new(at: NaiveTime, days: DaySpec) -> Self {
        Self { at, days }
    }

    pub fn daily(time: &str) -> LcResult<Self> {
        Ok(Self::new(parse_time(time)?, DaySpec::Every))
    }

    pub fn weekly(day: &str, time: &str) -> LcResult<Self> {
        Ok(Self::new(parse_time(time)?, DaySpec::On(parse_weekday(day)?)))
    }

    /// The latest occurrence `T` with `since < T <= now`, if any.
    pub fn due_occurrence(&self, since: NaiveDateTime, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if since >= now {
            return None;
        }
        since
            .date()
            .iter_days()
            .take_while(|date| *date <= now.date())
            .filter(|date| self.days.matches(date.weekday()))
            .map(|date| date.and_time(self.at))
            .filter(|occurrence| since < *occurrence && *occurrence <= now)
            .last()
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = self.at.format("%H:%M");
        match &self.days {
            DaySpec::Every => write!(f, "every day at {at}"),
            DaySpec::On(day) => write!(f, "every {day:?} at {at}"),
            DaySpec::AnyOf(days) => write!(f, "{days:?} at {at}"),
        }
    }
}

/// A registered unit of scheduled work. Immutable once built.
pub struct ScheduledJob {
    pub kind: JobKind,
    /// User identifier, or a redacted credential for backups.
    pub target: String,
    pub trigger: Trigger,
    action: JobAction,
}

impl ScheduledJob {
    pub fn new(kind: JobKind, target: impl Into<String>, trigger: Trigger, action: JobAction) -> Self {
        Self { kind, target: target.into(), trigger, action }
    }
}

impl fmt::Debug for ScheduledJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledJob")
            .field("kind", &self.kind)
            .field("target", &self.target)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

/// Read-only view of a registered job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub kind: JobKind,
    pub target: String,
    pub trigger: Trigger,
    pub last_fired: Option<NaiveDateTime>,
}

struct Entry {
    job: ScheduledJob,
    last_fired: Option<NaiveDateTime>,
}

/// Registered jobs plus the bookkeeping that makes each occurrence fire once.
pub struct JobRegistry {
    tick: TimeDelta,
    entries: Mutex<Vec<Entry>>,
    last_check: Mutex<Option<NaiveDateTime>>,
}

impl JobRegistry {
    /// `tick` is how often [`JobRegistry::run_pending`] will be called.
    pub fn new(tick: Duration) -> Self {
        let tick = TimeDelta::from_std(tick).unwrap_or_else(|_| TimeDelta::seconds(60));
        Self { tick, entries: Mutex::new(Vec::new()), last_check: Mutex::new(None) }
    }

    /// Adds a job. Existing jobs for the same kind and target are kept alongside it.
    pub fn register(&self, job: ScheduledJob) {
        log::debug!("[JobRegistry::register] {} for {} ({})", job.kind, job.target, job.trigger);
        self.lock().push(Entry { job, last_fired: None });
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn jobs(&self) -> Vec<JobSummary> {
        self.lock()
            .iter()
            .map(|entry| JobSummary {
                kind: entry.job.kind,
                target: entry.job.target.clone(),
                trigger: entry.job.trigger.clone(),
                last_fired: entry.last_fired,
            })
            .collect()
    }

    /// Runs every job with an occurrence since the previous check, one after another. Returns
    /// how many jobs fired.
    ///
    /// The look-back reaches at most two ticks behind `now` (one tick on the first check), so
    /// occurrences lost to a long pause are not caught up. Failures and panics in a job are
    /// logged and do not affect the other jobs.
    pub async fn run_pending(&self, now: NaiveDateTime) -> usize {
        let since = self.advance_check(now);

        let due: Vec<(JobKind, String, JobAction)> = {
            let mut entries = self.lock();
            entries
                .iter_mut()
                .filter_map(|entry| {
                    let occurrence = entry.job.trigger.due_occurrence(since, now)?;
                    if entry.last_fired == Some(occurrence) {
                        return None;
                    }
                    entry.last_fired = Some(occurrence);
                    Some((entry.job.kind, entry.job.target.clone(), Arc::clone(&entry.job.action)))
                })
                .collect()
        };

        let fired = due.len();
        for (kind, target, action) in due {
            run_job(kind, &target, action).await;
        }

        fired
    }

    /// Records `now` as the latest check and returns the start of the look-back.
    fn advance_check(&self, now: NaiveDateTime) -> NaiveDateTime {
        let mut last_check = self.last_check.lock().unwrap_or_else(PoisonError::into_inner);
        let floor = now - self.tick * 2;
        let since = match *last_check {
            Some(previous) => previous.max(floor),
            None => now - self.tick,
        };
        *last_check = Some(now);
        since
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs one action on its own task so a panic is contained. Returns whether it succeeded.
async fn run_job(kind: JobKind, target: &str, action: JobAction) -> bool {
    log::debug!("[run_job] Running {kind} for {target}");

    match tokio::spawn(async move { action().await }).await {
        Ok(Ok(())) => {
            log::info!("[run_job] {kind} for {target} completed");
            true
        }
        Ok(Err(err)) => {
            log::error!("[run_job] {kind} for {target} failed: {err:#}");
            false
        }
        Err(err) => {
            log::error!("[run_job] {kind} for {target} panicked: {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn counting_action(counter: &Arc<AtomicUsize>) -> JobAction {
        let counter = Arc::clone(counter);
        job_action(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[test]
    fn weekday_names_are_parsed_strictly() {
        assert_eq!(parse_weekday("Sunday").unwrap(), Weekday::Sun);
        assert_eq!(parse_weekday(" MONDAY ").unwrap(), Weekday::Mon);
        assert!(parse_weekday("mon").unwrap_err().is_config());
        assert!(parse_weekday("funday").unwrap_err().is_config());
    }

    #[test]
    fn times_must_be_hh_mm() {
        assert_eq!(parse_time("09:00").unwrap(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert!(parse_time("25:00").is_err());
        assert!(parse_time("nine").is_err());
        assert!(Trigger::weekly("someday", "19:00").is_err());
    }

    #[test]
    fn reminder_frequencies() {
        assert_eq!("daily".parse::<ReminderFrequency>().unwrap().days(), DaySpec::Every);
        assert_eq!("Weekly".parse::<ReminderFrequency>().unwrap().days(), DaySpec::On(Weekday::Mon));
        assert!(!"weekdays".parse::<ReminderFrequency>().unwrap().days().matches(Weekday::Sat));
        assert!("hourly".parse::<ReminderFrequency>().unwrap_err().is_config());
    }

    #[test]
    fn occurrence_is_due_after_since_up_to_now() {
        let trigger = Trigger::daily("09:00").unwrap();
        let since = at("2026-06-01", "08:59:00");

        assert_eq!(trigger.due_occurrence(since, at("2026-06-01", "08:59:59")), None);
        assert_eq!(
            trigger.due_occurrence(since, at("2026-06-01", "09:00:00")),
            Some(at("2026-06-01", "09:00:00"))
        );
        assert!(trigger.due_occurrence(since, at("2026-06-01", "09:00:59")).is_some());
        // `since` itself is excluded.
        assert_eq!(trigger.due_occurrence(at("2026-06-01", "09:00:00"), at("2026-06-01", "09:01:00")), None);
        assert_eq!(trigger.due_occurrence(at("2026-06-01", "09:00:00"), at("2026-06-01", "08:00:00")), None);
    }

    #[test]
    fn look_back_straddling_midnight_finds_previous_day() {
        let trigger = Trigger::weekly("sunday", "23:59").unwrap();
        // 2026-06-07 is a Sunday.
        assert_eq!(
            trigger.due_occurrence(at("2026-06-07", "23:58:30"), at("2026-06-08", "00:00:30")),
            Some(at("2026-06-07", "23:59:00"))
        );
    }

    #[test]
    fn weekly_trigger_only_fires_on_its_day() {
        let trigger = Trigger::weekly("sunday", "19:00").unwrap();
        assert!(trigger.due_occurrence(at("2026-06-07", "18:59:10"), at("2026-06-07", "19:00:10")).is_some());
        assert!(trigger.due_occurrence(at("2026-06-08", "18:59:10"), at("2026-06-08", "19:00:10")).is_none());
    }

    #[tokio::test]
    async fn late_tick_still_sees_occurrence_since_previous_check() {
        let registry = JobRegistry::new(Duration::from_secs(60));
        let counter = Arc::new(AtomicUsize::new(0));
        registry.register(ScheduledJob::new(
            JobKind::DailySummary,
            "a@example.com",
            Trigger::daily("09:01").unwrap(),
            counting_action(&counter),
        ));

        // A slow job held the previous tick; this one lands 90 seconds later.
        assert_eq!(registry.run_pending(at("2026-06-01", "09:00:40")).await, 0);
        assert_eq!(registry.run_pending(at("2026-06-01", "09:02:10")).await, 1);
        assert_eq!(registry.run_pending(at("2026-06-01", "09:03:10")).await, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fires_once_per_occurrence_over_two_days() {
        let registry = JobRegistry::new(Duration::from_secs(60));
        let counter = Arc::new(AtomicUsize::new(0));
        registry.register(ScheduledJob::new(
            JobKind::DailySummary,
            "a@example.com",
            Trigger::daily("09:00").unwrap(),
            counting_action(&counter),
        ));

        let start = at("2026-06-01", "08:55:30");
        let mut fired_at = Vec::new();
        for tick in 0..(2 * 24 * 60) {
            let now = start + TimeDelta::seconds(60 * tick);
            if registry.run_pending(now).await > 0 {
                fired_at.push(now);
            }
        }

        assert_eq!(fired_at, vec![at("2026-06-01", "09:00:30"), at("2026-06-02", "09:00:30")]);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn repeated_tick_inside_window_does_not_refire() {
        let registry = JobRegistry::new(Duration::from_secs(60));
        let counter = Arc::new(AtomicUsize::new(0));
        registry.register(ScheduledJob::new(
            JobKind::ProblemReminder,
            "a@example.com",
            Trigger::daily("09:00").unwrap(),
            counting_action(&counter),
        ));

        assert_eq!(registry.run_pending(at("2026-06-01", "09:00:05")).await, 1);
        assert_eq!(registry.run_pending(at("2026-06-01", "09:00:45")).await, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(registry.jobs()[0].last_fired, Some(at("2026-06-01", "09:00:00")));
    }

    #[tokio::test]
    async fn delayed_tick_does_not_catch_up() {
        let registry = JobRegistry::new(Duration::from_secs(60));
        let counter = Arc::new(AtomicUsize::new(0));
        registry.register(ScheduledJob::new(
            JobKind::DailySummary,
            "a@example.com",
            Trigger::daily("09:00").unwrap(),
            counting_action(&counter),
        ));

        registry.run_pending(at("2026-06-01", "08:59:30")).await;
        registry.run_pending(at("2026-06-01", "09:05:30")).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn re_registering_accumulates_triggers() {
        let registry = JobRegistry::new(Duration::from_secs(60));
        let counter = Arc::new(AtomicUsize::new(0));
        for time in ["09:00", "09:00", "18:00"] {
            registry.register(ScheduledJob::new(
                JobKind::DailySummary,
                "a@example.com",
                Trigger::daily(time).unwrap(),
                counting_action(&counter),
            ));
        }

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.run_pending(at("2026-06-01", "09:00:00")).await, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failing_and_panicking_jobs_do_not_stop_others() {
        let registry = JobRegistry::new(Duration::from_secs(60));
        let counter = Arc::new(AtomicUsize::new(0));
        let trigger = Trigger::daily("07:30").unwrap();

        let failing = job_action(|| async { Err(anyhow::anyhow!("smtp down")) });
        let panicking = job_action(|| async { panic!("boom") });

        registry.register(ScheduledJob::new(JobKind::DailySummary, "a", trigger.clone(), failing));
        registry.register(ScheduledJob::new(JobKind::WeeklyReport, "b", trigger.clone(), panicking));
        registry.register(ScheduledJob::new(JobKind::ProblemReminder, "c", trigger, counting_action(&counter)));

        let now = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap().and_hms_opt(7, 30, 0).unwrap();
        assert_eq!(registry.run_pending(now).await, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn job_debug_hides_action() {
        let job = ScheduledJob::new(
            JobKind::RepositoryBackup,
            "****abcd",
            Trigger::daily("02:00").unwrap(),
            job_action(|| async { Ok(()) }),
        );
        let debug = format!("{job:?}");
        assert!(debug.contains("RepositoryBackup"));
        assert!(debug.contains("****abcd"));
    }
}
