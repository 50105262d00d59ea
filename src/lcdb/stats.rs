use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{Local, NaiveDate, NaiveDateTime, TimeDelta};

use crate::error::LcResult;
use crate::lcdb;
use crate::models::{DailyRecord, DifficultyBreakdown, PeriodStats, SolutionPush, WeeklyReport};

/// Default window for [`StatisticsStore::period_stats`].
pub const DEFAULT_PERIOD_DAYS: u32 = 30;
/// Default retention for [`StatisticsStore::cleanup`].
pub const DEFAULT_RETENTION_DAYS: u32 = 90;
/// The weekly window reaches this many days back from its end date, inclusive at both ends.
pub const WEEKLY_LOOKBACK_DAYS: i64 = 7;

/// user id -> date -> record
pub type UserStatistics = BTreeMap<String, BTreeMap<NaiveDate, DailyRecord>>;

/// Per-user, per-day activity statistics.
///
/// A single store-wide lock serializes writers; readers always see whole records. Every
/// mutation is written through to disk while the write lock is held so file contents never go
/// backwards. Disk failures are logged and leave the in-memory state authoritative.
pub struct StatisticsStore {
    path: PathBuf,
    stats: RwLock<UserStatistics>,
}

impl StatisticsStore {
    /// Opens the store at `path`. A missing or corrupt file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stats: UserStatistics = lcdb::load_or_default(&path);
        log::info!(
            "[StatisticsStore::open] Loaded statistics for {} user(s) from {}",
            stats.len(),
            path.display()
        );

        Self { path, stats: RwLock::new(stats) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records a solution push for `user_id` at the current local time.
    ///
    /// Returns whether the store was persisted afterwards.
    pub fn record_push(&self, user_id: &str, push: &SolutionPush) -> bool {
        self.record_push_at(user_id, push, Local::now().naive_local())
    }

    pub fn record_push_at(&self, user_id: &str, push: &SolutionPush, at: NaiveDateTime) -> bool {
        let mut stats = self.write();

        let record = stats
            .entry(user_id.to_string())
            .or_default()
            .entry(at.date())
            .or_default();
        record.apply_push(push, at);

        log::info!(
            "[record_push] {user_id} pushed '{}' ({}, {}); {} solved on {}",
            push.title,
            push.difficulty,
            push.language,
            record.problems_solved,
            at.date()
        );

        self.persist(&stats)
    }

    /// The record for `date`, or an empty record if there is none.
    pub fn daily_summary(&self, user_id: &str, date: NaiveDate) -> DailyRecord {
        self.read()
            .get(user_id)
            .and_then(|records| records.get(&date))
            .cloned()
            .unwrap_or_default()
    }

    pub fn today_summary(&self, user_id: &str) -> DailyRecord {
        self.daily_summary(user_id, today())
    }

    /// Aggregates `[as_of - 7 days, as_of]`, both ends inclusive.
    ///
    /// Note the window spans eight calendar days.
    pub fn weekly_report(&self, user_id: &str, as_of: NaiveDate) -> WeeklyReport {
        let start_date = as_of - TimeDelta::days(WEEKLY_LOOKBACK_DAYS);
        let mut report = WeeklyReport {
            start_date,
            end_date: as_of,
            total_problems: 0,
            total_pushes: 0,
            languages_used: HashSet::new(),
            difficulties: DifficultyBreakdown::default(),
            daily_breakdown: BTreeMap::new(),
            solutions: Vec::new(),
        };

        let stats = self.read();
        let Some(records) = stats.get(user_id) else {
            return report;
        };

        for (date, record) in records.range(start_date..=as_of) {
            report.total_problems += record.problems_solved;
            report.total_pushes += record.total_pushes;
            report.languages_used.extend(record.languages_used.iter().cloned());
            report.difficulties.absorb(&record.difficulties);
            report.daily_breakdown.insert(*date, record.problems_solved);
            report.solutions.extend(record.solutions.iter().cloned());
        }

        report
    }

    /// Totals and streaks over the `days` calendar days ending at `as_of` (inclusive).
    ///
    /// The current streak is the run of active days ending at `as_of`, and is zero whenever
    /// `as_of` itself has no solves. A day without a record breaks a run.
    pub fn period_stats(&self, user_id: &str, days: u32, as_of: NaiveDate) -> PeriodStats {
        let mut stats = PeriodStats {
            period_days: days,
            total_problems: 0,
            total_pushes: 0,
            languages_used: HashSet::new(),
            difficulties: DifficultyBreakdown::default(),
            daily_data: BTreeMap::new(),
            current_streak: 0,
            longest_streak: 0,
        };

        if days == 0 {
            return stats;
        }

        let guard = self.read();
        let Some(records) = guard.get(user_id) else {
            return stats;
        };

        let start = as_of - TimeDelta::days(i64::from(days) - 1);
        let mut run = 0;
        for date in start.iter_days().take(days as usize) {
            let Some(record) = records.get(&date) else {
                run = 0;
                continue;
            };

            stats.total_problems += record.problems_solved;
            stats.total_pushes += record.total_pushes;
            stats.languages_used.extend(record.languages_used.iter().cloned());
            stats.difficulties.absorb(&record.difficulties);
            stats.daily_data.insert(date, record.problems_solved);

            if record.is_active() {
                run += 1;
                stats.longest_streak = stats.longest_streak.max(run);
            } else {
                run = 0;
            }
        }

        // The loop ends on `as_of`, so `run` is the streak reaching it (0 if it is inactive).
        stats.current_streak = run;
        stats
    }

    /// Deletes every record dated strictly before `today - retention_days`.
    ///
    /// Returns how many records were removed.
    pub fn cleanup(&self, retention_days: u32) -> usize {
        self.cleanup_at(retention_days, today())
    }

    pub fn cleanup_at(&self, retention_days: u32, today: NaiveDate) -> usize {
        let cutoff = today - TimeDelta::days(i64::from(retention_days));
        let mut stats = self.write();

        let mut removed = 0;
        for records in stats.values_mut() {
            let before = records.len();
            records.retain(|date, _| *date >= cutoff);
            removed += before - records.len();
        }

        if removed > 0 {
            self.persist(&stats);
            log::info!("[cleanup] Removed {removed} record(s) dated before {cutoff}");
        } else {
            log::debug!("[cleanup] Nothing older than {cutoff}");
        }

        removed
    }

    /// Users that have at least one record.
    pub fn users(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn snapshot(&self) -> UserStatistics {
        self.read().clone()
    }

    /// Writes the current state to disk.
    pub fn save(&self) -> LcResult<()> {
        lcdb::write_json(&self.path, &*self.read())
    }

    fn persist(&self, stats: &UserStatistics) -> bool {
        lcdb::write_json(&self.path, stats)
            .inspect_err(|err| log::error!("[StatisticsStore] Failed to save statistics: {err}"))
            .is_ok()
    }

    fn read(&self) -> RwLockReadGuard<'_, UserStatistics> {
        self.stats.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserStatistics> {
        self.stats.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;

    const USER: &str = "coder@example.com";

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn at(date: NaiveDate, hour: u32) -> NaiveDateTime {
        date.and_hms_opt(hour, 0, 0).unwrap()
    }

    fn push(difficulty: Difficulty, language: &str) -> SolutionPush {
        SolutionPush::new("Two Sum", difficulty, language, "https://leetcode.com/problems/two-sum")
    }

    fn store() -> (tempfile::TempDir, StatisticsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StatisticsStore::open(dir.path().join("daily_stats.json"));
        (dir, store)
    }

    #[test]
    fn pushes_accumulate_into_one_daily_record() {
        let (_dir, store) = store();
        let d = day("2026-03-10");

        for (i, lang) in ["python", "go", "python"].into_iter().enumerate() {
            assert!(store.record_push_at(USER, &push(Difficulty::Medium, lang), at(d, 9 + i as u32)));
        }

        let record = store.daily_summary(USER, d);
        assert_eq!(record.problems_solved, 3);
        assert_eq!(record.total_pushes, 3);
        assert_eq!(record.languages_used, HashSet::from(["python".into(), "go".into()]));
        assert_eq!(record.difficulties.medium, 3);
        assert_eq!(record.solutions.len(), 3);
        assert!(record.solutions.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn unknown_difficulty_is_dropped_from_breakdown() {
        let (_dir, store) = store();
        let d = day("2026-03-10");
        store.record_push_at(USER, &push(Difficulty::Unknown, "rust"), at(d, 9));

        let record = store.daily_summary(USER, d);
        assert_eq!(record.problems_solved, 1);
        assert_eq!(record.difficulties, DifficultyBreakdown::default());
    }

    #[test]
    fn missing_user_or_date_reads_as_zero() {
        let (_dir, store) = store();
        assert_eq!(store.daily_summary("nobody", day("2026-03-10")), DailyRecord::default());

        let stats = store.period_stats("nobody", 30, day("2026-03-10"));
        assert_eq!(stats.total_problems, 0);
        assert_eq!(stats.current_streak, 0);

        let report = store.weekly_report("nobody", day("2026-03-10"));
        assert_eq!(report.total_problems, 0);
        assert!(report.daily_breakdown.is_empty());
    }

    #[test]
    fn weekly_window_spans_eight_calendar_days() {
        let (_dir, store) = store();
        let end = day("2026-03-15");

        // One day before the window, both edges, and one day after.
        for date in ["2026-03-07", "2026-03-08", "2026-03-15", "2026-03-16"] {
            store.record_push_at(USER, &push(Difficulty::Easy, "c"), at(day(date), 10));
        }

        let report = store.weekly_report(USER, end);
        assert_eq!(report.start_date, day("2026-03-08"));
        assert_eq!(report.end_date, end);
        assert_eq!(report.total_problems, 2);
        assert_eq!(
            report.daily_breakdown.keys().copied().collect::<Vec<_>>(),
            vec![day("2026-03-08"), day("2026-03-15")]
        );
    }

    #[test]
    fn weekly_report_concatenates_solutions_in_date_order() {
        let (_dir, store) = store();
        store.record_push_at(USER, &SolutionPush::new("B", Difficulty::Hard, "go", ""), at(day("2026-03-12"), 8));
        store.record_push_at(USER, &SolutionPush::new("A", Difficulty::Easy, "rust", ""), at(day("2026-03-10"), 20));

        let report = store.weekly_report(USER, day("2026-03-12"));
        let titles: Vec<_> = report.solutions.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["A", "B"]);
        assert_eq!(report.difficulties.easy, 1);
        assert_eq!(report.difficulties.hard, 1);
        assert_eq!(report.languages_used.len(), 2);
    }

    #[test]
    fn current_streak_counts_back_from_as_of() {
        let (_dir, store) = store();
        let d = day("2026-03-20");

        // D-4 exists but has no solves.
        store.write().entry(USER.into()).or_default().insert(d - TimeDelta::days(4), DailyRecord::default());
        for back in 0..4 {
            store.record_push_at(USER, &push(Difficulty::Easy, "python"), at(d - TimeDelta::days(back), 12));
        }

        let stats = store.period_stats(USER, DEFAULT_PERIOD_DAYS, d);
        assert_eq!(stats.current_streak, 4);
        assert_eq!(stats.longest_streak, 4);
    }

    #[test]
    fn current_streak_is_zero_without_solves_on_as_of() {
        let (_dir, store) = store();
        let d = day("2026-03-20");
        for back in 1..6 {
            store.record_push_at(USER, &push(Difficulty::Easy, "python"), at(d - TimeDelta::days(back), 12));
        }

        let stats = store.period_stats(USER, DEFAULT_PERIOD_DAYS, d);
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.longest_streak, 5);

        // An explicit zero record on `as_of` behaves the same as a missing one.
        store.write().get_mut(USER).unwrap().insert(d, DailyRecord::default());
        assert_eq!(store.period_stats(USER, DEFAULT_PERIOD_DAYS, d).current_streak, 0);
    }

    #[test]
    fn missing_day_breaks_longest_streak() {
        let (_dir, store) = store();
        let d = day("2026-03-20");
        for back in [0, 1, 3, 4, 5] {
            store.record_push_at(USER, &push(Difficulty::Easy, "python"), at(d - TimeDelta::days(back), 12));
        }

        let stats = store.period_stats(USER, 10, d);
        assert_eq!(stats.longest_streak, 3);
        assert_eq!(stats.current_streak, 2);
        assert!(stats.longest_streak >= stats.current_streak);
    }

    #[test]
    fn two_day_period_scenario() {
        let (_dir, store) = store();
        let day1 = day("2026-03-01");
        let day2 = day("2026-03-02");
        store.record_push_at(USER, &push(Difficulty::Easy, "python"), at(day1, 12));
        store.record_push_at(USER, &push(Difficulty::Hard, "go"), at(day2, 12));

        let stats = store.period_stats(USER, 2, day2);
        assert_eq!(stats.total_problems, 2);
        assert_eq!(stats.difficulties, DifficultyBreakdown { easy: 1, medium: 0, hard: 1 });
        assert_eq!(stats.languages_used, HashSet::from(["python".into(), "go".into()]));
        assert_eq!(stats.longest_streak, 2);
        assert_eq!(stats.current_streak, 2);
    }

    #[test]
    fn period_excludes_days_outside_window() {
        let (_dir, store) = store();
        let d = day("2026-03-20");
        store.record_push_at(USER, &push(Difficulty::Easy, "python"), at(d - TimeDelta::days(3), 12));
        store.record_push_at(USER, &push(Difficulty::Easy, "python"), at(d, 12));

        let stats = store.period_stats(USER, 3, d);
        assert_eq!(stats.total_problems, 1);
        assert_eq!(store.period_stats(USER, 0, d).total_problems, 0);
    }

    #[test]
    fn cleanup_with_zero_retention_keeps_only_today() {
        let (_dir, store) = store();
        let today = day("2026-03-20");
        for back in [0, 1, 40] {
            store.record_push_at(USER, &push(Difficulty::Easy, "python"), at(today - TimeDelta::days(back), 12));
        }
        store.record_push_at("other@example.com", &push(Difficulty::Easy, "c"), at(today - TimeDelta::days(2), 12));

        assert_eq!(store.cleanup_at(0, today), 3);
        assert_eq!(store.daily_summary(USER, today).problems_solved, 1);
        assert_eq!(store.snapshot()[USER].len(), 1);
        assert_eq!(store.cleanup_at(0, today), 0);

        let reopened = StatisticsStore::open(store.path());
        assert_eq!(reopened.snapshot()[USER].len(), 1);
        assert_eq!(reopened.daily_summary(USER, today).problems_solved, 1);
        assert_eq!(reopened.daily_summary(USER, today - TimeDelta::days(40)).problems_solved, 0);
        assert_eq!(reopened.daily_summary("other@example.com", today - TimeDelta::days(2)).problems_solved, 0);
    }

    #[test]
    fn cleanup_keeps_cutoff_day() {
        let (_dir, store) = store();
        let today = day("2026-03-20");
        store.record_push_at(USER, &push(Difficulty::Easy, "python"), at(today - TimeDelta::days(90), 12));
        store.record_push_at(USER, &push(Difficulty::Easy, "python"), at(today - TimeDelta::days(91), 12));

        assert_eq!(store.cleanup_at(DEFAULT_RETENTION_DAYS, today), 1);
        assert_eq!(store.daily_summary(USER, today - TimeDelta::days(90)).problems_solved, 1);

        let reopened = StatisticsStore::open(store.path());
        assert_eq!(reopened.snapshot()[USER].len(), 1);
        assert_eq!(reopened.daily_summary(USER, today - TimeDelta::days(91)).problems_solved, 0);
    }

    #[test]
    fn reload_round_trips_counters_and_language_sets() {
        let (dir, store) = store();
        let d = day("2026-03-10");
        for (lang, diff) in [("rust", Difficulty::Hard), ("go", Difficulty::Easy), ("rust", Difficulty::Unknown)] {
            store.record_push_at(USER, &push(diff, lang), at(d, 11));
        }
        store.record_push_at("b@example.com", &push(Difficulty::Medium, "java"), at(d - TimeDelta::days(1), 7));

        let reloaded = StatisticsStore::open(dir.path().join("daily_stats.json"));
        let before = store.snapshot();
        let after = reloaded.snapshot();
        assert_eq!(before.len(), after.len());

        for (user, records) in &before {
            for (date, record) in records {
                let loaded = &after[user][date];
                assert_eq!(loaded.problems_solved, record.problems_solved);
                assert_eq!(loaded.total_pushes, record.total_pushes);
                assert_eq!(loaded.difficulties, record.difficulties);
                assert_eq!(loaded.languages_used, record.languages_used);
                assert_eq!(loaded.solutions, record.solutions);
            }
        }
    }

    #[test]
    fn failed_persist_keeps_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        // The store path is a directory, so every write fails.
        let blocked = dir.path().join("daily_stats");
        std::fs::create_dir(&blocked).unwrap();
        let store = StatisticsStore::open(&blocked);
        let d = day("2026-03-10");

        assert!(!store.record_push_at(USER, &push(Difficulty::Easy, "python"), at(d, 9)));
        assert_eq!(store.daily_summary(USER, d).problems_solved, 1);
        assert!(store.save().is_err());
    }

    #[test]
    fn concurrent_pushes_are_all_counted() {
        let (_dir, store) = store();
        let d = day("2026-03-10");

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..10 {
                        store.record_push_at(USER, &push(Difficulty::Medium, "rust"), at(d, 12));
                    }
                });
            }
        });

        let record = store.daily_summary(USER, d);
        assert_eq!(record.problems_solved, 40);
        assert_eq!(record.solutions.len(), 40);
    }
}
