//! Report generators: turn stored statistics into notification payloads.
//!
//! Generators only read the stores and return owned data, so no lock is held while the payload
//! is delivered.

pub mod backup;

use chrono::NaiveDate;
use rand::seq::IndexedRandom;

use crate::lcapi::ReportPayload;
use crate::lcdb::{PreferencesStore, StatisticsStore};
use crate::models::ProblemReminder;

pub fn daily_summary(stats: &StatisticsStore, user_id: &str, date: NaiveDate) -> ReportPayload {
    ReportPayload::DailySummary(stats.daily_summary(user_id, date))
}

pub fn weekly_report(stats: &StatisticsStore, user_id: &str, as_of: NaiveDate) -> ReportPayload {
    ReportPayload::WeeklyReport(stats.weekly_report(user_id, as_of))
}

pub fn problem_reminder(
    stats: &StatisticsStore,
    prefs: &PreferencesStore,
    user_id: &str,
    today: NaiveDate,
) -> ReportPayload {
    let solved_today = stats.daily_summary(user_id, today).problems_solved;
    let prefs = prefs.get(user_id);
    let target = prefs.daily_target;

    ReportPayload::ProblemReminder(ProblemReminder {
        solved_today,
        target_problems: target,
        remaining_problems: u64::from(target).saturating_sub(solved_today),
        preferred_difficulty: prefs.preferred_difficulty,
        motivational_message: motivational_message(solved_today, target),
    })
}

/// Every message [`motivational_message`] may pick for this progress.
///
/// Three pools: nothing solved yet, partway to the target, target reached.
pub fn motivational_pool(solved_today: u64, target: u32) -> Vec<String> {
    let target = u64::from(target);

    if solved_today >= target {
        vec![
            String::from("🎉 Amazing! You've hit your daily target!"),
            String::from("🔥 You're on fire! Great job completing your goal!"),
            String::from("⭐ Excellent work! You've achieved your daily target!"),
            String::from("💪 Outstanding! You're crushing your coding goals!"),
        ]
    } else if solved_today > 0 {
        let remaining = target - solved_today;
        let s = if remaining > 1 { "s" } else { "" };
        vec![
            format!("👏 Great start! Just {remaining} more problem{s} to reach your goal!"),
            format!("🚀 You're making progress! {remaining} problem{s} left for today!"),
            format!("💼 Keep it up! {remaining} more to complete your daily target!"),
        ]
    } else {
        vec![
            String::from("☀️ Ready to start your coding journey today?"),
            String::from("🌟 A new day, a new opportunity to grow!"),
            String::from("🎯 Let's tackle some problems and level up!"),
            String::from("💡 Time to challenge yourself with some coding!"),
        ]
    }
}

/// A uniformly random pick from [`motivational_pool`].
pub fn motivational_message(solved_today: u64, target: u32) -> String {
    motivational_pool(solved_today, target)
        .choose(&mut rand::rng())
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Difficulty, SolutionPush, UserPreferences};

    const USER: &str = "coder@example.com";

    fn stores() -> (tempfile::TempDir, StatisticsStore, PreferencesStore) {
        let dir = tempfile::tempdir().unwrap();
        let stats = StatisticsStore::open(dir.path().join("daily_stats.json"));
        let prefs = PreferencesStore::open(dir.path().join("user_preferences.json"));
        (dir, stats, prefs)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()
    }

    fn solve(stats: &StatisticsStore, n: usize) {
        for _ in 0..n {
            let push = SolutionPush::new("Valid Anagram", Difficulty::Easy, "rust", "");
            stats.record_push_at(USER, &push, day().and_hms_opt(10, 0, 0).unwrap());
        }
    }

    fn reminder(payload: ReportPayload) -> ProblemReminder {
        match payload {
            ReportPayload::ProblemReminder(reminder) => reminder,
            other => panic!("expected a reminder, got {other:?}"),
        }
    }

    #[test]
    fn pools_are_disjoint_by_progress() {
        let none = motivational_pool(0, 3);
        let partial = motivational_pool(1, 3);
        let done = motivational_pool(3, 3);

        assert!(none.iter().all(|m| !partial.contains(m) && !done.contains(m)));
        assert!(partial.iter().all(|m| !done.contains(m)));
        assert!(partial.iter().any(|m| m.contains("2 more problems")));
        assert!(motivational_pool(2, 3).iter().any(|m| m.contains("1 more problem to")));
    }

    #[test]
    fn message_comes_from_matching_pool() {
        for (solved, target) in [(0, 1), (1, 4), (4, 4), (9, 2)] {
            let message = motivational_message(solved, target);
            assert!(motivational_pool(solved, target).contains(&message));
        }
    }

    #[test]
    fn reminder_with_nothing_solved_uses_default_preferences() {
        let (_dir, stats, prefs) = stores();

        let r = reminder(problem_reminder(&stats, &prefs, USER, day()));
        assert_eq!(r.solved_today, 0);
        assert_eq!(r.target_problems, 1);
        assert_eq!(r.remaining_problems, 1);
        assert_eq!(r.preferred_difficulty, Difficulty::Medium);
        assert!(motivational_pool(0, 1).contains(&r.motivational_message));
    }

    #[test]
    fn reminder_counts_remaining_against_target() {
        let (_dir, stats, prefs) = stores();
        prefs.set(USER, UserPreferences::new(3, Difficulty::Hard).unwrap()).unwrap();
        solve(&stats, 1);

        let r = reminder(problem_reminder(&stats, &prefs, USER, day()));
        assert_eq!(r.remaining_problems, 2);
        assert_eq!(r.preferred_difficulty, Difficulty::Hard);
        assert!(motivational_pool(1, 3).contains(&r.motivational_message));
    }

    #[test]
    fn reminder_remaining_never_goes_negative() {
        let (_dir, stats, prefs) = stores();
        solve(&stats, 4);

        let r = reminder(problem_reminder(&stats, &prefs, USER, day()));
        assert_eq!(r.remaining_problems, 0);
        assert!(motivational_pool(4, 1).contains(&r.motivational_message));
    }

    #[test]
    fn summary_and_weekly_payloads_have_matching_kinds() {
        let (_dir, stats, _prefs) = stores();
        solve(&stats, 2);

        match daily_summary(&stats, USER, day()) {
            ReportPayload::DailySummary(record) => assert_eq!(record.problems_solved, 2),
            other => panic!("unexpected payload {other:?}"),
        }
        match weekly_report(&stats, USER, day()) {
            ReportPayload::WeeklyReport(report) => assert_eq!(report.total_problems, 2),
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
