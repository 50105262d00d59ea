use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{LcError, LcResult};

/// The four kinds of scheduled work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    DailySummary,
    WeeklyReport,
    ProblemReminder,
    RepositoryBackup,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DailySummary => "daily summary",
            Self::WeeklyReport => "weekly report",
            Self::ProblemReminder => "problem reminder",
            Self::RepositoryBackup => "repository backup",
        };
        f.write_str(s)
    }
}

/// Problem difficulty as reported by the push event.
///
/// Anything other than Easy/Medium/Hard lands in `Unknown`, which is still counted as a solve
/// but never gets a bucket in [`DifficultyBreakdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    #[serde(other)]
    Unknown,
}

impl Difficulty {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Self::Easy,
            "medium" => Self::Medium,
            "hard" => Self::Hard,
            _ => Self::Unknown,
        }
    }

    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Per-difficulty solve counts. Serialized as `{"Easy": n, "Medium": n, "Hard": n}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyBreakdown {
    #[serde(rename = "Easy", default)]
    pub easy: u64,
    #[serde(rename = "Medium", default)]
    pub medium: u64,
    #[serde(rename = "Hard", default)]
    pub hard: u64,
}

impl DifficultyBreakdown {
    /// Bumps the bucket for `difficulty`. Returns `false` (and changes nothing) for `Unknown`.
    pub fn record(&mut self, difficulty: Difficulty) -> bool {
        match difficulty {
            Difficulty::Easy => self.easy += 1,
            Difficulty::Medium => self.medium += 1,
            Difficulty::Hard => self.hard += 1,
            Difficulty::Unknown => return false,
        }
        true
    }

    pub fn get(&self, difficulty: Difficulty) -> u64 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
            Difficulty::Unknown => 0,
        }
    }

    pub fn absorb(&mut self, other: &DifficultyBreakdown) {
        self.easy += other.easy;
        self.medium += other.medium;
        self.hard += other.hard;
    }

    pub fn total(&self) -> u64 {
        self.easy + self.medium + self.hard
    }
}

/// On disk the language set is an ordered sequence of unique strings (sorted, so the file is
/// stable); it is rebuilt into a set on load.
mod language_set {
    use std::collections::HashSet;

    use itertools::Itertools;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(set: &HashSet<String>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(set.iter().sorted())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<HashSet<String>, D::Error> {
        Vec::<String>::deserialize(deserializer).map(|langs| langs.into_iter().collect())
    }
}

fn unknown_title() -> String {
    String::from("Unknown")
}

fn unknown_language() -> String {
    String::from("unknown")
}

fn unknown_difficulty() -> Difficulty {
    Difficulty::Unknown
}

/// A "solution pushed" event coming from outside the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionPush {
    #[serde(default = "unknown_title")]
    pub title: String,
    #[serde(default = "unknown_difficulty")]
    pub difficulty: Difficulty,
    #[serde(default = "unknown_language")]
    pub language: String,
    #[serde(default)]
    pub url: String,

    /// Source of the solution. Not kept in the statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl SolutionPush {
    pub fn new(
        title: impl Into<String>,
        difficulty: Difficulty,
        language: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            difficulty,
            language: language.into(),
            url: url.into(),
            content: None,
        }
    }
}

/// One solve as recorded in a [`DailyRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionEntry {
    pub title: String,
    pub difficulty: Difficulty,
    pub language: String,
    pub timestamp: NaiveDateTime,
    pub url: String,
}

/// Aggregated activity for one user on one calendar day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    #[serde(default)]
    pub problems_solved: u64,
    #[serde(default)]
    pub total_pushes: u64,
    #[serde(with = "language_set", default)]
    pub languages_used: HashSet<String>,
    #[serde(default)]
    pub difficulties: DifficultyBreakdown,

    /// Append-only, chronological.
    #[serde(default)]
    pub solutions: Vec<SolutionEntry>,
}

impl DailyRecord {
    pub fn apply_push(&mut self, push: &SolutionPush, at: NaiveDateTime) {
        self.problems_solved += 1;
        self.total_pushes += 1;
        self.languages_used.insert(push.language.clone());
        self.difficulties.record(push.difficulty);

        self.solutions.push(SolutionEntry {
            title: push.title.clone(),
            difficulty: push.difficulty,
            language: push.language.clone(),
            timestamp: at,
            url: push.url.clone(),
        });
    }

    pub fn is_active(&self) -> bool {
        self.problems_solved > 0
    }
}

impl fmt::Display for DailyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "**Daily Summary:**\n\
             \tProblems Solved: {}\n\
             \tTotal Pushes: {}\n\
             \tLanguages: {}\n\
             \tEasy/Medium/Hard: {}/{}/{}",
            self.problems_solved,
            self.total_pushes,
            fmt_languages(&self.languages_used),
            self.difficulties.easy,
            self.difficulties.medium,
            self.difficulties.hard,
        )?;

        for solution in &self.solutions {
            write!(f, "\n\t- {} ({}, `{}`)", solution.title, solution.difficulty, solution.language)?;
        }
        Ok(())
    }
}

fn fmt_languages(languages: &HashSet<String>) -> String {
    if languages.is_empty() {
        String::from("none")
    } else {
        languages.iter().sorted().join(", ")
    }
}

/// Per-user configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub daily_target: u32,
    pub preferred_difficulty: Difficulty,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            daily_target: 1,
            preferred_difficulty: Difficulty::Medium,
        }
    }
}

impl UserPreferences {
    pub fn new(daily_target: u32, preferred_difficulty: Difficulty) -> LcResult<Self> {
        let prefs = Self { daily_target, preferred_difficulty };
        prefs.validate()?;
        Ok(prefs)
    }

    pub fn validate(&self) -> LcResult<()> {
        if self.daily_target == 0 {
            return Err(LcError::config("daily target must be at least 1"));
        }
        if !self.preferred_difficulty.is_known() {
            return Err(LcError::config("preferred difficulty must be Easy, Medium or Hard"));
        }
        Ok(())
    }
}

/// Totals over the weekly window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_problems: u64,
    pub total_pushes: u64,
    #[serde(with = "language_set")]
    pub languages_used: HashSet<String>,
    pub difficulties: DifficultyBreakdown,
    pub daily_breakdown: BTreeMap<NaiveDate, u64>,
    pub solutions: Vec<SolutionEntry>,
}

impl fmt::Display for WeeklyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "**Weekly Report ({} to {}):**\n\
             \tProblems Solved: {}\n\
             \tTotal Pushes: {}\n\
             \tLanguages: {}\n\
             \tEasy/Medium/Hard: {}/{}/{}",
            self.start_date,
            self.end_date,
            self.total_problems,
            self.total_pushes,
            fmt_languages(&self.languages_used),
            self.difficulties.easy,
            self.difficulties.medium,
            self.difficulties.hard,
        )?;

        for (date, solved) in &self.daily_breakdown {
            write!(f, "\n\t{date}: {solved}")?;
        }
        Ok(())
    }
}

/// Totals and streaks over the last `period_days` days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodStats {
    pub period_days: u32,
    pub total_problems: u64,
    pub total_pushes: u64,
    #[serde(with = "language_set")]
    pub languages_used: HashSet<String>,
    pub difficulties: DifficultyBreakdown,
    pub daily_data: BTreeMap<NaiveDate, u64>,
    pub current_streak: u32,
    pub longest_streak: u32,
}

impl fmt::Display for PeriodStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "**Last {} Days:**\n\
             \tProblems Solved: {}\n\
             \tTotal Pushes: {}\n\
             \tLanguages: {}\n\
             \tCurrent Streak: {}\n\
             \tLongest Streak: {}",
            self.period_days,
            self.total_problems,
            self.total_pushes,
            fmt_languages(&self.languages_used),
            self.current_streak,
            self.longest_streak,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemReminder {
    pub solved_today: u64,
    pub target_problems: u32,
    pub remaining_problems: u64,
    pub preferred_difficulty: Difficulty,
    pub motivational_message: String,
}

impl fmt::Display for ProblemReminder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "**Reminder:** {}\n\
             \tSolved Today: {}/{}\n\
             \tRemaining: {}\n\
             \tSuggested Difficulty: {}",
            self.motivational_message,
            self.solved_today,
            self.target_problems,
            self.remaining_problems,
            self.preferred_difficulty,
        )
    }
}

/// A repository as listed by the source-control collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub name: String,
    pub description: Option<String>,
    pub private: bool,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    pub language: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub clone_url: String,
}

/// The fixed shape a repository is projected into for backups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub name: String,
    pub description: Option<String>,
    pub private: bool,
    pub stars: u64,
    pub forks: u64,
    pub language: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub clone_url: String,
}

impl From<Repository> for RepositorySummary {
    fn from(repo: Repository) -> Self {
        Self {
            name: repo.name,
            description: repo.description,
            private: repo.private,
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            language: repo.language,
            created_at: repo.created_at,
            updated_at: repo.updated_at,
            clone_url: repo.clone_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub timestamp: NaiveDateTime,
    pub user: String,
    pub total_repos: usize,
    pub repositories: Vec<RepositorySummary>,
}

/// Result of a backup run. Failures are reported here, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_file: Option<String>,
    pub repos_backed_up: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BackupOutcome {
    pub fn succeeded(backup_file: String, repos_backed_up: usize) -> Self {
        Self {
            success: true,
            backup_file: Some(backup_file),
            repos_backed_up,
            error: None,
        }
    }

    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            success: false,
            backup_file: None,
            repos_backed_up: 0,
            error: Some(error.to_string()),
        }
    }
}
