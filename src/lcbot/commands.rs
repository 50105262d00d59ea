use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result, anyhow, bail};
use itertools::Itertools;
use regex::Regex;

use crate::lcdb::stats::DEFAULT_PERIOD_DAYS;
use crate::lcdb::{PreferencesStore, StatisticsStore};
use crate::lcsched::jobs::validate_user_id;
use crate::lcsched::{Clock, system_clock};
use crate::models::{Difficulty, SolutionPush, UserPreferences};

const MAX_CMD_LENGTH: usize = 12;

static COMMAND_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap_or_else(|err| panic!("command pattern: {err}"))
});

/// Chat commands over the statistics and preferences stores.
pub struct Commands {
    stats: Arc<StatisticsStore>,
    prefs: Arc<PreferencesStore>,
    clock: Clock,
}

impl Commands {
    pub fn new(stats: Arc<StatisticsStore>, prefs: Arc<PreferencesStore>) -> Self {
        Self { stats, prefs, clock: system_clock() }
    }

    /// Push timestamps and "today" are taken from `clock`.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Runs one `$command`, rendering failures as an `ERROR:` reply.
    pub fn run_command(&self, input: &str) -> String {
        self.execute(input).unwrap_or_else(|err| format!("ERROR: {err:#}"))
    }

    fn execute(&self, input: &str) -> Result<String> {
        // Skip the call token
        let input = input.trim().get(1..).unwrap_or_default();
        let tokens = input.split_whitespace().collect::<Vec<_>>();
        let Some((&command, parameters)) = tokens.split_first() else {
            bail!("Empty command, see $help for commands.");
        };

        match command {
            "push" => self.push(parameters),
            "target" => self.target(parameters),
            "prefs" => self.show_prefs(parameters),
            "today" => self.today(parameters),
            "stats" => self.stats(parameters),
            "help" => Ok(Self::get_help()),
            _ => {
                if Self::is_valid_cmd(command) {
                    log::info!("[Commands::execute] User submitted unknown command: {command}");
                    Err(anyhow!("No such command found: {command}, see $help for commands."))
                } else {
                    log::info!("[Commands::execute] User submitted invalid command: {command}");
                    Err(anyhow!("Invalid command syntax."))
                }
            }
        }
    }

    /// `$push <user> <difficulty> <language> <url> [title...]`
    fn push(&self, parameters: &[&str]) -> Result<String> {
        let [user, difficulty, language, url, title @ ..] = parameters else {
            bail!("Usage: $push <user> <difficulty> <language> <url> [title]");
        };
        validate_user_id(user)?;

        let title = match title.iter().join(" ") {
            joined if joined.is_empty() => String::from("Unknown"),
            joined => joined,
        };
        let push = SolutionPush::new(title, Difficulty::parse(difficulty), *language, *url);

        let saved = self.stats.record_push_at(user, &push, (self.clock)());
        let today = self.stats.daily_summary(user, (self.clock)().date());

        let mut reply = format!(
            "Recorded **{}** ({}, {}) for {user}. Solved today: {}",
            push.title, push.difficulty, push.language, today.problems_solved
        );
        if !saved {
            reply += "\n(Could not save to disk, see logs.)";
        }
        Ok(reply)
    }

    /// `$target <user> <daily target> <difficulty>`
    fn target(&self, parameters: &[&str]) -> Result<String> {
        let [user, target, difficulty] = parameters else {
            bail!("Usage: $target <user> <daily target> <Easy|Medium|Hard>");
        };
        validate_user_id(user)?;

        let target: u32 = target
            .parse()
            .with_context(|| format!("'{target}' is not a number of problems"))?;
        let prefs = UserPreferences::new(target, Difficulty::parse(difficulty))?;

        let saved = self.prefs.set(user, prefs.clone())?;
        let mut reply = format!(
            "Daily target for {user} is now {} ({}).",
            prefs.daily_target, prefs.preferred_difficulty
        );
        if !saved {
            reply += "\n(Could not save to disk, see logs.)";
        }
        Ok(reply)
    }

    fn show_prefs(&self, parameters: &[&str]) -> Result<String> {
        let user = Self::user_param(parameters)?;
        let prefs = self.prefs.get(user);
        Ok(format!(
            "**Preferences for {user}:**\nDaily target: {}\nPreferred difficulty: {}",
            prefs.daily_target, prefs.preferred_difficulty
        ))
    }

    fn today(&self, parameters: &[&str]) -> Result<String> {
        let user = Self::user_param(parameters)?;
        Ok(self.stats.daily_summary(user, (self.clock)().date()).to_string())
    }

    /// `$stats <user> [days]`
    fn stats(&self, parameters: &[&str]) -> Result<String> {
        let user = Self::user_param(parameters)?;
        let days = match parameters.get(1) {
            Some(days) => days
                .parse()
                .with_context(|| format!("'{days}' is not a number of days"))?,
            None => DEFAULT_PERIOD_DAYS,
        };
        Ok(self.stats.period_stats(user, days, (self.clock)().date()).to_string())
    }

    fn user_param<'a>(parameters: &[&'a str]) -> Result<&'a str> {
        let user = *parameters.first().context("Expected a user, got none.")?;
        validate_user_id(user)?;
        Ok(user)
    }

    /// Ensures that the string slice conforms to C-like identifier regex
    fn is_valid_cmd(s: &str) -> bool {
        s.len() <= MAX_CMD_LENGTH && COMMAND_NAME.is_match(s)
    }

    /// Gets a help string. Should be updated after a new command is added
    pub fn get_help() -> String {
        String::from(
r#"
**Command List:**
`$push <user> <difficulty> <language> <url> [title]`:  Record a solved problem.
`$target <user> <daily target> <difficulty>`:  Set the daily goal and preferred difficulty.
`$prefs <user>`:  Show a user's preferences.
`$today <user>`:  Today's summary.
`$stats <user> [days]`:  Totals and streaks over the last 30 (or `days`) days.
`$help`:  Get information on supported commands
"#)
    }
}
