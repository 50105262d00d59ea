//! Process configuration, read from the environment (and `.env`, if present).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dotenv::dotenv;

use crate::error::{LcError, LcResult};
use crate::lcdb::stats::DEFAULT_RETENTION_DAYS;
use crate::lcdb::{PREFERENCES_FILE, STATISTICS_FILE};
use crate::lcsched::jobs::redact;
use crate::lcsched::registry::{ReminderFrequency, parse_time, parse_weekday};
use crate::lcsched::{DEFAULT_POLL_INTERVAL, MAX_POLL_INTERVAL};

#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub poll_interval: Duration,
    pub retention_days: u32,
    pub users: Vec<String>,
    pub summary_time: String,
    pub weekly_day: String,
    pub weekly_time: String,
    pub reminder_frequency: String,
    pub reminder_time: String,
    pub backup_time: String,
    pub github_token: Option<String>,
    pub discord: Option<DiscordConfig>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct DiscordConfig {
    pub token: String,
    pub channel_id: u64,
}

// Credentials stay out of debug output.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("data_dir", &self.data_dir)
            .field("backup_dir", &self.backup_dir)
            .field("poll_interval", &self.poll_interval)
            .field("retention_days", &self.retention_days)
            .field("users", &self.users)
            .field("github_token", &self.github_token.as_deref().map(redact))
            .field("discord", &self.discord)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &"****")
            .field("channel_id", &self.channel_id)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> LcResult<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> LcResult<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let poll_secs: u64 = parse_number(&get, "LEEK_POLL_SECS", DEFAULT_POLL_INTERVAL.as_secs())?;
        let poll_interval = Duration::from_secs(poll_secs.clamp(1, MAX_POLL_INTERVAL.as_secs()));

        let users = get("LEEK_USERS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|user| !user.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let discord = match (get("DISCORD_TOKEN"), get("ANNOUNCEMENTS_CHANNEL_ID")) {
            (Some(token), Some(channel)) => {
                let channel_id = channel.parse().map_err(|_| {
                    LcError::config(format!("ANNOUNCEMENTS_CHANNEL_ID '{channel}' is not a channel id"))
                })?;
                Some(DiscordConfig { token, channel_id })
            }
            (Some(_), None) => {
                log::warn!("[Config::from_lookup] DISCORD_TOKEN set without ANNOUNCEMENTS_CHANNEL_ID");
                None
            }
            _ => None,
        };

        let config = Self {
            data_dir: PathBuf::from(or("LEEK_DATA_DIR", "data")),
            backup_dir: PathBuf::from(or("LEEK_BACKUP_DIR", "backups")),
            poll_interval,
            retention_days: parse_number(&get, "LEEK_RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?,
            users,
            summary_time: or("LEEK_SUMMARY_TIME", "18:00"),
            weekly_day: or("LEEK_WEEKLY_DAY", "sunday"),
            weekly_time: or("LEEK_WEEKLY_TIME", "19:00"),
            reminder_frequency: or("LEEK_REMINDER_FREQUENCY", "daily"),
            reminder_time: or("LEEK_REMINDER_TIME", "09:00"),
            backup_time: or("LEEK_BACKUP_TIME", "02:00"),
            github_token: get("GITHUB_TOKEN"),
            discord,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn stats_path(&self) -> PathBuf {
        self.data_dir.join(STATISTICS_FILE)
    }

    pub fn prefs_path(&self) -> PathBuf {
        self.data_dir.join(PREFERENCES_FILE)
    }

    fn validate(&self) -> LcResult<()> {
        for time in [&self.summary_time, &self.weekly_time, &self.reminder_time, &self.backup_time] {
            parse_time(time)?;
        }
        parse_weekday(&self.weekly_day)?;
        self.reminder_frequency.parse::<ReminderFrequency>()?;
        Ok(())
    }
}

fn parse_number<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> LcResult<T> {
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| LcError::config(format!("{key} '{raw}' is not a valid number"))),
        None => Ok(default),
    }
}
