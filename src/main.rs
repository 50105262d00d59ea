use std::sync::Arc;

use anyhow::{Context, Result};

use leekcoach::config::Config;
use leekcoach::lcapi::{DiscordDelivery, LogDelivery, ReportDelivery};
use leekcoach::lcbot::{self, Commands};
use leekcoach::lcdb::{PreferencesStore, StatisticsStore};
use leekcoach::lcsched::{Notifier, Scheduler};
use leekcoach::lcsched::jobs::redact;

#[tokio::main]
async fn main() -> Result<()> {
    // Begin logger
    env_logger::init();

    let config = Config::from_env().context("Invalid configuration")?;
    log::debug!("[main] Data in {}, backups in {}", config.data_dir.display(), config.backup_dir.display());

    let stats = Arc::new(StatisticsStore::open(config.stats_path()));
    let prefs = Arc::new(PreferencesStore::open(config.prefs_path()));

    let removed = stats.cleanup(config.retention_days);
    log::info!("[main] Dropped {removed} record(s) older than {} days", config.retention_days);

    let delivery: Arc<dyn ReportDelivery> = match &config.discord {
        Some(discord) => {
            log::info!("[main] Delivering reports to Discord channel {}", discord.channel_id);
            Arc::new(DiscordDelivery::new(&discord.token, discord.channel_id))
        }
        None => {
            log::warn!("[main] No Discord channel configured, reports will only be logged");
            Arc::new(LogDelivery)
        }
    };

    // Pushes and preference changes arrive as chat commands.
    let bot = match &config.discord {
        Some(discord) => {
            let commands = Commands::new(Arc::clone(&stats), Arc::clone(&prefs));
            let token = discord.token.clone();
            Some(tokio::spawn(async move {
                if let Err(err) = lcbot::run_bot(&token, commands).await {
                    log::error!("[main] Discord bot stopped: {err:#}");
                }
            }))
        }
        None => {
            log::warn!("[main] No Discord bot configured, solution pushes cannot be received");
            None
        }
    };

    let scheduler = Scheduler::new(config.poll_interval);
    let notifier = Notifier::new(stats, prefs, delivery, config.backup_dir.clone());

    for user in &config.users {
        notifier
            .schedule_daily_summary(&scheduler, user, &config.summary_time)
            .and_then(|_| notifier.schedule_weekly_report(&scheduler, user, &config.weekly_day, &config.weekly_time))
            .and_then(|_| {
                notifier.schedule_problem_reminder(
                    &scheduler,
                    user,
                    &config.reminder_frequency,
                    &config.reminder_time,
                )
            })
            .with_context(|| format!("Could not schedule reports for {user}"))?;
    }

    match &config.github_token {
        Some(token) => notifier
            .schedule_repository_backup(&scheduler, token, &config.backup_time)
            .with_context(|| format!("Could not schedule backup for {}", redact(token)))?,
        None => log::info!("[main] GITHUB_TOKEN not set, repository backups disabled"),
    }

    if scheduler.registry().is_empty() {
        log::warn!("[main] Nothing to schedule, set LEEK_USERS and/or GITHUB_TOKEN");
    }

    scheduler.start();

    tokio::signal::ctrl_c().await.context("Could not listen for Ctrl-C")?;
    log::info!("[main] Shutting down");
    scheduler.stop().await;
    if let Some(bot) = bot {
        bot.abort();
    }

    Ok(())
}
