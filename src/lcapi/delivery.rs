use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serenity::http::Http;
use serenity::model::id::ChannelId;

use crate::lcapi::{ReportDelivery, ReportPayload};

/// Discord rejects messages longer than this many characters.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Posts reports to an announcements channel.
pub struct DiscordDelivery {
    http: Arc<Http>,
    channel: ChannelId,
}

impl DiscordDelivery {
    pub fn new(token: &str, channel_id: u64) -> Self {
        Self {
            http: Arc::new(Http::new(token)),
            channel: ChannelId::new(channel_id),
        }
    }
}

#[async_trait]
impl ReportDelivery for DiscordDelivery {
    async fn deliver(&self, recipient: &str, payload: &ReportPayload) -> Result<()> {
        let message = render_message(recipient, payload);

        self.channel
            .say(&self.http, message)
            .await
            .with_context(|| format!("Could not post {} for {recipient} to Discord", payload.kind()))?;

        log::debug!("[DiscordDelivery::deliver] Posted {} for {recipient}", payload.kind());
        Ok(())
    }
}

/// Writes reports to the log. Used when no chat transport is configured.
pub struct LogDelivery;

#[async_trait]
impl ReportDelivery for LogDelivery {
    async fn deliver(&self, recipient: &str, payload: &ReportPayload) -> Result<()> {
        log::info!("[LogDelivery::deliver] {}", render_message(recipient, payload));
        Ok(())
    }
}

fn render_message(recipient: &str, payload: &ReportPayload) -> String {
    truncate_message(format!("📬 {recipient}\n{payload}"), DISCORD_MESSAGE_LIMIT)
}

/// Cuts `message` down to `limit` characters, marking the cut with an ellipsis.
fn truncate_message(message: String, limit: usize) -> String {
    if message.chars().count() <= limit {
        return message;
    }

    let mut cut: String = message.chars().take(limit.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
