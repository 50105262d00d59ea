//! Discord ingress: `$` commands that record solution pushes and update preferences.

pub mod commands;

use anyhow::{Context, Result};
use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::*;

pub use commands::Commands;

/// Call token that marks a message as a command.
pub const CALL_TOKEN: char = '$';

/// Connects to Discord and serves commands until the client stops.
pub async fn run_bot(token: &str, commands: Commands) -> Result<()> {
    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(token, intents)
        .event_handler(LeekHandler::new(commands))
        .await
        .context("Error creating client.")?;

    client.start().await.context("Discord client stopped")?;
    Ok(())
}

pub struct LeekHandler {
    commands: Commands,
}

impl LeekHandler {
    pub fn new(commands: Commands) -> Self {
        Self { commands }
    }

    /// The reply for a message, or `None` when the message is not a command.
    pub fn respond(&self, content: &str) -> Option<String> {
        let content = content.trim();
        if !content.starts_with(CALL_TOKEN) || content.len() <= CALL_TOKEN.len_utf8() {
            return None;
        }
        Some(self.commands.run_command(content))
    }
}

#[async_trait]
impl EventHandler for LeekHandler {
    async fn ready(&self, _ctx: serenity::client::Context, ready: Ready) {
        log::info!("[LeekHandler::ready] Connected as {}", ready.user.name);
    }

    async fn message(&self, ctx: serenity::client::Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let Some(response) = self.respond(&msg.content) else { return };
        if let Err(why) = msg.channel_id.say(&ctx.http, response).await {
            let _ = msg.channel_id.say(&ctx.http, "Oops, internal error.").await;
            log::error!("[LeekHandler::message] Error sending message: {why:?}");
        }
    }
}
