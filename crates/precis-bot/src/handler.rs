use std::sync::{Arc, OnceLock};

use serenity::all::ActivityData;
use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::UserId;
use serenity::model::user::OnlineStatus;
use serenity::prelude::{Context, EventHandler};
use tracing::info;

use precis_core::config::DiscordConfig;
use precis_ledger::DedupCache;
use precis_pipeline::Orchestrator;

/// Serenity event handler wired to the summarization pipeline.
pub struct PrecisHandler {
    pub orchestrator: Arc<Orchestrator>,
    pub ledger: Arc<DedupCache>,
    pub config: DiscordConfig,
    pub bot_id: OnceLock<UserId>,
}

#[async_trait]
impl EventHandler for PrecisHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        self.bot_id.set(ready.user.id).ok();
        ctx.set_presence(
            Some(ActivityData::watching("les liens partagés")),
            OnlineStatus::Online,
        );
        info!(
            name = %ready.user.name,
            channels = self.config.monitored_channels.len(),
            "Discord bot connected"
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Our own notices come back through the gateway too.
        if msg.author.bot {
            return;
        }
        if !self.config.monitored_channels.contains(&msg.channel_id.get()) {
            return;
        }

        if msg.content.starts_with(&self.config.command_prefix) {
            crate::commands::handle_command(self, &ctx, &msg).await;
            return;
        }

        // One spawned pipeline run per supported link; the handler itself
        // stays non-blocking.
        let channel_id = msg.channel_id.to_string();
        let _handles = self.orchestrator.handle_message(&channel_id, &msg.content);
    }
}
