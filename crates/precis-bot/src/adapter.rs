use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tracing::{error, info, warn};

use precis_core::config::DiscordConfig;
use precis_ledger::DedupCache;
use precis_pipeline::Orchestrator;

use crate::handler::PrecisHandler;

/// Discord front-end.
///
/// Wraps a serenity `Client` and drives the event loop until the process
/// exits. Reconnects automatically whenever the gateway drops.
pub struct DiscordAdapter {
    orchestrator: Arc<Orchestrator>,
    ledger: Arc<DedupCache>,
    config: DiscordConfig,
}

impl DiscordAdapter {
    pub fn new(
        config: DiscordConfig,
        orchestrator: Arc<Orchestrator>,
        ledger: Arc<DedupCache>,
    ) -> Self {
        Self {
            orchestrator,
            ledger,
            config,
        }
    }

    /// Connect to Discord and keep reconnecting whenever the gateway drops.
    /// Never returns — runs for the lifetime of the process.
    pub async fn run(self) {
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        let mut client = loop {
            match self.build_client(intents).await {
                Ok(c) => break c,
                Err(e) => {
                    error!("Discord: initial connect failed ({e}), retrying in 30s");
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
            }
        };

        loop {
            info!("Discord: gateway connecting");

            if let Err(e) = client.start().await {
                warn!("Discord: gateway error ({e}), reconnecting in 5s");
            } else {
                info!("Discord: gateway stopped cleanly, reconnecting in 5s");
            }

            tokio::time::sleep(Duration::from_secs(5)).await;

            client = loop {
                match self.build_client(intents).await {
                    Ok(c) => break c,
                    Err(e) => {
                        error!("Discord: reconnect failed ({e}), retrying in 30s");
                        tokio::time::sleep(Duration::from_secs(30)).await;
                    }
                }
            };
        }
    }

    async fn build_client(&self, intents: GatewayIntents) -> Result<Client, serenity::Error> {
        let handler = PrecisHandler {
            orchestrator: Arc::clone(&self.orchestrator),
            ledger: Arc::clone(&self.ledger),
            config: self.config.clone(),
            bot_id: OnceLock::new(),
        };

        Client::builder(&self.config.bot_token, intents)
            .event_handler(handler)
            .await
    }
}
