//! Prefix commands (`!precis ping`, `!precis channels`, `!precis reset`).

use serenity::model::channel::Message;
use serenity::prelude::Context;
use tracing::warn;

use precis_core::{normalize_url, ContentFingerprint};

use crate::handler::PrecisHandler;

pub async fn handle_command(handler: &PrecisHandler, ctx: &Context, msg: &Message) {
    let prefix = &handler.config.command_prefix;
    let rest = msg.content[prefix.len()..].trim();
    let mut parts = rest.split_whitespace();

    let reply = match parts.next() {
        Some("ping") => "Pong !".to_string(),
        Some("channels") => {
            let list: Vec<String> = handler
                .config
                .monitored_channels
                .iter()
                .map(|id| format!("<#{id}>"))
                .collect();
            format!("Canaux surveillés: {}", list.join(", "))
        }
        Some("reset") => reset_link(handler, parts.next(), prefix),
        _ => format!("Commandes: {prefix} ping | {prefix} channels | {prefix} reset <url>"),
    };

    if let Err(e) = msg.channel_id.say(&ctx.http, reply).await {
        warn!(error = %e, "command reply failed");
    }
}

/// Drop the ledger entry for a link so it can be reprocessed.
fn reset_link(handler: &PrecisHandler, raw: Option<&str>, prefix: &str) -> String {
    let Some(raw) = raw else {
        return format!("Usage: {prefix} reset <url>");
    };
    let Some(url) = normalize_url(raw) else {
        return "URL invalide.".to_string();
    };

    let fingerprint = ContentFingerprint::from_url(&url);
    match handler.ledger.reset(&fingerprint) {
        Ok(true) => "Lien réinitialisé, il peut être retraité.".to_string(),
        Ok(false) => "Aucune entrée pour ce lien.".to_string(),
        Err(e) => {
            warn!(error = %e, "ledger reset failed");
            "Erreur lors de la réinitialisation.".to_string()
        }
    }
}
