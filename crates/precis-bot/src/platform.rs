//! `ThreadPlatform` implementation over Discord's REST API.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::builder::CreateThread;
use serenity::http::Http;
use serenity::model::channel::{Channel, ChannelType};
use serenity::model::id::ChannelId;

use precis_adapters::{ThreadError, ThreadInfo, ThreadPlatform};

pub struct DiscordThreads {
    http: Arc<Http>,
}

impl DiscordThreads {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ThreadPlatform for DiscordThreads {
    async fn list_threads(&self, channel_id: &str) -> Result<Vec<ThreadInfo>, ThreadError> {
        let channel = parse_channel(channel_id)?;

        // Active threads are listed per guild, so resolve the channel first.
        let guild_id = match self.http.get_channel(channel).await {
            Ok(Channel::Guild(ch)) => ch.guild_id,
            Ok(_) => return Ok(Vec::new()),
            Err(e) => return Err(ThreadError::Api(e.to_string())),
        };
        let active = self
            .http
            .get_guild_active_threads(guild_id)
            .await
            .map_err(|e| ThreadError::Api(e.to_string()))?;

        Ok(active
            .threads
            .into_iter()
            .filter(|t| t.parent_id == Some(channel))
            .map(|t| ThreadInfo {
                thread_id: t.id.to_string(),
                metadata_tags: name_tags(&t.name),
                name: t.name,
            })
            .collect())
    }

    async fn create_thread(&self, channel_id: &str, title: &str) -> Result<String, ThreadError> {
        let channel = parse_channel(channel_id)?;
        let thread = channel
            .create_thread(
                &self.http,
                CreateThread::new(title).kind(ChannelType::PublicThread),
            )
            .await
            .map_err(|e| ThreadError::Creation(e.to_string()))?;
        Ok(thread.id.to_string())
    }

    async fn post_message(&self, thread_id: &str, content: &str) -> Result<String, ThreadError> {
        let channel = parse_channel(thread_id)?;
        let message = channel
            .say(&self.http, content)
            .await
            .map_err(|e| ThreadError::Api(e.to_string()))?;
        Ok(message.id.to_string())
    }

    fn thread_url(&self, thread_id: &str) -> String {
        // Channel mention: Discord renders it as a clickable thread link.
        format!("<#{thread_id}>")
    }
}

fn parse_channel(id: &str) -> Result<ChannelId, ThreadError> {
    id.parse::<u64>()
        .map(ChannelId::new)
        .map_err(|_| ThreadError::Api(format!("invalid channel id: {id}")))
}

/// The fingerprint tag lives in the thread name as a trailing `[tag]`.
fn name_tags(name: &str) -> Vec<String> {
    match (name.rfind('['), name.rfind(']')) {
        (Some(start), Some(end)) if start < end => vec![name[start + 1..end].to_string()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_extracted_from_thread_name() {
        assert_eq!(
            name_tags("Discussion: youtu.be [a1b2c3d4e5f6]"),
            vec!["a1b2c3d4e5f6".to_string()]
        );
        assert!(name_tags("Discussion sans tag").is_empty());
        assert!(name_tags("à moitié ]fermé[").is_empty());
    }
}
