use async_trait::async_trait;

use crate::error::ThreadError;

/// A discussion thread visible on the platform.
#[derive(Debug, Clone)]
pub struct ThreadInfo {
    pub thread_id: String,
    pub name: String,
    /// Tags the coordinator can match a fingerprint against. For Discord this
    /// is derived from the thread name.
    pub metadata_tags: Vec<String>,
}

/// External collaborator abstracting the chat platform's thread API.
///
/// The orchestration core never speaks the platform's protocol itself; this
/// trait is the whole surface it relies on.
#[async_trait]
pub trait ThreadPlatform: Send + Sync {
    /// Threads currently attached to a channel.
    async fn list_threads(&self, channel_id: &str) -> Result<Vec<ThreadInfo>, ThreadError>;

    /// Create a new thread in a channel, returning its platform id.
    async fn create_thread(&self, channel_id: &str, title: &str) -> Result<String, ThreadError>;

    /// Post a message into a thread (or a plain channel), returning the
    /// platform's message id.
    async fn post_message(&self, thread_id: &str, content: &str) -> Result<String, ThreadError>;

    /// A user-clickable URL for a thread, used in duplicate notices.
    fn thread_url(&self, thread_id: &str) -> String;
}
