//! YouTube source adapter — fetches video metadata from the Data API v3.

use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use precis_core::{ContentFingerprint, FetchedContent, Link};

use crate::error::FetchError;
use crate::source::SourceAdapter;

fn video_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap())
}

pub struct YouTubeSource {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl YouTubeSource {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }

    /// Extract the 11-character video id from a normalized YouTube URL.
    pub fn video_id(url: &Url) -> Option<String> {
        let host = url.host_str()?;
        let candidate = match host {
            "youtu.be" => url.path_segments()?.next().map(str::to_string),
            "youtube.com" | "m.youtube.com" | "music.youtube.com" => {
                let mut segments = url.path_segments()?;
                match segments.next() {
                    Some("watch") => url
                        .query_pairs()
                        .find(|(k, _)| k == "v")
                        .map(|(_, v)| v.into_owned()),
                    Some("shorts") | Some("live") | Some("embed") => {
                        segments.next().map(str::to_string)
                    }
                    _ => None,
                }
            }
            _ => None,
        }?;
        video_id_re().is_match(&candidate).then_some(candidate)
    }
}

#[async_trait]
impl SourceAdapter for YouTubeSource {
    fn id(&self) -> &str {
        "youtube"
    }

    fn can_handle(&self, url: &Url) -> bool {
        Self::video_id(url).is_some()
    }

    async fn fetch(&self, link: &Link) -> Result<FetchedContent, FetchError> {
        let video_id = Self::video_id(&link.url).ok_or_else(|| {
            FetchError::Permanent(format!("no video id in URL: {}", link.url))
        })?;

        debug!(%video_id, "fetching YouTube video metadata");

        let endpoint = format!("{}/videos", self.base_url);
        let resp = self
            .client
            .get(&endpoint)
            .query(&[
                ("part", "snippet,contentDetails,statistics"),
                ("id", video_id.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 429 || status >= 500 {
            return Err(FetchError::Transient(format!("YouTube API HTTP {status}")));
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "YouTube API error");
            return Err(FetchError::Permanent(format!("YouTube API HTTP {status}")));
        }

        let listing: VideoListing = resp
            .json()
            .await
            .map_err(|e| FetchError::Permanent(format!("bad YouTube response: {e}")))?;

        let item = listing
            .items
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::Permanent(format!("video {video_id} not found")))?;

        Ok(FetchedContent {
            fingerprint: ContentFingerprint::from_url(&link.url),
            source_id: self.id().to_string(),
            title: item.snippet.title.clone(),
            author: item.snippet.channel_title.clone(),
            body: item.snippet.description.clone(),
            metadata: serde_json::json!({
                "video_id": video_id,
                "published_at": item.snippet.published_at,
                "duration": item.content_details.map(|d| d.duration),
                "views": item.statistics.as_ref().and_then(|s| s.view_count.clone()),
                "likes": item.statistics.as_ref().and_then(|s| s.like_count.clone()),
                "comments": item.statistics.as_ref().and_then(|s| s.comment_count.clone()),
            }),
            fetched_at: Utc::now(),
        })
    }
}

#[derive(Deserialize)]
struct VideoListing {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Deserialize)]
struct VideoItem {
    snippet: VideoSnippet,
    #[serde(rename = "contentDetails")]
    content_details: Option<ContentDetails>,
    statistics: Option<VideoStatistics>,
}

#[derive(Deserialize)]
struct VideoSnippet {
    title: String,
    #[serde(rename = "channelTitle", default)]
    channel_title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "publishedAt", default)]
    published_at: String,
}

#[derive(Deserialize)]
struct ContentDetails {
    duration: String,
}

#[derive(Deserialize)]
struct VideoStatistics {
    #[serde(rename = "viewCount")]
    view_count: Option<String>,
    #[serde(rename = "likeCount")]
    like_count: Option<String>,
    #[serde(rename = "commentCount")]
    comment_count: Option<String>,
}
