//! Data models for Livestream Monitor

use serde::{Deserialize, Serialize};
use std::fmt;

/// UI Tab selection
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tab {
    Channels,
    Vods,
    TopStreams,
    Search,
    Settings,
    Console,
}

/// Stream quality passed to the external player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StreamQuality {
    #[default]
    Source,
    High,
    Medium,
    Low,
    Mobile,
    AudioOnly,
}

impl StreamQuality {
    pub const ALL: [StreamQuality; 6] = [
        StreamQuality::Source,
        StreamQuality::High,
        StreamQuality::Medium,
        StreamQuality::Low,
        StreamQuality::Mobile,
        StreamQuality::AudioOnly,
    ];

    /// Quality argument in livestreamer's Twitch naming, which streamlink
    /// still accepts for Twitch streams
    pub fn player_arg(&self) -> &'static str {
        match self {
            StreamQuality::Source => "source",
            StreamQuality::High => "high",
            StreamQuality::Medium => "medium",
            StreamQuality::Low => "low",
            StreamQuality::Mobile => "mobile",
            StreamQuality::AudioOnly => "audio_only",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StreamQuality::Source => "Source",
            StreamQuality::High => "High",
            StreamQuality::Medium => "Medium",
            StreamQuality::Low => "Low",
            StreamQuality::Mobile => "Mobile",
            StreamQuality::AudioOnly => "Audio Only",
        }
    }
}

impl fmt::Display for StreamQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A followed channel and its last known status.
///
/// Mutated in place on every refresh; only the latest status is kept.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelData {
    /// Login name, used as the channel identifier
    pub id: String,
    pub display_name: String,
    pub is_partner: bool,
    pub live: bool,
    pub viewers: u64,
    pub title: String,
    pub game: String,
    /// Unix timestamp of the current broadcast start
    pub live_since: Option<i64>,
    /// Set once a refresh has reported this channel, went-live is only
    /// detected against a known previous status
    pub status_known: bool,
}

impl ChannelData {
    pub fn new(id: &str) -> Self {
        let id = id.trim().to_lowercase();
        Self {
            display_name: id.clone(),
            id,
            ..Default::default()
        }
    }

    /// Clear the live-only fields after the channel goes offline
    pub fn set_offline(&mut self) {
        self.live = false;
        self.viewers = 0;
        self.live_since = None;
    }
}

/// Channel details as returned by the user lookup endpoints
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelDetails {
    pub id: String,
    pub user_id: String,
    pub display_name: String,
    pub is_partner: bool,
}

/// A live stream as returned by the stream endpoints
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDetails {
    pub channel_id: String,
    pub display_name: String,
    pub title: String,
    pub game: String,
    pub viewers: u64,
    pub started_at: Option<i64>,
    pub thumbnail_url: Option<String>,
}

/// A single recorded broadcast
#[derive(Debug, Clone, PartialEq)]
pub struct VodDetails {
    pub id: String,
    pub url: String,
    pub stream_id: String,
    pub title: String,
    pub length: String,
    pub views: u64,
    pub recorded_at: Option<i64>,
    pub preview_url: Option<String>,
}

impl VodDetails {
    /// VOD details carrying only a URL, for links typed in by the user
    pub fn from_url(url: &str) -> Self {
        Self {
            id: String::new(),
            url: url.to_string(),
            stream_id: String::new(),
            title: String::new(),
            length: String::new(),
            views: 0,
            recorded_at: None,
            preview_url: None,
        }
    }
}

/// One page request for a channel's VODs
#[derive(Debug, Clone, PartialEq)]
pub struct VodQuery {
    pub stream_id: String,
    pub vod_types: Vec<String>,
    pub skip: usize,
    pub take: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Game {
    pub id: String,
    pub name: String,
}

/// Query for the top streams listing
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopStreamQuery {
    pub game_id: Option<String>,
    pub take: usize,
}

/// Entry of a user's follow list
#[derive(Debug, Clone, PartialEq)]
pub struct UserFollow {
    pub channel_id: String,
    pub display_name: String,
    pub followed_at: Option<i64>,
}

/// Message shown to the user in a popup window
#[derive(Debug, Clone, PartialEq)]
pub struct UserMessage {
    pub title: String,
    pub text: String,
}

impl UserMessage {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            title: "Error".to_string(),
            text: text.into(),
        }
    }
}
