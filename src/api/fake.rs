//! In-memory client used by tests

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::{ApiClient, ApiError, ApiResult};
use crate::models::{
    ChannelDetails, Game, StreamDetails, TopStreamQuery, UserFollow, VodDetails, VodQuery,
};

pub struct FakeClient {
    pub name: String,
    pub vod_types: Vec<String>,
    pub channels: HashMap<String, ChannelDetails>,
    pub live: HashMap<String, StreamDetails>,
    /// Any batch containing one of these ids fails as a whole
    pub failing: HashSet<String>,
    pub follows: HashMap<String, Vec<UserFollow>>,
    pub vods: HashMap<String, Vec<VodDetails>>,
    /// Status code returned by every VOD request when set
    pub vod_status: Option<u16>,
    pub vod_queries: Mutex<Vec<VodQuery>>,
    pub batch_sizes: Mutex<Vec<usize>>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self {
            name: "Fake".to_string(),
            vod_types: vec!["archive".to_string(), "highlight".to_string()],
            channels: HashMap::new(),
            live: HashMap::new(),
            failing: HashSet::new(),
            follows: HashMap::new(),
            vods: HashMap::new(),
            vod_status: None,
            vod_queries: Mutex::new(Vec::new()),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_channel(mut self, id: &str, is_partner: bool) -> Self {
        self.channels.insert(
            id.to_string(),
            ChannelDetails {
                id: id.to_string(),
                user_id: format!("uid-{}", id),
                display_name: id.to_uppercase(),
                is_partner,
            },
        );
        self
    }

    pub fn with_live(mut self, id: &str, viewers: u64) -> Self {
        self.live.insert(
            id.to_string(),
            StreamDetails {
                channel_id: id.to_string(),
                display_name: id.to_uppercase(),
                title: format!("{} live", id),
                game: "Chess".to_string(),
                viewers,
                started_at: Some(1_700_000_000),
                thumbnail_url: None,
            },
        );
        self
    }

    pub fn with_vods(mut self, id: &str, count: usize) -> Self {
        let vods = (0..count)
            .map(|i| VodDetails {
                id: format!("v{}", i),
                url: format!("https://www.twitch.tv/videos/{}", i),
                stream_id: id.to_string(),
                title: format!("Broadcast {}", i),
                length: "1h0m0s".to_string(),
                views: i as u64,
                recorded_at: None,
                preview_url: None,
            })
            .collect();
        self.vods.insert(id.to_string(), vods);
        self
    }

    fn check_batch(&self, ids: &[String]) -> ApiResult<()> {
        self.batch_sizes.lock().unwrap().push(ids.len());
        if ids.iter().any(|id| self.failing.contains(id)) {
            return Err(ApiError::Status {
                code: 503,
                url: "fake://batch".to_string(),
            });
        }
        Ok(())
    }
}

impl ApiClient for FakeClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn vod_types(&self) -> Vec<String> {
        self.vod_types.clone()
    }

    fn channel_url(&self, channel_id: &str) -> String {
        format!("https://www.twitch.tv/{}/", channel_id)
    }

    fn get_user_follows(&self, username: &str) -> ApiResult<Vec<UserFollow>> {
        self.follows
            .get(username)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(username.to_string()))
    }

    fn get_channel_details(&self, channel_id: &str) -> ApiResult<ChannelDetails> {
        self.channels
            .get(channel_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(channel_id.to_string()))
    }

    fn get_channels_details(&self, channel_ids: &[String]) -> ApiResult<Vec<ChannelDetails>> {
        self.check_batch(channel_ids)?;
        Ok(channel_ids
            .iter()
            .filter_map(|id| self.channels.get(id).cloned())
            .collect())
    }

    fn get_stream_details(&self, channel_id: &str) -> ApiResult<Option<StreamDetails>> {
        Ok(self.live.get(channel_id).cloned())
    }

    fn get_streams_details(&self, channel_ids: &[String]) -> ApiResult<Vec<StreamDetails>> {
        self.check_batch(channel_ids)?;
        Ok(channel_ids
            .iter()
            .filter_map(|id| self.live.get(id).cloned())
            .collect())
    }

    fn get_top_games(&self, take: usize) -> ApiResult<Vec<Game>> {
        Ok(vec![Game { id: "1".into(), name: "Chess".into() }]
            .into_iter()
            .take(take)
            .collect())
    }

    fn search_streams(&self, query: &str) -> ApiResult<Vec<StreamDetails>> {
        Ok(self
            .live
            .values()
            .filter(|s| s.channel_id.contains(query))
            .cloned()
            .collect())
    }

    fn search_games(&self, query: &str) -> ApiResult<Vec<Game>> {
        Ok(self
            .get_top_games(10)?
            .into_iter()
            .filter(|g| g.name.to_lowercase().contains(&query.to_lowercase()))
            .collect())
    }

    fn get_top_streams(&self, query: &TopStreamQuery) -> ApiResult<Vec<StreamDetails>> {
        Ok(self.live.values().take(query.take).cloned().collect())
    }

    fn get_vods(&self, query: &VodQuery) -> ApiResult<Vec<VodDetails>> {
        self.vod_queries.lock().unwrap().push(query.clone());
        if let Some(code) = self.vod_status {
            return Err(ApiError::Status {
                code,
                url: "fake://videos".to_string(),
            });
        }
        let vods = self
            .vods
            .get(&query.stream_id)
            .ok_or_else(|| ApiError::NotFound(query.stream_id.clone()))?;
        Ok(vods.iter().skip(query.skip).take(query.take).cloned().collect())
    }
}
