//! Streaming platform API clients
//!
//! Every platform is reached through the [`ApiClient`] trait so the monitor,
//! the VOD browser and the UI never depend on a concrete vendor.

mod twitch;

#[cfg(test)]
pub mod fake;

pub use twitch::TwitchClient;

use std::sync::Arc;
use thiserror::Error;

use crate::models::{
    ChannelDetails, Game, StreamDetails, TopStreamQuery, UserFollow, VodDetails, VodQuery,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("HTTP {code} from {url}")]
    Status { code: u16, url: String },
    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("channel '{0}' not found")]
    NotFound(String),
    #[error("no client id configured for {0}, set one in Settings")]
    MissingCredentials(&'static str),
}

impl ApiError {
    /// Whether the requested channel/stream does not exist on the platform
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_) | ApiError::Status { code: 404, .. })
    }
}

impl From<ureq::Error> for ApiError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::StatusCode(code) => ApiError::Status {
                code,
                url: String::new(),
            },
            other => ApiError::Transport(other.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Largest number of channel ids accepted by one batched request
pub const MAX_BATCH_SIZE: usize = 100;

/// Read-only view of a streaming platform
pub trait ApiClient: Send + Sync {
    /// Name shown in the UI
    fn name(&self) -> &str;

    /// VOD type filters this platform understands, first one is the default
    fn vod_types(&self) -> Vec<String>;

    fn has_vod_viewer_support(&self) -> bool {
        !self.vod_types().is_empty()
    }

    /// Base URL of a channel page, used to build player and chat links
    fn channel_url(&self, channel_id: &str) -> String;

    fn get_user_follows(&self, username: &str) -> ApiResult<Vec<UserFollow>>;

    fn get_channel_details(&self, channel_id: &str) -> ApiResult<ChannelDetails>;

    fn get_channels_details(&self, channel_ids: &[String]) -> ApiResult<Vec<ChannelDetails>>;

    /// Returns `None` when the channel is offline
    fn get_stream_details(&self, channel_id: &str) -> ApiResult<Option<StreamDetails>>;

    /// Returns only the channels that are currently live
    fn get_streams_details(&self, channel_ids: &[String]) -> ApiResult<Vec<StreamDetails>>;

    fn get_top_games(&self, take: usize) -> ApiResult<Vec<Game>>;

    fn search_streams(&self, query: &str) -> ApiResult<Vec<StreamDetails>>;

    fn search_games(&self, query: &str) -> ApiResult<Vec<Game>>;

    fn get_top_streams(&self, query: &TopStreamQuery) -> ApiResult<Vec<StreamDetails>>;

    fn get_vods(&self, query: &VodQuery) -> ApiResult<Vec<VodDetails>>;
}

/// Registry of the configured platform clients
#[derive(Clone, Default)]
pub struct ApiClientFactory {
    clients: Vec<Arc<dyn ApiClient>>,
}

impl ApiClientFactory {
    pub fn new(clients: Vec<Arc<dyn ApiClient>>) -> Self {
        Self { clients }
    }

    pub fn get_all(&self) -> &[Arc<dyn ApiClient>] {
        &self.clients
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ApiClient>> {
        self.clients.iter().find(|c| c.name() == name).cloned()
    }

    /// The default client, used for followed channels
    pub fn primary(&self) -> Option<Arc<dyn ApiClient>> {
        self.clients.first().cloned()
    }

    /// Clients that can list VODs
    pub fn vod_clients(&self) -> Vec<Arc<dyn ApiClient>> {
        self.clients
            .iter()
            .filter(|c| c.has_vod_viewer_support())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeClient;
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(ApiError::NotFound("x".into()).is_not_found());
        assert!(ApiError::Status { code: 404, url: "u".into() }.is_not_found());
        assert!(!ApiError::Status { code: 500, url: "u".into() }.is_not_found());
        assert!(!ApiError::Transport("timeout".into()).is_not_found());
    }

    #[test]
    fn test_ureq_status_maps_to_status_error() {
        let err: ApiError = ureq::Error::StatusCode(404).into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_factory_lookup() {
        let mut no_vods = FakeClient::new();
        no_vods.name = "NoVods".to_string();
        no_vods.vod_types = Vec::new();
        let factory = ApiClientFactory::new(vec![
            Arc::new(FakeClient::new()),
            Arc::new(no_vods),
        ]);

        assert_eq!(factory.get_all().len(), 2);
        assert_eq!(factory.primary().unwrap().name(), "Fake");
        assert!(factory.get("NoVods").is_some());
        assert!(factory.get("Missing").is_none());

        let vod_clients = factory.vod_clients();
        assert_eq!(vod_clients.len(), 1);
        assert_eq!(vod_clients[0].name(), "Fake");
    }
}
