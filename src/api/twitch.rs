//! Twitch Helix API client

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{ApiClient, ApiError, ApiResult, MAX_BATCH_SIZE};
use crate::models::{
    ChannelDetails, Game, StreamDetails, TopStreamQuery, UserFollow, VodDetails, VodQuery,
};

const HELIX_URL: &str = "https://api.twitch.tv/helix";
const CHANNEL_URL: &str = "https://www.twitch.tv";
const THUMBNAIL_SIZE: (&str, &str) = ("320", "180");
/// Upper bound on follow list pages walked during an import
const MAX_FOLLOW_PAGES: usize = 50;

#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Vec<T>,
    #[serde(default)]
    pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
struct Pagination {
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HelixUser {
    id: String,
    login: String,
    display_name: String,
    #[serde(default)]
    broadcaster_type: String,
}

#[derive(Debug, Deserialize)]
struct HelixStream {
    user_login: String,
    user_name: String,
    #[serde(default)]
    game_name: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    viewer_count: u64,
    #[serde(default)]
    started_at: String,
    #[serde(default)]
    thumbnail_url: String,
}

#[derive(Debug, Deserialize)]
struct HelixFollow {
    broadcaster_login: String,
    broadcaster_name: String,
    #[serde(default)]
    followed_at: String,
}

#[derive(Debug, Deserialize)]
struct HelixGame {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct HelixSearchChannel {
    broadcaster_login: String,
    display_name: String,
    #[serde(default)]
    game_name: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    is_live: bool,
    #[serde(default)]
    started_at: String,
    #[serde(default)]
    thumbnail_url: String,
}

#[derive(Debug, Deserialize)]
struct HelixVideo {
    id: String,
    user_login: String,
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    view_count: u64,
    #[serde(default)]
    duration: String,
    #[serde(default)]
    thumbnail_url: String,
}

impl From<HelixStream> for StreamDetails {
    fn from(s: HelixStream) -> Self {
        StreamDetails {
            channel_id: s.user_login,
            display_name: s.user_name,
            title: s.title,
            game: s.game_name,
            viewers: s.viewer_count,
            started_at: parse_timestamp(&s.started_at),
            thumbnail_url: sized_thumbnail(&s.thumbnail_url),
        }
    }
}

impl From<HelixUser> for ChannelDetails {
    fn from(u: HelixUser) -> Self {
        ChannelDetails {
            id: u.login,
            user_id: u.id,
            display_name: u.display_name,
            is_partner: u.broadcaster_type == "partner",
        }
    }
}

impl HelixVideo {
    fn into_vod(self) -> VodDetails {
        VodDetails {
            id: self.id,
            url: self.url,
            stream_id: self.user_login,
            title: self.title,
            length: self.duration,
            views: self.view_count,
            recorded_at: parse_timestamp(&self.created_at),
            preview_url: sized_thumbnail(&self.thumbnail_url.replace('%', "")),
        }
    }
}

/// Parse an RFC 3339 timestamp into Unix seconds, empty strings yield `None`
fn parse_timestamp(value: &str) -> Option<i64> {
    if value.is_empty() {
        return None;
    }
    chrono::DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.timestamp())
}

fn sized_thumbnail(template: &str) -> Option<String> {
    if template.is_empty() {
        return None;
    }
    Some(
        template
            .replace("{width}", THUMBNAIL_SIZE.0)
            .replace("{height}", THUMBNAIL_SIZE.1),
    )
}

/// Helix accepts a single `type` filter, anything else is asked for as "all"
fn video_type_param(vod_types: &[String]) -> &str {
    match vod_types {
        [single] if !single.is_empty() => single.as_str(),
        _ => "all",
    }
}

/// Merge live search hits with viewer counts; counts stay at zero when the
/// streams lookup failed
fn with_viewer_counts(
    live: Vec<HelixSearchChannel>,
    streams: ApiResult<Vec<StreamDetails>>,
) -> Vec<StreamDetails> {
    let streams = streams.unwrap_or_else(|e| {
        warn!("viewer counts for search results unavailable: {}", e);
        Vec::new()
    });

    live.into_iter()
        .map(|c| {
            let count = streams
                .iter()
                .find(|s| s.channel_id == c.broadcaster_login)
                .map(|s| s.viewers)
                .unwrap_or(0);
            StreamDetails {
                channel_id: c.broadcaster_login,
                display_name: c.display_name,
                title: c.title,
                game: c.game_name,
                viewers: count,
                started_at: parse_timestamp(&c.started_at),
                thumbnail_url: sized_thumbnail(&c.thumbnail_url),
            }
        })
        .collect()
}

pub struct TwitchClient {
    client_id: String,
    oauth_token: String,
    base_url: String,
    agent: ureq::Agent,
}

impl TwitchClient {
    pub fn new(client_id: &str, oauth_token: &str) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(30)))
            .timeout_connect(Some(Duration::from_secs(10)))
            .http_status_as_error(false)
            .build()
            .new_agent();

        Self {
            client_id: client_id.trim().to_string(),
            oauth_token: oauth_token.trim().trim_start_matches("oauth:").to_string(),
            base_url: HELIX_URL.to_string(),
            agent,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> ApiResult<Url> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| ApiError::Transport(format!("bad url: {}", e)))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn get_page<T: DeserializeOwned>(&self, url: Url) -> ApiResult<Page<T>> {
        if self.client_id.is_empty() {
            return Err(ApiError::MissingCredentials("Twitch"));
        }

        debug!(url = %url, "GET");
        let mut request = self
            .agent
            .get(url.as_str())
            .header("Client-Id", self.client_id.as_str())
            .header("Accept", "application/json");
        if !self.oauth_token.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.oauth_token));
        }

        let mut response = request.call()?;
        let status = response.status().as_u16();
        if status != 200 {
            warn!(status, url = %url, "twitch request failed");
            return Err(ApiError::Status {
                code: status,
                url: url.to_string(),
            });
        }

        let body = response.body_mut().read_to_string()?;
        Ok(serde_json::from_str(&body)?)
    }

    fn get_users(&self, logins: &[String]) -> ApiResult<Vec<HelixUser>> {
        if logins.is_empty() {
            return Ok(Vec::new());
        }
        let mut users = Vec::with_capacity(logins.len());
        for chunk in logins.chunks(MAX_BATCH_SIZE) {
            let params: Vec<(&str, &str)> = chunk.iter().map(|l| ("login", l.as_str())).collect();
            let url = self.endpoint("users", &params)?;
            users.extend(self.get_page::<HelixUser>(url)?.data);
        }
        Ok(users)
    }

    fn get_user(&self, login: &str) -> ApiResult<HelixUser> {
        self.get_users(&[login.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound(login.to_string()))
    }

    fn get_videos_page(
        &self,
        user_id: &str,
        video_type: &str,
        first: usize,
        after: Option<&str>,
    ) -> ApiResult<Page<HelixVideo>> {
        let first = first.to_string();
        let mut params = vec![
            ("user_id", user_id),
            ("type", video_type),
            ("first", first.as_str()),
        ];
        if let Some(cursor) = after {
            params.push(("after", cursor));
        }
        let url = self.endpoint("videos", &params)?;
        self.get_page(url)
    }
}

impl ApiClient for TwitchClient {
    fn name(&self) -> &str {
        "Twitch"
    }

    fn vod_types(&self) -> Vec<String> {
        vec![
            "archive".to_string(),
            "highlight".to_string(),
            "upload".to_string(),
        ]
    }

    fn channel_url(&self, channel_id: &str) -> String {
        format!("{}/{}/", CHANNEL_URL, channel_id)
    }

    fn get_user_follows(&self, username: &str) -> ApiResult<Vec<UserFollow>> {
        let user = self.get_user(username)?;
        let mut follows = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_FOLLOW_PAGES {
            let mut params = vec![("user_id", user.id.as_str()), ("first", "100")];
            if let Some(ref c) = cursor {
                params.push(("after", c.as_str()));
            }
            let url = self.endpoint("channels/followed", &params)?;
            let page = self.get_page::<HelixFollow>(url)?;

            follows.extend(page.data.into_iter().map(|f| UserFollow {
                channel_id: f.broadcaster_login,
                display_name: f.broadcaster_name,
                followed_at: parse_timestamp(&f.followed_at),
            }));

            match page.pagination.cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(follows)
    }

    fn get_channel_details(&self, channel_id: &str) -> ApiResult<ChannelDetails> {
        self.get_user(channel_id).map(ChannelDetails::from)
    }

    fn get_channels_details(&self, channel_ids: &[String]) -> ApiResult<Vec<ChannelDetails>> {
        Ok(self
            .get_users(channel_ids)?
            .into_iter()
            .map(ChannelDetails::from)
            .collect())
    }

    fn get_stream_details(&self, channel_id: &str) -> ApiResult<Option<StreamDetails>> {
        Ok(self
            .get_streams_details(&[channel_id.to_string()])?
            .into_iter()
            .next())
    }

    fn get_streams_details(&self, channel_ids: &[String]) -> ApiResult<Vec<StreamDetails>> {
        let mut streams = Vec::new();
        for chunk in channel_ids.chunks(MAX_BATCH_SIZE) {
            let first = chunk.len().to_string();
            let mut params: Vec<(&str, &str)> =
                chunk.iter().map(|id| ("user_login", id.as_str())).collect();
            params.push(("first", first.as_str()));
            let url = self.endpoint("streams", &params)?;
            streams.extend(
                self.get_page::<HelixStream>(url)?
                    .data
                    .into_iter()
                    .map(StreamDetails::from),
            );
        }
        Ok(streams)
    }

    fn get_top_games(&self, take: usize) -> ApiResult<Vec<Game>> {
        let first = take.clamp(1, 100).to_string();
        let url = self.endpoint("games/top", &[("first", first.as_str())])?;
        Ok(self
            .get_page::<HelixGame>(url)?
            .data
            .into_iter()
            .map(|g| Game { id: g.id, name: g.name })
            .collect())
    }

    fn search_streams(&self, query: &str) -> ApiResult<Vec<StreamDetails>> {
        let url = self.endpoint(
            "search/channels",
            &[("query", query), ("live_only", "true"), ("first", "50")],
        )?;
        let live: Vec<HelixSearchChannel> = self
            .get_page::<HelixSearchChannel>(url)?
            .data
            .into_iter()
            .filter(|c| c.is_live)
            .collect();

        // Search results carry no viewer counts, fill them from the streams endpoint
        let ids: Vec<String> = live.iter().map(|c| c.broadcaster_login.clone()).collect();
        Ok(with_viewer_counts(live, self.get_streams_details(&ids)))
    }

    fn search_games(&self, query: &str) -> ApiResult<Vec<Game>> {
        let url = self.endpoint("search/categories", &[("query", query), ("first", "25")])?;
        Ok(self
            .get_page::<HelixGame>(url)?
            .data
            .into_iter()
            .map(|g| Game { id: g.id, name: g.name })
            .collect())
    }

    fn get_top_streams(&self, query: &TopStreamQuery) -> ApiResult<Vec<StreamDetails>> {
        let first = query.take.clamp(1, 100).to_string();
        let mut params = vec![("first", first.as_str())];
        if let Some(ref game_id) = query.game_id {
            params.push(("game_id", game_id.as_str()));
        }
        let url = self.endpoint("streams", &params)?;
        Ok(self
            .get_page::<HelixStream>(url)?
            .data
            .into_iter()
            .map(StreamDetails::from)
            .collect())
    }

    /// Helix pages by cursor, so the offset is reached by walking cursors
    /// from the first page before reading the requested window.
    fn get_vods(&self, query: &VodQuery) -> ApiResult<Vec<VodDetails>> {
        let user = self.get_user(&query.stream_id)?;
        let video_type = video_type_param(&query.vod_types);

        let mut cursor: Option<String> = None;
        let mut remaining = query.skip;
        while remaining > 0 {
            let step = remaining.min(100);
            let page = self.get_videos_page(&user.id, video_type, step, cursor.as_deref())?;
            let fetched = page.data.len();
            match page.pagination.cursor {
                Some(next) if fetched > 0 && !next.is_empty() => cursor = Some(next),
                _ => return Ok(Vec::new()),
            }
            remaining = remaining.saturating_sub(fetched);
        }

        let take = query.take.clamp(1, 100);
        let page = self.get_videos_page(&user.id, video_type, take, cursor.as_deref())?;
        Ok(page.data.into_iter().map(HelixVideo::into_vod).collect())
    }
}
