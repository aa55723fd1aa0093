//! Followed channels and their live status
//!
//! A refresh is split in two halves: [`fetch_statuses`] runs on a worker
//! thread and only talks to the API, [`MonitorStreamsModel::apply_refresh`]
//! runs on the UI thread and mutates the channel list in place.

use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, ApiResult, MAX_BATCH_SIZE};
use crate::config::{load_followed_channels, save_followed_channels, Settings};
use crate::models::{ChannelData, ChannelDetails, StreamDetails, UserFollow};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("channel name is empty")]
    EmptyName,
    #[error("already following '{0}'")]
    AlreadyFollowed(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Notifications published to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    ChannelWentLive(ChannelData),
    ChannelsChanged,
    RefreshComplete { updated: usize, failed: usize },
}

/// Status of one batch of channels
#[derive(Debug, Default)]
pub struct BatchStatus {
    pub details: Vec<ChannelDetails>,
    pub streams: Vec<StreamDetails>,
}

#[derive(Debug)]
pub struct BatchResult {
    pub ids: Vec<String>,
    pub result: ApiResult<BatchStatus>,
}

/// Everything fetched during one refresh cycle
#[derive(Debug, Default)]
pub struct RefreshOutcome {
    pub batches: Vec<BatchResult>,
}

/// Request live status and channel details for `ids`, in batches
pub fn fetch_statuses(client: &dyn ApiClient, ids: &[String]) -> RefreshOutcome {
    let batches = ids
        .chunks(MAX_BATCH_SIZE)
        .map(|chunk| {
            let result = client.get_streams_details(chunk).and_then(|streams| {
                let details = client.get_channels_details(chunk)?;
                Ok(BatchStatus { details, streams })
            });
            if let Err(ref e) = result {
                warn!(batch = chunk.len(), "status refresh failed: {}", e);
            }
            BatchResult {
                ids: chunk.to_vec(),
                result,
            }
        })
        .collect();

    RefreshOutcome { batches }
}

/// Look up a channel before following it
pub fn validate_new_channel(client: &dyn ApiClient, channel_id: &str) -> Result<ChannelDetails, MonitorError> {
    let id = channel_id.trim().to_lowercase();
    if id.is_empty() {
        return Err(MonitorError::EmptyName);
    }
    Ok(client.get_channel_details(&id)?)
}

pub fn fetch_follows(client: &dyn ApiClient, username: &str) -> Result<Vec<UserFollow>, MonitorError> {
    let username = username.trim().to_lowercase();
    if username.is_empty() {
        return Err(MonitorError::EmptyName);
    }
    Ok(client.get_user_follows(&username)?)
}

pub struct MonitorStreamsModel {
    followed: Vec<ChannelData>,
    selected: Option<String>,
    subscribers: Vec<Sender<MonitorEvent>>,
    channels_path: Option<PathBuf>,
    refresh_in_flight: bool,
}

impl MonitorStreamsModel {
    /// In-memory model, nothing is persisted
    pub fn new() -> Self {
        Self {
            followed: Vec::new(),
            selected: None,
            subscribers: Vec::new(),
            channels_path: None,
            refresh_in_flight: false,
        }
    }

    /// Model backed by a followed channels file
    pub fn load(path: PathBuf) -> Self {
        let mut model = Self::new();
        for id in load_followed_channels(&path) {
            if !id.trim().is_empty() && !model.is_following(&id) {
                model.followed.push(ChannelData::new(&id));
            }
        }
        info!(count = model.followed.len(), "loaded followed channels");
        model.channels_path = Some(path);
        model
    }

    pub fn subscribe(&mut self) -> Receiver<MonitorEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    fn publish(&mut self, event: MonitorEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn persist(&self) {
        if let Some(ref path) = self.channels_path {
            save_followed_channels(path, &self.channel_ids());
        }
    }

    pub fn followed_channels(&self) -> &[ChannelData] {
        &self.followed
    }

    /// Live channels first by viewers, then offline channels by name
    pub fn sorted_channels(&self) -> Vec<&ChannelData> {
        let mut channels: Vec<&ChannelData> = self.followed.iter().collect();
        channels.sort_by(|a, b| {
            b.live
                .cmp(&a.live)
                .then(b.viewers.cmp(&a.viewers))
                .then_with(|| a.display_name.to_lowercase().cmp(&b.display_name.to_lowercase()))
        });
        channels
    }

    pub fn channel_ids(&self) -> Vec<String> {
        self.followed.iter().map(|c| c.id.clone()).collect()
    }

    pub fn is_following(&self, channel_id: &str) -> bool {
        self.followed.iter().any(|c| c.id.eq_ignore_ascii_case(channel_id.trim()))
    }

    pub fn live_count(&self) -> usize {
        self.followed.iter().filter(|c| c.live).count()
    }

    pub fn select(&mut self, channel_id: Option<&str>) {
        self.selected = channel_id.map(str::to_string);
    }

    pub fn selected_channel(&self) -> Option<&ChannelData> {
        let id = self.selected.as_deref()?;
        self.followed.iter().find(|c| c.id == id)
    }

    /// Follow a channel that has been validated against the API
    pub fn add_stream(&mut self, details: &ChannelDetails) -> Result<(), MonitorError> {
        if self.is_following(&details.id) {
            return Err(MonitorError::AlreadyFollowed(details.id.clone()));
        }
        let mut channel = ChannelData::new(&details.id);
        channel.display_name = details.display_name.clone();
        channel.is_partner = details.is_partner;
        self.followed.push(channel);

        info!(channel = %details.id, "following channel");
        self.persist();
        self.publish(MonitorEvent::ChannelsChanged);
        Ok(())
    }

    pub fn remove_stream(&mut self, channel_id: &str) -> bool {
        let before = self.followed.len();
        self.followed.retain(|c| c.id != channel_id);
        if self.followed.len() == before {
            return false;
        }
        if self.selected.as_deref() == Some(channel_id) {
            self.selected = None;
        }
        info!(channel = %channel_id, "unfollowed channel");
        self.persist();
        self.publish(MonitorEvent::ChannelsChanged);
        true
    }

    /// Add every followed channel of an imported follow list that is not tracked yet
    pub fn import_follows(&mut self, follows: &[UserFollow]) -> usize {
        let mut added = 0;
        for follow in follows {
            if follow.channel_id.trim().is_empty() || self.is_following(&follow.channel_id) {
                continue;
            }
            let mut channel = ChannelData::new(&follow.channel_id);
            channel.display_name = follow.display_name.clone();
            self.followed.push(channel);
            added += 1;
        }
        if added > 0 {
            info!(added, "imported follows");
            self.persist();
            self.publish(MonitorEvent::ChannelsChanged);
        }
        added
    }

    /// Marks a refresh as started, false when one is already running
    pub fn begin_refresh(&mut self) -> bool {
        if self.refresh_in_flight {
            return false;
        }
        self.refresh_in_flight = true;
        true
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh_in_flight
    }

    /// Apply fetched statuses. Channels of failed batches keep their previous
    /// state; the completion event is published regardless.
    pub fn apply_refresh(&mut self, outcome: RefreshOutcome, settings: &Settings) -> (usize, usize) {
        let mut updated = 0;
        let mut failed = 0;
        let mut went_live = Vec::new();

        for batch in outcome.batches {
            let status = match batch.result {
                Ok(status) => status,
                Err(_) => {
                    failed += batch.ids.len();
                    continue;
                }
            };

            for id in &batch.ids {
                let Some(channel) = self.followed.iter_mut().find(|c| &c.id == id) else {
                    continue;
                };
                let was_live = channel.live;
                let had_status = channel.status_known;

                if let Some(details) = status.details.iter().find(|d| d.id.eq_ignore_ascii_case(id)) {
                    channel.is_partner = details.is_partner;
                    channel.display_name = details.display_name.clone();
                }

                match status.streams.iter().find(|s| s.channel_id.eq_ignore_ascii_case(id)) {
                    Some(stream) => {
                        channel.live = true;
                        channel.viewers = stream.viewers;
                        channel.title = stream.title.clone();
                        channel.game = stream.game.clone();
                        channel.live_since = stream.started_at;
                    }
                    None => channel.set_offline(),
                }
                channel.status_known = true;
                updated += 1;

                if channel.live
                    && !was_live
                    && had_status
                    && !settings.is_excluded_from_notifying(&channel.id)
                {
                    went_live.push(channel.clone());
                }
            }
        }

        self.refresh_in_flight = false;
        debug!(updated, failed, "refresh applied");

        for channel in went_live {
            self.publish(MonitorEvent::ChannelWentLive(channel));
        }
        self.publish(MonitorEvent::RefreshComplete { updated, failed });
        (updated, failed)
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
