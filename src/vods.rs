//! Paged VOD browser state
//!
//! Paging is stateless: page N always re-requests skip = (N - 1) * page size
//! and the displayed items are replaced wholesale by each response.

use tracing::{debug, warn};
use url::Url;

use crate::api::{ApiClient, ApiError};
use crate::models::{UserMessage, VodDetails, VodQuery};

pub const VOD_TILES_PER_PAGE: usize = 15;

/// Rows to skip for a 1-based page number
pub fn page_skip(page: usize, page_size: usize) -> usize {
    page.saturating_sub(1) * page_size
}

/// True when `url` can be handed to the player as a VOD link
pub fn is_openable_vod_url(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() {
        return false;
    }
    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

pub struct VodPager {
    stream_id: String,
    vod_types: Vec<String>,
    vod_type: Option<String>,
    page: usize,
    page_size: usize,
    items: Vec<VodDetails>,
    loading: bool,
    vod_url: String,
    selected: Option<usize>,
}

impl Default for VodPager {
    fn default() -> Self {
        Self::new(VOD_TILES_PER_PAGE)
    }
}

impl VodPager {
    pub fn new(page_size: usize) -> Self {
        Self {
            stream_id: String::new(),
            vod_types: Vec::new(),
            vod_type: None,
            page: 1,
            page_size: page_size.max(1),
            items: Vec::new(),
            loading: false,
            vod_url: String::new(),
            selected: None,
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn items(&self) -> &[VodDetails] {
        &self.items
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn vod_types(&self) -> &[String] {
        &self.vod_types
    }

    pub fn vod_type(&self) -> Option<&str> {
        self.vod_type.as_deref()
    }

    /// Switch platform: its VOD types replace the current ones and the first becomes selected
    pub fn set_client(&mut self, client: &dyn ApiClient) -> bool {
        self.vod_types = client.vod_types();
        let first = self.vod_types.first().cloned();
        self.set_vod_type(first)
    }

    /// Returns true when a refetch is needed
    pub fn set_stream_id(&mut self, stream_id: &str) -> bool {
        let stream_id = stream_id.trim().to_lowercase();
        if stream_id == self.stream_id {
            return false;
        }
        self.stream_id = stream_id;
        self.page = 1;
        self.loading = false;
        self.has_query()
    }

    /// Returns true when a refetch is needed
    pub fn set_vod_type(&mut self, vod_type: Option<String>) -> bool {
        if vod_type == self.vod_type {
            return false;
        }
        self.vod_type = vod_type;
        self.page = 1;
        self.loading = false;
        self.has_query()
    }

    fn has_query(&self) -> bool {
        !self.stream_id.trim().is_empty()
    }

    pub fn can_previous(&self) -> bool {
        self.page > 1 && !self.loading
    }

    /// A full last page is the only hint that more exist
    pub fn can_next(&self) -> bool {
        !self.loading && self.items.len() == self.page_size
    }

    /// Returns true when the page moved and a refetch is needed
    pub fn next_page(&mut self) -> bool {
        if !self.can_next() {
            return false;
        }
        self.page += 1;
        true
    }

    pub fn previous_page(&mut self) -> bool {
        if !self.can_previous() {
            return false;
        }
        self.page -= 1;
        true
    }

    /// Query for the current page
    pub fn query(&self) -> VodQuery {
        VodQuery {
            stream_id: self.stream_id.clone(),
            vod_types: self.vod_type.iter().cloned().collect(),
            skip: page_skip(self.page, self.page_size),
            take: self.page_size,
        }
    }

    /// Clear the items and build the request for the current page.
    /// `None` when no stream id has been entered.
    pub fn begin_load(&mut self) -> Option<VodQuery> {
        if !self.has_query() {
            return None;
        }
        self.items.clear();
        self.selected = None;
        self.loading = true;
        let query = self.query();
        debug!(stream = %query.stream_id, skip = query.skip, take = query.take, "loading vods");
        Some(query)
    }

    /// Apply a response; the returned message is shown to the user.
    /// Responses to any query other than the current one are dropped.
    pub fn finish_load(
        &mut self,
        query: &VodQuery,
        result: Result<Vec<VodDetails>, ApiError>,
    ) -> Option<UserMessage> {
        if *query != self.query() {
            debug!(stream = %query.stream_id, skip = query.skip, "dropping stale vod response");
            return None;
        }
        self.loading = false;

        match result {
            Ok(vods) => {
                self.items = vods;
                None
            }
            Err(e) if e.is_not_found() => {
                self.items.clear();
                Some(UserMessage::error(format!("Unknown stream name '{}'.", query.stream_id)))
            }
            Err(e) => {
                warn!(stream = %query.stream_id, "vod request failed: {}", e);
                self.items.clear();
                Some(UserMessage::error(format!(
                    "An error occurred attempting to get VODs.\n\n{}",
                    e
                )))
            }
        }
    }

    /// Fetch the current page on the calling thread
    pub fn load(&mut self, client: &dyn ApiClient) -> Option<UserMessage> {
        let query = self.begin_load()?;
        let result = client.get_vods(&query);
        self.finish_load(&query, result)
    }

    pub fn vod_url(&self) -> &str {
        &self.vod_url
    }

    pub fn set_vod_url(&mut self, url: &str) {
        self.vod_url = url.to_string();
    }

    pub fn select(&mut self, index: usize) {
        if let Some(vod) = self.items.get(index) {
            self.vod_url = vod.url.clone();
            self.selected = Some(index);
        }
    }

    pub fn selected(&self) -> Option<&VodDetails> {
        self.selected.and_then(|i| self.items.get(i))
    }

    pub fn can_open_vod(&self) -> bool {
        is_openable_vod_url(&self.vod_url)
    }

    /// The VOD to open: the selected item when its URL is still the one shown, otherwise a bare URL
    pub fn vod_to_open(&self) -> Option<VodDetails> {
        if !self.can_open_vod() {
            return None;
        }
        match self.selected() {
            Some(vod) if vod.url == self.vod_url => Some(vod.clone()),
            _ => Some(VodDetails::from_url(self.vod_url.trim())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeClient;

    fn pager_for(client: &FakeClient, stream: &str) -> VodPager {
        let mut pager = VodPager::default();
        pager.set_client(client);
        pager.set_stream_id(stream);
        pager
    }

    #[test]
    fn test_page_skip() {
        for page in 1..=20 {
            assert_eq!(page_skip(page, VOD_TILES_PER_PAGE), (page - 1) * VOD_TILES_PER_PAGE);
        }
        assert_eq!(page_skip(0, 15), 0);
    }

    #[test]
    fn test_query_for_each_page_is_recomputed() {
        let client = FakeClient::new().with_vods("chan", 40);
        let mut pager = pager_for(&client, "chan");

        assert!(pager.load(&client).is_none());
        assert!(pager.next_page());
        pager.load(&client);
        assert!(pager.previous_page());
        pager.load(&client);

        let queries = client.vod_queries.lock().unwrap();
        let skips: Vec<usize> = queries.iter().map(|q| q.skip).collect();
        assert_eq!(skips, vec![0, 15, 0]);
        assert!(queries.iter().all(|q| q.take == 15));
        assert_eq!(queries[0].vod_types, vec!["archive"]);
    }

    #[test]
    fn test_can_next_only_on_full_page() {
        let client = FakeClient::new().with_vods("chan", 20);
        let mut pager = pager_for(&client, "chan");

        pager.load(&client);
        assert_eq!(pager.items().len(), 15);
        assert!(pager.can_next());
        assert!(!pager.can_previous());

        pager.next_page();
        pager.load(&client);
        assert_eq!(pager.items().len(), 5);
        assert!(!pager.can_next());
        assert!(pager.can_previous());
        assert!(!pager.next_page());
    }

    #[test]
    fn test_exact_multiple_still_offers_empty_next_page() {
        let client = FakeClient::new().with_vods("chan", 15);
        let mut pager = pager_for(&client, "chan");
        pager.load(&client);
        assert!(pager.can_next());
        pager.next_page();
        pager.load(&client);
        assert!(pager.items().is_empty());
        assert!(!pager.can_next());
    }

    #[test]
    fn test_navigation_disabled_while_loading() {
        let client = FakeClient::new().with_vods("chan", 40);
        let mut pager = pager_for(&client, "chan");
        pager.load(&client);
        pager.next_page();

        let query = pager.begin_load().unwrap();
        assert!(pager.items().is_empty());
        assert!(!pager.can_next());
        assert!(!pager.can_previous());
        pager.finish_load(&query, client.get_vods(&query));
        assert!(pager.can_previous());
    }

    #[test]
    fn test_unknown_stream_gives_single_message_and_empty_list() {
        let client = FakeClient::new();
        let mut pager = pager_for(&client, "Nobody");

        let message = pager.load(&client).unwrap();
        assert_eq!(message.text, "Unknown stream name 'nobody'.");
        assert!(pager.items().is_empty());
        assert!(!pager.is_loading());
    }

    #[test]
    fn test_http_404_is_not_found() {
        let mut client = FakeClient::new().with_vods("chan", 3);
        client.vod_status = Some(404);
        let mut pager = pager_for(&client, "chan");
        assert!(pager.load(&client).unwrap().text.starts_with("Unknown stream name"));
    }

    #[test]
    fn test_other_errors_are_generic() {
        let mut client = FakeClient::new().with_vods("chan", 3);
        client.vod_status = Some(500);
        let mut pager = pager_for(&client, "chan");

        let message = pager.load(&client).unwrap();
        assert!(message.text.starts_with("An error occurred"));
        assert!(message.text.contains("HTTP 500"));
        assert!(pager.items().is_empty());
    }

    #[test]
    fn test_changing_stream_or_type_resets_page() {
        let client = FakeClient::new().with_vods("chan", 40);
        let mut pager = pager_for(&client, "chan");
        pager.load(&client);
        pager.next_page();
        assert_eq!(pager.page(), 2);

        assert!(pager.set_vod_type(Some("highlight".to_string())));
        assert_eq!(pager.page(), 1);
        pager.next_page();
        pager.load(&client);

        assert!(!pager.set_stream_id("CHAN"));
        assert!(pager.set_stream_id("other"));
        assert_eq!(pager.page(), 1);
    }

    #[test]
    fn test_no_request_without_stream_id() {
        let client = FakeClient::new();
        let mut pager = VodPager::default();
        assert!(!pager.set_client(&client));
        assert!(pager.load(&client).is_none());
        assert!(client.vod_queries.lock().unwrap().is_empty());
    }

    #[test]
    fn test_stale_response_is_dropped() {
        let client = FakeClient::new().with_vods("chan", 5).with_vods("other", 2);
        let mut pager = pager_for(&client, "chan");
        let stale = pager.begin_load().unwrap();
        pager.set_stream_id("other");

        assert!(pager.finish_load(&stale, client.get_vods(&stale)).is_none());
        assert!(pager.items().is_empty());
    }

    #[test]
    fn test_response_for_previous_type_is_dropped() {
        let client = FakeClient::new().with_vods("chan", 5);
        let mut pager = pager_for(&client, "chan");
        let stale = pager.begin_load().unwrap();
        assert!(pager.set_vod_type(Some("highlight".to_string())));
        let current = pager.begin_load().unwrap();

        assert!(pager.finish_load(&stale, client.get_vods(&stale)).is_none());
        assert!(pager.items().is_empty());
        assert!(pager.is_loading());

        assert!(pager.finish_load(&current, client.get_vods(&current)).is_none());
        assert_eq!(pager.items().len(), 5);
        assert!(!pager.is_loading());
    }

    #[test]
    fn test_vod_url_validation() {
        assert!(is_openable_vod_url("https://www.twitch.tv/videos/123"));
        assert!(is_openable_vod_url("  http://example.com/v/1 "));
        assert!(!is_openable_vod_url(""));
        assert!(!is_openable_vod_url("twitch.tv/videos/123"));
        assert!(!is_openable_vod_url("file:///etc/passwd"));
    }

    #[test]
    fn test_vod_to_open_prefers_selected_item() {
        let client = FakeClient::new().with_vods("chan", 3);
        let mut pager = pager_for(&client, "chan");
        pager.load(&client);

        pager.select(1);
        assert_eq!(pager.vod_to_open().unwrap().id, "v1");

        pager.set_vod_url("https://www.twitch.tv/videos/999");
        let vod = pager.vod_to_open().unwrap();
        assert!(vod.id.is_empty());
        assert_eq!(vod.url, "https://www.twitch.tv/videos/999");

        pager.set_vod_url("not a url");
        assert!(pager.vod_to_open().is_none());
    }
}
