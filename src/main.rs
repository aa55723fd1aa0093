//! Livestream Monitor - Rust Edition
//! Keeps track of followed Twitch channels, launches the stream player and browses VODs

// Hide console window on Windows release builds
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use eframe::egui;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

mod api;
mod config;
mod launcher;
mod models;
mod monitor;
mod vods;

use api::{ApiClient, ApiClientFactory, ApiResult, TwitchClient};
use config::*;
use launcher::{LaunchError, LaunchEvent, LaunchPlan, StreamLauncher, PLAYER_DOWNLOAD_URL};
use models::*;
use monitor::{
    fetch_follows, fetch_statuses, validate_new_channel, MonitorError, MonitorEvent,
    MonitorStreamsModel, RefreshOutcome,
};
use vods::VodPager;

/// How long a "now live" popup stays on screen
const NOTIFICATION_SECS: u64 = 8;
const TOP_STREAMS_TAKE: usize = 50;

/// Case-insensitive substring check without allocation
fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() { return true; }
    if needle.len() > haystack.len() { return false; }

    haystack.as_bytes()
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

/// Current local time as HH:MM:SS
fn timestamp_now() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// Broadcast uptime such as "2h 05m"
fn format_uptime(since: Option<i64>, now: i64) -> String {
    let Some(since) = since else { return String::new() };
    let secs = (now - since).max(0);
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    if hours > 0 {
        format!("{}h {:02}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}

/// Local date of a Unix timestamp, YYYY-MM-DD HH:MM
fn format_date(ts: Option<i64>) -> String {
    use chrono::{Local, TimeZone};
    ts.and_then(|ts| Local.timestamp_opt(ts, 0).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

/// Application icon: rounded purple tile with a play triangle and a red live dot
fn load_icon() -> egui::IconData {
    let size: usize = 64;
    let mut rgba = vec![0u8; size * size * 4];

    for y in 0..size {
        for x in 0..size {
            let idx = (y * size + x) * 4;
            let nx = x as f32 / size as f32;
            let ny = y as f32 / size as f32;

            let corner_radius = 0.15;
            let in_rounded_rect = {
                let dx = if nx < corner_radius { corner_radius - nx }
                         else if nx > 1.0 - corner_radius { nx - (1.0 - corner_radius) }
                         else { 0.0 };
                let dy = if ny < corner_radius { corner_radius - ny }
                         else if ny > 1.0 - corner_radius { ny - (1.0 - corner_radius) }
                         else { 0.0 };
                dx * dx + dy * dy <= corner_radius * corner_radius
            };
            if !in_rounded_rect {
                continue;
            }

            let in_play = {
                let px = nx - 0.32;
                let py = ny - 0.5;
                px >= 0.0 && px <= 0.36 && py.abs() <= (0.36 - px) * 0.6
            };
            let in_dot = {
                let dx = nx - 0.78;
                let dy = ny - 0.22;
                dx * dx + dy * dy <= 0.09 * 0.09
            };

            let (r, g, b) = if in_dot {
                (235, 4, 0)
            } else if in_play {
                (255, 255, 255)
            } else {
                // Purple gradient background
                let t = ny;
                ((145.0 - 40.0 * t) as u8, (70.0 - 20.0 * t) as u8, (255.0 - 60.0 * t) as u8)
            };
            rgba[idx] = r;
            rgba[idx + 1] = g;
            rgba[idx + 2] = b;
            rgba[idx + 3] = 255;
        }
    }

    egui::IconData {
        rgba,
        width: size as u32,
        height: size as u32,
    }
}

/// Background task messages
enum TaskResult {
    RefreshDone(RefreshOutcome),
    ChannelValidated {
        name: String,
        result: Result<ChannelDetails, MonitorError>,
    },
    FollowsFetched {
        username: String,
        result: Result<Vec<UserFollow>, MonitorError>,
    },
    VodsLoaded {
        query: VodQuery,
        result: ApiResult<Vec<VodDetails>>,
    },
    TopGamesLoaded(ApiResult<Vec<Game>>),
    TopStreamsLoaded(ApiResult<Vec<StreamDetails>>),
    SearchLoaded {
        streams: ApiResult<Vec<StreamDetails>>,
        games: ApiResult<Vec<Game>>,
    },
}

/// Message for a channel that could not be followed, named as the user typed it
fn add_channel_message(name: &str, error: &MonitorError) -> UserMessage {
    match error {
        MonitorError::Api(e) if e.is_not_found() => {
            UserMessage::error(format!("Unknown stream name '{}'.", name))
        }
        other => UserMessage::error(other.to_string()),
    }
}

/// Status window of a launched player process
struct LaunchDialog {
    id: u64,
    title: String,
    text: String,
    finished: bool,
}

impl LaunchDialog {
    fn new(plan: &LaunchPlan) -> Self {
        Self {
            id: plan.id,
            title: plan.title.clone(),
            text: plan.notes.join("\n"),
            finished: false,
        }
    }

    fn push_line(&mut self, line: &str) {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(line);
    }
}

/// Build the platform clients from the current credentials
fn build_clients(settings: &Settings) -> ApiClientFactory {
    let twitch: Arc<dyn ApiClient> = Arc::new(TwitchClient::new(
        &settings.twitch_client_id,
        &settings.twitch_oauth_token,
    ));
    ApiClientFactory::new(vec![twitch])
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("livestream_monitor=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<(), eframe::Error> {
    init_tracing();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 700.0])
            .with_min_inner_size([800.0, 480.0])
            .with_icon(load_icon()),
        vsync: true,
        ..Default::default()
    };

    eframe::run_native(
        "Livestream Monitor",
        options,
        Box::new(|_cc| Ok(Box::new(MonitorApp::new()))),
    )
}

struct MonitorApp {
    settings: SettingsHandler,
    /// Edited copy of the settings, written back whenever it differs
    settings_draft: Settings,
    api_clients: ApiClientFactory,
    monitor: MonitorStreamsModel,
    monitor_events: Receiver<MonitorEvent>,

    // State
    current_tab: Tab,
    status_message: String,
    loading: bool,
    last_refresh: Option<Instant>,

    // Background task channels
    task_receiver: Receiver<TaskResult>,
    task_sender: Sender<TaskResult>,
    launch_receiver: Receiver<LaunchEvent>,
    launch_sender: Sender<LaunchEvent>,

    // Channels tab
    add_channel_input: String,
    import_username_input: String,
    channel_filter: String,

    // VOD tab
    vod_pager: VodPager,
    vod_client_name: String,
    vod_stream_input: String,

    // Top streams tab
    top_games: Vec<Game>,
    selected_game: Option<Game>,
    top_streams: Vec<StreamDetails>,
    top_loaded: bool,

    // Search tab
    search_query: String,
    search_streams: Vec<StreamDetails>,
    search_games: Vec<Game>,

    // Popups
    messages: Vec<UserMessage>,
    launch_dialogs: Vec<LaunchDialog>,
    notifications: Vec<(String, Instant)>,

    // Console log
    console_log: Vec<String>,
}

impl Default for MonitorApp {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorApp {
    fn new() -> Self {
        let mut settings = SettingsHandler::new();
        let current = settings.settings().clone();
        let api_clients = build_clients(&current);

        let mut monitor = MonitorStreamsModel::load(channels_path());
        let monitor_events = monitor.subscribe();

        let (task_sender, task_receiver) = channel();
        let (launch_sender, launch_receiver) = channel();

        let mut vod_pager = VodPager::default();
        let vod_client_name = match api_clients.vod_clients().first() {
            Some(client) => {
                vod_pager.set_client(client.as_ref());
                client.name().to_string()
            }
            None => String::new(),
        };

        let status_message = if current.twitch_client_id.is_empty() {
            "Set a Twitch client id in Settings to start monitoring".to_string()
        } else {
            "Ready".to_string()
        };

        Self {
            import_username_input: current.username.clone(),
            settings_draft: current,
            settings,
            api_clients,
            monitor,
            monitor_events,
            current_tab: Tab::Channels,
            status_message,
            loading: false,
            last_refresh: None,
            task_receiver,
            task_sender,
            launch_receiver,
            launch_sender,
            add_channel_input: String::new(),
            channel_filter: String::new(),
            vod_pager,
            vod_client_name,
            vod_stream_input: String::new(),
            top_games: Vec::new(),
            selected_game: None,
            top_streams: Vec::new(),
            top_loaded: false,
            search_query: String::new(),
            search_streams: Vec::new(),
            search_games: Vec::new(),
            messages: Vec::new(),
            launch_dialogs: Vec::new(),
            notifications: Vec::new(),
            console_log: vec![format!("[{}] [INFO] Livestream Monitor started", timestamp_now())],
        }
    }

    fn log(&mut self, message: &str) {
        let timestamp = timestamp_now();
        self.console_log.push(format!("[{}] {}", timestamp, message));
        // Keep last 500 lines
        if self.console_log.len() > 500 {
            self.console_log.remove(0);
        }
    }

    fn show_message(&mut self, message: UserMessage) {
        self.log(&format!("[ERROR] {}", message.text.lines().next().unwrap_or_default()));
        self.messages.push(message);
    }

    fn show_player_missing(&mut self, path: &str) {
        self.messages.push(UserMessage {
            title: "Stream player not found".to_string(),
            text: format!(
                "Could not find the stream player @ {}.\nPlease download and install streamlink from '{}'",
                path, PLAYER_DOWNLOAD_URL
            ),
        });
        self.log(&format!("[ERROR] Stream player not found: {}", path));
    }

    fn primary_client(&mut self) -> Option<Arc<dyn ApiClient>> {
        let client = self.api_clients.primary();
        if client.is_none() {
            self.status_message = "No streaming platform configured".to_string();
        }
        client
    }

    // === Channel refresh ===

    fn refresh_interval(&mut self) -> Duration {
        Duration::from_secs(self.settings.settings().refresh_interval_secs)
    }

    fn refresh_due(&mut self) -> bool {
        if self.monitor.is_refreshing() || self.monitor.followed_channels().is_empty() {
            return false;
        }
        let interval = self.refresh_interval();
        self.last_refresh.map_or(true, |t| t.elapsed() >= interval)
    }

    fn start_refresh(&mut self) {
        let Some(client) = self.primary_client() else { return };
        if !self.monitor.begin_refresh() {
            return;
        }
        self.last_refresh = Some(Instant::now());
        let ids = self.monitor.channel_ids();
        let sender = self.task_sender.clone();

        thread::spawn(move || {
            let outcome = fetch_statuses(client.as_ref(), &ids);
            let _ = sender.send(TaskResult::RefreshDone(outcome));
        });
    }

    fn add_channel(&mut self) {
        let name = self.add_channel_input.trim().to_string();
        if name.is_empty() {
            return;
        }
        if self.monitor.is_following(&name) {
            self.status_message = format!("Already following '{}'", name);
            return;
        }
        let Some(client) = self.primary_client() else { return };
        self.loading = true;
        self.status_message = format!("Looking up '{}'...", name);
        let sender = self.task_sender.clone();

        thread::spawn(move || {
            let result = validate_new_channel(client.as_ref(), &name);
            let _ = sender.send(TaskResult::ChannelValidated { name, result });
        });
    }

    fn import_follows(&mut self) {
        let username = self.import_username_input.trim().to_string();
        if username.is_empty() {
            return;
        }
        let Some(client) = self.primary_client() else { return };
        self.settings.update(|s| s.username = username.clone());
        self.settings_draft.username = username.clone();
        self.loading = true;
        self.status_message = format!("Importing follows of '{}'...", username);
        let sender = self.task_sender.clone();

        thread::spawn(move || {
            let result = fetch_follows(client.as_ref(), &username);
            let _ = sender.send(TaskResult::FollowsFetched { username, result });
        });
    }

    fn toggle_notify(&mut self, channel_id: &str) {
        let channel_id = channel_id.to_string();
        self.settings.update(|s| {
            if s.is_excluded_from_notifying(&channel_id) {
                s.exclude_from_notifying.retain(|c| !c.eq_ignore_ascii_case(&channel_id));
            } else {
                s.exclude_from_notifying.push(channel_id.clone());
            }
        });
        self.settings_draft.exclude_from_notifying = self.settings.settings().exclude_from_notifying.clone();
    }

    // === Launching ===

    fn run_plan(&mut self, plan: LaunchPlan) {
        self.log(&format!("[PLAY] {} | {} {}", plan.title, plan.program, plan.args.join(" ")));
        let mut dialog = LaunchDialog::new(&plan);
        if let Err(e) = StreamLauncher::spawn(&plan, self.launch_sender.clone()) {
            self.log(&format!("[ERROR] {}", e));
            dialog.push_line(&format!("\nERROR: {}", e));
            dialog.finished = true;
        }
        self.launch_dialogs.push(dialog);
    }

    fn handle_launch_error(&mut self, error: LaunchError) {
        match error {
            LaunchError::PlayerNotFound(path) => self.show_player_missing(&path),
            other => self.show_message(UserMessage::error(other.to_string())),
        }
    }

    /// Watch the selected followed channel
    fn start_stream(&mut self) {
        let Some(channel) = self.monitor.selected_channel().cloned() else { return };
        let Some(client) = self.primary_client() else { return };
        let settings = self.settings.settings().clone();
        match StreamLauncher::plan_stream(&settings, &channel, &client.channel_url(&channel.id)) {
            Ok(plan) => self.run_plan(plan),
            Err(e) => self.handle_launch_error(e),
        }
    }

    /// Watch a live stream from the top/search listings
    fn watch_stream(&mut self, stream: &StreamDetails) {
        if self.monitor.is_following(&stream.channel_id) {
            self.monitor.select(Some(&stream.channel_id.to_lowercase()));
            if self.monitor.selected_channel().is_some_and(|c| c.live) {
                return self.start_stream();
            }
        }
        let Some(client) = self.primary_client() else { return };
        // Partner status is unknown here, so Source is requested
        let channel = ChannelData {
            display_name: stream.display_name.clone(),
            live: true,
            ..ChannelData::new(&stream.channel_id)
        };
        let settings = self.settings.settings().clone();
        match StreamLauncher::plan_stream(&settings, &channel, &client.channel_url(&channel.id)) {
            Ok(plan) => self.run_plan(plan),
            Err(e) => self.handle_launch_error(e),
        }
    }

    fn open_chat(&mut self, channel_id: &str) {
        let Some(client) = self.primary_client() else { return };
        let settings = self.settings.settings().clone();
        let result = StreamLauncher::plan_chat(&settings, &client.channel_url(channel_id))
            .and_then(|plan| {
                self.log(&format!("[PLAY] Chat for {}", channel_id));
                StreamLauncher::spawn_detached(&plan)
            });
        if let Err(e) = result {
            self.handle_launch_error(e);
        }
    }

    fn open_vod(&mut self) {
        let Some(vod) = self.vod_pager.vod_to_open() else { return };
        let settings = self.settings.settings().clone();
        match StreamLauncher::plan_vod(&settings, &vod) {
            Ok(plan) => self.run_plan(plan),
            Err(e) => self.handle_launch_error(e),
        }
    }

    // === VODs ===

    fn show_vods_for(&mut self, channel_id: &str) {
        self.current_tab = Tab::Vods;
        self.vod_stream_input = channel_id.to_string();
        if self.vod_pager.set_stream_id(channel_id) {
            self.load_vods();
        }
    }

    fn load_vods(&mut self) {
        let Some(client) = self.api_clients.get(&self.vod_client_name) else { return };
        let Some(query) = self.vod_pager.begin_load() else { return };
        self.status_message = format!("Loading VODs for '{}'...", query.stream_id);
        let sender = self.task_sender.clone();

        thread::spawn(move || {
            let result = client.get_vods(&query);
            let _ = sender.send(TaskResult::VodsLoaded { query, result });
        });
    }

    // === Top streams / search ===

    fn load_top_games(&mut self) {
        let Some(client) = self.primary_client() else { return };
        let sender = self.task_sender.clone();
        thread::spawn(move || {
            let _ = sender.send(TaskResult::TopGamesLoaded(client.get_top_games(50)));
        });
    }

    fn load_top_streams(&mut self) {
        let Some(client) = self.primary_client() else { return };
        self.loading = true;
        self.status_message = "Loading top streams...".to_string();
        let query = TopStreamQuery {
            game_id: self.selected_game.as_ref().map(|g| g.id.clone()),
            take: TOP_STREAMS_TAKE,
        };
        let sender = self.task_sender.clone();
        thread::spawn(move || {
            let _ = sender.send(TaskResult::TopStreamsLoaded(client.get_top_streams(&query)));
        });
    }

    fn run_search(&mut self) {
        let query = self.search_query.trim().to_string();
        if query.is_empty() {
            return;
        }
        let Some(client) = self.primary_client() else { return };
        self.loading = true;
        self.status_message = format!("Searching for '{}'...", query);
        let sender = self.task_sender.clone();
        thread::spawn(move || {
            let streams = client.search_streams(&query);
            let games = client.search_games(&query);
            let _ = sender.send(TaskResult::SearchLoaded { streams, games });
        });
    }

    // === Event processing ===

    fn process_tasks(&mut self) {
        while let Ok(result) = self.task_receiver.try_recv() {
            match result {
                TaskResult::RefreshDone(outcome) => {
                    let settings = self.settings.settings().clone();
                    let (updated, failed) = self.monitor.apply_refresh(outcome, &settings);
                    if failed > 0 {
                        self.log(&format!("[WARN] Refresh failed for {} channel(s)", failed));
                    }
                    self.status_message = format!(
                        "{} of {} channels live (updated {})",
                        self.monitor.live_count(),
                        self.monitor.followed_channels().len(),
                        timestamp_now()
                    );
                    if updated == 0 && failed > 0 {
                        self.status_message = "Refresh failed, see Console".to_string();
                    }
                }
                TaskResult::ChannelValidated { name, result } => {
                    self.loading = false;
                    let added = result.and_then(|details| {
                        self.monitor.add_stream(&details)?;
                        Ok(details)
                    });
                    match added {
                        Ok(details) => {
                            self.log(&format!("[INFO] Following {}", details.display_name));
                            self.status_message = format!("Following '{}'", details.display_name);
                            self.add_channel_input.clear();
                            self.last_refresh = None;
                        }
                        Err(e) => {
                            self.status_message = e.to_string();
                            self.show_message(add_channel_message(&name, &e));
                        }
                    }
                }
                TaskResult::FollowsFetched { username, result } => {
                    self.loading = false;
                    match result {
                        Ok(follows) => {
                            let added = self.monitor.import_follows(&follows);
                            self.log(&format!(
                                "[INFO] Imported {} of {} follows from {}",
                                added, follows.len(), username
                            ));
                            self.status_message = format!("Imported {} new channels", added);
                            self.last_refresh = None;
                        }
                        Err(MonitorError::Api(e)) if e.is_not_found() => {
                            self.show_message(UserMessage::error(format!("Unknown user name '{}'.", username)));
                        }
                        Err(e) => self.show_message(UserMessage::error(format!(
                            "An error occurred importing follows.\n\n{}", e
                        ))),
                    }
                }
                TaskResult::VodsLoaded { query, result } => {
                    let count = result.as_ref().map(|v| v.len()).unwrap_or(0);
                    if let Some(message) = self.vod_pager.finish_load(&query, result) {
                        self.status_message = "VOD request failed".to_string();
                        self.show_message(message);
                    } else if query == self.vod_pager.query() {
                        self.log(&format!("[INFO] Loaded {} VODs for {}", count, query.stream_id));
                        self.status_message = format!("Page {} of '{}'", self.vod_pager.page(), query.stream_id);
                    }
                }
                TaskResult::TopGamesLoaded(result) => match result {
                    Ok(games) => self.top_games = games,
                    Err(e) => self.log(&format!("[ERROR] Top games: {}", e)),
                },
                TaskResult::TopStreamsLoaded(result) => {
                    self.loading = false;
                    match result {
                        Ok(streams) => {
                            self.status_message = format!("Loaded {} top streams", streams.len());
                            self.top_streams = streams;
                        }
                        Err(e) => {
                            self.top_streams.clear();
                            self.show_message(UserMessage::error(format!(
                                "An error occurred attempting to get top streams.\n\n{}", e
                            )));
                        }
                    }
                }
                TaskResult::SearchLoaded { streams, games } => {
                    self.loading = false;
                    match streams {
                        Ok(streams) => self.search_streams = streams,
                        Err(e) => {
                            self.search_streams.clear();
                            self.show_message(UserMessage::error(format!("Search failed.\n\n{}", e)));
                        }
                    }
                    self.search_games = games.unwrap_or_default();
                    self.status_message = format!(
                        "Found {} live channels, {} games",
                        self.search_streams.len(),
                        self.search_games.len()
                    );
                }
            }
        }

        while let Ok(event) = self.monitor_events.try_recv() {
            match event {
                MonitorEvent::ChannelWentLive(channel) => {
                    let text = if channel.game.is_empty() {
                        format!("{} is now live", channel.display_name)
                    } else {
                        format!("{} is now live playing {}", channel.display_name, channel.game)
                    };
                    self.log(&format!("[LIVE] {}", text));
                    self.notifications.push((text, Instant::now()));
                }
                MonitorEvent::ChannelsChanged => {}
                MonitorEvent::RefreshComplete { updated, failed } => {
                    tracing::debug!(updated, failed, "refresh complete");
                }
            }
        }

        while let Ok(event) = self.launch_receiver.try_recv() {
            match event {
                LaunchEvent::Output { id, line, is_error } => {
                    self.log(&format!("[PLAYER] {}", line));
                    if let Some(dialog) = self.launch_dialogs.iter_mut().find(|d| d.id == id) {
                        dialog.push_line(&line);
                        if is_error {
                            dialog.finished = true;
                        }
                    }
                }
                LaunchEvent::Exited { id, code, keep_open } => {
                    if keep_open {
                        self.log(&format!("[WARN] Player exited with code {:?}", code));
                        if let Some(dialog) = self.launch_dialogs.iter_mut().find(|d| d.id == id) {
                            dialog.push_line("\nERROR occurred in the stream player: close this window when you've finished reading the output.");
                            dialog.finished = true;
                        }
                    } else {
                        self.launch_dialogs.retain(|d| d.id != id);
                    }
                }
            }
        }
    }

    fn apply_settings_draft(&mut self) {
        let current = self.settings.settings().clone();
        if self.settings_draft == current {
            return;
        }
        let credentials_changed = self.settings_draft.twitch_client_id != current.twitch_client_id
            || self.settings_draft.twitch_oauth_token != current.twitch_oauth_token;

        let draft = self.settings_draft.clone();
        self.settings.update(|s| *s = draft);
        // Pick up any defaults filled in while saving
        self.settings_draft = self.settings.settings().clone();

        if credentials_changed {
            let settings = self.settings.settings().clone();
            self.api_clients = build_clients(&settings);
            self.last_refresh = None;
        }
    }

    fn apply_theme(&mut self, ctx: &egui::Context) {
        let settings = self.settings.settings();
        let mut visuals = match settings.metro_theme_base_colour {
            ThemeBase::Dark => egui::Visuals::dark(),
            ThemeBase::Light => egui::Visuals::light(),
        };
        let [r, g, b] = settings.metro_theme_accent_colour.rgb();
        let accent = egui::Color32::from_rgb(r, g, b);
        visuals.selection.bg_fill = accent;
        visuals.hyperlink_color = accent;
        ctx.set_visuals(visuals);
    }
}

impl eframe::App for MonitorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Process background task results (non-blocking)
        self.process_tasks();

        if self.refresh_due() {
            self.start_refresh();
        }

        // Keep ticking for the refresh timer and worker results
        if self.loading || self.monitor.is_refreshing() || self.vod_pager.is_loading() {
            ctx.request_repaint_after(Duration::from_millis(100));
        } else {
            ctx.request_repaint_after(Duration::from_secs(1));
        }

        self.apply_theme(ctx);

        // Top panel - tabs
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.add_space(5.0);
            ui.horizontal(|ui| {
                let live = self.monitor.live_count();
                ui.selectable_value(&mut self.current_tab, Tab::Channels, format!("📺 CHANNELS ({})", live));
                ui.selectable_value(&mut self.current_tab, Tab::Vods, "📼 VODS");
                ui.selectable_value(&mut self.current_tab, Tab::TopStreams, "🔥 TOP STREAMS");
                ui.selectable_value(&mut self.current_tab, Tab::Search, "🔍 SEARCH");
                ui.selectable_value(&mut self.current_tab, Tab::Settings, "⚙ SETTINGS");
                ui.selectable_value(&mut self.current_tab, Tab::Console, "🖥 CONSOLE");
            });
            ui.add_space(5.0);
        });

        // Bottom panel - Status
        egui::TopBottomPanel::bottom("bottom_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if self.loading || self.monitor.is_refreshing() || self.vod_pager.is_loading() {
                    ui.spinner();
                }
                ui.label(&self.status_message);
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            match self.current_tab {
                Tab::Channels => self.show_channels_tab(ui),
                Tab::Vods => self.show_vods_tab(ui),
                Tab::TopStreams => self.show_top_streams_tab(ui),
                Tab::Search => self.show_search_tab(ui),
                Tab::Settings => self.show_settings_tab(ui),
                Tab::Console => self.show_console_tab(ui),
            }
        });

        self.show_popups(ctx);
    }
}

impl MonitorApp {
    fn show_channels_tab(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Add channel:");
            let response = ui.add(egui::TextEdit::singleline(&mut self.add_channel_input)
                .hint_text("channel name")
                .desired_width(160.0));
            let enter = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.button("➕ Add").clicked() || enter {
                self.add_channel();
            }

            ui.separator();

            ui.label("Import follows of:");
            ui.add(egui::TextEdit::singleline(&mut self.import_username_input)
                .hint_text("twitch user")
                .desired_width(140.0));
            if ui.button("📥 Import").clicked() {
                self.import_follows();
            }

            ui.separator();

            let refreshing = self.monitor.is_refreshing();
            if ui.add_enabled(!refreshing, egui::Button::new("🔄 Refresh")).clicked() {
                self.last_refresh = None;
            }
        });

        ui.horizontal(|ui| {
            ui.label("🔍");
            ui.add(egui::TextEdit::singleline(&mut self.channel_filter)
                .hint_text("filter")
                .desired_width(200.0));
        });
        ui.separator();

        if self.monitor.followed_channels().is_empty() {
            ui.vertical_centered(|ui| {
                ui.add_space(60.0);
                ui.label("You are not following any channels yet");
                ui.label(egui::RichText::new("Add a channel by name or import the follows of a Twitch user").weak());
            });
            return;
        }

        let now = chrono::Utc::now().timestamp();
        let selected_id = self.monitor.selected_channel().map(|c| c.id.clone());
        let filter = self.channel_filter.trim().to_string();
        let settings = self.settings.settings().clone();

        let mut to_select: Option<String> = None;
        let mut to_watch: Option<String> = None;
        let mut to_chat: Option<String> = None;
        let mut to_vods: Option<String> = None;
        let mut to_toggle_notify: Option<String> = None;
        let mut to_remove: Option<String> = None;

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                egui::Grid::new("channels_grid")
                    .striped(true)
                    .num_columns(7)
                    .show(ui, |ui| {
                        for channel in self.monitor.sorted_channels() {
                            if !contains_ignore_case(&channel.display_name, &filter)
                                && !contains_ignore_case(&channel.game, &filter) {
                                continue;
                            }

                            let dot = if channel.live {
                                egui::RichText::new("●").color(egui::Color32::from_rgb(235, 4, 0))
                            } else {
                                egui::RichText::new("○").color(egui::Color32::GRAY)
                            };
                            ui.label(dot);

                            let mut name = egui::RichText::new(&channel.display_name).strong();
                            if channel.is_partner {
                                name = name.color(egui::Color32::from_rgb(145, 70, 255));
                            }
                            let is_selected = selected_id.as_deref() == Some(channel.id.as_str());
                            if ui.selectable_label(is_selected, name).clicked() {
                                to_select = Some(channel.id.clone());
                            }

                            if channel.live {
                                ui.label(format!("👁 {}", channel.viewers));
                                ui.label(format_uptime(channel.live_since, now));
                                ui.label(&channel.game).on_hover_text(&channel.title);
                            } else {
                                ui.label("");
                                ui.label("");
                                ui.label(egui::RichText::new("offline").weak());
                            }

                            ui.horizontal(|ui| {
                                if ui.add_enabled(channel.live, egui::Button::new("▶")).on_hover_text("Watch").clicked() {
                                    to_watch = Some(channel.id.clone());
                                }
                                if ui.button("💬").on_hover_text("Open chat").clicked() {
                                    to_chat = Some(channel.id.clone());
                                }
                                if ui.button("📼").on_hover_text("Browse VODs").clicked() {
                                    to_vods = Some(channel.id.clone());
                                }
                                let excluded = settings.is_excluded_from_notifying(&channel.id);
                                let bell = if excluded { "🔕" } else { "🔔" };
                                if ui.button(bell).on_hover_text("Toggle live notifications").clicked() {
                                    to_toggle_notify = Some(channel.id.clone());
                                }
                                if ui.button("✖").on_hover_text("Unfollow").clicked() {
                                    to_remove = Some(channel.id.clone());
                                }
                            });
                            ui.end_row();
                        }
                    });
            });

        if let Some(id) = to_select {
            self.monitor.select(Some(&id));
        }
        if let Some(id) = to_watch {
            self.monitor.select(Some(&id));
            self.start_stream();
        }
        if let Some(id) = to_chat {
            self.open_chat(&id);
        }
        if let Some(id) = to_vods {
            self.show_vods_for(&id);
        }
        if let Some(id) = to_toggle_notify {
            self.toggle_notify(&id);
        }
        if let Some(id) = to_remove {
            self.monitor.remove_stream(&id);
            self.log(&format!("[INFO] Unfollowed {}", id));
        }
    }

    fn show_vods_tab(&mut self, ui: &mut egui::Ui) {
        let vod_clients = self.api_clients.vod_clients();
        let mut client_changed: Option<Arc<dyn ApiClient>> = None;
        let mut type_changed: Option<String> = None;
        let mut stream_submitted = false;

        ui.horizontal(|ui| {
            ui.label("Platform:");
            egui::ComboBox::from_id_salt("vod_client")
                .selected_text(&self.vod_client_name)
                .show_ui(ui, |ui| {
                    for client in &vod_clients {
                        let selected = client.name() == self.vod_client_name;
                        if ui.selectable_label(selected, client.name()).clicked() && !selected {
                            client_changed = Some(client.clone());
                        }
                    }
                });

            ui.label("Stream:");
            let response = ui.add(egui::TextEdit::singleline(&mut self.vod_stream_input)
                .hint_text("channel name")
                .desired_width(160.0));
            if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                stream_submitted = true;
            }

            // Known streams for quick selection
            egui::ComboBox::from_id_salt("vod_known_streams")
                .selected_text("Followed")
                .show_ui(ui, |ui| {
                    for channel in self.monitor.followed_channels() {
                        if ui.selectable_label(false, &channel.display_name).clicked() {
                            self.vod_stream_input = channel.id.clone();
                            stream_submitted = true;
                        }
                    }
                });

            if ui.button("Go").clicked() {
                stream_submitted = true;
            }

            ui.label("Type:");
            let current_type = self.vod_pager.vod_type().unwrap_or_default().to_string();
            egui::ComboBox::from_id_salt("vod_type")
                .selected_text(&current_type)
                .show_ui(ui, |ui| {
                    for vod_type in self.vod_pager.vod_types() {
                        if ui.selectable_label(*vod_type == current_type, vod_type).clicked()
                            && *vod_type != current_type {
                            type_changed = Some(vod_type.clone());
                        }
                    }
                });
        });

        if let Some(client) = client_changed {
            self.vod_client_name = client.name().to_string();
            if self.vod_pager.set_client(client.as_ref()) {
                self.load_vods();
            }
        }
        if let Some(vod_type) = type_changed {
            if self.vod_pager.set_vod_type(Some(vod_type)) {
                self.load_vods();
            }
        }
        if stream_submitted {
            let input = self.vod_stream_input.clone();
            if self.vod_pager.set_stream_id(&input) {
                self.load_vods();
            }
        }

        ui.horizontal(|ui| {
            if ui.add_enabled(self.vod_pager.can_previous(), egui::Button::new("◀ Previous")).clicked()
                && self.vod_pager.previous_page() {
                self.load_vods();
            }
            ui.label(format!("Page {}", self.vod_pager.page()));
            if ui.add_enabled(self.vod_pager.can_next(), egui::Button::new("Next ▶")).clicked()
                && self.vod_pager.next_page() {
                self.load_vods();
            }
            if self.vod_pager.is_loading() {
                ui.spinner();
            }
        });

        ui.horizontal(|ui| {
            ui.label("VOD URL:");
            let mut url = self.vod_pager.vod_url().to_string();
            if ui.add(egui::TextEdit::singleline(&mut url)
                .hint_text("https://www.twitch.tv/videos/...")
                .desired_width(360.0)).changed() {
                self.vod_pager.set_vod_url(&url);
            }
            if ui.add_enabled(self.vod_pager.can_open_vod(), egui::Button::new("▶ Open VOD")).clicked() {
                self.open_vod();
            }
        });
        ui.separator();

        let mut clicked: Option<usize> = None;
        let mut open_clicked = false;
        let selected_url = self.vod_pager.selected().map(|v| v.url.clone());

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                egui::Grid::new("vods_grid")
                    .striped(true)
                    .num_columns(5)
                    .show(ui, |ui| {
                        for (idx, vod) in self.vod_pager.items().iter().enumerate() {
                            let is_selected = selected_url.as_deref() == Some(vod.url.as_str());
                            let title = if vod.title.is_empty() { &vod.url } else { &vod.title };
                            let response = ui.selectable_label(is_selected, title);
                            if response.clicked() {
                                clicked = Some(idx);
                            }
                            if response.double_clicked() {
                                open_clicked = true;
                            }
                            ui.label(&vod.length);
                            ui.label(format_date(vod.recorded_at));
                            ui.label(format!("👁 {}", vod.views));
                            if let Some(ref preview) = vod.preview_url {
                                ui.hyperlink_to("preview", preview);
                            } else {
                                ui.label("");
                            }
                            ui.end_row();
                        }
                    });
            });

        if let Some(idx) = clicked {
            self.vod_pager.select(idx);
        }
        if open_clicked {
            self.open_vod();
        }
    }

    fn show_stream_list(
        ui: &mut egui::Ui,
        id: &str,
        streams: &[StreamDetails],
        followed: &MonitorStreamsModel,
    ) -> (Option<StreamDetails>, Option<String>) {
        let now = chrono::Utc::now().timestamp();
        let mut to_watch = None;
        let mut to_follow = None;

        egui::ScrollArea::vertical()
            .id_salt(id)
            .auto_shrink([false, false])
            .show(ui, |ui| {
                egui::Grid::new(id).striped(true).num_columns(5).show(ui, |ui| {
                    for stream in streams {
                        ui.horizontal(|ui| {
                            if ui.button("▶").on_hover_text("Watch").clicked() {
                                to_watch = Some(stream.clone());
                            }
                            let following = followed.is_following(&stream.channel_id);
                            if ui.add_enabled(!following, egui::Button::new("➕")).on_hover_text("Follow").clicked() {
                                to_follow = Some(stream.channel_id.clone());
                            }
                        });
                        ui.label(egui::RichText::new(&stream.display_name).strong());
                        ui.label(format!("👁 {}", stream.viewers));
                        ui.label(format_uptime(stream.started_at, now));
                        ui.label(&stream.game).on_hover_text(&stream.title);
                        ui.end_row();
                    }
                });
            });

        (to_watch, to_follow)
    }

    fn show_top_streams_tab(&mut self, ui: &mut egui::Ui) {
        if !self.top_loaded {
            self.top_loaded = true;
            self.load_top_games();
            self.load_top_streams();
        }

        let mut game_changed: Option<Option<Game>> = None;
        ui.horizontal(|ui| {
            ui.label("Game:");
            let current = self.selected_game.as_ref().map(|g| g.name.clone()).unwrap_or_else(|| "All".to_string());
            egui::ComboBox::from_id_salt("top_game")
                .selected_text(current)
                .show_ui(ui, |ui| {
                    if ui.selectable_label(self.selected_game.is_none(), "All").clicked() {
                        game_changed = Some(None);
                    }
                    for game in &self.top_games {
                        let selected = self.selected_game.as_ref().is_some_and(|g| g.id == game.id);
                        if ui.selectable_label(selected, &game.name).clicked() {
                            game_changed = Some(Some(game.clone()));
                        }
                    }
                });
            if ui.button("🔄 Refresh").clicked() {
                self.load_top_streams();
            }
        });
        ui.separator();

        if let Some(game) = game_changed {
            self.selected_game = game;
            self.load_top_streams();
        }

        let (to_watch, to_follow) = Self::show_stream_list(ui, "top_streams", &self.top_streams, &self.monitor);
        if let Some(stream) = to_watch {
            self.watch_stream(&stream);
        }
        if let Some(id) = to_follow {
            self.add_channel_input = id;
            self.add_channel();
        }
    }

    fn show_search_tab(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let response = ui.add(egui::TextEdit::singleline(&mut self.search_query)
                .hint_text("channel or game")
                .desired_width(260.0));
            let enter = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.button("🔍 Search").clicked() || enter {
                self.run_search();
            }
        });
        ui.separator();

        let mut game_clicked: Option<Game> = None;
        if !self.search_games.is_empty() {
            ui.label(egui::RichText::new("Games").strong());
            ui.horizontal_wrapped(|ui| {
                for game in &self.search_games {
                    if ui.button(&game.name).on_hover_text("Show top streams").clicked() {
                        game_clicked = Some(game.clone());
                    }
                }
            });
            ui.separator();
        }

        ui.label(egui::RichText::new("Live channels").strong());
        let (to_watch, to_follow) = Self::show_stream_list(ui, "search_streams", &self.search_streams, &self.monitor);

        if let Some(game) = game_clicked {
            self.selected_game = Some(game);
            self.current_tab = Tab::TopStreams;
            self.load_top_streams();
        }
        if let Some(stream) = to_watch {
            self.watch_stream(&stream);
        }
        if let Some(id) = to_follow {
            self.add_channel_input = id;
            self.add_channel();
        }
    }

    fn show_settings_tab(&mut self, ui: &mut egui::Ui) {
        egui::Grid::new("settings_grid")
            .num_columns(2)
            .spacing([20.0, 8.0])
            .show(ui, |ui| {
                let draft = &mut self.settings_draft;

                ui.label("Default quality:");
                egui::ComboBox::from_id_salt("default_quality")
                    .selected_text(draft.default_stream_quality.label())
                    .show_ui(ui, |ui| {
                        for quality in StreamQuality::ALL {
                            ui.selectable_value(&mut draft.default_stream_quality, quality, quality.label());
                        }
                    });
                ui.end_row();

                ui.label("Stream player:");
                ui.horizontal(|ui| {
                    ui.add(egui::TextEdit::singleline(&mut draft.livestreamer_full_path)
                        .hint_text("streamlink")
                        .desired_width(320.0))
                        .on_hover_text("streamlink or livestreamer executable");
                    if ui.button("📁").on_hover_text("Browse for player executable").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .set_title("Select Stream Player")
                            .pick_file()
                        {
                            draft.livestreamer_full_path = path.display().to_string();
                        }
                    }
                });
                ui.end_row();

                ui.label("Chat command line:");
                let mut chat = draft.chat_command_line().to_string();
                if ui.add(egui::TextEdit::singleline(&mut chat).desired_width(420.0))
                    .on_hover_text("{url} is replaced with the channel page URL")
                    .changed() {
                    draft.chat_command_line = Some(chat);
                }
                ui.end_row();

                ui.label("Refresh every (s):");
                ui.add(egui::DragValue::new(&mut draft.refresh_interval_secs).range(10..=3600));
                ui.end_row();

                ui.label("Theme:");
                ui.horizontal(|ui| {
                    ui.selectable_value(&mut draft.metro_theme_base_colour, ThemeBase::Dark, "🌙 Dark");
                    ui.selectable_value(&mut draft.metro_theme_base_colour, ThemeBase::Light, "☀ Light");
                });
                ui.end_row();

                ui.label("Accent:");
                ui.horizontal(|ui| {
                    for accent in AccentColour::ALL {
                        let [r, g, b] = accent.rgb();
                        let text = egui::RichText::new("■").size(18.0).color(egui::Color32::from_rgb(r, g, b));
                        if ui.selectable_label(draft.metro_theme_accent_colour == accent, text).clicked() {
                            draft.metro_theme_accent_colour = accent;
                        }
                    }
                });
                ui.end_row();

                ui.label("Twitch client id:");
                ui.add(egui::TextEdit::singleline(&mut draft.twitch_client_id).desired_width(320.0));
                ui.end_row();

                ui.label("Twitch OAuth token:");
                ui.add(egui::TextEdit::singleline(&mut draft.twitch_oauth_token)
                    .password(true)
                    .desired_width(320.0));
                ui.end_row();
            });

        ui.separator();
        ui.label(egui::RichText::new("Muted channels").strong());
        let mut unmute: Option<String> = None;
        ui.horizontal_wrapped(|ui| {
            if self.settings_draft.exclude_from_notifying.is_empty() {
                ui.label(egui::RichText::new("none").weak());
            }
            for channel in &self.settings_draft.exclude_from_notifying {
                if ui.button(format!("🔕 {} ✖", channel)).on_hover_text("Unmute").clicked() {
                    unmute = Some(channel.clone());
                }
            }
        });
        if let Some(channel) = unmute {
            self.settings_draft.exclude_from_notifying.retain(|c| c != &channel);
        }

        ui.separator();
        ui.label(egui::RichText::new(format!("Settings file: {}", self.settings.path().display())).weak());

        self.apply_settings_draft();
    }

    fn show_console_tab(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Console Log");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("🗑 Clear").clicked() {
                    self.console_log.clear();
                    self.console_log.push(format!("[{}] Console cleared", timestamp_now()));
                }
            });
        });
        ui.separator();

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &self.console_log {
                    let color = if line.contains("[ERROR]") {
                        egui::Color32::RED
                    } else if line.contains("[WARN]") {
                        egui::Color32::YELLOW
                    } else if line.contains("[LIVE]") {
                        egui::Color32::from_rgb(235, 4, 0)
                    } else if line.contains("[PLAY]") {
                        egui::Color32::GREEN
                    } else if line.contains("[INFO]") {
                        egui::Color32::LIGHT_BLUE
                    } else {
                        egui::Color32::GRAY
                    };
                    ui.label(egui::RichText::new(line).monospace().color(color));
                }
            });
    }

    fn show_popups(&mut self, ctx: &egui::Context) {
        // Error / info messages
        let mut dismissed: Option<usize> = None;
        for (i, message) in self.messages.iter().enumerate() {
            egui::Window::new(&message.title)
                .id(egui::Id::new(("message", i)))
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(&message.text);
                    ui.add_space(8.0);
                    if ui.button("OK").clicked() {
                        dismissed = Some(i);
                    }
                });
        }
        if let Some(i) = dismissed {
            self.messages.remove(i);
        }

        // Player status windows
        let mut closed: Option<u64> = None;
        for dialog in &self.launch_dialogs {
            let mut open = true;
            egui::Window::new(&dialog.title)
                .id(egui::Id::new(("launch", dialog.id)))
                .collapsible(false)
                .resizable(true)
                .open(&mut open)
                .show(ctx, |ui| {
                    egui::ScrollArea::vertical()
                        .max_height(300.0)
                        .stick_to_bottom(true)
                        .show(ui, |ui| {
                            ui.label(egui::RichText::new(&dialog.text).monospace());
                        });
                    if !dialog.finished {
                        ui.spinner();
                    }
                });
            if !open {
                closed = Some(dialog.id);
            }
        }
        if let Some(id) = closed {
            self.launch_dialogs.retain(|d| d.id != id);
        }

        // Went-live notifications
        self.notifications
            .retain(|(_, shown)| shown.elapsed() < Duration::from_secs(NOTIFICATION_SECS));
        for (i, (text, _)) in self.notifications.iter().enumerate() {
            egui::Window::new("Now live")
                .id(egui::Id::new(("notification", i)))
                .title_bar(false)
                .resizable(false)
                .anchor(egui::Align2::RIGHT_BOTTOM, [-10.0, -40.0 - 50.0 * i as f32])
                .show(ctx, |ui| {
                    ui.label(egui::RichText::new(format!("● {}", text)).strong());
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_ignore_case() {
        assert!(contains_ignore_case("Just Chatting", "chat"));
        assert!(contains_ignore_case("anything", ""));
        assert!(!contains_ignore_case("abc", "abcd"));
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(None, 100), "");
        assert_eq!(format_uptime(Some(0), 59 * 60), "59m");
        assert_eq!(format_uptime(Some(0), 2 * 3600 + 5 * 60), "2h 05m");
        assert_eq!(format_uptime(Some(100), 0), "0m");
    }

    #[test]
    fn test_add_channel_message_names_requested_channel() {
        let not_found = MonitorError::Api(api::ApiError::NotFound("ghost".into()));
        assert_eq!(add_channel_message("Ghost", &not_found).text, "Unknown stream name 'Ghost'.");

        let duplicate = MonitorError::AlreadyFollowed("alpha".into());
        assert!(add_channel_message("alpha", &duplicate).text.contains("already following"));
    }

    #[test]
    fn test_format_date_empty_for_missing() {
        assert_eq!(format_date(None), "");
        assert_eq!(format_date(Some(0)).len(), "1970-01-01 00:00".len());
    }
}
