//! Configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::StreamQuality;

pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const CHANNELS_FILE_NAME: &str = "channels.json";

/// Chrome app-mode arguments, `{url}` is replaced with the chat popout URL
pub const CHROME_ARGS: &str = "--app={url}chat?popout=true --window-size=350,758";

#[cfg(target_os = "windows")]
pub const DEFAULT_CHROME_COMMAND_LINE: &str =
    r#""C:\Program Files (x86)\Google\Chrome\Application\chrome.exe" --app={url}chat?popout=true --window-size=350,758"#;
#[cfg(not(target_os = "windows"))]
pub const DEFAULT_CHROME_COMMAND_LINE: &str =
    "google-chrome --app={url}chat?popout=true --window-size=350,758";

#[cfg(target_os = "windows")]
pub const DEFAULT_LIVESTREAMER_FULL_PATH: &str = r"C:\Program Files\Streamlink\bin\streamlink.exe";
#[cfg(not(target_os = "windows"))]
pub const DEFAULT_LIVESTREAMER_FULL_PATH: &str = "streamlink";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings io: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ThemeBase {
    Light,
    #[default]
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AccentColour {
    #[default]
    Purple,
    Blue,
    Green,
    Orange,
    Red,
    Teal,
}

impl AccentColour {
    pub const ALL: [AccentColour; 6] = [
        AccentColour::Purple,
        AccentColour::Blue,
        AccentColour::Green,
        AccentColour::Orange,
        AccentColour::Red,
        AccentColour::Teal,
    ];

    pub fn rgb(&self) -> [u8; 3] {
        match self {
            AccentColour::Purple => [145, 70, 255],
            AccentColour::Blue => [65, 140, 240],
            AccentColour::Green => [80, 190, 90],
            AccentColour::Orange => [240, 150, 40],
            AccentColour::Red => [225, 70, 70],
            AccentColour::Teal => [40, 180, 170],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    #[serde(default)]
    pub default_stream_quality: StreamQuality,
    #[serde(default)]
    pub livestreamer_full_path: String,
    /// `None` until a default has been filled in on load
    #[serde(default)]
    pub chat_command_line: Option<String>,
    /// Superseded by `chat_command_line`, migrated on load
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_full_path: Option<String>,
    #[serde(default)]
    pub metro_theme_base_colour: ThemeBase,
    #[serde(default)]
    pub metro_theme_accent_colour: AccentColour,
    #[serde(default)]
    pub exclude_from_notifying: Vec<String>,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default)]
    pub twitch_client_id: String,
    #[serde(default)]
    pub twitch_oauth_token: String,
    #[serde(default)]
    pub username: String,
}

fn default_refresh_interval() -> u64 { 60 }

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_stream_quality: StreamQuality::Source,
            livestreamer_full_path: String::new(),
            chat_command_line: None,
            chrome_full_path: None,
            metro_theme_base_colour: ThemeBase::Dark,
            metro_theme_accent_colour: AccentColour::Purple,
            exclude_from_notifying: Vec::new(),
            refresh_interval_secs: 60,
            twitch_client_id: String::new(),
            twitch_oauth_token: String::new(),
            username: String::new(),
        }
    }
}

impl Settings {
    pub fn is_excluded_from_notifying(&self, channel_id: &str) -> bool {
        self.exclude_from_notifying
            .iter()
            .any(|c| c.eq_ignore_ascii_case(channel_id))
    }

    pub fn chat_command_line(&self) -> &str {
        self.chat_command_line
            .as_deref()
            .unwrap_or(DEFAULT_CHROME_COMMAND_LINE)
    }

    /// Fill in defaults and migrate legacy fields, returns true when anything changed
    fn normalize(&mut self) -> bool {
        let mut changed = false;

        if let Some(chrome) = self.chrome_full_path.take() {
            self.chat_command_line = Some(format!("\"{}\" {}", chrome, CHROME_ARGS));
            changed = true;
        }

        if self.chat_command_line.is_none() {
            self.chat_command_line = Some(DEFAULT_CHROME_COMMAND_LINE.to_string());
            changed = true;
        }

        if self.livestreamer_full_path.trim().is_empty() {
            self.livestreamer_full_path = DEFAULT_LIVESTREAMER_FULL_PATH.to_string();
            changed = true;
        }

        if self.refresh_interval_secs < 10 {
            self.refresh_interval_secs = 10;
            changed = true;
        }

        changed
    }
}

fn config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("livestream-monitor");
    fs::create_dir_all(&path).ok();
    path
}

/// Owns the settings file: loads lazily on first access and saves on every mutation
pub struct SettingsHandler {
    path: PathBuf,
    settings: Option<Settings>,
}

impl Default for SettingsHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsHandler {
    pub fn new() -> Self {
        Self::with_path(config_dir().join(SETTINGS_FILE_NAME))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            settings: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&mut self) -> &Settings {
        self.ensure_loaded()
    }

    /// Apply a mutation and persist it immediately
    pub fn update<F: FnOnce(&mut Settings)>(&mut self, f: F) {
        let settings = self.ensure_loaded();
        let before = settings.clone();
        f(settings);
        if *settings != before {
            self.save();
        }
    }

    /// Persist the current settings; failures are logged and otherwise ignored
    pub fn save(&mut self) {
        let settings = self.ensure_loaded().clone();
        if let Err(e) = write_json(&self.path, &settings) {
            warn!(path = %self.path.display(), "failed to save settings: {}", e);
        }
    }

    fn ensure_loaded(&mut self) -> &mut Settings {
        if self.settings.is_none() {
            let (settings, save_required) = load_settings(&self.path);
            if save_required {
                if let Err(e) = write_json(&self.path, &settings) {
                    warn!(path = %self.path.display(), "failed to save settings: {}", e);
                }
            }
            self.settings = Some(settings);
        }
        self.settings.get_or_insert_with(Settings::default)
    }
}

/// Read settings from disk, falling back to defaults on any failure.
/// The flag is set when the file needs to be written back; an unreadable
/// file is left alone so a hand edit gone wrong can still be repaired.
fn load_settings(path: &Path) -> (Settings, bool) {
    let loaded = match read_json::<Settings>(path) {
        Ok(settings) => settings,
        Err(e) if path.exists() => {
            warn!(path = %path.display(), "settings unreadable, using defaults: {}", e);
            let mut settings = Settings::default();
            settings.normalize();
            return (settings, false);
        }
        Err(_) => {
            info!(path = %path.display(), "no settings file, creating defaults");
            None
        }
    };

    match loaded {
        Some(mut settings) => {
            let changed = settings.normalize();
            (settings, changed)
        }
        None => {
            let mut settings = Settings::default();
            settings.normalize();
            (settings, true)
        }
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, SettingsError> {
    let content = fs::read_to_string(path)?;
    // A literal `null` document is treated like a missing file
    Ok(serde_json::from_str::<Option<T>>(&content)?)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)?;
    Ok(())
}

pub fn channels_path() -> PathBuf {
    config_dir().join(CHANNELS_FILE_NAME)
}

/// Load the followed channel ids, an unreadable file yields an empty list
pub fn load_followed_channels(path: &Path) -> Vec<String> {
    match read_json::<Vec<String>>(path) {
        Ok(channels) => channels.unwrap_or_default(),
        Err(e) => {
            if path.exists() {
                warn!(path = %path.display(), "followed channels unreadable: {}", e);
            }
            Vec::new()
        }
    }
}

pub fn save_followed_channels(path: &Path, channels: &[String]) {
    if let Err(e) = write_json(path, channels) {
        warn!(path = %path.display(), "failed to save followed channels: {}", e);
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
