//! External stream player and chat launching

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::thread;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::models::{ChannelData, StreamQuality, VodDetails};

static NEXT_LAUNCH_ID: AtomicU64 = AtomicU64::new(1);

pub const PLAYER_DOWNLOAD_URL: &str = "https://streamlink.github.io/install.html";

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("could not find the stream player at '{0}'")]
    PlayerNotFound(String),
    #[error("'{0}' is not live")]
    ChannelOffline(String),
    #[error("command line is empty")]
    EmptyCommand,
    #[error("unable to parse command line: {0}")]
    CommandParse(#[from] shell_words::ParseError),
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Progress of a launched player, drained by the UI every frame
#[derive(Debug, Clone, PartialEq)]
pub enum LaunchEvent {
    Output { id: u64, line: String, is_error: bool },
    Exited { id: u64, code: Option<i32>, keep_open: bool },
}

/// A fully resolved command to run
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchPlan {
    pub id: u64,
    pub title: String,
    pub program: String,
    pub args: Vec<String>,
    /// Lines shown in the status dialog before any process output
    pub notes: Vec<String>,
}

impl LaunchPlan {
    fn new(title: String, program: String, args: Vec<String>) -> Self {
        Self {
            id: NEXT_LAUNCH_ID.fetch_add(1, Ordering::Relaxed),
            title,
            program,
            args,
            notes: Vec::new(),
        }
    }
}

/// Quality to request for a channel. Channels without partner status only
/// offer their source stream, so anything else falls back to Source.
pub fn effective_quality(channel: &ChannelData, default: StreamQuality) -> StreamQuality {
    if !channel.is_partner && default != StreamQuality::Source {
        StreamQuality::Source
    } else {
        default
    }
}

/// Whether `program` names an existing file or a binary on PATH
pub fn player_exists(program: &str) -> bool {
    let program = program.trim();
    if program.is_empty() {
        return false;
    }
    let path = Path::new(program);
    if path.components().count() > 1 || path.is_absolute() {
        return path.is_file();
    }

    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| {
        let candidate = dir.join(program);
        candidate.is_file() || (cfg!(windows) && candidate.with_extension("exe").is_file())
    })
}

/// Split a command line into words using shell quoting rules
pub fn split_command_line(command_line: &str) -> Result<Vec<String>, LaunchError> {
    Ok(shell_words::split(command_line)?)
}

pub struct StreamLauncher;

impl StreamLauncher {
    /// Build the player command for a live channel
    pub fn plan_stream(
        settings: &Settings,
        channel: &ChannelData,
        channel_url: &str,
    ) -> Result<LaunchPlan, LaunchError> {
        let player = settings.livestreamer_full_path.trim();
        if !player_exists(player) {
            return Err(LaunchError::PlayerNotFound(player.to_string()));
        }
        if !channel.live {
            return Err(LaunchError::ChannelOffline(channel.id.clone()));
        }

        let quality = effective_quality(channel, settings.default_stream_quality);
        let mut plan = LaunchPlan::new(
            format!("Stream '{}'", channel.display_name),
            player.to_string(),
            vec![channel_url.to_string(), quality.player_arg().to_string()],
        );
        plan.notes.push("Launching stream player...".to_string());
        if quality != settings.default_stream_quality {
            plan.notes.push(
                "[NOTE] Channel is not a partner so falling back to Source quality".to_string(),
            );
        }
        Ok(plan)
    }

    /// Build the player command for a recorded broadcast
    pub fn plan_vod(settings: &Settings, vod: &VodDetails) -> Result<LaunchPlan, LaunchError> {
        let player = settings.livestreamer_full_path.trim();
        if !player_exists(player) {
            return Err(LaunchError::PlayerNotFound(player.to_string()));
        }

        let title = if vod.title.is_empty() {
            format!("VOD '{}'", vod.url)
        } else {
            format!("VOD '{}'", vod.title)
        };
        let mut plan = LaunchPlan::new(
            title,
            player.to_string(),
            vec![
                vod.url.clone(),
                settings.default_stream_quality.player_arg().to_string(),
            ],
        );
        plan.notes.push("Launching stream player...".to_string());
        Ok(plan)
    }

    /// Build the chat window command from the configured command line
    pub fn plan_chat(settings: &Settings, channel_url: &str) -> Result<LaunchPlan, LaunchError> {
        let command_line = settings.chat_command_line().replace("{url}", channel_url);
        let mut parts = split_command_line(&command_line)?.into_iter();
        let program = parts.next().ok_or(LaunchError::EmptyCommand)?;
        Ok(LaunchPlan::new(
            format!("Chat {}", channel_url),
            program,
            parts.collect(),
        ))
    }

    /// Run a plan on a worker thread, streaming its output to `events`.
    /// Any stderr output or a failing exit code keeps the status dialog open.
    pub fn spawn(plan: &LaunchPlan, events: Sender<LaunchEvent>) -> Result<(), LaunchError> {
        info!(program = %plan.program, args = ?plan.args, "launching player");

        let mut child = Command::new(&plan.program)
            .args(&plan.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: plan.program.clone(),
                source,
            })?;

        let id = plan.id;
        let stdout = child.stdout.take().map(|out| forward_lines(id, out, false, events.clone()));
        let stderr = child.stderr.take().map(|err| forward_lines(id, err, true, events.clone()));

        thread::spawn(move || {
            let status = child.wait();
            let saw_stderr = stderr.map(|h| h.join().unwrap_or(false)).unwrap_or(false);
            if let Some(h) = stdout {
                let _ = h.join();
            }

            let (code, success) = match status {
                Ok(status) => (status.code(), status.success()),
                Err(e) => {
                    error!("failed to wait for player: {}", e);
                    (None, false)
                }
            };
            if !success {
                warn!(?code, "player exited with error");
            }
            let _ = events.send(LaunchEvent::Exited {
                id,
                code,
                keep_open: saw_stderr || !success,
            });
        });

        Ok(())
    }

    /// Start a process without capturing its output
    pub fn spawn_detached(plan: &LaunchPlan) -> Result<(), LaunchError> {
        info!(program = %plan.program, "launching detached");
        let mut child = Command::new(&plan.program)
            .args(&plan.args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: plan.program.clone(),
                source,
            })?;
        // Reap the process when it exits
        thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

/// Forward each non-empty line; the join result tells whether any line was sent
fn forward_lines<R: Read + Send + 'static>(
    id: u64,
    reader: R,
    is_error: bool,
    events: Sender<LaunchEvent>,
) -> thread::JoinHandle<bool> {
    thread::spawn(move || {
        let mut any = false;
        for line in BufReader::new(reader).lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            any = true;
            let _ = events.send(LaunchEvent::Output { id, line, is_error });
        }
        any
    })
}

#[cfg(test)]
#[path = "launcher_tests.rs"]
mod tests;
