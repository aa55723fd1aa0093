//! Tests for player command construction and process output capture

use super::*;
use std::sync::mpsc::channel;
use std::time::Duration;

fn existing_binary() -> String {
    std::env::current_exe().unwrap().to_string_lossy().to_string()
}

fn settings_with(quality: StreamQuality) -> Settings {
    Settings {
        default_stream_quality: quality,
        livestreamer_full_path: existing_binary(),
        ..Settings::default()
    }
}

fn live_channel(is_partner: bool) -> ChannelData {
    ChannelData {
        live: true,
        is_partner,
        ..ChannelData::new("somechannel")
    }
}

#[test]
fn test_non_partner_always_gets_source() {
    for quality in StreamQuality::ALL {
        let channel = live_channel(false);
        assert_eq!(effective_quality(&channel, quality), StreamQuality::Source);

        let plan = StreamLauncher::plan_stream(
            &settings_with(quality),
            &channel,
            "https://www.twitch.tv/somechannel/",
        )
        .unwrap();
        assert_eq!(plan.args[1], "source");
    }
}

#[test]
fn test_quality_arguments_use_twitch_names() {
    let args: Vec<&str> = StreamQuality::ALL.iter().map(|q| q.player_arg()).collect();
    assert_eq!(args, vec!["source", "high", "medium", "low", "mobile", "audio_only"]);
}

#[test]
fn test_partner_keeps_selected_quality() {
    let plan = StreamLauncher::plan_stream(
        &settings_with(StreamQuality::Medium),
        &live_channel(true),
        "https://www.twitch.tv/somechannel/",
    )
    .unwrap();
    assert_eq!(plan.args, vec!["https://www.twitch.tv/somechannel/", "medium"]);
    assert_eq!(plan.notes.len(), 1);
}

#[test]
fn test_fallback_is_noted() {
    let plan = StreamLauncher::plan_stream(
        &settings_with(StreamQuality::Low),
        &live_channel(false),
        "https://www.twitch.tv/somechannel/",
    )
    .unwrap();
    assert!(plan.notes.iter().any(|n| n.contains("falling back to Source")));
}

#[test]
fn test_missing_player_is_reported() {
    let settings = Settings {
        livestreamer_full_path: "/definitely/not/here/streamlink".to_string(),
        ..Settings::default()
    };
    let err = StreamLauncher::plan_stream(&settings, &live_channel(true), "u").unwrap_err();
    assert!(matches!(err, LaunchError::PlayerNotFound(_)));
    assert!(matches!(
        StreamLauncher::plan_vod(&settings, &VodDetails::from_url("https://x/v")),
        Err(LaunchError::PlayerNotFound(_))
    ));
}

#[test]
fn test_offline_channel_is_not_launched() {
    let mut channel = live_channel(true);
    channel.live = false;
    let err = StreamLauncher::plan_stream(&settings_with(StreamQuality::Source), &channel, "u")
        .unwrap_err();
    assert!(matches!(err, LaunchError::ChannelOffline(_)));
}

#[test]
fn test_vod_plan_uses_default_quality() {
    let vod = VodDetails::from_url("https://www.twitch.tv/videos/1");
    let plan = StreamLauncher::plan_vod(&settings_with(StreamQuality::High), &vod).unwrap();
    assert_eq!(plan.args, vec!["https://www.twitch.tv/videos/1", "high"]);
    assert!(plan.title.contains("videos/1"));
}

#[test]
fn test_chat_plan_substitutes_url() {
    let settings = Settings {
        chat_command_line: Some(r#""/opt/my chrome/chrome" --app={url}chat?popout=true"#.to_string()),
        ..Settings::default()
    };
    let plan = StreamLauncher::plan_chat(&settings, "https://www.twitch.tv/a/").unwrap();
    assert_eq!(plan.program, "/opt/my chrome/chrome");
    assert_eq!(plan.args, vec!["--app=https://www.twitch.tv/a/chat?popout=true"]);

    let empty = Settings {
        chat_command_line: Some("   ".to_string()),
        ..Settings::default()
    };
    assert!(matches!(
        StreamLauncher::plan_chat(&empty, "u"),
        Err(LaunchError::EmptyCommand)
    ));
}

#[test]
fn test_split_command_line() {
    assert_eq!(split_command_line("a b  c").unwrap(), vec!["a", "b", "c"]);
    assert_eq!(
        split_command_line(r#""C:\Program Files\x.exe" --flag"#).unwrap(),
        vec![r"C:\Program Files\x.exe", "--flag"]
    );
    assert_eq!(split_command_line(r#"x """#).unwrap(), vec!["x", ""]);
    assert!(split_command_line("   ").unwrap().is_empty());
}

#[test]
fn test_unterminated_quote_is_rejected() {
    assert!(matches!(
        split_command_line(r#""C:\Program Files\chrome.exe --app=x"#),
        Err(LaunchError::CommandParse(_))
    ));

    let settings = Settings {
        chat_command_line: Some(r#""/opt/chrome --app={url}"#.to_string()),
        ..Settings::default()
    };
    assert!(matches!(
        StreamLauncher::plan_chat(&settings, "https://www.twitch.tv/a/"),
        Err(LaunchError::CommandParse(_))
    ));
}

#[test]
fn test_player_exists() {
    assert!(player_exists(&existing_binary()));
    assert!(!player_exists(""));
    assert!(!player_exists("/definitely/not/here"));
    assert!(!player_exists("no-such-binary-on-any-path-1234"));
}

#[test]
fn test_launch_ids_are_unique() {
    let settings = settings_with(StreamQuality::Source);
    let a = StreamLauncher::plan_chat(&settings, "u").unwrap();
    let b = StreamLauncher::plan_chat(&settings, "u").unwrap();
    assert_ne!(a.id, b.id);
}

#[cfg(unix)]
fn collect_until_exit(plan: &LaunchPlan) -> Vec<LaunchEvent> {
    let (tx, rx) = channel();
    StreamLauncher::spawn(plan, tx).unwrap();
    let mut events = Vec::new();
    loop {
        let event = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        let done = matches!(event, LaunchEvent::Exited { .. });
        events.push(event);
        if done {
            return events;
        }
    }
}

#[cfg(unix)]
#[test]
fn test_spawn_captures_output_and_keeps_dialog_on_error() {
    let plan = LaunchPlan::new(
        "test".to_string(),
        "sh".to_string(),
        vec!["-c".to_string(), "echo hello; echo broken 1>&2; exit 3".to_string()],
    );
    let events = collect_until_exit(&plan);

    assert!(events.contains(&LaunchEvent::Output { id: plan.id, line: "hello".into(), is_error: false }));
    assert!(events.contains(&LaunchEvent::Output { id: plan.id, line: "broken".into(), is_error: true }));
    assert_eq!(
        events.last().unwrap(),
        &LaunchEvent::Exited { id: plan.id, code: Some(3), keep_open: true }
    );
}

#[cfg(unix)]
#[test]
fn test_spawn_clean_exit_closes_dialog() {
    let plan = LaunchPlan::new(
        "test".to_string(),
        "sh".to_string(),
        vec!["-c".to_string(), "echo ok".to_string()],
    );
    let events = collect_until_exit(&plan);
    assert_eq!(
        events.last().unwrap(),
        &LaunchEvent::Exited { id: plan.id, code: Some(0), keep_open: false }
    );
}

#[test]
fn test_spawn_failure_is_an_error() {
    let plan = LaunchPlan::new("t".into(), "/definitely/not/here".into(), Vec::new());
    let (tx, _rx) = channel();
    assert!(matches!(
        StreamLauncher::spawn(&plan, tx),
        Err(LaunchError::Spawn { .. })
    ));
}
