mod support;

use chrono::TimeZone;
use chrono_tz::America::Toronto;

use gameday_sync::discord::Method;
use gameday_sync::error::SyncError;
use gameday_sync::handler::{SyncSettings, game_endtime, sync_games};
use gameday_sync::model::game::GameRecord;

use support::{client, created, listed, no_content, ok, rate_limited, schedule_past};

fn settings(send_announcements: bool) -> SyncSettings {
    SyncSettings {
        guild_id: "42".to_string(),
        channel_id: "7".to_string(),
        game_duration_hours: 1,
        send_announcements,
    }
}

fn game(day: u32, hour: u32, team2: &str) -> GameRecord {
    GameRecord {
        start_time: Toronto.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap(),
        location: "CIF Field 2".to_string(),
        team1: "Byte Me FC".to_string(),
        team2: team2.to_string(),
    }
}

#[test]
fn end_time_adds_game_duration() {
    assert_eq!(game_endtime("2024-01-20T15:30:00", 1).unwrap(), "2024-01-20T16:30:00");
    assert_eq!(game_endtime("2024-01-21T16:00:00-05:00", 2).unwrap(), "2024-01-21T18:00:00-05:00");
    assert_eq!(game_endtime("2024-01-20T23:30:00", 1).unwrap(), "2024-01-21T00:30:00");
}

#[test]
fn end_time_rejects_durations_that_do_not_move_forward() {
    let err = game_endtime("2024-01-21T16:00:00-05:00", -3).unwrap_err();
    assert!(matches!(err, SyncError::GameDuration { hours: -3, .. }), "error was: {:?}", err);

    let err = game_endtime("2024-01-20T15:30:00", 0).unwrap_err();
    assert!(matches!(err, SyncError::GameDuration { hours: 0, .. }), "error was: {:?}", err);
}

#[test]
fn end_time_out_of_range_is_an_error_not_a_panic() {
    for hours in [i64::MAX, 10_000_000_000] {
        let err = game_endtime("2024-01-21T16:00:00-05:00", hours).unwrap_err();
        assert!(matches!(err, SyncError::GameDuration { .. }), "error was: {:?}", err);
        let err = game_endtime("2024-01-20T15:30:00", hours).unwrap_err();
        assert!(matches!(err, SyncError::GameDuration { .. }), "error was: {:?}", err);
    }
}

#[test]
fn end_time_rejects_garbage() {
    let err = game_endtime("next tuesday", 1).unwrap_err();
    assert!(matches!(err, SyncError::Timestamp { .. }), "error was: {:?}", err);
}

#[test]
fn replaces_old_events_in_source_order() {
    let discord = client(vec![
        listed(&[("1", "GAME DAY 1"), ("2", "Practice"), ("3", "GAME DAY 2")]),
        no_content(),
        no_content(),
        created("100"),
        created("101"),
    ]);
    let games = vec![game(21, 16, "Goal Diggers"), game(28, 18, "Net Gains")];

    let summary = sync_games(&discord, &settings(false), &games).expect("sync failed");

    assert_eq!(summary.deleted, 2);
    assert_eq!(summary.skipped_past, 0);
    assert_eq!(
        summary.created_links,
        vec!["https://discord.com/events/42/100".to_string(), "https://discord.com/events/42/101".to_string()]
    );

    let requests = discord.transport().requests();
    let methods: Vec<Method> = requests.iter().map(|r| r.method).collect();
    assert_eq!(methods, vec![Method::Get, Method::Delete, Method::Delete, Method::Post, Method::Post]);

    let first = requests[3].body.as_ref().unwrap();
    assert_eq!(first["name"], "GAME DAY 1");
    assert_eq!(first["description"], "Byte Me FC vs. Goal Diggers");
    assert_eq!(first["scheduled_start_time"], "2024-01-21T16:00:00-05:00");
    assert_eq!(first["scheduled_end_time"], "2024-01-21T17:00:00-05:00");
    let second = requests[4].body.as_ref().unwrap();
    assert_eq!(second["name"], "GAME DAY 2");
    assert_eq!(second["description"], "Byte Me FC vs. Net Gains");
}

#[test]
fn announces_each_created_event_and_skips_past_games() {
    let discord = client(vec![
        listed(&[]),
        schedule_past(),
        created("200"),
        ok(200, serde_json::json!({ "id": "m1" })),
    ]);
    let games = vec![game(2, 10, "Old Rivals"), game(28, 18, "Net Gains")];

    let summary = sync_games(&discord, &settings(true), &games).expect("sync failed");

    assert_eq!(summary.skipped_past, 1);
    assert_eq!(summary.created_links, vec!["https://discord.com/events/42/200".to_string()]);
    let messages: Vec<_> = discord
        .transport()
        .requests()
        .into_iter()
        .filter(|r| r.url.ends_with("/channels/7/messages"))
        .collect();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].body.as_ref().unwrap()["content"], "@everyone\nhttps://discord.com/events/42/200");
}

#[test]
fn rate_limit_during_sync_creates_each_event_once() {
    let discord = client(vec![listed(&[]), rate_limited("0.2"), created("300")]);

    let summary = sync_games(&discord, &settings(false), &[game(28, 18, "Net Gains")]).expect("sync failed");

    assert_eq!(summary.created_links.len(), 1);
    assert_eq!(discord.transport().calls(Method::Post).len(), 2);
    assert_eq!(discord.transport().remaining(), 0);
}

#[test]
fn failure_aborts_remaining_games() {
    let discord = client(vec![
        listed(&[]),
        created("400"),
        ok(500, serde_json::json!({ "message": "Internal Server Error" })),
    ]);
    let games = vec![game(21, 16, "A"), game(22, 16, "B"), game(23, 16, "C")];

    let err = sync_games(&discord, &settings(false), &games).unwrap_err();

    assert!(matches!(err, SyncError::RemoteApi { status: 500, .. }), "error was: {:?}", err);
    assert_eq!(discord.transport().calls(Method::Post).len(), 2);
}
