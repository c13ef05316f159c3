use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeDelta};
use tracing::{error, info, instrument};

use crate::browser::{DirectorySessionStore, EphemeralSessionStore, WebDriverBrowser};
use crate::config::AppConfig;
use crate::discord::{DiscordEvents, GAME_DAY_MARKER, Transport, announcement_for};
use crate::error::{Error, ScrapeError, SyncError};
use crate::model::event::NewEvent;
use crate::model::game::GameRecord;
use crate::warrior::WarriorPortal;

const NAIVE_ISO: &str = "%Y-%m-%dT%H:%M:%S";

/// Settings the sync step needs, independent of where the games came from.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub guild_id: String,
    pub channel_id: String,
    pub game_duration_hours: i64,
    pub send_announcements: bool,
}

impl SyncSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            guild_id: config.discord.guild_id.clone(),
            channel_id: config.discord.channel_id.clone(),
            game_duration_hours: config.game_duration_hours,
            send_announcements: config.send_announcements,
        }
    }
}

/// What a sync run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub deleted: usize,
    pub created_links: Vec<String>,
    pub skipped_past: usize,
}

/// ISO-8601 end time of a game starting at `start`. Offset timestamps keep their offset,
/// naive ones stay naive. The duration must be a positive number of hours.
pub fn game_endtime(start: &str, duration_hours: i64) -> Result<String, SyncError> {
    let out_of_range = || SyncError::GameDuration { start: start.to_string(), hours: duration_hours };
    let duration = TimeDelta::try_hours(duration_hours)
        .filter(|d| *d > TimeDelta::zero())
        .ok_or_else(out_of_range)?;

    match DateTime::parse_from_rfc3339(start) {
        Ok(dt) => dt
            .checked_add_signed(duration)
            .map(|end| end.to_rfc3339_opts(SecondsFormat::AutoSi, false))
            .ok_or_else(out_of_range),
        Err(_) => {
            let naive = NaiveDateTime::parse_from_str(start, NAIVE_ISO)
                .map_err(|source| SyncError::Timestamp { input: start.to_string(), source })?;
            naive
                .checked_add_signed(duration)
                .map(|end| end.format(NAIVE_ISO).to_string())
                .ok_or_else(out_of_range)
        }
    }
}

/// Replace the previously published game events with one event per game, in order.
/// Stops at the first failure; events already created stay in place.
#[instrument(level = "info", skip(discord, settings, games), fields(game_count = games.len()))]
pub fn sync_games<T: Transport>(
    discord: &DiscordEvents<T>,
    settings: &SyncSettings,
    games: &[GameRecord],
) -> Result<SyncSummary, SyncError> {
    let mut summary = SyncSummary {
        deleted: discord.delete_marked_events(&settings.guild_id, GAME_DAY_MARKER)?,
        ..SyncSummary::default()
    };

    for (index, game) in games.iter().enumerate() {
        let start = game.start_iso();
        let end = game_endtime(&start, settings.game_duration_hours)?;
        let event = NewEvent::external(
            format!("{} {}", GAME_DAY_MARKER, index + 1),
            game.matchup(),
            start,
            end,
            game.location.clone(),
        );

        match discord.create_event(&settings.guild_id, &event)? {
            Some(link) => {
                info!(link = %link, "Published game");
                if settings.send_announcements {
                    discord.send_announcement(&settings.channel_id, &announcement_for(&link))?;
                }
                summary.created_links.push(link);
            }
            None => summary.skipped_past += 1,
        }
    }

    Ok(summary)
}

async fn fetch_games(config: &AppConfig) -> Result<Vec<GameRecord>, ScrapeError> {
    let portal_cfg = &config.portal;
    let browser = match &portal_cfg.profile_dir {
        Some(dir) => {
            let store = DirectorySessionStore::new(dir);
            WebDriverBrowser::launch(&portal_cfg.webdriver_url, &store, portal_cfg.headless).await?
        }
        None => {
            WebDriverBrowser::launch(&portal_cfg.webdriver_url, &EphemeralSessionStore, portal_cfg.headless).await?
        }
    };
    WarriorPortal::from_config(portal_cfg)
        .fetch_game_data(browser, &portal_cfg.team_id)
        .await
}

/// Full run: scrape the portal, then sync Discord on a blocking thread.
pub async fn run(config: AppConfig) -> Result<SyncSummary, Error> {
    let games = fetch_games(&config).await?;

    let settings = SyncSettings::from_config(&config);
    let discord = DiscordEvents::from_config(&config.discord);
    // Blocking HTTP and backoff sleeps must not run on the async worker.
    let summary = tokio::task::spawn_blocking(move || sync_games(&discord, &settings, &games))
        .await?
        .inspect_err(|e| error!(error = %e, "Discord sync failed"))?;

    info!(
        deleted = summary.deleted,
        created = summary.created_links.len(),
        skipped_past = summary.skipped_past,
        "Sync complete"
    );
    Ok(summary)
}
