use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use scraper::{ElementRef, Html, Selector};
use tracing::{error, info, instrument, warn};

use crate::browser::PortalBrowser;
use crate::config::{PortalConfig, Secret};
use crate::error::ScrapeError;
use crate::model::game::GameRecord;

/// Class of the elements carrying game time and location, alternating.
pub const TIME_LOCATION_CLASS: &str = "game-card-title";
/// Class of the elements carrying the two team names of a game.
pub const TEAM_NAME_CLASS: &str = "game-card-team-name";

const LOGIN_SCRIPT: &str = "showLogin('/')";
const SSO_BUTTON: &str = r#"button[title="WATIAM USERS"]"#;
const EMAIL_INPUT: &str = r#"input[type="email"]"#;
const PASSWORD_INPUT: &str = r#"input[type="password"]"#;
const PAGE_LOAD_MS: u64 = 1000;

/// Raw text of one game card, before the time is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameCard {
    pub time: String,
    pub location: String,
    pub team1: String,
    pub team2: String,
}

/// Portal client for the intramural sports site.
#[derive(Debug, Clone)]
pub struct WarriorPortal {
    base_url: String,
    email: String,
    password: Secret,
    timezone: Tz,
    settle_ms: u64,
}

impl WarriorPortal {
    pub fn from_config(config: &PortalConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            email: config.email.clone(),
            password: config.password.clone(),
            timezone: config.timezone,
            settle_ms: config.settle_ms,
        }
    }

    pub fn team_url(&self, team_id: &str) -> String {
        format!("{}/team/getteaminfo?teamid={}", self.base_url, team_id)
    }

    /// Log in, scrape the team page and parse every game on it.
    /// The browser is closed before returning, whether or not the scrape succeeded.
    #[instrument(level = "info", skip(self, browser))]
    pub async fn fetch_game_data<B: PortalBrowser>(
        &self,
        mut browser: B,
        team_id: &str,
    ) -> Result<Vec<GameRecord>, ScrapeError> {
        let scraped = self.scrape_team_page(&mut browser, team_id).await;
        let closed = browser.close().await;

        let html = match (scraped, closed) {
            (Ok(html), Ok(())) => html,
            (Ok(html), Err(e)) => {
                warn!(error = %e, "Browser did not close cleanly");
                html
            }
            (Err(e), close_result) => {
                if let Err(close_err) = close_result {
                    warn!(error = %close_err, "Browser did not close cleanly");
                }
                error!(error = %e, "Scraping the team page failed");
                return Err(e);
            }
        };

        let games = parse_team_page(&html, self.timezone)?;
        info!(games = games.len(), "Fetched game data");
        Ok(games)
    }

    async fn scrape_team_page<B: PortalBrowser>(&self, browser: &mut B, team_id: &str) -> Result<String, ScrapeError> {
        self.login(browser).await?;
        // The team page only serves game data once the login redirects have finished.
        browser.settle(self.settle_ms).await;
        browser.goto(&self.team_url(team_id)).await?;
        browser.page_source().await
    }

    /// Walk the SSO flow: portal sign-in, then the identity provider email and password pages.
    async fn login<B: PortalBrowser>(&self, browser: &mut B) -> Result<(), ScrapeError> {
        browser.goto(&format!("{}/", self.base_url)).await?;
        browser.settle(PAGE_LOAD_MS).await;
        browser.run_script(LOGIN_SCRIPT).await?;
        browser.click(SSO_BUTTON).await?;
        browser.settle(PAGE_LOAD_MS).await;
        browser.submit_field(EMAIL_INPUT, &self.email).await?;
        browser.submit_field(PASSWORD_INPUT, self.password.expose()).await?;
        info!("Submitted portal credentials");
        Ok(())
    }
}

/// Extract, pair and parse every game on a rendered team page.
pub fn parse_team_page(html: &str, tz: Tz) -> Result<Vec<GameRecord>, ScrapeError> {
    let (time_locations, team_names) = extract_card_text(html)?;
    pair_game_cards(&time_locations, &team_names)?
        .into_iter()
        .map(|card| -> Result<GameRecord, ScrapeError> {
            Ok(GameRecord {
                start_time: parse_game_time(&card.time, tz)?,
                location: card.location,
                team1: card.team1,
                team2: card.team2,
            })
        })
        .collect()
}

/// Stripped text of every time/location element and every team name element, in document order.
pub fn extract_card_text(html: &str) -> Result<(Vec<String>, Vec<String>), ScrapeError> {
    let doc = Html::parse_document(html);
    let time_locations = texts_by_class(&doc, TIME_LOCATION_CLASS)?;
    if time_locations.is_empty() {
        return Err(ScrapeError::MissingMarker(TIME_LOCATION_CLASS));
    }
    let team_names = texts_by_class(&doc, TEAM_NAME_CLASS)?;
    Ok((time_locations, team_names))
}

fn texts_by_class(doc: &Html, class: &'static str) -> Result<Vec<String>, ScrapeError> {
    let selector = Selector::parse(&format!(".{}", class)).map_err(|_| ScrapeError::MissingMarker(class))?;
    Ok(doc.select(&selector).map(stripped_text).collect())
}

fn stripped_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).collect()
}

/// Pair the two flat lists positionally: items `2i`/`2i+1` of `time_locations` are the time and
/// location of game `i`, items `2i`/`2i+1` of `team_names` are its two teams.
/// Layout drift shows up here as a length mismatch instead of silently shifted games.
pub fn pair_game_cards(time_locations: &[String], team_names: &[String]) -> Result<Vec<GameCard>, ScrapeError> {
    if time_locations.len() % 2 != 0 {
        return Err(ScrapeError::OddLength { marker: TIME_LOCATION_CLASS, len: time_locations.len() });
    }
    if team_names.len() % 2 != 0 {
        return Err(ScrapeError::OddLength { marker: TEAM_NAME_CLASS, len: team_names.len() });
    }
    if time_locations.len() != team_names.len() {
        return Err(ScrapeError::Misaligned { times: time_locations.len(), teams: team_names.len() });
    }

    Ok(time_locations
        .chunks_exact(2)
        .zip(team_names.chunks_exact(2))
        .map(|(tl, teams)| GameCard {
            time: tl[0].clone(),
            location: tl[1].clone(),
            team1: teams[0].clone(),
            team2: teams[1].clone(),
        })
        .collect())
}

/// Parse `"Sunday, January 21, 2024 @ 4:00 PM"` as a local time in `tz`.
pub fn parse_game_time(input: &str, tz: Tz) -> Result<DateTime<Tz>, ScrapeError> {
    let bad = |reason: &str| ScrapeError::BadTime { input: input.to_string(), reason: reason.to_string() };

    // Drop the weekday and the "@" separator.
    let cleaned = input
        .split_whitespace()
        .skip(1)
        .filter(|token| *token != "@")
        .collect::<Vec<_>>()
        .join(" ");
    let naive = NaiveDateTime::parse_from_str(&cleaned, "%B %d, %Y %I:%M %p").map_err(|e| bad(&e.to_string()))?;

    // Ambiguous times in the autumn DST overlap resolve to the earlier instant.
    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| bad("local time does not exist in this timezone"))
}
