use chrono::DateTime;
use chrono_tz::Tz;

/// One scheduled game scraped from the portal team page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameRecord {
    pub start_time: DateTime<Tz>,
    pub location: String,
    pub team1: String,
    pub team2: String,
}

impl GameRecord {
    /// RFC 3339 rendering of the start time, offset included.
    pub fn start_iso(&self) -> String {
        self.start_time.to_rfc3339()
    }

    /// Event description shown in Discord.
    pub fn matchup(&self) -> String {
        format!("{} vs. {}", self.team1, self.team2)
    }
}
