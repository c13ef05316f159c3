use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono_tz::Tz;

use crate::error::ConfigError;

pub const DEFAULT_PORTAL_URL: &str = "https://warrior.uwaterloo.ca";
pub const DEFAULT_DISCORD_API_URL: &str = "https://discord.com/api/v8";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";
pub const DEFAULT_PROFILE_DIR: &str = "./browser/";
/// Longest game a scheduled event may span.
pub const MAX_GAME_DURATION_HOURS: i64 = 24;

/// Outcome of loading a `.env` file into the process environment.
#[derive(Debug)]
pub enum EnvFile {
    Loaded(PathBuf),
    /// No file; the environment may already be populated.
    Absent,
    /// The file exists but could not be read or parsed. Variables after the bad line are not set.
    Invalid(dotenvy::Error),
}

/// Load `.env` from the working directory or one of its parents.
pub fn load_env_file() -> EnvFile {
    classify(dotenvy::dotenv())
}

/// Load a specific env file.
pub fn load_env_file_from(path: impl AsRef<Path>) -> EnvFile {
    let path = path.as_ref();
    classify(dotenvy::from_path(path).map(|()| path.to_path_buf()))
}

fn classify(result: Result<PathBuf, dotenvy::Error>) -> EnvFile {
    match result {
        Ok(path) => EnvFile::Loaded(path),
        Err(e) if e.not_found() => EnvFile::Absent,
        Err(e) => EnvFile::Invalid(e),
    }
}

/// A credential that must not end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Discord side of the configuration.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub token: Secret,
    pub bot_id: String,
    pub guild_id: String,
    pub channel_id: String,
    pub api_url: String,
    pub max_rate_limit_retries: Option<u32>,
}

/// Portal side of the configuration.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub base_url: String,
    pub email: String,
    pub password: Secret,
    pub team_id: String,
    pub timezone: Tz,
    pub settle_ms: u64,
    pub webdriver_url: String,
    /// `None` runs every login with a fresh browser profile.
    pub profile_dir: Option<PathBuf>,
    pub headless: bool,
}

/// Everything the run needs, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub discord: DiscordConfig,
    pub portal: PortalConfig,
    pub game_duration_hours: i64,
    pub send_announcements: bool,
}

impl AppConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let discord = DiscordConfig {
            token: Secret::new(required("DISCORD_TOKEN")?),
            bot_id: required("BOT_ID")?,
            guild_id: required("GUILD_ID")?,
            channel_id: required("CHANNEL_ID")?,
            api_url: get("DISCORD_API_URL").unwrap_or_else(|| DEFAULT_DISCORD_API_URL.to_string()),
            max_rate_limit_retries: get("RATE_LIMIT_MAX_RETRIES")
                .map(|v| parse_number("RATE_LIMIT_MAX_RETRIES", &v))
                .transpose()?,
        };

        // An explicitly empty BROWSER_PROFILE_DIR selects an ephemeral profile.
        let profile_dir = match lookup("BROWSER_PROFILE_DIR") {
            Some(dir) if dir.trim().is_empty() => None,
            Some(dir) => Some(PathBuf::from(dir)),
            None => Some(PathBuf::from(DEFAULT_PROFILE_DIR)),
        };

        let timezone = match get("PORTAL_TIMEZONE") {
            Some(name) => Tz::from_str(name.trim()).map_err(|e| ConfigError::Invalid {
                key: "PORTAL_TIMEZONE",
                value: name.clone(),
                reason: e.to_string(),
            })?,
            None => chrono_tz::America::Toronto,
        };

        let portal = PortalConfig {
            base_url: get("PORTAL_URL").unwrap_or_else(|| DEFAULT_PORTAL_URL.to_string()),
            email: required("EMAIL")?,
            password: Secret::new(required("PASSWORD")?),
            team_id: required("TEAM_ID")?,
            timezone,
            settle_ms: get("TIMEOUT_MS")
                .map(|v| parse_number("TIMEOUT_MS", &v))
                .transpose()?
                .unwrap_or(3000),
            webdriver_url: get("WEBDRIVER_URL").unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string()),
            profile_dir,
            headless: get("HEADLESS").map(|v| parse_flag("HEADLESS", &v)).transpose()?.unwrap_or(true),
        };

        let game_duration_hours = match get("GAME_DURATION_HOURS") {
            Some(v) => {
                let hours: i64 = parse_number("GAME_DURATION_HOURS", &v)?;
                if !(1..=MAX_GAME_DURATION_HOURS).contains(&hours) {
                    return Err(ConfigError::Invalid {
                        key: "GAME_DURATION_HOURS",
                        value: v,
                        reason: format!("expected 1 to {} hours", MAX_GAME_DURATION_HOURS),
                    });
                }
                hours
            }
            None => 1,
        };
        let send_announcements = get("SEND_ANNOUNCEMENTS")
            .map(|v| parse_flag("SEND_ANNOUNCEMENTS", &v))
            .transpose()?
            .unwrap_or(false);

        Ok(Self { discord, portal, game_duration_hours, send_announcements })
    }
}

fn parse_number<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "expected 0 or 1".to_string(),
        }),
    }
}
