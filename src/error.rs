use thiserror::Error;

/// Problems reading the process configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// The portal page did not look the way the extractor expects, or the browser failed.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("no elements with class {0:?} on the team page")]
    MissingMarker(&'static str),
    #[error("{marker:?} yielded {len} elements, expected an even count")]
    OddLength { marker: &'static str, len: usize },
    #[error("{times} time/location elements but {teams} team name elements")]
    Misaligned { times: usize, teams: usize },
    #[error("unrecognised game time {input:?}: {reason}")]
    BadTime { input: String, reason: String },
    #[error("browser session failed: {0}")]
    Browser(String),
    #[error("session store at {path}: {source}")]
    SessionStore {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failures talking to the Discord API. Rate limiting is handled internally and only
/// surfaces here when the reset header is unusable or the optional ceiling is hit.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{operation} failed with HTTP {status}: {body}")]
    RemoteApi {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("{operation}: request could not be sent")]
    Transport {
        operation: &'static str,
        #[source]
        source: ureq::Error,
    },
    #[error("{operation}: unexpected response body")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{operation}: rate limited without a usable reset header ({header:?})")]
    RateLimitHeader {
        operation: &'static str,
        header: Option<String>,
    },
    #[error("{operation}: still rate limited after {retries} retries")]
    RateLimitExhausted { operation: &'static str, retries: u32 },
    #[error("cannot end a game starting at {start:?} after {hours} hours")]
    GameDuration { start: String, hours: i64 },
    #[error("invalid timestamp {input:?}")]
    Timestamp {
        input: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Top-level error for a full run.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scrape(#[from] ScrapeError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("sync task did not complete: {0}")]
    Join(#[from] tokio::task::JoinError),
}
