use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::DiscordConfig;
use crate::error::SyncError;
use crate::model::event::{ApiErrorBody, MessagePayload, NewEvent, RemoteEvent};

/// Error code Discord returns when a scheduled event would start in the past.
pub const SCHEDULE_PAST_CODE: i64 = 50035;
/// Name fragment identifying events this crate created and may delete.
pub const GAME_DAY_MARKER: &str = "GAME DAY";
pub const EVENT_LINK_BASE: &str = "https://discord.com/events";

const RATE_LIMIT_STATUS: u16 = 429;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

/// One Discord API call, resent unchanged after a rate limit.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub operation: &'static str,
    pub method: Method,
    pub url: String,
    pub body: Option<serde_json::Value>,
}

/// The parts of an HTTP response the sync client looks at.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// Seconds to wait, from `X-RateLimit-Reset-After` or else `Retry-After`.
    pub reset_after: Option<String>,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn into_error(self, operation: &'static str) -> SyncError {
        SyncError::RemoteApi { operation, status: self.status, body: self.body }
    }

    fn json<T: serde::de::DeserializeOwned>(&self, operation: &'static str) -> Result<T, SyncError> {
        serde_json::from_str(&self.body).map_err(|source| SyncError::Decode { operation, source })
    }
}

/// Sends a single request. Non-2xx statuses are responses, not errors.
pub trait Transport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, SyncError>;
}

/// Blocking HTTP transport carrying the bot authorization headers.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    authorization: String,
    user_agent: String,
}

impl UreqTransport {
    pub fn new(token: &str, bot_id: &str) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Duration::from_secs(30)))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            authorization: format!("Bot {}", token),
            user_agent: format!(
                "DiscordBot (https://discord.com/developers/applications/{}/bot, {})",
                bot_id,
                env!("CARGO_PKG_VERSION")
            ),
        }
    }
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport").field("user_agent", &self.user_agent).finish_non_exhaustive()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, SyncError> {
        let operation = request.operation;
        let auth = self.authorization.as_str();
        let agent = self.user_agent.as_str();
        let result = match request.method {
            Method::Get => self
                .agent
                .get(&request.url)
                .header("Authorization", auth)
                .header("User-Agent", agent)
                .call(),
            Method::Delete => self
                .agent
                .delete(&request.url)
                .header("Authorization", auth)
                .header("User-Agent", agent)
                .call(),
            Method::Post => {
                let body = request.body.clone().unwrap_or(serde_json::Value::Null);
                self.agent
                    .post(&request.url)
                    .header("Authorization", auth)
                    .header("User-Agent", agent)
                    .send_json(body)
            }
        };
        let response = result.map_err(|source| SyncError::Transport { operation, source })?;

        let status = response.status().as_u16();
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        let reset_after = header("X-RateLimit-Reset-After").or_else(|| header("Retry-After"));
        let body = response
            .into_body()
            .read_to_string()
            .map_err(|source| SyncError::Transport { operation, source })?;

        Ok(ApiResponse { status, reset_after, body })
    }
}

/// How the client reacts to HTTP 429.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Added to the server-provided reset time.
    pub safety_margin: Duration,
    /// `None` retries for as long as the server keeps rate limiting.
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { safety_margin: Duration::from_millis(250), max_retries: None }
    }
}

impl RetryPolicy {
    fn backoff(&self, operation: &'static str, reset_after: Option<&str>) -> Result<Duration, SyncError> {
        let wait = reset_after
            .and_then(|v| v.trim().parse::<f64>().ok())
            .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
            .ok_or_else(|| SyncError::RateLimitHeader {
                operation,
                header: reset_after.map(str::to_owned),
            })?;
        Ok(wait + self.safety_margin)
    }
}

/// Discord scheduled-event and message client.
#[derive(Debug, Clone)]
pub struct DiscordEvents<T = UreqTransport> {
    transport: T,
    api_url: String,
    policy: RetryPolicy,
    pause: fn(Duration),
}

impl DiscordEvents<UreqTransport> {
    /// Build a client from configuration using the blocking HTTP transport.
    pub fn from_config(config: &DiscordConfig) -> Self {
        let transport = UreqTransport::new(config.token.expose(), &config.bot_id);
        let policy = RetryPolicy { max_retries: config.max_rate_limit_retries, ..RetryPolicy::default() };
        Self::with_transport(transport, &config.api_url).with_policy(policy)
    }
}

impl<T: Transport> DiscordEvents<T> {
    pub fn with_transport(transport: T, api_url: &str) -> Self {
        Self {
            transport,
            api_url: api_url.trim_end_matches('/').to_string(),
            policy: RetryPolicy::default(),
            pause: std::thread::sleep,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the blocking sleep used during rate-limit backoff.
    pub fn with_pause(mut self, pause: fn(Duration)) -> Self {
        self.pause = pause;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `request` until it is not rate limited, then hand the response to `handle`.
    fn execute<R, F>(&self, request: ApiRequest, handle: F) -> Result<R, SyncError>
    where
        F: FnOnce(ApiResponse) -> Result<R, SyncError>,
    {
        let operation = request.operation;
        let mut retries: u32 = 0;
        loop {
            let response = self.transport.send(&request)?;
            if response.status != RATE_LIMIT_STATUS {
                debug!(operation, status = response.status, retries, "Discord responded");
                return handle(response);
            }

            if let Some(max) = self.policy.max_retries {
                if retries >= max {
                    return Err(SyncError::RateLimitExhausted { operation, retries });
                }
            }
            let wait = self.policy.backoff(operation, response.reset_after.as_deref())?;
            retries += 1;
            warn!(operation, wait_ms = wait.as_millis() as u64, retries, "Rate limited by Discord");
            (self.pause)(wait);
        }
    }

    fn json_body<B: Serialize>(operation: &'static str, body: &B) -> Result<serde_json::Value, SyncError> {
        serde_json::to_value(body).map_err(|source| SyncError::Decode { operation, source })
    }

    /// List the scheduled events of a guild.
    #[instrument(level = "info", skip(self))]
    pub fn list_events(&self, guild_id: &str) -> Result<Vec<RemoteEvent>, SyncError> {
        let operation = "list_events";
        let request = ApiRequest {
            operation,
            method: Method::Get,
            url: format!("{}/guilds/{}/scheduled-events", self.api_url, guild_id),
            body: None,
        };
        self.execute(request, |response| {
            if !response.is_success() {
                return Err(response.into_error(operation));
            }
            response.json::<Vec<RemoteEvent>>(operation)
        })
    }

    fn delete_event(&self, guild_id: &str, event_id: &str) -> Result<(), SyncError> {
        let operation = "delete_event";
        let request = ApiRequest {
            operation,
            method: Method::Delete,
            url: format!("{}/guilds/{}/scheduled-events/{}", self.api_url, guild_id, event_id),
            body: None,
        };
        self.execute(request, |response| {
            if response.is_success() {
                Ok(())
            } else {
                Err(response.into_error(operation))
            }
        })
    }

    /// Delete every scheduled event whose name contains `marker`. Returns how many were deleted.
    #[instrument(level = "info", skip(self))]
    pub fn delete_marked_events(&self, guild_id: &str, marker: &str) -> Result<usize, SyncError> {
        let events = self.list_events(guild_id)?;
        let mut deleted = 0;
        for event in events.iter().filter(|e| e.name.contains(marker)) {
            self.delete_event(guild_id, &event.id)?;
            info!(event_id = %event.id, name = %event.name, "Deleted scheduled event");
            deleted += 1;
        }
        Ok(deleted)
    }

    /// Create a scheduled event and return its link.
    /// Returns `Ok(None)` when Discord refuses because the start time has already passed.
    #[instrument(level = "info", skip(self, event), fields(name = %event.name))]
    pub fn create_event(&self, guild_id: &str, event: &NewEvent) -> Result<Option<String>, SyncError> {
        let operation = "create_event";
        let request = ApiRequest {
            operation,
            method: Method::Post,
            url: format!("{}/guilds/{}/scheduled-events", self.api_url, guild_id),
            body: Some(Self::json_body(operation, event)?),
        };
        self.execute(request, |response| {
            if response.is_success() {
                let created: RemoteEvent = response.json(operation)?;
                let guild = created.guild_id.as_deref().unwrap_or(guild_id);
                info!(event_id = %created.id, "Event created");
                return Ok(Some(format!("{}/{}/{}", EVENT_LINK_BASE, guild, created.id)));
            }
            let code = serde_json::from_str::<ApiErrorBody>(&response.body).ok().and_then(|b| b.code);
            if code == Some(SCHEDULE_PAST_CODE) {
                info!(status = response.status, "Event start is in the past; skipped");
                return Ok(None);
            }
            Err(response.into_error(operation))
        })
    }

    /// Post a plain text message to a channel.
    #[instrument(level = "info", skip(self, message))]
    pub fn send_announcement(&self, channel_id: &str, message: &str) -> Result<(), SyncError> {
        let operation = "send_announcement";
        let request = ApiRequest {
            operation,
            method: Method::Post,
            url: format!("{}/channels/{}/messages", self.api_url, channel_id),
            body: Some(Self::json_body(operation, &MessagePayload { content: message, tts: false })?),
        };
        self.execute(request, |response| {
            if response.is_success() {
                Ok(())
            } else {
                Err(response.into_error(operation))
            }
        })
    }
}

/// Message text announcing a freshly created event.
pub fn announcement_for(event_link: &str) -> String {
    format!("@everyone\n{}", event_link)
}
