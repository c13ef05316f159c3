#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use gameday_sync::discord::{ApiRequest, ApiResponse, DiscordEvents, Method, Transport};
use gameday_sync::error::SyncError;

pub const API: &str = "https://discord.test/api/v8";

/// Replays canned responses in order and records every request it was given.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<ApiResponse>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<ApiResponse>) -> Self {
        Self { responses: Mutex::new(responses.into()), requests: Mutex::new(Vec::new()) }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self, method: Method) -> Vec<ApiRequest> {
        self.requests().into_iter().filter(|r| r.method == method).collect()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, SyncError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.responses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| panic!("no scripted response left for {} {}", request.operation, request.url)))
    }
}

pub fn client(responses: Vec<ApiResponse>) -> DiscordEvents<ScriptedTransport> {
    DiscordEvents::with_transport(ScriptedTransport::new(responses), API).with_pause(|_| {})
}

pub fn ok(status: u16, body: serde_json::Value) -> ApiResponse {
    ApiResponse { status, reset_after: None, body: body.to_string() }
}

pub fn no_content() -> ApiResponse {
    ApiResponse { status: 204, reset_after: None, body: String::new() }
}

pub fn rate_limited(reset_after: &str) -> ApiResponse {
    ApiResponse {
        status: 429,
        reset_after: Some(reset_after.to_string()),
        body: r#"{"message": "You are being rate limited.", "retry_after": 0.5, "global": false}"#.to_string(),
    }
}

pub fn listed(events: &[(&str, &str)]) -> ApiResponse {
    let body: Vec<serde_json::Value> = events
        .iter()
        .map(|(id, name)| serde_json::json!({ "id": id, "guild_id": "42", "name": name, "entity_type": 3 }))
        .collect();
    ok(200, serde_json::Value::Array(body))
}

pub fn created(id: &str) -> ApiResponse {
    ok(200, serde_json::json!({ "id": id, "guild_id": "42", "name": "GAME DAY 1", "entity_type": 3 }))
}

pub fn schedule_past() -> ApiResponse {
    ok(400, serde_json::json!({ "code": 50035, "message": "Invalid Form Body" }))
}
