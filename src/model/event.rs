use serde::{Deserialize, Serialize};

/// Discord `EXTERNAL` scheduled event entity type.
pub const ENTITY_TYPE_EXTERNAL: u8 = 3;
/// Discord `GUILD_ONLY` privacy level.
pub const PRIVACY_GUILD_ONLY: u8 = 2;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityMetadata {
    #[serde(default)]
    pub location: Option<String>,
}

/// A guild scheduled event as returned by Discord. Only the fields this crate reads are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub scheduled_start_time: Option<String>,
    #[serde(default)]
    pub scheduled_end_time: Option<String>,
    #[serde(default)]
    pub entity_metadata: Option<EntityMetadata>,
    #[serde(default)]
    pub privacy_level: Option<u8>,
    #[serde(default)]
    pub entity_type: Option<u8>,
}

/// Body of `POST /guilds/{id}/scheduled-events`.
#[derive(Debug, Clone, Serialize)]
pub struct NewEvent {
    pub name: String,
    pub privacy_level: u8,
    pub scheduled_start_time: String,
    pub scheduled_end_time: String,
    pub description: String,
    pub channel_id: Option<String>,
    pub entity_metadata: EntityMetadata,
    pub entity_type: u8,
}

impl NewEvent {
    /// An external, guild-only event at `location`.
    pub fn external(
        name: impl Into<String>,
        description: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            privacy_level: PRIVACY_GUILD_ONLY,
            scheduled_start_time: start.into(),
            scheduled_end_time: end.into(),
            description: description.into(),
            channel_id: None,
            entity_metadata: EntityMetadata { location: Some(location.into()) },
            entity_type: ENTITY_TYPE_EXTERNAL,
        }
    }
}

/// Body of `POST /channels/{id}/messages`.
#[derive(Debug, Clone, Serialize)]
pub struct MessagePayload<'a> {
    pub content: &'a str,
    pub tts: bool,
}

/// Subset of a Discord error body.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}
