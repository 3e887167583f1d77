use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmbedType {
    Link,
    Image,
    Video,
    Audio,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Embed {
    pub id: Uuid,
    pub message_id: Uuid,
    pub url: String,
    pub embed_type: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration_ms: Option<i64>,
    pub nsfw: bool,
    pub spoiler: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEmbed {
    pub url: String,
    pub embed_type: EmbedType,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub spoiler: bool,
}
