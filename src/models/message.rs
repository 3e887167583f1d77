use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attachment::Attachment;
use super::embed::Embed;
use super::reaction::ReactionCount;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub reply_to_id: Option<Uuid>,
    pub thread_id: Option<Uuid>,
    pub pinned: bool,
    pub pinned_by: Option<Uuid>,
    pub pinned_at: Option<DateTime<Utc>>,
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Fully hydrated message used as an event payload (§4.2: "for
/// MessageCreated: full message with attachments/embeds/reactions
/// eager-loaded").
#[derive(Debug, Clone, Serialize)]
pub struct HydratedMessage {
    #[serde(flatten)]
    pub message: Message,
    pub attachments: Vec<Attachment>,
    pub embeds: Vec<Embed>,
    pub reactions: Vec<ReactionCount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMessageInput {
    pub channel_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub reply_to_id: Option<Uuid>,
    pub thread_id: Option<Uuid>,
    #[serde(default)]
    pub attachments: Vec<super::attachment::NewAttachment>,
    #[serde(default)]
    pub embeds: Vec<super::embed::NewEmbed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMessageInput {
    pub content: String,
}

/// Every field optional with an explicit presence flag via `Option<T>` —
/// resolving the Open Question in spec.md §9 about the source's
/// inconsistent pointer/value mix that could dereference a nil channel
/// pointer. `None` always means "no filter on this field", never "crash".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageSearchFilter {
    pub channel_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub thread_id: Option<Uuid>,
    pub query: Option<String>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub has_attachments: Option<bool>,
    pub has_mentions: Option<bool>,
    pub pinned: Option<bool>,
    pub nsfw: Option<bool>,
    pub spoiler: Option<bool>,
    pub limit: i64,
    pub offset: i64,
}
