use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChannelType {
    Direct,
    Group,
    Public,
    Private,
    Announcement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChannelRole {
    Owner,
    Admin,
    Moderator,
    Member,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Channel {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub channel_type: String,
    pub owner_id: Uuid,
    pub archived: bool,
    pub nsfw: bool,
    pub private: bool,
    pub read_only: bool,
    pub slow_mode_seconds: Option<i32>,
    pub category_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Channel {
    pub fn kind(&self) -> ChannelType {
        self.channel_type.parse().unwrap_or(ChannelType::Group)
    }

    pub fn slow_mode(&self) -> Option<i64> {
        self.slow_mode_seconds.filter(|s| *s > 0).map(i64::from)
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ChannelMember {
    pub channel_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub muted: bool,
    pub banned: bool,
    pub joined_at: DateTime<Utc>,
}

impl ChannelMember {
    pub fn channel_role(&self) -> ChannelRole {
        self.role.parse().unwrap_or(ChannelRole::Member)
    }

    pub fn is_moderator_or_above(&self) -> bool {
        matches!(
            self.channel_role(),
            ChannelRole::Owner | ChannelRole::Admin | ChannelRole::Moderator
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateChannelInput {
    pub name: String,
    pub description: Option<String>,
    pub channel_type: ChannelType,
    pub owner_id: Uuid,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateChannelInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub archived: Option<bool>,
    pub nsfw: Option<bool>,
    pub read_only: Option<bool>,
    pub slow_mode_seconds: Option<i32>,
    pub category_id: Option<Uuid>,
}
