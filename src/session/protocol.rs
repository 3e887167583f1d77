use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Maximum size of one inbound frame (§4.4).
pub const MAX_INBOUND_FRAME_BYTES: usize = 512 * 1024;

/// Client→server command frame (§6): `{ "type": "<command>", "data": {...} }`.
/// Serde's adjacently-tagged representation maps `type` to the variant name
/// and `data` to the payload, matching the wire shape without a hand-rolled
/// two-pass parse.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientFrame {
    Typing(TypingPayload),
    Presence(PresencePayload),
    ChannelSubscribe(ChannelRefPayload),
    ChannelUnsubscribe(ChannelRefPayload),
    Message(MessagePayload),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub channel_id: Uuid,
    pub is_typing: bool,
}

/// `status` is parsed as a raw string, not `PresenceStatus` directly — an
/// invalid value must produce an `invalid_status` Error frame (§4.4 step 6,
/// §6), distinct from the `invalid_format` parse failure step 5 covers.
/// Deserializing straight to `PresenceStatus` would let serde reject the
/// whole frame during the step-5 parse and report the wrong wire code.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload {
    pub status: String,
    pub status_msg: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRefPayload {
    pub channel_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub channel_id: Uuid,
    pub content: String,
}

/// Server→client frame (§6): `{ "type", "channelId"?, "data", "timestamp" }`.
/// `timestamp` is unix seconds on the wire, distinct from `Event::timestamp`
/// (milliseconds) — conversion happens once, at the point a frame is built.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<Uuid>,
    pub data: Value,
    pub timestamp: i64,
}

impl ServerFrame {
    pub fn ack(command: &str, channel_id: Uuid, success: bool) -> Self {
        Self {
            frame_type: format!("{command}_ack"),
            channel_id: Some(channel_id),
            data: serde_json::json!({ "channelId": channel_id, "success": success }),
            timestamp: unix_seconds_now(),
        }
    }
}

/// Protocol-level parse codes (§6's minimum error-code list). Distinct from
/// `AppError::wire_code()` — these never reach a domain error, they're
/// raised before a frame is even dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorCode {
    InvalidFormat,
    InvalidData,
    UnknownMessageType,
    InvalidStatus,
    RateLimited,
    Unauthorized,
}

impl ProtocolErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ProtocolErrorCode::InvalidFormat => "invalid_format",
            ProtocolErrorCode::InvalidData => "invalid_data",
            ProtocolErrorCode::UnknownMessageType => "unknown_message_type",
            ProtocolErrorCode::InvalidStatus => "invalid_status",
            ProtocolErrorCode::RateLimited => "rate_limited",
            ProtocolErrorCode::Unauthorized => "unauthorized",
        }
    }
}

/// `{ "type": "error", "code": <string>, "message": <string> }` (§6).
#[derive(Debug, Clone, Serialize)]
pub struct ErrorFrame {
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    pub code: &'static str,
    pub message: String,
}

impl ErrorFrame {
    pub fn new(code: ProtocolErrorCode, message: impl Into<String>) -> Self {
        Self {
            frame_type: "error",
            code: code.as_str(),
            message: message.into(),
        }
    }

    pub fn from_app_error(err: &crate::error::AppError) -> Self {
        Self {
            frame_type: "error",
            code: err.wire_code(),
            message: err.to_string(),
        }
    }
}

fn unix_seconds_now() -> i64 {
    chrono::Utc::now().timestamp()
}
