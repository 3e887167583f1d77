use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Tagged event kind (§4.2). Exactly the set spec.md enumerates — adding a
/// new kind means adding a new server→client event type string in
/// `session::protocol` too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    MessageCreated,
    MessageUpdated,
    MessageDeleted,
    MessagePinned,
    MessageUnpinned,
    ReactionAdded,
    ReactionRemoved,
    ReadReceipt,
    ChannelCreated,
    ChannelUpdated,
    ChannelDeleted,
    ChannelRead,
    MemberAdded,
    MemberRemoved,
    RoleCreated,
    RoleUpdated,
    RoleDeleted,
    RoleAssigned,
    RoleRevoked,
    UserStatusChanged,
    UserBlocked,
    UserUnblocked,
    UserMuted,
    UserUnmuted,
    Typing,
    Error,
}

/// Routing target (§4.2). Resolved to a concrete recipient session set by
/// the Hub, never by the publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTarget {
    Channel(Uuid),
    User(Uuid),
    Broadcast,
}

/// An immutable, already-published event. Construction is the only way to
/// get one — there is no setter, matching "events are read-only once
/// published" (§3 Ownership, §4.2).
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub kind: EventKind,
    #[serde(skip)]
    pub target: EventTarget,
    pub payload: Value,
    /// Monotonic publication time, milliseconds since epoch (§4.2).
    pub timestamp: i64,
}

impl Event {
    pub fn new(kind: EventKind, target: EventTarget, payload: Value, timestamp_ms: i64) -> Self {
        Self {
            kind,
            target,
            payload,
            timestamp: timestamp_ms,
        }
    }
}
