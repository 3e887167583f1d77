use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::events::Event;
use crate::models::PresenceStatus;

/// Snapshot of hub-internal state (§5.1): never read by reaching into the
/// hub's maps directly, only by asking the hub loop to produce one.
#[derive(Debug, Clone)]
pub struct HubSnapshot {
    pub connected_sessions: usize,
    pub connected_users: usize,
    pub channel_subscriber_counts: Vec<(Uuid, usize)>,
    pub presence_entries: usize,
}

/// `presence: mapping user id → {status, statusMsg, lastActivity}` (§4.5).
#[derive(Debug, Clone)]
pub struct PresenceEntry {
    pub status: PresenceStatus,
    pub status_msg: Option<String>,
    pub last_activity: DateTime<Utc>,
}

/// Everything the hub loop can be asked to do. One `mpsc` channel, one
/// consumer task, processed strictly in arrival order (§4.5, §8 property 1).
pub enum HubCommand {
    Register {
        session_id: Uuid,
        user_id: Uuid,
        outbound: mpsc::Sender<Arc<Event>>,
    },
    Unregister {
        session_id: Uuid,
    },
    Subscribe {
        session_id: Uuid,
        channel_id: Uuid,
    },
    Unsubscribe {
        session_id: Uuid,
        channel_id: Uuid,
    },
    Broadcast {
        event: Event,
    },
    SetPresence {
        user_id: Uuid,
        status: PresenceStatus,
        status_msg: Option<String>,
    },
    Snapshot {
        reply: oneshot::Sender<HubSnapshot>,
    },
}
