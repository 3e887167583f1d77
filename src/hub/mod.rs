pub mod command;

pub use command::{HubCommand, HubSnapshot, PresenceEntry};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::events::{Event, EventKind, EventTarget};
use crate::models::PresenceStatus;

/// Outbound queue depth for a session's event channel (§4.4).
pub const SESSION_OUTBOUND_QUEUE_DEPTH: usize = 256;

/// Consecutive undeliverable sends before a session is evicted from the
/// hub's maps as unreachable (§4.5, §8 "drop-on-backpressure eviction").
const EVICTION_THRESHOLD: u32 = 10;

/// Command-channel buffer for the hub loop itself.
const HUB_COMMAND_BUFFER: usize = 1024;

struct SessionEntry {
    user_id: Uuid,
    outbound: mpsc::Sender<Arc<Event>>,
    consecutive_drops: u32,
}

/// Single dedicated task owning all hub state. Every mutation — register,
/// unregister, broadcast, subscribe, unsubscribe, presence — goes through
/// this loop's command channel, so there is exactly one writer to every
/// map (§4.5, §5). Callers never touch the maps directly; they talk to a
/// cloneable `HubHandle`.
struct HubLoop {
    sessions: HashMap<Uuid, SessionEntry>,
    user_sessions: HashMap<Uuid, HashSet<Uuid>>,
    channel_subscribers: HashMap<Uuid, HashSet<Uuid>>,
    presence: HashMap<Uuid, PresenceEntry>,
}

fn status_changed_payload(user_id: Uuid, status: PresenceStatus, status_msg: Option<&str>) -> serde_json::Value {
    json!({ "userId": user_id, "status": status.to_string(), "statusMsg": status_msg })
}

impl HubLoop {
    fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            user_sessions: HashMap::new(),
            channel_subscribers: HashMap::new(),
            presence: HashMap::new(),
        }
    }

    /// §4.5 `register`: adds the session; if this is the user's first
    /// session, marks them online and broadcasts `UserStatusChanged`
    /// (§8 property 7, scenario S6).
    fn register(&mut self, session_id: Uuid, user_id: Uuid, outbound: mpsc::Sender<Arc<Event>>) {
        self.sessions.insert(
            session_id,
            SessionEntry {
                user_id,
                outbound,
                consecutive_drops: 0,
            },
        );
        let is_first_session = self
            .user_sessions
            .entry(user_id)
            .or_default()
            .is_empty();
        self.user_sessions.get_mut(&user_id).unwrap().insert(session_id);

        if is_first_session {
            self.presence.insert(
                user_id,
                PresenceEntry {
                    status: PresenceStatus::Online,
                    status_msg: None,
                    last_activity: chrono::Utc::now(),
                },
            );
            self.broadcast(Event::new(
                EventKind::UserStatusChanged,
                EventTarget::Broadcast,
                status_changed_payload(user_id, PresenceStatus::Online, None),
                now_ms(),
            ));
        }
    }

    /// §4.5 `unregister`: removes the session from every map; if no
    /// sessions remain for the user, tears down the presence entry and
    /// broadcasts `UserStatusChanged` offline.
    fn unregister(&mut self, session_id: Uuid) {
        let Some(entry) = self.sessions.remove(&session_id) else {
            return;
        };
        let user_id = entry.user_id;
        let mut user_has_no_sessions = false;
        if let Some(set) = self.user_sessions.get_mut(&user_id) {
            set.remove(&session_id);
            if set.is_empty() {
                self.user_sessions.remove(&user_id);
                user_has_no_sessions = true;
            }
        }
        for subscribers in self.channel_subscribers.values_mut() {
            subscribers.remove(&session_id);
        }
        self.channel_subscribers.retain(|_, subs| !subs.is_empty());

        if user_has_no_sessions {
            self.presence.remove(&user_id);
            self.broadcast(Event::new(
                EventKind::UserStatusChanged,
                EventTarget::Broadcast,
                status_changed_payload(user_id, PresenceStatus::Offline, None),
                now_ms(),
            ));
        }
    }

    fn subscribe(&mut self, session_id: Uuid, channel_id: Uuid) {
        if self.sessions.contains_key(&session_id) {
            self.channel_subscribers.entry(channel_id).or_default().insert(session_id);
        }
    }

    fn unsubscribe(&mut self, session_id: Uuid, channel_id: Uuid) {
        if let Some(subs) = self.channel_subscribers.get_mut(&channel_id) {
            subs.remove(&session_id);
            if subs.is_empty() {
                self.channel_subscribers.remove(&channel_id);
            }
        }
    }

    /// §4.5 `presence`: writes the map, then synthesises a
    /// `UserStatusChanged` event. The spec leaves the target ambiguous
    /// ("caller supplies the channel list or the hub looks it up via the
    /// channel repo — choose one consistently"); this hub has no channel
    /// repository dependency, so it broadcasts to every connected session
    /// rather than reaching out to persistence from inside the hub loop.
    fn set_presence(&mut self, user_id: Uuid, status: PresenceStatus, status_msg: Option<String>) {
        if !self.user_sessions.contains_key(&user_id) {
            return;
        }
        self.presence.insert(
            user_id,
            PresenceEntry {
                status,
                status_msg: status_msg.clone(),
                last_activity: chrono::Utc::now(),
            },
        );
        self.broadcast(Event::new(
            EventKind::UserStatusChanged,
            EventTarget::Broadcast,
            status_changed_payload(user_id, status, status_msg.as_deref()),
            now_ms(),
        ));
    }

    fn recipients_for(&self, target: EventTarget) -> Vec<Uuid> {
        match target {
            EventTarget::Channel(channel_id) => self
                .channel_subscribers
                .get(&channel_id)
                .map(|s| s.iter().copied().collect())
                .unwrap_or_default(),
            EventTarget::User(user_id) => self
                .user_sessions
                .get(&user_id)
                .map(|s| s.iter().copied().collect())
                .unwrap_or_default(),
            EventTarget::Broadcast => self.sessions.keys().copied().collect(),
        }
    }

    /// Fans an event out to every resolved recipient session. A session
    /// whose queue is full has the send dropped (not awaited — the hub
    /// loop never blocks on a slow consumer, §5); after
    /// `EVICTION_THRESHOLD` consecutive drops the session is treated as
    /// unreachable and evicted (§8 "drop-on-backpressure eviction").
    fn broadcast(&mut self, event: Event) {
        let recipients = self.recipients_for(event.target);
        let event = Arc::new(event);
        let mut to_evict = Vec::new();

        for session_id in recipients {
            let Some(entry) = self.sessions.get_mut(&session_id) else {
                continue;
            };
            match entry.outbound.try_send(Arc::clone(&event)) {
                Ok(()) => entry.consecutive_drops = 0,
                Err(_) => {
                    entry.consecutive_drops += 1;
                    if entry.consecutive_drops >= EVICTION_THRESHOLD {
                        warn!(session_id = %session_id, "evicting session after repeated backpressure drops");
                        to_evict.push(session_id);
                    }
                }
            }
        }

        for session_id in to_evict {
            self.unregister(session_id);
        }
    }

    fn snapshot(&self) -> HubSnapshot {
        HubSnapshot {
            connected_sessions: self.sessions.len(),
            connected_users: self.user_sessions.len(),
            channel_subscriber_counts: self
                .channel_subscribers
                .iter()
                .map(|(id, subs)| (*id, subs.len()))
                .collect(),
            presence_entries: self.presence.len(),
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<HubCommand>) {
        while let Some(cmd) = commands.recv().await {
            match cmd {
                HubCommand::Register { session_id, user_id, outbound } => {
                    debug!(session_id = %session_id, user_id = %user_id, "session registered");
                    self.register(session_id, user_id, outbound);
                }
                HubCommand::Unregister { session_id } => {
                    debug!(session_id = %session_id, "session unregistered");
                    self.unregister(session_id);
                }
                HubCommand::Subscribe { session_id, channel_id } => {
                    self.subscribe(session_id, channel_id);
                }
                HubCommand::Unsubscribe { session_id, channel_id } => {
                    self.unsubscribe(session_id, channel_id);
                }
                HubCommand::Broadcast { event } => {
                    self.broadcast(event);
                }
                HubCommand::SetPresence { user_id, status, status_msg } => {
                    self.set_presence(user_id, status, status_msg);
                }
                HubCommand::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot());
                }
            }
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Cloneable, cheap-to-pass-around front door to the hub loop. Every method
/// posts a command and returns; the loop itself does all the work.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Spawns the hub loop task and returns a handle to it. The returned
    /// `JoinHandle` resolves once every clone of the handle has been
    /// dropped and the command channel closes — useful for cascading
    /// shutdown (§5).
    pub fn spawn() -> (Self, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(HUB_COMMAND_BUFFER);
        let join = tokio::spawn(HubLoop::new().run(rx));
        (Self { tx }, join)
    }

    pub async fn register(&self, session_id: Uuid, user_id: Uuid) -> mpsc::Receiver<Arc<Event>> {
        let (outbound_tx, outbound_rx) = mpsc::channel(SESSION_OUTBOUND_QUEUE_DEPTH);
        let _ = self
            .tx
            .send(HubCommand::Register { session_id, user_id, outbound: outbound_tx })
            .await;
        outbound_rx
    }

    pub async fn unregister(&self, session_id: Uuid) {
        let _ = self.tx.send(HubCommand::Unregister { session_id }).await;
    }

    pub async fn subscribe(&self, session_id: Uuid, channel_id: Uuid) {
        let _ = self.tx.send(HubCommand::Subscribe { session_id, channel_id }).await;
    }

    pub async fn unsubscribe(&self, session_id: Uuid, channel_id: Uuid) {
        let _ = self.tx.send(HubCommand::Unsubscribe { session_id, channel_id }).await;
    }

    pub async fn broadcast(&self, event: Event) {
        let _ = self.tx.send(HubCommand::Broadcast { event }).await;
    }

    pub async fn set_presence(&self, user_id: Uuid, status: PresenceStatus, status_msg: Option<String>) {
        let _ = self
            .tx
            .send(HubCommand::SetPresence { user_id, status, status_msg })
            .await;
    }

    pub async fn snapshot(&self) -> Option<HubSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(HubCommand::Snapshot { reply }).await.ok()?;
        rx.await.ok()
    }
}
