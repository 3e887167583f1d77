pub mod protocol;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::events::{Event, EventKind, EventTarget};
use crate::hub::HubHandle;
use crate::repository::context::{cancellation_pair, CancelSignal};
use protocol::{ChannelRefPayload, ClientFrame, ErrorFrame, ProtocolErrorCode, ServerFrame};

/// §4.4 fixed constants.
pub const WRITE_DEADLINE: Duration = Duration::from_secs(10);
pub const PONG_DEADLINE: Duration = Duration::from_secs(60);
pub const PING_INTERVAL: Duration = Duration::from_secs(54);

/// Small channel for frames generated locally for this session alone
/// (command acks, protocol-parse errors) — distinct from the Hub's
/// broadcast queue, which is the only path subject to the backpressure
/// eviction policy in §4.5/§8.
const LOCAL_FRAME_BUFFER: usize = 32;

/// {Handshaking} → {Active} → {Closing} → {Closed} (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshaking,
    Active,
    Closing,
    Closed,
}

/// Runs one session end to end: registers with the Hub, spawns the read and
/// write pumps, and unregisters on teardown. The caller (the `/ws` upgrade
/// handler, an external HTTP concern per spec.md §1) is responsible for
/// admission control before calling this and for releasing the admission
/// connection slot after it returns.
pub async fn run(socket: WebSocket, user_id: Uuid, hub: HubHandle) {
    let session_id = Uuid::new_v4();
    let (cancel_handle, cancel_signal) = cancellation_pair();
    let last_activity = Arc::new(AtomicI64::new(now_secs()));

    let hub_rx = hub.register(session_id, user_id).await;
    let (local_tx, local_rx) = mpsc::channel::<ServerFrame>(LOCAL_FRAME_BUFFER);
    let (sink, stream) = socket.split();

    debug!(session_id = %session_id, user_id = %user_id, "session handshake complete, now active");

    let write_task = tokio::spawn(write_pump(sink, hub_rx, local_rx, cancel_signal.clone()));

    read_pump(
        stream,
        session_id,
        user_id,
        hub.clone(),
        local_tx,
        Arc::clone(&last_activity),
        cancel_signal,
    )
    .await;

    cancel_handle.cancel();
    let _ = write_task.await;
    hub.unregister(session_id).await;
    debug!(session_id = %session_id, user_id = %user_id, "session closed");
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Single task per session. Reads one frame at a time with a deadline equal
/// to the pong deadline; any frame arriving (text, pong, ping) resets the
/// deadline for the next read, which is what "install a pong handler that
/// extends the read deadline" reduces to once pumped through
/// `tokio::time::timeout` in a loop (§4.4).
async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    session_id: Uuid,
    user_id: Uuid,
    hub: HubHandle,
    local_tx: mpsc::Sender<ServerFrame>,
    last_activity: Arc<AtomicI64>,
    mut cancel: CancelSignal,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            next = timeout(PONG_DEADLINE, stream.next()) => {
                let message = match next {
                    Err(_elapsed) => {
                        debug!(session_id = %session_id, "read deadline exceeded");
                        return;
                    }
                    Ok(None) => return,
                    Ok(Some(Err(e))) => {
                        warn!(session_id = %session_id, error = %e, "websocket read error");
                        return;
                    }
                    Ok(Some(Ok(message))) => message,
                };

                last_activity.store(now_secs(), Ordering::SeqCst);

                match message {
                    Message::Text(text) => {
                        dispatch_text_frame(&text, session_id, user_id, &hub, &local_tx).await;
                    }
                    Message::Close(_) => return,
                    Message::Pong(_) | Message::Ping(_) => {}
                    Message::Binary(_) => {
                        let _ = local_tx
                            .send(ServerFrame::from_error(ErrorFrame::new(
                                ProtocolErrorCode::UnknownMessageType,
                                "binary frames are not supported",
                            )))
                            .await;
                    }
                }
            }
        }
    }
}

/// §4.4 step 5-6: parse `{type, data}` and dispatch by `type`.
async fn dispatch_text_frame(
    text: &str,
    session_id: Uuid,
    user_id: Uuid,
    hub: &HubHandle,
    local_tx: &mpsc::Sender<ServerFrame>,
) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(_) => {
            let _ = local_tx
                .send(ServerFrame::from_error(ErrorFrame::new(
                    ProtocolErrorCode::InvalidFormat,
                    "frame is not a recognised command",
                )))
                .await;
            return;
        }
    };

    match frame {
        ClientFrame::Typing(payload) => {
            hub.broadcast(Event::new(
                EventKind::Typing,
                EventTarget::Channel(payload.channel_id),
                serde_json::json!({
                    "channelId": payload.channel_id,
                    "userId": user_id,
                    "isTyping": payload.is_typing,
                }),
                now_ms(),
            ))
            .await;
        }
        ClientFrame::Presence(payload) => {
            // §4.4 step 6: validate `status ∈ {online, idle, dnd, offline}`
            // here, not via serde during the step-5 frame parse, so a bad
            // value reports `invalid_status` rather than `invalid_format`.
            match payload.status.parse::<crate::models::PresenceStatus>() {
                Ok(status) => hub.set_presence(user_id, status, payload.status_msg).await,
                Err(_) => {
                    let _ = local_tx
                        .send(ServerFrame::from_error(ErrorFrame::new(
                            ProtocolErrorCode::InvalidStatus,
                            format!("'{}' is not a valid presence status", payload.status),
                        )))
                        .await;
                }
            }
        }
        ClientFrame::ChannelSubscribe(ChannelRefPayload { channel_id }) => {
            hub.subscribe(session_id, channel_id).await;
            let _ = local_tx
                .send(ServerFrame::ack("channel_subscribe", channel_id, true))
                .await;
        }
        ClientFrame::ChannelUnsubscribe(ChannelRefPayload { channel_id }) => {
            hub.unsubscribe(session_id, channel_id).await;
            let _ = local_tx
                .send(ServerFrame::ack("channel_unsubscribe", channel_id, true))
                .await;
        }
        ClientFrame::Message(payload) => {
            // Persistence is the Messaging service's responsibility and is
            // reached through the library API, not this dispatch loop
            // (§4.4). This path only covers the live fan-out side for
            // direct-chat flows that persist out of band.
            hub.broadcast(Event::new(
                EventKind::MessageCreated,
                EventTarget::Channel(payload.channel_id),
                serde_json::json!({
                    "channelId": payload.channel_id,
                    "senderId": user_id,
                    "content": payload.content,
                }),
                now_ms(),
            ))
            .await;
        }
    }
}

/// Single task per session. A ticker fires ping frames every
/// `PING_INTERVAL`; otherwise the pump blocks on whichever of the two
/// outbound sources (hub-broadcast events, locally-generated acks/errors)
/// produces next. On waking for a hub event, additional already-queued
/// events are drained and coalesced into the same text message separated
/// by newlines, matching the write pump's batching behaviour (§4.4).
async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut hub_rx: mpsc::Receiver<Arc<Event>>,
    mut local_rx: mpsc::Receiver<ServerFrame>,
    mut cancel: CancelSignal,
) {
    let mut ping_timer = interval(PING_INTERVAL);
    ping_timer.tick().await; // first tick fires immediately; discard it

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = timeout(WRITE_DEADLINE, sink.send(Message::Close(None))).await;
                return;
            }
            _ = ping_timer.tick() => {
                if timeout(WRITE_DEADLINE, sink.send(Message::Ping(Vec::new()))).await.is_err() {
                    return;
                }
            }
            frame = local_rx.recv() => {
                match frame {
                    None => return,
                    Some(frame) => {
                        if write_text(&mut sink, &serde_json::to_string(&frame).unwrap_or_default()).await.is_err() {
                            return;
                        }
                    }
                }
            }
            event = hub_rx.recv() => {
                match event {
                    None => {
                        let _ = timeout(WRITE_DEADLINE, sink.send(Message::Close(None))).await;
                        return;
                    }
                    Some(event) => {
                        let mut batch = serde_json::to_string(&ServerFrame::from_event(&event)).unwrap_or_default();
                        while let Ok(next) = hub_rx.try_recv() {
                            batch.push('\n');
                            batch.push_str(&serde_json::to_string(&ServerFrame::from_event(&next)).unwrap_or_default());
                        }
                        if write_text(&mut sink, &batch).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}

async fn write_text(sink: &mut SplitSink<WebSocket, Message>, text: &str) -> Result<(), ()> {
    timeout(WRITE_DEADLINE, sink.send(Message::Text(text.to_string())))
        .await
        .map_err(|_| ())?
        .map_err(|_| ())
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl ServerFrame {
    fn from_event(event: &Event) -> Self {
        let channel_id = match event.target {
            EventTarget::Channel(id) => Some(id),
            _ => None,
        };
        Self {
            frame_type: event_kind_wire_name(event.kind),
            channel_id,
            data: event.payload.clone(),
            timestamp: event.timestamp / 1000,
        }
    }

    fn from_error(err: ErrorFrame) -> Self {
        Self {
            frame_type: "error".to_string(),
            channel_id: None,
            data: serde_json::json!({ "code": err.code, "message": err.message }),
            timestamp: now_secs(),
        }
    }
}

fn event_kind_wire_name(kind: EventKind) -> String {
    serde_json::to_value(kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_presence_status_reports_invalid_status_code() {
        let (hub, _join) = HubHandle::spawn();
        let (local_tx, mut local_rx) = mpsc::channel(8);
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();

        dispatch_text_frame(
            r#"{"type":"presence","data":{"status":"busy"}}"#,
            session_id,
            user_id,
            &hub,
            &local_tx,
        )
        .await;

        let frame = local_rx.recv().await.unwrap();
        assert_eq!(frame.frame_type, "error");
        assert_eq!(frame.data["code"], "invalid_status");
    }

    #[tokio::test]
    async fn valid_presence_status_updates_hub_with_no_error_frame() {
        let (hub, _join) = HubHandle::spawn();
        let (local_tx, mut local_rx) = mpsc::channel(8);
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let mut events = hub.register(session_id, user_id).await;
        let _ = events.recv().await; // online event from registration

        dispatch_text_frame(
            r#"{"type":"presence","data":{"status":"idle"}}"#,
            session_id,
            user_id,
            &hub,
            &local_tx,
        )
        .await;

        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(50), local_rx.recv())
                .await
                .is_err(),
            "a valid presence update must not emit a local error frame"
        );
        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::UserStatusChanged);
    }

    #[tokio::test]
    async fn malformed_frame_reports_invalid_format_not_invalid_status() {
        let (hub, _join) = HubHandle::spawn();
        let (local_tx, mut local_rx) = mpsc::channel(8);

        dispatch_text_frame("not json at all", Uuid::new_v4(), Uuid::new_v4(), &hub, &local_tx).await;

        let frame = local_rx.recv().await.unwrap();
        assert_eq!(frame.data["code"], "invalid_format");
    }
}
