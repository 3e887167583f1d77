use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppResult;
use crate::events::{Event, EventKind, EventTarget};
use crate::repository::{RepoContext, RepositoryFactory};

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// §4.7: read receipts and unread counts. Holds its own `RepositoryFactory`
/// handle rather than sharing `MessagingService`'s, since receipts never
/// need the permission/validation machinery messages and channels do.
pub struct ReceiptService {
    factory: Arc<dyn RepositoryFactory>,
    hub: crate::hub::HubHandle,
}

impl ReceiptService {
    pub fn new(factory: Arc<dyn RepositoryFactory>, hub: crate::hub::HubHandle) -> Self {
        Self { factory, hub }
    }

    /// Marking your own message as read is a no-op success (§4.7). Otherwise
    /// idempotent: a second call inserts nothing and emits nothing.
    pub async fn mark_as_read(&self, ctx: &RepoContext, message_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let repos = self.factory.repos();
        let message = repos.messages.get_message(ctx, message_id).await?;
        if message.sender_id == user_id {
            return Ok(());
        }
        if repos.receipts.has_receipt(ctx, message_id, user_id).await? {
            return Ok(());
        }

        let tx = self.factory.begin().await?;
        match tx.repos().receipts.create_receipt(ctx, message_id, user_id).await {
            Ok(_receipt) => {
                tx.commit().await?;
                self.hub
                    .broadcast(Event::new(
                        EventKind::ReadReceipt,
                        EventTarget::User(message.sender_id),
                        json!({ "messageId": message_id, "userId": user_id }),
                        now_ms(),
                    ))
                    .await;
                Ok(())
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    /// Inserts missing receipts for every unread message up to `up_to`
    /// (defaulting to now) in one batch, then emits a single ReadReceipt
    /// event for the newest covered message to cut fan-out traffic (§4.7).
    pub async fn mark_channel_as_read(&self, ctx: &RepoContext, channel_id: Uuid, user_id: Uuid, up_to: Option<DateTime<Utc>>) -> AppResult<()> {
        let up_to = up_to.unwrap_or_else(Utc::now);
        let repos = self.factory.repos();
        let unreceipted = repos.receipts.unreceipted_messages(ctx, channel_id, user_id, up_to).await?;
        if unreceipted.is_empty() {
            return Ok(());
        }
        let newest = *unreceipted.last().expect("checked non-empty above");

        let tx = self.factory.begin().await?;
        match tx.repos().receipts.create_bulk_read_receipts(ctx, &unreceipted, user_id).await {
            Ok(_receipts) => {
                tx.commit().await?;
                self.hub
                    .broadcast(Event::new(
                        EventKind::ReadReceipt,
                        EventTarget::Channel(channel_id),
                        json!({ "channelId": channel_id, "userId": user_id, "messageId": newest }),
                        now_ms(),
                    ))
                    .await;
                Ok(())
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    /// Excludes the caller's own messages (§4.7).
    pub async fn get_unread_count(&self, ctx: &RepoContext, channel_id: Uuid, user_id: Uuid) -> AppResult<i64> {
        self.factory.repos().receipts.get_unread_count(ctx, channel_id, user_id).await
    }
}
