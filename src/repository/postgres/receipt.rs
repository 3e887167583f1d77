use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::ReadReceipt;
use crate::repository::{ReadReceiptRepository, RepoContext};

use super::Executor;

pub(super) struct PgReadReceiptRepository {
    executor: Executor,
}

impl PgReadReceiptRepository {
    pub(super) fn new(executor: Executor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ReadReceiptRepository for PgReadReceiptRepository {
    async fn get_unread_count(&self, _ctx: &RepoContext, channel_id: Uuid, user_id: Uuid) -> AppResult<i64> {
        let query = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT count(*) FROM messages m
            WHERE m.channel_id = $1 AND m.deleted_at IS NULL AND m.sender_id <> $2
              AND NOT EXISTS (SELECT 1 FROM read_receipts r WHERE r.message_id = m.id AND r.user_id = $2)
            "#,
        )
        .bind(channel_id)
        .bind(user_id);

        Ok(match &self.executor {
            Executor::Pool(pool) => query.fetch_one(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_one(&mut **guard).await?
            }
        })
    }

    async fn get_message_receipts(&self, _ctx: &RepoContext, message_id: Uuid) -> AppResult<Vec<ReadReceipt>> {
        let query = sqlx::query_as::<_, ReadReceipt>("SELECT * FROM read_receipts WHERE message_id = $1").bind(message_id);
        Ok(match &self.executor {
            Executor::Pool(pool) => query.fetch_all(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_all(&mut **guard).await?
            }
        })
    }

    async fn has_receipt(&self, _ctx: &RepoContext, message_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let query = sqlx::query_scalar::<_, bool>(
            "SELECT exists(SELECT 1 FROM read_receipts WHERE message_id = $1 AND user_id = $2)",
        )
        .bind(message_id)
        .bind(user_id);

        Ok(match &self.executor {
            Executor::Pool(pool) => query.fetch_one(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_one(&mut **guard).await?
            }
        })
    }

    async fn create_receipt(&self, _ctx: &RepoContext, message_id: Uuid, user_id: Uuid) -> AppResult<ReadReceipt> {
        let query = sqlx::query_as::<_, ReadReceipt>(
            r#"
            INSERT INTO read_receipts (id, message_id, user_id, read_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (message_id, user_id) DO UPDATE SET read_at = read_receipts.read_at
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(message_id)
        .bind(user_id);

        Ok(match &self.executor {
            Executor::Pool(pool) => query.fetch_one(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_one(&mut **guard).await?
            }
        })
    }

    async fn create_bulk_read_receipts(&self, ctx: &RepoContext, message_ids: &[Uuid], user_id: Uuid) -> AppResult<Vec<ReadReceipt>> {
        let mut created = Vec::with_capacity(message_ids.len());
        for message_id in message_ids {
            created.push(self.create_receipt(ctx, *message_id, user_id).await?);
        }
        Ok(created)
    }

    async fn unreceipted_messages(
        &self,
        _ctx: &RepoContext,
        channel_id: Uuid,
        user_id: Uuid,
        up_to: DateTime<Utc>,
    ) -> AppResult<Vec<Uuid>> {
        let query = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT m.id FROM messages m
            WHERE m.channel_id = $1 AND m.created_at <= $2 AND m.sender_id <> $3 AND m.deleted_at IS NULL
              AND NOT EXISTS (SELECT 1 FROM read_receipts r WHERE r.message_id = m.id AND r.user_id = $3)
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(channel_id)
        .bind(up_to)
        .bind(user_id);

        Ok(match &self.executor {
            Executor::Pool(pool) => query.fetch_all(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_all(&mut **guard).await?
            }
        })
    }
}
