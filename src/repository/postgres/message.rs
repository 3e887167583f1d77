use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Message, MessageSearchFilter};
use crate::repository::{MessageRepository, RepoContext};

use super::Executor;

pub(super) struct PgMessageRepository {
    executor: Executor,
}

impl PgMessageRepository {
    pub(super) fn new(executor: Executor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create_message(
        &self,
        _ctx: &RepoContext,
        channel_id: Uuid,
        sender_id: Uuid,
        content: &str,
        reply_to_id: Option<Uuid>,
        thread_id: Option<Uuid>,
    ) -> AppResult<Message> {
        let query = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (id, channel_id, sender_id, content, reply_to_id, thread_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, now(), now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(channel_id)
        .bind(sender_id)
        .bind(content)
        .bind(reply_to_id)
        .bind(thread_id);

        match &self.executor {
            Executor::Pool(pool) => Ok(query.fetch_one(pool).await?),
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                Ok(query.fetch_one(&mut **guard).await?)
            }
        }
    }

    async fn get_message(&self, _ctx: &RepoContext, id: Uuid) -> AppResult<Message> {
        let query = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id);

        let message = match &self.executor {
            Executor::Pool(pool) => query.fetch_optional(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_optional(&mut **guard).await?
            }
        };
        message.ok_or_else(|| AppError::NotFound(format!("message {id}")))
    }

    async fn update_message(&self, _ctx: &RepoContext, id: Uuid, content: &str) -> AppResult<Message> {
        let query = sqlx::query_as::<_, Message>(
            r#"
            UPDATE messages
            SET content = $2, edited = true, edited_at = now(), updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(content);

        let message = match &self.executor {
            Executor::Pool(pool) => query.fetch_optional(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_optional(&mut **guard).await?
            }
        };
        message.ok_or_else(|| AppError::NotFound(format!("message {id}")))
    }

    async fn soft_delete_message(
        &self,
        _ctx: &RepoContext,
        id: Uuid,
        requester_user_id: Uuid,
        moderator_override: bool,
    ) -> AppResult<()> {
        let existing = self.get_message(_ctx, id).await?;
        if existing.sender_id != requester_user_id && !moderator_override {
            return Err(AppError::Forbidden("only the sender or a moderator may delete this message".into()));
        }

        let query = sqlx::query("UPDATE messages SET deleted_at = now(), updated_at = now() WHERE id = $1")
            .bind(id);

        match &self.executor {
            Executor::Pool(pool) => query.execute(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.execute(&mut **guard).await?
            }
        };
        Ok(())
    }

    async fn get_channel_messages(
        &self,
        _ctx: &RepoContext,
        channel_id: Uuid,
        before_id: Option<Uuid>,
        limit: i64,
    ) -> AppResult<Vec<Message>> {
        let query = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE channel_id = $1 AND deleted_at IS NULL
              AND ($2::uuid IS NULL OR id <> $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(channel_id)
        .bind(before_id)
        .bind(limit);

        Ok(match &self.executor {
            Executor::Pool(pool) => query.fetch_all(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_all(&mut **guard).await?
            }
        })
    }

    async fn get_thread_messages(
        &self,
        _ctx: &RepoContext,
        thread_id: Uuid,
        before_id: Option<Uuid>,
        limit: i64,
    ) -> AppResult<Vec<Message>> {
        let query = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE thread_id = $1 AND deleted_at IS NULL
              AND ($2::uuid IS NULL OR id <> $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(thread_id)
        .bind(before_id)
        .bind(limit);

        Ok(match &self.executor {
            Executor::Pool(pool) => query.fetch_all(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_all(&mut **guard).await?
            }
        })
    }

    async fn search_messages(&self, _ctx: &RepoContext, filter: &MessageSearchFilter) -> AppResult<Vec<Message>> {
        let query = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE deleted_at IS NULL
              AND ($1::uuid IS NULL OR channel_id = $1)
              AND ($2::uuid IS NULL OR sender_id = $2)
              AND ($3::uuid IS NULL OR thread_id = $3)
              AND ($4::text IS NULL OR content ILIKE '%' || $4 || '%')
              AND ($5::timestamptz IS NULL OR created_at >= $5)
              AND ($6::timestamptz IS NULL OR created_at <= $6)
              AND ($7::bool IS NULL OR pinned = $7)
            ORDER BY created_at DESC
            LIMIT $8 OFFSET $9
            "#,
        )
        .bind(filter.channel_id)
        .bind(filter.user_id)
        .bind(filter.thread_id)
        .bind(&filter.query)
        .bind(filter.after)
        .bind(filter.before)
        .bind(filter.pinned)
        .bind(filter.limit)
        .bind(filter.offset);

        Ok(match &self.executor {
            Executor::Pool(pool) => query.fetch_all(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_all(&mut **guard).await?
            }
        })
    }

    async fn mark_as_read(&self, _ctx: &RepoContext, message_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let query = sqlx::query(
            r#"
            INSERT INTO read_receipts (id, message_id, user_id, read_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (message_id, user_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(message_id)
        .bind(user_id);

        let result = match &self.executor {
            Executor::Pool(pool) => query.execute(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.execute(&mut **guard).await?
            }
        };
        Ok(result.rows_affected() > 0)
    }

    async fn get_unread_count(&self, _ctx: &RepoContext, channel_id: Uuid, user_id: Uuid) -> AppResult<i64> {
        let query = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT count(*) FROM messages m
            WHERE m.channel_id = $1 AND m.deleted_at IS NULL AND m.sender_id <> $2
              AND NOT EXISTS (
                SELECT 1 FROM read_receipts r WHERE r.message_id = m.id AND r.user_id = $2
              )
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

    async fn last_message_at(
        &self,
        _ctx: &RepoContext,
        channel_id: Uuid,
        sender_id: Uuid,
    ) -> AppResult<Option<DateTime<Utc>>> {
        let query = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            r#"
            SELECT max(created_at) FROM messages
            WHERE channel_id = $1 AND sender_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(channel_id)
        .bind(sender_id);

        Ok(match &self.executor {
            Executor::Pool(pool) => query.fetch_one(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_one(&mut **guard).await?
            }
        })
    }

    async fn pin_message(&self, _ctx: &RepoContext, id: Uuid, pinned_by: Uuid) -> AppResult<Message> {
        let query = sqlx::query_as::<_, Message>(
            r#"
            UPDATE messages SET pinned = true, pinned_by = $2, pinned_at = now(), updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(pinned_by);

        let message = match &self.executor {
            Executor::Pool(pool) => query.fetch_optional(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_optional(&mut **guard).await?
            }
        };
        message.ok_or_else(|| AppError::NotFound(format!("message {id}")))
    }

    async fn unpin_message(&self, _ctx: &RepoContext, id: Uuid) -> AppResult<Message> {
        let query = sqlx::query_as::<_, Message>(
            r#"
            UPDATE messages SET pinned = false, pinned_by = NULL, pinned_at = NULL, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id);

        let message = match &self.executor {
            Executor::Pool(pool) => query.fetch_optional(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_optional(&mut **guard).await?
            }
        };
        message.ok_or_else(|| AppError::NotFound(format!("message {id}")))
    }

    async fn get_pinned_messages(&self, _ctx: &RepoContext, channel_id: Uuid) -> AppResult<Vec<Message>> {
        let query = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE channel_id = $1 AND pinned = true AND deleted_at IS NULL ORDER BY pinned_at DESC",
        )
        .bind(channel_id);

        Ok(match &self.executor {
            Executor::Pool(pool) => query.fetch_all(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_all(&mut **guard).await?
            }
        })
    }
}
