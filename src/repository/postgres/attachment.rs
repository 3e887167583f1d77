use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Attachment, NewAttachment};
use crate::repository::{AttachmentRepository, RepoContext};

use super::Executor;

pub(super) struct PgAttachmentRepository {
    executor: Executor,
}

impl PgAttachmentRepository {
    pub(super) fn new(executor: Executor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl AttachmentRepository for PgAttachmentRepository {
    async fn create_attachments(&self, _ctx: &RepoContext, message_id: Uuid, attachments: &[NewAttachment]) -> AppResult<Vec<Attachment>> {
        let mut created = Vec::with_capacity(attachments.len());
        for input in attachments {
            let query = sqlx::query_as::<_, Attachment>(
                r#"
                INSERT INTO attachments
                    (id, message_id, filename, content_type, size_bytes, hash, width, height, duration_ms, nsfw, spoiler, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, now())
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(message_id)
            .bind(&input.filename)
            .bind(&input.content_type)
            .bind(input.size_bytes)
            .bind(&input.hash)
            .bind(input.width)
            .bind(input.height)
            .bind(input.duration_ms)
            .bind(input.nsfw)
            .bind(input.spoiler);

            let attachment = match &self.executor {
                Executor::Pool(pool) => query.fetch_one(pool).await?,
                Executor::Tx(tx) => {
                    let mut guard = tx.lock().await;
                    query.fetch_one(&mut **guard).await?
                }
            };
            created.push(attachment);
        }
        Ok(created)
    }

    async fn get_message_attachments(&self, _ctx: &RepoContext, message_id: Uuid) -> AppResult<Vec<Attachment>> {
        let query = sqlx::query_as::<_, Attachment>("SELECT * FROM attachments WHERE message_id = $1").bind(message_id);
        Ok(match &self.executor {
            Executor::Pool(pool) => query.fetch_all(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_all(&mut **guard).await?
            }
        })
    }
}
