use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Embed, NewEmbed};
use crate::repository::{EmbedRepository, RepoContext};

use super::Executor;

pub(super) struct PgEmbedRepository {
    executor: Executor,
}

impl PgEmbedRepository {
    pub(super) fn new(executor: Executor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl EmbedRepository for PgEmbedRepository {
    async fn create_embeds(&self, _ctx: &RepoContext, message_id: Uuid, embeds: &[NewEmbed]) -> AppResult<Vec<Embed>> {
        let mut created = Vec::with_capacity(embeds.len());
        for input in embeds {
            let query = sqlx::query_as::<_, Embed>(
                r#"
                INSERT INTO embeds
                    (id, message_id, url, embed_type, title, description, thumbnail_url, width, height, duration_ms, nsfw, spoiler, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, now())
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(message_id)
            .bind(&input.url)
            .bind(input.embed_type.to_string())
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.thumbnail_url)
            .bind(input.width)
            .bind(input.height)
            .bind(input.duration_ms)
            .bind(input.nsfw)
            .bind(input.spoiler);

            let embed = match &self.executor {
                Executor::Pool(pool) => query.fetch_one(pool).await?,
                Executor::Tx(tx) => {
                    let mut guard = tx.lock().await;
                    query.fetch_one(&mut **guard).await?
                }
            };
            created.push(embed);
        }
        Ok(created)
    }

    async fn get_message_embeds(&self, _ctx: &RepoContext, message_id: Uuid) -> AppResult<Vec<Embed>> {
        let query = sqlx::query_as::<_, Embed>("SELECT * FROM embeds WHERE message_id = $1").bind(message_id);
        Ok(match &self.executor {
            Executor::Pool(pool) => query.fetch_all(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_all(&mut **guard).await?
            }
        })
    }
}
