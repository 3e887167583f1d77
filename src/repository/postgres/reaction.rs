use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Reaction, ReactionCount};
use crate::repository::{ReactionRepository, RepoContext};

use super::Executor;

pub(super) struct PgReactionRepository {
    executor: Executor,
}

impl PgReactionRepository {
    pub(super) fn new(executor: Executor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ReactionRepository for PgReactionRepository {
    async fn add_reaction(&self, _ctx: &RepoContext, message_id: Uuid, user_id: Uuid, emoji: &str) -> AppResult<bool> {
        let query = sqlx::query(
            r#"
            INSERT INTO reactions (id, message_id, user_id, emoji, created_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (message_id, user_id, emoji) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(message_id)
        .bind(user_id)
        .bind(emoji);

        let result = match &self.executor {
            Executor::Pool(pool) => query.execute(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.execute(&mut **guard).await?
            }
        };
        Ok(result.rows_affected() > 0)
    }

    async fn remove_reaction(&self, _ctx: &RepoContext, message_id: Uuid, user_id: Uuid, emoji: &str) -> AppResult<()> {
        let query = sqlx::query("DELETE FROM reactions WHERE message_id = $1 AND user_id = $2 AND emoji = $3")
            .bind(message_id)
            .bind(user_id)
            .bind(emoji);

        let result = match &self.executor {
            Executor::Pool(pool) => query.execute(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.execute(&mut **guard).await?
            }
        };
        if result.rows_affected() == 0 {
            return Err(crate::error::AppError::NotFound(format!(
                "reaction {emoji} by {user_id} on message {message_id}"
            )));
        }
        Ok(())
    }

    async fn get_message_reactions(&self, _ctx: &RepoContext, message_id: Uuid, caller_id: Uuid) -> AppResult<Vec<ReactionCount>> {
        let query = sqlx::query_as::<_, ReactionCount>(
            r#"
            SELECT emoji, count(*) AS count, bool_or(user_id = $2) AS me
            FROM reactions
            WHERE message_id = $1
            GROUP BY emoji
            "#,
        )
        .bind(message_id)
        .bind(caller_id);

        Ok(match &self.executor {
            Executor::Pool(pool) => query.fetch_all(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_all(&mut **guard).await?
            }
        })
    }

    async fn get_user_reactions(&self, _ctx: &RepoContext, message_id: Uuid, user_id: Uuid) -> AppResult<Vec<Reaction>> {
        let query = sqlx::query_as::<_, Reaction>("SELECT * FROM reactions WHERE message_id = $1 AND user_id = $2")
            .bind(message_id)
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
