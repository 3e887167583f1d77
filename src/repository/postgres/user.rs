use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{PresenceStatus, User};
use crate::repository::{RepoContext, UserRepository};

use super::Executor;

pub(super) struct PgUserRepository {
    executor: Executor,
}

impl PgUserRepository {
    pub(super) fn new(executor: Executor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get_user(&self, _ctx: &RepoContext, id: Uuid) -> AppResult<User> {
        let query = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1").bind(id);
        let user = match &self.executor {
            Executor::Pool(pool) => query.fetch_optional(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_optional(&mut **guard).await?
            }
        };
        user.ok_or_else(|| AppError::NotFound(format!("user {id}")))
    }

    async fn find_by_username(&self, _ctx: &RepoContext, username: &str) -> AppResult<Option<User>> {
        let query = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1").bind(username);
        Ok(match &self.executor {
            Executor::Pool(pool) => query.fetch_optional(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_optional(&mut **guard).await?
            }
        })
    }

    async fn find_by_email(&self, _ctx: &RepoContext, email: &str) -> AppResult<Option<User>> {
        let query = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1").bind(email);
        Ok(match &self.executor {
            Executor::Pool(pool) => query.fetch_optional(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_optional(&mut **guard).await?
            }
        })
    }

    async fn set_status(&self, _ctx: &RepoContext, user_id: Uuid, status: PresenceStatus, status_message: Option<String>) -> AppResult<()> {
        let query = sqlx::query(
            "UPDATE users SET status = $2, status_message = $3, last_seen_at = now(), updated_at = now() WHERE id = $1",
        )
        .bind(user_id)
        .bind(status.to_string())
        .bind(status_message);

        match &self.executor {
            Executor::Pool(pool) => query.execute(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.execute(&mut **guard).await?
            }
        };
        Ok(())
    }
}
