use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Role;
use crate::repository::{RepoContext, RoleRepository};

use super::Executor;

pub(super) struct PgRoleRepository {
    executor: Executor,
}

impl PgRoleRepository {
    pub(super) fn new(executor: Executor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl RoleRepository for PgRoleRepository {
    async fn get_role(&self, _ctx: &RepoContext, id: Uuid) -> AppResult<Role> {
        let query = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1").bind(id);
        let role = match &self.executor {
            Executor::Pool(pool) => query.fetch_optional(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_optional(&mut **guard).await?
            }
        };
        role.ok_or_else(|| AppError::NotFound(format!("role {id}")))
    }

    async fn get_user_roles(&self, _ctx: &RepoContext, user_id: Uuid) -> AppResult<Vec<Role>> {
        let query = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.* FROM roles r
            JOIN role_assignments a ON a.role_id = r.id
            WHERE a.user_id = $1
            "#,
        )
        .bind(user_id);

        Ok(match &self.executor {
            Executor::Pool(pool) => query.fetch_all(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_all(&mut **guard).await?
            }
        })
    }

    async fn assign_role(&self, _ctx: &RepoContext, role_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let query = sqlx::query(
            "INSERT INTO role_assignments (role_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(role_id)
        .bind(user_id);

        match &self.executor {
            Executor::Pool(pool) => query.execute(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.execute(&mut **guard).await?
            }
        };
        Ok(())
    }

    async fn revoke_role(&self, _ctx: &RepoContext, role_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let query = sqlx::query("DELETE FROM role_assignments WHERE role_id = $1 AND user_id = $2")
            .bind(role_id)
            .bind(user_id);

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
