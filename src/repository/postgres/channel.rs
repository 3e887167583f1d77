use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Channel, ChannelMember, ChannelRole, CreateChannelInput, UpdateChannelInput};
use crate::repository::{ChannelRepository, RepoContext};

use super::Executor;

pub(super) struct PgChannelRepository {
    executor: Executor,
}

impl PgChannelRepository {
    pub(super) fn new(executor: Executor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ChannelRepository for PgChannelRepository {
    async fn create_channel(&self, ctx: &RepoContext, input: &CreateChannelInput) -> AppResult<Channel> {
        let query = sqlx::query_as::<_, Channel>(
            r#"
            INSERT INTO channels (id, name, description, channel_type, owner_id, category_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, now(), now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.channel_type.to_string())
        .bind(input.owner_id)
        .bind(input.category_id);

        let channel = match &self.executor {
            Executor::Pool(pool) => query.fetch_one(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_one(&mut **guard).await?
            }
        };

        // §4.6: "when a channel is created, the owner is automatically
        // added as a member with role=owner."
        self.add_member(ctx, channel.id, input.owner_id, ChannelRole::Owner).await?;
        Ok(channel)
    }

    async fn get_channel(&self, _ctx: &RepoContext, id: Uuid) -> AppResult<Channel> {
        let query = sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE id = $1").bind(id);
        let channel = match &self.executor {
            Executor::Pool(pool) => query.fetch_optional(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_optional(&mut **guard).await?
            }
        };
        channel.ok_or_else(|| AppError::NotFound(format!("channel {id}")))
    }

    async fn update_channel(&self, _ctx: &RepoContext, id: Uuid, input: &UpdateChannelInput) -> AppResult<Channel> {
        let query = sqlx::query_as::<_, Channel>(
            r#"
            UPDATE channels SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                archived = COALESCE($4, archived),
                nsfw = COALESCE($5, nsfw),
                read_only = COALESCE($6, read_only),
                slow_mode_seconds = COALESCE($7, slow_mode_seconds),
                category_id = COALESCE($8, category_id),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.archived)
        .bind(input.nsfw)
        .bind(input.read_only)
        .bind(input.slow_mode_seconds)
        .bind(input.category_id);

        let channel = match &self.executor {
            Executor::Pool(pool) => query.fetch_optional(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_optional(&mut **guard).await?
            }
        };
        channel.ok_or_else(|| AppError::NotFound(format!("channel {id}")))
    }

    async fn delete_channel(&self, _ctx: &RepoContext, id: Uuid) -> AppResult<()> {
        let query = sqlx::query("DELETE FROM channels WHERE id = $1").bind(id);
        match &self.executor {
            Executor::Pool(pool) => query.execute(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.execute(&mut **guard).await?
            }
        };
        Ok(())
    }

    async fn add_member(
        &self,
        _ctx: &RepoContext,
        channel_id: Uuid,
        user_id: Uuid,
        role: ChannelRole,
    ) -> AppResult<ChannelMember> {
        let query = sqlx::query_as::<_, ChannelMember>(
            r#"
            INSERT INTO channel_members (channel_id, user_id, role, joined_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (channel_id, user_id) DO UPDATE SET role = EXCLUDED.role
            RETURNING *
            "#,
        )
        .bind(channel_id)
        .bind(user_id)
        .bind(role.to_string());

        Ok(match &self.executor {
            Executor::Pool(pool) => query.fetch_one(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_one(&mut **guard).await?
            }
        })
    }

    async fn remove_member(&self, _ctx: &RepoContext, channel_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let channel = self.get_channel(_ctx, channel_id).await?;
        if channel.owner_id == user_id {
            return Err(AppError::Conflict("cannot remove the channel owner; transfer ownership first".into()));
        }

        let query = sqlx::query("DELETE FROM channel_members WHERE channel_id = $1 AND user_id = $2")
            .bind(channel_id)
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

    async fn get_members(&self, _ctx: &RepoContext, channel_id: Uuid) -> AppResult<Vec<ChannelMember>> {
        let query = sqlx::query_as::<_, ChannelMember>("SELECT * FROM channel_members WHERE channel_id = $1")
            .bind(channel_id);
        Ok(match &self.executor {
            Executor::Pool(pool) => query.fetch_all(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_all(&mut **guard).await?
            }
        })
    }

    async fn get_member(&self, _ctx: &RepoContext, channel_id: Uuid, user_id: Uuid) -> AppResult<ChannelMember> {
        let query = sqlx::query_as::<_, ChannelMember>(
            "SELECT * FROM channel_members WHERE channel_id = $1 AND user_id = $2",
        )
        .bind(channel_id)
        .bind(user_id);

        let member = match &self.executor {
            Executor::Pool(pool) => query.fetch_optional(pool).await?,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_optional(&mut **guard).await?
            }
        };
        member.ok_or_else(|| AppError::NotFound(format!("membership for user {user_id} in channel {channel_id}")))
    }

    async fn get_user_channels(&self, _ctx: &RepoContext, user_id: Uuid) -> AppResult<Vec<Channel>> {
        let query = sqlx::query_as::<_, Channel>(
            r#"
            SELECT c.* FROM channels c
            JOIN channel_members m ON m.channel_id = c.id
            WHERE m.user_id = $1
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
}
