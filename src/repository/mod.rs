pub mod context;
pub mod postgres;
pub mod retry;

pub use context::{CancelHandle, CancelSignal, RepoContext};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    Attachment, Channel, ChannelMember, Embed, Message, MessageSearchFilter, NewAttachment,
    NewEmbed, Reaction, ReactionCount, ReadReceipt, Role, User,
};

/// §4.1 Message repo.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create_message(
        &self,
        ctx: &RepoContext,
        channel_id: Uuid,
        sender_id: Uuid,
        content: &str,
        reply_to_id: Option<Uuid>,
        thread_id: Option<Uuid>,
    ) -> AppResult<Message>;

    async fn get_message(&self, ctx: &RepoContext, id: Uuid) -> AppResult<Message>;

    /// Only content, the edited flag, and edited-at may be changed (§4.1).
    async fn update_message(&self, ctx: &RepoContext, id: Uuid, content: &str) -> AppResult<Message>;

    /// `requester_user_id` must own the message unless `moderator_override`
    /// is set (§4.1).
    async fn soft_delete_message(
        &self,
        ctx: &RepoContext,
        id: Uuid,
        requester_user_id: Uuid,
        moderator_override: bool,
    ) -> AppResult<()>;

    async fn get_channel_messages(
        &self,
        ctx: &RepoContext,
        channel_id: Uuid,
        before_id: Option<Uuid>,
        limit: i64,
    ) -> AppResult<Vec<Message>>;

    async fn get_thread_messages(
        &self,
        ctx: &RepoContext,
        thread_id: Uuid,
        before_id: Option<Uuid>,
        limit: i64,
    ) -> AppResult<Vec<Message>>;

    async fn search_messages(
        &self,
        ctx: &RepoContext,
        filter: &MessageSearchFilter,
    ) -> AppResult<Vec<Message>>;

    /// Idempotent (§4.1, §8 property 4).
    async fn mark_as_read(&self, ctx: &RepoContext, message_id: Uuid, user_id: Uuid) -> AppResult<bool>;

    async fn get_unread_count(&self, ctx: &RepoContext, channel_id: Uuid, user_id: Uuid) -> AppResult<i64>;

    async fn last_message_at(&self, ctx: &RepoContext, channel_id: Uuid, sender_id: Uuid) -> AppResult<Option<chrono::DateTime<chrono::Utc>>>;

    async fn pin_message(&self, ctx: &RepoContext, id: Uuid, pinned_by: Uuid) -> AppResult<Message>;
    async fn unpin_message(&self, ctx: &RepoContext, id: Uuid) -> AppResult<Message>;
    async fn get_pinned_messages(&self, ctx: &RepoContext, channel_id: Uuid) -> AppResult<Vec<Message>>;
}

/// §4.1 Channel repo.
#[async_trait]
pub trait ChannelRepository: Send + Sync {
    async fn create_channel(
        &self,
        ctx: &RepoContext,
        input: &crate::models::CreateChannelInput,
    ) -> AppResult<Channel>;

    async fn get_channel(&self, ctx: &RepoContext, id: Uuid) -> AppResult<Channel>;

    async fn update_channel(
        &self,
        ctx: &RepoContext,
        id: Uuid,
        input: &crate::models::UpdateChannelInput,
    ) -> AppResult<Channel>;

    async fn delete_channel(&self, ctx: &RepoContext, id: Uuid) -> AppResult<()>;

    async fn add_member(&self, ctx: &RepoContext, channel_id: Uuid, user_id: Uuid, role: crate::models::ChannelRole) -> AppResult<ChannelMember>;
    async fn remove_member(&self, ctx: &RepoContext, channel_id: Uuid, user_id: Uuid) -> AppResult<()>;
    async fn get_members(&self, ctx: &RepoContext, channel_id: Uuid) -> AppResult<Vec<ChannelMember>>;
    async fn get_member(&self, ctx: &RepoContext, channel_id: Uuid, user_id: Uuid) -> AppResult<ChannelMember>;
    async fn get_user_channels(&self, ctx: &RepoContext, user_id: Uuid) -> AppResult<Vec<Channel>>;
}

/// §4.1 Reaction repo.
#[async_trait]
pub trait ReactionRepository: Send + Sync {
    /// Returns `true` if a new row was inserted, `false` if it already
    /// existed (idempotent add, §8 property 3).
    async fn add_reaction(&self, ctx: &RepoContext, message_id: Uuid, user_id: Uuid, emoji: &str) -> AppResult<bool>;
    async fn remove_reaction(&self, ctx: &RepoContext, message_id: Uuid, user_id: Uuid, emoji: &str) -> AppResult<()>;
    async fn get_message_reactions(&self, ctx: &RepoContext, message_id: Uuid, caller_id: Uuid) -> AppResult<Vec<ReactionCount>>;
    async fn get_user_reactions(&self, ctx: &RepoContext, message_id: Uuid, user_id: Uuid) -> AppResult<Vec<Reaction>>;
}

/// §4.1 ReadReceipt repo.
#[async_trait]
pub trait ReadReceiptRepository: Send + Sync {
    async fn get_unread_count(&self, ctx: &RepoContext, channel_id: Uuid, user_id: Uuid) -> AppResult<i64>;
    async fn get_message_receipts(&self, ctx: &RepoContext, message_id: Uuid) -> AppResult<Vec<ReadReceipt>>;
    async fn has_receipt(&self, ctx: &RepoContext, message_id: Uuid, user_id: Uuid) -> AppResult<bool>;
    async fn create_receipt(&self, ctx: &RepoContext, message_id: Uuid, user_id: Uuid) -> AppResult<ReadReceipt>;
    async fn create_bulk_read_receipts(
        &self,
        ctx: &RepoContext,
        message_ids: &[Uuid],
        user_id: Uuid,
    ) -> AppResult<Vec<ReadReceipt>>;
    /// Messages in `channel_id` created at or before `up_to`, excluding
    /// `user_id`'s own messages and ones already receipted (§4.7).
    async fn unreceipted_messages(
        &self,
        ctx: &RepoContext,
        channel_id: Uuid,
        user_id: Uuid,
        up_to: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<Vec<Uuid>>;
}

/// §4.1 Attachment repo.
#[async_trait]
pub trait AttachmentRepository: Send + Sync {
    async fn create_attachments(
        &self,
        ctx: &RepoContext,
        message_id: Uuid,
        attachments: &[NewAttachment],
    ) -> AppResult<Vec<Attachment>>;
    async fn get_message_attachments(&self, ctx: &RepoContext, message_id: Uuid) -> AppResult<Vec<Attachment>>;
}

/// §4.1 Embed repo.
#[async_trait]
pub trait EmbedRepository: Send + Sync {
    async fn create_embeds(&self, ctx: &RepoContext, message_id: Uuid, embeds: &[NewEmbed]) -> AppResult<Vec<Embed>>;
    async fn get_message_embeds(&self, ctx: &RepoContext, message_id: Uuid) -> AppResult<Vec<Embed>>;
}

/// §4.1 User repo.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, ctx: &RepoContext, id: Uuid) -> AppResult<User>;
    async fn find_by_username(&self, ctx: &RepoContext, username: &str) -> AppResult<Option<User>>;
    async fn find_by_email(&self, ctx: &RepoContext, email: &str) -> AppResult<Option<User>>;
    async fn set_status(&self, ctx: &RepoContext, user_id: Uuid, status: crate::models::PresenceStatus, status_message: Option<String>) -> AppResult<()>;
}

/// §4.1 Role repo.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn get_role(&self, ctx: &RepoContext, id: Uuid) -> AppResult<Role>;
    async fn get_user_roles(&self, ctx: &RepoContext, user_id: Uuid) -> AppResult<Vec<Role>>;
    async fn assign_role(&self, ctx: &RepoContext, role_id: Uuid, user_id: Uuid) -> AppResult<()>;
    async fn revoke_role(&self, ctx: &RepoContext, role_id: Uuid, user_id: Uuid) -> AppResult<()>;
}

/// Bundles every repository trait object so services depend on one handle
/// instead of eight constructor parameters. A `RepositorySet` is bound
/// either directly to a `PgPool` or to one `sqlx::Transaction` (via
/// `postgres::PgRepositoryFactory::begin`), giving the "repository family
/// exposes `WithTransaction(tx)`" contract in §4.1.
pub struct RepositorySet {
    pub messages: Box<dyn MessageRepository>,
    pub channels: Box<dyn ChannelRepository>,
    pub reactions: Box<dyn ReactionRepository>,
    pub receipts: Box<dyn ReadReceiptRepository>,
    pub attachments: Box<dyn AttachmentRepository>,
    pub embeds: Box<dyn EmbedRepository>,
    pub users: Box<dyn UserRepository>,
    pub roles: Box<dyn RoleRepository>,
}

/// An in-flight transaction bound to one `RepositorySet`. Services commit
/// after a successful write and publish the corresponding event only then
/// (§4.6 "events are published only after successful commit"); any error
/// before that point rolls the transaction back and returns without
/// touching the Hub.
#[async_trait]
pub trait RepositoryTransaction: Send + Sync {
    fn repos(&self) -> &RepositorySet;
    async fn commit(self: Box<Self>) -> AppResult<()>;
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Produces repository sets, either a shared pool-backed one for reads or a
/// freshly transaction-bound one for multi-entity writes (§4.1
/// `WithTransaction`).
#[async_trait]
pub trait RepositoryFactory: Send + Sync {
    fn repos(&self) -> &RepositorySet;
    async fn begin(&self) -> AppResult<Box<dyn RepositoryTransaction>>;
}
