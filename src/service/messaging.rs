use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::events::{Event, EventKind, EventTarget};
use crate::models::{
    Channel, ChannelRole, CreateChannelInput, CreateMessageInput, HydratedMessage, Message,
    MessageSearchFilter, Permission, UpdateChannelInput,
};
use crate::repository::{RepoContext, RepositoryFactory};

use super::permissions::PermissionService;
use super::validation::{validate_attachment, validate_embed, validate_message_not_empty};

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Orchestrates persistence and event emission for messages, reactions, and
/// channels (§4.6). Every mutating method follows the same template:
/// validate, load, check permission, write inside a transaction, commit,
/// then publish — never the other way around.
pub struct MessagingService {
    factory: Arc<dyn RepositoryFactory>,
    hub: crate::hub::HubHandle,
    config: Arc<Config>,
}

impl MessagingService {
    pub fn new(factory: Arc<dyn RepositoryFactory>, hub: crate::hub::HubHandle, config: Arc<Config>) -> Self {
        Self { factory, hub, config }
    }

    pub async fn create_message(&self, ctx: &RepoContext, input: CreateMessageInput) -> AppResult<HydratedMessage> {
        validate_message_not_empty(&input.content, &input.attachments, &input.embeds)?;
        for attachment in &input.attachments {
            validate_attachment(&self.config, attachment)?;
        }
        for embed in &input.embeds {
            validate_embed(embed)?;
        }

        let repos = self.factory.repos();
        let channel = repos.channels.get_channel(ctx, input.channel_id).await?;
        let member = repos.channels.get_member(ctx, input.channel_id, input.sender_id).await?;
        if member.banned {
            return Err(AppError::Forbidden("sender is banned from this channel".into()));
        }

        let role = member.channel_role();
        let is_admin_or_owner = matches!(role, ChannelRole::Owner | ChannelRole::Admin);
        if channel.read_only && !is_admin_or_owner {
            return Err(AppError::Forbidden("channel is read-only".into()));
        }

        if let Some(slow_mode_seconds) = channel.slow_mode() {
            if !member.is_moderator_or_above() {
                if let Some(last_sent) = repos.messages.last_message_at(ctx, input.channel_id, input.sender_id).await? {
                    let elapsed = Utc::now().signed_duration_since(last_sent);
                    if elapsed < chrono::Duration::seconds(slow_mode_seconds) {
                        return Err(AppError::RateLimited(format!(
                            "slow mode active, {slow_mode_seconds}s between messages"
                        )));
                    }
                }
            }
        }

        let permissions = PermissionService::new(repos.roles.as_ref());
        if !permissions.has_permission(ctx, input.sender_id, input.channel_id, Permission::SEND).await? {
            return Err(AppError::Forbidden("missing send permission".into()));
        }

        let tx = self.factory.begin().await?;
        let write = async {
            let repos = tx.repos();
            let message = repos
                .messages
                .create_message(ctx, input.channel_id, input.sender_id, &input.content, input.reply_to_id, input.thread_id)
                .await?;
            let attachments = repos.attachments.create_attachments(ctx, message.id, &input.attachments).await?;
            let embeds = repos.embeds.create_embeds(ctx, message.id, &input.embeds).await?;
            Ok::<_, AppError>(HydratedMessage { message, attachments, embeds, reactions: Vec::new() })
        }
        .await;

        match write {
            Ok(hydrated) => {
                tx.commit().await?;
                self.hub
                    .broadcast(Event::new(
                        EventKind::MessageCreated,
                        EventTarget::Channel(input.channel_id),
                        serde_json::to_value(&hydrated).unwrap_or_default(),
                        now_ms(),
                    ))
                    .await;
                Ok(hydrated)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    pub async fn update_message(&self, ctx: &RepoContext, message_id: Uuid, requester_id: Uuid, content: String) -> AppResult<Message> {
        if content.trim().is_empty() {
            return Err(AppError::InvalidInput("content must not be empty".into()));
        }
        let existing = self.factory.repos().messages.get_message(ctx, message_id).await?;
        if existing.sender_id != requester_id {
            return Err(AppError::Forbidden("only the sender may edit this message".into()));
        }

        let tx = self.factory.begin().await?;
        match tx.repos().messages.update_message(ctx, message_id, &content).await {
            Ok(message) => {
                tx.commit().await?;
                self.hub
                    .broadcast(Event::new(
                        EventKind::MessageUpdated,
                        EventTarget::Channel(message.channel_id),
                        serde_json::to_value(&message).unwrap_or_default(),
                        now_ms(),
                    ))
                    .await;
                Ok(message)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    /// Sender may delete their own message; a requester with `manageMessages`
    /// may delete anyone's (§4.6, §4.8).
    pub async fn delete_message(&self, ctx: &RepoContext, message_id: Uuid, requester_id: Uuid) -> AppResult<()> {
        let repos = self.factory.repos();
        let message = repos.messages.get_message(ctx, message_id).await?;
        let moderator_override = if requester_id == message.sender_id {
            false
        } else {
            let permissions = PermissionService::new(repos.roles.as_ref());
            if !permissions.has_permission(ctx, requester_id, message.channel_id, Permission::MANAGE_MESSAGES).await? {
                return Err(AppError::Forbidden("cannot delete another user's message".into()));
            }
            true
        };

        let tx = self.factory.begin().await?;
        match tx.repos().messages.soft_delete_message(ctx, message_id, requester_id, moderator_override).await {
            Ok(()) => {
                tx.commit().await?;
                self.hub
                    .broadcast(Event::new(
                        EventKind::MessageDeleted,
                        EventTarget::Channel(message.channel_id),
                        json!({ "id": message_id, "channelId": message.channel_id }),
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

    pub async fn pin_message(&self, ctx: &RepoContext, message_id: Uuid, requester_id: Uuid) -> AppResult<Message> {
        let repos = self.factory.repos();
        let message = repos.messages.get_message(ctx, message_id).await?;
        let permissions = PermissionService::new(repos.roles.as_ref());
        if !permissions.has_permission(ctx, requester_id, message.channel_id, Permission::PIN).await? {
            return Err(AppError::Forbidden("missing pin permission".into()));
        }

        let tx = self.factory.begin().await?;
        match tx.repos().messages.pin_message(ctx, message_id, requester_id).await {
            Ok(message) => {
                tx.commit().await?;
                self.hub
                    .broadcast(Event::new(
                        EventKind::MessagePinned,
                        EventTarget::Channel(message.channel_id),
                        serde_json::to_value(&message).unwrap_or_default(),
                        now_ms(),
                    ))
                    .await;
                Ok(message)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    pub async fn unpin_message(&self, ctx: &RepoContext, message_id: Uuid, requester_id: Uuid) -> AppResult<Message> {
        let repos = self.factory.repos();
        let message = repos.messages.get_message(ctx, message_id).await?;
        let permissions = PermissionService::new(repos.roles.as_ref());
        if !permissions.has_permission(ctx, requester_id, message.channel_id, Permission::PIN).await? {
            return Err(AppError::Forbidden("missing pin permission".into()));
        }

        let tx = self.factory.begin().await?;
        match tx.repos().messages.unpin_message(ctx, message_id).await {
            Ok(message) => {
                tx.commit().await?;
                self.hub
                    .broadcast(Event::new(
                        EventKind::MessageUnpinned,
                        EventTarget::Channel(message.channel_id),
                        serde_json::to_value(&message).unwrap_or_default(),
                        now_ms(),
                    ))
                    .await;
                Ok(message)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    /// Idempotent: a replayed `(message, user, emoji)` triple inserts
    /// nothing and emits nothing (§8 property 3).
    pub async fn add_reaction(&self, ctx: &RepoContext, message_id: Uuid, user_id: Uuid, emoji: String) -> AppResult<()> {
        let repos = self.factory.repos();
        let message = repos.messages.get_message(ctx, message_id).await?;
        let permissions = PermissionService::new(repos.roles.as_ref());
        if !permissions.has_permission(ctx, user_id, message.channel_id, Permission::REACT).await? {
            return Err(AppError::Forbidden("missing react permission".into()));
        }

        let tx = self.factory.begin().await?;
        match tx.repos().reactions.add_reaction(ctx, message_id, user_id, &emoji).await {
            Ok(inserted) => {
                tx.commit().await?;
                if inserted {
                    self.hub
                        .broadcast(Event::new(
                            EventKind::ReactionAdded,
                            EventTarget::Channel(message.channel_id),
                            json!({ "messageId": message_id, "userId": user_id, "emoji": emoji }),
                            now_ms(),
                        ))
                        .await;
                }
                Ok(())
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    pub async fn remove_reaction(&self, ctx: &RepoContext, message_id: Uuid, user_id: Uuid, emoji: String) -> AppResult<()> {
        let message = self.factory.repos().messages.get_message(ctx, message_id).await?;

        let tx = self.factory.begin().await?;
        match tx.repos().reactions.remove_reaction(ctx, message_id, user_id, &emoji).await {
            Ok(()) => {
                tx.commit().await?;
                self.hub
                    .broadcast(Event::new(
                        EventKind::ReactionRemoved,
                        EventTarget::Channel(message.channel_id),
                        json!({ "messageId": message_id, "userId": user_id, "emoji": emoji }),
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

    pub async fn create_channel(&self, ctx: &RepoContext, input: CreateChannelInput) -> AppResult<Channel> {
        if input.name.trim().is_empty() {
            return Err(AppError::InvalidInput("channel name must not be empty".into()));
        }
        let repos = self.factory.repos();
        let permissions = PermissionService::new(repos.roles.as_ref());
        if !permissions.has_permission(ctx, input.owner_id, Uuid::nil(), Permission::CREATE_CHANNEL).await? {
            return Err(AppError::Forbidden("missing create-channel permission".into()));
        }

        let tx = self.factory.begin().await?;
        match tx.repos().channels.create_channel(ctx, &input).await {
            Ok(channel) => {
                tx.commit().await?;
                self.hub
                    .broadcast(Event::new(
                        EventKind::ChannelCreated,
                        EventTarget::Broadcast,
                        serde_json::to_value(&channel).unwrap_or_default(),
                        now_ms(),
                    ))
                    .await;
                Ok(channel)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    pub async fn update_channel(&self, ctx: &RepoContext, channel_id: Uuid, requester_id: Uuid, input: UpdateChannelInput) -> AppResult<Channel> {
        self.require_manage_channel(ctx, channel_id, requester_id).await?;

        let tx = self.factory.begin().await?;
        match tx.repos().channels.update_channel(ctx, channel_id, &input).await {
            Ok(channel) => {
                tx.commit().await?;
                self.hub
                    .broadcast(Event::new(
                        EventKind::ChannelUpdated,
                        EventTarget::Channel(channel_id),
                        serde_json::to_value(&channel).unwrap_or_default(),
                        now_ms(),
                    ))
                    .await;
                Ok(channel)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    pub async fn delete_channel(&self, ctx: &RepoContext, channel_id: Uuid, requester_id: Uuid) -> AppResult<()> {
        self.require_manage_channel(ctx, channel_id, requester_id).await?;

        let tx = self.factory.begin().await?;
        match tx.repos().channels.delete_channel(ctx, channel_id).await {
            Ok(()) => {
                tx.commit().await?;
                self.hub
                    .broadcast(Event::new(
                        EventKind::ChannelDeleted,
                        EventTarget::Channel(channel_id),
                        json!({ "id": channel_id }),
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

    pub async fn add_channel_member(&self, ctx: &RepoContext, channel_id: Uuid, requester_id: Uuid, user_id: Uuid, role: ChannelRole) -> AppResult<()> {
        self.require_manage_channel(ctx, channel_id, requester_id).await?;

        let tx = self.factory.begin().await?;
        match tx.repos().channels.add_member(ctx, channel_id, user_id, role).await {
            Ok(_member) => {
                tx.commit().await?;
                self.hub
                    .broadcast(Event::new(
                        EventKind::MemberAdded,
                        EventTarget::Channel(channel_id),
                        json!({ "channelId": channel_id, "userId": user_id }),
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

    pub async fn remove_channel_member(&self, ctx: &RepoContext, channel_id: Uuid, requester_id: Uuid, user_id: Uuid) -> AppResult<()> {
        self.require_manage_channel(ctx, channel_id, requester_id).await?;

        let tx = self.factory.begin().await?;
        match tx.repos().channels.remove_member(ctx, channel_id, user_id).await {
            Ok(()) => {
                tx.commit().await?;
                self.hub
                    .broadcast(Event::new(
                        EventKind::MemberRemoved,
                        EventTarget::Channel(channel_id),
                        json!({ "channelId": channel_id, "userId": user_id }),
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

    pub async fn set_channel_slow_mode(&self, ctx: &RepoContext, channel_id: Uuid, requester_id: Uuid, seconds: i32) -> AppResult<Channel> {
        if seconds < 0 || i64::from(seconds) > self.config.slow_mode_max_seconds {
            return Err(AppError::InvalidInput(format!(
                "slow mode must be between 0 and {}s",
                self.config.slow_mode_max_seconds
            )));
        }
        let input = UpdateChannelInput { slow_mode_seconds: Some(seconds), ..Default::default() };
        self.update_channel(ctx, channel_id, requester_id, input).await
    }

    pub async fn set_channel_nsfw(&self, ctx: &RepoContext, channel_id: Uuid, requester_id: Uuid, nsfw: bool) -> AppResult<Channel> {
        let input = UpdateChannelInput { nsfw: Some(nsfw), ..Default::default() };
        self.update_channel(ctx, channel_id, requester_id, input).await
    }

    /// Read-only pass-through to the repository; never touches the Hub (§4.6).
    pub async fn search_messages(&self, ctx: &RepoContext, filter: MessageSearchFilter) -> AppResult<Vec<Message>> {
        self.factory.repos().messages.search_messages(ctx, &filter).await
    }

    async fn require_manage_channel(&self, ctx: &RepoContext, channel_id: Uuid, requester_id: Uuid) -> AppResult<()> {
        let repos = self.factory.repos();
        repos.channels.get_channel(ctx, channel_id).await?;
        let permissions = PermissionService::new(repos.roles.as_ref());
        if !permissions.has_permission(ctx, requester_id, channel_id, Permission::MANAGE_CHANNEL).await? {
            return Err(AppError::Forbidden("missing manage-channel permission".into()));
        }
        Ok(())
    }
}
