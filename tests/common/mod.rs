//! Shared integration-test harness: an in-memory repository set satisfying
//! every trait in `relaycore::repository` (§4.1), used to exercise the Hub
//! and the Messaging/Receipt services end to end without a database. The
//! Postgres implementation under `src/repository/postgres` satisfies the
//! exact same contracts for production use (SPEC_FULL.md §1.1).
//!
//! The fake has no real transaction isolation: every write method mutates
//! the shared store atomically at the point of the call (Rust's `&mut`
//! borrow through the mutex guard gives that for free), so `commit`/
//! `rollback` on the fake transaction are no-ops — by the time a service
//! would call `rollback`, the failing write already returned `Err` without
//! touching the store. Isolation across concurrent transactions is the
//! Postgres implementation's job, not this fake's.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use relaycore::error::{AppError, AppResult};
use relaycore::models::{
    Attachment, Channel, ChannelMember, ChannelRole, CreateChannelInput, Embed, Message,
    MessageSearchFilter, NewAttachment, NewEmbed, Reaction, ReactionCount, ReadReceipt, Role,
    UpdateChannelInput, User,
};
use relaycore::repository::{
    AttachmentRepository, ChannelRepository, EmbedRepository, MessageRepository, ReactionRepository,
    ReadReceiptRepository, RepoContext, RepositoryFactory, RepositorySet, RepositoryTransaction,
    RoleRepository, UserRepository,
};

#[derive(Default)]
pub struct Store {
    pub messages: HashMap<Uuid, Message>,
    pub channels: HashMap<Uuid, Channel>,
    pub members: HashMap<(Uuid, Uuid), ChannelMember>,
    pub reactions: HashMap<Uuid, Reaction>,
    pub receipts: HashMap<(Uuid, Uuid), ReadReceipt>,
    pub attachments: HashMap<Uuid, Vec<Attachment>>,
    pub embeds: HashMap<Uuid, Vec<Embed>>,
    pub users: HashMap<Uuid, User>,
    pub roles: HashMap<Uuid, Role>,
    pub user_roles: HashMap<Uuid, Vec<Uuid>>,
}

pub type SharedStore = Arc<Mutex<Store>>;

fn now() -> DateTime<Utc> {
    Utc::now()
}

struct FakeMessages(SharedStore);
struct FakeChannels(SharedStore);
struct FakeReactions(SharedStore);
struct FakeReceipts(SharedStore);
struct FakeAttachments(SharedStore);
struct FakeEmbeds(SharedStore);
struct FakeUsers(SharedStore);
struct FakeRoles(SharedStore);

#[async_trait]
impl MessageRepository for FakeMessages {
    async fn create_message(
        &self,
        _ctx: &RepoContext,
        channel_id: Uuid,
        sender_id: Uuid,
        content: &str,
        reply_to_id: Option<Uuid>,
        thread_id: Option<Uuid>,
    ) -> AppResult<Message> {
        let message = Message {
            id: Uuid::new_v4(),
            channel_id,
            sender_id,
            content: content.to_string(),
            reply_to_id,
            thread_id,
            pinned: false,
            pinned_by: None,
            pinned_at: None,
            edited: false,
            edited_at: None,
            deleted_at: None,
            created_at: now(),
            updated_at: now(),
        };
        self.0.lock().unwrap().messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn get_message(&self, _ctx: &RepoContext, id: Uuid) -> AppResult<Message> {
        self.0
            .lock()
            .unwrap()
            .messages
            .get(&id)
            .filter(|m| !m.is_deleted())
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("message {id}")))
    }

    async fn update_message(&self, _ctx: &RepoContext, id: Uuid, content: &str) -> AppResult<Message> {
        let mut store = self.0.lock().unwrap();
        let message = store
            .messages
            .get_mut(&id)
            .filter(|m| m.deleted_at.is_none())
            .ok_or_else(|| AppError::NotFound(format!("message {id}")))?;
        message.content = content.to_string();
        message.edited = true;
        message.edited_at = Some(now());
        message.updated_at = now();
        Ok(message.clone())
    }

    async fn soft_delete_message(
        &self,
        _ctx: &RepoContext,
        id: Uuid,
        requester_user_id: Uuid,
        moderator_override: bool,
    ) -> AppResult<()> {
        let mut store = self.0.lock().unwrap();
        let message = store
            .messages
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("message {id}")))?;
        if message.sender_id != requester_user_id && !moderator_override {
            return Err(AppError::Forbidden(
                "only the sender or a moderator may delete this message".into(),
            ));
        }
        message.deleted_at = Some(now());
        message.updated_at = now();
        Ok(())
    }

    async fn get_channel_messages(
        &self,
        _ctx: &RepoContext,
        channel_id: Uuid,
        before_id: Option<Uuid>,
        limit: i64,
    ) -> AppResult<Vec<Message>> {
        let store = self.0.lock().unwrap();
        let mut out: Vec<Message> = store
            .messages
            .values()
            .filter(|m| m.channel_id == channel_id && m.deleted_at.is_none() && Some(m.id) != before_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit.max(0) as usize);
        Ok(out)
    }

    async fn get_thread_messages(
        &self,
        _ctx: &RepoContext,
        thread_id: Uuid,
        before_id: Option<Uuid>,
        limit: i64,
    ) -> AppResult<Vec<Message>> {
        let store = self.0.lock().unwrap();
        let mut out: Vec<Message> = store
            .messages
            .values()
            .filter(|m| m.thread_id == Some(thread_id) && m.deleted_at.is_none() && Some(m.id) != before_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit.max(0) as usize);
        Ok(out)
    }

    async fn search_messages(&self, _ctx: &RepoContext, filter: &MessageSearchFilter) -> AppResult<Vec<Message>> {
        let store = self.0.lock().unwrap();
        let mut out: Vec<Message> = store
            .messages
            .values()
            .filter(|m| m.deleted_at.is_none())
            .filter(|m| filter.channel_id.map_or(true, |c| c == m.channel_id))
            .filter(|m| filter.user_id.map_or(true, |u| u == m.sender_id))
            .filter(|m| filter.thread_id.map_or(true, |t| Some(t) == m.thread_id))
            .filter(|m| filter.pinned.map_or(true, |p| p == m.pinned))
            .filter(|m| {
                filter
                    .query
                    .as_ref()
                    .map_or(true, |q| m.content.to_lowercase().contains(&q.to_lowercase()))
            })
            .filter(|m| filter.after.map_or(true, |a| m.created_at >= a))
            .filter(|m| filter.before.map_or(true, |b| m.created_at <= b))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let offset = filter.offset.max(0) as usize;
        let limit = filter.limit.max(0) as usize;
        Ok(out.into_iter().skip(offset).take(limit).collect())
    }

    async fn mark_as_read(&self, _ctx: &RepoContext, message_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let mut store = self.0.lock().unwrap();
        if store.receipts.contains_key(&(message_id, user_id)) {
            return Ok(false);
        }
        store.receipts.insert(
            (message_id, user_id),
            ReadReceipt { id: Uuid::new_v4(), message_id, user_id, read_at: now() },
        );
        Ok(true)
    }

    async fn get_unread_count(&self, _ctx: &RepoContext, channel_id: Uuid, user_id: Uuid) -> AppResult<i64> {
        let store = self.0.lock().unwrap();
        let count = store
            .messages
            .values()
            .filter(|m| m.channel_id == channel_id && m.deleted_at.is_none() && m.sender_id != user_id)
            .filter(|m| !store.receipts.contains_key(&(m.id, user_id)))
            .count();
        Ok(count as i64)
    }

    async fn last_message_at(&self, _ctx: &RepoContext, channel_id: Uuid, sender_id: Uuid) -> AppResult<Option<DateTime<Utc>>> {
        let store = self.0.lock().unwrap();
        Ok(store
            .messages
            .values()
            .filter(|m| m.channel_id == channel_id && m.sender_id == sender_id && m.deleted_at.is_none())
            .map(|m| m.created_at)
            .max())
    }

    async fn pin_message(&self, _ctx: &RepoContext, id: Uuid, pinned_by: Uuid) -> AppResult<Message> {
        let mut store = self.0.lock().unwrap();
        let message = store
            .messages
            .get_mut(&id)
            .filter(|m| m.deleted_at.is_none())
            .ok_or_else(|| AppError::NotFound(format!("message {id}")))?;
        message.pinned = true;
        message.pinned_by = Some(pinned_by);
        message.pinned_at = Some(now());
        message.updated_at = now();
        Ok(message.clone())
    }

    async fn unpin_message(&self, _ctx: &RepoContext, id: Uuid) -> AppResult<Message> {
        let mut store = self.0.lock().unwrap();
        let message = store
            .messages
            .get_mut(&id)
            .filter(|m| m.deleted_at.is_none())
            .ok_or_else(|| AppError::NotFound(format!("message {id}")))?;
        message.pinned = false;
        message.pinned_by = None;
        message.pinned_at = None;
        message.updated_at = now();
        Ok(message.clone())
    }

    async fn get_pinned_messages(&self, _ctx: &RepoContext, channel_id: Uuid) -> AppResult<Vec<Message>> {
        let store = self.0.lock().unwrap();
        let mut out: Vec<Message> = store
            .messages
            .values()
            .filter(|m| m.channel_id == channel_id && m.pinned && m.deleted_at.is_none())
            .cloned()
            .collect();
        out.sort_by(|a, b| b.pinned_at.cmp(&a.pinned_at));
        Ok(out)
    }
}

#[async_trait]
impl ChannelRepository for FakeChannels {
    async fn create_channel(&self, _ctx: &RepoContext, input: &CreateChannelInput) -> AppResult<Channel> {
        let channel = Channel {
            id: Uuid::new_v4(),
            name: input.name.clone(),
            description: input.description.clone(),
            channel_type: input.channel_type.to_string(),
            owner_id: input.owner_id,
            archived: false,
            nsfw: false,
            private: matches!(input.channel_type, relaycore::models::ChannelType::Private | relaycore::models::ChannelType::Direct),
            read_only: false,
            slow_mode_seconds: None,
            category_id: input.category_id,
            created_at: now(),
            updated_at: now(),
        };
        let mut store = self.0.lock().unwrap();
        store.channels.insert(channel.id, channel.clone());
        store.members.insert(
            (channel.id, input.owner_id),
            ChannelMember {
                channel_id: channel.id,
                user_id: input.owner_id,
                role: ChannelRole::Owner.to_string(),
                muted: false,
                banned: false,
                joined_at: now(),
            },
        );
        Ok(channel)
    }

    async fn get_channel(&self, _ctx: &RepoContext, id: Uuid) -> AppResult<Channel> {
        self.0
            .lock()
            .unwrap()
            .channels
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("channel {id}")))
    }

    async fn update_channel(&self, _ctx: &RepoContext, id: Uuid, input: &UpdateChannelInput) -> AppResult<Channel> {
        let mut store = self.0.lock().unwrap();
        let channel = store
            .channels
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("channel {id}")))?;
        if let Some(name) = &input.name {
            channel.name = name.clone();
        }
        if input.description.is_some() {
            channel.description = input.description.clone();
        }
        if let Some(archived) = input.archived {
            channel.archived = archived;
        }
        if let Some(nsfw) = input.nsfw {
            channel.nsfw = nsfw;
        }
        if let Some(read_only) = input.read_only {
            channel.read_only = read_only;
        }
        if let Some(slow_mode) = input.slow_mode_seconds {
            channel.slow_mode_seconds = Some(slow_mode);
        }
        if input.category_id.is_some() {
            channel.category_id = input.category_id;
        }
        channel.updated_at = now();
        Ok(channel.clone())
    }

    async fn delete_channel(&self, _ctx: &RepoContext, id: Uuid) -> AppResult<()> {
        let mut store = self.0.lock().unwrap();
        store.channels.remove(&id).ok_or_else(|| AppError::NotFound(format!("channel {id}")))?;
        store.members.retain(|(c, _), _| *c != id);
        Ok(())
    }

    async fn add_member(&self, _ctx: &RepoContext, channel_id: Uuid, user_id: Uuid, role: ChannelRole) -> AppResult<ChannelMember> {
        let mut store = self.0.lock().unwrap();
        let member = ChannelMember {
            channel_id,
            user_id,
            role: role.to_string(),
            muted: false,
            banned: false,
            joined_at: now(),
        };
        store.members.insert((channel_id, user_id), member.clone());
        Ok(member)
    }

    async fn remove_member(&self, _ctx: &RepoContext, channel_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let mut store = self.0.lock().unwrap();
        let channel = store
            .channels
            .get(&channel_id)
            .ok_or_else(|| AppError::NotFound(format!("channel {channel_id}")))?;
        if channel.owner_id == user_id {
            return Err(AppError::Conflict(
                "cannot remove the channel owner; transfer ownership first".into(),
            ));
        }
        store.members.remove(&(channel_id, user_id));
        Ok(())
    }

    async fn get_members(&self, _ctx: &RepoContext, channel_id: Uuid) -> AppResult<Vec<ChannelMember>> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .members
            .values()
            .filter(|m| m.channel_id == channel_id)
            .cloned()
            .collect())
    }

    async fn get_member(&self, _ctx: &RepoContext, channel_id: Uuid, user_id: Uuid) -> AppResult<ChannelMember> {
        self.0
            .lock()
            .unwrap()
            .members
            .get(&(channel_id, user_id))
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("membership for user {user_id} in channel {channel_id}")))
    }

    async fn get_user_channels(&self, _ctx: &RepoContext, user_id: Uuid) -> AppResult<Vec<Channel>> {
        let store = self.0.lock().unwrap();
        Ok(store
            .members
            .values()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| store.channels.get(&m.channel_id).cloned())
            .collect())
    }
}

#[async_trait]
impl ReactionRepository for FakeReactions {
    async fn add_reaction(&self, _ctx: &RepoContext, message_id: Uuid, user_id: Uuid, emoji: &str) -> AppResult<bool> {
        let mut store = self.0.lock().unwrap();
        let exists = store
            .reactions
            .values()
            .any(|r| r.message_id == message_id && r.user_id == user_id && r.emoji == emoji);
        if exists {
            return Ok(false);
        }
        let reaction = Reaction {
            id: Uuid::new_v4(),
            message_id,
            user_id,
            emoji: emoji.to_string(),
            created_at: now(),
        };
        store.reactions.insert(reaction.id, reaction);
        Ok(true)
    }

    async fn remove_reaction(&self, _ctx: &RepoContext, message_id: Uuid, user_id: Uuid, emoji: &str) -> AppResult<()> {
        let mut store = self.0.lock().unwrap();
        let key = store
            .reactions
            .iter()
            .find(|(_, r)| r.message_id == message_id && r.user_id == user_id && r.emoji == emoji)
            .map(|(id, _)| *id)
            .ok_or_else(|| AppError::NotFound("reaction not found".into()))?;
        store.reactions.remove(&key);
        Ok(())
    }

    async fn get_message_reactions(&self, _ctx: &RepoContext, message_id: Uuid, caller_id: Uuid) -> AppResult<Vec<ReactionCount>> {
        let store = self.0.lock().unwrap();
        let mut counts: HashMap<String, (i64, bool)> = HashMap::new();
        for r in store.reactions.values().filter(|r| r.message_id == message_id) {
            let entry = counts.entry(r.emoji.clone()).or_insert((0, false));
            entry.0 += 1;
            if r.user_id == caller_id {
                entry.1 = true;
            }
        }
        Ok(counts
            .into_iter()
            .map(|(emoji, (count, me))| ReactionCount { emoji, count, me })
            .collect())
    }

    async fn get_user_reactions(&self, _ctx: &RepoContext, message_id: Uuid, user_id: Uuid) -> AppResult<Vec<Reaction>> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .reactions
            .values()
            .filter(|r| r.message_id == message_id && r.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReadReceiptRepository for FakeReceipts {
    async fn get_unread_count(&self, ctx: &RepoContext, channel_id: Uuid, user_id: Uuid) -> AppResult<i64> {
        FakeMessages(Arc::clone(&self.0)).get_unread_count(ctx, channel_id, user_id).await
    }

    async fn get_message_receipts(&self, _ctx: &RepoContext, message_id: Uuid) -> AppResult<Vec<ReadReceipt>> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .receipts
            .values()
            .filter(|r| r.message_id == message_id)
            .cloned()
            .collect())
    }

    async fn has_receipt(&self, _ctx: &RepoContext, message_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        Ok(self.0.lock().unwrap().receipts.contains_key(&(message_id, user_id)))
    }

    async fn create_receipt(&self, _ctx: &RepoContext, message_id: Uuid, user_id: Uuid) -> AppResult<ReadReceipt> {
        let receipt = ReadReceipt { id: Uuid::new_v4(), message_id, user_id, read_at: now() };
        self.0.lock().unwrap().receipts.insert((message_id, user_id), receipt.clone());
        Ok(receipt)
    }

    async fn create_bulk_read_receipts(&self, _ctx: &RepoContext, message_ids: &[Uuid], user_id: Uuid) -> AppResult<Vec<ReadReceipt>> {
        let mut store = self.0.lock().unwrap();
        let mut out = Vec::with_capacity(message_ids.len());
        for &message_id in message_ids {
            let receipt = ReadReceipt { id: Uuid::new_v4(), message_id, user_id, read_at: now() };
            store.receipts.insert((message_id, user_id), receipt.clone());
            out.push(receipt);
        }
        Ok(out)
    }

    async fn unreceipted_messages(&self, _ctx: &RepoContext, channel_id: Uuid, user_id: Uuid, up_to: DateTime<Utc>) -> AppResult<Vec<Uuid>> {
        let store = self.0.lock().unwrap();
        let mut out: Vec<(DateTime<Utc>, Uuid)> = store
            .messages
            .values()
            .filter(|m| {
                m.channel_id == channel_id
                    && m.deleted_at.is_none()
                    && m.sender_id != user_id
                    && m.created_at <= up_to
                    && !store.receipts.contains_key(&(m.id, user_id))
            })
            .map(|m| (m.created_at, m.id))
            .collect();
        out.sort_by_key(|(created_at, _)| *created_at);
        Ok(out.into_iter().map(|(_, id)| id).collect())
    }
}

#[async_trait]
impl AttachmentRepository for FakeAttachments {
    async fn create_attachments(&self, _ctx: &RepoContext, message_id: Uuid, attachments: &[NewAttachment]) -> AppResult<Vec<Attachment>> {
        let created: Vec<Attachment> = attachments
            .iter()
            .map(|a| Attachment {
                id: Uuid::new_v4(),
                message_id,
                filename: a.filename.clone(),
                content_type: a.content_type.clone(),
                size_bytes: a.size_bytes,
                hash: a.hash.clone(),
                width: a.width,
                height: a.height,
                duration_ms: a.duration_ms,
                nsfw: a.nsfw,
                spoiler: a.spoiler,
                created_at: now(),
            })
            .collect();
        self.0.lock().unwrap().attachments.entry(message_id).or_default().extend(created.clone());
        Ok(created)
    }

    async fn get_message_attachments(&self, _ctx: &RepoContext, message_id: Uuid) -> AppResult<Vec<Attachment>> {
        Ok(self.0.lock().unwrap().attachments.get(&message_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl EmbedRepository for FakeEmbeds {
    async fn create_embeds(&self, _ctx: &RepoContext, message_id: Uuid, embeds: &[NewEmbed]) -> AppResult<Vec<Embed>> {
        let created: Vec<Embed> = embeds
            .iter()
            .map(|e| Embed {
                id: Uuid::new_v4(),
                message_id,
                url: e.url.clone(),
                embed_type: e.embed_type.to_string(),
                title: e.title.clone(),
                description: e.description.clone(),
                thumbnail_url: e.thumbnail_url.clone(),
                width: e.width,
                height: e.height,
                duration_ms: e.duration_ms,
                nsfw: e.nsfw,
                spoiler: e.spoiler,
                created_at: now(),
            })
            .collect();
        self.0.lock().unwrap().embeds.entry(message_id).or_default().extend(created.clone());
        Ok(created)
    }

    async fn get_message_embeds(&self, _ctx: &RepoContext, message_id: Uuid) -> AppResult<Vec<Embed>> {
        Ok(self.0.lock().unwrap().embeds.get(&message_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl UserRepository for FakeUsers {
    async fn get_user(&self, _ctx: &RepoContext, id: Uuid) -> AppResult<User> {
        self.0.lock().unwrap().users.get(&id).cloned().ok_or_else(|| AppError::NotFound(format!("user {id}")))
    }

    async fn find_by_username(&self, _ctx: &RepoContext, username: &str) -> AppResult<Option<User>> {
        Ok(self.0.lock().unwrap().users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, _ctx: &RepoContext, email: &str) -> AppResult<Option<User>> {
        Ok(self.0.lock().unwrap().users.values().find(|u| u.email == email).cloned())
    }

    async fn set_status(&self, _ctx: &RepoContext, user_id: Uuid, status: relaycore::models::PresenceStatus, status_message: Option<String>) -> AppResult<()> {
        let mut store = self.0.lock().unwrap();
        let user = store.users.get_mut(&user_id).ok_or_else(|| AppError::NotFound(format!("user {user_id}")))?;
        user.status = status.to_string();
        user.status_message = status_message;
        user.updated_at = now();
        Ok(())
    }
}

#[async_trait]
impl RoleRepository for FakeRoles {
    async fn get_role(&self, _ctx: &RepoContext, id: Uuid) -> AppResult<Role> {
        self.0.lock().unwrap().roles.get(&id).cloned().ok_or_else(|| AppError::NotFound(format!("role {id}")))
    }

    async fn get_user_roles(&self, _ctx: &RepoContext, user_id: Uuid) -> AppResult<Vec<Role>> {
        let store = self.0.lock().unwrap();
        Ok(store
            .user_roles
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| store.roles.get(id).cloned())
            .collect())
    }

    async fn assign_role(&self, _ctx: &RepoContext, role_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let mut store = self.0.lock().unwrap();
        let assigned = store.user_roles.entry(user_id).or_default();
        if !assigned.contains(&role_id) {
            assigned.push(role_id);
        }
        Ok(())
    }

    async fn revoke_role(&self, _ctx: &RepoContext, role_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let mut store = self.0.lock().unwrap();
        if let Some(assigned) = store.user_roles.get_mut(&user_id) {
            assigned.retain(|id| *id != role_id);
        }
        Ok(())
    }
}

fn build_set(store: SharedStore) -> RepositorySet {
    RepositorySet {
        messages: Box::new(FakeMessages(Arc::clone(&store))),
        channels: Box::new(FakeChannels(Arc::clone(&store))),
        reactions: Box::new(FakeReactions(Arc::clone(&store))),
        receipts: Box::new(FakeReceipts(Arc::clone(&store))),
        attachments: Box::new(FakeAttachments(Arc::clone(&store))),
        embeds: Box::new(FakeEmbeds(Arc::clone(&store))),
        users: Box::new(FakeUsers(Arc::clone(&store))),
        roles: Box::new(FakeRoles(store)),
    }
}

pub struct FakeRepositoryFactory {
    store: SharedStore,
    repos: RepositorySet,
}

impl FakeRepositoryFactory {
    pub fn new() -> Self {
        let store = Arc::new(Mutex::new(Store::default()));
        Self { repos: build_set(Arc::clone(&store)), store }
    }

    /// Registers a user with the given global roles, so permission checks
    /// in the Messaging/Receipt services have something to resolve.
    pub fn seed_user_with_roles(&self, user_id: Uuid, permissions: relaycore::models::Permission) {
        let mut store = self.store.lock().unwrap();
        let role = Role { id: Uuid::new_v4(), name: "seeded".into(), permissions: permissions.bits() as i64 };
        store.user_roles.entry(user_id).or_default().push(role.id);
        store.roles.insert(role.id, role);
    }
}

impl Default for FakeRepositoryFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RepositoryFactory for FakeRepositoryFactory {
    fn repos(&self) -> &RepositorySet {
        &self.repos
    }

    async fn begin(&self) -> AppResult<Box<dyn RepositoryTransaction>> {
        Ok(Box::new(FakeTransaction { repos: build_set(Arc::clone(&self.store)) }))
    }
}

struct FakeTransaction {
    repos: RepositorySet,
}

#[async_trait]
impl RepositoryTransaction for FakeTransaction {
    fn repos(&self) -> &RepositorySet {
        &self.repos
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}
