pub mod attachment;
pub mod channel;
pub mod embed;
pub mod message;
pub mod reaction;
pub mod receipt;
pub mod role;
pub mod user;

pub use attachment::{Attachment, NewAttachment};
pub use channel::{Channel, ChannelMember, ChannelRole, ChannelType, CreateChannelInput, UpdateChannelInput};
pub use embed::{Embed, EmbedType, NewEmbed};
pub use message::{
    CreateMessageInput, HydratedMessage, Message, MessageSearchFilter, UpdateMessageInput,
};
pub use reaction::{Reaction, ReactionCount};
pub use receipt::ReadReceipt;
pub use role::{Permission, Role, RoleAssignment};
pub use user::{CreateUserInput, PresenceStatus, User};

use uuid::Uuid;

/// The already-authenticated caller identity handed to this subsystem by
/// the (out-of-scope, per spec.md §1) HTTP/auth layer. Everything in this
/// crate that needs "who is asking" takes a `Principal`, never a raw
/// bearer token — token minting and validation are an external concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
}

impl Principal {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}
