use uuid::Uuid;

use crate::error::AppResult;
use crate::models::Permission;
use crate::repository::{RepoContext, RoleRepository};

/// Resolves effective permissions and answers `HasPermission` checks.
///
/// Per the Open Question resolution in spec.md §9: the source defines two
/// different `HasPermission` predicates, one global and one that silently
/// ignores the channel parameter it's given. This implementation treats
/// roles as globally scoped — `channel_id` is threaded through every call
/// site so channel-scoped overrides can be introduced later without
/// changing signatures, but it is not consulted today.
pub struct PermissionService<'a> {
    roles: &'a (dyn RoleRepository + Send + Sync),
}

impl<'a> PermissionService<'a> {
    pub fn new(roles: &'a (dyn RoleRepository + Send + Sync)) -> Self {
        Self { roles }
    }

    /// §4.8: bitwise OR across every role a user holds globally.
    pub async fn effective_permissions(&self, ctx: &RepoContext, user_id: Uuid) -> AppResult<Permission> {
        let roles = self.roles.get_user_roles(ctx, user_id).await?;
        Ok(roles
            .iter()
            .fold(Permission::empty(), |acc, role| acc | role.permission_bits()))
    }

    /// `HasPermission(user, channel, bit)` — `channel_id` is accepted for
    /// forward compatibility but not consulted (§4.8, §9).
    pub async fn has_permission(
        &self,
        ctx: &RepoContext,
        user_id: Uuid,
        _channel_id: Uuid,
        bit: Permission,
    ) -> AppResult<bool> {
        let effective = self.effective_permissions(ctx, user_id).await?;
        Ok(effective.contains(bit))
    }
}
