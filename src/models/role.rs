use serde::{Deserialize, Serialize};
use uuid::Uuid;

bitflags::bitflags! {
    /// Effective-permission bitfield (§3, §6). Bit positions are part of the
    /// wire contract — never renumber an existing bit, only append.
    ///
    /// Modeled with `bitflags` (as in the `nisarsyed-openconv` pack example)
    /// rather than a hand-rolled `u64` with manual shifts, so call sites get
    /// `contains`/`union`/`Display` for free while the wire encoding stays a
    /// plain `u64`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Permission: u64 {
        const SEND                        = 1 << 0;
        const EDIT                        = 1 << 1;
        const DELETE                      = 1 << 2;
        const PIN                         = 1 << 3;
        const REACT                       = 1 << 4;
        const READ_HISTORY                = 1 << 5;
        const VIEW_CHANNEL                = 1 << 6;
        const MANAGE_CHANNEL              = 1 << 7;
        const MANAGE_CHANNEL_PERMISSIONS  = 1 << 8;
        const CREATE_CHANNEL              = 1 << 9;
        const DELETE_CHANNEL              = 1 << 10;
        const MANAGE_CATEGORIES           = 1 << 11;
        const MANAGE_USERS                = 1 << 12;
        const MANAGE_ROLES                = 1 << 13;
        const MANAGE_USER_PERMISSIONS     = 1 << 14;
        const BAN                         = 1 << 15;
        const KICK                        = 1 << 16;
        const MUTE                        = 1 << 17;
        const MANAGE_SERVER               = 1 << 18;
        const MANAGE_SETTINGS             = 1 << 19;
        const MANAGE_EMOJIS               = 1 << 20;
        const MANAGE_INTEGRATIONS         = 1 << 21;
        const MANAGE_WEBHOOKS             = 1 << 22;
        const MANAGE_INVITES              = 1 << 23;
        /// Not named as a distinct bit in spec.md's list but required by the
        /// §4.8 permission table ("Delete other's → manage-messages"); kept
        /// alongside the other management bits rather than overloading
        /// `DELETE` (which is the implicit-for-sender bit).
        const MANAGE_MESSAGES             = 1 << 24;
    }
}

impl Default for Permission {
    fn default() -> Self {
        Permission::empty()
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub permissions: i64,
}

impl Role {
    pub fn permission_bits(&self) -> Permission {
        Permission::from_bits_truncate(self.permissions as u64)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RoleAssignment {
    pub role_id: Uuid,
    pub user_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_are_stable_and_combine() {
        let p = Permission::SEND | Permission::REACT;
        assert!(p.contains(Permission::SEND));
        assert!(p.contains(Permission::REACT));
        assert!(!p.contains(Permission::BAN));
        assert_eq!(Permission::SEND.bits(), 1);
        assert_eq!(Permission::EDIT.bits(), 2);
        assert_eq!(Permission::MANAGE_MESSAGES.bits(), 1 << 24);
    }

    #[test]
    fn fits_in_f64_mantissa() {
        // §6: the bitfield must fit in a double-precision JSON number
        // (<= 2^53) unless transported as a decimal string.
        assert!(Permission::all().bits() < (1u64 << 53));
    }
}
