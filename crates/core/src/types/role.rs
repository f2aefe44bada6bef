//! User roles.
//!
//! Roles are stored as reference-data keys (the `roles` category). Keys are
//! resolved into this closed enum at the boundary; anything unknown is
//! rejected rather than carried around as a loose string.

use serde::{Deserialize, Serialize};

/// Error returned when a role key does not name a known role.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct RoleError(pub String);

/// Account role with different permission levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access, including account administration. At most one exists.
    SuperAdmin,
    /// Store and content management. At most two exist.
    Admin,
    /// Shopper; the only role allowed to own a cart.
    Customer,
    /// Plain registered account.
    User,
}

impl Role {
    /// Maximum number of accounts that may hold this role, if capped.
    #[must_use]
    pub const fn seat_limit(&self) -> Option<u64> {
        match self {
            Self::SuperAdmin => Some(1),
            Self::Admin => Some(2),
            Self::Customer | Self::User => None,
        }
    }

    /// Whether this role may act on other users' carts and orders.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin)
    }

    /// Canonical reference-data key.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Customer => "customer",
            Self::User => "user",
        }
    }

    /// All roles, most privileged first.
    pub const ALL: [Self; 4] = [Self::SuperAdmin, Self::Admin, Self::Customer, Self::User];
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "super_admin" | "superadmin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "customer" => Ok(Self::Customer),
            "user" => Ok(Self::User),
            other => Err(RoleError(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_super_admin_spellings_resolve() {
        assert_eq!("superadmin".parse::<Role>(), Ok(Role::SuperAdmin));
        assert_eq!("super_admin".parse::<Role>(), Ok(Role::SuperAdmin));
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert_eq!(
            "vendor".parse::<Role>(),
            Err(RoleError("vendor".to_owned()))
        );
    }

    #[test]
    fn keys_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.key().parse::<Role>(), Ok(role));
        }
    }

    #[test]
    fn seat_limits() {
        assert_eq!(Role::SuperAdmin.seat_limit(), Some(1));
        assert_eq!(Role::Admin.seat_limit(), Some(2));
        assert_eq!(Role::Customer.seat_limit(), None);
    }

    #[test]
    fn admin_capability() {
        assert!(Role::SuperAdmin.is_admin());
        assert!(Role::Admin.is_admin());
        assert!(!Role::Customer.is_admin());
        assert!(!Role::User.is_admin());
    }
}
