//! Profile role record.

use serde::{Deserialize, Serialize};

/// Coarse role stored on a user's backend profile row.
///
/// The client resolves this once per session change to decide whether to
/// show admin UI. It is a hint, not a security boundary: the backend's
/// row-level policies make the authoritative call on every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May see the admin dashboard surfaces.
    Admin,
    /// Regular shopper.
    #[default]
    #[serde(other)]
    Customer,
}

impl Role {
    /// Whether this role unlocks admin UI.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// The wire representation used by the `profiles` collection.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Customer => "customer",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_only_admin_is_admin() {
        assert!(Role::Admin.is_admin());
        assert!(!Role::Customer.is_admin());
    }

    #[test]
    fn test_unknown_roles_deserialize_as_customer() {
        let role: Role = serde_json::from_str("\"moderator\"").unwrap();
        assert_eq!(role, Role::Customer);
    }

    #[test]
    fn test_wire_representation() {
        assert_eq!(
            serde_json::to_string(&Role::Admin).unwrap(),
            "\"admin\""
        );
        assert_eq!(Role::Customer.as_str(), "customer");
    }
}
