//! Roles, per-operation requirements and the resolved caller identity

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Integer role tier. `0` is the most privileged tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub i32);

impl RoleId {
    pub const ADMIN: RoleId = RoleId(0);
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for RoleId {
    fn from(value: i32) -> Self {
        RoleId(value)
    }
}

/// Roles allowed to invoke an operation, declared when the operation is
/// registered. An empty set admits any authenticated caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationRequirement {
    allowed_roles: BTreeSet<RoleId>,
}

impl AuthorizationRequirement {
    /// Any verified caller passes
    pub fn authenticated() -> Self {
        Self::default()
    }

    /// Only callers holding one of `roles` pass
    pub fn roles<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RoleId>,
    {
        Self {
            allowed_roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn permits(&self, role: RoleId) -> bool {
        self.allowed_roles.is_empty() || self.allowed_roles.contains(&role)
    }

    pub fn allowed_roles(&self) -> impl Iterator<Item = RoleId> + '_ {
        self.allowed_roles.iter().copied()
    }

    pub fn is_open(&self) -> bool {
        self.allowed_roles.is_empty()
    }
}

/// Verified caller attached to the request after a successful check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: i64,
    pub role_id: RoleId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_requirement_admits_everyone() {
        let requirement = AuthorizationRequirement::authenticated();
        assert!(requirement.is_open());
        assert!(requirement.permits(RoleId(0)));
        assert!(requirement.permits(RoleId(42)));
    }

    #[test]
    fn test_role_membership() {
        let requirement = AuthorizationRequirement::roles([0, 2]);
        assert!(requirement.permits(RoleId::ADMIN));
        assert!(requirement.permits(RoleId(2)));
        assert!(!requirement.permits(RoleId(1)));
        assert_eq!(
            requirement.allowed_roles().collect::<Vec<_>>(),
            vec![RoleId(0), RoleId(2)]
        );
    }

    #[test]
    fn test_role_serializes_as_integer() {
        let identity = Identity {
            user_id: 7,
            role_id: RoleId(1),
        };
        let json = serde_json::to_value(identity).unwrap();
        assert_eq!(json, serde_json::json!({"userId": 7, "roleId": 1}));
    }
}
