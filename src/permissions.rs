//! Roles and the capabilities they grant.

use std::{fmt, ops::BitOr, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{error::{CoreError, CoreResult}, users::User};

/// A set of capabilities, one bit each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(u32);

impl Permissions {
    pub const FOLLOW: Self = Self(1);
    pub const COMMENT: Self = Self(1 << 1);
    pub const WRITE: Self = Self(1 << 2);
    pub const MODERATE: Self = Self(1 << 3);
    pub const ADMIN: Self = Self(1 << 4);

    const NAMES: [(Self, &'static str); 5] = [
        (Self::FOLLOW, "FOLLOW"),
        (Self::COMMENT, "COMMENT"),
        (Self::WRITE, "WRITE"),
        (Self::MODERATE, "MODERATE"),
        (Self::ADMIN, "ADMIN"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// True when every bit of `other` is present.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Signed in but read-only; set by an administrator.
    Suspended,
    #[default]
    User,
    Moderator,
    Administrator,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Suspended, Role::User, Role::Moderator, Role::Administrator];

    pub const fn permissions(self) -> Permissions {
        use Role::*;
        let user = Permissions::FOLLOW
            .union(Permissions::COMMENT)
            .union(Permissions::WRITE);
        match self {
            Suspended => Permissions::empty(),
            User => user,
            Moderator => user.union(Permissions::MODERATE),
            Administrator => user
                .union(Permissions::MODERATE)
                .union(Permissions::ADMIN),
        }
    }

    pub const fn as_str(self) -> &'static str {
        use Role::*;
        match self {
            Suspended => "suspended",
            User => "user",
            Moderator => "moderator",
            Administrator => "administrator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| CoreError::Corrupt(format!("unknown role `{s}`")))
    }
}

/// Passes when the actor's role grants `needed`, otherwise `Unauthorized`.
pub fn permission_required(actor: &User, needed: Permissions) -> CoreResult<()> {
    if actor.can(needed) {
        Ok(())
    } else {
        tracing::warn!(user = %actor.username, role = %actor.role, %needed, "capability check failed");
        Err(CoreError::Unauthorized { needed })
    }
}
