use serde::{Deserialize, Serialize};

use shopkeep_core::{Status, UserId};

use crate::Role;

/// A fully resolved principal for authorization decisions.
///
/// Construction is decoupled from storage and transport: the API layer loads
/// the user row behind a verified token and snapshots the three fields the
/// policy looks at. The snapshot is passed explicitly into every decision.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
    pub status: Status,
}

impl Principal {
    pub fn new(id: UserId, role: Role, status: Status) -> Self {
        Self { id, role, status }
    }

    /// An active principal with the given role.
    pub fn active(id: UserId, role: Role) -> Self {
        Self::new(id, role, Status::Active)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Whether this principal is the given user.
    pub fn is(&self, user_id: UserId) -> bool {
        self.id == user_id
    }
}
