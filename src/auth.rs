//! Explicit authorization inputs.
//!
//! The identity provider hands the surrounding application an authenticated
//! user id and role; the application passes them in as an [`Actor`]. Admin
//! operations take the actor as their first parameter and check it up front,
//! so the access requirement is visible in the signature rather than hidden
//! in a wrapper.

use crate::{entities::user, errors::ServiceError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use crate::entities::user::Role;

/// An authenticated caller, as reported by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn customer(user_id: Uuid) -> Self {
        Self::new(user_id, Role::Customer)
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self::new(user_id, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Fails with `Forbidden` unless the actor holds the admin role.
    pub fn ensure_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden("admin role required".to_string()))
        }
    }
}

impl From<&user::Model> for Actor {
    fn from(user: &user::Model) -> Self {
        Self::new(user.id, user.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn ensure_admin_gates_on_role() {
        let admin = Actor::admin(Uuid::new_v4());
        assert!(admin.ensure_admin().is_ok());

        let customer = Actor::customer(Uuid::new_v4());
        assert_matches!(
            customer.ensure_admin(),
            Err(ServiceError::Forbidden(_))
        );
    }
}
