//! Access policy
//!
//! Two layers decide whether a request may mutate something:
//!
//! - role sets, applied per route group before a handler runs
//!   (see `api::middleware::require_roles`)
//! - `can_mutate`, applied by the services to a concrete resource owner

use crate::models::{User, UserRole};
use crate::services::error::{ServiceError, ServiceResult};

/// Routes limited to administrators
pub const ADMIN_ONLY: &[UserRole] = &[UserRole::Admin];

/// Routes open to anyone who may author content
pub const AUTHORS: &[UserRole] = &[UserRole::Creator, UserRole::Admin];

/// The acting user of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: i64,
    pub role: UserRole,
}

impl Principal {
    pub fn new(id: i64, role: UserRole) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn has_any_role(&self, roles: &[UserRole]) -> bool {
        roles.contains(&self.role)
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self::new(user.id, user.role)
    }
}

/// Admins may mutate anything; everyone else only what they own.
pub fn can_mutate(principal: &Principal, owner: Option<i64>) -> bool {
    principal.is_admin() || owner == Some(principal.id)
}

/// `can_mutate` as a service check; logs and returns `Forbidden` on denial
pub fn ensure_can_mutate(
    principal: &Principal,
    owner: Option<i64>,
    action: &str,
) -> ServiceResult<()> {
    if can_mutate(principal, owner) {
        return Ok(());
    }

    tracing::warn!(
        "{} denied: user {} ({}) does not own the resource (owner {:?})",
        action,
        principal.id,
        principal.role,
        owner
    );
    Err(ServiceError::Forbidden(format!("Cannot {}", action)))
}
