/// Authorization helpers for house-scoped resources
///
/// Every house-scoped request passes through one of these checks before
/// touching data:
///
/// 1. **Membership**: the caller belongs to the house
/// 2. **Role**: owners/admins for member management and invitations
/// 3. **Permission flag**: plain members need the matching flag to mutate
///    tasks, shopping items or devices
///
/// # Example
///
/// ```no_run
/// use hearth_shared::auth::authorization::{require_membership, require_permission};
/// use hearth_shared::models::membership::MemberPermission;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// async fn check(pool: &PgPool, house_id: Uuid, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
///     require_membership(pool, house_id, user_id).await?;
///     require_permission(pool, house_id, user_id, MemberPermission::ManageTasks).await?;
///     Ok(())
/// }
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use super::policy::DenyReason;
use crate::models::membership::{MemberPermission, MemberRole, Membership};

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Not a member of house {0}")]
    NotMember(Uuid),

    #[error("Only owners and admins may do this (you are {actual:?})")]
    NotManager { actual: MemberRole },

    #[error("Missing permission: {}", .0.as_str())]
    MissingPermission(MemberPermission),

    #[error("{0}")]
    Denied(#[from] DenyReason),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Checks that a user belongs to a house and returns the membership
pub async fn require_membership(
    pool: &PgPool,
    house_id: Uuid,
    user_id: Uuid,
) -> Result<Membership, AuthzError> {
    Membership::find(pool, house_id, user_id)
        .await?
        .ok_or(AuthzError::NotMember(house_id))
}

/// Checks that a user is an owner or admin of a house
pub async fn require_manager(
    pool: &PgPool,
    house_id: Uuid,
    user_id: Uuid,
) -> Result<Membership, AuthzError> {
    let membership = require_membership(pool, house_id, user_id).await?;
    ensure_manager(&membership)?;
    Ok(membership)
}

/// Checks that a user may perform actions guarded by `permission`
pub async fn require_permission(
    pool: &PgPool,
    house_id: Uuid,
    user_id: Uuid,
    permission: MemberPermission,
) -> Result<Membership, AuthzError> {
    let membership = require_membership(pool, house_id, user_id).await?;
    ensure_permission(&membership, permission)?;
    Ok(membership)
}

pub fn ensure_manager(membership: &Membership) -> Result<(), AuthzError> {
    if !membership.role.can_manage_members() {
        return Err(AuthzError::NotManager {
            actual: membership.role,
        });
    }
    Ok(())
}

pub fn ensure_permission(membership: &Membership, permission: MemberPermission) -> Result<(), AuthzError> {
    if !membership.allows(permission) {
        return Err(AuthzError::MissingPermission(permission));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn membership(role: MemberRole, permissions: &[MemberPermission]) -> Membership {
        Membership {
            house_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            role,
            permissions: permissions.iter().map(|p| p.as_str().to_string()).collect(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_ensure_manager() {
        assert!(ensure_manager(&membership(MemberRole::Owner, &[])).is_ok());
        assert!(ensure_manager(&membership(MemberRole::Admin, &[])).is_ok());
        assert!(matches!(
            ensure_manager(&membership(MemberRole::Member, &MemberPermission::ALL)),
            Err(AuthzError::NotManager { actual: MemberRole::Member })
        ));
    }

    #[test]
    fn test_ensure_permission_for_narrowed_member() {
        let m = membership(MemberRole::Member, &[MemberPermission::ManageShopping]);

        assert!(ensure_permission(&m, MemberPermission::ManageShopping).is_ok());
        assert!(matches!(
            ensure_permission(&m, MemberPermission::ManageTasks),
            Err(AuthzError::MissingPermission(MemberPermission::ManageTasks))
        ));
    }

    #[test]
    fn test_deny_reason_converts() {
        let err: AuthzError = DenyReason::OwnerOnAdmin.into();
        assert_eq!(err.to_string(), "owners cannot change or remove admins");
    }
}
