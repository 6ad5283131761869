/// Membership directory
///
/// Resolves which users belong to a house. The change broadcaster uses it to
/// pick fan-out targets; member management uses it to remove members.
///
/// Removal is the only mutating operation. It deletes the membership and
/// releases the member's held tasks (`assigned`/`in_progress` back to
/// `created`, assignee cleared) in one transaction, so either both happen or
/// neither does.
///
/// # Example
///
/// ```no_run
/// use hearth_shared::directory::{MembershipDirectory, PgMembershipDirectory};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, house_id: Uuid, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let directory = PgMembershipDirectory::new(pool);
///
/// let removed = directory.remove_member(house_id, user_id).await?;
/// println!("released {} tasks", removed.released_tasks.len());
///
/// assert!(!directory.members_of(house_id).await?.contains(&user_id));
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::membership::{MemberRole, Membership};
use crate::models::task::Task;

/// Error type for directory operations
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("User {user_id} is not a member of house {house_id}")]
    NotFound { house_id: Uuid, user_id: Uuid },

    /// Removing would leave the house empty or without an owner
    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Result of removing a member
#[derive(Debug, Clone, Serialize)]
pub struct RemovedMember {
    pub house_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,

    /// Tasks whose assignment was released
    pub released_tasks: Vec<Uuid>,
}

/// Who belongs to which house
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    /// Member ids of a house; no side effects
    async fn members_of(&self, house_id: Uuid) -> Result<Vec<Uuid>, DirectoryError>;

    /// Removes a member and releases their held tasks atomically
    ///
    /// # Errors
    ///
    /// - [`DirectoryError::NotFound`] when the membership does not exist
    /// - [`DirectoryError::Conflict`] when the user is the last member or the
    ///   last owner
    async fn remove_member(&self, house_id: Uuid, user_id: Uuid) -> Result<RemovedMember, DirectoryError>;
}

/// Postgres-backed directory
#[derive(Clone)]
pub struct PgMembershipDirectory {
    pool: PgPool,
}

impl PgMembershipDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipDirectory for PgMembershipDirectory {
    async fn members_of(&self, house_id: Uuid) -> Result<Vec<Uuid>, DirectoryError> {
        Ok(Membership::member_ids(&self.pool, house_id).await?)
    }

    async fn remove_member(&self, house_id: Uuid, user_id: Uuid) -> Result<RemovedMember, DirectoryError> {
        let mut tx = self.pool.begin().await?;

        // Lock the house's membership rows so concurrent removals see a
        // consistent member count.
        let roles: Vec<(Uuid, MemberRole)> = sqlx::query_as(
            "SELECT user_id, role FROM memberships WHERE house_id = $1 FOR UPDATE",
        )
        .bind(house_id)
        .fetch_all(&mut *tx)
        .await?;

        let role = roles
            .iter()
            .find(|(id, _)| *id == user_id)
            .map(|(_, role)| *role)
            .ok_or(DirectoryError::NotFound { house_id, user_id })?;

        check_removal(&roles, role)?;

        sqlx::query("DELETE FROM memberships WHERE house_id = $1 AND user_id = $2")
            .bind(house_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let released_tasks = Task::release_assignments_for(&mut *tx, house_id, user_id).await?;

        tx.commit().await?;

        info!(
            house_id = %house_id,
            user_id = %user_id,
            released = released_tasks.len(),
            "Member removed"
        );

        Ok(RemovedMember {
            house_id,
            user_id,
            role,
            released_tasks,
        })
    }
}

/// Refuses removals that would empty the house or leave it ownerless
fn check_removal(members: &[(Uuid, MemberRole)], removed_role: MemberRole) -> Result<(), DirectoryError> {
    if members.len() <= 1 {
        debug!("Refusing to remove the last member");
        return Err(DirectoryError::Conflict(
            "Cannot remove the last member of a house".to_string(),
        ));
    }

    let owners = members.iter().filter(|(_, r)| *r == MemberRole::Owner).count();
    if removed_role == MemberRole::Owner && owners <= 1 {
        debug!("Refusing to remove the last owner");
        return Err(DirectoryError::Conflict(
            "Cannot remove the last owner of a house".to_string(),
        ));
    }

    Ok(())
}
