/// Task model and database operations
///
/// Tasks are house chores shown on a Kanban board. Status and assignee are
/// the fields whose changes drive notifications and realtime broadcast.
///
/// # Status rules
///
/// ```text
/// created  <-> assigned      (assignee set / cleared)
/// assigned  -> in_progress   (explicit)
/// any       -> completed     (complete; records completer and time)
/// completed -> any           (reopen; clears completer and time)
/// ```
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('created', 'assigned', 'in_progress', 'completed');
/// CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     house_id UUID NOT NULL REFERENCES houses(id) ON DELETE CASCADE,
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     priority task_priority NOT NULL DEFAULT 'medium',
///     status task_status NOT NULL DEFAULT 'created',
///     assigned_to UUID REFERENCES users(id) ON DELETE SET NULL,
///     start_date TIMESTAMPTZ,
///     end_date TIMESTAMPTZ,
///     effort INTEGER,
///     position INTEGER NOT NULL DEFAULT 0,
///     created_by UUID NOT NULL REFERENCES users(id),
///     completed_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     completed_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use hearth_shared::models::task::{Task, CreateTask, TaskPriority, TaskStatus};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, house_id: Uuid, alice: Uuid, bob: Uuid) -> Result<(), sqlx::Error> {
/// let task = Task::create(&pool, CreateTask {
///     house_id,
///     title: "Fix sink".to_string(),
///     description: None,
///     priority: TaskPriority::High,
///     assigned_to: Some(bob),
///     start_date: None,
///     end_date: None,
///     effort: Some(3),
///     created_by: alice,
/// }).await?;
/// assert_eq!(task.status, TaskStatus::Assigned);
///
/// let done = Task::complete(&pool, house_id, task.id).await?;
/// assert_eq!(done.and_then(|t| t.completed_by), Some(bob));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnection;
use sqlx::PgPool;
use uuid::Uuid;

use super::double_option;

/// Board column of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Created,
    Assigned,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Created => "created",
            TaskStatus::Assigned => "assigned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    /// Status of a new task
    pub fn initial(assignee: Option<Uuid>) -> Self {
        if assignee.is_some() {
            TaskStatus::Assigned
        } else {
            TaskStatus::Created
        }
    }

    /// Status after the assignee changes
    ///
    /// Work in progress survives a hand-over but not an unassignment.
    /// Completed tasks stay completed.
    pub fn after_reassign(self, assignee: Option<Uuid>) -> Self {
        match self {
            TaskStatus::Created | TaskStatus::Assigned => TaskStatus::initial(assignee),
            TaskStatus::InProgress if assignee.is_some() => TaskStatus::InProgress,
            TaskStatus::InProgress => TaskStatus::Created,
            TaskStatus::Completed => TaskStatus::Completed,
        }
    }

    /// Statuses released back to `created` when the assignee leaves the house
    pub fn is_held(&self) -> bool {
        matches!(self, TaskStatus::Assigned | TaskStatus::InProgress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// Task row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub house_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub assigned_to: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,

    /// Effort estimate in points
    pub effort: Option<i32>,

    /// Ordering within the board column
    pub position: i32,

    pub created_by: Uuid,
    pub completed_by: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub house_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub assigned_to: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub effort: Option<i32>,
    pub created_by: Uuid,
}

/// Partial update
///
/// Nullable fields use `Option<Option<_>>`: absent leaves the value alone,
/// `null` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub start_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub effort: Option<Option<i32>>,
}

/// What a patch changed about the assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentChange {
    Unchanged,
    Assigned(Uuid),
    Unassigned,
}

/// A patch that would leave the task in an invalid state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct InvalidPatch {
    pub field: &'static str,
    pub message: String,
}

impl InvalidPatch {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Outcome of [`Task::update`]
#[derive(Debug, Clone)]
pub struct TaskUpdate {
    pub task: Task,
    pub change: AssignmentChange,
    pub previous_status: TaskStatus,
}

/// Error type for [`Task::update`]
#[derive(Debug, thiserror::Error)]
pub enum TaskUpdateError {
    #[error("Task {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Invalid(#[from] InvalidPatch),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl Task {
    /// Who gets credit for completion: the assignee, else the creator
    pub fn completer(&self) -> Uuid {
        self.assigned_to.unwrap_or(self.created_by)
    }

    /// Start date must not be after end date
    pub fn has_valid_window(&self) -> bool {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => start <= end,
            _ => true,
        }
    }

    /// Marks the task completed at `now`
    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Completed;
        self.completed_by = Some(self.completer());
        self.completed_at = Some(now);
    }

    /// Applies a patch in memory and reports the assignment change
    ///
    /// An explicit status wins over the status derived from reassignment,
    /// but must agree with the resulting assignee: `assigned` and
    /// `in_progress` need one, `created` needs none. Entering `completed`
    /// records the completer; leaving it clears them. On error the task may
    /// be partly patched and must be discarded.
    pub fn apply_patch(&mut self, patch: TaskPatch, now: DateTime<Utc>) -> Result<AssignmentChange, InvalidPatch> {
        let was_completed = self.status == TaskStatus::Completed;

        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(start_date) = patch.start_date {
            self.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            self.end_date = end_date;
        }
        if let Some(effort) = patch.effort {
            self.effort = effort;
        }

        let change = match patch.assigned_to {
            Some(assignee) if assignee != self.assigned_to => {
                self.assigned_to = assignee;
                self.status = self.status.after_reassign(assignee);
                match assignee {
                    Some(id) => AssignmentChange::Assigned(id),
                    None => AssignmentChange::Unassigned,
                }
            }
            _ => AssignmentChange::Unchanged,
        };

        if let Some(status) = patch.status {
            match (status, self.assigned_to) {
                (TaskStatus::Assigned | TaskStatus::InProgress, None) => {
                    return Err(InvalidPatch::new(
                        "status",
                        format!("A task must have an assignee to be {}", status.as_str()),
                    ));
                }
                (TaskStatus::Created, Some(_)) => {
                    return Err(InvalidPatch::new("status", "An assigned task cannot be created"));
                }
                _ => self.status = status,
            }
        }

        match (was_completed, self.status == TaskStatus::Completed) {
            (false, true) => self.mark_completed(now),
            (true, false) => {
                self.completed_by = None;
                self.completed_at = None;
            }
            _ => {}
        }

        Ok(change)
    }
}

const TASK_COLUMNS: &str = "id, house_id, title, description, priority, status, assigned_to, \
    start_date, end_date, effort, position, created_by, completed_by, completed_at, \
    created_at, updated_at";

impl Task {
    /// Creates a task at the end of the board
    ///
    /// Status is derived from the assignee.
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO tasks (house_id, title, description, priority, status, assigned_to,
                               start_date, end_date, effort, created_by, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    (SELECT COALESCE(MAX(position) + 1, 0) FROM tasks WHERE house_id = $1))
            RETURNING {TASK_COLUMNS}
            "#
        );

        let task = sqlx::query_as::<_, Task>(&query)
            .bind(data.house_id)
            .bind(data.title)
            .bind(data.description)
            .bind(data.priority)
            .bind(TaskStatus::initial(data.assigned_to))
            .bind(data.assigned_to)
            .bind(data.start_date)
            .bind(data.end_date)
            .bind(data.effort)
            .bind(data.created_by)
            .fetch_one(pool)
            .await?;

        Ok(task)
    }

    /// Finds a task inside a house
    pub async fn find_in_house(
        pool: &PgPool,
        house_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 AND house_id = $2");

        let task = sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .bind(house_id)
            .fetch_optional(pool)
            .await?;

        Ok(task)
    }

    /// Lists a house's tasks in board order
    ///
    /// Optional filters narrow by status and assignee.
    pub async fn list_by_house(
        pool: &PgPool,
        house_id: Uuid,
        status: Option<TaskStatus>,
        assigned_to: Option<Uuid>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM tasks
            WHERE house_id = $1
              AND ($2::task_status IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR assigned_to = $3)
            ORDER BY position ASC, created_at ASC
            "#
        );

        let tasks = sqlx::query_as::<_, Task>(&query)
            .bind(house_id)
            .bind(status)
            .bind(assigned_to)
            .fetch_all(pool)
            .await?;

        Ok(tasks)
    }

    /// Applies a patch to the current row under a row lock
    ///
    /// The task is re-read `FOR UPDATE`, patched, checked and written back in
    /// one transaction, so concurrent patches and member removal never see
    /// their changes overwritten by a stale copy. A new assignee must still
    /// be a member; their membership row is share-locked until commit.
    pub async fn update(
        pool: &PgPool,
        house_id: Uuid,
        id: Uuid,
        patch: TaskPatch,
        now: DateTime<Utc>,
    ) -> Result<TaskUpdate, TaskUpdateError> {
        let mut tx = pool.begin().await?;

        let query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 AND house_id = $2 FOR UPDATE");
        let mut task = sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .bind(house_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(TaskUpdateError::NotFound(id))?;

        let previous_status = task.status;
        let change = task.apply_patch(patch, now)?;

        if !task.has_valid_window() {
            return Err(InvalidPatch::new("end_date", "End date must not be before start date").into());
        }

        if let AssignmentChange::Assigned(assignee) = change {
            let member = sqlx::query_scalar::<_, i32>(
                "SELECT 1 FROM memberships WHERE house_id = $1 AND user_id = $2 FOR SHARE",
            )
            .bind(house_id)
            .bind(assignee)
            .fetch_optional(&mut *tx)
            .await?;

            if member.is_none() {
                return Err(InvalidPatch::new("assigned_to", "Assignee must be a member of this house").into());
            }
        }

        let query = format!(
            r#"
            UPDATE tasks
            SET title = $3, description = $4, priority = $5, status = $6, assigned_to = $7,
                start_date = $8, end_date = $9, effort = $10,
                completed_by = $11, completed_at = $12, updated_at = NOW()
            WHERE id = $1 AND house_id = $2
            RETURNING {TASK_COLUMNS}
            "#
        );

        let task = sqlx::query_as::<_, Task>(&query)
            .bind(task.id)
            .bind(task.house_id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.priority)
            .bind(task.status)
            .bind(task.assigned_to)
            .bind(task.start_date)
            .bind(task.end_date)
            .bind(task.effort)
            .bind(task.completed_by)
            .bind(task.completed_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(TaskUpdate {
            task,
            change,
            previous_status,
        })
    }

    /// Completes a task
    ///
    /// `completed_by` is the assignee when present, else the creator.
    pub async fn complete(pool: &PgPool, house_id: Uuid, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE tasks
            SET status = 'completed',
                completed_by = COALESCE(assigned_to, created_by),
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND house_id = $2
            RETURNING {TASK_COLUMNS}
            "#
        );

        let task = sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .bind(house_id)
            .fetch_optional(pool)
            .await?;

        Ok(task)
    }

    /// Rewrites board positions in one transaction
    ///
    /// Ids not belonging to the house are skipped. Returns the number of
    /// tasks moved.
    pub async fn reorder(
        pool: &PgPool,
        house_id: Uuid,
        positions: &[(Uuid, i32)],
    ) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut moved = 0;

        for (id, position) in positions {
            let result = sqlx::query(
                "UPDATE tasks SET position = $3, updated_at = NOW() WHERE id = $1 AND house_id = $2",
            )
            .bind(id)
            .bind(house_id)
            .bind(position)
            .execute(&mut *tx)
            .await?;

            moved += result.rows_affected();
        }

        tx.commit().await?;

        Ok(moved)
    }

    /// Releases every held task of a user back to `created`
    ///
    /// Runs on the caller's transaction so membership removal and release
    /// commit together. Returns the released task ids.
    pub async fn release_assignments_for(
        conn: &mut PgConnection,
        house_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE tasks
            SET status = 'created', assigned_to = NULL, updated_at = NOW()
            WHERE house_id = $1
              AND assigned_to = $2
              AND status IN ('assigned', 'in_progress')
            RETURNING id
            "#,
        )
        .bind(house_id)
        .bind(user_id)
        .fetch_all(conn)
        .await?;

        Ok(ids)
    }

    /// Deletes a task
    pub async fn delete(pool: &PgPool, house_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND house_id = $2")
            .bind(id)
            .bind(house_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
