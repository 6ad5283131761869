//! Task lifecycle and assignment notifications against PostgreSQL
//!
//! Run with: cargo test --test task_tests -- --ignored

mod common;

use chrono::Utc;
use common::{create_house, create_user, services, test_pool};
use hearth_shared::directory::{MembershipDirectory, PgMembershipDirectory};
use hearth_shared::models::membership::{CreateMembership, MemberRole, Membership};
use hearth_shared::models::notification::{Notification, NotificationKind};
use hearth_shared::models::task::{
    AssignmentChange, CreateTask, Task, TaskPatch, TaskPriority, TaskStatus, TaskUpdateError,
};
use hearth_shared::realtime::{EventAction, RealtimeEvent};

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_fix_sink_assignment_notifies_bob() {
    let pool = test_pool().await;
    let svc = services(&pool);

    let alice = create_user(&pool, "Alice").await;
    let bob = create_user(&pool, "Bob").await;
    let house = create_house(&pool, &alice, "Sink").await;
    Membership::create(
        &pool,
        CreateMembership {
            house_id: house.id,
            user_id: bob.id,
            role: MemberRole::Member,
        },
    )
    .await
    .unwrap();

    let mut bob_session = svc.registry.open(bob.id);

    let task = Task::create(
        &pool,
        CreateTask {
            house_id: house.id,
            title: "Fix sink".to_string(),
            description: Some("Kitchen sink drips".to_string()),
            priority: TaskPriority::High,
            assigned_to: Some(bob.id),
            start_date: None,
            end_date: None,
            effort: Some(3),
            created_by: alice.id,
        },
    )
    .await
    .unwrap();
    assert_eq!(task.status, TaskStatus::Assigned);

    let notification = svc
        .notifier
        .task_assigned(&task, alice.id, "Alice")
        .await
        .unwrap()
        .expect("assignee notified");
    assert_eq!(notification.user_id, bob.id);
    assert_eq!(notification.kind, NotificationKind::TaskAssigned);

    let inbox = Notification::list_for_user(&pool, bob.id, true, 10).await.unwrap();
    assert!(inbox.iter().any(|n| n.id == notification.id));

    let frame = bob_session.try_recv().expect("realtime notification");
    let event: RealtimeEvent = serde_json::from_str(&frame).unwrap();
    assert_eq!(event.house_id, house.id);

    let report = svc
        .broadcaster
        .broadcast_to_house(house.id, &RealtimeEvent::task(EventAction::Assigned, house.id, &task))
        .await;
    assert_eq!(report.members, 2);
    assert_eq!(report.sessions, 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_completion_credits_assignee_or_creator() {
    let pool = test_pool().await;

    let alice = create_user(&pool, "Alice").await;
    let bob = create_user(&pool, "Bob").await;
    let house = create_house(&pool, &alice, "Chores").await;

    let base = CreateTask {
        house_id: house.id,
        title: "Mow lawn".to_string(),
        description: None,
        priority: TaskPriority::Low,
        assigned_to: None,
        start_date: None,
        end_date: None,
        effort: None,
        created_by: alice.id,
    };

    let unassigned = Task::create(&pool, base.clone()).await.unwrap();
    assert_eq!(unassigned.status, TaskStatus::Created);

    let done = Task::complete(&pool, house.id, unassigned.id).await.unwrap().unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.completed_by, Some(alice.id));
    assert!(done.completed_at.is_some());

    let assigned = Task::create(
        &pool,
        CreateTask {
            assigned_to: Some(bob.id),
            ..base
        },
    )
    .await
    .unwrap();

    let done = Task::complete(&pool, house.id, assigned.id).await.unwrap().unwrap();
    assert_eq!(done.completed_by, Some(bob.id));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_reorder_updates_positions() {
    let pool = test_pool().await;

    let alice = create_user(&pool, "Alice").await;
    let house = create_house(&pool, &alice, "Board").await;

    let mut ids = Vec::new();
    for title in ["A", "B", "C"] {
        let task = Task::create(
            &pool,
            CreateTask {
                house_id: house.id,
                title: title.to_string(),
                description: None,
                priority: TaskPriority::Medium,
                assigned_to: None,
                start_date: None,
                end_date: None,
                effort: None,
                created_by: alice.id,
            },
        )
        .await
        .unwrap();
        ids.push(task.id);
    }

    let moved = Task::reorder(&pool, house.id, &[(ids[2], 0), (ids[0], 1), (ids[1], 2)])
        .await
        .unwrap();
    assert_eq!(moved, 3);

    let c = Task::find_in_house(&pool, house.id, ids[2]).await.unwrap().unwrap();
    assert_eq!(c.position, 0);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_update_after_member_removal_keeps_release() {
    let pool = test_pool().await;
    let directory = PgMembershipDirectory::new(pool.clone());

    let alice = create_user(&pool, "Alice").await;
    let bob = create_user(&pool, "Bob").await;
    let house = create_house(&pool, &alice, "Release").await;
    Membership::create(
        &pool,
        CreateMembership {
            house_id: house.id,
            user_id: bob.id,
            role: MemberRole::Member,
        },
    )
    .await
    .unwrap();

    let task = Task::create(
        &pool,
        CreateTask {
            house_id: house.id,
            title: "Fix sink".to_string(),
            description: None,
            priority: TaskPriority::High,
            assigned_to: Some(bob.id),
            start_date: None,
            end_date: None,
            effort: None,
            created_by: alice.id,
        },
    )
    .await
    .unwrap();

    // A handler read the task before Bob left, then patches only the title
    let stale = Task::find_in_house(&pool, house.id, task.id).await.unwrap().unwrap();
    assert_eq!(stale.assigned_to, Some(bob.id));

    let removed = directory.remove_member(house.id, bob.id).await.unwrap();
    assert!(removed.released_tasks.contains(&task.id));

    let patch = TaskPatch {
        title: Some("Fix kitchen sink".to_string()),
        ..Default::default()
    };
    let update = Task::update(&pool, house.id, task.id, patch, Utc::now()).await.unwrap();

    assert_eq!(update.change, AssignmentChange::Unchanged);
    assert_eq!(update.task.title, "Fix kitchen sink");
    assert_eq!(update.task.assigned_to, None);
    assert_eq!(update.task.status, TaskStatus::Created);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_patches_keep_both_fields() {
    let pool = test_pool().await;

    let alice = create_user(&pool, "Alice").await;
    let house = create_house(&pool, &alice, "Merge").await;

    let task = Task::create(
        &pool,
        CreateTask {
            house_id: house.id,
            title: "Mow lawn".to_string(),
            description: None,
            priority: TaskPriority::Low,
            assigned_to: None,
            start_date: None,
            end_date: None,
            effort: None,
            created_by: alice.id,
        },
    )
    .await
    .unwrap();

    let retitle = TaskPatch {
        title: Some("Mow front lawn".to_string()),
        ..Default::default()
    };
    let reprioritize = TaskPatch {
        priority: Some(TaskPriority::High),
        ..Default::default()
    };

    let (a, b) = tokio::join!(
        Task::update(&pool, house.id, task.id, retitle, Utc::now()),
        Task::update(&pool, house.id, task.id, reprioritize, Utc::now()),
    );
    a.unwrap();
    b.unwrap();

    let merged = Task::find_in_house(&pool, house.id, task.id).await.unwrap().unwrap();
    assert_eq!(merged.title, "Mow front lawn");
    assert_eq!(merged.priority, TaskPriority::High);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_update_rejects_outsider_and_bad_status() {
    let pool = test_pool().await;

    let alice = create_user(&pool, "Alice").await;
    let carol = create_user(&pool, "Carol").await;
    let house = create_house(&pool, &alice, "Checks").await;

    let task = Task::create(
        &pool,
        CreateTask {
            house_id: house.id,
            title: "Water plants".to_string(),
            description: None,
            priority: TaskPriority::Medium,
            assigned_to: None,
            start_date: None,
            end_date: None,
            effort: None,
            created_by: alice.id,
        },
    )
    .await
    .unwrap();

    let assign_outsider = TaskPatch {
        assigned_to: Some(Some(carol.id)),
        ..Default::default()
    };
    let err = Task::update(&pool, house.id, task.id, assign_outsider, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, TaskUpdateError::Invalid(ref e) if e.field == "assigned_to"));

    let start_unassigned = TaskPatch {
        status: Some(TaskStatus::InProgress),
        ..Default::default()
    };
    let err = Task::update(&pool, house.id, task.id, start_unassigned, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, TaskUpdateError::Invalid(ref e) if e.field == "status"));

    let unchanged = Task::find_in_house(&pool, house.id, task.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, TaskStatus::Created);
    assert_eq!(unchanged.assigned_to, None);
}
