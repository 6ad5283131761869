/// Integration tests for the Hearth API
///
/// These drive the full router in-process against a real database:
/// - authentication and public endpoints
/// - house and member management under the role policy
/// - invitation acceptance over HTTP
/// - task assignment notifications and completion
///
/// Run with: `DATABASE_URL=... cargo test -p hearth-api -- --ignored`

mod common;

use axum::http::StatusCode;
use common::{wait_for, TestContext};
use hearth_shared::invitations::Inviter;
use hearth_shared::models::membership::{CreateMembership, MemberRole, Membership};
use hearth_shared::models::notification::Notification;
use serde_json::json;

#[tokio::test]
#[ignore]
async fn test_health_is_public() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx.request("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");
    assert_eq!(body["redis"], "disabled");
}

#[tokio::test]
#[ignore]
async fn test_v1_requires_identity_token() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx.request("GET", "/v1/houses", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = ctx.request("GET", "/v1/houses", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_house_creation_and_duplicate_name() {
    let ctx = TestContext::new().await.unwrap();
    let alice = ctx.sign_in("alice").await;

    let name = format!("Lakeview {}", uuid::Uuid::new_v4());
    let (status, house) = ctx
        .request("POST", "/v1/houses", Some(&alice.token), Some(json!({ "name": name })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = ctx
        .request("POST", "/v1/houses", Some(&alice.token), Some(json!({ "name": name })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, primary) = ctx.request("GET", "/v1/houses/primary", Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(primary["id"], house["id"]);
    assert_eq!(primary["role"], "owner");
}

#[tokio::test]
#[ignore]
async fn test_blank_house_name_is_validation_error() {
    let ctx = TestContext::new().await.unwrap();
    let alice = ctx.sign_in("alice").await;

    let (status, body) = ctx
        .request("POST", "/v1/houses", Some(&alice.token), Some(json!({ "name": "" })))
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "name");
}

#[tokio::test]
#[ignore]
async fn test_non_member_cannot_read_house() {
    let ctx = TestContext::new().await.unwrap();
    let alice = ctx.sign_in("alice").await;
    let mallory = ctx.sign_in("mallory").await;
    let house_id = ctx.create_house(&alice, "Lakeview").await;

    let (status, _) = ctx
        .request("GET", &format!("/v1/houses/{house_id}/tasks"), Some(&mallory.token), None)
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_owner_cannot_remove_admin_but_admin_can() {
    let ctx = TestContext::new().await.unwrap();
    let alice = ctx.sign_in("alice").await;
    let dana = ctx.sign_in("dana").await;
    let erin = ctx.sign_in("erin").await;
    let house_id = ctx.create_house(&alice, "Lakeview").await;

    for (user, role) in [(&dana, MemberRole::Admin), (&erin, MemberRole::Admin)] {
        Membership::create(
            &ctx.db,
            CreateMembership {
                house_id,
                user_id: user.id,
                role,
            },
        )
        .await
        .unwrap();
    }

    let uri = format!("/v1/houses/{house_id}/members/{}", erin.id);

    let (status, body) = ctx.request("DELETE", &uri, Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "owners cannot change or remove admins");

    let (status, _) = ctx.request("DELETE", &uri, Some(&dana.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let members = Membership::member_ids(&ctx.db, house_id).await.unwrap();
    assert!(!members.contains(&erin.id));
}

#[tokio::test]
#[ignore]
async fn test_invitation_accept_over_http() {
    let ctx = TestContext::new().await.unwrap();
    let alice = ctx.sign_in("alice").await;
    let carol = ctx.sign_in("carol").await;
    let house_id = ctx.create_house(&alice, "Lakeview").await;

    let issued = ctx
        .state
        .invitations
        .create(
            house_id,
            Inviter {
                user_id: alice.id,
                name: "alice",
            },
            &carol.email,
            MemberRole::Member,
        )
        .await
        .unwrap();

    let (status, body) = ctx
        .request("GET", &format!("/v1/invitations/{}", issued.token), Some(&carol.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inviter_name"], "alice");
    assert!(body.get("token_hash").is_none());

    let accept = format!("/v1/invitations/{}/accept", issued.token);

    let (status, membership) = ctx.request("POST", &accept, Some(&carol.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(membership["role"], "member");

    let (status, body) = ctx.request("POST", &accept, Some(&carol.token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
#[ignore]
async fn test_invitation_for_someone_else_is_forbidden() {
    let ctx = TestContext::new().await.unwrap();
    let alice = ctx.sign_in("alice").await;
    let carol = ctx.sign_in("carol").await;
    let mallory = ctx.sign_in("mallory").await;
    let house_id = ctx.create_house(&alice, "Lakeview").await;

    let issued = ctx
        .state
        .invitations
        .create(
            house_id,
            Inviter {
                user_id: alice.id,
                name: "alice",
            },
            &carol.email,
            MemberRole::Member,
        )
        .await
        .unwrap();

    let (status, _) = ctx
        .request(
            "POST",
            &format!("/v1/invitations/{}/accept", issued.token),
            Some(&mallory.token),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(!Membership::has_access(&ctx.db, house_id, mallory.id).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn test_unknown_invitation_token() {
    let ctx = TestContext::new().await.unwrap();
    let carol = ctx.sign_in("carol").await;

    let (status, body) = ctx
        .request("GET", "/v1/invitations/inv_doesnotexist", Some(&carol.token), None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
#[ignore]
async fn test_assigned_task_notifies_assignee() {
    let ctx = TestContext::new().await.unwrap();
    let alice = ctx.sign_in("alice").await;
    let bob = ctx.sign_in("bob").await;
    let house_id = ctx.create_house(&alice, "Lakeview").await;

    Membership::create(
        &ctx.db,
        CreateMembership {
            house_id,
            user_id: bob.id,
            role: MemberRole::Member,
        },
    )
    .await
    .unwrap();

    let (status, task) = ctx
        .request(
            "POST",
            &format!("/v1/houses/{house_id}/tasks"),
            Some(&alice.token),
            Some(json!({ "title": "Fix sink", "priority": "high", "assigned_to": bob.id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(task["status"], "assigned");

    wait_for(
        || async {
            Notification::count_unread(&ctx.db, bob.id).await.unwrap_or(0) == 1
        },
        5,
    )
    .await
    .unwrap();

    let (status, list) = ctx.request("GET", "/v1/notifications", Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["unread"], 1);
    assert_eq!(list["notifications"][0]["kind"], "task_assigned");
    assert_eq!(list["notifications"][0]["data"]["task_id"], task["id"]);

    let (status, done) = ctx
        .request(
            "POST",
            &format!("/v1/houses/{house_id}/tasks/{}/complete", task["id"].as_str().unwrap()),
            Some(&bob.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["status"], "completed");
    assert_eq!(done["completed_by"], json!(bob.id));
}

#[tokio::test]
#[ignore]
async fn test_assignee_must_be_member() {
    let ctx = TestContext::new().await.unwrap();
    let alice = ctx.sign_in("alice").await;
    let stranger = ctx.sign_in("stranger").await;
    let house_id = ctx.create_house(&alice, "Lakeview").await;

    let (status, body) = ctx
        .request(
            "POST",
            &format!("/v1/houses/{house_id}/tasks"),
            Some(&alice.token),
            Some(json!({ "title": "Mow lawn", "assigned_to": stranger.id })),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "assigned_to");
}

#[tokio::test]
#[ignore]
async fn test_last_member_cannot_leave() {
    let ctx = TestContext::new().await.unwrap();
    let alice = ctx.sign_in("alice").await;
    let house_id = ctx.create_house(&alice, "Lakeview").await;

    let (status, _) = ctx
        .request("POST", &format!("/v1/houses/{house_id}/leave"), Some(&alice.token), None)
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore]
async fn test_security_headers_on_api_responses() {
    let ctx = TestContext::new().await.unwrap();

    let response = {
        use tower::ServiceExt;
        let request = axum::http::Request::builder()
            .uri("/health")
            .body(axum::body::Body::empty())
            .unwrap();
        ctx.app.clone().oneshot(request).await.unwrap()
    };

    assert_eq!(response.headers().get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(response.headers().get("cache-control").unwrap(), "no-store");
}
