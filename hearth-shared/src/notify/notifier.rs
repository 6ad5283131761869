/// User-facing notifications
///
/// A notification is stored first, then pushed to every subscription of
/// the recipient and announced over the realtime socket. Push and realtime
/// delivery never fail the call; only the insert does.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use hearth_shared::notify::{LogMailer, NoopPushDispatcher, Notifier};
/// use hearth_shared::realtime::ChangeBroadcaster;
/// use hearth_shared::models::task::Task;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, broadcaster: ChangeBroadcaster, task: Task) -> Result<(), Box<dyn std::error::Error>> {
/// let notifier = Notifier::new(pool, Arc::new(LogMailer), Arc::new(NoopPushDispatcher), broadcaster);
/// notifier.task_assigned(&task, task.created_by, "Alice").await?;
/// # Ok(())
/// # }
/// ```

use std::future::Future;
use std::sync::Arc;

use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::mail::{MailError, MailMessage, Mailer};
use super::push::{PushDispatcher, PushError, PushMessage};
use crate::models::membership::{MemberRole, Membership};
use crate::models::notification::{CreateNotification, Notification, NotificationKind};
use crate::models::push_subscription::PushSubscription;
use crate::models::task::Task;
use crate::realtime::{ChangeBroadcaster, RealtimeEvent};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Stores notifications and fans them out to push and realtime
#[derive(Clone)]
pub struct Notifier {
    pool: PgPool,
    mailer: Arc<dyn Mailer>,
    push: Arc<dyn PushDispatcher>,
    broadcaster: ChangeBroadcaster,
}

impl Notifier {
    pub fn new(
        pool: PgPool,
        mailer: Arc<dyn Mailer>,
        push: Arc<dyn PushDispatcher>,
        broadcaster: ChangeBroadcaster,
    ) -> Self {
        Self {
            pool,
            mailer,
            push,
            broadcaster,
        }
    }

    /// Stores a notification and delivers it over push and realtime
    pub async fn notify(&self, data: CreateNotification) -> Result<Notification, NotifyError> {
        let notification = Notification::create(&self.pool, data).await?;

        debug!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            kind = notification.kind.as_str(),
            "Notification stored"
        );

        self.broadcaster
            .notify_user(
                notification.user_id,
                &RealtimeEvent::notification(notification.house_id, &notification),
            )
            .await;

        let message = PushMessage {
            title: notification.title.clone(),
            body: notification.message.clone(),
            data: json!({
                "notification_id": notification.id,
                "kind": notification.kind,
                "house_id": notification.house_id,
                "data": notification.data,
            }),
        };
        self.push_to_user(notification.user_id, &message).await?;

        Ok(notification)
    }

    /// Pushes to every subscription of a user
    ///
    /// Subscriptions the gateway reports as gone are deleted. Returns the
    /// number of successful pushes.
    pub async fn push_to_user(&self, user_id: Uuid, message: &PushMessage) -> Result<usize, NotifyError> {
        let subscriptions = PushSubscription::list_by_user(&self.pool, user_id).await?;
        let mut sent = 0;

        for subscription in &subscriptions {
            match self.push.send(subscription, message).await {
                Ok(()) => sent += 1,
                Err(PushError::Gone) => {
                    info!(user_id = %user_id, subscription_id = %subscription.id, "Removing expired push subscription");
                    PushSubscription::delete_by_id(&self.pool, subscription.id).await?;
                }
                Err(e) => {
                    warn!(user_id = %user_id, subscription_id = %subscription.id, error = %e, "Push delivery failed");
                }
            }
        }

        Ok(sent)
    }

    pub async fn send_mail(&self, message: &MailMessage) -> Result<(), NotifyError> {
        self.mailer.send(message).await?;
        Ok(())
    }

    /// Tells the assignee about a task
    ///
    /// Self-assignment produces no notification.
    pub async fn task_assigned(
        &self,
        task: &Task,
        actor_id: Uuid,
        actor_name: &str,
    ) -> Result<Option<Notification>, NotifyError> {
        let Some(data) = task_assigned_notification(task, actor_id, actor_name) else {
            return Ok(None);
        };

        self.notify(data).await.map(Some)
    }

    /// Tells an existing user about an invitation addressed to them
    pub async fn house_invitation(
        &self,
        user_id: Uuid,
        house_id: Uuid,
        invitation_id: Uuid,
        house_name: &str,
        inviter_name: &str,
        role: MemberRole,
    ) -> Result<Notification, NotifyError> {
        self.notify(CreateNotification {
            user_id,
            house_id,
            kind: NotificationKind::HouseInvitation,
            title: "House invitation".to_string(),
            message: format!("{inviter_name} invited you to join {house_name}"),
            data: json!({
                "invitation_id": invitation_id,
                "house_name": house_name,
                "role": role,
            }),
        })
        .await
    }

    /// Tells every other member that the shopping list changed
    ///
    /// A failed insert for one member is logged and skipped. Returns how many
    /// members were notified.
    pub async fn shopping_list_updated(
        &self,
        house_id: Uuid,
        actor_id: Uuid,
        actor_name: &str,
        open_items: i64,
    ) -> Result<usize, NotifyError> {
        let recipients: Vec<Uuid> = Membership::member_ids(&self.pool, house_id)
            .await?
            .into_iter()
            .filter(|id| *id != actor_id)
            .collect();

        let message = shopping_message(actor_name, open_items);
        let notified = notify_each(&recipients, move |user_id| {
            self.notify(CreateNotification {
                user_id,
                house_id,
                kind: NotificationKind::ShoppingListUpdated,
                title: "Shopping list updated".to_string(),
                message: message.clone(),
                data: json!({ "updated_by": actor_id, "open_items": open_items }),
            })
        })
        .await;

        if notified < recipients.len() {
            warn!(
                house_id = %house_id,
                notified,
                recipients = recipients.len(),
                "Shopping list notification partially delivered"
            );
        }

        Ok(notified)
    }
}

/// Sends to each recipient in turn; one failure does not stop the rest
async fn notify_each<F, Fut>(recipients: &[Uuid], mut send: F) -> usize
where
    F: FnMut(Uuid) -> Fut,
    Fut: Future<Output = Result<Notification, NotifyError>>,
{
    let mut notified = 0;

    for user_id in recipients {
        match send(*user_id).await {
            Ok(_) => notified += 1,
            Err(e) => warn!(user_id = %user_id, error = %e, "Failed to notify member"),
        }
    }

    notified
}

/// Builds the `task_assigned` notification, or `None` for self-assignment
fn task_assigned_notification(task: &Task, actor_id: Uuid, actor_name: &str) -> Option<CreateNotification> {
    let assignee = task.assigned_to?;
    if assignee == actor_id {
        return None;
    }

    Some(CreateNotification {
        user_id: assignee,
        house_id: task.house_id,
        kind: NotificationKind::TaskAssigned,
        title: "New task assigned".to_string(),
        message: format!("{actor_name} assigned you \"{}\"", task.title),
        data: json!({
            "task_id": task.id,
            "priority": task.priority,
            "end_date": task.end_date,
        }),
    })
}

fn shopping_message(actor_name: &str, open_items: i64) -> String {
    match open_items {
        0 => format!("{actor_name} finished the shopping list"),
        1 => format!("{actor_name} updated the shopping list (1 item left)"),
        n => format!("{actor_name} updated the shopping list ({n} items left)"),
    }
}
