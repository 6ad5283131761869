/// Notifications, mail and push
///
/// - `dispatch`: spawns side effects that must not fail a request
/// - `mail`: outbound email and the invitation template
/// - `push`: web-push gateway client
/// - `notifier`: stores notifications and fans them out

pub mod dispatch;
pub mod mail;
pub mod notifier;
pub mod push;

pub use dispatch::best_effort;
pub use mail::{HttpMailer, LogMailer, MailError, MailMessage, Mailer};
pub use notifier::{NotifyError, Notifier};
pub use push::{HttpPushDispatcher, NoopPushDispatcher, PushDispatcher, PushError, PushMessage};
