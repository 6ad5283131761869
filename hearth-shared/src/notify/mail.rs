/// Outbound email
///
/// [`HttpMailer`] posts `{from, to, subject, html, text}` to a transactional
/// mail API with a bearer key. Without an API configured, [`LogMailer`]
/// writes the message to the log so local development still shows the
/// invitation link.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::info;

/// Error type for mail delivery
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mail API rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// A rendered email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

#[derive(Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

/// Mailer backed by an HTTP mail API
#[derive(Clone)]
pub struct HttpMailer {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&MailRequest {
                from: &self.from,
                to: &message.to,
                subject: &message.subject,
                html: &message.html,
                text: &message.text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(to = %message.to, subject = %message.subject, "Email sent");
        Ok(())
    }
}

/// Mailer that only logs
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.text,
            "Mail API not configured, logging email instead"
        );
        Ok(())
    }
}

/// Link the invitee follows to accept
pub fn invitation_link(app_base_url: &str, token: &str) -> String {
    format!("{}/accept-invite?token={}", app_base_url.trim_end_matches('/'), token)
}

/// Renders the invitation email
pub fn invitation_email(
    to: &str,
    house_name: &str,
    inviter_name: &str,
    link: &str,
    expires_at: DateTime<Utc>,
) -> MailMessage {
    let expires = expires_at.format("%B %-d, %Y");
    let house = escape_html(house_name);
    let inviter = escape_html(inviter_name);

    MailMessage {
        to: to.to_string(),
        subject: format!("{inviter_name} invited you to join {house_name} on Hearth"),
        html: format!(
            "<p><strong>{inviter}</strong> invited you to join <strong>{house}</strong> on Hearth.</p>\
             <p><a href=\"{link}\">Accept invitation</a></p>\
             <p>This invitation expires on {expires}.</p>"
        ),
        text: format!(
            "{inviter_name} invited you to join {house_name} on Hearth.\n\n\
             Accept the invitation: {link}\n\n\
             This invitation expires on {expires}."
        ),
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_invitation_link() {
        assert_eq!(
            invitation_link("https://hearth.app/", "inv_abc"),
            "https://hearth.app/accept-invite?token=inv_abc"
        );
        assert_eq!(
            invitation_link("http://localhost:3000", "inv_abc"),
            "http://localhost:3000/accept-invite?token=inv_abc"
        );
    }

    #[test]
    fn test_invitation_email_contents() {
        let expires = Utc.with_ymd_and_hms(2026, 3, 7, 12, 0, 0).unwrap();
        let link = invitation_link("https://hearth.app", "inv_abc");
        let message = invitation_email("bob@x.io", "Lakeview", "Alice", &link, expires);

        assert_eq!(message.to, "bob@x.io");
        assert_eq!(message.subject, "Alice invited you to join Lakeview on Hearth");
        assert!(message.text.contains(&link));
        assert!(message.html.contains(&link));
        assert!(message.text.contains("March 7, 2026"));
    }

    #[test]
    fn test_html_is_escaped() {
        let message = invitation_email("bob@x.io", "<b>Den</b>", "A & B", "https://x", Utc::now());

        assert!(message.html.contains("&lt;b&gt;Den&lt;/b&gt;"));
        assert!(message.html.contains("A &amp; B"));
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_everything() {
        let message = invitation_email("bob@x.io", "Lakeview", "Alice", "https://x", Utc::now());
        assert!(LogMailer.send(&message).await.is_ok());
    }
}
