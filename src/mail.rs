//! Outgoing mail: message rendering and delivery backends.

use crate::domain::{Meetup, User};
use crate::error::{AppError, Result};
use crate::locale;
use askama::Template;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub template: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<()>;
}

#[derive(Template)]
#[template(path = "subscription.html")]
struct SubscriptionTemplate<'a> {
    owner: &'a str,
    title: &'a str,
    date: &'a str,
    user: &'a str,
    email: &'a str,
}

/// Mail sent to a meetup owner when someone subscribes
pub fn subscription_mail(owner: &User, subscriber: &User, meetup: &Meetup) -> Result<MailMessage> {
    let date = locale::format_schedule(&meetup.schedule);
    let html = SubscriptionTemplate {
        owner: &owner.name,
        title: &meetup.title,
        date: &date,
        user: &subscriber.name,
        email: &subscriber.email,
    }
    .render()?;

    Ok(MailMessage {
        to: format!("{} <{}>", owner.name, owner.email),
        subject: format!("Houve uma inscrição no Evento {}", meetup.title),
        template: "subscription".to_string(),
        html,
    })
}

/// Writes messages to the log instead of delivering them
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        info!(
            from = %self.from,
            to = %message.to,
            template = %message.template,
            "Mail: {}",
            message.subject
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// Delivers messages by POSTing them to an HTTP mail relay
pub struct RelayMailer {
    client: reqwest::Client,
    url: String,
    from: String,
}

impl RelayMailer {
    pub fn new(url: impl Into<String>, from: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Mail(format!("failed to build relay client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            from: from.into(),
        })
    }
}

#[async_trait]
impl Mailer for RelayMailer {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        let payload = RelayPayload {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
        };

        self.client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AppError::Mail(format!("relay {} rejected message: {e}", self.url)))?;
        Ok(())
    }
}

/// Keeps sent messages in memory
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<MailMessage>>,
    fail: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every delivery fails
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        if self.fail {
            return Err(AppError::Mail("delivery disabled".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn user(id: i64, name: &str, email: &str) -> User {
        let now = Utc::now();
        User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            password_hash: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_subscription_mail_addresses_owner() {
        let owner = user(1, "Diego", "diego@example.com");
        let guest = user(2, "Ana", "ana@example.com");
        let schedule = Utc.with_ymd_and_hms(2026, 12, 1, 19, 0, 0).unwrap();
        let meetup = Meetup {
            id: 10,
            title: "Rust Night".to_string(),
            description: "Talks".to_string(),
            location: "Downtown".to_string(),
            schedule,
            user_id: owner.id,
            banner_id: None,
            created_at: schedule,
            updated_at: schedule,
        };

        let mail = subscription_mail(&owner, &guest, &meetup).unwrap();
        assert_eq!(mail.to, "Diego <diego@example.com>");
        assert_eq!(mail.subject, "Houve uma inscrição no Evento Rust Night");
        assert_eq!(mail.template, "subscription");
        assert!(mail.html.contains("Diego"));
        assert!(mail.html.contains("ana@example.com"));
        assert!(mail.html.contains("1 de dezembro, às 19:00h"));
    }

    #[tokio::test]
    async fn test_relay_mailer_gives_up_on_silent_relay() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and never answer
        let server = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let mailer = RelayMailer::new(
            format!("http://{addr}/send"),
            "Meetapp <noreply@meetapp.com>",
            Duration::from_millis(100),
        )
        .unwrap();
        let message = MailMessage {
            to: "Diego <diego@example.com>".to_string(),
            subject: "hi".to_string(),
            template: "subscription".to_string(),
            html: "<p>hi</p>".to_string(),
        };

        let result = tokio::time::timeout(Duration::from_secs(5), mailer.send(&message))
            .await
            .expect("relay timeout must fire first");
        assert!(matches!(result, Err(AppError::Mail(_))));
        server.abort();
    }

    #[tokio::test]
    async fn test_memory_mailer_collects_messages() {
        let mailer = MemoryMailer::new();
        let message = MailMessage {
            to: "a <a@example.com>".to_string(),
            subject: "hi".to_string(),
            template: "subscription".to_string(),
            html: "<p>hi</p>".to_string(),
        };
        mailer.send(&message).await.unwrap();
        assert_eq!(mailer.sent(), vec![message.clone()]);

        assert!(MemoryMailer::failing().send(&message).await.is_err());
    }
}
