//! Contact-form notifications: Telegram bot message and SMTP mail.

use crate::config::{SmtpSettings, TelegramSettings};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("telegram: {0}")]
    Telegram(String),
    #[error("mail: {0}")]
    Mail(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;
    async fn notify(&self, msg: &ContactMessage) -> Result<(), NotifyError>;
}

/// Escape Telegram legacy-Markdown control characters in user input.
fn escape_markdown(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn telegram_text(msg: &ContactMessage) -> String {
    format!(
        "*New Contact Message*\n\nName: {}\nEmail: {}\nSubject: {}\nMessage:\n{}\n",
        escape_markdown(&msg.name),
        escape_markdown(&msg.email),
        escape_markdown(&msg.subject),
        escape_markdown(&msg.message)
    )
}

pub fn mail_subject(msg: &ContactMessage) -> String {
    format!("New Contact Message: {}", msg.subject)
}

pub fn mail_body(msg: &ContactMessage) -> String {
    format!(
        "New Contact Form Submission\n\nName: {}\nEmail: {}\nSubject: {}\n\nMessage:\n{}\n",
        msg.name, msg.email, msg.subject, msg.message
    )
}

pub struct TelegramNotifier {
    client: reqwest::Client,
    settings: TelegramSettings,
    api_base: String,
}

impl TelegramNotifier {
    pub fn new(settings: TelegramSettings) -> Self {
        TelegramNotifier {
            client: reqwest::Client::new(),
            settings,
            api_base: "https://api.telegram.org".into(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn notify(&self, msg: &ContactMessage) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.settings.bot_token);
        let payload = serde_json::json!({
            "chat_id": self.settings.chat_id,
            "text": telegram_text(msg),
            "parse_mode": "Markdown",
        });
        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Telegram(e.without_url().to_string()))?;
        if !resp.status().is_success() {
            return Err(NotifyError::Telegram(format!("status {}", resp.status())));
        }
        Ok(())
    }
}

pub struct SmtpNotifier {
    settings: SmtpSettings,
}

impl SmtpNotifier {
    pub fn new(settings: SmtpSettings) -> Self {
        SmtpNotifier { settings }
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn notify(&self, msg: &ContactMessage) -> Result<(), NotifyError> {
        use lettre::{
            message::header::ContentType, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
            AsyncTransport, Message, Tokio1Executor,
        };

        let email = Message::builder()
            .from(
                self.settings
                    .from
                    .parse()
                    .map_err(|e| NotifyError::Mail(format!("invalid from address: {}", e)))?,
            )
            .to(self
                .settings
                .to
                .parse()
                .map_err(|e| NotifyError::Mail(format!("invalid to address: {}", e)))?)
            .subject(mail_subject(msg))
            .header(ContentType::TEXT_PLAIN)
            .body(mail_body(msg))
            .map_err(|e| NotifyError::Mail(format!("failed to build email: {}", e)))?;

        let mailer = if self.settings.user.is_empty() {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.settings.host)
                .port(self.settings.port)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.settings.host)
                .map_err(|e| NotifyError::Mail(format!("smtp relay: {}", e)))?
                .credentials(Credentials::new(self.settings.user.clone(), self.settings.password.clone()))
                .port(self.settings.port)
                .build()
        };

        mailer
            .send(email)
            .await
            .map_err(|e| NotifyError::Mail(format!("send failed: {}", e)))?;
        Ok(())
    }
}

/// Writes the submission to the log; the fallback when nothing else is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, msg: &ContactMessage) -> Result<(), NotifyError> {
        tracing::info!(name = %msg.name, email = %msg.email, subject = %msg.subject, "contact message received");
        Ok(())
    }
}

/// Notifiers for whatever channels are configured; [`LogNotifier`] when none are.
pub fn from_settings(telegram: Option<TelegramSettings>, smtp: Option<SmtpSettings>) -> Vec<Arc<dyn Notifier>> {
    let mut out: Vec<Arc<dyn Notifier>> = Vec::new();
    if let Some(t) = telegram {
        out.push(Arc::new(TelegramNotifier::new(t)));
    }
    if let Some(s) = smtp {
        out.push(Arc::new(SmtpNotifier::new(s)));
    }
    if out.is_empty() {
        out.push(Arc::new(LogNotifier));
    }
    out
}

/// Send to every notifier. Failures are logged and counted, never propagated.
pub async fn broadcast(notifiers: &[Arc<dyn Notifier>], msg: &ContactMessage) -> usize {
    let mut failed = 0;
    for n in notifiers {
        if let Err(e) = n.notify(msg).await {
            tracing::warn!(notifier = n.name(), error = %e, "contact notification failed");
            failed += 1;
        }
    }
    failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<ContactMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn notify(&self, msg: &ContactMessage) -> Result<(), NotifyError> {
            self.seen.lock().unwrap().push(msg.clone());
            if self.fail {
                return Err(NotifyError::Mail("down".into()));
            }
            Ok(())
        }
    }

    fn sample() -> ContactMessage {
        ContactMessage {
            name: "Dara_K".into(),
            email: "dara@example.com".into(),
            subject: "Quote".into(),
            message: "Need 3 *units*".into(),
        }
    }

    #[test]
    fn telegram_text_escapes_markdown() {
        let text = telegram_text(&sample());
        assert!(text.contains("Name: Dara\\_K"));
        assert!(text.contains("Need 3 \\*units\\*"));
    }

    #[test]
    fn mail_renders_subject_and_body() {
        assert_eq!(mail_subject(&sample()), "New Contact Message: Quote");
        assert!(mail_body(&sample()).contains("Email: dara@example.com"));
    }

    #[test]
    fn falls_back_to_log() {
        let n = from_settings(None, None);
        assert_eq!(n.len(), 1);
        assert_eq!(n[0].name(), "log");
    }

    #[tokio::test]
    async fn broadcast_continues_past_failures() {
        let failing = Arc::new(Recording { fail: true, ..Default::default() });
        let ok = Arc::new(Recording::default());
        let list: Vec<Arc<dyn Notifier>> = vec![failing.clone(), ok.clone()];
        assert_eq!(broadcast(&list, &sample()).await, 1);
        assert_eq!(ok.seen.lock().unwrap().len(), 1);
        assert_eq!(failing.seen.lock().unwrap().len(), 1);
    }
}
