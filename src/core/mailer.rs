//! Outgoing email notifications
//!
//! Delivery sits behind the [`Mailer`] trait. [`LogMailer`] writes messages
//! to the tracing log. Tests use an in-memory `MemoryMailer`.

#[cfg(test)]
use std::sync::Mutex;

use async_trait::async_trait;

/// A plain-text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    pub fn welcome(to: &str, name: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Welcome to Realtors".to_string(),
            body: format!(
                "Hi {name},\n\nYour account has been created. You can now sign in with {to}.\n"
            ),
        }
    }

    pub fn reset_code(to: &str, code: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Your password reset code".to_string(),
            body: format!(
                "Use the code {code} to verify your account. It expires in 15 minutes.\n\
                 If you did not request a reset you can ignore this message.\n"
            ),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("Mail delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailerError>;
}

/// Records messages through `tracing` instead of delivering them
#[derive(Debug, Clone)]
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
    async fn send(&self, email: Email) -> Result<(), MailerError> {
        tracing::info!(
            from = %self.from,
            to = %email.to,
            subject = %email.subject,
            "Outgoing mail"
        );
        tracing::debug!(body = %email.body, "Mail body");
        Ok(())
    }
}

/// Keeps sent messages in memory
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<Email>>,
}

#[cfg(test)]
impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: Email) -> Result<(), MailerError> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(email);
        Ok(())
    }
}
