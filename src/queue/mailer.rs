use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("could not deliver mail: {0}")]
pub struct MailError(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Writes outgoing mail to the log instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        log::info!(
            "Mail from {} to [{}]: {} | {}",
            email.from,
            email.to.join(", "),
            email.subject,
            email.body
        );
        Ok(())
    }
}
