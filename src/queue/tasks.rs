use std::sync::Arc;

use chrono::{Duration, Utc};
use thiserror::Error;

use super::{
    jobs::{EmailInfo, Job, JobKind},
    mailer::{Email, MailError, Mailer},
};
use crate::{
    constants::{LOGIN_REPORT_SUBJECT, WELCOME_MESSAGE, WELCOME_SUBJECT},
    error::StoreError,
    store::Store,
};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a job needs to run.
#[derive(Clone)]
pub struct TaskContext {
    pub store: Arc<dyn Store>,
    pub mailer: Arc<dyn Mailer>,
    pub from: String,
}

pub async fn run_job(job: &Job, ctx: &TaskContext) -> Result<(), TaskError> {
    match &job.kind {
        JobKind::SendRegisteredEmails { emails, info } => {
            send_registered_emails(emails, info.as_ref(), ctx).await
        }
        JobKind::LoginCountReport => login_count_report(ctx).await,
    }
}

pub async fn send_registered_emails(
    emails: &[String],
    info: Option<&EmailInfo>,
    ctx: &TaskContext,
) -> Result<(), TaskError> {
    let (subject, body) = match info {
        Some(info) => (info.subject.to_owned(), info.message.to_owned()),
        None => (WELCOME_SUBJECT.to_owned(), WELCOME_MESSAGE.to_owned()),
    };

    ctx.mailer
        .send(&Email {
            from: ctx.from.to_owned(),
            to: emails.to_vec(),
            subject,
            body,
        })
        .await?;

    Ok(())
}

/// Mails every superuser how many users logged in during the last 24 hours.
pub async fn login_count_report(ctx: &TaskContext) -> Result<(), TaskError> {
    let mut tx = ctx.store.begin().await?;
    let since = Utc::now() - Duration::days(1);
    let count = tx.count_logins_since(since).await?;
    let recipients = tx.list_superuser_emails().await?;
    tx.commit().await?;

    if recipients.is_empty() {
        log::debug!("No superusers to receive the login report");
        return Ok(());
    }

    let info = EmailInfo {
        subject: LOGIN_REPORT_SUBJECT.to_owned(),
        message: format!("There were {count} logins for last 24 hours."),
    };
    send_registered_emails(&recipients, Some(&info), ctx).await
}
