use redis_macros::{FromRedisValue, ToRedisArgs};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subject and body of an outgoing email. When a job carries none, the
/// welcome message is sent.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EmailInfo {
    pub subject: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
    SendRegisteredEmails {
        emails: Vec<String>,
        info: Option<EmailInfo>,
    },
    LoginCountReport,
}

/// A unit of background work. Stored in redis as JSON.
#[derive(Serialize, Deserialize, ToRedisArgs, FromRedisValue, Clone, Debug, PartialEq, Eq)]
pub struct Job {
    pub id: Uuid,
    pub attempt: u32,
    pub kind: JobKind,
}

impl Job {
    pub fn new(kind: JobKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            attempt: 0,
            kind,
        }
    }

    pub fn welcome(email: &str) -> Self {
        Self::new(JobKind::SendRegisteredEmails {
            emails: vec![email.to_owned()],
            info: None,
        })
    }

    pub fn login_report() -> Self {
        Self::new(JobKind::LoginCountReport)
    }

    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            JobKind::SendRegisteredEmails { .. } => "send_registered_emails",
            JobKind::LoginCountReport => "login_count_report",
        }
    }
}
