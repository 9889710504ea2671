// Integration tests for the background job worker

mod common;

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use common::{TestApp, PASSWORD};
use recipe_api::{
    actions::users::create_superuser,
    queue::{
        jobs::{Job, JobKind},
        mailer::{Email, MailError, Mailer},
        queue::{JobQueue, MemoryQueue},
        schedule::spawn_login_reports,
        tasks::TaskContext,
        worker::{JobOutcome, RetryPolicy, Worker},
    },
    store::StoreTx,
};
use serde_json::json;
use tokio::sync::Mutex;
use warp::http::StatusCode;

/// Records every message; fails the first `failures` sends.
#[derive(Default)]
struct RecordingMailer {
    failures: usize,
    attempts: AtomicUsize,
    sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    fn failing(failures: usize) -> Self {
        Self {
            failures,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(MailError(String::from("smtp unavailable")));
        }
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}

fn policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        backoff: Duration::from_millis(5),
    }
}

fn worker(app: &TestApp, mailer: Arc<RecordingMailer>) -> Worker {
    let tasks = TaskContext {
        store: app.ctx.store.clone(),
        mailer,
        from: String::from("noreply@example.com"),
    };
    Worker::new(app.ctx.queue.clone(), tasks, policy())
}

fn sent_count(mailer: &RecordingMailer) -> usize {
    mailer.sent.try_lock().map(|sent| sent.len()).unwrap_or(0)
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_welcome_mail_sent_after_signup() {
    let app = TestApp::new();
    let mailer = Arc::new(RecordingMailer::default());
    let handle = worker(&app, mailer.clone()).spawn();

    let (status, _) = app
        .call(
            "POST",
            "/users/",
            None,
            Some(json!({ "email": "new@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    wait_for(|| sent_count(&mailer) == 1).await;
    let sent = mailer.sent.lock().await;
    assert_eq!(sent[0].to, vec![String::from("new@example.com")]);
    assert_eq!(sent[0].from, "noreply@example.com");
    handle.abort();
}

#[tokio::test]
async fn test_failing_job_is_retried_with_backoff_then_dropped() {
    let app = TestApp::new();
    let mailer = Arc::new(RecordingMailer::failing(usize::MAX));
    let worker = worker(&app, mailer.clone());

    let job = Job::welcome("cook@example.com");
    assert_eq!(
        worker.handle(job.clone()).await,
        JobOutcome::Retried(Duration::from_millis(5))
    );

    let mut retried = job.next_attempt();
    assert_eq!(
        worker.handle(retried.clone()).await,
        JobOutcome::Retried(Duration::from_millis(10))
    );
    retried = retried.next_attempt();
    assert_eq!(
        worker.handle(retried.clone()).await,
        JobOutcome::Retried(Duration::from_millis(20))
    );
    retried = retried.next_attempt();
    assert_eq!(worker.handle(retried).await, JobOutcome::Dropped);
}

#[tokio::test]
async fn test_worker_gives_up_after_max_retries() {
    let app = TestApp::new();
    let mailer = Arc::new(RecordingMailer::failing(usize::MAX));
    let handle = worker(&app, mailer.clone()).spawn();

    app.queue.push(&Job::welcome("cook@example.com")).await.unwrap();

    // the first run plus three retries
    wait_for(|| mailer.attempts.load(Ordering::SeqCst) == 4).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(mailer.attempts.load(Ordering::SeqCst), 4);
    assert!(app.queue.pending().await.is_empty());
    handle.abort();
}

#[tokio::test]
async fn test_transient_failure_recovers() {
    let app = TestApp::new();
    let mailer = Arc::new(RecordingMailer::failing(1));
    let handle = worker(&app, mailer.clone()).spawn();

    app.queue.push(&Job::welcome("cook@example.com")).await.unwrap();

    wait_for(|| sent_count(&mailer) == 1).await;
    assert_eq!(mailer.attempts.load(Ordering::SeqCst), 2);
    handle.abort();
}

#[tokio::test]
async fn test_login_report_goes_to_superusers() {
    let app = TestApp::new();
    create_superuser("root@example.com", PASSWORD, &app.store)
        .await
        .unwrap();
    let (mut recent, _) = app.user("recent@example.com").await;
    app.user("idle@example.com").await;

    {
        let mut tx = app.tx().await;
        recent.last_login = Some(Utc::now());
        tx.update_user(&recent).await.unwrap();
        tx.commit().await.unwrap();
    }

    let mailer = Arc::new(RecordingMailer::default());
    let outcome = worker(&app, mailer.clone()).handle(Job::login_report()).await;
    assert_eq!(outcome, JobOutcome::Completed);

    let sent = mailer.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec![String::from("root@example.com")]);
    assert_eq!(sent[0].subject, "Logins for last day");
    assert_eq!(sent[0].body, "There were 1 logins for last 24 hours.");
}

#[tokio::test]
async fn test_memory_queue_pop_times_out() {
    let queue = MemoryQueue::new();
    let popped = queue.pop(Duration::from_millis(20)).await.unwrap();
    assert!(popped.is_none());
}

#[tokio::test]
async fn test_login_reports_are_scheduled_periodically() {
    let queue = MemoryQueue::new();
    let handle = spawn_login_reports(Arc::new(queue.clone()), Duration::from_millis(20));

    assert!(queue.pending().await.is_empty());
    for _ in 0..200 {
        if queue.pending().await.len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.abort();

    let pending = queue.pending().await;
    assert!(pending.len() >= 2);
    assert!(pending
        .iter()
        .all(|job| job.kind == JobKind::LoginCountReport));
}
