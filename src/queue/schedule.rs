use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};

use super::{jobs::Job, queue::JobQueue};

/// Pushes a login count report every `period`, starting one period from now.
pub fn spawn_login_reports(queue: Arc<dyn JobQueue>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticks.tick().await;
            let job = Job::login_report();
            match queue.push(&job).await {
                Ok(()) => log::info!("Scheduled {} job {}", job.name(), job.id),
                Err(e) => log::error!("Could not schedule {} job: {e}", job.name()),
            }
        }
    })
}
