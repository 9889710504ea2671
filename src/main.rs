use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use recipe_api::{
    actions::users::ensure_superuser,
    api,
    cli::{enqueue_login_report, Cli, CliError, Command},
    config::Config,
    queue::{
        mailer::LogMailer,
        redis_queue::RedisQueue,
        schedule::spawn_login_reports,
        tasks::TaskContext,
        worker::{RetryPolicy, Worker},
    },
    state::AppContext,
};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::EnqueueLoginReport => enqueue().await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn enqueue() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let Some(url) = &config.redis_url else {
        return Err(CliError::NoSharedQueue.into());
    };

    let queue = RedisQueue::connect(url).await?;
    let job = enqueue_login_report(&queue).await?;
    log::info!("Queued {} job {}", job.name(), job.id);
    Ok(())
}

async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let ctx = AppContext::from_config(&config).await?;

    if let Some((email, password)) = &config.superuser {
        match ensure_superuser(email, password, &*ctx.store).await {
            Ok(Some(user)) => log::info!("Created superuser {}", user.email),
            Ok(None) => log::debug!("Superuser {email} already exists"),
            Err(e) => log::error!("Could not create superuser {email}: {e}"),
        }
    }

    let tasks = TaskContext {
        store: ctx.store.clone(),
        mailer: Arc::new(LogMailer),
        from: config.mail_from.to_owned(),
    };
    let policy = RetryPolicy {
        max_retries: config.mail_max_retries,
        backoff: config.mail_retry_backoff,
    };
    let worker = Worker::new(ctx.queue.clone(), tasks, policy).spawn();
    let reports = config
        .login_report_interval
        .map(|period| spawn_login_reports(ctx.queue.clone(), period));

    let (addr, server) = warp::serve(api::routes(ctx)).try_bind_with_graceful_shutdown(
        config.bind_addr,
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Could not listen for shutdown signal: {e}");
            }
        },
    )?;

    log::info!("Listening on {addr}");
    server.await;

    log::info!("Shutting down");
    worker.abort();
    if let Some(reports) = reports {
        reports.abort();
    }
    Ok(())
}
