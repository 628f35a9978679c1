//! Long-running mode: the scheduler and the HTTP trigger side by side under
//! one shutdown token.

mod scheduler;

pub use scheduler::{PassSummary, Scheduler, SchedulerState};

use std::future::Future;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api::{self, AppState};
use crate::config::ServerConfig;

/// Run the scheduler and the HTTP listener until shutdown or a fatal error.
pub async fn run_daemon(
    scheduler: Arc<Scheduler>,
    app: AppState,
    server: &ServerConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!("Start daemon.");
    let mut tasks: JoinSet<(&'static str, anyhow::Result<()>)> = JoinSet::new();

    let token = shutdown.clone();
    tasks.spawn(async move { ("scheduler", scheduler.run(token).await) });

    let (addr, grace, token) = (server.listen_addr(), server.grace, shutdown.clone());
    tasks.spawn(async move { ("http", api::serve(app, addr, grace, token).await) });

    wait_all(tasks, shutdown).await
}

/// Run `tasks` concurrently. The first failure cancels `shutdown` so the
/// rest unwind; the call returns once every task has finished.
pub async fn supervise<F>(
    tasks: impl IntoIterator<Item = (&'static str, F)>,
    shutdown: CancellationToken,
) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let mut set = JoinSet::new();
    for (name, task) in tasks {
        set.spawn(async move { (name, task.await) });
    }
    wait_all(set, shutdown).await
}

async fn wait_all(
    mut set: JoinSet<(&'static str, anyhow::Result<()>)>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let mut first_error = None;
    while let Some(joined) = set.join_next().await {
        let failure = match joined {
            Ok((_, Ok(()))) => continue,
            Ok((name, Err(e))) => e.context(name),
            Err(e) => anyhow!("task aborted: {}", e),
        };
        error!("{:#}", failure);
        shutdown.cancel();
        first_error.get_or_insert(failure);
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Cancel `token` on Ctrl-C or SIGTERM.
pub fn cancel_on_signal(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => {
                info!("interrupted");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
