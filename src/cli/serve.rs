use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Notify;

use crate::config::StewardConfig;
use crate::context::StewardContext;
use crate::error::{Result, StewardError};
use crate::ingress::EventIngress;
use crate::ipc::IpcServer;
use crate::maintenance::MaintenanceScheduler;
use crate::notify::NotificationBus;

/// Run the daemon until ctrl-c.
pub async fn run_serve(config: StewardConfig) -> Result<()> {
    let timeout = Duration::from_millis(config.hook_timeout_ms);
    let socket_path = config.socket_path();
    let ctx = Arc::new(StewardContext::open(config)?);

    if ctx.policies.get_all_policies()?.is_empty() {
        let installed = ctx.policies.install_default_policies()?;
        eprintln!("steward: installed {} default policies", installed);
    }

    let scheduler = MaintenanceScheduler::new(ctx.clone())?;
    scheduler.startup_sweep()?;

    spawn_notification_log(&ctx.bus);

    let stop_maintenance = Arc::new(Notify::new());
    let maintenance = tokio::spawn(scheduler.run(stop_maintenance.clone()));

    let ingress = Arc::new(EventIngress::with_default_handlers(ctx.clone()));
    let server = Arc::new(IpcServer::new(socket_path, ingress, timeout));
    eprintln!("steward: listening on {}", server.socket_path().display());

    let mut serving = {
        let server = server.clone();
        tokio::spawn(async move { server.serve().await })
    };

    let finished = tokio::select! {
        joined = &mut serving => Some(flatten(joined)),
        _ = tokio::signal::ctrl_c() => None,
    };
    let result = match finished {
        Some(result) => result,
        None => {
            eprintln!("steward: shutting down");
            server.shutdown();
            flatten(serving.await)
        }
    };

    stop_maintenance.notify_one();
    let _ = maintenance.await;
    result
}

fn flatten(joined: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    joined.map_err(|e| StewardError::Ipc {
        reason: format!("server task failed: {}", e),
    })?
}

/// Mirror bus traffic into the debug log.
fn spawn_notification_log(bus: &NotificationBus) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(n) => tracing::debug!("notify {} {}", n.kind, n.payload),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("notification log skipped {} message(s)", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
