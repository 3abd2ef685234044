use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use taskwire_client::{Agent, ClientEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,taskwire_client=debug")),
        )
        .init();

    info!("Starting taskwire client v{}", env!("CARGO_PKG_VERSION"));

    let (handle, mut events) = Agent::from_env()?.spawn()?;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("shutdown signal received");
                handle.shutdown().await;
                return Ok(());
            }
            event = events.recv() => {
                let Some(event) = event else {
                    return Ok(());
                };
                match event {
                    ClientEvent::Connected { name } => {
                        info!(name = name.as_deref().unwrap_or("<unnamed>"), "connected");
                    }
                    ClientEvent::Disconnected => warn!("disconnected, will retry"),
                    ClientEvent::TaskListReplaced(tasks) => {
                        info!(count = tasks.len(), "task list synchronized");
                    }
                    ClientEvent::TaskAssigned(task) => {
                        info!(task = %task.id, title = %task.title, "task assigned");
                    }
                    ClientEvent::TaskUpdated(task) => {
                        info!(task = %task.id, status = task.status.as_str(), "task updated");
                    }
                    ClientEvent::TaskRemoved(task_id) => info!(task = %task_id, "task removed"),
                    ClientEvent::NotificationReceived { id, message } => {
                        info!(notification = %id, %message, "notification");
                    }
                    ClientEvent::IdentityRejected { message } => {
                        warn!(?message, "login refused, set TASKWIRE_CLIENT_ID and restart");
                    }
                    ClientEvent::AccountRemoved { message } => {
                        warn!(%message, "account removed by server");
                    }
                    ClientEvent::ServerShutdown { message } => {
                        warn!(%message, "server shutting down");
                    }
                    ClientEvent::Stopped => {
                        info!("agent stopped");
                        return Ok(());
                    }
                }
            }
        }
    }
}
