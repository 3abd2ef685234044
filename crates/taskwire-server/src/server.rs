//! Server assembly: shared core state, the accept loop, and the
//! administrative surface used by operator frontends.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use taskwire_shared::model::{ClientIdentity, Task};
use taskwire_shared::types::{ClientId, ClientStatus, ReminderId, TaskId};
use taskwire_shared::Message;
use taskwire_store::{ClientPatch, Database, StoreError};

use crate::config::ServerConfig;
use crate::dispatch::NotificationDispatcher;
use crate::error::{Result, ServerError};
use crate::events::ServerEvent;
use crate::registry::Registry;
use crate::scheduler;
use crate::session;
use crate::sync::TaskSynchronizer;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// State shared by every connection worker and the scheduler.
pub(crate) struct Core {
    pub(crate) config: ServerConfig,
    pub(crate) db: Mutex<Database>,
    pub(crate) registry: Registry,
    pub(crate) events: broadcast::Sender<ServerEvent>,
}

impl Core {
    /// Publish a change event.  Lagging or absent subscribers are fine; the
    /// channel exists purely for presentation refresh.
    pub(crate) fn emit(&self, event: ServerEvent) {
        let _ = self.events.send(event);
    }
}

/// The task distribution server.
///
/// Cheap to clone; all clones share the same core.  Connection workers are
/// spawned by [`Server::serve`], while the administrative methods can be
/// driven from any task holding a clone.
#[derive(Clone)]
pub struct Server {
    core: Arc<Core>,
    shutdown: CancellationToken,
}

impl Server {
    /// Open (or create) the database named by the config and assemble the
    /// server around it.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let db = match &config.db_path {
            Some(path) => Database::open_at(path)?,
            None => Database::open_default()?,
        };
        Ok(Self::with_database(config, db))
    }

    /// Assemble the server around an already-open database.
    pub fn with_database(config: ServerConfig, db: Database) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            core: Arc::new(Core {
                config,
                db: Mutex::new(db),
                registry: Registry::new(),
                events,
            }),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.core.config
    }

    /// Bind the configured listen address.
    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        TcpListener::bind(self.core.config.listen_addr).await
    }

    /// Accept connections until [`Server::shutdown`] is called.  Also drives
    /// the reminder scheduler for the lifetime of the loop.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;
        info!(addr = %local, "listening");

        let scheduler = tokio::spawn(scheduler::run(
            self.core.clone(),
            self.shutdown.child_token(),
        ));

        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(session::handle_connection(self.core.clone(), stream, peer));
                }
                Err(e) => {
                    // Transient accept failures (fd exhaustion and the like)
                    // must not kill the loop.
                    warn!(error = %e, "accept failed");
                }
            }
        }

        let notified = self
            .core
            .registry
            .drain(Message::ServerShutdown {
                message: "Server is shutting down".to_string(),
            })
            .await;
        info!(notified, "server stopped");

        let _ = scheduler.await;
        Ok(())
    }

    /// Stop the accept loop and notify connected clients.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn tasks(&self) -> TaskSynchronizer {
        TaskSynchronizer::new(self.core.clone())
    }

    pub fn notifications(&self) -> NotificationDispatcher {
        NotificationDispatcher::new(self.core.clone())
    }

    /// Subscribe to change events for presentation refresh.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ServerEvent> {
        self.core.events.subscribe()
    }

    /// Pre-provision a client identity so it can log in under the strict
    /// policy.
    pub async fn add_client(&self, id: ClientId, name: &str) -> Result<ClientIdentity> {
        let identity = ClientIdentity {
            id,
            name: name.to_string(),
            address: None,
            last_seen: Utc::now(),
            status: ClientStatus::Active,
        };
        self.core.db.lock().await.add_client(&identity)?;
        Ok(identity)
    }

    /// Change a client's display name.
    pub async fn rename_client(&self, id: &ClientId, name: &str) -> Result<()> {
        let db = self.core.db.lock().await;
        match db.update_client(
            id,
            &ClientPatch {
                name: Some(name.to_string()),
                ..Default::default()
            },
        ) {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound) => Err(ServerError::ClientNotFound(id.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// Activate or deactivate a client.  Takes effect at the next login;
    /// an existing session is left running.
    pub async fn set_client_status(&self, id: &ClientId, status: ClientStatus) -> Result<()> {
        let db = self.core.db.lock().await;
        match db.update_client(
            id,
            &ClientPatch {
                status: Some(status),
                ..Default::default()
            },
        ) {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound) => Err(ServerError::ClientNotFound(id.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a client and everything it owns.  A live session receives a
    /// final notice frame before its socket closes.
    pub async fn remove_client(&self, id: &ClientId) -> Result<()> {
        let notified = self
            .core
            .registry
            .force_close(
                id,
                Message::ClientRemoved {
                    message: "Your account has been removed".to_string(),
                },
            )
            .await;

        match self.core.db.lock().await.delete_client_cascading(id) {
            Ok(()) => {}
            Err(StoreError::NotFound) => return Err(ServerError::ClientNotFound(id.clone())),
            Err(e) => return Err(e.into()),
        }

        if notified {
            self.core.emit(ServerEvent::ClientDisconnected(id.clone()));
        }
        info!(client = %id, notified, "client removed");
        Ok(())
    }

    pub async fn clients(&self, active_only: bool) -> Result<Vec<ClientIdentity>> {
        Ok(self.core.db.lock().await.all_clients(active_only)?)
    }

    pub async fn client_tasks(&self, id: &ClientId) -> Result<Vec<Task>> {
        Ok(self.core.db.lock().await.client_tasks(id)?)
    }

    pub async fn all_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.core.db.lock().await.all_tasks()?)
    }

    pub async fn connected_clients(&self) -> Vec<ClientId> {
        self.core.registry.connected_clients().await
    }

    /// Schedule a reminder for an existing task.
    pub async fn add_reminder(
        &self,
        task_id: TaskId,
        remind_at: DateTime<Utc>,
    ) -> Result<ReminderId> {
        let db = self.core.db.lock().await;
        if db.get_task(task_id)?.is_none() {
            return Err(ServerError::TaskNotFound(task_id));
        }
        Ok(db.add_reminder(task_id, remind_at)?)
    }

    /// Run one reminder sweep immediately, outside the scheduler's cadence.
    /// Returns the number of reminders dispatched.
    pub async fn run_reminder_pass(&self) -> Result<usize> {
        scheduler::run_pass(&self.core).await
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("listen_addr", &self.core.config.listen_addr)
            .finish()
    }
}
