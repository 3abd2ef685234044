//! Task synchronization: persist-then-propagate operations on tasks.
//!
//! Every operation writes to the store first and only then attempts a live
//! push, so a client that reconnects after missing a push always observes the
//! latest state via the Established full resync.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use taskwire_shared::model::Task;
use taskwire_shared::types::{ClientId, TaskId, TaskStatus};
use taskwire_shared::Message;
use taskwire_store::{StoreError, TaskPatch};

use crate::error::{Result, ServerError};
use crate::events::ServerEvent;
use crate::server::Core;

/// Applies task mutations against storage and pushes the resulting deltas to
/// connected owners.
#[derive(Clone)]
pub struct TaskSynchronizer {
    core: Arc<Core>,
}

impl TaskSynchronizer {
    pub(crate) fn new(core: Arc<Core>) -> Self {
        Self { core }
    }

    /// Create a Pending task for `client_id` and push it to the owner if
    /// connected.  Returns the full task including its server-assigned id.
    pub async fn assign(
        &self,
        client_id: &ClientId,
        title: &str,
        description: &str,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<Task> {
        let task = {
            let db = self.core.db.lock().await;
            if db.get_client(client_id)?.is_none() {
                return Err(ServerError::ClientNotFound(client_id.clone()));
            }
            let id = db.add_task(client_id, title, description, due_date)?;
            db.get_task(id)?.ok_or(StoreError::NotFound)?
        };

        let delivered = self
            .core
            .registry
            .send(client_id, Message::NewTask { task: task.clone() })
            .await;
        debug!(task = %task.id, client = %client_id, delivered, "task assigned");

        self.core.emit(ServerEvent::TasksChanged);
        Ok(task)
    }

    /// Apply a partial update and push the task's full current state to its
    /// owner if connected.
    pub async fn update(&self, task_id: TaskId, patch: &TaskPatch) -> Result<Task> {
        let task = self.persist_update(task_id, patch).await?;

        let delivered = self
            .core
            .registry
            .send(
                &task.client_id,
                Message::TaskUpdated { task: task.clone() },
            )
            .await;
        debug!(task = %task_id, delivered, "task updated");

        self.core.emit(ServerEvent::TasksChanged);
        Ok(task)
    }

    /// Delete a task (and its reminders) and notify the owner if connected.
    pub async fn delete(&self, task_id: TaskId) -> Result<()> {
        let owner = {
            let mut db = self.core.db.lock().await;
            let task = db
                .get_task(task_id)?
                .ok_or(ServerError::TaskNotFound(task_id))?;
            db.delete_task_cascading(task_id)?;
            task.client_id
        };

        let delivered = self
            .core
            .registry
            .send(&owner, Message::TaskRemoved { task_id })
            .await;
        debug!(task = %task_id, client = %owner, delivered, "task deleted");

        self.core.emit(ServerEvent::TasksChanged);
        Ok(())
    }

    /// Handle a status change reported by the owning client itself.
    ///
    /// Applies the same update path as [`TaskSynchronizer::update`] but does
    /// not echo a push back to the originating connection, which already holds
    /// the new value locally.
    pub async fn client_reported_status(
        &self,
        reporter: &ClientId,
        task_id: TaskId,
        status: TaskStatus,
    ) -> Result<()> {
        {
            let db = self.core.db.lock().await;
            let task = db
                .get_task(task_id)?
                .ok_or(ServerError::TaskNotFound(task_id))?;
            if task.client_id != *reporter {
                // A client may only mutate its own tasks.
                return Err(ServerError::TaskNotFound(task_id));
            }
            db.update_task(
                task_id,
                &TaskPatch {
                    status: Some(status),
                    ..Default::default()
                },
            )?;
        }

        debug!(task = %task_id, client = %reporter, status = status.as_str(), "client reported status");
        self.core.emit(ServerEvent::TasksChanged);
        Ok(())
    }

    async fn persist_update(&self, task_id: TaskId, patch: &TaskPatch) -> Result<Task> {
        let db = self.core.db.lock().await;
        match db.update_task(task_id, patch) {
            Ok(()) => {}
            Err(StoreError::NotFound) => return Err(ServerError::TaskNotFound(task_id)),
            Err(e) => return Err(e.into()),
        }
        Ok(db.get_task(task_id)?.ok_or(StoreError::NotFound)?)
    }
}
