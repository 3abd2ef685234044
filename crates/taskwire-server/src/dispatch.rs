//! Notification dispatch: persistence, live delivery, connect-time sweep, and
//! read acknowledgements.
//!
//! Delivery is at-least-once: a notification can be pushed twice only when the
//! connection drops between the push and persisting the Sent status, in which
//! case the connect-time sweep repeats it.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use taskwire_shared::types::{ClientId, NotificationId, NotificationTarget};
use taskwire_shared::Message;

use crate::error::{Result, ServerError};
use crate::events::ServerEvent;
use crate::server::Core;

/// Persists notifications and pushes them to connected clients.
#[derive(Clone)]
pub struct NotificationDispatcher {
    core: Arc<Core>,
}

impl NotificationDispatcher {
    pub(crate) fn new(core: Arc<Core>) -> Self {
        Self { core }
    }

    /// Persist a notification for the target and attempt live delivery.
    ///
    /// A broadcast fans out into one Pending row per currently-Active client,
    /// connected or not; offline clients receive theirs at the next connect.
    /// Returns the number of rows created.
    pub async fn send(&self, target: &NotificationTarget, message: &str) -> Result<usize> {
        let rows = {
            let db = self.core.db.lock().await;
            let recipients = match target {
                NotificationTarget::All => db
                    .all_clients(true)?
                    .into_iter()
                    .map(|c| c.id)
                    .collect::<Vec<_>>(),
                NotificationTarget::Client(id) => {
                    if db.get_client(id)?.is_none() {
                        return Err(ServerError::ClientNotFound(id.clone()));
                    }
                    vec![id.clone()]
                }
            };

            let mut rows = Vec::with_capacity(recipients.len());
            for client_id in recipients {
                let id = db.add_notification(&client_id, message)?;
                rows.push((id, client_id));
            }
            rows
        };

        let created = rows.len();
        self.core.emit(ServerEvent::NotificationStored);

        for (id, client_id) in rows {
            let delivered = self
                .core
                .registry
                .send(
                    &client_id,
                    Message::Notification {
                        notification_id: id,
                        message: message.to_string(),
                    },
                )
                .await;
            if delivered {
                // The row is already persisted; a failed Sent transition
                // leaves it Pending, and the connect-time sweep repeats it.
                if let Err(e) = self.core.db.lock().await.mark_notification_sent(id) {
                    warn!(notification = %id, client = %client_id, error = %e, "failed to mark notification sent");
                }
            }
        }

        debug!(created, "notification dispatched");
        Ok(created)
    }

    /// Record a client's read acknowledgement.
    ///
    /// A stale or foreign id is logged and ignored; the connection stays open.
    pub async fn acknowledge_read(&self, client_id: &ClientId, id: NotificationId) -> Result<()> {
        let updated = self
            .core
            .db
            .lock()
            .await
            .mark_notification_read(client_id, id)?;
        if !updated {
            warn!(client = %client_id, notification = %id, "ignoring stale read acknowledgement");
        }
        Ok(())
    }

    /// Push every Pending notification for `client_id` down the session's
    /// outbound queue, marking each Sent.
    ///
    /// Invoked exactly once per connection, at Established, before the session
    /// is registered for live pushes, so the sweep is ordered strictly before
    /// any subsequent live delivery.
    pub(crate) async fn deliver_pending(
        &self,
        client_id: &ClientId,
        outbound: &mpsc::UnboundedSender<Message>,
    ) -> Result<usize> {
        let pending = self.core.db.lock().await.pending_notifications(client_id)?;
        let mut delivered = 0;

        for notification in pending {
            let queued = outbound
                .send(Message::Notification {
                    notification_id: notification.id,
                    message: notification.message.clone(),
                })
                .is_ok();
            if !queued {
                break;
            }
            self.core
                .db
                .lock()
                .await
                .mark_notification_sent(notification.id)?;
            delivered += 1;
        }

        debug!(client = %client_id, delivered, "pending notification sweep");
        Ok(delivered)
    }
}
