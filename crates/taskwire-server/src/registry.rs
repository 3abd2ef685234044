//! Live connection tracking.
//!
//! The registry is the only structure mutated by multiple connection workers
//! concurrently; every other piece of server state is owned by the worker that
//! created it or by the store.  It maps a client id to the send handle of its
//! active session.  A reconnect supersedes the previous session: the stale
//! entry is replaced and its session cancelled, and the stale session's own
//! cleanup is ignored via a registration serial.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use taskwire_shared::types::ClientId;
use taskwire_shared::Message;

struct SessionHandle {
    outbound: mpsc::UnboundedSender<Message>,
    cancel: CancellationToken,
    serial: u64,
}

/// Process-wide map of connected clients.
pub struct Registry {
    sessions: Mutex<HashMap<ClientId, SessionHandle>>,
    next_serial: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_serial: AtomicU64::new(1),
        }
    }

    /// Register a session, superseding any prior session for the same client.
    ///
    /// Returns the serial the session must present to [`Registry::unregister`]
    /// so that a superseded session cannot evict its replacement.
    pub async fn register(
        &self,
        id: &ClientId,
        outbound: mpsc::UnboundedSender<Message>,
        cancel: CancellationToken,
    ) -> u64 {
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let handle = SessionHandle {
            outbound,
            cancel,
            serial,
        };

        let mut sessions = self.sessions.lock().await;
        if let Some(stale) = sessions.insert(id.clone(), handle) {
            debug!(client = %id, "reconnect supersedes prior session");
            stale.cancel.cancel();
        }
        serial
    }

    /// Remove a session.  A no-op when the entry was already superseded or
    /// removed, so session cleanup is idempotent.
    pub async fn unregister(&self, id: &ClientId, serial: u64) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(id) {
            Some(handle) if handle.serial == serial => {
                sessions.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Queue a message for one client.  Returns `false` when the client is not
    /// currently connected; callers must treat that as expected, not an error.
    pub async fn send(&self, id: &ClientId, message: Message) -> bool {
        let sessions = self.sessions.lock().await;
        match sessions.get(id) {
            Some(handle) => handle.outbound.send(message).is_ok(),
            None => false,
        }
    }

    /// Queue a message for every connected client; returns how many accepted
    /// it.
    pub async fn broadcast(&self, message: Message) -> usize {
        let sessions = self.sessions.lock().await;
        sessions
            .values()
            .filter(|handle| handle.outbound.send(message.clone()).is_ok())
            .count()
    }

    /// Deliver one final frame to a client and tear its session down.
    ///
    /// Used for administrative removal: the frame is queued before the entry
    /// is dropped, so the writer drains it before the socket closes.
    pub async fn force_close(&self, id: &ClientId, final_message: Message) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.remove(id) {
            Some(handle) => {
                let _ = handle.outbound.send(final_message);
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Queue a message to every client and tear all sessions down.  Used at
    /// server shutdown.
    pub async fn drain(&self, final_message: Message) -> usize {
        let mut sessions = self.sessions.lock().await;
        let count = sessions.len();
        for (_, handle) in sessions.drain() {
            let _ = handle.outbound.send(final_message.clone());
            handle.cancel.cancel();
        }
        count
    }

    pub async fn is_connected(&self, id: &ClientId) -> bool {
        self.sessions.lock().await.contains_key(id)
    }

    pub async fn connected_clients(&self) -> Vec<ClientId> {
        let sessions = self.sessions.lock().await;
        let mut ids: Vec<ClientId> = sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskwire_shared::types::NotificationId;

    fn note(text: &str) -> Message {
        Message::Notification {
            notification_id: NotificationId(1),
            message: text.to_string(),
        }
    }

    #[tokio::test]
    async fn send_to_unknown_client_is_false() {
        let registry = Registry::new();
        assert!(!registry.send(&ClientId::new("c1"), note("hi")).await);
    }

    #[tokio::test]
    async fn register_send_unregister() {
        let registry = Registry::new();
        let id = ClientId::new("c1");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let serial = registry.register(&id, tx, CancellationToken::new()).await;
        assert!(registry.is_connected(&id).await);
        assert!(registry.send(&id, note("hi")).await);
        assert_eq!(rx.recv().await.unwrap(), note("hi"));

        assert!(registry.unregister(&id, serial).await);
        assert!(!registry.is_connected(&id).await);
        assert!(!registry.send(&id, note("hi")).await);
    }

    #[tokio::test]
    async fn reconnect_supersedes_and_stale_cleanup_is_ignored() {
        let registry = Registry::new();
        let id = ClientId::new("c1");

        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        let old_cancel = CancellationToken::new();
        let old_serial = registry.register(&id, old_tx, old_cancel.clone()).await;

        let (new_tx, mut new_rx) = mpsc::unbounded_channel();
        let new_serial = registry
            .register(&id, new_tx, CancellationToken::new())
            .await;

        // The superseded session is cancelled and its cleanup must not evict
        // the replacement.
        assert!(old_cancel.is_cancelled());
        assert!(!registry.unregister(&id, old_serial).await);
        assert!(registry.is_connected(&id).await);

        // Messages land on the new connection only.
        assert!(registry.send(&id, note("fresh")).await);
        assert_eq!(new_rx.recv().await.unwrap(), note("fresh"));

        assert!(registry.unregister(&id, new_serial).await);
    }

    #[tokio::test]
    async fn broadcast_counts_connected_clients() {
        let registry = Registry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry
            .register(&ClientId::new("a"), tx1, CancellationToken::new())
            .await;
        registry
            .register(&ClientId::new("b"), tx2, CancellationToken::new())
            .await;

        let delivered = registry.broadcast(note("all")).await;
        assert_eq!(delivered, 2);
        assert_eq!(rx1.recv().await.unwrap(), note("all"));
        assert_eq!(rx2.recv().await.unwrap(), note("all"));
    }

    #[tokio::test]
    async fn force_close_queues_final_frame_then_cancels() {
        let registry = Registry::new();
        let id = ClientId::new("c1");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        registry.register(&id, tx, cancel.clone()).await;

        let removed = Message::ClientRemoved {
            message: "account removed".into(),
        };
        assert!(registry.force_close(&id, removed.clone()).await);
        assert!(cancel.is_cancelled());
        assert!(!registry.is_connected(&id).await);
        assert_eq!(rx.recv().await.unwrap(), removed);

        assert!(!registry.force_close(&id, removed).await);
    }
}
