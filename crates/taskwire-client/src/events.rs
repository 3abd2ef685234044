//! Events the agent emits for a presentation layer (TUI, tray, logs).
//!
//! The agent pushes these onto an unbounded channel; a frontend consumes them
//! at its own pace and queries the shared [`crate::TaskCache`] for full state.

use taskwire_shared::model::Task;
use taskwire_shared::types::{NotificationId, TaskId};

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Handshake succeeded; the server knows us as `name`.
    Connected { name: Option<String> },

    /// The connection dropped; the agent will retry after its backoff delay.
    Disconnected,

    /// The cache was replaced by a connect-time resync.
    TaskListReplaced(Vec<Task>),

    /// A task was assigned while connected.
    TaskAssigned(Task),

    /// A task changed; carries its full new state.
    TaskUpdated(Task),

    /// A task was deleted.
    TaskRemoved(TaskId),

    /// A notification arrived.  The agent has already acknowledged nothing;
    /// the frontend decides when to send the read receipt.
    NotificationReceived {
        id: NotificationId,
        message: String,
    },

    /// The server refused the login and the agent stopped.  An unregistered
    /// id (strict policy) also discards the stored identity; a deactivated
    /// account keeps it for when an operator reactivates us.
    IdentityRejected { message: Option<String> },

    /// Our account was removed mid-session.  The stored identity is discarded
    /// and the agent stops.
    AccountRemoved { message: String },

    /// The server announced a shutdown; the agent delays and then resumes
    /// its reconnect loop.
    ServerShutdown { message: String },

    /// The agent exited its supervision loop and will make no further
    /// attempts.
    Stopped,
}
