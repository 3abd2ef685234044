//! Change events emitted for administrative presentation layers.
//!
//! Dashboards subscribe via [`crate::Server::subscribe_events`] and decide
//! their own refresh cadence; the core never calls into presentation code.

use taskwire_shared::types::ClientId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A client completed the handshake and is registered.
    ClientConnected(ClientId),
    /// A client's session closed.
    ClientDisconnected(ClientId),
    /// A task was assigned, updated, or deleted.
    TasksChanged,
    /// One or more notification rows were persisted.
    NotificationStored,
}
