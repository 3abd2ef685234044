//! # taskwire-store
//!
//! SQLite persistence for the taskwire server: registered clients, their
//! tasks, notifications, and reminders.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model. The server serializes access behind its own lock; no connection
//! pooling is needed.

pub mod clients;
pub mod database;
pub mod migrations;
pub mod notifications;
pub mod reminders;
pub mod tasks;

mod error;

pub use clients::ClientPatch;
pub use database::Database;
pub use error::StoreError;
pub use tasks::TaskPatch;
