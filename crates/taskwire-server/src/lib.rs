//! # taskwire-server
//!
//! Task distribution server: accepts persistent client connections, validates
//! identities, pushes task assignments and notifications as they happen, and
//! resynchronizes clients on reconnect.
//!
//! The library exposes [`Server`] so operator frontends and integration tests
//! can drive the same surface the binary does.

pub mod config;
pub mod dispatch;
pub mod events;
pub mod registry;
pub mod sync;

mod error;
mod scheduler;
mod server;
mod session;

pub use config::{IdentityPolicy, ServerConfig};
pub use dispatch::NotificationDispatcher;
pub use error::{Result, ServerError};
pub use events::ServerEvent;
pub use server::Server;
pub use sync::TaskSynchronizer;
