//! # taskwire-client
//!
//! Headless client agent for the taskwire protocol.  It logs in with a stored
//! or configured identity, mirrors the server's task list in memory, applies
//! live pushes as they arrive, and reconnects with a fixed delay whenever the
//! connection drops.  Frontends drive it through [`AgentHandle`] and consume
//! [`ClientEvent`]s.

pub mod agent;
pub mod cache;
pub mod config;
pub mod events;
pub mod identity;

mod error;

pub use agent::{Agent, AgentCommand, AgentHandle};
pub use cache::TaskCache;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use events::ClientEvent;
pub use identity::IdentityStore;
