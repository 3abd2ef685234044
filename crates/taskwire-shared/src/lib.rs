//! # taskwire-shared
//!
//! Types shared between the taskwire server and client: the domain model
//! (clients, tasks, notifications, reminders), the wire protocol messages, and
//! the length-prefixed frame codec used over TCP.

pub mod constants;
pub mod frame;
pub mod model;
pub mod protocol;
pub mod types;

mod error;

pub use error::ProtocolError;
pub use protocol::Message;
