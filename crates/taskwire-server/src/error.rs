use thiserror::Error;

use taskwire_shared::types::{ClientId, TaskId};
use taskwire_store::StoreError;

/// Errors surfaced by server operations.
///
/// Domain errors (`ClientNotFound`, `TaskNotFound`) are reported to the
/// administrative caller and leave connections open.  Wire-level failures
/// never surface here; each session consumes them and closes its own
/// connection.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown client: {0}")]
    ClientNotFound(ClientId),

    #[error("Unknown task: {0}")]
    TaskNotFound(TaskId),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
