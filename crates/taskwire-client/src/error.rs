use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// No client id was configured and none is stored from a prior login.
    #[error("No client identity configured")]
    MissingIdentity,

    #[error("Could not determine platform config directory")]
    NoConfigDir,

    #[error("Identity file error: {0}")]
    IdentityFile(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
