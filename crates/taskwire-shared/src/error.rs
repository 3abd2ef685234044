use thiserror::Error;

/// Errors produced while encoding or decoding wire frames.
///
/// Every variant except `Io` is fatal to the connection that produced it: a
/// peer that sends a malformed frame is never retried on the same socket.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("frame length {len} exceeds maximum {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("malformed frame payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
