//! Length-prefixed frame codec.
//!
//! Wire format: a 4-byte big-endian unsigned length prefix followed by exactly
//! that many bytes of UTF-8 JSON encoding one [`Message`]. The codec never
//! resynchronizes: a malformed payload or an oversized prefix is fatal to the
//! connection that produced it.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::MAX_FRAME_LEN;
use crate::error::ProtocolError;
use crate::protocol::Message;

/// Encode `message` and write it as one frame, flushing the writer.
pub async fn write_frame<W>(writer: &mut W, message: &Message) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let prefix = (payload.len() as u32).to_be_bytes();
    writer.write_all(&prefix).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame, blocking until the full prefix and payload are available.
///
/// Returns `Ok(None)` when the peer closed the stream, whether cleanly between
/// frames or mid-read. A prefix larger than [`MAX_FRAME_LEN`] or an
/// unparseable payload is a [`ProtocolError`]; callers must treat it as fatal
/// to the connection.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Message>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    if read_exact_or_eof(reader, &mut prefix).await? {
        return Ok(None);
    }

    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut payload = vec![0u8; len];
    if read_exact_or_eof(reader, &mut payload).await? {
        return Ok(None);
    }

    let message = serde_json::from_slice(&payload)?;
    Ok(Some(message))
}

/// Fill `buf` completely; `Ok(true)` means the peer closed before it could be
/// satisfied.
async fn read_exact_or_eof<R>(reader: &mut R, buf: &mut [u8]) -> Result<bool, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(true),
        Err(e) => Err(ProtocolError::Io(e)),
    }
}
