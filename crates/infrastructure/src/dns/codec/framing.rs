use super::message::DNS_HEADER_LEN;
use dotline_domain::DomainError;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest message a 2-byte length prefix can describe.
pub const MAX_MESSAGE_SIZE: usize = 65535;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("frame of {0} bytes is shorter than a DNS header")]
    TooShort(usize),

    #[error("frame of {len} bytes exceeds limit of {max}")]
    TooLarge { len: usize, max: usize },
}

impl FrameError {
    /// Any frame error leaves the stream unusable.
    pub fn into_connection_lost(self, server: &str) -> DomainError {
        DomainError::ConnectionLost {
            server: server.to_string(),
            reason: self.to_string(),
        }
    }
}

/// Prefix `message_bytes` with its big-endian length.
pub fn encode_frame(message_bytes: &[u8]) -> Result<Vec<u8>, DomainError> {
    let length = u16::try_from(message_bytes.len()).map_err(|_| {
        DomainError::Framing(format!(
            "Message too large: {} bytes (max {})",
            message_bytes.len(),
            MAX_MESSAGE_SIZE
        ))
    })?;

    let mut frame = Vec::with_capacity(2 + message_bytes.len());
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(message_bytes);
    Ok(frame)
}

pub async fn write_frame<S>(stream: &mut S, message_bytes: &[u8]) -> Result<(), FrameError>
where
    S: AsyncWrite + Unpin,
{
    let frame = encode_frame(message_bytes).map_err(|_| FrameError::TooLarge {
        len: message_bytes.len(),
        max: MAX_MESSAGE_SIZE,
    })?;
    stream.write_all(&frame).await?;
    stream.flush().await?;
    Ok(())
}

pub async fn read_frame<S>(stream: &mut S) -> Result<Vec<u8>, FrameError>
where
    S: AsyncRead + Unpin,
{
    read_frame_with_limit(stream, MAX_MESSAGE_SIZE).await
}

/// Read one length-prefixed message, refusing bodies larger than `max_len`.
pub async fn read_frame_with_limit<S>(stream: &mut S, max_len: usize) -> Result<Vec<u8>, FrameError>
where
    S: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;

    let len = u16::from_be_bytes(len_buf) as usize;
    if len < DNS_HEADER_LEN {
        return Err(FrameError::TooShort(len));
    }
    if len > max_len {
        return Err(FrameError::TooLarge { len, max: max_len });
    }

    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    Ok(body)
}
