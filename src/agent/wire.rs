//! Length-prefixed framing of agent messages

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{AgentError, YkagentResult};

/// Largest message body accepted from a client
pub const MAX_MESSAGE_SIZE: usize = 256 * 1024;

/// Read one message body. `Ok(None)` means the client hung up between
/// messages; hanging up inside the length header is a protocol error.
pub async fn read_frame<R>(stream: &mut R) -> YkagentResult<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = stream.read(&mut len_buf[filled..]).await.map_err(io_error)?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(AgentError::Protocol {
                reason: format!("connection closed after {filled} of 4 length bytes"),
            }
            .into());
        }
        filled += n;
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 || len > MAX_MESSAGE_SIZE {
        return Err(AgentError::Protocol {
            reason: format!("invalid message length {len}"),
        }
        .into());
    }

    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await.map_err(io_error)?;
    Ok(Some(body))
}

pub async fn write_frame<W>(stream: &mut W, body: &[u8]) -> YkagentResult<()>
where
    W: AsyncWrite + Unpin,
{
    let len = (body.len() as u32).to_be_bytes();
    stream.write_all(&len).await.map_err(io_error)?;
    stream.write_all(body).await.map_err(io_error)?;
    stream.flush().await.map_err(io_error)?;
    Ok(())
}

fn io_error(err: std::io::Error) -> crate::YkagentError {
    AgentError::Protocol {
        reason: err.to_string(),
    }
    .into()
}
