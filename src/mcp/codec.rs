//! Line codec for the MCP stdio transport.
//!
//! Frame format: one JSON-RPC message per line, UTF-8, terminated by `\n`
//! (a trailing `\r` is tolerated). Lines longer than the configured cap are
//! drained and reported as [`Frame::Oversized`] so the stream stays in sync.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// One line read from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Line content without its terminator.
    Message(Vec<u8>),
    /// A line exceeded the cap; carries its full length.
    Oversized(usize),
}

/// Read one line. Returns `None` on clean EOF.
pub async fn read_frame<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    max_frame_bytes: usize,
) -> std::io::Result<Option<Frame>> {
    let mut line = Vec::new();
    let mut length = 0usize;
    let mut oversized = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if length == 0 {
                return Ok(None);
            }
            break;
        }

        let newline = available.iter().position(|b| *b == b'\n');
        let chunk = &available[..newline.unwrap_or(available.len())];
        length += chunk.len();
        if !oversized {
            if line.len() + chunk.len() > max_frame_bytes {
                oversized = true;
                line = Vec::new();
            } else {
                line.extend_from_slice(chunk);
            }
        }

        let consumed = chunk.len() + usize::from(newline.is_some());
        reader.consume(consumed);
        if newline.is_some() {
            break;
        }
    }

    if oversized {
        return Ok(Some(Frame::Oversized(length)));
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(Some(Frame::Message(line)))
}

/// Write one message as a single line.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, message: &Value) -> std::io::Result<()> {
    let mut payload = serde_json::to_vec(message)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    payload.push(b'\n');
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}
