//! Mailboxes shared between processes
//!
//! A hub process (`bn hub`) owns the command and response mailboxes and
//! serves them over a Unix domain socket. Workers and coordinators reach them
//! through [`RemoteMailbox`].
//!
//! Newline-delimited JSON, one request and one reply per connection. An
//! `AwaitWrite` request keeps its connection open until the next write.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::mailbox::MailboxError;

pub mod client;
pub mod hub;
pub mod messages;

pub use client::RemoteMailbox;
pub use hub::{MailboxHub, cleanup_socket, create_listener_at};
pub use messages::{MailboxReply, MailboxRequest};

/// Largest accepted line, newline included
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Read one JSON line; `None` when the peer closed without sending anything
pub(crate) async fn read_frame<T, R>(reader: &mut R) -> Result<Option<T>, MailboxError>
where
    T: DeserializeOwned,
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let bytes_read = reader
        .take(MAX_MESSAGE_SIZE as u64 + 1)
        .read_line(&mut line)
        .await?;

    if bytes_read == 0 {
        return Ok(None);
    }
    if bytes_read > MAX_MESSAGE_SIZE {
        return Err(MailboxError::TooLarge(bytes_read));
    }

    Ok(Some(serde_json::from_str(line.trim())?))
}

/// Write one JSON line and flush
pub(crate) async fn write_frame<T, W>(writer: &mut W, message: &T) -> Result<(), MailboxError>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let mut json = serde_json::to_string(message)?;
    json.push('\n');
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(MailboxError::TooLarge(json.len()));
    }

    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_frame_over_limit_is_rejected() {
        let big = MailboxRequest::Write {
            channel: 1,
            value: "x".repeat(MAX_MESSAGE_SIZE),
        };
        let mut sink = Vec::new();
        let err = write_frame(&mut sink, &big).await.unwrap_err();
        assert!(matches!(err, MailboxError::TooLarge(_)));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_incoming_line_is_rejected() {
        let line = format!("{}\n", "y".repeat(MAX_MESSAGE_SIZE + 10));
        let mut reader = BufReader::new(line.as_bytes());
        let err = read_frame::<MailboxRequest, _>(&mut reader).await.unwrap_err();
        assert!(matches!(err, MailboxError::TooLarge(_)));
    }

    #[tokio::test]
    async fn test_closed_peer_reads_none() {
        let mut reader = BufReader::new(&b""[..]);
        let frame = read_frame::<MailboxRequest, _>(&mut reader).await.unwrap();
        assert!(frame.is_none());
    }
}
