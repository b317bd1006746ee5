//! Mailbox hub: owns the shared mailboxes and serves them over a socket

use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::{Context, Result};
use tokio::io::{AsyncReadExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

use super::messages::{MailboxReply, MailboxRequest};
use super::{read_frame, write_frame};
use crate::mailbox::{Channel, Mailbox, MailboxError, MemoryMailbox};

/// Create and bind the hub socket
///
/// Creates the parent directory and removes a stale socket from an earlier run.
pub fn create_listener_at(socket_path: &Path) -> Result<(UnixListener, PathBuf)> {
    debug!(?socket_path, "create_listener_at: creating hub socket");

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    if socket_path.exists() {
        debug!(?socket_path, "create_listener_at: removing stale socket");
        std::fs::remove_file(socket_path).context("Failed to remove stale socket")?;
    }

    let listener = UnixListener::bind(socket_path).context("Failed to bind hub socket")?;
    Ok((listener, socket_path.to_path_buf()))
}

/// Remove the socket file on shutdown
pub fn cleanup_socket(socket_path: &Path) {
    if socket_path.exists() {
        debug!(?socket_path, "cleanup_socket: removing socket file");
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!(?socket_path, error = %e, "Failed to remove socket file");
        }
    }
}

/// Owner of the command and response mailboxes
#[derive(Default)]
pub struct MailboxHub {
    commands: Arc<MemoryMailbox>,
    responses: Arc<MemoryMailbox>,
}

impl MailboxHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mailbox(&self, channel: Channel) -> Arc<MemoryMailbox> {
        match channel {
            Channel::Command => self.commands.clone(),
            Channel::Response => self.responses.clone(),
        }
    }

    /// Accept connections until the listener fails
    pub async fn serve(self: Arc<Self>, listener: UnixListener) -> Result<()> {
        info!("Mailbox hub serving");
        loop {
            let (stream, _addr) = listener.accept().await.context("Failed to accept hub connection")?;
            debug!("MailboxHub::serve: connection accepted");
            let hub = self.clone();
            tokio::spawn(async move {
                if let Err(e) = hub.handle_connection(stream).await {
                    warn!(error = %e, "Hub connection error");
                }
            });
        }
    }

    async fn handle_connection(&self, stream: UnixStream) -> Result<(), MailboxError> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let request: MailboxRequest = match read_frame(&mut reader).await {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(e) => {
                let reply = MailboxReply::Error {
                    message: e.to_string(),
                };
                return write_frame(&mut write_half, &reply).await;
            }
        };
        debug!(?request, "MailboxHub::handle_connection: request");

        let reply = match request {
            MailboxRequest::AwaitWrite { channel } => match self.lookup(channel) {
                Ok(mailbox) => {
                    let mut probe = [0u8; 1];
                    tokio::select! {
                        result = mailbox.await_write() => reply_for(result.map(|()| MailboxReply::Ok)),
                        _ = reader.read(&mut probe) => {
                            debug!(channel, "MailboxHub: waiter went away");
                            return Ok(());
                        }
                    }
                }
                Err(e) => reply_for(Err(e)),
            },
            other => self.handle(other).await,
        };

        write_frame(&mut write_half, &reply).await
    }

    /// Apply one request and build its reply
    pub async fn handle(&self, request: MailboxRequest) -> MailboxReply {
        reply_for(self.apply(request).await)
    }

    async fn apply(&self, request: MailboxRequest) -> Result<MailboxReply, MailboxError> {
        match request {
            MailboxRequest::Write { channel, value } => {
                self.lookup(channel)?.write(value).await?;
                Ok(MailboxReply::Ok)
            }
            MailboxRequest::TryWrite { channel, value } => {
                let accepted = self.lookup(channel)?.try_write(value).await?;
                Ok(MailboxReply::Written { accepted })
            }
            MailboxRequest::Peek { channel } => {
                let data = self.lookup(channel)?.peek().await?;
                Ok(MailboxReply::Value { data })
            }
            MailboxRequest::Read { channel } => {
                let data = self.lookup(channel)?.read().await?;
                Ok(MailboxReply::Value { data })
            }
            MailboxRequest::Clear { channel } => {
                self.lookup(channel)?.clear().await?;
                Ok(MailboxReply::Ok)
            }
            MailboxRequest::IsEmpty { channel } => {
                let empty = self.lookup(channel)?.is_empty().await?;
                Ok(MailboxReply::Empty { empty })
            }
            MailboxRequest::AwaitWrite { channel } => {
                self.lookup(channel)?.await_write().await?;
                Ok(MailboxReply::Ok)
            }
            MailboxRequest::Ping => Ok(MailboxReply::Pong {
                version: env!("CARGO_PKG_VERSION").to_string(),
            }),
        }
    }

    fn lookup(&self, channel: u8) -> Result<Arc<MemoryMailbox>, MailboxError> {
        Channel::from_number(channel)
            .map(|channel| self.mailbox(channel))
            .ok_or(MailboxError::UnknownChannel(channel))
    }
}

fn reply_for(result: Result<MailboxReply, MailboxError>) -> MailboxReply {
    result.unwrap_or_else(|e| MailboxReply::Error { message: e.to_string() })
}
