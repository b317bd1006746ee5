//! Hub-backed mailbox client

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::BufReader;
use tokio::net::UnixStream;
use tracing::debug;

use super::messages::{MailboxReply, MailboxRequest};
use super::{read_frame, write_frame};
use crate::mailbox::{Channel, Mailbox, MailboxError};

/// Default timeout for one hub round trip
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// One channel of a hub, used like a local mailbox
#[derive(Debug, Clone)]
pub struct RemoteMailbox {
    socket_path: PathBuf,
    channel: Channel,
    timeout: Duration,
}

impl RemoteMailbox {
    pub fn new(socket_path: impl Into<PathBuf>, channel: Channel) -> Self {
        Self {
            socket_path: socket_path.into(),
            channel,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Command and response mailboxes of the hub at `socket_path`
    pub fn pair(socket_path: &Path) -> (Self, Self) {
        (
            Self::new(socket_path, Channel::Command),
            Self::new(socket_path, Channel::Response),
        )
    }

    /// Set a custom round-trip timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Check the hub is alive; returns its version
    pub async fn ping(&self) -> Result<String, MailboxError> {
        match self.request(MailboxRequest::Ping, Some(self.timeout)).await? {
            MailboxReply::Pong { version } => Ok(version),
            other => Err(unexpected(&other)),
        }
    }

    /// Send one request; `deadline` bounds the whole round trip
    async fn request(&self, request: MailboxRequest, deadline: Option<Duration>) -> Result<MailboxReply, MailboxError> {
        debug!(socket_path = ?self.socket_path, ?request, "RemoteMailbox::request: called");
        let round_trip = self.round_trip(request);
        let reply = match deadline {
            Some(limit) => tokio::time::timeout(limit, round_trip)
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "Mailbox hub request timed out"))??,
            None => round_trip.await?,
        };

        match reply {
            MailboxReply::Error { message } => Err(MailboxError::Hub(message)),
            reply => Ok(reply),
        }
    }

    async fn round_trip(&self, request: MailboxRequest) -> Result<MailboxReply, MailboxError> {
        let stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "Connection to mailbox hub timed out"))??;

        let (read_half, mut write_half) = stream.into_split();
        write_frame(&mut write_half, &request).await?;

        let mut reader = BufReader::new(read_half);
        read_frame(&mut reader).await?.ok_or(MailboxError::Closed)
    }

    fn number(&self) -> u8 {
        self.channel.number()
    }
}

fn unexpected(reply: &MailboxReply) -> MailboxError {
    MailboxError::Hub(format!("Unexpected reply: {:?}", reply))
}

#[async_trait]
impl Mailbox for RemoteMailbox {
    async fn write(&self, value: String) -> Result<(), MailboxError> {
        let request = MailboxRequest::Write {
            channel: self.number(),
            value,
        };
        match self.request(request, Some(self.timeout)).await? {
            MailboxReply::Ok => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    async fn try_write(&self, value: String) -> Result<bool, MailboxError> {
        let request = MailboxRequest::TryWrite {
            channel: self.number(),
            value,
        };
        match self.request(request, Some(self.timeout)).await? {
            MailboxReply::Written { accepted } => Ok(accepted),
            other => Err(unexpected(&other)),
        }
    }

    async fn peek(&self) -> Result<String, MailboxError> {
        let request = MailboxRequest::Peek { channel: self.number() };
        match self.request(request, Some(self.timeout)).await? {
            MailboxReply::Value { data } => Ok(data),
            other => Err(unexpected(&other)),
        }
    }

    async fn read(&self) -> Result<String, MailboxError> {
        let request = MailboxRequest::Read { channel: self.number() };
        match self.request(request, Some(self.timeout)).await? {
            MailboxReply::Value { data } => Ok(data),
            other => Err(unexpected(&other)),
        }
    }

    async fn clear(&self) -> Result<(), MailboxError> {
        let request = MailboxRequest::Clear { channel: self.number() };
        match self.request(request, Some(self.timeout)).await? {
            MailboxReply::Ok => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    async fn is_empty(&self) -> Result<bool, MailboxError> {
        let request = MailboxRequest::IsEmpty { channel: self.number() };
        match self.request(request, Some(self.timeout)).await? {
            MailboxReply::Empty { empty } => Ok(empty),
            other => Err(unexpected(&other)),
        }
    }

    /// Long-poll: no round-trip timeout, callers bound it themselves
    async fn await_write(&self) -> Result<(), MailboxError> {
        let request = MailboxRequest::AwaitWrite { channel: self.number() };
        match self.request(request, None).await? {
            MailboxReply::Ok => Ok(()),
            other => Err(unexpected(&other)),
        }
    }
}
