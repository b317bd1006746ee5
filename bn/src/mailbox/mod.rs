//! Single-slot mailboxes
//!
//! A mailbox holds at most one value. Writing replaces whatever is there,
//! read or not. An empty slot reads back as [`EMPTY_SENTINEL`], a string that
//! can never be a valid serialized message, so callers can tell "nothing
//! queued" apart from real content.
//!
//! Two implementations share the [`Mailbox`] trait:
//! - [`MemoryMailbox`] - in-process, backed by a mutex and a watch channel
//! - [`crate::ipc::RemoteMailbox`] - a mailbox owned by a hub process, reached
//!   over a Unix domain socket

mod error;
mod memory;

use async_trait::async_trait;

pub use error::MailboxError;
pub use memory::MemoryMailbox;

/// Content of an empty mailbox
pub const EMPTY_SENTINEL: &str = "NULL PORT DATA";

/// Well-known mailbox channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Coordinator -> workers
    Command = 1,
    /// Workers -> coordinator
    Response = 2,
}

impl Channel {
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Channel::Command),
            2 => Some(Channel::Response),
            _ => None,
        }
    }
}

/// Capacity-one shared slot
///
/// All operations are atomic with respect to each other, but nothing makes a
/// sequence of them atomic: `is_empty` followed by `peek` can observe another
/// reader's `read` in between.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Store `value`, discarding any unread content
    async fn write(&self, value: String) -> Result<(), MailboxError>;

    /// Store `value` only if the slot is empty; returns whether it was stored
    async fn try_write(&self, value: String) -> Result<bool, MailboxError>;

    /// Current content without removing it, or [`EMPTY_SENTINEL`]
    async fn peek(&self) -> Result<String, MailboxError>;

    /// Remove and return current content, or [`EMPTY_SENTINEL`]
    async fn read(&self) -> Result<String, MailboxError>;

    /// Reset the slot to empty
    async fn clear(&self) -> Result<(), MailboxError>;

    /// Whether the slot is empty
    async fn is_empty(&self) -> Result<bool, MailboxError>;

    /// Suspend until the next successful write after this call
    ///
    /// Does not return the written value; callers `peek` or `read` afterwards.
    async fn await_write(&self) -> Result<(), MailboxError>;
}

/// Whether raw mailbox content is the empty sentinel
pub fn is_sentinel(raw: &str) -> bool {
    raw == EMPTY_SENTINEL
}
