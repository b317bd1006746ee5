//! Hub request and reply types
//!
//! Each message is a single line of JSON tagged by `type`.

use serde::{Deserialize, Serialize};

/// Requests from a mailbox client to the hub
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum MailboxRequest {
    Write { channel: u8, value: String },

    TryWrite { channel: u8, value: String },

    Peek { channel: u8 },

    Read { channel: u8 },

    Clear { channel: u8 },

    IsEmpty { channel: u8 },

    /// Held open until the next write on `channel`
    AwaitWrite { channel: u8 },

    /// Check the hub is alive
    Ping,
}

impl MailboxRequest {
    /// Channel the request addresses, if any
    pub fn channel(&self) -> Option<u8> {
        match self {
            MailboxRequest::Write { channel, .. }
            | MailboxRequest::TryWrite { channel, .. }
            | MailboxRequest::Peek { channel }
            | MailboxRequest::Read { channel }
            | MailboxRequest::Clear { channel }
            | MailboxRequest::IsEmpty { channel }
            | MailboxRequest::AwaitWrite { channel } => Some(*channel),
            MailboxRequest::Ping => None,
        }
    }
}

/// Replies from the hub
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum MailboxReply {
    /// Acknowledgment for `Write`, `Clear` and `AwaitWrite`
    Ok,

    /// Slot content for `Peek` and `Read`
    Value { data: String },

    /// Outcome of `TryWrite`
    Written { accepted: bool },

    /// Outcome of `IsEmpty`
    Empty { empty: bool },

    Pong { version: String },

    Error { message: String },
}
