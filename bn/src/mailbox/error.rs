//! Mailbox transport errors

use thiserror::Error;

/// Errors from mailbox operations
///
/// An in-process mailbox never fails; these come from the hub transport.
#[derive(Debug, Error)]
pub enum MailboxError {
    #[error("Mailbox hub unreachable: {0}")]
    Unreachable(#[from] std::io::Error),

    #[error("Mailbox message encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Mailbox message too large: {0} bytes")]
    TooLarge(usize),

    #[error("Unknown channel {0}")]
    UnknownChannel(u8),

    #[error("Mailbox hub error: {0}")]
    Hub(String),

    #[error("Mailbox closed")]
    Closed,
}
