//! Protocol error kinds

use thiserror::Error;

use crate::mailbox::MailboxError;
use crate::protocol::ActionParseError;

/// Errors surfaced by the command/response protocol
///
/// Malformed payloads and timeouts are not errors: the first are dropped and
/// logged, the second come back as an empty result.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("{0}")]
    UnknownAction(#[from] ActionParseError),

    #[error("Invalid target \"{0}\"")]
    InvalidTarget(String),

    /// The response slot was reported non-empty but read back empty:
    /// another process is draining the same mailbox.
    #[error("Another instance is already reading the responses from the response mailbox")]
    ResponseDrained,

    /// A response for a different in-flight command showed up.
    #[error("Response mailbox contains response for command {found} instead of {expected}")]
    CrossTalk { expected: String, found: String },

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Registry error: {0}")]
    Registry(String),
}

impl ProtocolError {
    /// Bad operator input, detected before anything was sent
    pub fn is_operator_error(&self) -> bool {
        matches!(self, ProtocolError::UnknownAction(_) | ProtocolError::InvalidTarget(_))
    }

    /// Two collectors are sharing the response mailbox
    pub fn is_contention(&self) -> bool {
        matches!(self, ProtocolError::ResponseDrained | ProtocolError::CrossTalk { .. })
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        if self.is_operator_error() {
            2
        } else if self.is_contention() {
            3
        } else {
            1
        }
    }
}

impl From<eyre::Report> for ProtocolError {
    fn from(report: eyre::Report) -> Self {
        ProtocolError::Registry(format!("{:#}", report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let operator = ProtocolError::UnknownAction(ActionParseError("boom".to_string()));
        assert!(operator.is_operator_error());
        assert!(!operator.is_contention());
        assert_eq!(operator.exit_code(), 2);

        let drained = ProtocolError::ResponseDrained;
        assert!(drained.is_contention());
        assert_eq!(drained.exit_code(), 3);

        let cross = ProtocolError::CrossTalk {
            expected: "a".to_string(),
            found: "b".to_string(),
        };
        assert!(cross.is_contention());
        assert_eq!(cross.exit_code(), 3);

        assert_eq!(ProtocolError::Mailbox(MailboxError::Closed).exit_code(), 1);
        assert_eq!(ProtocolError::Registry("disk".to_string()).exit_code(), 1);
    }

    #[test]
    fn test_messages() {
        let err = ProtocolError::from(ActionParseError("boom".to_string()));
        assert_eq!(err.to_string(), "Unknown action \"boom\"");

        let cross = ProtocolError::CrossTalk {
            expected: "want".to_string(),
            found: "got".to_string(),
        };
        assert!(cross.to_string().contains("got instead of want"));
    }
}
