//! Message model shared by the coordinator and the workers
//!
//! Both records travel over the mailboxes as flat JSON objects. Field names
//! on the wire are camelCase (`botId`, `commandId`).

mod action;
mod messages;

pub use action::{Action, ActionParseError};
pub use messages::{BROADCAST_TARGET, Command, Response, Target, now_millis};
