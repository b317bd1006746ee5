//! Coordinator side of the protocol
//!
//! The coordinator writes one command into the command mailbox and then
//! collects correlated answers from the response mailbox:
//! - **Single target:** one bounded wait for the addressed worker's answer
//! - **Broadcast:** answers are gathered until a fixed window closes, or
//!   earlier once every previously known worker has answered

mod core;
mod outcome;

pub use core::Coordinator;
pub use outcome::{BroadcastReport, Outcome};
