//! Botnet - command and control over single-slot mailboxes
//!
//! One coordinator directs a dynamically discovered fleet of workers using
//! exactly two shared mailboxes, each holding at most one message: a command
//! mailbox (coordinator to workers) and a response mailbox (workers to
//! coordinator).
//!
//! # Core Concepts
//!
//! - **Correlation**: every command carries a fresh id; a response is only
//!   accepted for the id being collected
//! - **Contention detection**: a second collector on the response mailbox is
//!   detected and reported, never silently tolerated
//! - **Bounded waits**: single-target and broadcast collection always end
//! - **Known workers**: a persisted registry of responders lets a broadcast
//!   finish as soon as everyone seen before has answered
//!
//! # Modules
//!
//! - [`mailbox`] - Mailbox trait and in-process implementation
//! - [`ipc`] - Mailbox hub and the socket-backed mailbox client
//! - [`protocol`] - Command, Response, Action and Target
//! - [`registry`] - Known worker registry
//! - [`worker`] - Worker loop and action dispatch
//! - [`coordinator`] - Dispatch and response collection
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod console;
pub mod coordinator;
pub mod error;
pub mod ipc;
pub mod mailbox;
pub mod protocol;
pub mod registry;
pub mod worker;

pub use config::Config;
pub use console::{BufferConsole, Console, ConsoleColor, TerminalConsole};
pub use coordinator::{BroadcastReport, Coordinator, Outcome};
pub use error::ProtocolError;
pub use ipc::{MailboxHub, RemoteMailbox};
pub use mailbox::{Channel, EMPTY_SENTINEL, Mailbox, MailboxError, MemoryMailbox};
pub use protocol::{Action, Command, Response, Target};
pub use registry::KnownWorkerRegistry;
pub use worker::{Observation, Worker};
