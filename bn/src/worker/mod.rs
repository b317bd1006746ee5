//! Worker side of the protocol
//!
//! A worker sleeps on the command mailbox, wakes on every write, and acts only
//! on commands addressed to it (or to everyone). Each handled command gets
//! one response in the response mailbox, unless a newer session replaces it
//! before the slot frees up.

mod core;

use eyre::{Context, Result};

pub use core::{Observation, Worker};

/// Default worker identity: the host name
pub fn default_worker_id() -> Result<String> {
    let name = nix::unistd::gethostname().context("Failed to read host name")?;
    name.into_string()
        .map_err(|raw| eyre::eyre!("Host name is not valid UTF-8: {:?}", raw))
}
