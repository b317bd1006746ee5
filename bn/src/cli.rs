//! CLI command definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

/// Flag that enables early broadcast completion; stripped from forwarded args
pub const WAIT_KNOWN_FLAG: &str = "--wait-known";

/// Botnet - command and control over single-slot mailboxes
#[derive(Parser)]
#[command(
    name = "bn",
    about = "Direct a fleet of workers through a pair of single-slot mailboxes",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send a command to one worker (or ALL) and collect responses
    Run {
        /// Worker id, or ALL to broadcast
        #[arg(value_name = "WORKER-ID|ALL")]
        target: String,

        /// Action to perform (ping, hack, grow, weaken, shutdown, download, download-and-run, update-all)
        action: String,

        /// Arguments forwarded to the action; --wait-known may appear anywhere here
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Run a worker that executes commands addressed to it
    Bot {
        /// Worker identity (defaults to the host name)
        #[arg(long)]
        id: Option<String>,
    },

    /// Serve the command and response mailboxes to other processes
    Hub,

    /// Show the known worker registry
    Known {
        /// Forget every known worker
        #[arg(long)]
        clear: bool,
    },
}

/// Split raw action arguments into forwarded values and the wait-known flag
///
/// Arguments that parse as JSON are forwarded as JSON; anything else is
/// forwarded as a string.
pub fn forwarded_args(raw: &[String]) -> (Vec<Value>, bool) {
    let mut wait_known = false;
    let mut args = Vec::with_capacity(raw.len());

    for arg in raw {
        if arg.eq_ignore_ascii_case(WAIT_KNOWN_FLAG) {
            wait_known = true;
            continue;
        }
        let value = serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.clone()));
        args.push(value);
    }

    (args, wait_known)
}
