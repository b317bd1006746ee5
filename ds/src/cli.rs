//! CLI argument parsing for datastore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ds")]
#[command(author, version, about = "Flat JSON key-value file store", long_about = None)]
pub struct Cli {
    /// Path to the store file (default: ./datastore.json)
    #[arg(short, long)]
    pub path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the value stored under a key
    Get {
        /// Key to look up
        #[arg(required = true)]
        key: String,
    },

    /// Store a JSON value under a key
    Set {
        /// Key to write
        #[arg(required = true)]
        key: String,

        /// JSON value (plain text is stored as a string)
        #[arg(required = true)]
        value: String,
    },

    /// List all keys
    Keys,

    /// Delete a key
    Delete {
        /// Key to delete
        #[arg(required = true)]
        key: String,
    },
}
