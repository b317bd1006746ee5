use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::path::PathBuf;

use datastore::cli::{Cli, Command};
use datastore::{DEFAULT_FILE_NAME, DataStore, KeyValueStore};

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let path = cli.path.unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_NAME));
    let store = DataStore::open(&path)?;

    info!("datastore opened at {}", path.display());

    match cli.command {
        Command::Get { key } => match store.get(&key)? {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => println!("{} Key not found: {}", "✗".red(), key.yellow()),
        },
        Command::Set { key, value } => {
            let value = serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value));
            store.set(&key, value)?;
            println!("{} Stored key: {}", "✓".green(), key.cyan());
        }
        Command::Keys => {
            let keys = store.keys()?;
            if keys.is_empty() {
                println!("No keys found");
            } else {
                for key in keys {
                    println!("{}", key);
                }
            }
        }
        Command::Delete { key } => {
            if store.delete(&key)? {
                println!("{} Deleted key: {}", "✓".green(), key);
            } else {
                println!("{} Key not found: {}", "✗".red(), key.yellow());
            }
        }
    }

    Ok(())
}
