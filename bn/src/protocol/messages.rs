//! Command and Response records

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::action::Action;

/// Wire value of a command target meaning "every worker"
pub const BROADCAST_TARGET: &str = "ALL";

/// Current time as unix milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Addressee of a command
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Target {
    /// A single worker, by identity
    Worker(String),
    /// Every worker
    Broadcast,
}

impl Target {
    /// Parse operator input; the broadcast sentinel is matched case-insensitively.
    ///
    /// Returns `None` for a blank target.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            None
        } else {
            Some(Self::from(s.to_string()))
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, Target::Broadcast)
    }

    /// Whether a worker with this identity is addressed
    pub fn matches(&self, worker_id: &str) -> bool {
        match self {
            Target::Broadcast => true,
            Target::Worker(id) => id == worker_id,
        }
    }
}

impl From<String> for Target {
    fn from(s: String) -> Self {
        if s.eq_ignore_ascii_case(BROADCAST_TARGET) {
            Target::Broadcast
        } else {
            Target::Worker(s)
        }
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        match target {
            Target::Broadcast => BROADCAST_TARGET.to_string(),
            Target::Worker(id) => id,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Broadcast => f.write_str(BROADCAST_TARGET),
            Target::Worker(id) => f.write_str(id),
        }
    }
}

/// Instruction from the coordinator to one worker or to all of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Correlation id, unique per dispatched command
    pub id: String,
    pub target: Target,
    pub action: Action,
    #[serde(default)]
    pub args: Vec<Value>,
    /// Creation time, unix milliseconds
    pub timestamp: i64,
}

impl Command {
    /// Build a command with a fresh correlation id stamped with the current time
    pub fn new(target: Target, action: Action, args: Vec<Value>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            target,
            action,
            args,
            timestamp: now_millis(),
        }
    }
}

/// A worker's answer to one command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub bot_id: String,
    /// Correlation id of the command being answered
    pub command_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Response time, unix milliseconds
    pub timestamp: i64,
}

impl Response {
    pub fn new(bot_id: impl Into<String>, command_id: impl Into<String>, success: bool, data: Option<Value>) -> Self {
        Self {
            bot_id: bot_id.into(),
            command_id: command_id.into(),
            success,
            data,
            timestamp: now_millis(),
        }
    }

    /// Answer `command` from `bot_id`
    pub fn reply_to(command: &Command, bot_id: impl Into<String>, success: bool, data: Option<Value>) -> Self {
        Self::new(bot_id, command.id.clone(), success, data)
    }
}
