//! The closed set of actions a worker can be asked to perform

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operator supplied an action name outside the closed set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown action \"{0}\"")]
pub struct ActionParseError(pub String);

/// Action carried by a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Ping,
    Hack,
    Grow,
    Weaken,
    Shutdown,
    Download,
    DownloadAndRun,
    UpdateAll,
}

impl Action {
    /// Every action, in help-text order
    pub const ALL: [Action; 8] = [
        Action::Ping,
        Action::Hack,
        Action::Grow,
        Action::Weaken,
        Action::Shutdown,
        Action::Download,
        Action::DownloadAndRun,
        Action::UpdateAll,
    ];

    /// Wire name of the action
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Ping => "ping",
            Action::Hack => "hack",
            Action::Grow => "grow",
            Action::Weaken => "weaken",
            Action::Shutdown => "shutdown",
            Action::Download => "download",
            Action::DownloadAndRun => "download-and-run",
            Action::UpdateAll => "update-all",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ActionParseError;

    /// Case-insensitive match against the wire names
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == wanted)
            .ok_or_else(|| ActionParseError(s.to_string()))
    }
}
