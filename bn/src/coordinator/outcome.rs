//! Results of one coordinator invocation

use crate::protocol::Response;

/// What a broadcast collection session observed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BroadcastReport {
    pub command_id: String,
    /// Distinct responding workers, in arrival order
    pub responders: Vec<String>,
    /// Responses that reported `success: false`
    pub failures: Vec<Response>,
    /// Workers known at session start that never answered
    pub unresponsive: Vec<String>,
    /// Registry was cleared because nobody answered
    pub registry_reset: bool,
    /// Collection stopped before the window closed
    pub ended_early: bool,
}

/// Result of `Coordinator::execute`
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Single-target command; `None` when the worker never answered
    Single(Option<Response>),
    Broadcast(BroadcastReport),
}

impl Outcome {
    /// Whether every answer that arrived reported success
    pub fn all_succeeded(&self) -> bool {
        match self {
            Outcome::Single(Some(response)) => response.success,
            Outcome::Single(None) => false,
            Outcome::Broadcast(report) => report.failures.is_empty() && !report.responders.is_empty(),
        }
    }
}
