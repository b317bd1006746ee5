//! Worker loop and action dispatch

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::console::Console;
use crate::mailbox::{Mailbox, MailboxError, is_sentinel};
use crate::protocol::{Action, Command, Response};

/// What a worker did with the command mailbox content it woke up to
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Slot was empty (spurious wake)
    Empty,
    /// Content did not decode as a command; left in place
    Malformed,
    /// Command for another worker; left in place
    NotAddressed,
    /// Broadcast command this worker already answered
    AlreadyHandled,
    /// Command executed and answered
    Handled(Response),
    /// Command executed and answered, and the worker should stop
    Stopping(Response),
    /// Command executed, but a newer session started before the answer was posted
    Superseded(Response),
}

/// Result of executing one action
struct ActionOutcome {
    success: bool,
    data: Value,
    stop: bool,
}

impl ActionOutcome {
    fn ok(data: impl Into<Value>) -> Self {
        Self {
            success: true,
            data: data.into(),
            stop: false,
        }
    }

    fn failed(data: impl Into<Value>) -> Self {
        Self {
            success: false,
            data: data.into(),
            stop: false,
        }
    }
}

/// Long-lived command executor bound to one identity
pub struct Worker {
    id: String,
    commands: Arc<dyn Mailbox>,
    responses: Arc<dyn Mailbox>,
    console: Arc<dyn Console>,
    config: WorkerConfig,
    last_broadcast: Option<String>,
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        commands: Arc<dyn Mailbox>,
        responses: Arc<dyn Mailbox>,
        console: Arc<dyn Console>,
        config: WorkerConfig,
    ) -> Self {
        let id = id.into();
        debug!(%id, "Worker::new: called");
        Self {
            id,
            commands,
            responses,
            console,
            config,
            last_broadcast: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run until a shutdown command is handled or the mailbox fails
    pub async fn run(mut self) -> Result<(), MailboxError> {
        let started = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.console
            .info(&format!("Bot with id \"{}\" started at {}", self.id, started));
        info!(worker_id = %self.id, "Worker started");

        'run: loop {
            self.commands.await_write().await?;
            loop {
                match self.handle_current().await? {
                    Observation::Stopping(_) => break 'run,
                    // Whatever replaced our command arrived while we were not waiting.
                    Observation::Superseded(_) => continue,
                    _ => break,
                }
            }
        }

        self.console.info(&format!("Bot \"{}\" shutting down", self.id));
        info!(worker_id = %self.id, "Worker stopped");
        Ok(())
    }

    /// Inspect the command mailbox once and act on what is there
    pub async fn handle_current(&mut self) -> Result<Observation, MailboxError> {
        let raw = self.commands.peek().await?;
        if is_sentinel(&raw) {
            debug!(worker_id = %self.id, "Worker::handle_current: spurious wake, mailbox empty");
            return Ok(Observation::Empty);
        }

        let command: Command = match serde_json::from_str(&raw) {
            Ok(command) => command,
            Err(e) => {
                warn!(worker_id = %self.id, error = %e, "Failed to parse command");
                self.console.error(&format!("Failed to parse command: {}", e));
                return Ok(Observation::Malformed);
            }
        };

        if !command.target.matches(&self.id) {
            debug!(worker_id = %self.id, target = %command.target, "Worker::handle_current: not addressed");
            return Ok(Observation::NotAddressed);
        }

        if command.target.is_broadcast() {
            // Broadcasts stay in the slot so every worker sees them.
            if self.last_broadcast.as_deref() == Some(command.id.as_str()) {
                debug!(command_id = %command.id, "Worker::handle_current: broadcast already handled");
                return Ok(Observation::AlreadyHandled);
            }
            self.last_broadcast = Some(command.id.clone());
        } else {
            self.take_command(&raw).await?;
        }

        self.console.info(&format!("Received command: {}", raw));
        let outcome = self.execute(&command);
        let response = Response::reply_to(&command, self.id.clone(), outcome.success, Some(outcome.data));
        let posted = self.post_response(&command, &response).await?;

        if outcome.stop {
            Ok(Observation::Stopping(response))
        } else if posted == Posted::Superseded {
            Ok(Observation::Superseded(response))
        } else {
            Ok(Observation::Handled(response))
        }
    }

    /// Consume our command; put back anything else that raced into the slot
    async fn take_command(&self, expected: &str) -> Result<(), MailboxError> {
        let taken = self.commands.read().await?;
        if taken != expected && !is_sentinel(&taken) {
            warn!(worker_id = %self.id, "Command mailbox changed between peek and read, restoring");
            self.commands.try_write(taken).await?;
        }
        Ok(())
    }

    fn execute(&self, command: &Command) -> ActionOutcome {
        debug!(worker_id = %self.id, action = %command.action, "Worker::execute: called");
        match command.action {
            Action::Ping => {
                self.console.info("Ping command received.");
                ActionOutcome::ok("Pong")
            }
            Action::Shutdown => ActionOutcome {
                stop: true,
                ..ActionOutcome::ok("Shutting down")
            },
            Action::Hack
            | Action::Grow
            | Action::Weaken
            | Action::Download
            | Action::DownloadAndRun
            | Action::UpdateAll => {
                self.console
                    .warn(&format!("Unimplemented command action: {}", command.action));
                ActionOutcome::failed(json!(format!("Action not implemented: {}", command.action)))
            }
        }
    }

    /// Post into the response slot without clobbering another worker's answer
    ///
    /// Gives up once `command` is no longer the current session or the post
    /// timeout elapses.
    async fn post_response(&self, command: &Command, response: &Response) -> Result<Posted, MailboxError> {
        let payload = serde_json::to_string(response)?;
        let deadline = Instant::now() + self.config.response_post_timeout();

        loop {
            if !self.is_current(command).await? {
                debug!(command_id = %command.id, "Worker::post_response: session ended, dropping response");
                self.console.warn(&format!(
                    "Command {} was superseded, dropped its response",
                    command.id
                ));
                return Ok(Posted::Superseded);
            }
            if self.responses.try_write(payload.clone()).await? {
                self.console
                    .info(&format!("Sent response for command {}: {}", response.command_id, payload));
                return Ok(Posted::Sent);
            }
            if Instant::now() >= deadline {
                warn!(command_id = %response.command_id, "Response mailbox stayed full, dropping response");
                self.console.warn(&format!(
                    "Response mailbox stayed full, dropped response for command {}",
                    response.command_id
                ));
                return Ok(Posted::TimedOut);
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }

    /// Whether the coordinator is still collecting answers for `command`
    ///
    /// A broadcast stays in the command slot for its whole session. A consumed
    /// single-target command leaves the slot empty until the next session
    /// writes.
    async fn is_current(&self, command: &Command) -> Result<bool, MailboxError> {
        let raw = self.commands.peek().await?;
        if command.target.is_broadcast() {
            let current = serde_json::from_str::<Command>(&raw).map(|c| c.id).ok();
            Ok(current.as_deref() == Some(command.id.as_str()))
        } else {
            Ok(is_sentinel(&raw))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Posted {
    Sent,
    TimedOut,
    Superseded,
}
