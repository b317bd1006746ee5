//! Command dispatch and response collection

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::outcome::{BroadcastReport, Outcome};
use crate::config::CoordinatorConfig;
use crate::console::{Console, ConsoleColor, colored_text};
use crate::error::ProtocolError;
use crate::mailbox::{Mailbox, MailboxError, is_sentinel};
use crate::protocol::{Action, Command, Response, Target};
use crate::registry::KnownWorkerRegistry;

/// How many finished session ids are remembered for late-answer filtering
const FINISHED_SESSIONS: usize = 16;

/// Issues commands and collects correlated responses
///
/// At most one coordinator may collect from a response mailbox at a time.
/// Violations are detected (see [`ProtocolError::is_contention`]) but not
/// prevented.
pub struct Coordinator {
    commands: Arc<dyn Mailbox>,
    responses: Arc<dyn Mailbox>,
    registry: KnownWorkerRegistry,
    console: Arc<dyn Console>,
    config: CoordinatorConfig,
    finished: VecDeque<String>,
}

impl Coordinator {
    pub fn new(
        commands: Arc<dyn Mailbox>,
        responses: Arc<dyn Mailbox>,
        registry: KnownWorkerRegistry,
        console: Arc<dyn Console>,
        config: CoordinatorConfig,
    ) -> Self {
        debug!(known = registry.len(), "Coordinator::new: called");
        Self {
            commands,
            responses,
            registry,
            console,
            config,
            finished: VecDeque::new(),
        }
    }

    pub fn registry(&self) -> &KnownWorkerRegistry {
        &self.registry
    }

    /// Check operator input without touching any mailbox
    pub fn validate(target: &str, action_name: &str) -> Result<(Target, Action), ProtocolError> {
        let target = Target::parse(target).ok_or_else(|| ProtocolError::InvalidTarget(target.to_string()))?;
        let action = action_name.parse::<Action>()?;
        Ok((target, action))
    }

    /// Send one command and collect its answers
    ///
    /// Both mailboxes are cleared first so stale content from an earlier
    /// session cannot be mistaken for an answer.
    pub async fn execute(
        &mut self,
        target: &str,
        action_name: &str,
        args: Vec<Value>,
        wait_known: bool,
    ) -> Result<Outcome, ProtocolError> {
        debug!(%target, %action_name, wait_known, "Coordinator::execute: called");
        let (target, action) = Self::validate(target, action_name)?;

        self.commands.clear().await?;
        self.responses.clear().await?;

        let command_id = self.post(Command::new(target.clone(), action, args)).await?;

        let outcome = if target.is_broadcast() {
            Outcome::Broadcast(self.collect_broadcast(&command_id, wait_known).await?)
        } else {
            Outcome::Single(self.collect_single(&command_id).await?)
        };
        self.finish_session(command_id);
        Ok(outcome)
    }

    fn finish_session(&mut self, command_id: String) {
        if self.finished.len() == FINISHED_SESSIONS {
            self.finished.pop_front();
        }
        self.finished.push_back(command_id);
    }

    /// Write a command into the command mailbox; returns its correlation id
    ///
    /// Fire-and-forget: nothing is collected.
    pub async fn send_command(
        &self,
        target: &Target,
        action_name: &str,
        args: Vec<Value>,
    ) -> Result<String, ProtocolError> {
        debug!(%target, %action_name, "Coordinator::send_command: called");
        let action = action_name.parse::<Action>()?;
        self.post(Command::new(target.clone(), action, args)).await
    }

    async fn post(&self, command: Command) -> Result<String, ProtocolError> {
        let payload = serde_json::to_string(&command).map_err(MailboxError::from)?;
        self.commands.write(payload.clone()).await?;

        info!(command_id = %command.id, target = %command.target, action = %command.action, "Sent command");
        self.console
            .info(&format!("Sent command to bot {}: {}", command.target, payload));
        Ok(command.id)
    }

    /// Wait up to `timeout` for the response to `command_id`
    ///
    /// Returns `None` on timeout. Malformed payloads are dropped. Contention
    /// with another collector is an error.
    pub async fn receive_response(
        &mut self,
        command_id: &str,
        timeout: Duration,
    ) -> Result<Option<Response>, ProtocolError> {
        self.receive(command_id, timeout, true).await
    }

    async fn receive(
        &mut self,
        command_id: &str,
        timeout: Duration,
        warn_on_timeout: bool,
    ) -> Result<Option<Response>, ProtocolError> {
        debug!(%command_id, ?timeout, "Coordinator::receive: called");
        let deadline = Instant::now() + timeout;

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            if self.responses.is_empty().await? {
                // Bounded so a write between the check and the wait is not missed.
                let wait = self.config.poll_interval().min(deadline - now);
                if let Ok(result) = tokio::time::timeout(wait, self.responses.await_write()).await {
                    result?;
                }
                continue;
            }

            let raw = self.responses.peek().await?;
            if is_sentinel(&raw) {
                warn!(%command_id, "Response mailbox drained by another reader");
                return Err(ProtocolError::ResponseDrained);
            }

            let response: Response = match serde_json::from_str(&raw) {
                Ok(response) => response,
                Err(e) => {
                    warn!(%command_id, error = %e, "Dropping malformed response");
                    self.console.error(&format!("Failed to parse response: {}", e));
                    self.responses.read().await?;
                    continue;
                }
            };

            if response.command_id != command_id {
                if self.finished.contains(&response.command_id) {
                    // Worker still answering one of our own earlier sessions
                    debug!(%command_id, late = %response.command_id, "Dropping late response");
                    self.responses.read().await?;
                    continue;
                }
                return Err(ProtocolError::CrossTalk {
                    expected: command_id.to_string(),
                    found: response.command_id,
                });
            }

            if is_sentinel(&self.responses.read().await?) {
                return Err(ProtocolError::ResponseDrained);
            }

            self.console
                .info(&format!("Received response from bot {}: {}", response.bot_id, raw));
            self.record(&response.bot_id)?;
            return Ok(Some(response));
        }

        if warn_on_timeout {
            warn!(%command_id, "No response within timeout");
            self.console.warn(&format!(
                "No response received for command {} within timeout.",
                command_id
            ));
        }
        Ok(None)
    }

    fn record(&mut self, worker_id: &str) -> Result<(), ProtocolError> {
        if self.registry.add(worker_id)? {
            self.console.write(
                &format!("Discovered new bot {}. Adding to known bots list.", worker_id),
                Some(ConsoleColor::Cyan),
            );
        }
        Ok(())
    }

    async fn collect_single(&mut self, command_id: &str) -> Result<Option<Response>, ProtocolError> {
        let response = self
            .receive_response(command_id, self.config.response_timeout())
            .await?;
        if let Some(response) = &response
            && !response.success
        {
            self.report_failure(response);
        }
        Ok(response)
    }

    async fn collect_broadcast(&mut self, command_id: &str, wait_known: bool) -> Result<BroadcastReport, ProtocolError> {
        let known_at_start = self.registry.workers();
        let expected = known_at_start.len();
        let window = self.config.broadcast_window();
        let deadline = Instant::now() + window;
        debug!(%command_id, expected, ?window, wait_known, "Coordinator::collect_broadcast: called");

        let mut report = BroadcastReport {
            command_id: command_id.to_string(),
            ..Default::default()
        };

        loop {
            if wait_known && expected > 0 && report.responders.len() >= expected {
                debug!(%command_id, responders = report.responders.len(), "Every known worker answered");
                report.ended_early = true;
                break;
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }

            self.console.info(&format!(
                "Waiting for responses for {:.0} more seconds...",
                (deadline - now).as_secs_f64().round()
            ));
            let attempt = self.config.broadcast_attempt_timeout().min(deadline - now);
            let Some(response) = self.receive(command_id, attempt, false).await? else {
                continue;
            };

            if !response.success {
                self.report_failure(&response);
                report.failures.push(response.clone());
            }
            if !report.responders.contains(&response.bot_id) {
                report.responders.push(response.bot_id);
            }
        }

        if report.responders.is_empty() {
            self.console.error(&format!(
                "No responses received within {} seconds.",
                window.as_secs_f64()
            ));
            self.registry.reset()?;
            report.registry_reset = true;
        }

        report.unresponsive = known_at_start
            .into_iter()
            .filter(|id| !report.responders.contains(id))
            .collect();
        if !report.unresponsive.is_empty() {
            let names: Vec<String> = report
                .unresponsive
                .iter()
                .map(|id| colored_text(id, ConsoleColor::Red))
                .collect();
            self.console
                .warn(&format!("The following bots did not respond: {}", names.join(", ")));
        }

        info!(
            %command_id,
            responders = report.responders.len(),
            failures = report.failures.len(),
            unresponsive = report.unresponsive.len(),
            "Broadcast collection finished"
        );
        Ok(report)
    }

    fn report_failure(&self, response: &Response) {
        let data = match &response.data {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => "no data".to_string(),
        };
        self.console.error(&format!(
            "Command {} failed on bot {}: {}",
            response.command_id, response.bot_id, data
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::console::BufferConsole;
    use crate::mailbox::{EMPTY_SENTINEL, MemoryMailbox};
    use crate::registry::KNOWN_BOTS_KEY;
    use crate::worker::Worker;
    use async_trait::async_trait;
    use datastore::{KeyValueStore, MemoryStore};
    use serde_json::json;
    use tokio::task::JoinHandle;

    fn fast_config() -> CoordinatorConfig {
        CoordinatorConfig {
            broadcast_window_ms: 3_000,
            response_timeout_ms: 80,
            broadcast_attempt_timeout_ms: 100,
            poll_interval_ms: 10,
        }
    }

    struct Fixture {
        commands: Arc<MemoryMailbox>,
        responses: Arc<MemoryMailbox>,
        store: Arc<MemoryStore>,
        console: Arc<BufferConsole>,
    }

    impl Fixture {
        fn new(known: &[&str]) -> Self {
            let store = Arc::new(MemoryStore::new());
            if !known.is_empty() {
                store.set(KNOWN_BOTS_KEY, json!(known)).unwrap();
            }
            Self {
                commands: Arc::new(MemoryMailbox::new()),
                responses: Arc::new(MemoryMailbox::new()),
                store,
                console: Arc::new(BufferConsole::new()),
            }
        }

        fn coordinator(&self, config: CoordinatorConfig) -> Coordinator {
            let registry = KnownWorkerRegistry::load(self.store.clone()).unwrap();
            Coordinator::new(
                self.commands.clone(),
                self.responses.clone(),
                registry,
                self.console.clone(),
                config,
            )
        }

        fn spawn_worker(&self, id: &str) -> JoinHandle<Result<(), MailboxError>> {
            let config = WorkerConfig {
                poll_interval_ms: 5,
                response_post_timeout_ms: 2_000,
            };
            let worker = Worker::new(
                id,
                self.commands.clone(),
                self.responses.clone(),
                Arc::new(BufferConsole::new()),
                config,
            );
            tokio::spawn(worker.run())
        }
    }

    /// Reports content but reads back empty, as when another reader wins the race
    struct DrainedMailbox;

    #[async_trait]
    impl Mailbox for DrainedMailbox {
        async fn write(&self, _value: String) -> Result<(), MailboxError> {
            Ok(())
        }

        async fn try_write(&self, _value: String) -> Result<bool, MailboxError> {
            Ok(false)
        }

        async fn peek(&self) -> Result<String, MailboxError> {
            Ok(EMPTY_SENTINEL.to_string())
        }

        async fn read(&self) -> Result<String, MailboxError> {
            Ok(EMPTY_SENTINEL.to_string())
        }

        async fn clear(&self) -> Result<(), MailboxError> {
            Ok(())
        }

        async fn is_empty(&self) -> Result<bool, MailboxError> {
            Ok(false)
        }

        async fn await_write(&self) -> Result<(), MailboxError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_drained_slot_is_contention() {
        let registry = KnownWorkerRegistry::load(Arc::new(MemoryStore::new())).unwrap();
        let mut coordinator = Coordinator::new(
            Arc::new(MemoryMailbox::new()),
            Arc::new(DrainedMailbox),
            registry,
            Arc::new(BufferConsole::new()),
            fast_config(),
        );

        let err = coordinator
            .receive_response("c-1", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::ResponseDrained));
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_empty_slot_is_not_contention() {
        let fx = Fixture::new(&[]);
        let mut coordinator = fx.coordinator(fast_config());

        let response = coordinator
            .receive_response("c-1", Duration::from_millis(40))
            .await
            .unwrap();
        assert!(response.is_none());
        assert!(fx.console.contains("No response received for command c-1 within timeout."));
    }

    #[tokio::test]
    async fn test_mismatched_command_id_is_cross_talk() {
        let fx = Fixture::new(&[]);
        let mut coordinator = fx.coordinator(fast_config());
        let stray = Response::new("home", "other", true, None);
        fx.responses
            .write(serde_json::to_string(&stray).unwrap())
            .await
            .unwrap();

        match coordinator.receive_response("mine", Duration::from_millis(100)).await {
            Err(ProtocolError::CrossTalk { expected, found }) => {
                assert_eq!(expected, "mine");
                assert_eq!(found, "other");
            }
            other => panic!("Expected CrossTalk, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_response_is_dropped() {
        let fx = Fixture::new(&[]);
        let mut coordinator = fx.coordinator(fast_config());
        fx.responses.write("{garbage".to_string()).await.unwrap();

        let responses = fx.responses.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let good = Response::new("home", "c-1", true, Some(json!("Pong")));
            responses.write(serde_json::to_string(&good).unwrap()).await.unwrap();
        });

        let response = coordinator
            .receive_response("c-1", Duration::from_millis(500))
            .await
            .unwrap()
            .expect("response after malformed payload");
        assert_eq!(response.bot_id, "home");
        assert!(fx.console.contains("Failed to parse response"));
        assert!(fx.responses.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_action_fails_before_any_write() {
        let fx = Fixture::new(&[]);
        let mut coordinator = fx.coordinator(fast_config());
        fx.commands.write("leftover".to_string()).await.unwrap();

        let err = coordinator.execute("home", "bogus", vec![], false).await.unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownAction(_)));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(fx.commands.write_count(), 1);
        assert_eq!(fx.commands.peek().await.unwrap(), "leftover");
    }

    #[test]
    fn test_blank_target_is_rejected() {
        let err = Coordinator::validate("  ", "ping").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidTarget(_)));
        assert!(Coordinator::validate("all", "PING").is_ok());
    }

    #[tokio::test]
    async fn test_send_command_writes_serialized_command() {
        let fx = Fixture::new(&[]);
        let coordinator = fx.coordinator(fast_config());

        let id = coordinator
            .send_command(&Target::Worker("n00dles".to_string()), "Grow", vec![json!("n00dles")])
            .await
            .unwrap();
        let command: Command = serde_json::from_str(&fx.commands.peek().await.unwrap()).unwrap();
        assert_eq!(command.id, id);
        assert_eq!(command.action, Action::Grow);
        assert_eq!(command.args, vec![json!("n00dles")]);
    }

    #[tokio::test]
    async fn test_single_target_without_listener_times_out() {
        let fx = Fixture::new(&[]);
        let mut coordinator = fx.coordinator(fast_config());

        let outcome = coordinator.execute("home", "hack", vec![], false).await.unwrap();
        assert_eq!(outcome, Outcome::Single(None));
        assert!(fx.console.contains("No response received for command"));
        assert!(coordinator.registry().is_empty());
        assert!(!fx.commands.is_empty().await.unwrap(), "nobody consumed the command");
    }

    #[tokio::test]
    async fn test_single_target_discovers_new_worker() {
        let fx = Fixture::new(&[]);
        let worker = fx.spawn_worker("home");
        tokio::time::sleep(Duration::from_millis(10)).await;

        let config = CoordinatorConfig {
            response_timeout_ms: 1_000,
            ..fast_config()
        };
        let mut coordinator = fx.coordinator(config);
        let outcome = coordinator.execute("home", "ping", vec![], false).await.unwrap();

        match outcome {
            Outcome::Single(Some(response)) => {
                assert!(response.success);
                assert_eq!(response.data, Some(json!("Pong")));
            }
            other => panic!("Expected a response, got {:?}", other),
        }
        assert!(coordinator.registry().contains("home"));
        assert!(fx.console.contains("Discovered new bot home. Adding to known bots list."));
        worker.abort();
    }

    #[tokio::test]
    async fn test_failed_single_target_is_reported() {
        let fx = Fixture::new(&[]);
        let worker = fx.spawn_worker("home");
        tokio::time::sleep(Duration::from_millis(10)).await;

        let config = CoordinatorConfig {
            response_timeout_ms: 1_000,
            ..fast_config()
        };
        let mut coordinator = fx.coordinator(config);
        let outcome = coordinator.execute("home", "weaken", vec![], false).await.unwrap();

        assert!(!outcome.all_succeeded());
        assert!(fx.console.contains("failed on bot home: Action not implemented: weaken"));
        assert!(coordinator.registry().contains("home"), "a failure still proves liveness");
        worker.abort();
    }

    #[tokio::test]
    async fn test_broadcast_with_wait_known_ends_early() {
        let fx = Fixture::new(&["n00dles", "foodnstuff"]);
        let workers = vec![fx.spawn_worker("n00dles"), fx.spawn_worker("foodnstuff")];
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut coordinator = fx.coordinator(fast_config());
        let started = Instant::now();
        let outcome = coordinator.execute("ALL", "ping", vec![], true).await.unwrap();

        let Outcome::Broadcast(report) = outcome else {
            panic!("Expected a broadcast report");
        };
        assert!(report.ended_early);
        assert!(started.elapsed() < fast_config().broadcast_window());
        let mut responders = report.responders.clone();
        responders.sort();
        assert_eq!(responders, vec!["foodnstuff".to_string(), "n00dles".to_string()]);
        assert!(report.unresponsive.is_empty());
        assert!(report.failures.is_empty());
        assert!(!fx.console.contains("did not respond"));

        for worker in workers {
            worker.abort();
        }
    }

    #[tokio::test]
    async fn test_broadcast_reports_unresponsive_workers() {
        let fx = Fixture::new(&["home", "ghost"]);
        let worker = fx.spawn_worker("home");
        tokio::time::sleep(Duration::from_millis(10)).await;

        let config = CoordinatorConfig {
            broadcast_window_ms: 300,
            ..fast_config()
        };
        let mut coordinator = fx.coordinator(config);
        let outcome = coordinator.execute("all", "ping", vec![], true).await.unwrap();

        let Outcome::Broadcast(report) = outcome else {
            panic!("Expected a broadcast report");
        };
        assert!(!report.ended_early);
        assert_eq!(report.responders, vec!["home".to_string()]);
        assert_eq!(report.unresponsive, vec!["ghost".to_string()]);
        assert!(!report.registry_reset);
        assert!(fx.console.contains("The following bots did not respond"));
        assert!(fx.console.contains("ghost"));
        worker.abort();
    }

    #[tokio::test]
    async fn test_broadcast_without_answers_resets_registry() {
        let fx = Fixture::new(&["ghost"]);
        let config = CoordinatorConfig {
            broadcast_window_ms: 150,
            broadcast_attempt_timeout_ms: 50,
            ..fast_config()
        };
        let mut coordinator = fx.coordinator(config);

        let outcome = coordinator.execute("ALL", "ping", vec![], false).await.unwrap();
        let Outcome::Broadcast(report) = outcome else {
            panic!("Expected a broadcast report");
        };
        assert!(report.registry_reset);
        assert!(report.responders.is_empty());
        assert_eq!(report.unresponsive, vec!["ghost".to_string()]);
        assert!(coordinator.registry().is_empty());
        assert_eq!(fx.store.get(KNOWN_BOTS_KEY).unwrap(), Some(json!([])));
        assert!(fx.console.contains("No responses received within 0.15 seconds."));
        assert!(fx.console.contains("Waiting for responses for 0 more seconds..."));
    }

    #[tokio::test]
    async fn test_sentinel_payload_is_not_contention() {
        let fx = Fixture::new(&[]);
        let mut coordinator = fx.coordinator(fast_config());
        fx.responses.write(EMPTY_SENTINEL.to_string()).await.unwrap();

        let response = coordinator
            .receive_response("c-1", Duration::from_millis(60))
            .await
            .unwrap();
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_late_answer_to_earlier_session_is_dropped() {
        let fx = Fixture::new(&[]);
        let mut coordinator = fx.coordinator(fast_config());

        let Outcome::Single(None) = coordinator.execute("home", "ping", vec![], false).await.unwrap() else {
            panic!("Expected a timeout with no worker running");
        };
        let earlier: Command = serde_json::from_str(&fx.commands.peek().await.unwrap()).unwrap();

        let late = Response::new("home", earlier.id.as_str(), true, Some(json!("Pong")));
        fx.responses.write(serde_json::to_string(&late).unwrap()).await.unwrap();
        let responses = fx.responses.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let good = Response::new("home", "c-2", true, Some(json!("Pong")));
            responses.write(serde_json::to_string(&good).unwrap()).await.unwrap();
        });

        let response = coordinator
            .receive_response("c-2", Duration::from_millis(500))
            .await
            .unwrap()
            .expect("answer for the current session");
        assert_eq!(response.command_id, "c-2");
    }

    #[tokio::test]
    async fn test_back_to_back_sessions_with_busy_workers() {
        let config = CoordinatorConfig {
            response_timeout_ms: 1_000,
            ..fast_config()
        };

        for round in 0..10 {
            let fx = Fixture::new(&["a"]);
            let workers = vec![fx.spawn_worker("a"), fx.spawn_worker("b"), fx.spawn_worker("c")];
            tokio::time::sleep(Duration::from_millis(10)).await;
            let mut coordinator = fx.coordinator(config.clone());

            match coordinator.execute("ALL", "ping", vec![], true).await {
                Ok(Outcome::Broadcast(report)) => assert!(report.ended_early, "round {}", round),
                other => panic!("round {}: expected a broadcast report, got {:?}", round, other),
            }

            match coordinator.execute("a", "ping", vec![], false).await {
                Ok(Outcome::Single(Some(response))) => assert_eq!(response.bot_id, "a", "round {}", round),
                other => panic!("round {}: expected an answer from a, got {:?}", round, other),
            }

            for worker in workers {
                worker.abort();
            }
        }
    }
}
