//! In-process mailbox

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};
use tracing::debug;

use super::{EMPTY_SENTINEL, Mailbox, MailboxError, is_sentinel};

/// Mailbox living in this process
///
/// Every successful write bumps a watch counter; `await_write` subscribes to
/// it and resumes on the next bump. Writing the empty sentinel leaves the slot
/// empty, so the sentinel never reads back as content.
pub struct MemoryMailbox {
    slot: Mutex<Option<String>>,
    writes: watch::Sender<u64>,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        let (writes, _) = watch::channel(0);
        Self {
            slot: Mutex::new(None),
            writes,
        }
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> u64 {
        *self.writes.borrow()
    }

    fn notify_write(&self) {
        self.writes.send_modify(|count| *count += 1);
    }
}

impl Default for MemoryMailbox {
    fn default() -> Self {
        Self::new()
    }
}

fn content(value: String) -> Option<String> {
    if is_sentinel(&value) {
        debug!("MemoryMailbox: sentinel written, slot stays empty");
        None
    } else {
        Some(value)
    }
}

#[async_trait]
impl Mailbox for MemoryMailbox {
    async fn write(&self, value: String) -> Result<(), MailboxError> {
        debug!(len = value.len(), "MemoryMailbox::write: called");
        {
            let mut slot = self.slot.lock().await;
            if slot.is_some() {
                debug!("MemoryMailbox::write: overwriting unread content");
            }
            *slot = content(value);
        }
        self.notify_write();
        Ok(())
    }

    async fn try_write(&self, value: String) -> Result<bool, MailboxError> {
        {
            let mut slot = self.slot.lock().await;
            if slot.is_some() {
                debug!("MemoryMailbox::try_write: slot full");
                return Ok(false);
            }
            *slot = content(value);
        }
        self.notify_write();
        Ok(true)
    }

    async fn peek(&self) -> Result<String, MailboxError> {
        let slot = self.slot.lock().await;
        Ok(slot.clone().unwrap_or_else(|| EMPTY_SENTINEL.to_string()))
    }

    async fn read(&self) -> Result<String, MailboxError> {
        let mut slot = self.slot.lock().await;
        Ok(slot.take().unwrap_or_else(|| EMPTY_SENTINEL.to_string()))
    }

    async fn clear(&self) -> Result<(), MailboxError> {
        debug!("MemoryMailbox::clear: called");
        *self.slot.lock().await = None;
        Ok(())
    }

    async fn is_empty(&self) -> Result<bool, MailboxError> {
        Ok(self.slot.lock().await.is_none())
    }

    async fn await_write(&self) -> Result<(), MailboxError> {
        let mut rx = self.writes.subscribe();
        rx.changed().await.map_err(|_| MailboxError::Closed)
    }
}
