use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::models::{NotificationId, ScheduledNotification};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("notification store failed: {0:#}")]
    Storage(anyhow::Error),
    #[error("notification {id} rejected: {reason}")]
    Rejected { id: NotificationId, reason: String },
    #[error("delivery command failed: {0}")]
    Delivery(#[from] std::io::Error),
}

/// The platform's delivery API. Returning `Ok` means "accepted for
/// delivery", nothing more.
pub trait NotificationBackend: Send + Sync {
    fn schedule_at(&self, notification: &ScheduledNotification) -> Result<(), BackendError>;
    fn cancel(&self, ids: &[NotificationId]) -> Result<(), BackendError>;
    fn list_pending(&self) -> Result<Vec<NotificationId>, BackendError>;
}

/// Keeps pending notifications in process memory. Nothing survives exit.
#[derive(Default)]
pub struct MemoryBackend {
    pending: Mutex<BTreeMap<NotificationId, ScheduledNotification>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of what is waiting, ordered by fire time.
    pub fn pending(&self) -> Vec<ScheduledNotification> {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut all: Vec<_> = pending.values().cloned().collect();
        all.sort_by_key(|n| (n.fire_at, n.id));
        all
    }
}

impl NotificationBackend for MemoryBackend {
    fn schedule_at(&self, notification: &ScheduledNotification) -> Result<(), BackendError> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(notification.id, notification.clone());
        Ok(())
    }

    fn cancel(&self, ids: &[NotificationId]) -> Result<(), BackendError> {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for id in ids {
            pending.remove(id);
        }
        Ok(())
    }

    fn list_pending(&self) -> Result<Vec<NotificationId>, BackendError> {
        Ok(self.pending().iter().map(|n| n.id).collect())
    }
}
