use chrono::{Duration, NaiveDateTime};
use log::{debug, info, warn};
use std::process::Command;

use crate::db::repository::QueueRepo;
use crate::db::{lock, SharedConnection};
use crate::models::{NotificationId, ScheduledNotification};
use crate::notify::backend::{BackendError, NotificationBackend};

/// Durable queue in the `notification_queue` table, drained by `deliver_due`.
///
/// This is the adapter the CLI and the `run` loop use: scheduling writes a
/// row, delivery happens whenever a process next looks at the queue.
pub struct SpoolBackend {
    conn: SharedConnection,
    deliver_command: Option<String>,
}

#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub delivered: Vec<ScheduledNotification>,
    /// Due so long ago that showing them now would only confuse
    pub dropped: Vec<ScheduledNotification>,
}

impl SpoolBackend {
    pub fn new(conn: SharedConnection, deliver_command: Option<String>) -> Self {
        Self {
            conn,
            deliver_command,
        }
    }

    pub fn queued(&self) -> Result<Vec<ScheduledNotification>, BackendError> {
        QueueRepo::list_all(&lock(&self.conn)).map_err(BackendError::Storage)
    }

    /// Take everything due at `now` off the queue. Entries later than `grace`
    /// are dropped, the rest are handed to the delivery command (if any) and
    /// returned for display.
    pub fn deliver_due(
        &self,
        now: NaiveDateTime,
        grace: Duration,
    ) -> Result<DeliveryReport, BackendError> {
        let due = QueueRepo::list_due(&lock(&self.conn), now).map_err(BackendError::Storage)?;
        let mut report = DeliveryReport::default();
        if due.is_empty() {
            return Ok(report);
        }

        for notification in due {
            if now - notification.fire_at > grace {
                debug!(
                    "Dropping stale notification {} due at {}",
                    notification.id, notification.fire_at
                );
                report.dropped.push(notification);
                continue;
            }
            if let Err(e) = self.dispatch(&notification) {
                warn!("Could not deliver notification {}: {}", notification.id, e);
            }
            info!("Delivered notification {}: {}", notification.id, notification.payload.title);
            report.delivered.push(notification);
        }

        let ids: Vec<NotificationId> = report
            .delivered
            .iter()
            .chain(report.dropped.iter())
            .map(|n| n.id)
            .collect();
        QueueRepo::delete_ids(&lock(&self.conn), &ids).map_err(BackendError::Storage)?;
        Ok(report)
    }

    fn dispatch(&self, notification: &ScheduledNotification) -> Result<(), BackendError> {
        let Some(command) = self.deliver_command.as_deref() else {
            return Ok(());
        };
        let status = Command::new(command)
            .arg(&notification.payload.title)
            .arg(&notification.payload.body)
            .status()?;
        if !status.success() {
            return Err(BackendError::Rejected {
                id: notification.id,
                reason: format!("{} exited with {}", command, status),
            });
        }
        Ok(())
    }
}

impl NotificationBackend for SpoolBackend {
    fn schedule_at(&self, notification: &ScheduledNotification) -> Result<(), BackendError> {
        QueueRepo::upsert(&lock(&self.conn), notification).map_err(BackendError::Storage)
    }

    fn cancel(&self, ids: &[NotificationId]) -> Result<(), BackendError> {
        let removed = QueueRepo::delete_ids(&lock(&self.conn), ids).map_err(BackendError::Storage)?;
        debug!("Cancelled {} queued notification(s)", removed);
        Ok(())
    }

    fn list_pending(&self) -> Result<Vec<NotificationId>, BackendError> {
        QueueRepo::list_ids(&lock(&self.conn)).map_err(BackendError::Storage)
    }
}
