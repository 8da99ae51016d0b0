use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::db::repository::MetaRepo;
use crate::db::{lock, SharedConnection};

fn default_true() -> bool {
    true
}

/// Survives restarts. Only the scheduler reads or writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerState {
    /// Set iff a pass finished for that date
    #[serde(default)]
    pub last_scheduled_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    /// `None` until the platform has been asked at least once
    #[serde(default)]
    pub permission_granted: Option<bool>,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self {
            last_scheduled_date: None,
            notifications_enabled: true,
            permission_granted: None,
        }
    }
}

pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<SchedulerState>;
    fn save(&self, state: &SchedulerState) -> Result<()>;
}

const STATE_KEY: &str = "notification_scheduler_state";

/// One JSON record under a fixed key in `app_meta`.
pub struct MetaStateStore {
    conn: SharedConnection,
}

impl MetaStateStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

impl StateStore for MetaStateStore {
    fn load(&self) -> Result<SchedulerState> {
        let Some(raw) = MetaRepo::get(&lock(&self.conn), STATE_KEY)? else {
            return Ok(SchedulerState::default());
        };
        match serde_json::from_str(&raw) {
            Ok(state) => Ok(state),
            Err(e) => {
                // Worst case we schedule once more than needed
                warn!("Discarding unreadable scheduler state: {}", e);
                Ok(SchedulerState::default())
            }
        }
    }

    fn save(&self, state: &SchedulerState) -> Result<()> {
        let raw = serde_json::to_string(state).context("Serializing scheduler state")?;
        MetaRepo::set(&lock(&self.conn), STATE_KEY, &raw)
    }
}

#[derive(Default)]
pub struct MemoryStateStore {
    state: Mutex<SchedulerState>,
}

impl MemoryStateStore {
    pub fn new(state: SchedulerState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<SchedulerState> {
        Ok(self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    fn save(&self, state: &SchedulerState) -> Result<()> {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = state.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use rusqlite::Connection;

    fn store() -> (MetaStateStore, SharedConnection) {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let shared = crate::db::shared(conn);
        (MetaStateStore::new(shared.clone()), shared)
    }

    #[test]
    fn fresh_install_is_enabled_and_unscheduled() {
        let (store, _) = store();
        let state = store.load().unwrap();
        assert!(state.notifications_enabled);
        assert_eq!(state.last_scheduled_date, None);
        assert_eq!(state.permission_granted, None);
    }

    #[test]
    fn saved_state_is_reloaded() {
        let (store, shared) = store();
        let state = SchedulerState {
            last_scheduled_date: NaiveDate::from_ymd_opt(2026, 10, 16),
            notifications_enabled: false,
            permission_granted: Some(true),
        };
        store.save(&state).unwrap();

        // A second store over the same database sees it, as after a restart
        assert_eq!(MetaStateStore::new(shared).load().unwrap(), state);
    }

    #[test]
    fn garbage_record_falls_back_to_default() {
        let (store, shared) = store();
        MetaRepo::set(&lock(&shared), STATE_KEY, "{not json").unwrap();
        assert_eq!(store.load().unwrap(), SchedulerState::default());
    }
}
