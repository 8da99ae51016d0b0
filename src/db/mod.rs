pub mod migrations;
pub mod repository;

use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};

/// One connection shared by the scheduler's adapters.
pub type SharedConnection = Arc<Mutex<Connection>>;

pub fn shared(conn: Connection) -> SharedConnection {
    Arc::new(Mutex::new(conn))
}

/// A panic while holding the lock leaves the connection itself usable.
pub fn lock(conn: &SharedConnection) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
