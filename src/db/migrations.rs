use anyhow::Result;
use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch("
        CREATE TABLE IF NOT EXISTS prayers (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            prayer_type  TEXT NOT NULL CHECK(prayer_type IN ('fajr','zuhr','asr','maghrib','isha')),
            date         TEXT NOT NULL,
            status       TEXT NOT NULL DEFAULT 'pending'
                         CHECK(status IN ('pending','done','missed')),
            created_at   TEXT DEFAULT (datetime('now')),
            UNIQUE(prayer_type, date)
        );

        CREATE TABLE IF NOT EXISTS prayer_times_cache (
            date     TEXT PRIMARY KEY,
            fajr     TEXT,
            sunrise  TEXT,
            zuhr     TEXT,
            asr      TEXT,
            maghrib  TEXT,
            isha     TEXT
        );

        CREATE TABLE IF NOT EXISTS notification_queue (
            id             INTEGER PRIMARY KEY,
            kind           TEXT NOT NULL CHECK(kind IN
                               ('prayer_time','missed_reminder','adhkar_morning','adhkar_evening')),
            fire_at        TEXT NOT NULL,
            title          TEXT NOT NULL,
            body           TEXT NOT NULL,
            related_prayer TEXT,
            extra          TEXT,
            queued_at      TEXT DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_notification_queue_fire_at
            ON notification_queue(fire_at);

        CREATE TABLE IF NOT EXISTS app_meta (
            key   TEXT PRIMARY KEY,
            value TEXT
        );
    ")?;
    Ok(())
}
