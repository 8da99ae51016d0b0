use anyhow::{anyhow, Result};
use chrono::{NaiveDateTime, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension};
use std::str::FromStr;

use crate::models::{
    CompletionSnapshot, NotificationId, NotificationKind, NotificationPayload, Prayer,
    PrayerStatus, PrayerType, ScheduledNotification,
};

const FIRE_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ─── Cached prayer times ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CachedTimes {
    pub fajr: NaiveTime,
    pub sunrise: NaiveTime,
    pub zuhr: NaiveTime,
    pub asr: NaiveTime,
    pub maghrib: NaiveTime,
    pub isha: NaiveTime,
}

fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| anyhow!("Bad time '{}': {}", s, e))
}

pub struct CacheRepo;

impl CacheRepo {
    pub fn get_times_for_date(conn: &Connection, date: &str) -> Result<Option<CachedTimes>> {
        let row = conn
            .query_row(
                "SELECT fajr, sunrise, zuhr, asr, maghrib, isha FROM prayer_times_cache WHERE date = ?1",
                params![date],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((fajr, sunrise, zuhr, asr, maghrib, isha)) => Ok(Some(CachedTimes {
                fajr: parse_time(&fajr)?,
                sunrise: parse_time(&sunrise)?,
                zuhr: parse_time(&zuhr)?,
                asr: parse_time(&asr)?,
                maghrib: parse_time(&maghrib)?,
                isha: parse_time(&isha)?,
            })),
        }
    }

    /// Cached times are only valid for the location they were computed for.
    pub fn clear_all(conn: &Connection) -> Result<()> {
        conn.execute("DELETE FROM prayer_times_cache", [])?;
        Ok(())
    }

    pub fn store_times(conn: &Connection, date: &str, times: &CachedTimes) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO prayer_times_cache (date, fajr, sunrise, zuhr, asr, maghrib, isha)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                date,
                times.fajr.format("%H:%M").to_string(),
                times.sunrise.format("%H:%M").to_string(),
                times.zuhr.format("%H:%M").to_string(),
                times.asr.format("%H:%M").to_string(),
                times.maghrib.format("%H:%M").to_string(),
                times.isha.format("%H:%M").to_string(),
            ],
        )?;
        Ok(())
    }
}

// ─── Prayer repo ─────────────────────────────────────────────────────────────

pub struct PrayerRepo;

impl PrayerRepo {
    /// Ensure a row exists for each prayer type for the given date (status='pending')
    pub fn ensure_today_rows(conn: &Connection, date: &str) -> Result<()> {
        for pt in PrayerType::all() {
            conn.execute(
                "INSERT OR IGNORE INTO prayers (prayer_type, date, status)
                 VALUES (?1, ?2, 'pending')",
                params![pt.as_str(), date],
            )?;
        }
        Ok(())
    }

    pub fn get_by_date(conn: &Connection, date: &str) -> Result<Vec<Prayer>> {
        let mut stmt = conn.prepare(
            "SELECT id, prayer_type, date, status
             FROM prayers WHERE date = ?1
             ORDER BY CASE prayer_type
               WHEN 'fajr' THEN 1 WHEN 'zuhr' THEN 2 WHEN 'asr' THEN 3
               WHEN 'maghrib' THEN 4 WHEN 'isha' THEN 5 END",
        )?;

        let prayers = stmt.query_map(params![date], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut result = Vec::new();
        for p in prayers {
            let (id, prayer_type, date, status) = p?;
            result.push(Prayer {
                id: Some(id),
                prayer_type: PrayerType::from_str(&prayer_type)
                    .map_err(|e| rusqlite::Error::InvalidParameterName(e.to_string()))?,
                date,
                status: PrayerStatus::from_str(&status)
                    .map_err(|e| rusqlite::Error::InvalidParameterName(e.to_string()))?,
            });
        }
        Ok(result)
    }

    pub fn mark_status(
        conn: &Connection,
        prayer_type: PrayerType,
        date: &str,
        status: &PrayerStatus,
    ) -> Result<()> {
        conn.execute(
            "UPDATE prayers SET status = ?1 WHERE prayer_type = ?2 AND date = ?3",
            params![status.as_str(), prayer_type.as_str(), date],
        )?;
        Ok(())
    }

    /// Read-only view of which prayers are handled on `date`.
    pub fn completion_snapshot(conn: &Connection, date: &str) -> Result<CompletionSnapshot> {
        let prayers = Self::get_by_date(conn, date)?;
        Ok(CompletionSnapshot::from_prayers(&prayers))
    }
}

// ─── Notification queue ──────────────────────────────────────────────────────

pub struct QueueRepo;

impl QueueRepo {
    /// Insert or replace the entry for a slot. A slot only ever holds one notification.
    pub fn upsert(conn: &Connection, notification: &ScheduledNotification) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO notification_queue
                (id, kind, fire_at, title, body, related_prayer, extra)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                notification.id,
                notification.kind.as_str(),
                notification.fire_at.format(FIRE_AT_FORMAT).to_string(),
                notification.payload.title,
                notification.payload.body,
                notification.payload.related_prayer.map(|p| p.as_str()),
                notification.extra().to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn delete_ids(conn: &Connection, ids: &[NotificationId]) -> Result<usize> {
        let mut removed = 0;
        let mut stmt = conn.prepare("DELETE FROM notification_queue WHERE id = ?1")?;
        for id in ids {
            removed += stmt.execute(params![id])?;
        }
        Ok(removed)
    }

    pub fn list_ids(conn: &Connection) -> Result<Vec<NotificationId>> {
        let mut stmt = conn.prepare("SELECT id FROM notification_queue ORDER BY fire_at, id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, NotificationId>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<ScheduledNotification>> {
        Self::query(
            conn,
            "SELECT id, kind, fire_at, title, body, related_prayer
             FROM notification_queue ORDER BY fire_at, id",
            params![],
        )
    }

    /// Everything with `fire_at <= now`, oldest first.
    pub fn list_due(conn: &Connection, now: NaiveDateTime) -> Result<Vec<ScheduledNotification>> {
        Self::query(
            conn,
            "SELECT id, kind, fire_at, title, body, related_prayer
             FROM notification_queue WHERE fire_at <= ?1 ORDER BY fire_at, id",
            params![now.format(FIRE_AT_FORMAT).to_string()],
        )
    }

    fn query(
        conn: &Connection,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<ScheduledNotification>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, |row| {
            Ok((
                row.get::<_, NotificationId>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut result = Vec::new();
        for r in rows {
            let (id, kind, fire_at, title, body, related_prayer) = r?;
            let related_prayer = match related_prayer {
                Some(p) => Some(PrayerType::from_str(&p)?),
                None => None,
            };
            result.push(ScheduledNotification {
                id,
                kind: NotificationKind::from_str(&kind)?,
                fire_at: NaiveDateTime::parse_from_str(&fire_at, FIRE_AT_FORMAT)
                    .map_err(|e| anyhow!("Bad fire_at '{}': {}", fire_at, e))?,
                payload: NotificationPayload {
                    title,
                    body,
                    related_prayer,
                },
            });
        }
        Ok(result)
    }
}

// ─── App meta ────────────────────────────────────────────────────────────────

pub struct MetaRepo;

impl MetaRepo {
    pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
        conn.query_row(
            "SELECT value FROM app_meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(anyhow::Error::from)
    }

    pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO app_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }
}
