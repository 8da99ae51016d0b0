use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::PrayerType;

pub type NotificationId = i32;

pub const PRAYER_TIME_SLOTS: [NotificationId; 5] = [1, 2, 3, 4, 5];
pub const MISSED_REMINDER_SLOTS: [NotificationId; 4] = [101, 102, 103, 104];
pub const ADHKAR_MORNING_SLOT: NotificationId = 200;
pub const ADHKAR_EVENING_SLOT: NotificationId = 201;

/// Every id the scheduler can ever hand out.
pub fn all_slot_ids() -> Vec<NotificationId> {
    PRAYER_TIME_SLOTS
        .iter()
        .chain(MISSED_REMINDER_SLOTS.iter())
        .copied()
        .chain([ADHKAR_MORNING_SLOT, ADHKAR_EVENING_SLOT])
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PrayerTime,
    MissedReminder,
    AdhkarMorning,
    AdhkarEvening,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::PrayerTime => "prayer_time",
            NotificationKind::MissedReminder => "missed_reminder",
            NotificationKind::AdhkarMorning => "adhkar_morning",
            NotificationKind::AdhkarEvening => "adhkar_evening",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prayer_time" => Ok(NotificationKind::PrayerTime),
            "missed_reminder" => Ok(NotificationKind::MissedReminder),
            "adhkar_morning" => Ok(NotificationKind::AdhkarMorning),
            "adhkar_evening" => Ok(NotificationKind::AdhkarEvening),
            _ => Err(anyhow::anyhow!("Unknown notification kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub related_prayer: Option<PrayerType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledNotification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub fire_at: NaiveDateTime,
    pub payload: NotificationPayload,
}

impl ScheduledNotification {
    /// Extra data handed to the platform alongside title and body.
    pub fn extra(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": self.kind.as_str(),
            "prayer": self.payload.related_prayer.map(|p| p.as_str()),
        })
    }
}
