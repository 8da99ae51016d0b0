//! Works out which notifications should exist right now. No I/O here: the
//! same inputs always give the same list.

use anyhow::{bail, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::notification::{
    ADHKAR_EVENING_SLOT, ADHKAR_MORNING_SLOT, MISSED_REMINDER_SLOTS, PRAYER_TIME_SLOTS,
};
use crate::models::{
    CompletionSnapshot, NotificationKind, NotificationPayload, PrayerTime, PrayerType,
    ScheduledNotification,
};

/// Which kinds of reminder the user wants, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderSettings {
    pub prayer_time_reminders: bool,
    pub missed_prayer_reminders: bool,
    pub adhkar_reminders: bool,
    /// How long before the next prayer to nudge about an unmarked one
    pub missed_reminder_lead: Duration,
    pub morning_adhkar_at: NaiveTime,
    pub evening_adhkar_at: NaiveTime,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            prayer_time_reminders: true,
            missed_prayer_reminders: true,
            adhkar_reminders: true,
            missed_reminder_lead: Duration::minutes(30),
            morning_adhkar_at: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or(NaiveTime::MIN),
            evening_adhkar_at: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// The time source is trusted for content, not for shape.
pub fn validate_prayers(prayers: &[PrayerTime]) -> Result<()> {
    if prayers.len() != PRAYER_TIME_SLOTS.len() {
        bail!(
            "expected {} prayers, got {}",
            PRAYER_TIME_SLOTS.len(),
            prayers.len()
        );
    }
    for (prayer, expected) in prayers.iter().zip(PrayerType::all()) {
        if prayer.prayer_type != expected {
            bail!("expected {} but found {}", expected, prayer.prayer_type);
        }
    }
    for pair in prayers.windows(2) {
        if pair[0].time >= pair[1].time {
            bail!(
                "{} ({}) is not before {} ({})",
                pair[0].prayer_type,
                pair[0].time.format("%H:%M"),
                pair[1].prayer_type,
                pair[1].time.format("%H:%M")
            );
        }
    }
    Ok(())
}

/// Every notification that should be pending at `now`, ordered by slot.
///
/// Anything whose time is not after `now` is left out. Callers are expected
/// to have cancelled every slot first, so leaving one out cancels it.
pub fn compute_plan(
    today: NaiveDate,
    now: NaiveDateTime,
    prayers: &[PrayerTime],
    completion: &CompletionSnapshot,
    settings: &ReminderSettings,
) -> Vec<ScheduledNotification> {
    let mut plan = Vec::new();

    if settings.prayer_time_reminders {
        for (prayer, &id) in prayers.iter().zip(PRAYER_TIME_SLOTS.iter()) {
            let fire_at = today.and_time(prayer.time);
            if fire_at <= now {
                continue;
            }
            plan.push(ScheduledNotification {
                id,
                kind: NotificationKind::PrayerTime,
                fire_at,
                payload: NotificationPayload {
                    title: format!("{} · {}", prayer.prayer_type, prayer.arabic_label),
                    body: format!("It's time for {}.", prayer.prayer_type),
                    related_prayer: Some(prayer.prayer_type),
                },
            });
        }
    }

    if settings.missed_prayer_reminders {
        let pairs = prayers.windows(2).zip(MISSED_REMINDER_SLOTS.iter());
        for (pair, &id) in pairs {
            let (current, next) = (&pair[0], &pair[1]);
            if completion.is_handled(current.prayer_type) {
                continue;
            }
            let Some(fire_at) = today
                .and_time(next.time)
                .checked_sub_signed(settings.missed_reminder_lead)
            else {
                continue;
            };
            // A lead longer than the gap would nag before the prayer even began
            if fire_at <= today.and_time(current.time) || fire_at <= now {
                continue;
            }
            plan.push(ScheduledNotification {
                id,
                kind: NotificationKind::MissedReminder,
                fire_at,
                payload: NotificationPayload {
                    title: format!("Have you prayed {}?", current.prayer_type),
                    body: format!(
                        "{} begins in {} minutes. Mark {} once you've prayed.",
                        next.prayer_type,
                        settings.missed_reminder_lead.num_minutes(),
                        current.prayer_type
                    ),
                    related_prayer: Some(current.prayer_type),
                },
            });
        }
    }

    if settings.adhkar_reminders {
        let adhkar = [
            (
                ADHKAR_MORNING_SLOT,
                NotificationKind::AdhkarMorning,
                settings.morning_adhkar_at,
                "Morning Adhkar",
            ),
            (
                ADHKAR_EVENING_SLOT,
                NotificationKind::AdhkarEvening,
                settings.evening_adhkar_at,
                "Evening Adhkar",
            ),
        ];
        for (id, kind, at, title) in adhkar {
            let fire_at = today.and_time(at);
            if fire_at <= now {
                continue;
            }
            plan.push(ScheduledNotification {
                id,
                kind,
                fire_at,
                payload: NotificationPayload {
                    title: title.to_string(),
                    body: format!("A few minutes for the {}.", title.to_lowercase()),
                    related_prayer: None,
                },
            });
        }
    }

    plan
}
