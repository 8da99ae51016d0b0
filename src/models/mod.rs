pub mod notification;
pub mod prayer;

pub use notification::{
    NotificationId, NotificationKind, NotificationPayload, ScheduledNotification,
};
pub use prayer::{CompletionSnapshot, Prayer, PrayerStatus, PrayerTime, PrayerType};
