use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveTime};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::notify::plan::ReminderSettings;

fn default_latitude() -> f64 {
    33.6938
}
fn default_longitude() -> f64 {
    73.0651
}
fn default_location_name() -> String {
    "Islamabad".to_string()
}
fn default_calc_method() -> String {
    "MuslimWorldLeague".to_string()
}
fn default_madhab() -> String {
    "Hanafi".to_string()
}
fn default_timezone_offset() -> i32 {
    300
}
fn default_true() -> bool {
    true
}
fn default_lead_minutes() -> i64 {
    30
}
fn default_morning_adhkar() -> String {
    "07:00".to_string()
}
fn default_evening_adhkar() -> String {
    "18:00".to_string()
}
fn default_buffer_secs() -> i64 {
    60
}
fn default_debounce_ms() -> u64 {
    1000
}
fn default_tick_secs() -> u64 {
    30
}
fn default_grace_minutes() -> i64 {
    10
}

const MAX_LEAD_MINUTES: i64 = 24 * 60;
const MIN_DEBOUNCE_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalahConfig {
    #[serde(default = "default_location_name")]
    pub location_name: String,
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    #[serde(default = "default_longitude")]
    pub longitude: f64,
    #[serde(default = "default_calc_method")]
    pub calc_method: String,
    #[serde(default = "default_madhab")]
    pub madhab: String,
    #[serde(default = "default_timezone_offset")]
    pub timezone_offset: i32, // minutes from UTC
}

impl Default for SalahConfig {
    fn default() -> Self {
        Self {
            location_name: default_location_name(),
            latitude: default_latitude(),
            longitude: default_longitude(),
            calc_method: default_calc_method(),
            madhab: default_madhab(),
            timezone_offset: default_timezone_offset(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Notify when each prayer's time begins
    #[serde(default = "default_true")]
    pub prayer_time_reminders: bool,
    /// Nudge before the next prayer if the current one isn't marked yet
    #[serde(default = "default_true")]
    pub missed_prayer_reminders: bool,
    #[serde(default = "default_true")]
    pub adhkar_reminders: bool,
    #[serde(default = "default_lead_minutes")]
    pub missed_reminder_lead_minutes: i64,
    #[serde(default = "default_morning_adhkar")]
    pub morning_adhkar_time: String,
    #[serde(default = "default_evening_adhkar")]
    pub evening_adhkar_time: String,
    /// Anything due sooner than this is left out of a pass
    #[serde(default = "default_buffer_secs")]
    pub schedule_buffer_secs: i64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Late notifications older than this are dropped instead of shown
    #[serde(default = "default_grace_minutes")]
    pub delivery_grace_minutes: i64,
    /// Ask once before showing anything. Off = treat permission as always granted.
    #[serde(default = "default_true")]
    pub require_consent: bool,
    /// Optional program run as `<command> <title> <body>` for each delivery,
    /// e.g. "notify-send"
    #[serde(default)]
    pub deliver_command: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            prayer_time_reminders: true,
            missed_prayer_reminders: true,
            adhkar_reminders: true,
            missed_reminder_lead_minutes: default_lead_minutes(),
            morning_adhkar_time: default_morning_adhkar(),
            evening_adhkar_time: default_evening_adhkar(),
            schedule_buffer_secs: default_buffer_secs(),
            debounce_ms: default_debounce_ms(),
            tick_secs: default_tick_secs(),
            delivery_grace_minutes: default_grace_minutes(),
            require_consent: true,
            deliver_command: None,
        }
    }
}

fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|e| anyhow!("Bad time '{}': {}", s, e))
}

impl NotificationConfig {
    pub fn reminder_settings(&self) -> Result<ReminderSettings> {
        if self.missed_reminder_lead_minutes < 0 {
            return Err(anyhow!(
                "missed_reminder_lead_minutes must not be negative (got {})",
                self.missed_reminder_lead_minutes
            ));
        }
        Ok(ReminderSettings {
            prayer_time_reminders: self.prayer_time_reminders,
            missed_prayer_reminders: self.missed_prayer_reminders,
            adhkar_reminders: self.adhkar_reminders,
            // Prayers are never a day apart
            missed_reminder_lead: Duration::minutes(
                self.missed_reminder_lead_minutes.min(MAX_LEAD_MINUTES),
            ),
            morning_adhkar_at: parse_hhmm(&self.morning_adhkar_time)
                .context("Parsing morning_adhkar_time")?,
            evening_adhkar_at: parse_hhmm(&self.evening_adhkar_time)
                .context("Parsing evening_adhkar_time")?,
        })
    }

    pub fn schedule_buffer(&self) -> Duration {
        Duration::seconds(self.schedule_buffer_secs.clamp(0, 24 * 60 * 60))
    }

    pub fn delivery_grace(&self) -> Duration {
        Duration::minutes(self.delivery_grace_minutes.clamp(0, 24 * 60))
    }

    pub fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_ms.max(MIN_DEBOUNCE_MS))
    }

    pub fn tick(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tick_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub salah: SalahConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl AppConfig {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("", "", "sujood")
            .context("Could not determine project directories")
    }

    pub fn config_path() -> Result<PathBuf> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.config_dir().join("notify.toml"))
    }

    pub fn data_dir() -> Result<PathBuf> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.data_dir().to_path_buf())
    }

    pub fn db_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("sujood.db"))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Reading {:?}", path))?;
        let config: AppConfig = toml::from_str(&content).context("Parsing notify.toml")?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).context("Serializing config")?;
        std::fs::write(path, content).with_context(|| format!("Writing {:?}", path))?;
        Ok(())
    }

    pub fn ensure_data_dir() -> Result<PathBuf> {
        let dir = Self::data_dir()?;
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("notify.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.notifications.missed_reminder_lead_minutes, 30);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notify.toml");
        std::fs::write(
            &path,
            "[notifications]\nmissed_prayer_reminders = false\nmorning_adhkar_time = \"06:15\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert!(!config.notifications.missed_prayer_reminders);
        assert!(config.notifications.prayer_time_reminders);
        assert_eq!(config.salah.location_name, "Islamabad");

        let settings = config.notifications.reminder_settings().unwrap();
        assert_eq!(settings.morning_adhkar_at, NaiveTime::from_hms_opt(6, 15, 0).unwrap());
        assert_eq!(settings.evening_adhkar_at, NaiveTime::from_hms_opt(18, 0, 0).unwrap());
    }

    #[test]
    fn save_then_load_keeps_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("notify.toml");
        let mut config = AppConfig::default();
        config.salah.location_name = "Karachi".to_string();
        config.notifications.deliver_command = Some("notify-send".to_string());
        config.save_to(&path).unwrap();

        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn rejects_bad_adhkar_time() {
        let mut config = NotificationConfig::default();
        config.evening_adhkar_time = "6pm".to_string();
        assert!(config.reminder_settings().is_err());
    }

    #[test]
    fn out_of_range_numbers_are_clamped() {
        let mut config = NotificationConfig::default();
        config.missed_reminder_lead_minutes = i64::MAX;
        config.debounce_ms = 0;
        config.schedule_buffer_secs = i64::MAX;
        config.delivery_grace_minutes = -5;

        let settings = config.reminder_settings().unwrap();
        assert_eq!(settings.missed_reminder_lead, Duration::hours(24));
        assert_eq!(config.debounce(), std::time::Duration::from_secs(1));
        assert_eq!(config.schedule_buffer(), Duration::hours(24));
        assert_eq!(config.delivery_grace(), Duration::zero());
    }
}
