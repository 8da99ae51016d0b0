use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::warn;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::repository::{CacheRepo, PrayerRepo};
use crate::db::{lock, SharedConnection};
use crate::models::{CompletionSnapshot, PrayerTime};
use crate::notify::permission::{TerminalConsent, UnsupportedPlatform};
use crate::notify::{
    Clock, MetaStateStore, NotificationScheduler, PassOutcome, PermissionGateway,
    PermissionPlatform, SpoolBackend, SystemClock,
};
use crate::prayer_times::PrayerCalculator;

/// Everything a command needs, wired once per process.
pub struct AppContext {
    pub conn: SharedConnection,
    pub config: AppConfig,
    pub calc: PrayerCalculator,
    pub clock: Arc<dyn Clock>,
    pub spool: Arc<SpoolBackend>,
    pub scheduler: NotificationScheduler,
}

impl AppContext {
    pub fn new(conn: SharedConnection, config: AppConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let spool = Arc::new(SpoolBackend::new(
            conn.clone(),
            config.notifications.deliver_command.clone(),
        ));
        let platform: Box<dyn PermissionPlatform> = if config.notifications.require_consent {
            Box::new(TerminalConsent::new(conn.clone()))
        } else {
            Box::new(UnsupportedPlatform)
        };
        let settings = config
            .notifications
            .reminder_settings()
            .context("Reading [notifications] settings")?;

        let scheduler = NotificationScheduler::new(
            spool.clone(),
            Box::new(MetaStateStore::new(conn.clone())),
            PermissionGateway::new(platform),
            clock.clone(),
            settings,
        )
        .with_buffer(config.notifications.schedule_buffer());
        let calc = PrayerCalculator::from_config(&config.salah)?;

        Ok(Self {
            conn,
            config,
            calc,
            clock,
            spool,
            scheduler,
        })
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.now().date()
    }

    /// Today's prayers, or an empty list if they can't be worked out right now.
    pub fn prayers(&self) -> Vec<PrayerTime> {
        let today = self.today();
        match self.calc.prayers_for(&lock(&self.conn), today) {
            Ok(prayers) => prayers,
            Err(e) => {
                warn!("No prayer times for {}: {:#}", today, e);
                Vec::new()
            }
        }
    }

    pub fn completion(&self) -> Result<CompletionSnapshot> {
        let date = self.today().format("%Y-%m-%d").to_string();
        let conn = lock(&self.conn);
        PrayerRepo::ensure_today_rows(&conn, &date)?;
        PrayerRepo::completion_snapshot(&conn, &date)
    }

    /// One ensure pass with fresh inputs.
    pub fn sync(&self) -> Result<PassOutcome> {
        let prayers = self.prayers();
        let completion = self.completion()?;
        Ok(self.scheduler.ensure_scheduled(&prayers, &completion))
    }

    /// Swap in a changed config. Location changes invalidate cached times;
    /// any change that affects reminder content forces a reschedule.
    /// A config that doesn't validate leaves everything as it was.
    pub fn apply_config(&mut self, config: AppConfig) -> Result<()> {
        let settings = config
            .notifications
            .reminder_settings()
            .context("Reading [notifications] settings")?;
        let moved = config.salah != self.config.salah;
        let calc = if moved {
            Some(PrayerCalculator::from_config(&config.salah)?)
        } else {
            None
        };

        if let Some(calc) = calc {
            CacheRepo::clear_all(&lock(&self.conn))?;
            self.calc = calc;
            self.scheduler.force_reschedule();
        }
        self.scheduler.update_settings(settings);
        self.config = config;
        Ok(())
    }
}
