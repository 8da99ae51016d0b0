pub mod events;
pub mod watcher;

use anyhow::Result;
use chrono::NaiveDate;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::mpsc::Sender;

use crate::cli::context::AppContext;
use crate::config::AppConfig;
use crate::db::lock;
use crate::models::CompletionSnapshot;
use crate::notify::{Debouncer, PassOutcome};
use events::{Event, EventHandler};
use watcher::ConfigWatcher;

const DAYS_CACHED_AHEAD: u32 = 7;

/// Long-running half of the app: keeps the queue in step with completion
/// marks, config edits and the date, and hands out reminders as they fall due.
pub struct Daemon {
    ctx: AppContext,
    config_path: Option<PathBuf>,
    debouncer: Debouncer,
    events: Sender<Event>,
    last_completion: CompletionSnapshot,
    last_day: NaiveDate,
}

impl Daemon {
    pub fn new(ctx: AppContext, config_path: Option<PathBuf>, events: Sender<Event>) -> Result<Self> {
        let today = ctx.today();
        if let Err(e) = ctx.calc.ensure_cached(&lock(&ctx.conn), today, DAYS_CACHED_AHEAD) {
            warn!("Could not pre-compute prayer times: {:#}", e);
        }
        let last_completion = ctx.completion()?;
        let debouncer = Debouncer::new(ctx.config.notifications.debounce());
        Ok(Self {
            ctx,
            config_path,
            debouncer,
            events,
            last_completion,
            last_day: today,
        })
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Never fails: a tick that can't read something logs it and the next
    /// tick tries again.
    pub fn on_tick(&mut self) {
        // Other processes may have run enable/disable
        self.ctx.scheduler.reload_state();

        let today = self.ctx.today();
        if today != self.last_day {
            info!("New day {}, caching prayer times ahead", today);
            if let Err(e) =
                self.ctx
                    .calc
                    .ensure_cached(&lock(&self.ctx.conn), today, DAYS_CACHED_AHEAD)
            {
                warn!("Could not pre-compute prayer times: {:#}", e);
            }
            self.last_day = today;
        }

        match self.ctx.completion() {
            Ok(completion) if completion != self.last_completion => {
                debug!("Completion changed, waiting for it to settle");
                self.last_completion = completion;
                let tx = self.events.clone();
                self.debouncer.trigger(move || {
                    let _ = tx.send(Event::CompletionSettled);
                });
            }
            Ok(_) => {}
            Err(e) => warn!("Could not read today's prayer marks: {:#}", e),
        }
        if !self.ctx.scheduler.is_enabled() {
            self.debouncer.cancel();
        }

        self.sync();
        self.deliver();
    }

    pub fn on_completion_settled(&mut self) {
        if !self.ctx.scheduler.is_enabled() {
            return;
        }
        self.ctx.scheduler.force_reschedule();
        self.sync();
    }

    /// Re-read `notify.toml` after the watcher saw it change.
    pub fn on_config_changed(&mut self) {
        let Some(path) = &self.config_path else {
            return;
        };
        match AppConfig::load_from(path) {
            Ok(config) if config != self.ctx.config => {
                info!("Config changed on disk, applying");
                if let Err(e) = self.ctx.apply_config(config) {
                    warn!("Could not apply new config: {:#}", e);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Could not reload config: {:#}", e),
        }
        self.sync();
    }

    fn sync(&self) {
        match self.ctx.sync() {
            Ok(PassOutcome::Scheduled {
                scheduled,
                skipped,
                failed,
            }) => info!(
                "Rescheduled: {} queued, {} skipped, {} failed",
                scheduled, skipped, failed
            ),
            Ok(outcome) => debug!("Pass: {:?}", outcome),
            Err(e) => warn!("Scheduling pass failed: {:#}", e),
        }
    }

    fn deliver(&self) {
        let grace = self.ctx.config.notifications.delivery_grace();
        match self.ctx.spool.deliver_due(self.ctx.clock.now(), grace) {
            Ok(report) => {
                for n in &report.delivered {
                    println!("🔔 {}  {}", n.payload.title, n.payload.body);
                }
                if !report.dropped.is_empty() {
                    debug!("Dropped {} stale reminder(s)", report.dropped.len());
                }
            }
            Err(e) => warn!("Delivery failed: {}", e),
        }
    }
}

/// Block forever, driving the daemon from ticks, settled completion changes
/// and config edits.
pub fn run(ctx: AppContext) -> Result<()> {
    let events = EventHandler::new(ctx.config.notifications.tick());
    let config_path = AppConfig::config_path().ok();
    if let Some(path) = &config_path {
        if let Err(e) = ConfigWatcher::new(path.clone(), events.sender()).start() {
            warn!("Config changes won't be picked up until restart: {:#}", e);
        }
    }
    let mut daemon = Daemon::new(ctx, config_path, events.sender())?;

    info!("Reminder daemon started");
    daemon.on_tick();
    loop {
        match events.next()? {
            Event::Tick => daemon.on_tick(),
            Event::CompletionSettled => daemon.on_completion_settled(),
            Event::ConfigChanged => daemon.on_config_changed(),
        }
    }
}
