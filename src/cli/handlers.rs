use anyhow::{anyhow, Context, Result};
use chrono::NaiveTime;
use std::str::FromStr;
use std::sync::Arc;

use crate::cli::context::AppContext;
use crate::config::AppConfig;
use crate::db::lock;
use crate::db::repository::PrayerRepo;
use crate::models::{PrayerStatus, PrayerType, ScheduledNotification};
use crate::notify::permission::{TerminalConsent, UnsupportedPlatform};
use crate::notify::{
    FixedClock, MemoryBackend, MemoryStateStore, NotificationScheduler, PassOutcome,
    PermissionGateway,
};
use crate::utils::format::{format_duration_secs, format_time};

// ─── ANSI helpers ────────────────────────────────────────────────────────────

macro_rules! println_colored {
    ($color:expr, $($arg:tt)*) => {{
        print!("{}", $color);
        print!($($arg)*);
        println!("\x1b[0m");
    }};
}

const GREEN: &str = "\x1b[32m";
const AMBER: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const GOLD: &str = "\x1b[38;2;196;160;68m";

fn print_outcome(outcome: &PassOutcome) {
    match outcome {
        PassOutcome::Scheduled {
            scheduled,
            skipped,
            failed,
        } => {
            println_colored!(GREEN, "  ✓ {} reminder(s) queued for today", scheduled);
            if *skipped > 0 {
                println_colored!(DIM, "    {} too close to now to queue", skipped);
            }
            if *failed > 0 {
                println_colored!(RED, "    {} could not be queued (see logs)", failed);
            }
        }
        PassOutcome::AlreadyScheduled => {
            println_colored!(DIM, "  Today's reminders are already up to date");
        }
        PassOutcome::Disabled => {
            println_colored!(DIM, "  Reminders are off. Turn them on with `sujood-notify enable`");
        }
        PassOutcome::PermissionDenied => {
            println_colored!(AMBER, "  Reminders need your permission. Run `sujood-notify enable`");
        }
        PassOutcome::NoPrayerData | PassOutcome::InvalidPrayerData => {
            println_colored!(RED, "  ✗ Prayer times unavailable, check your location settings");
        }
        PassOutcome::AlreadyRunning => {
            println_colored!(DIM, "  Another update is in progress");
        }
    }
}

fn print_notification(n: &ScheduledNotification) {
    println!(
        "  {}  {:<28}  {}{}\x1b[0m",
        n.fire_at.format("%H:%M"),
        n.payload.title,
        DIM,
        n.payload.body
    );
}

// ─── Times ───────────────────────────────────────────────────────────────────

pub fn handle_times(ctx: &AppContext) -> Result<()> {
    let now = ctx.clock.now();
    let times = ctx.calc.get_cached_or_compute(&lock(&ctx.conn), now.date())?;

    println!();
    println_colored!(
        GOLD,
        "  Prayer Times · {} ({})",
        ctx.config.salah.location_name,
        now.date().format("%Y-%m-%d")
    );
    println!();

    let prayers_with_times = [
        ("Fajr", times.fajr),
        ("Sunrise", times.sunrise),
        ("Dhuhr", times.zuhr),
        ("Asr", times.asr),
        ("Maghrib", times.maghrib),
        ("Isha", times.isha),
    ];

    for (name, time) in &prayers_with_times {
        if *time < now.time() {
            println_colored!(DIM, "  {:<10}  {}", name, format_time(*time));
        } else {
            println_colored!(BOLD, "  {:<10}  {}", name, format_time(*time));
        }
    }

    if let Some((next_prayer, secs)) = ctx.calc.get_next_prayer(&lock(&ctx.conn), now)? {
        println!();
        println_colored!(
            AMBER,
            "  Next: {} in {}",
            next_prayer.display_name(),
            format_duration_secs(secs)
        );
    }

    let queued = ctx.spool.queued()?;
    println!();
    if queued.is_empty() {
        println_colored!(DIM, "  No reminders queued");
    } else {
        println_colored!(GOLD, "  Reminders");
        for n in &queued {
            print_notification(n);
        }
    }
    println!();
    Ok(())
}

// ─── Mark prayer ─────────────────────────────────────────────────────────────

pub fn handle_mark(ctx: &AppContext, prayer_str: &str, missed: bool) -> Result<()> {
    let prayer_type = PrayerType::from_str(prayer_str).map_err(|_| {
        anyhow!("Unknown prayer '{}'. Use: fajr, dhuhr, asr, maghrib, isha", prayer_str)
    })?;
    let today_str = ctx.today().format("%Y-%m-%d").to_string();

    {
        let conn = lock(&ctx.conn);
        PrayerRepo::ensure_today_rows(&conn, &today_str)?;
        let status = if missed {
            PrayerStatus::Missed
        } else {
            PrayerStatus::Done
        };
        PrayerRepo::mark_status(&conn, prayer_type, &today_str, &status)?;
    }

    if missed {
        println_colored!(RED, "  ✗ {} marked as missed", prayer_type.display_name());
    } else {
        println_colored!(GREEN, "  ✓ {} marked as done", prayer_type.display_name());
    }

    // Its reminder may no longer be wanted
    ctx.scheduler.force_reschedule();
    let outcome = ctx.sync()?;
    if !matches!(outcome, PassOutcome::Scheduled { .. }) {
        print_outcome(&outcome);
    }
    Ok(())
}

// ─── Enable / disable / status ───────────────────────────────────────────────

pub fn handle_enable(ctx: &AppContext) -> Result<()> {
    if ctx.config.notifications.require_consent {
        // Asking explicitly means asking again, even after an earlier "no"
        TerminalConsent::new(ctx.conn.clone()).forget()?;
    }
    if !ctx.scheduler.enable() {
        println_colored!(RED, "  ✗ Permission not granted, reminders stay off");
        return Ok(());
    }
    println_colored!(GREEN, "  ✓ Reminders on");
    print_outcome(&ctx.sync()?);
    Ok(())
}

pub fn handle_disable(ctx: &AppContext) -> Result<()> {
    ctx.scheduler.disable();
    println_colored!(AMBER, "  Reminders off, queue cleared");
    Ok(())
}

pub fn handle_status(ctx: &AppContext) -> Result<()> {
    let state = ctx.scheduler.state();
    let settings = ctx.scheduler.settings();
    let on_off = |b: bool| if b { "on" } else { "off" };

    println!();
    println_colored!(GOLD, "  Reminders");
    println!();
    if state.notifications_enabled {
        println_colored!(GREEN, "  Enabled:        yes");
    } else {
        println_colored!(AMBER, "  Enabled:        no");
    }
    println!(
        "  Permission:     {}",
        match state.permission_granted {
            Some(true) => "granted",
            Some(false) => "denied",
            None => "not asked yet",
        }
    );
    println!(
        "  Last scheduled: {}",
        state
            .last_scheduled_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "never".to_string())
    );
    println!(
        "  Prayer times {} · missed-prayer nudges {} · adhkar {}",
        on_off(settings.prayer_time_reminders),
        on_off(settings.missed_prayer_reminders),
        on_off(settings.adhkar_reminders)
    );

    let queued = ctx.spool.queued()?;
    println!();
    if queued.is_empty() {
        println_colored!(DIM, "  Nothing queued");
    } else {
        for n in &queued {
            print_notification(n);
        }
    }
    println!();
    Ok(())
}

// ─── Sync / preview / deliver ────────────────────────────────────────────────

pub fn handle_sync(ctx: &AppContext, force: bool) -> Result<()> {
    if force {
        ctx.scheduler.force_reschedule();
    }
    print_outcome(&ctx.sync()?);
    Ok(())
}

/// Runs a real pass against a throwaway backend, so the queue is untouched.
pub fn handle_preview(ctx: &AppContext, at: Option<&str>) -> Result<()> {
    let now = match at {
        Some(s) => {
            let time = NaiveTime::parse_from_str(s, "%H:%M")
                .map_err(|e| anyhow!("Bad time '{}': {}. Use HH:MM", s, e))?;
            ctx.today().and_time(time)
        }
        None => ctx.clock.now(),
    };

    let backend = Arc::new(MemoryBackend::new());
    let dry_run = NotificationScheduler::new(
        backend.clone(),
        Box::new(MemoryStateStore::default()),
        PermissionGateway::new(Box::new(UnsupportedPlatform)),
        Arc::new(FixedClock::new(now)),
        ctx.scheduler.settings(),
    )
    .with_buffer(ctx.config.notifications.schedule_buffer());

    let outcome = dry_run.ensure_scheduled(&ctx.prayers(), &ctx.completion()?);

    println!();
    println_colored!(GOLD, "  Preview as of {}", now.format("%H:%M"));
    println!();
    if let PassOutcome::Scheduled { .. } = outcome {
        let pending = backend.pending();
        if pending.is_empty() {
            println_colored!(DIM, "  Nothing left to remind you about today");
        }
        for n in &pending {
            print_notification(n);
        }
    } else {
        print_outcome(&outcome);
    }
    println!();
    Ok(())
}

pub fn handle_deliver(ctx: &AppContext) -> Result<()> {
    let report = ctx
        .spool
        .deliver_due(ctx.clock.now(), ctx.config.notifications.delivery_grace())?;
    for n in &report.delivered {
        println_colored!(GOLD, "  🔔 {}  {}", n.fire_at.format("%H:%M"), n.payload.title);
        println!("     {}", n.payload.body);
    }
    if !report.dropped.is_empty() {
        println_colored!(DIM, "  {} stale reminder(s) dropped", report.dropped.len());
    }
    Ok(())
}

// ─── Location / settings ─────────────────────────────────────────────────────

pub fn handle_location(
    ctx: &mut AppContext,
    lat: f64,
    lng: f64,
    name: Option<&str>,
    tz_offset: Option<&str>,
) -> Result<()> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(anyhow!("Coordinates out of range: {}, {}", lat, lng));
    }

    let mut config = ctx.config.clone();
    config.salah.latitude = lat;
    config.salah.longitude = lng;
    if let Some(name) = name {
        config.salah.location_name = name.to_string();
    }
    if let Some(offset) = tz_offset {
        config.salah.timezone_offset =
            parse_tz_offset(offset).with_context(|| format!("Parsing offset '{}'", offset))?;
    }
    config.save()?;
    ctx.apply_config(config)?;

    println_colored!(
        GREEN,
        "  ✓ Location set to {} ({:.4}, {:.4}, UTC{})",
        ctx.config.salah.location_name,
        lat,
        lng,
        format_tz_offset(ctx.config.salah.timezone_offset)
    );
    print_outcome(&ctx.sync()?);
    Ok(())
}

pub fn handle_settings(
    ctx: &mut AppContext,
    prayer_times: Option<bool>,
    missed: Option<bool>,
    adhkar: Option<bool>,
) -> Result<()> {
    let mut config: AppConfig = ctx.config.clone();
    if let Some(v) = prayer_times {
        config.notifications.prayer_time_reminders = v;
    }
    if let Some(v) = missed {
        config.notifications.missed_prayer_reminders = v;
    }
    if let Some(v) = adhkar {
        config.notifications.adhkar_reminders = v;
    }

    if config == ctx.config {
        return handle_status(ctx);
    }
    config.save()?;
    ctx.apply_config(config)?;
    println_colored!(GREEN, "  ✓ Settings saved");
    print_outcome(&ctx.sync()?);
    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

const MAX_TZ_OFFSET_MINUTES: i32 = 14 * 60;

/// Parse a UTC offset string into total minutes.
/// Accepts: "5:30", "+5:30", "-5:30", "5", "+5", "5.5"
fn parse_tz_offset(s: &str) -> Result<i32> {
    let s = s.trim_start_matches('+');
    let negative = s.starts_with('-');
    let s = s.trim_start_matches('-');
    let sign = if negative { -1 } else { 1 };

    let minutes = if s.contains(':') {
        let mut parts = s.splitn(2, ':');
        let hours: i32 = parts.next().unwrap_or("0").parse()?;
        let mins: i32 = parts.next().unwrap_or("0").parse()?;
        if !(0..60).contains(&mins) {
            return Err(anyhow!("Minutes must be 0-59, got {}", mins));
        }
        hours
            .checked_mul(60)
            .and_then(|h| h.checked_add(mins))
            .ok_or_else(|| anyhow!("Offset out of range"))?
    } else if s.contains('.') {
        let hours: f64 = s.parse()?;
        if !hours.is_finite() || hours.abs() > 14.0 {
            return Err(anyhow!("Offset out of range"));
        }
        (hours * 60.0).round() as i32
    } else {
        let hours: i32 = s.parse()?;
        hours
            .checked_mul(60)
            .ok_or_else(|| anyhow!("Offset out of range"))?
    };

    if minutes > MAX_TZ_OFFSET_MINUTES {
        return Err(anyhow!("Offsets go from -14 to +14 hours"));
    }
    Ok(sign * minutes)
}

/// Format total minutes as "+H:MM" string
fn format_tz_offset(minutes: i32) -> String {
    let sign = if minutes < 0 { "-" } else { "+" };
    let abs = minutes.abs();
    let h = abs / 60;
    let m = abs % 60;
    if m == 0 {
        format!("{}{}", sign, h)
    } else {
        format!("{}{}:{:02}", sign, h, m)
    }
}
