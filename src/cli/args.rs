use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "sujood-notify", version, author, about = "Prayer time reminders that know what you've already prayed")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show today's prayer times and the reminders queued for them
    Times,
    /// Mark a prayer as done or missed and refresh reminders
    Mark {
        /// Prayer name (fajr, dhuhr, asr, maghrib, isha)
        prayer: String,
        /// Mark as missed instead of done
        #[arg(long)]
        missed: bool,
    },
    /// Turn reminders on (asks for permission if needed)
    Enable,
    /// Turn reminders off and cancel everything queued
    Disable,
    /// Show whether reminders are on and what is queued
    Status,
    /// Bring today's reminders up to date
    Sync {
        /// Rebuild even if today was already scheduled
        #[arg(long)]
        force: bool,
    },
    /// Show what would be scheduled, without touching the queue
    Preview {
        /// Pretend it is this time today (HH:MM)
        #[arg(long)]
        at: Option<String>,
    },
    /// Show any reminders that are due now
    Deliver,
    /// Keep running: reschedule on changes and deliver reminders as they fall due
    Run,
    /// Change the location prayer times are computed for
    Location {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Display name, e.g. "Lahore"
        #[arg(long)]
        name: Option<String>,
        /// Offset from UTC, e.g. "+5", "5:30", "-4"
        #[arg(long, allow_hyphen_values = true)]
        tz_offset: Option<String>,
    },
    /// Choose which kinds of reminder to receive
    Settings {
        /// Notify when each prayer time begins
        #[arg(long)]
        prayer_times: Option<bool>,
        /// Nudge before the next prayer if the current one isn't marked
        #[arg(long)]
        missed: Option<bool>,
        /// Morning and evening adhkar reminders
        #[arg(long)]
        adhkar: Option<bool>,
    },
}
