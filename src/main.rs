mod cli;
mod config;
mod daemon;
mod db;
mod models;
mod notify;
mod prayer_times;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use rusqlite::Connection;

use cli::args::{Cli, Commands};
use cli::context::AppContext;
use cli::handlers;
use config::AppConfig;
use db::migrations::run_migrations;

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("Loading config")?;

    // Ensure data directory exists and open DB
    AppConfig::ensure_data_dir()?;
    let db_path = AppConfig::db_path()?;
    let conn = Connection::open(&db_path)
        .with_context(|| format!("Opening database at {:?}", db_path))?;

    // The daemon and one-off commands share this file
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;

    run_migrations(&conn)?;

    let mut ctx = AppContext::new(db::shared(conn), config)?;

    match cli.command {
        Commands::Times => handlers::handle_times(&ctx)?,
        Commands::Mark { prayer, missed } => handlers::handle_mark(&ctx, &prayer, missed)?,
        Commands::Enable => handlers::handle_enable(&ctx)?,
        Commands::Disable => handlers::handle_disable(&ctx)?,
        Commands::Status => handlers::handle_status(&ctx)?,
        Commands::Sync { force } => handlers::handle_sync(&ctx, force)?,
        Commands::Preview { at } => handlers::handle_preview(&ctx, at.as_deref())?,
        Commands::Deliver => handlers::handle_deliver(&ctx)?,
        Commands::Run => daemon::run(ctx)?,
        Commands::Location {
            lat,
            lng,
            name,
            tz_offset,
        } => handlers::handle_location(&mut ctx, lat, lng, name.as_deref(), tz_offset.as_deref())?,
        Commands::Settings {
            prayer_times,
            missed,
            adhkar,
        } => handlers::handle_settings(&mut ctx, prayer_times, missed, adhkar)?,
    }

    Ok(())
}
