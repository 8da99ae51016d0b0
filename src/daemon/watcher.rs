//! Hot reload for `notify.toml`.
//!
//! Editors save in several steps (temp file, rename, chmod), so events are
//! collapsed through a [`Debouncer`] before the daemon hears about them.

use anyhow::{Context, Result};
use log::{debug, info};
use notify::{Config as NotifyConfig, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

use super::events::Event;
use crate::notify::Debouncer;

const SETTLE: Duration = Duration::from_millis(500);

pub struct ConfigWatcher {
    config_path: PathBuf,
    events: Sender<Event>,
}

impl ConfigWatcher {
    pub fn new(config_path: PathBuf, events: Sender<Event>) -> Self {
        Self {
            config_path,
            events,
        }
    }

    /// Start watching in a background thread. The watcher lives as long as
    /// the daemon's event channel does.
    pub fn start(self) -> Result<()> {
        let dir = self
            .config_path
            .parent()
            .map(|p| p.to_path_buf())
            .context("Config path has no parent directory")?;
        let file_name: OsString = self
            .config_path
            .file_name()
            .map(|n| n.to_os_string())
            .context("Config path has no file name")?;

        // The file may not exist yet; watching its directory catches creation
        std::fs::create_dir_all(&dir).with_context(|| format!("Creating {:?}", dir))?;

        let (tx, rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| {
                if let Ok(event) = res {
                    match event.kind {
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
                            let _ = tx.send(event);
                        }
                        _ => {}
                    }
                }
            },
            NotifyConfig::default(),
        )
        .context("Failed to create file watcher")?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {:?}", dir))?;

        info!("Watching {:?} for changes", self.config_path);
        let events = self.events;

        thread::spawn(move || {
            // Dropping the watcher stops the events
            let _watcher = watcher;
            let debouncer = Debouncer::new(SETTLE);

            for event in rx {
                let ours = event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(file_name.as_os_str()));
                if !ours {
                    continue;
                }
                debug!("Config file event: {:?}", event.kind);
                let tx = events.clone();
                debouncer.trigger(move || {
                    let _ = tx.send(Event::ConfigChanged);
                });
            }
        });

        Ok(())
    }
}
