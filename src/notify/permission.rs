use anyhow::Result;
use log::{debug, info, warn};
use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Mutex;

use crate::db::repository::MetaRepo;
use crate::db::{lock, SharedConnection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Unknown,
}

impl PermissionStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionStatus::Granted => "granted",
            PermissionStatus::Denied => "denied",
            PermissionStatus::Unknown => "unknown",
        }
    }
}

/// What the host offers for asking the user.
pub trait PermissionPlatform: Send + Sync {
    /// Current decision, without asking anyone.
    fn query(&self) -> Result<PermissionStatus>;
    /// Ask the user. May block for as long as they take to answer.
    fn prompt(&self) -> Result<PermissionStatus>;
}

/// Wraps a platform so the user is asked at most once per process.
///
/// Platform errors never escape: they are logged and read as `Denied`.
pub struct PermissionGateway {
    platform: Box<dyn PermissionPlatform>,
    requested: Mutex<Option<PermissionStatus>>,
}

impl PermissionGateway {
    pub fn new(platform: Box<dyn PermissionPlatform>) -> Self {
        Self {
            platform,
            requested: Mutex::new(None),
        }
    }

    pub fn check_permission(&self) -> PermissionStatus {
        match self.platform.query() {
            Ok(status) => status,
            Err(e) => {
                warn!("Permission check failed, treating as denied: {:#}", e);
                PermissionStatus::Denied
            }
        }
    }

    /// Returns `Granted` or `Denied`. Only the first call reaches the platform;
    /// later calls replay that answer even if the user changed it since.
    pub fn request_permission(&self) -> PermissionStatus {
        // Held across the prompt so a second caller waits for the first answer
        let mut requested = self
            .requested
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(status) = *requested {
            debug!("Permission already requested this session: {}", status.as_str());
            return status;
        }

        let status = match self.platform.prompt() {
            Ok(PermissionStatus::Granted) => PermissionStatus::Granted,
            Ok(_) => PermissionStatus::Denied,
            Err(e) => {
                warn!("Permission request failed, treating as denied: {:#}", e);
                PermissionStatus::Denied
            }
        };
        info!("Notification permission {}", status.as_str());
        *requested = Some(status);
        status
    }
}

/// Hosts with no permission concept at all.
pub struct UnsupportedPlatform;

impl PermissionPlatform for UnsupportedPlatform {
    fn query(&self) -> Result<PermissionStatus> {
        Ok(PermissionStatus::Granted)
    }

    fn prompt(&self) -> Result<PermissionStatus> {
        Ok(PermissionStatus::Granted)
    }
}

const CONSENT_KEY: &str = "notification_consent";

/// Asks on the terminal and remembers the answer in `app_meta`.
pub struct TerminalConsent {
    conn: SharedConnection,
}

impl TerminalConsent {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Drop the remembered answer so the next prompt asks again.
    pub fn forget(&self) -> Result<()> {
        MetaRepo::set(&lock(&self.conn), CONSENT_KEY, "")
    }

    fn recorded(&self) -> Result<PermissionStatus> {
        let value = MetaRepo::get(&lock(&self.conn), CONSENT_KEY)?;
        Ok(match value.as_deref() {
            Some("granted") => PermissionStatus::Granted,
            Some("denied") => PermissionStatus::Denied,
            _ => PermissionStatus::Unknown,
        })
    }

    fn record(&self, status: PermissionStatus) -> Result<()> {
        MetaRepo::set(&lock(&self.conn), CONSENT_KEY, status.as_str())
    }
}

impl PermissionPlatform for TerminalConsent {
    fn query(&self) -> Result<PermissionStatus> {
        self.recorded()
    }

    fn prompt(&self) -> Result<PermissionStatus> {
        let recorded = self.recorded()?;
        if recorded != PermissionStatus::Unknown {
            return Ok(recorded);
        }
        if !io::stdin().is_terminal() {
            debug!("stdin is not a terminal, cannot ask for notification consent");
            return Ok(PermissionStatus::Denied);
        }

        let answer = prompt("  Allow sujood to show prayer reminders? [y/N] ")?;
        let status = match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => PermissionStatus::Granted,
            _ => PermissionStatus::Denied,
        };
        self.record(status)?;
        Ok(status)
    }
}

fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut buf = String::new();
    io::stdin().lock().read_line(&mut buf)?;
    Ok(buf.trim_end_matches('\n').trim_end_matches('\r').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedPlatform {
        current: Arc<Mutex<PermissionStatus>>,
        answer: PermissionStatus,
        prompts: Arc<AtomicUsize>,
    }

    impl ScriptedPlatform {
        fn new(answer: PermissionStatus) -> Self {
            Self {
                current: Arc::new(Mutex::new(PermissionStatus::Unknown)),
                answer,
                prompts: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl PermissionPlatform for ScriptedPlatform {
        fn query(&self) -> Result<PermissionStatus> {
            Ok(*self.current.lock().unwrap())
        }

        fn prompt(&self) -> Result<PermissionStatus> {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            *self.current.lock().unwrap() = self.answer;
            Ok(self.answer)
        }
    }

    struct BrokenPlatform;

    impl PermissionPlatform for BrokenPlatform {
        fn query(&self) -> Result<PermissionStatus> {
            Err(anyhow!("permission service unavailable"))
        }

        fn prompt(&self) -> Result<PermissionStatus> {
            Err(anyhow!("permission service unavailable"))
        }
    }

    #[test]
    fn prompts_only_once() {
        let platform = ScriptedPlatform::new(PermissionStatus::Granted);
        let prompts = platform.prompts.clone();
        let gateway = PermissionGateway::new(Box::new(platform));

        assert_eq!(gateway.check_permission(), PermissionStatus::Unknown);
        assert_eq!(gateway.request_permission(), PermissionStatus::Granted);
        assert_eq!(gateway.request_permission(), PermissionStatus::Granted);
        assert_eq!(prompts.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.check_permission(), PermissionStatus::Granted);
    }

    #[test]
    fn cached_answer_survives_external_change() {
        let platform = ScriptedPlatform::new(PermissionStatus::Denied);
        let current = platform.current.clone();
        let prompts = platform.prompts.clone();
        let gateway = PermissionGateway::new(Box::new(platform));
        assert_eq!(gateway.request_permission(), PermissionStatus::Denied);

        // User flips it in system settings
        *current.lock().unwrap() = PermissionStatus::Granted;

        assert_eq!(gateway.check_permission(), PermissionStatus::Granted);
        assert_eq!(gateway.request_permission(), PermissionStatus::Denied);
        assert_eq!(prompts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn errors_read_as_denied() {
        let gateway = PermissionGateway::new(Box::new(BrokenPlatform));
        assert_eq!(gateway.check_permission(), PermissionStatus::Denied);
        assert_eq!(gateway.request_permission(), PermissionStatus::Denied);
    }

    #[test]
    fn unsupported_platform_is_always_granted() {
        let gateway = PermissionGateway::new(Box::new(UnsupportedPlatform));
        assert!(gateway.check_permission().is_granted());
        assert!(gateway.request_permission().is_granted());
    }

    #[test]
    fn terminal_consent_replays_recorded_answer() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let consent = TerminalConsent::new(crate::db::shared(conn));

        assert_eq!(consent.query().unwrap(), PermissionStatus::Unknown);
        consent.record(PermissionStatus::Granted).unwrap();
        assert_eq!(consent.query().unwrap(), PermissionStatus::Granted);
        assert_eq!(consent.prompt().unwrap(), PermissionStatus::Granted);

        consent.forget().unwrap();
        assert_eq!(consent.query().unwrap(), PermissionStatus::Unknown);
    }
}
