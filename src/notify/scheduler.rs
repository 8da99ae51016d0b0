use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::models::notification::all_slot_ids;
use crate::models::{CompletionSnapshot, PrayerTime};
use crate::notify::backend::NotificationBackend;
use crate::notify::clock::Clock;
use crate::notify::permission::PermissionGateway;
use crate::notify::plan::{compute_plan, validate_prayers, ReminderSettings};
use crate::notify::state::{SchedulerState, StateStore};

/// What a call to [`NotificationScheduler::ensure_scheduled`] ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Notifications are switched off; everything was cancelled.
    Disabled,
    /// Prayer times aren't loaded yet.
    NoPrayerData,
    /// The time source handed over something that isn't five ordered prayers.
    InvalidPrayerData,
    /// Another pass holds the lock. Not queued.
    AlreadyRunning,
    /// Today is already done.
    AlreadyScheduled,
    /// No permission; the next trigger tries again.
    PermissionDenied,
    Scheduled {
        scheduled: usize,
        /// Due too soon to be worth handing to the backend
        skipped: usize,
        failed: usize,
    },
}

/// Releases the in-progress flag however the pass exits.
struct PassGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> PassGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Keeps the backend's pending notifications in line with today's prayers,
/// what the user has already prayed, and their settings.
///
/// Safe to share between threads. Every trigger calls
/// [`ensure_scheduled`](Self::ensure_scheduled); at most one pass per day
/// reaches the backend unless [`force_reschedule`](Self::force_reschedule)
/// resets the day.
pub struct NotificationScheduler {
    backend: Arc<dyn NotificationBackend>,
    store: Box<dyn StateStore>,
    permissions: PermissionGateway,
    clock: Arc<dyn Clock>,
    settings: Mutex<ReminderSettings>,
    buffer: Duration,
    state: Mutex<SchedulerState>,
    is_scheduling: AtomicBool,
}

impl NotificationScheduler {
    pub fn new(
        backend: Arc<dyn NotificationBackend>,
        store: Box<dyn StateStore>,
        permissions: PermissionGateway,
        clock: Arc<dyn Clock>,
        settings: ReminderSettings,
    ) -> Self {
        let state = store.load().unwrap_or_else(|e| {
            warn!("Could not load scheduler state, starting fresh: {:#}", e);
            SchedulerState::default()
        });
        Self {
            backend,
            store,
            permissions,
            clock,
            settings: Mutex::new(settings),
            buffer: Duration::seconds(60),
            state: Mutex::new(state),
            is_scheduling: AtomicBool::new(false),
        }
    }

    /// Notifications due sooner than `buffer` after "now" are not scheduled.
    pub fn with_buffer(mut self, buffer: Duration) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Pick up changes another process wrote to the store.
    pub fn reload_state(&self) {
        match self.store.load() {
            Ok(stored) => {
                *self
                    .state
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) = stored;
            }
            Err(e) => warn!("Could not reload scheduler state: {:#}", e),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state().notifications_enabled
    }

    pub fn settings(&self) -> ReminderSettings {
        self.settings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Apply `change` and write the result through to the store. Returns
    /// whatever `change` returns.
    fn update_state<T>(&self, change: impl FnOnce(&mut SchedulerState) -> T) -> T {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let result = change(&mut state);
        if let Err(e) = self.store.save(&state) {
            warn!("Could not persist scheduler state: {:#}", e);
        }
        result
    }

    /// Switch notifications on. True iff permission ends up granted; without
    /// it notifications stay off.
    pub fn enable(&self) -> bool {
        let granted = self.ensure_permission();
        if granted {
            self.update_state(|s| {
                s.notifications_enabled = true;
                s.last_scheduled_date = None;
            });
            info!("Notifications enabled");
        }
        granted
    }

    /// Switch notifications off and cancel everything right away.
    pub fn disable(&self) {
        self.update_state(|s| {
            s.notifications_enabled = false;
            s.last_scheduled_date = None;
        });
        self.cancel_everything();
        info!("Notifications disabled");
    }

    /// Forget that today was scheduled. The next pass cancels and rebuilds.
    pub fn force_reschedule(&self) {
        self.update_state(|s| s.last_scheduled_date = None);
        debug!("Reschedule forced");
    }

    /// Returns true when the settings changed and a reschedule was forced.
    pub fn update_settings(&self, settings: ReminderSettings) -> bool {
        {
            let mut current = self
                .settings
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if *current == settings {
                return false;
            }
            *current = settings;
        }
        self.force_reschedule();
        true
    }

    /// Make the backend reflect the current inputs. Cheap to call on every
    /// relevant change.
    pub fn ensure_scheduled(
        &self,
        prayers: &[PrayerTime],
        completion: &CompletionSnapshot,
    ) -> PassOutcome {
        if !self.is_enabled() {
            self.cancel_everything();
            self.update_state(|s| s.last_scheduled_date = None);
            return PassOutcome::Disabled;
        }

        if prayers.is_empty() {
            debug!("No prayer times yet, nothing to schedule");
            return PassOutcome::NoPrayerData;
        }
        if let Err(e) = validate_prayers(prayers) {
            warn!("Ignoring prayer times: {:#}", e);
            return PassOutcome::InvalidPrayerData;
        }

        let Some(_guard) = PassGuard::acquire(&self.is_scheduling) else {
            debug!("Scheduling pass already running, skipping");
            return PassOutcome::AlreadyRunning;
        };

        let now = self.clock.now();
        let today = now.date();
        if self.state().last_scheduled_date == Some(today) {
            return PassOutcome::AlreadyScheduled;
        }

        if !self.ensure_permission() {
            debug!("Notification permission not granted, will retry on next trigger");
            return PassOutcome::PermissionDenied;
        }

        self.run_pass(today, now, prayers, completion)
    }

    fn ensure_permission(&self) -> bool {
        let mut status = self.permissions.check_permission();
        if !status.is_granted() {
            status = self.permissions.request_permission();
        }
        let granted = status.is_granted();
        if self.state().permission_granted != Some(granted) {
            self.update_state(|s| s.permission_granted = Some(granted));
        }
        granted
    }

    fn run_pass(
        &self,
        today: NaiveDate,
        now: NaiveDateTime,
        prayers: &[PrayerTime],
        completion: &CompletionSnapshot,
    ) -> PassOutcome {
        // Old notifications for a slot must be gone before the new ones go in
        if let Err(e) = self.backend.cancel(&all_slot_ids()) {
            warn!("Could not cancel previous notifications: {}", e);
        }

        let plan = compute_plan(today, now, prayers, completion, &self.settings());
        let cutoff = now + self.buffer;
        let (mut scheduled, mut skipped, mut failed) = (0, 0, 0);

        for notification in &plan {
            if notification.fire_at < cutoff {
                debug!(
                    "Notification {} at {} is too close to schedule",
                    notification.id, notification.fire_at
                );
                skipped += 1;
                continue;
            }
            match self.backend.schedule_at(notification) {
                Ok(()) => scheduled += 1,
                Err(e) => {
                    warn!("Could not schedule notification {}: {}", notification.id, e);
                    failed += 1;
                }
            }
        }

        let committed = self.update_state(|s| {
            if s.notifications_enabled {
                s.last_scheduled_date = Some(today);
                true
            } else {
                false
            }
        });
        if !committed {
            // disable() landed while we were scheduling
            self.cancel_everything();
            return PassOutcome::Disabled;
        }

        info!(
            "Scheduled {} notification(s) for {} ({} skipped, {} failed)",
            scheduled, today, skipped, failed
        );
        PassOutcome::Scheduled {
            scheduled,
            skipped,
            failed,
        }
    }

    /// Every fixed slot plus anything else the backend still holds.
    fn cancel_everything(&self) {
        let mut ids = all_slot_ids();
        match self.backend.list_pending() {
            Ok(pending) => {
                for id in pending {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
            Err(e) => warn!("Could not list pending notifications: {}", e),
        }
        if let Err(e) = self.backend.cancel(&ids) {
            warn!("Could not cancel notifications: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        NotificationId, NotificationKind, PrayerType, ScheduledNotification,
    };
    use crate::notify::backend::{BackendError, MemoryBackend};
    use crate::notify::clock::FixedClock;
    use crate::notify::permission::{PermissionPlatform, PermissionStatus};
    use crate::notify::state::MemoryStateStore;
    use chrono::NaiveTime;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc::{self, Receiver, Sender};

    /// Memory backend that counts calls, can fail chosen ids and can park
    /// the first cancel until released.
    #[derive(Default)]
    struct CountingBackend {
        inner: MemoryBackend,
        cancels: AtomicUsize,
        schedules: AtomicUsize,
        fail_ids: Vec<NotificationId>,
        gate: Option<(Mutex<Sender<()>>, Mutex<Receiver<()>>)>,
    }

    impl CountingBackend {
        fn pending(&self) -> Vec<ScheduledNotification> {
            self.inner.pending()
        }

        fn cancels(&self) -> usize {
            self.cancels.load(Ordering::SeqCst)
        }

        fn schedules(&self) -> usize {
            self.schedules.load(Ordering::SeqCst)
        }
    }

    impl NotificationBackend for CountingBackend {
        fn schedule_at(&self, n: &ScheduledNotification) -> Result<(), BackendError> {
            self.schedules.fetch_add(1, Ordering::SeqCst);
            if self.fail_ids.contains(&n.id) {
                return Err(BackendError::Rejected {
                    id: n.id,
                    reason: "quota exceeded".to_string(),
                });
            }
            self.inner.schedule_at(n)
        }

        fn cancel(&self, ids: &[NotificationId]) -> Result<(), BackendError> {
            if self.cancels.fetch_add(1, Ordering::SeqCst) == 0 {
                if let Some((entered, release)) = &self.gate {
                    entered.lock().unwrap().send(()).unwrap();
                    release.lock().unwrap().recv().unwrap();
                }
            }
            self.inner.cancel(ids)
        }

        fn list_pending(&self) -> Result<Vec<NotificationId>, BackendError> {
            self.inner.list_pending()
        }
    }

    struct Answer {
        status: PermissionStatus,
        prompts: Arc<AtomicUsize>,
    }

    impl PermissionPlatform for Answer {
        fn query(&self) -> anyhow::Result<PermissionStatus> {
            Ok(if self.prompts.load(Ordering::SeqCst) > 0 {
                self.status
            } else {
                PermissionStatus::Unknown
            })
        }

        fn prompt(&self) -> anyhow::Result<PermissionStatus> {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            Ok(self.status)
        }
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn prayers() -> Vec<PrayerTime> {
        vec![
            PrayerTime::new(PrayerType::Fajr, hm(5, 0)),
            PrayerTime::new(PrayerType::Zuhr, hm(13, 0)),
            PrayerTime::new(PrayerType::Asr, hm(16, 30)),
            PrayerTime::new(PrayerType::Maghrib, hm(19, 45)),
            PrayerTime::new(PrayerType::Isha, hm(21, 15)),
        ]
    }

    struct Harness {
        scheduler: Arc<NotificationScheduler>,
        backend: Arc<CountingBackend>,
        clock: Arc<FixedClock>,
        prompts: Arc<AtomicUsize>,
    }

    fn harness_with(backend: CountingBackend, permission: PermissionStatus) -> Harness {
        let backend = Arc::new(backend);
        let clock = Arc::new(FixedClock::new(day(16).and_time(hm(12, 0))));
        let prompts = Arc::new(AtomicUsize::new(0));
        let gateway = PermissionGateway::new(Box::new(Answer {
            status: permission,
            prompts: prompts.clone(),
        }));
        let scheduler = NotificationScheduler::new(
            backend.clone(),
            Box::new(MemoryStateStore::default()),
            gateway,
            clock.clone(),
            ReminderSettings::default(),
        );
        Harness {
            scheduler: Arc::new(scheduler),
            backend,
            clock,
            prompts,
        }
    }

    fn harness() -> Harness {
        harness_with(CountingBackend::default(), PermissionStatus::Granted)
    }

    fn pending_ids(h: &Harness) -> Vec<NotificationId> {
        let mut ids: Vec<_> = h.backend.pending().iter().map(|n| n.id).collect();
        ids.sort();
        ids
    }

    #[test]
    fn repeated_calls_touch_the_backend_once() {
        let h = harness();
        let completion = CompletionSnapshot::new();

        let first = h.scheduler.ensure_scheduled(&prayers(), &completion);
        assert!(matches!(first, PassOutcome::Scheduled { .. }));
        let schedules = h.backend.schedules();

        for _ in 0..5 {
            assert_eq!(
                h.scheduler.ensure_scheduled(&prayers(), &completion),
                PassOutcome::AlreadyScheduled
            );
        }
        assert_eq!(h.backend.cancels(), 1);
        assert_eq!(h.backend.schedules(), schedules);
        assert_eq!(h.scheduler.state().last_scheduled_date, Some(day(16)));
    }

    #[test]
    fn midday_end_to_end() {
        let h = harness();
        let completion = CompletionSnapshot::new().with(PrayerType::Fajr, false);

        let outcome = h.scheduler.ensure_scheduled(&prayers(), &completion);
        assert_eq!(
            outcome,
            PassOutcome::Scheduled {
                scheduled: 9,
                skipped: 0,
                failed: 0
            }
        );
        assert_eq!(pending_ids(&h), vec![2, 3, 4, 5, 101, 102, 103, 104, 201]);

        let fajr_nudge = h.backend.pending().into_iter().find(|n| n.id == 101).unwrap();
        assert_eq!(fajr_nudge.fire_at, day(16).and_time(hm(12, 30)));
    }

    #[test]
    fn only_future_prayers_are_scheduled() {
        let h = harness();
        h.clock.set(day(16).and_time(hm(14, 0)));
        h.scheduler
            .ensure_scheduled(&prayers(), &CompletionSnapshot::new());

        let prayer_times: Vec<_> = h
            .backend
            .pending()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::PrayerTime)
            .collect();
        assert_eq!(prayer_times.len(), 3);
    }

    #[test]
    fn handled_prayer_reminder_is_cancelled_on_reschedule() {
        let h = harness();
        h.scheduler
            .ensure_scheduled(&prayers(), &CompletionSnapshot::new());
        assert!(pending_ids(&h).contains(&101));

        // User marks Fajr, the trigger forces a fresh pass
        h.scheduler.force_reschedule();
        let done = CompletionSnapshot::new().with(PrayerType::Fajr, true);
        h.scheduler.ensure_scheduled(&prayers(), &done);
        assert!(!pending_ids(&h).contains(&101));
        assert!(pending_ids(&h).contains(&102));
    }

    #[test]
    fn force_reschedule_runs_exactly_one_more_cycle() {
        let h = harness();
        let completion = CompletionSnapshot::new();
        h.scheduler.ensure_scheduled(&prayers(), &completion);
        let schedules = h.backend.schedules();

        h.scheduler.force_reschedule();
        assert_eq!(h.scheduler.state().last_scheduled_date, None);
        // Nothing is cancelled until the next pass
        assert_eq!(h.backend.cancels(), 1);

        h.scheduler.ensure_scheduled(&prayers(), &completion);
        h.scheduler.ensure_scheduled(&prayers(), &completion);
        assert_eq!(h.backend.cancels(), 2);
        assert_eq!(h.backend.schedules(), schedules * 2);
    }

    #[test]
    fn disable_clears_everything() {
        let h = harness();
        h.scheduler
            .ensure_scheduled(&prayers(), &CompletionSnapshot::new());
        assert!(!h.backend.pending().is_empty());

        h.scheduler.disable();
        assert!(h.backend.pending().is_empty());
        assert!(!h.scheduler.is_enabled());
        assert_eq!(h.scheduler.state().last_scheduled_date, None);

        // Stays off no matter how often it's poked
        assert_eq!(
            h.scheduler
                .ensure_scheduled(&prayers(), &CompletionSnapshot::new()),
            PassOutcome::Disabled
        );
        assert!(h.backend.pending().is_empty());
    }

    #[test]
    fn disable_before_any_pass() {
        let h = harness();
        h.scheduler.disable();
        assert!(h.backend.pending().is_empty());
        assert_eq!(h.scheduler.state().last_scheduled_date, None);
    }

    #[test]
    fn enable_after_disable_schedules_again() {
        let h = harness();
        h.scheduler.disable();
        assert!(h.scheduler.enable());
        assert!(h.scheduler.is_enabled());
        let outcome = h
            .scheduler
            .ensure_scheduled(&prayers(), &CompletionSnapshot::new());
        assert!(matches!(outcome, PassOutcome::Scheduled { .. }));
    }

    #[test]
    fn overlapping_calls_reach_backend_once() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let backend = CountingBackend {
            gate: Some((Mutex::new(entered_tx), Mutex::new(release_rx))),
            ..CountingBackend::default()
        };
        let h = harness_with(backend, PermissionStatus::Granted);

        let scheduler = h.scheduler.clone();
        let first = std::thread::spawn(move || {
            scheduler.ensure_scheduled(&prayers(), &CompletionSnapshot::new())
        });

        // First pass is parked inside its cancel-all
        entered_rx.recv().unwrap();
        assert_eq!(
            h.scheduler
                .ensure_scheduled(&prayers(), &CompletionSnapshot::new()),
            PassOutcome::AlreadyRunning
        );
        release_tx.send(()).unwrap();

        let outcome = first.join().unwrap();
        assert!(matches!(outcome, PassOutcome::Scheduled { .. }));
        assert_eq!(h.backend.cancels(), 1);

        // Lock released; today is simply done now
        assert_eq!(
            h.scheduler
                .ensure_scheduled(&prayers(), &CompletionSnapshot::new()),
            PassOutcome::AlreadyScheduled
        );
    }

    #[test]
    fn disable_during_pass_leaves_nothing_behind() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let backend = CountingBackend {
            gate: Some((Mutex::new(entered_tx), Mutex::new(release_rx))),
            ..CountingBackend::default()
        };
        let h = harness_with(backend, PermissionStatus::Granted);

        let scheduler = h.scheduler.clone();
        let pass = std::thread::spawn(move || {
            scheduler.ensure_scheduled(&prayers(), &CompletionSnapshot::new())
        });

        entered_rx.recv().unwrap();
        h.scheduler.disable();
        release_tx.send(()).unwrap();

        assert_eq!(pass.join().unwrap(), PassOutcome::Disabled);
        assert!(h.backend.pending().is_empty());
        assert!(h.backend.schedules() > 0);
        let state = h.scheduler.state();
        assert!(!state.notifications_enabled);
        assert_eq!(state.last_scheduled_date, None);
    }

    #[test]
    fn denied_permission_asks_once_and_stays_unscheduled() {
        let h = harness_with(CountingBackend::default(), PermissionStatus::Denied);

        for _ in 0..3 {
            assert_eq!(
                h.scheduler
                    .ensure_scheduled(&prayers(), &CompletionSnapshot::new()),
                PassOutcome::PermissionDenied
            );
        }
        assert_eq!(h.prompts.load(Ordering::SeqCst), 1);
        assert_eq!(h.backend.cancels(), 0);
        assert_eq!(h.backend.schedules(), 0);

        let state = h.scheduler.state();
        assert_eq!(state.last_scheduled_date, None);
        assert_eq!(state.permission_granted, Some(false));
        assert!(!h.scheduler.enable());
    }

    #[test]
    fn backend_failures_do_not_block_the_day() {
        let backend = CountingBackend {
            fail_ids: vec![3, 102],
            ..CountingBackend::default()
        };
        let h = harness_with(backend, PermissionStatus::Granted);

        let outcome = h
            .scheduler
            .ensure_scheduled(&prayers(), &CompletionSnapshot::new());
        assert_eq!(
            outcome,
            PassOutcome::Scheduled {
                scheduled: 7,
                skipped: 0,
                failed: 2
            }
        );
        assert_eq!(h.scheduler.state().last_scheduled_date, Some(day(16)));
        assert!(pending_ids(&h).contains(&4));
    }

    #[test]
    fn notifications_inside_buffer_are_skipped() {
        let h = harness();
        h.clock
            .set(day(16).and_hms_opt(12, 59, 30).unwrap());
        let done = CompletionSnapshot::new()
            .with(PrayerType::Fajr, true)
            .with(PrayerType::Zuhr, true)
            .with(PrayerType::Asr, true)
            .with(PrayerType::Maghrib, true);

        let outcome = h.scheduler.ensure_scheduled(&prayers(), &done);
        // Dhuhr at 13:00 is 30s away; Asr, Maghrib, Isha and evening adhkar go in
        assert_eq!(
            outcome,
            PassOutcome::Scheduled {
                scheduled: 4,
                skipped: 1,
                failed: 0
            }
        );
        assert!(!pending_ids(&h).contains(&2));
    }

    #[test]
    fn new_day_schedules_again() {
        let h = harness();
        let completion = CompletionSnapshot::new();
        h.scheduler.ensure_scheduled(&prayers(), &completion);

        h.clock.set(day(17).and_time(hm(4, 0)));
        let outcome = h.scheduler.ensure_scheduled(&prayers(), &completion);
        assert!(matches!(outcome, PassOutcome::Scheduled { .. }));
        assert_eq!(h.scheduler.state().last_scheduled_date, Some(day(17)));
        assert!(pending_ids(&h).contains(&1));
    }

    #[test]
    fn missing_or_broken_prayer_data_is_a_no_op() {
        let h = harness();
        assert_eq!(
            h.scheduler.ensure_scheduled(&[], &CompletionSnapshot::new()),
            PassOutcome::NoPrayerData
        );

        let mut shuffled = prayers();
        shuffled.reverse();
        assert_eq!(
            h.scheduler
                .ensure_scheduled(&shuffled, &CompletionSnapshot::new()),
            PassOutcome::InvalidPrayerData
        );
        assert_eq!(h.backend.cancels(), 0);
        assert_eq!(h.prompts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn settings_change_forces_reschedule() {
        let h = harness();
        let completion = CompletionSnapshot::new();
        h.scheduler.ensure_scheduled(&prayers(), &completion);

        assert!(!h.scheduler.update_settings(ReminderSettings::default()));
        assert_eq!(h.scheduler.state().last_scheduled_date, Some(day(16)));

        let quieter = ReminderSettings {
            missed_prayer_reminders: false,
            ..ReminderSettings::default()
        };
        assert!(h.scheduler.update_settings(quieter));
        h.scheduler.ensure_scheduled(&prayers(), &completion);
        assert_eq!(pending_ids(&h), vec![2, 3, 4, 5, 201]);
    }

    #[test]
    fn state_survives_restart() {
        let store = Arc::new(MemoryStateStore::default());

        struct Shared(Arc<MemoryStateStore>);
        impl StateStore for Shared {
            fn load(&self) -> anyhow::Result<SchedulerState> {
                self.0.load()
            }
            fn save(&self, state: &SchedulerState) -> anyhow::Result<()> {
                self.0.save(state)
            }
        }

        let make = |backend: Arc<CountingBackend>| {
            NotificationScheduler::new(
                backend,
                Box::new(Shared(store.clone())),
                PermissionGateway::new(Box::new(Answer {
                    status: PermissionStatus::Granted,
                    prompts: Arc::new(AtomicUsize::new(0)),
                })),
                Arc::new(FixedClock::new(day(16).and_time(hm(12, 0)))),
                ReminderSettings::default(),
            )
        };

        let backend = Arc::new(CountingBackend::default());
        make(backend.clone()).ensure_scheduled(&prayers(), &CompletionSnapshot::new());

        let restarted = make(backend.clone());
        assert_eq!(
            restarted.ensure_scheduled(&prayers(), &CompletionSnapshot::new()),
            PassOutcome::AlreadyScheduled
        );
        assert_eq!(backend.cancels(), 1);

        // Another process switched notifications off
        let running = make(backend.clone());
        let mut off = store.load().unwrap();
        off.notifications_enabled = false;
        store.save(&off).unwrap();
        assert!(running.is_enabled());
        running.reload_state();
        assert!(!running.is_enabled());
    }
}
