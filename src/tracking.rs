//! Pose source adapter over an external head-tracking subsystem.
//!
//! [`Tracker`] is the narrow interface the tracking library exposes
//! (init / status / explain / pose). [`PoseSource`] layers the readiness
//! state machine and the bounded readiness wait on top of it.

use crate::types::{PoseSample, TrackingReadiness};
use crate::{PosehidError, Result};
use std::time::Duration;

/// Raw tracker status (`linuxtrack_state_type`). Negative values are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackerStatus(pub i32);

impl TrackerStatus {
    pub const OK: Self = Self(0);
    pub const INITIALIZING: Self = Self(1);
    pub const RUNNING: Self = Self(2);
    pub const PAUSED: Self = Self(3);
    pub const STOPPED: Self = Self(4);

    pub const NOT_INITIALIZED: Self = Self(-1);
    pub const SYMBOL_LOOKUP: Self = Self(-2);
    pub const NO_CONFIG: Self = Self(-3);
    pub const NOT_FOUND: Self = Self(-4);
    pub const PROCESSING_FRAME: Self = Self(-5);

    pub fn is_error(self) -> bool {
        self.0 < Self::OK.0
    }

    pub fn readiness(self) -> TrackingReadiness {
        match self {
            Self::OK | Self::INITIALIZING => TrackingReadiness::Initializing,
            Self::RUNNING => TrackingReadiness::Running,
            Self::PAUSED => TrackingReadiness::Paused,
            Self::STOPPED => TrackingReadiness::Stopped,
            Self::NOT_INITIALIZED => TrackingReadiness::Uninitialized,
            _ => TrackingReadiness::Failed,
        }
    }

    /// Built-in description, used when the tracker offers none.
    pub fn describe(self) -> &'static str {
        match self {
            Self::OK => "Linuxtrack OK",
            Self::INITIALIZING => "Linuxtrack is initializing",
            Self::RUNNING => "Linuxtrack is running",
            Self::PAUSED => "Linuxtrack is paused",
            Self::STOPPED => "Linuxtrack is stopped",
            Self::NOT_INITIALIZED => "Linuxtrack function was called without proper initialization",
            Self::SYMBOL_LOOKUP => "Internal error (symbol lookup)",
            Self::NO_CONFIG => "Linuxtrack config not found",
            Self::NOT_FOUND => "Linuxtrack was removed or relocated",
            Self::PROCESSING_FRAME => "Internal error (frame processing)",
            _ => "Unknown tracker status",
        }
    }
}

/// The external tracking subsystem.
pub trait Tracker {
    /// Start tracking with the named profile, or the default one.
    fn init(&mut self, profile: Option<&str>) -> TrackerStatus;

    /// Current status. Must not block.
    fn status(&mut self) -> TrackerStatus;

    /// Human-readable text for `status`.
    fn explain(&self, status: TrackerStatus) -> String {
        status.describe().to_string()
    }

    /// Latest pose and an availability code; a positive code means the
    /// sample is a fresh frame.
    fn pose(&mut self) -> (PoseSample, i32);

    /// Stop tracking. Called at most once by the owner.
    fn shutdown(&mut self) {}
}

impl<T: Tracker + ?Sized> Tracker for Box<T> {
    fn init(&mut self, profile: Option<&str>) -> TrackerStatus {
        (**self).init(profile)
    }

    fn status(&mut self) -> TrackerStatus {
        (**self).status()
    }

    fn explain(&self, status: TrackerStatus) -> String {
        (**self).explain(status)
    }

    fn pose(&mut self) -> (PoseSample, i32) {
        (**self).pose()
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}

/// How long to wait for the tracker to become usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for ReadinessPolicy {
    /// 200 polls, 100 ms apart: about 20 seconds.
    fn default() -> Self {
        Self {
            max_attempts: 200,
            interval: Duration::from_millis(100),
        }
    }
}

/// Adapter that owns a [`Tracker`] and tracks its readiness.
pub struct PoseSource<T: Tracker> {
    tracker: T,
    readiness: TrackingReadiness,
}

impl<T: Tracker> PoseSource<T> {
    pub fn new(tracker: T) -> Self {
        Self {
            tracker,
            readiness: TrackingReadiness::Uninitialized,
        }
    }

    /// Last readiness observed by this adapter.
    pub fn readiness(&self) -> TrackingReadiness {
        self.readiness
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    /// Start the tracker. Fails fast if it reports an error before any
    /// readiness polling.
    pub fn initialize(&mut self, profile: Option<&str>) -> Result<()> {
        self.readiness = TrackingReadiness::Initializing;
        let status = self.tracker.init(profile);
        if status.is_error() {
            self.readiness = TrackingReadiness::Failed;
            return Err(PosehidError::TrackerInit(self.tracker.explain(status)));
        }
        log::info!(
            "Tracker initialized with {} profile",
            profile.unwrap_or("Default")
        );
        Ok(())
    }

    /// Non-blocking readiness read.
    pub fn poll_readiness(&mut self) -> TrackingReadiness {
        let status = self.tracker.status();
        log::debug!("Status: {}", self.tracker.explain(status));
        self.readiness = status.readiness();
        self.readiness
    }

    /// Poll up to `max_attempts` times, sleeping `interval` between polls.
    ///
    /// Returns `true` as soon as the tracker is Running or Paused. After the
    /// last failed poll the adapter is marked Failed and `false` is returned.
    pub fn await_ready(&mut self, max_attempts: u32, interval: Duration) -> bool {
        self.await_ready_unless(max_attempts, interval, || false)
    }

    /// [`await_ready`](Self::await_ready) that gives up as soon as
    /// `cancelled` returns `true`, checked before every poll. A cancelled
    /// wait leaves the readiness at its last polled value.
    pub fn await_ready_unless(
        &mut self,
        max_attempts: u32,
        interval: Duration,
        mut cancelled: impl FnMut() -> bool,
    ) -> bool {
        for attempt in 1..=max_attempts {
            if cancelled() {
                log::info!("Readiness wait cancelled after {} poll(s)", attempt - 1);
                return false;
            }
            if self.poll_readiness().is_ready() {
                log::info!("Tracker ready after {} poll(s): {:?}", attempt, self.readiness);
                return true;
            }
            if attempt < max_attempts {
                std::thread::sleep(interval);
            }
        }

        log::warn!(
            "Tracker not ready after {} polls; make sure it is installed and configured",
            max_attempts
        );
        self.readiness = TrackingReadiness::Failed;
        false
    }

    /// [`await_ready_unless`](Self::await_ready_unless) with a policy, as a
    /// `Result`. Cancellation is reported as a timeout too.
    pub fn await_ready_with(
        &mut self,
        policy: ReadinessPolicy,
        cancelled: impl FnMut() -> bool,
    ) -> Result<()> {
        if self.await_ready_unless(policy.max_attempts, policy.interval, cancelled) {
            Ok(())
        } else {
            Err(PosehidError::TrackerTimeout {
                attempts: policy.max_attempts,
            })
        }
    }

    /// Most recent sample if the tracker has a fresh frame; `None` means no
    /// new data this tick.
    pub fn get_sample(&mut self) -> Option<PoseSample> {
        let (sample, available) = self.tracker.pose();
        (available > 0).then_some(sample)
    }

    /// Shut the tracker down and hand it back.
    pub fn into_inner(mut self) -> T {
        self.tracker.shutdown();
        self.tracker
    }
}


#[cfg(test)]
mod tests {
    use super::fake::ScriptedTracker;
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_status_mapping() {
        assert_eq!(TrackerStatus::RUNNING.readiness(), TrackingReadiness::Running);
        assert_eq!(TrackerStatus::PAUSED.readiness(), TrackingReadiness::Paused);
        assert_eq!(TrackerStatus::STOPPED.readiness(), TrackingReadiness::Stopped);
        assert_eq!(
            TrackerStatus::NOT_INITIALIZED.readiness(),
            TrackingReadiness::Uninitialized
        );
        assert_eq!(TrackerStatus::NO_CONFIG.readiness(), TrackingReadiness::Failed);
        assert!(TrackerStatus::NOT_FOUND.is_error());
        assert!(!TrackerStatus::OK.is_error());
    }

    #[test]
    fn test_initialize_fails_fast_on_error_status() {
        let tracker = ScriptedTracker {
            init_status: Some(TrackerStatus::NO_CONFIG),
            ..ScriptedTracker::never_ready()
        };
        let mut source = PoseSource::new(tracker);
        let err = source.initialize(None).unwrap_err();
        assert!(err.to_string().contains("config not found"));
        assert_eq!(source.readiness(), TrackingReadiness::Failed);
        assert_eq!(source.tracker().status_polls, 0);
    }

    #[test]
    fn test_initialize_passes_profile() {
        let mut source = PoseSource::new(ScriptedTracker::ready_after(0));
        source.initialize(Some("Head")).unwrap();
        assert_eq!(
            source.tracker().init_profile,
            Some(Some("Head".to_string()))
        );
        assert_eq!(source.readiness(), TrackingReadiness::Initializing);
    }

    #[test]
    fn test_await_ready_returns_on_running() {
        let mut source = PoseSource::new(ScriptedTracker::ready_after(3));
        source.initialize(None).unwrap();
        assert!(source.await_ready(10, Duration::from_millis(1)));
        assert_eq!(source.tracker().status_polls, 4);
        assert_eq!(source.readiness(), TrackingReadiness::Running);
    }

    #[test]
    fn test_await_ready_accepts_paused() {
        let tracker = ScriptedTracker {
            statuses: vec![TrackerStatus::PAUSED].into(),
            ..Default::default()
        };
        let mut source = PoseSource::new(tracker);
        assert!(source.await_ready(1, Duration::from_millis(1)));
    }

    #[test]
    fn test_await_ready_gives_up_after_max_attempts() {
        let mut source = PoseSource::new(ScriptedTracker::never_ready());
        source.initialize(None).unwrap();

        let interval = Duration::from_millis(10);
        let start = Instant::now();
        assert!(!source.await_ready(5, interval));
        let elapsed = start.elapsed();

        assert_eq!(source.tracker().status_polls, 5);
        assert_eq!(source.readiness(), TrackingReadiness::Failed);
        assert!(elapsed <= interval * 5 + Duration::from_millis(250));
    }

    #[test]
    fn test_await_ready_unless_stops_polling_when_cancelled() {
        let mut source = PoseSource::new(ScriptedTracker::never_ready());
        source.initialize(None).unwrap();

        let mut checks = 0;
        let start = Instant::now();
        let ready = source.await_ready_unless(200, Duration::from_millis(5), || {
            checks += 1;
            checks > 2
        });

        assert!(!ready);
        assert_eq!(source.tracker().status_polls, 2);
        assert_ne!(source.readiness(), TrackingReadiness::Failed);
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_await_ready_with_reports_timeout() {
        let mut source = PoseSource::new(ScriptedTracker::never_ready());
        let policy = ReadinessPolicy {
            max_attempts: 2,
            interval: Duration::from_millis(1),
        };
        assert!(matches!(
            source.await_ready_with(policy, || false),
            Err(PosehidError::TrackerTimeout { attempts: 2 })
        ));
    }

    #[test]
    fn test_default_policy_is_twenty_seconds() {
        let policy = ReadinessPolicy::default();
        assert_eq!(policy.interval * policy.max_attempts, Duration::from_secs(20));
    }

    #[test]
    fn test_get_sample_only_on_fresh_frame() {
        let sample = PoseSample {
            heading: 10.0,
            frame_counter: 7,
            ..Default::default()
        };
        let tracker = ScriptedTracker::ready_after(0).with_samples(vec![sample]);
        let mut source = PoseSource::new(tracker);
        assert_eq!(source.get_sample(), Some(sample));
        assert_eq!(source.get_sample(), None);
    }

    #[test]
    fn test_into_inner_shuts_down() {
        let source = PoseSource::new(ScriptedTracker::never_ready());
        assert!(source.into_inner().shut_down);
    }
}
