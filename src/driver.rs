//! The translation loop: keeps one virtual mouse alive at the broker and
//! streams reports to it until told to stop.
//!
//! ```text
//! Start -> EnsureClean -> Created -> Streaming -> Destroyed -> End
//!                 \            \                      \
//!                  +------------+----------------------+--> Aborted
//! ```
//!
//! Whatever happens after a successful create, a destroy is attempted
//! before [`Driver::run`] returns.

use crate::broker::Broker;
use crate::device::VirtualDevice;
use crate::mapping::ReportMapper;
use crate::protocol::{self, MOUSE_REPORT_LEN};
use crate::tracking::{PoseSource, ReadinessPolicy, Tracker};
use crate::types::{DeviceState, ReportDescriptor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// Loop phases, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    EnsureClean,
    Created,
    Streaming,
    Destroyed,
    End,
    Aborted,
}

/// Loop parameters.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Streaming iterations; `None` runs until the stop flag is set.
    pub iterations: Option<u64>,
    /// Pause after each report. Zero sends back to back.
    pub interval: Duration,
    /// Tracker profile passed to `initialize`.
    pub tracking_profile: Option<String>,
    pub readiness: ReadinessPolicy,
    /// Abort (destroying the device) if the tracker never becomes ready.
    pub require_tracking: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            iterations: Some(10_000),
            interval: Duration::ZERO,
            tracking_profile: None,
            readiness: ReadinessPolicy::default(),
            require_tracking: false,
        }
    }
}

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub phase: Phase,
    pub iterations: u64,
    pub reports_sent: u64,
    pub reports_failed: u64,
    pub samples: u64,
    pub stopped_by_signal: bool,
    pub device: DeviceState,
    pub exit_code: i32,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            phase: Phase::Start,
            iterations: 0,
            reports_sent: 0,
            reports_failed: 0,
            samples: 0,
            stopped_by_signal: false,
            device: DeviceState::Absent,
            exit_code: EXIT_SUCCESS,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == EXIT_SUCCESS
    }
}

type DynSource = PoseSource<Box<dyn Tracker>>;

/// Drives one [`VirtualDevice`] through its whole lifecycle.
pub struct Driver<B: Broker> {
    device: VirtualDevice<B>,
    descriptor: ReportDescriptor,
    mapper: Box<dyn ReportMapper>,
    tracker: Option<DynSource>,
    config: DriverConfig,
    stop: Arc<AtomicBool>,
}

impl<B: Broker> Driver<B> {
    pub fn new(
        device: VirtualDevice<B>,
        mapper: Box<dyn ReportMapper>,
        config: DriverConfig,
    ) -> Self {
        Self {
            device,
            descriptor: ReportDescriptor::mouse(),
            mapper,
            tracker: None,
            config,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register with a different descriptor. Its input report must still be
    /// [`MOUSE_REPORT_LEN`] bytes, since that is what the loop sends.
    pub fn with_descriptor(mut self, descriptor: ReportDescriptor) -> Self {
        match protocol::input_report_bits(descriptor.as_bytes()) {
            Some(bits) if bits as usize == MOUSE_REPORT_LEN * 8 => {}
            other => log::warn!(
                "Descriptor declares {:?} input bits, loop sends {} bytes",
                other,
                MOUSE_REPORT_LEN
            ),
        }
        self.descriptor = descriptor;
        self
    }

    /// Poll `tracker` during the run.
    pub fn with_tracker(mut self, tracker: Box<dyn Tracker>) -> Self {
        self.tracker = Some(PoseSource::new(tracker));
        self
    }

    /// Share an externally owned stop flag (e.g. set by a signal handler).
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Flag that ends Streaming when set.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn device(&self) -> &VirtualDevice<B> {
        &self.device
    }

    fn enter(&self, summary: &mut RunSummary, phase: Phase) {
        log::debug!("{:?} -> {:?}", summary.phase, phase);
        summary.phase = phase;
    }

    fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Run the full lifecycle and report the outcome.
    pub fn run(&mut self) -> RunSummary {
        let mut summary = RunSummary::new();

        self.enter(&mut summary, Phase::EnsureClean);
        match self.device.destroy() {
            Ok(()) => log::info!("Removed stale device '{}'", self.device.identity()),
            Err(e) => log::debug!("No stale device to remove ({})", e),
        }

        if let Err(e) = self.device.create(&self.descriptor) {
            log::error!("Unable to create device: {}", e);
            summary.exit_code = EXIT_FAILURE;
            self.enter(&mut summary, Phase::Aborted);
            return summary;
        }
        summary.device = DeviceState::Created;
        self.enter(&mut summary, Phase::Created);

        if !self.prepare_tracking() {
            log::error!("Tracking unavailable; destroying device");
            if self.finish(&mut summary) {
                summary.exit_code = EXIT_FAILURE;
            }
            self.enter(&mut summary, Phase::Aborted);
            return summary;
        }

        self.enter(&mut summary, Phase::Streaming);
        self.stream(&mut summary);

        if self.finish(&mut summary) {
            self.enter(&mut summary, Phase::End);
        } else {
            self.enter(&mut summary, Phase::Aborted);
        }
        log::info!(
            "Run finished: {} iteration(s), {} sent, {} failed, {} sample(s), exit {}",
            summary.iterations,
            summary.reports_sent,
            summary.reports_failed,
            summary.samples,
            summary.exit_code
        );
        summary
    }

    /// Initialize the tracker and wait for it. Returns `false` only when the
    /// run must abort.
    fn prepare_tracking(&mut self) -> bool {
        let Some(source) = self.tracker.as_mut() else {
            return true;
        };

        let stop = Arc::clone(&self.stop);
        let policy = self.config.readiness;
        let ready = source
            .initialize(self.config.tracking_profile.as_deref())
            .and_then(|()| source.await_ready_with(policy, || stop.load(Ordering::Relaxed)));

        match ready {
            Ok(()) => true,
            // Streaming sees the flag on its first check and goes straight to destroy.
            Err(_) if self.should_stop() => {
                log::info!("Stop requested while waiting for the tracker");
                true
            }
            Err(e) => {
                log::warn!("Initialisation of tracking failed: {}", e);
                if matches!(e, crate::PosehidError::TrackerInit(_)) {
                    if let Some(source) = self.tracker.take() {
                        drop(source.into_inner());
                    }
                }
                !self.config.require_tracking
            }
        }
    }

    fn stream(&mut self, summary: &mut RunSummary) {
        while self.config.iterations.map_or(true, |n| summary.iterations < n) {
            if self.should_stop() {
                log::info!("Stop requested after {} iteration(s)", summary.iterations);
                summary.stopped_by_signal = true;
                break;
            }

            let sample = self.tracker.as_mut().and_then(|t| t.get_sample());
            if let Some(s) = &sample {
                summary.samples += 1;
                log::debug!(
                    "heading:{:.3} pitch:{:.3} roll:{:.3} x:{:.3} y:{:.3} z:{:.3} frame:{}",
                    s.heading,
                    s.pitch,
                    s.roll,
                    s.x,
                    s.y,
                    s.z,
                    s.frame_counter
                );
            }

            let report = self.mapper.next_report(sample.as_ref());
            match self.device.send(&report) {
                Ok(()) => {
                    summary.reports_sent += 1;
                    log::trace!("sent {:?}", report);
                }
                Err(e) => {
                    summary.reports_failed += 1;
                    if summary.reports_failed == 1 {
                        log::warn!("Send failed: {} (further failures logged at debug)", e);
                    } else {
                        log::debug!("Send failed: {}", e);
                    }
                }
            }
            summary.iterations += 1;

            if !self.config.interval.is_zero() {
                std::thread::sleep(self.config.interval);
            }
        }
    }

    /// Destroy the device. A failure here leaves a device behind, so it
    /// sets a failing exit code. Returns whether the destroy succeeded.
    fn finish(&mut self, summary: &mut RunSummary) -> bool {
        self.enter(summary, Phase::Destroyed);
        if let Some(source) = self.tracker.take() {
            drop(source.into_inner());
        }

        match self.device.destroy() {
            Ok(()) => {
                summary.device = DeviceState::Absent;
                true
            }
            Err(e) => {
                log::error!("Unable to destroy device before exit: {}", e);
                summary.exit_code = EXIT_FAILURE;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::fake::FakeBroker;
    use crate::mapping::{HeadingRate, Idle, RandomJitter};
    use crate::protocol::BrokerMethod;
    use crate::tracking::fake::ScriptedTracker;
    use crate::tracking::TrackerStatus;
    use crate::types::{DeviceIdentity, InputReport, PoseSample};

    const NAME: &str = "Virtual GamePad FooBar";

    fn driver(broker: &FakeBroker, iterations: Option<u64>) -> Driver<&FakeBroker> {
        let config = DriverConfig {
            iterations,
            readiness: ReadinessPolicy {
                max_attempts: 3,
                interval: Duration::from_millis(1),
            },
            ..Default::default()
        };
        Driver::new(
            VirtualDevice::new(broker, DeviceIdentity::new(NAME)),
            Box::new(RandomJitter::seeded(1)),
            config,
        )
    }

    /// Sets the stop flag after `after` reports.
    struct StopAfter {
        after: u64,
        seen: u64,
        stop: Arc<AtomicBool>,
    }

    impl ReportMapper for StopAfter {
        fn next_report(&mut self, _sample: Option<&PoseSample>) -> InputReport {
            self.seen += 1;
            if self.seen >= self.after {
                self.stop.store(true, Ordering::Relaxed);
            }
            InputReport::idle()
        }

        fn name(&self) -> &'static str {
            "stop-after"
        }
    }

    #[test]
    fn test_clean_run_sends_and_destroys() {
        let broker = FakeBroker::new();
        let summary = driver(&broker, Some(25)).run();

        assert_eq!(summary.exit_code, EXIT_SUCCESS);
        assert_eq!(summary.phase, Phase::End);
        assert_eq!(summary.iterations, 25);
        assert_eq!(summary.reports_sent, 25);
        assert_eq!(summary.device, DeviceState::Absent);
        assert_eq!(broker.device_count(), 0);
        assert_eq!(broker.connects(), broker.closes());

        let calls = broker.calls();
        assert_eq!(calls.first().map(|c| c.method), Some(BrokerMethod::Destroy));
        assert_eq!(calls[1].method, BrokerMethod::Create);
        assert_eq!(calls.last().map(|c| c.method), Some(BrokerMethod::Destroy));
        assert_eq!(
            calls.iter().filter(|c| c.method == BrokerMethod::Send).count(),
            25
        );
    }

    #[test]
    fn test_missing_broker_aborts_before_streaming() {
        let broker = FakeBroker::absent();
        let summary = driver(&broker, Some(10)).run();

        assert_eq!(summary.exit_code, EXIT_FAILURE);
        assert_eq!(summary.phase, Phase::Aborted);
        assert_eq!(summary.iterations, 0);
        assert!(broker.calls().is_empty());
    }

    #[test]
    fn test_all_sends_failing_still_completes() {
        let broker = FakeBroker::new();
        broker.state.borrow_mut().send_output = Some(5);
        let summary = driver(&broker, Some(10_000)).run();

        assert_eq!(summary.iterations, 10_000);
        assert_eq!(summary.reports_failed, 10_000);
        assert_eq!(summary.reports_sent, 0);
        assert_eq!(summary.exit_code, EXIT_SUCCESS);
        assert_eq!(
            broker.calls().last().map(|c| c.method),
            Some(BrokerMethod::Destroy)
        );
        assert_eq!(broker.device_count(), 0);
    }

    #[test]
    fn test_stale_device_is_cleared_first() {
        let broker = FakeBroker::new();
        broker.insert_device(NAME, protocol::MOUSE_REPORT_DESCRIPTOR);
        let summary = driver(&broker, Some(1)).run();

        assert!(summary.success());
        assert_eq!(broker.device_count(), 0);
    }

    #[test]
    fn test_destroy_failure_tolerated_at_start_fatal_at_end() {
        let broker = FakeBroker::new();
        broker.state.borrow_mut().destroy_output = Some(9);
        let summary = driver(&broker, Some(3)).run();

        assert_eq!(summary.reports_sent, 3);
        assert_eq!(summary.exit_code, EXIT_FAILURE);
        assert_eq!(summary.phase, Phase::Aborted);
        assert_eq!(summary.device, DeviceState::Created);
    }

    #[test]
    fn test_preset_stop_flag_skips_streaming_but_destroys() {
        let broker = FakeBroker::new();
        let mut d = driver(&broker, None);
        d.stop_flag().store(true, Ordering::Relaxed);
        let summary = d.run();

        assert!(summary.stopped_by_signal);
        assert_eq!(summary.iterations, 0);
        assert!(summary.success());
        assert_eq!(broker.device_count(), 0);
    }

    #[test]
    fn test_unbounded_run_stops_on_flag() {
        let broker = FakeBroker::new();
        let stop = Arc::new(AtomicBool::new(false));
        let mapper = StopAfter {
            after: 42,
            seen: 0,
            stop: Arc::clone(&stop),
        };
        let mut d = Driver::new(
            VirtualDevice::new(&broker, DeviceIdentity::new(NAME)),
            Box::new(mapper),
            DriverConfig {
                iterations: None,
                ..Default::default()
            },
        )
        .with_stop_flag(stop);

        let summary = d.run();
        assert_eq!(summary.iterations, 42);
        assert!(summary.stopped_by_signal);
        assert!(summary.success());
        assert_eq!(broker.device_count(), 0);
    }

    #[test]
    fn test_required_tracking_timeout_destroys_and_fails() {
        let broker = FakeBroker::new();
        let mut d = driver(&broker, Some(5)).with_tracker(Box::new(ScriptedTracker::never_ready()));
        d.config.require_tracking = true;
        let summary = d.run();

        assert_eq!(summary.exit_code, EXIT_FAILURE);
        assert_eq!(summary.iterations, 0);
        assert_eq!(summary.device, DeviceState::Absent);
        assert_eq!(broker.device_count(), 0);
    }

    #[test]
    fn test_stop_during_readiness_wait_skips_to_destroy() {
        let broker = FakeBroker::new();
        let mut d = driver(&broker, Some(5)).with_tracker(Box::new(ScriptedTracker::never_ready()));
        d.config.require_tracking = true;
        d.config.readiness = ReadinessPolicy {
            max_attempts: 19,
            interval: Duration::from_millis(50),
        };
        d.stop_flag().store(true, Ordering::Relaxed);

        let start = std::time::Instant::now();
        let summary = d.run();

        assert!(start.elapsed() < Duration::from_millis(500));
        assert!(summary.stopped_by_signal);
        assert!(summary.success());
        assert_eq!(summary.phase, Phase::End);
        assert_eq!(summary.iterations, 0);
        assert_eq!(broker.device_count(), 0);
    }

    #[test]
    fn test_custom_descriptor_is_registered() {
        let broker = FakeBroker::new();
        let descriptor = ReportDescriptor::from_static(protocol::MOUSE_REPORT_DESCRIPTOR);
        let summary = driver(&broker, Some(2)).with_descriptor(descriptor).run();

        assert!(summary.success());
        assert_eq!(summary.reports_sent, 2);
        let create = broker
            .calls()
            .into_iter()
            .find(|c| c.method == BrokerMethod::Create);
        assert_eq!(
            create.and_then(|c| c.payload),
            Some(protocol::MOUSE_REPORT_DESCRIPTOR.to_vec())
        );
    }

    #[test]
    fn test_mismatched_descriptor_still_creates() {
        // Declares a 4-byte report; the loop sends 3, so the broker rejects each send.
        const FOUR_BYTE_REPORT: [u8; 15] = [
            0x05, 0x01, 0x09, 0x02, 0xa1, 0x01, 0x09, 0x30, 0x75, 0x08, 0x95, 0x04, 0x81, 0x06,
            0xc0,
        ];
        let broker = FakeBroker::new();
        let descriptor = ReportDescriptor::from_vec(FOUR_BYTE_REPORT.to_vec());
        let summary = driver(&broker, Some(3)).with_descriptor(descriptor).run();

        assert_eq!(summary.device, DeviceState::Absent);
        assert_eq!(summary.reports_sent, 0);
        assert_eq!(summary.reports_failed, 3);
        assert!(summary.success());
        assert_eq!(
            broker.calls().iter().filter(|c| c.method == BrokerMethod::Create).count(),
            1
        );
    }

    #[test]
    fn test_optional_tracking_failure_keeps_streaming() {
        let broker = FakeBroker::new();
        let tracker = ScriptedTracker {
            init_status: Some(TrackerStatus::NOT_FOUND),
            ..ScriptedTracker::never_ready()
        };
        let summary = driver(&broker, Some(5)).with_tracker(Box::new(tracker)).run();

        assert!(summary.success());
        assert_eq!(summary.reports_sent, 5);
        assert_eq!(summary.samples, 0);
    }

    #[test]
    fn test_samples_drive_heading_mapper() {
        let broker = FakeBroker::new();
        let samples = (0..4)
            .map(|i| PoseSample {
                heading: i as f32,
                frame_counter: i,
                ..Default::default()
            })
            .collect();
        let tracker = ScriptedTracker::ready_after(1).with_samples(samples);
        let mut d = Driver::new(
            VirtualDevice::new(&broker, DeviceIdentity::new(NAME)),
            Box::new(HeadingRate::new(2.0)),
            DriverConfig {
                iterations: Some(6),
                readiness: ReadinessPolicy {
                    max_attempts: 5,
                    interval: Duration::from_millis(1),
                },
                ..Default::default()
            },
        )
        .with_tracker(Box::new(tracker));

        let summary = d.run();
        assert_eq!(summary.samples, 4);
        let reports = broker.state.borrow().reports.clone();
        assert_eq!(reports.len(), 6);
        assert_eq!(reports[0], vec![0, 0, 0]);
        assert_eq!(reports[1], vec![0, 2, 0]);
        assert_eq!(reports[3], vec![0, 2, 0]);
        assert_eq!(reports[5], vec![0, 0, 0]);
    }

    #[test]
    fn test_idle_reports_are_three_zero_bytes() {
        let broker = FakeBroker::new();
        let mut d = Driver::new(
            VirtualDevice::new(&broker, DeviceIdentity::new(NAME)),
            Box::new(Idle),
            DriverConfig {
                iterations: Some(2),
                ..Default::default()
            },
        );
        d.run();
        assert_eq!(broker.state.borrow().reports, vec![vec![0u8; 3]; 2]);
    }
}
