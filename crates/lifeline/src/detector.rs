//! Shake gesture detection.
//!
//! Classifies a noisy 3-axis acceleration stream into discrete, debounced
//! shake events suitable for triggering a safety action without manual
//! interaction.
//!
//! The detector is a single-owner state machine updated only by the sample
//! callback: rate-limit the stream, compute a jerk-like quantity normalized
//! by elapsed time, count threshold-exceeding spikes in a rolling window,
//! and trigger once enough spikes land inside the window, subject to a hard
//! cooldown floor. A single large spike (a drop, a bump, a sensor glitch)
//! can never trigger on its own.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::config::DetectorConfig;
use crate::motion::AccelerationSample;

/// Scale factor applied to the per-millisecond jerk quantity.
///
/// Keeps the threshold in the same empirically tuned range as the original
/// sensitivity constants (threshold 45 rejects hand tremor and walking).
const JERK_SCALE: f64 = 10_000.0;

/// A detected shake gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShakeEvent {
    /// Timestamp of the sample that completed the gesture.
    pub timestamp: DateTime<Utc>,
    /// Number of qualifying spikes in the window at trigger time.
    pub spike_count: usize,
}

/// Observable phase of the detector state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorPhase {
    /// No spikes accumulated and no recent trigger.
    Idle,
    /// Spike window is non-empty.
    Accumulating,
    /// A trigger fired and the cooldown has not yet elapsed.
    Cooldown,
}

/// Shake detector state machine.
///
/// Owns all mutable detection state; dropped on teardown. Performs no
/// blocking work, so it is safe to drive from the sensor delivery callback.
#[derive(Debug)]
pub struct ShakeDetector {
    config: DetectorConfig,

    /// Last sample that passed the rate limit. Deltas are computed against
    /// this, not against every raw sample.
    previous: Option<AccelerationSample>,

    /// Timestamps of threshold-exceeding spikes, oldest first.
    window: VecDeque<DateTime<Utc>>,

    /// When the detector last triggered.
    last_trigger: Option<DateTime<Utc>>,
}

impl ShakeDetector {
    /// Create a new detector with the given configuration.
    #[must_use]
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            previous: None,
            window: VecDeque::new(),
            last_trigger: None,
        }
    }

    /// Process a single acceleration sample.
    ///
    /// Returns `Some(ShakeEvent)` when this sample completes a qualifying
    /// gesture, `None` otherwise. All timing decisions use sample
    /// timestamps, so irregular delivery cadence does not skew detection.
    pub fn process_sample(&mut self, sample: &AccelerationSample) -> Option<ShakeEvent> {
        let Some(previous) = self.previous else {
            // First sample only seeds state; no delta exists yet.
            self.previous = Some(*sample);
            return None;
        };

        let elapsed_ms = sample
            .timestamp
            .signed_duration_since(previous.timestamp)
            .num_milliseconds();

        // Rate limiting, not detection: skip samples arriving faster than
        // the minimum processing interval. Out-of-order samples are dropped
        // the same way.
        if elapsed_ms < self.min_interval_ms() {
            trace!(elapsed_ms, "sample inside minimum processing interval");
            return None;
        }

        #[allow(clippy::cast_precision_loss)]
        let jerk = sample.delta_magnitude(&previous) / elapsed_ms as f64 * JERK_SCALE;
        self.previous = Some(*sample);

        if jerk <= self.config.threshold {
            return None;
        }

        trace!(jerk, "spike exceeded threshold");
        self.window.push_back(sample.timestamp);
        self.evict_stale();

        if self.window.len() >= self.config.shakes_required && self.cooldown_elapsed(sample.timestamp)
        {
            let event = ShakeEvent {
                timestamp: sample.timestamp,
                spike_count: self.window.len(),
            };
            debug!(spikes = event.spike_count, "shake gesture detected");
            self.window.clear();
            self.last_trigger = Some(sample.timestamp);
            return Some(event);
        }

        None
    }

    /// Current phase of the state machine, evaluated at `now`.
    #[must_use]
    pub fn phase(&self, now: DateTime<Utc>) -> DetectorPhase {
        if !self.cooldown_elapsed(now) {
            DetectorPhase::Cooldown
        } else if self.window.is_empty() {
            DetectorPhase::Idle
        } else {
            DetectorPhase::Accumulating
        }
    }

    /// Number of spikes currently in the window.
    #[must_use]
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Evict window entries older than the window span relative to the
    /// newest entry.
    ///
    /// Invariant: after eviction, every timestamp in the window is within
    /// the configured window of the newest entry.
    fn evict_stale(&mut self) {
        let Some(&newest) = self.window.back() else {
            return;
        };
        let horizon = newest - Duration::milliseconds(self.window_ms());
        while let Some(&oldest) = self.window.front() {
            if oldest <= horizon {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Whether the cooldown floor has fully elapsed at `now`.
    ///
    /// The cooldown is a hard floor, not a sliding window: a trigger cannot
    /// repeat until it fully elapses even if shaking continues.
    fn cooldown_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.last_trigger.map_or(true, |last| {
            now.signed_duration_since(last).num_milliseconds() > self.cooldown_ms()
        })
    }

    fn min_interval_ms(&self) -> i64 {
        i64::try_from(self.config.min_sample_interval_ms).unwrap_or(i64::MAX)
    }

    fn window_ms(&self) -> i64 {
        i64::try_from(self.config.window_ms).unwrap_or(i64::MAX)
    }

    fn cooldown_ms(&self) -> i64 {
        i64::try_from(self.config.cooldown_ms).unwrap_or(i64::MAX)
    }
}

impl Default for ShakeDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

/// Runs a [`ShakeDetector`] as an async task over a sample channel.
///
/// Consumes samples from an inbound channel and forwards shake events on an
/// outbound channel. The task ends when the sample channel closes, which
/// destroys the detector state (explicit teardown). Sensor silence is a
/// silent no-op: the task simply parks on the empty channel.
#[derive(Debug)]
pub struct ShakeMonitor;

impl ShakeMonitor {
    /// Spawn the detection task.
    ///
    /// Returns the receiver for detected shake events.
    #[must_use]
    pub fn spawn(
        config: DetectorConfig,
        mut samples: mpsc::Receiver<AccelerationSample>,
    ) -> mpsc::Receiver<ShakeEvent> {
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            let mut detector = ShakeDetector::new(config);
            while let Some(sample) = samples.recv().await {
                if let Some(event) = detector.process_sample(&sample) {
                    if tx.send(event).await.is_err() {
                        // Trigger consumer went away; stop detecting.
                        break;
                    }
                }
            }
            debug!("sensor stream closed, shake detection stopped");
        });
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    /// A sample whose x value alternates enough to produce a spike when it
    /// differs from the previous processed sample.
    fn sample(x: f64, ms: i64) -> AccelerationSample {
        AccelerationSample::new(x, 0.0, 1.0, ts(ms))
    }

    /// Feed alternating-x spikes at a fixed spacing, starting after a seed
    /// sample at t=0, and collect fired events.
    fn feed_spikes(
        detector: &mut ShakeDetector,
        spacing_ms: i64,
        count: usize,
    ) -> Vec<ShakeEvent> {
        let mut events = Vec::new();
        if let Some(event) = detector.process_sample(&sample(0.0, 0)) {
            events.push(event);
        }
        for i in 1..=count {
            // Alternate between 0 and 2 so each processed delta is 2.0;
            // at 200ms spacing that is a jerk of 100, well over 45.
            let x = if i % 2 == 0 { 0.0 } else { 2.0 };
            let t = i64::try_from(i).unwrap() * spacing_ms;
            if let Some(event) = detector.process_sample(&sample(x, t)) {
                events.push(event);
            }
        }
        events
    }

    #[test]
    fn test_first_sample_only_seeds() {
        let mut detector = ShakeDetector::default();
        assert!(detector.process_sample(&sample(100.0, 0)).is_none());
        assert_eq!(detector.window_len(), 0);
    }

    #[test]
    fn test_single_spike_never_triggers() {
        let mut detector = ShakeDetector::default();
        detector.process_sample(&sample(0.0, 0));
        // One enormous spike (sensor error / phone dropped)
        let event = detector.process_sample(&sample(500.0, 200));
        assert!(event.is_none());
        assert_eq!(detector.window_len(), 1);
    }

    #[test]
    fn test_too_few_spikes_no_trigger() {
        let mut detector = ShakeDetector::default();
        let events = feed_spikes(&mut detector, 200, 3);
        assert!(events.is_empty());
        assert_eq!(detector.window_len(), 3);
    }

    #[test]
    fn test_required_spikes_within_window_trigger_once() {
        let mut detector = ShakeDetector::default();
        // 4 spikes at 200, 400, 600, 800 ms: all within the 1000 ms window.
        let events = feed_spikes(&mut detector, 200, 4);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].spike_count, 4);
        assert_eq!(events[0].timestamp, ts(800));
        // Trigger clears the window.
        assert_eq!(detector.window_len(), 0);
    }

    #[test]
    fn test_spikes_spread_beyond_window_never_trigger() {
        let mut detector = ShakeDetector::default();
        // 400 ms spacing keeps at most 3 spikes inside any 1000 ms window.
        let events = feed_spikes(&mut detector, 400, 12);
        assert!(events.is_empty());
        assert!(detector.window_len() <= 3);
    }

    #[test]
    fn test_window_eviction_relative_to_newest() {
        let mut detector = ShakeDetector::default();
        detector.process_sample(&sample(0.0, 0));
        detector.process_sample(&sample(2.0, 200));
        detector.process_sample(&sample(0.0, 400));
        assert_eq!(detector.window_len(), 2);
        // A spike 1.5 s later evicts both earlier entries. The delta must be
        // large enough to stay a spike over the longer elapsed time.
        detector.process_sample(&sample(10.0, 1900));
        assert_eq!(detector.window_len(), 1);
    }

    #[test]
    fn test_cooldown_is_hard_floor() {
        let mut detector = ShakeDetector::default();
        // Continuous shaking for 12 seconds at 200 ms spacing.
        let events = feed_spikes(&mut detector, 200, 60);

        assert_eq!(events.len(), 2);
        // First trigger as soon as 4 spikes accumulate.
        assert_eq!(events[0].timestamp, ts(800));
        // Second trigger only after the 10 s cooldown fully elapses
        // (strictly greater, so 10_800 is still suppressed).
        assert!(events[1].timestamp > ts(10_800));
        assert_eq!(events[1].timestamp, ts(11_000));
    }

    #[test]
    fn test_rate_limit_ignores_fast_samples() {
        let mut detector = ShakeDetector::default();
        detector.process_sample(&sample(0.0, 0));
        // Huge delta but only 50 ms after the seed: ignored entirely.
        assert!(detector.process_sample(&sample(100.0, 50)).is_none());
        assert_eq!(detector.window_len(), 0);
        // Delta is still computed against the seed once enough time passes.
        detector.process_sample(&sample(2.0, 150));
        assert_eq!(detector.window_len(), 1);
    }

    #[test]
    fn test_out_of_order_sample_dropped() {
        let mut detector = ShakeDetector::default();
        detector.process_sample(&sample(0.0, 1000));
        assert!(detector.process_sample(&sample(50.0, 500)).is_none());
        assert_eq!(detector.window_len(), 0);
    }

    #[test]
    fn test_gentle_motion_below_threshold() {
        let mut detector = ShakeDetector::default();
        detector.process_sample(&sample(0.0, 0));
        // Delta 0.2 over 200 ms: jerk 10, far below 45 (hand tremor).
        for i in 1..=20 {
            let x = if i % 2 == 0 { 0.0 } else { 0.2 };
            assert!(detector.process_sample(&sample(x, i * 200)).is_none());
        }
        assert_eq!(detector.window_len(), 0);
    }

    #[test]
    fn test_phase_transitions() {
        let mut detector = ShakeDetector::default();
        assert_eq!(detector.phase(ts(0)), DetectorPhase::Idle);

        detector.process_sample(&sample(0.0, 0));
        detector.process_sample(&sample(2.0, 200));
        assert_eq!(detector.phase(ts(200)), DetectorPhase::Accumulating);

        feed_spikes(&mut detector, 200, 4);
        assert_eq!(detector.phase(ts(900)), DetectorPhase::Cooldown);
        // After the cooldown fully elapses the detector is idle again.
        assert_eq!(detector.phase(ts(20_000)), DetectorPhase::Idle);
    }

    #[test]
    fn test_custom_config() {
        let config = DetectorConfig {
            threshold: 45.0,
            window_ms: 1000,
            shakes_required: 2,
            cooldown_ms: 2000,
            min_sample_interval_ms: 100,
        };
        let mut detector = ShakeDetector::new(config);
        detector.process_sample(&sample(0.0, 0));
        detector.process_sample(&sample(2.0, 200));
        let event = detector.process_sample(&sample(0.0, 400));
        assert!(event.is_some());
    }

    #[tokio::test]
    async fn test_shake_monitor_forwards_events() {
        let (tx, rx) = mpsc::channel(64);
        let mut events = ShakeMonitor::spawn(DetectorConfig::default(), rx);

        tx.send(sample(0.0, 0)).await.unwrap();
        for i in 1..=4 {
            let x = if i % 2 == 0 { 0.0 } else { 2.0 };
            tx.send(sample(x, i * 200)).await.unwrap();
        }
        drop(tx);

        let event = events.recv().await.expect("one shake event");
        assert_eq!(event.spike_count, 4);
        // Channel closes once the sensor stream ends.
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_shake_monitor_silent_on_quiet_stream() {
        let (tx, rx) = mpsc::channel(64);
        let mut events = ShakeMonitor::spawn(DetectorConfig::default(), rx);

        tx.send(sample(0.0, 0)).await.unwrap();
        tx.send(sample(0.1, 200)).await.unwrap();
        drop(tx);

        assert!(events.recv().await.is_none());
    }
}
