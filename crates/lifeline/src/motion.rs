//! Motion sensor types for lifeline.
//!
//! This module defines the raw acceleration sample delivered by a sensor
//! source and the trait that sensor sources implement. Samples are
//! transient: they feed the shake detector and are never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single raw 3-axis accelerometer sample.
///
/// This is the minimal input contract: three axis readings and a timestamp.
/// The stream may arrive at irregular intervals; everything downstream
/// normalizes by elapsed time, never by sample count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelerationSample {
    /// X-axis acceleration.
    pub x: f64,
    /// Y-axis acceleration.
    pub y: f64,
    /// Z-axis acceleration.
    pub z: f64,
    /// When this sample was taken.
    pub timestamp: DateTime<Utc>,
}

impl AccelerationSample {
    /// Create a new sample.
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64, timestamp: DateTime<Utc>) -> Self {
        Self { x, y, z, timestamp }
    }

    /// Euclidean norm of the per-axis deltas against another sample.
    #[must_use]
    pub fn delta_magnitude(&self, previous: &Self) -> f64 {
        let dx = (self.x - previous.x).abs();
        let dy = (self.y - previous.y).abs();
        let dz = (self.z - previous.z).abs();
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Trait for sensor sources that deliver acceleration samples.
///
/// Implementors push samples through the provided channel at their own
/// delivery cadence. A source that stops delivering (permission revoked,
/// hardware unavailable) simply goes silent; that is not an error, because
/// gesture detection is a convenience trigger layered atop the manual alert
/// path.
pub trait SensorSource: Send + Sync {
    /// The name of this sensor source (for logging/debugging).
    fn name(&self) -> &'static str;

    /// Start the source.
    ///
    /// This should begin delivering samples through the provided channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails to start.
    fn start(
        &mut self,
        sender: tokio::sync::mpsc::Sender<AccelerationSample>,
    ) -> Result<(), crate::error::Error>;

    /// Stop the source.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails to stop cleanly.
    fn stop(&mut self) -> Result<(), crate::error::Error>;

    /// Check if the source is currently running.
    fn is_running(&self) -> bool;
}

/// A sensor source that replays a recorded sample trace.
///
/// Used by the `simulate` CLI command and by tests. The trace is a sequence
/// of samples already carrying their original timestamps; replay preserves
/// order but not wall-clock pacing, which the detector tolerates because it
/// works from sample timestamps, not arrival time.
#[derive(Debug)]
pub struct ReplaySource {
    samples: Vec<AccelerationSample>,
    running: bool,
}

impl ReplaySource {
    /// Create a replay source from a recorded trace.
    #[must_use]
    pub fn new(samples: Vec<AccelerationSample>) -> Self {
        Self {
            samples,
            running: false,
        }
    }

    /// Parse a replay source from JSON-lines text, one sample per line.
    ///
    /// Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if any non-blank line fails to parse.
    pub fn from_jsonl(text: &str) -> Result<Self, crate::error::Error> {
        let samples = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<Result<Vec<AccelerationSample>, _>>()?;
        Ok(Self::new(samples))
    }

    /// Number of samples in the trace.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the trace is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl SensorSource for ReplaySource {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn start(
        &mut self,
        sender: tokio::sync::mpsc::Sender<AccelerationSample>,
    ) -> Result<(), crate::error::Error> {
        let samples = self.samples.clone();
        self.running = true;
        tokio::spawn(async move {
            for sample in samples {
                if sender.send(sample).await.is_err() {
                    // Receiver dropped; nothing left to deliver to.
                    break;
                }
            }
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<(), crate::error::Error> {
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}
