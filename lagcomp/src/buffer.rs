//! Fine-grained pose history with interpolated sampling.

use crate::capture::PoseCapture;
use crate::error::LagCompError;
use std::collections::VecDeque;

/// The two captures bracketing a sampled time and the blend factor between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleResult {
    pub before: PoseCapture,
    pub after: PoseCapture,
    /// Always within `[0, 1]`.
    pub t: f64,
}

impl SampleResult {
    /// Reconstructs the pose at the sampled time.
    pub fn interpolate(&self) -> PoseCapture {
        PoseCapture::interpolate(&self.before, &self.after, self.t)
    }
}

/// Time-ordered pose captures for one tracked object.
///
/// Timestamps are strictly increasing. After every insert, entries older than
/// `newest - window` are dropped, and the buffer never holds more than
/// `capture_limit` entries.
#[derive(Debug, Clone)]
pub struct TemporalCaptureBuffer {
    entries: VecDeque<PoseCapture>,
    window: f64,
    capture_limit: usize,
}

impl TemporalCaptureBuffer {
    pub fn new(window: f64, capture_limit: usize) -> Self {
        let capture_limit = capture_limit.max(2);
        Self {
            entries: VecDeque::with_capacity(capture_limit),
            window: window.max(0.0),
            capture_limit,
        }
    }

    /// Appends a capture and evicts whatever fell out of the window.
    ///
    /// A capture with the same timestamp as the newest entry replaces it.
    /// Older captures are rejected and leave the buffer untouched.
    pub fn insert(&mut self, capture: PoseCapture) -> Result<(), LagCompError> {
        if !capture.timestamp.is_finite() {
            return Err(LagCompError::NonFiniteTime);
        }

        if let Some(newest) = self.entries.back_mut() {
            if capture.timestamp < newest.timestamp {
                return Err(LagCompError::OutOfOrderCapture {
                    timestamp: capture.timestamp,
                    newest: newest.timestamp,
                });
            }
            if capture.timestamp == newest.timestamp {
                *newest = capture;
                return Ok(());
            }
        }

        self.entries.push_back(capture);

        let horizon = capture.timestamp - self.window;
        while self
            .entries
            .front()
            .is_some_and(|oldest| oldest.timestamp < horizon)
        {
            self.entries.pop_front();
        }
        while self.entries.len() > self.capture_limit {
            self.entries.pop_front();
        }

        Ok(())
    }

    /// Finds the captures bracketing `query_time`.
    ///
    /// Never extrapolates: times outside the recorded span are errors.
    pub fn sample(&self, query_time: f64) -> Result<SampleResult, LagCompError> {
        if !query_time.is_finite() {
            return Err(LagCompError::NonFiniteTime);
        }

        let (oldest, newest) = match (self.entries.front(), self.entries.back()) {
            (Some(oldest), Some(newest)) if self.entries.len() >= 2 => (oldest, newest),
            _ => {
                return Err(LagCompError::InsufficientHistory {
                    available: self.entries.len(),
                })
            }
        };

        if query_time < oldest.timestamp {
            return Err(LagCompError::TooOld {
                requested: query_time,
                oldest: oldest.timestamp,
            });
        }
        if query_time > newest.timestamp {
            return Err(LagCompError::TooNew {
                requested: query_time,
                newest: newest.timestamp,
            });
        }

        // Number of entries at or before the query; at least 1 here.
        let at_or_before = self
            .entries
            .partition_point(|entry| entry.timestamp <= query_time);
        let after_index = at_or_before.min(self.entries.len() - 1);
        let before = self.entries[after_index - 1];
        let after = self.entries[after_index];

        let span = after.timestamp - before.timestamp;
        let t = if span > 0.0 {
            ((query_time - before.timestamp) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Ok(SampleResult { before, after, t })
    }

    /// Samples and interpolates in one step.
    pub fn sample_pose(&self, query_time: f64) -> Result<PoseCapture, LagCompError> {
        let mut pose = self.sample(query_time)?.interpolate();
        pose.timestamp = query_time;
        Ok(pose)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn oldest(&self) -> Option<&PoseCapture> {
        self.entries.front()
    }

    pub fn newest(&self) -> Option<&PoseCapture> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PoseCapture> {
        self.entries.iter()
    }

    /// Seconds between the oldest and newest retained capture.
    pub fn time_span(&self) -> f64 {
        match (self.entries.front(), self.entries.back()) {
            (Some(oldest), Some(newest)) => newest.timestamp - oldest.timestamp,
            _ => 0.0,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
