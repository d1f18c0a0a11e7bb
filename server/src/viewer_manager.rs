//! Remote viewer tracking and view-time estimation
//!
//! This module keeps the server-side record of every remote participant that
//! can submit hit claims:
//! - Viewer lifecycle (join, leave, timeout)
//! - Round-trip time estimation from latency reports
//! - Capacity management
//!
//! It also owns the policy that turns "a viewer made a claim now" into the
//! server timestamp the claim is validated against.

use log::{debug, info};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Weight of a new round-trip sample in the smoothed estimate.
pub const RTT_SMOOTHING: f64 = 0.125;

/// A connected remote viewer.
#[derive(Debug)]
pub struct Viewer {
    /// Unique viewer identifier assigned by the server
    pub id: u32,
    /// Last time we heard from this viewer
    pub last_seen: Instant,
    /// Smoothed round-trip time in seconds, once any sample arrived
    pub rtt: Option<f64>,
}

impl Viewer {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            last_seen: Instant::now(),
            rtt: None,
        }
    }

    /// Folds a round-trip sample into the estimate.
    ///
    /// The first sample is taken as-is; later samples are blended with an
    /// exponential moving average. Negative or non-finite samples are ignored.
    pub fn record_rtt(&mut self, sample: f64) {
        self.last_seen = Instant::now();
        if !(sample.is_finite() && sample >= 0.0) {
            return;
        }
        self.rtt = Some(match self.rtt {
            Some(rtt) => rtt + (sample - rtt) * RTT_SMOOTHING,
            None => sample,
        });
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected viewers.
pub struct ViewerManager {
    viewers: HashMap<u32, Viewer>,
    next_viewer_id: u32,
    max_viewers: usize,
    /// Seconds viewers render behind the newest state they received
    interpolation_delay: f64,
}

impl ViewerManager {
    pub fn new(max_viewers: usize, interpolation_delay: f64) -> Self {
        Self {
            viewers: HashMap::new(),
            next_viewer_id: 1,
            max_viewers,
            interpolation_delay: interpolation_delay.max(0.0),
        }
    }

    /// Returns the new viewer's id, or `None` when at capacity.
    pub fn add_viewer(&mut self) -> Option<u32> {
        if self.viewers.len() >= self.max_viewers {
            return None;
        }

        let viewer_id = self.next_viewer_id;
        self.next_viewer_id += 1;

        info!("Viewer {} joined", viewer_id);
        self.viewers.insert(viewer_id, Viewer::new(viewer_id));
        Some(viewer_id)
    }

    pub fn remove_viewer(&mut self, viewer_id: &u32) -> bool {
        if let Some(viewer) = self.viewers.remove(viewer_id) {
            info!("Viewer {} left", viewer.id);
            true
        } else {
            false
        }
    }

    /// Returns false if the viewer is unknown.
    pub fn record_rtt(&mut self, viewer_id: u32, rtt: f64) -> bool {
        if let Some(viewer) = self.viewers.get_mut(&viewer_id) {
            viewer.record_rtt(rtt);
            debug!("Viewer {} rtt sample {:.1}ms", viewer_id, rtt * 1000.0);
            true
        } else {
            false
        }
    }

    pub fn touch(&mut self, viewer_id: u32) {
        if let Some(viewer) = self.viewers.get_mut(&viewer_id) {
            viewer.last_seen = Instant::now();
        }
    }

    pub fn get(&self, viewer_id: &u32) -> Option<&Viewer> {
        self.viewers.get(viewer_id)
    }

    /// Server time the viewer was looking at when it acted at `server_now`.
    ///
    /// The claim travelled for half a round trip, and the viewer renders
    /// `interpolation_delay` behind what it last received. Viewers without an
    /// RTT sample are treated as having zero latency.
    pub fn estimate_view_time(&self, viewer_id: &u32, server_now: f64) -> Option<f64> {
        self.viewers.get(viewer_id).map(|viewer| {
            let one_way = viewer.rtt.unwrap_or(0.0) / 2.0;
            server_now - one_way - self.interpolation_delay
        })
    }

    /// Removes viewers that have been silent for longer than `timeout`.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .viewers
            .iter()
            .filter(|(_, viewer)| viewer.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for viewer_id in &timed_out {
            self.remove_viewer(viewer_id);
        }

        timed_out
    }

    pub fn len(&self) -> usize {
        self.viewers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewers.is_empty()
    }
}
