//! Coarse per-target bounds history used as a broad phase for shot claims.

use glam::Quat;
use lagcomp::{
    BoundsSample, BucketedBoundsHistory, CaptureSchedule, CaptureSource, Collider,
    LagCompensationSettings, Ray,
};

#[derive(Debug, Clone)]
pub struct HistoryCollider {
    schedule: CaptureSchedule,
    history: BucketedBoundsHistory,
}

impl HistoryCollider {
    pub fn new(settings: &LagCompensationSettings) -> Self {
        Self {
            schedule: CaptureSchedule::new(settings.capture_interval),
            history: BucketedBoundsHistory::new(settings.bounds_limit, settings.bounds_per_bucket),
        }
    }

    /// Records the source's current bounds if a capture is due at `now`.
    pub fn tick<S: CaptureSource + ?Sized>(&mut self, now: f64, source: &S) -> bool {
        if self.schedule.poll(now) {
            self.history.insert(source.current_bounds());
            true
        } else {
            false
        }
    }

    /// Volume enclosing the target's whole recorded path, once anything is recorded.
    pub fn broad_phase_bounds(&self) -> Option<BoundsSample> {
        (!self.history.is_empty()).then(|| self.history.total())
    }

    /// Conservative test of whether `ray` could reach the recorded path.
    ///
    /// `margin` pads the broad-phase volume on every side. With no history
    /// nothing can be ruled out.
    pub fn may_intersect(&self, ray: &Ray, max_distance: f32, margin: f32) -> bool {
        let Some(bounds) = self.broad_phase_bounds() else {
            return true;
        };
        let padded = bounds.expanded(margin);
        Collider::cuboid(padded.center, Quat::IDENTITY, padded.half_extents)
            .raycast(ray, max_distance)
            .is_some()
    }

    pub fn bucket_count(&self) -> usize {
        self.history.bucket_count()
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.schedule.reset();
    }
}
