//! Per-target pose history and claim checks.
//!
//! A [`LagCompensator`] is attached to every tracked target. The host calls
//! [`LagCompensator::tick`] once per simulation step; a capture is recorded
//! whenever the capture interval has elapsed. Validation calls sample that
//! history and fail closed on any error.

use glam::Vec3;
use lagcomp::{
    BoundsCheck, CaptureSchedule, CaptureSource, HitValidator, LagCompError,
    LagCompensationSettings, LayerMask, PoseCapture, RaycastCheck, SceneRaycaster,
    TemporalCaptureBuffer,
};
use log::{debug, warn};

#[derive(Debug, Clone)]
pub struct LagCompensator {
    target_id: u32,
    schedule: CaptureSchedule,
    history: TemporalCaptureBuffer,
    tolerance: f32,
    tolerance_percent: f32,
    proxy_layer: u32,
}

impl LagCompensator {
    pub fn new(target_id: u32, settings: &LagCompensationSettings) -> Self {
        Self {
            target_id,
            schedule: CaptureSchedule::new(settings.capture_interval),
            history: TemporalCaptureBuffer::new(settings.history_window, settings.capture_limit),
            tolerance: settings.tolerance,
            tolerance_percent: settings.tolerance_percent,
            proxy_layer: settings.proxy_layer,
        }
    }

    pub fn target_id(&self) -> u32 {
        self.target_id
    }

    pub fn history(&self) -> &TemporalCaptureBuffer {
        &self.history
    }

    /// Records a capture if one is due at `now`. Returns true when one was stored.
    pub fn tick<S: CaptureSource + ?Sized>(&mut self, now: f64, source: &S) -> bool {
        if !self.schedule.is_due(now) {
            return false;
        }
        match self.capture(now, source) {
            Ok(()) => {
                self.schedule.mark(now);
                true
            }
            Err(e) => {
                warn!("Target {}: dropped capture at {:.3}s: {}", self.target_id, now, e);
                false
            }
        }
    }

    /// Records a capture immediately, ignoring the schedule.
    pub fn capture<S: CaptureSource + ?Sized>(
        &mut self,
        now: f64,
        source: &S,
    ) -> Result<(), LagCompError> {
        self.history.insert(source.current_pose(now))
    }

    /// The target's reconstructed pose at `query_time`, if history covers it.
    pub fn sample(&self, query_time: f64) -> Option<PoseCapture> {
        match self.history.sample_pose(query_time) {
            Ok(pose) => Some(pose),
            Err(e) => {
                debug!(
                    "Target {}: history doesn't contain {:.3}s: {}",
                    self.target_id, query_time, e
                );
                None
            }
        }
    }

    /// Largest radius the target occupied anywhere in the retained history.
    pub fn max_bounding_radius(&self) -> f32 {
        self.history
            .iter()
            .map(PoseCapture::bounding_radius)
            .fold(0.0, f32::max)
    }

    pub fn bounds_check(
        &self,
        query_time: f64,
        probe_point: Vec3,
    ) -> Result<BoundsCheck, LagCompError> {
        HitValidator::new(&self.history).bounds_check(query_time, probe_point, self.tolerance)
    }

    pub fn raycast_check<S: SceneRaycaster + ?Sized>(
        &self,
        query_time: f64,
        origin: Vec3,
        target_point: Vec3,
        layer_filter: LayerMask,
        scene: &S,
    ) -> Result<RaycastCheck, LagCompError> {
        HitValidator::with_scene(&self.history, scene)
            .proxy_layer(self.proxy_layer)
            .raycast_check(
                query_time,
                origin,
                target_point,
                self.tolerance_percent,
                layer_filter,
            )
    }

    pub fn tolerance_percent(&self) -> f32 {
        self.tolerance_percent
    }

    /// Forgets all history, e.g. after the target teleports.
    pub fn reset(&mut self) {
        self.history.clear();
        self.schedule.reset();
    }
}
