//! Pose snapshots and the hooks the host uses to produce them.

use crate::bounds::BoundsSample;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Which collider a capture was taken from.
///
/// The meaning of [`PoseCapture::size`] depends on the kind:
/// `Box` stores the full box extents, `Sphere` stores the radius in `size.x`,
/// and `Mesh` stores the full extents of the mesh's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Box,
    Sphere,
    Mesh,
}

/// A reconstructible pose of a tracked object at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseCapture {
    /// Monotonic simulation time in seconds.
    pub timestamp: f64,
    pub position: Vec3,
    pub rotation: Quat,
    pub size: Vec3,
    pub shape_kind: ShapeKind,
}

impl PoseCapture {
    pub fn new(
        timestamp: f64,
        position: Vec3,
        rotation: Quat,
        size: Vec3,
        shape_kind: ShapeKind,
    ) -> Self {
        Self {
            timestamp,
            position,
            rotation,
            size,
            shape_kind,
        }
    }

    /// Blends two captures.
    ///
    /// Position and size are lerped, rotation takes the shortest arc, and the
    /// shape kind is always taken from `before`. The result carries the
    /// blended timestamp for reference only.
    pub fn interpolate(before: &PoseCapture, after: &PoseCapture, t: f64) -> PoseCapture {
        let tf = t as f32;
        // glam's slerp already takes the shortest arc.
        PoseCapture {
            timestamp: before.timestamp + (after.timestamp - before.timestamp) * t,
            position: before.position.lerp(after.position, tf),
            rotation: before.rotation.slerp(after.rotation, tf),
            size: before.size.lerp(after.size, tf),
            shape_kind: before.shape_kind,
        }
    }

    /// Radius of a sphere around `position` that encloses the shape at any rotation.
    pub fn bounding_radius(&self) -> f32 {
        match self.shape_kind {
            ShapeKind::Sphere => self.size.x.abs(),
            ShapeKind::Box | ShapeKind::Mesh => self.size.length() * 0.5,
        }
    }

    /// True when the size can back a collision proxy of this capture's kind.
    pub fn has_valid_size(&self) -> bool {
        match self.shape_kind {
            ShapeKind::Sphere => self.size.x.is_finite() && self.size.x > 0.0,
            ShapeKind::Box | ShapeKind::Mesh => {
                self.size.is_finite() && self.size.cmpgt(Vec3::ZERO).all()
            }
        }
    }
}

/// Read-only view of a live object, implemented by the host.
///
/// The history never touches the object's transform; it only copies these
/// values once per capture.
pub trait CaptureSource {
    /// Current world-space axis-aligned bounds.
    fn current_bounds(&self) -> BoundsSample;

    /// Current full pose. The timestamp is supplied by the caller.
    fn current_pose(&self, timestamp: f64) -> PoseCapture;
}

/// "Is it time yet" gate for periodic captures.
///
/// The first check is always due. After a capture at `t`, the next one is due
/// once `now >= t + interval`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSchedule {
    interval: f64,
    last_capture: Option<f64>,
}

impl CaptureSchedule {
    pub fn new(interval: f64) -> Self {
        Self {
            interval: interval.max(0.0),
            last_capture: None,
        }
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn last_capture(&self) -> Option<f64> {
        self.last_capture
    }

    pub fn is_due(&self, now: f64) -> bool {
        match self.last_capture {
            Some(last) => now >= last + self.interval,
            None => true,
        }
    }

    pub fn mark(&mut self, now: f64) {
        self.last_capture = Some(now);
    }

    /// Marks and returns true when a capture is due at `now`.
    pub fn poll(&mut self, now: f64) -> bool {
        if self.is_due(now) {
            self.mark(now);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.last_capture = None;
    }
}
