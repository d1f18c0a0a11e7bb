//! Validation of remote claims against reconstructed past poses.
//!
//! A [`HitValidator`] borrows one object's [`TemporalCaptureBuffer`] for the
//! duration of a query. It samples the buffer at the time the remote viewer
//! acted, rebuilds a proxy from that pose, and tests the claim against the
//! proxy. Nothing it builds outlives the call.

use crate::buffer::TemporalCaptureBuffer;
use crate::error::LagCompError;
use crate::geometry::{Collider, HitCollider, LayerMask, NoScene, Ray, RaycastHit, SceneRaycaster};
use glam::Vec3;

/// Outcome of a point-distance check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsCheck {
    pub matched: bool,
    pub distance: f32,
    /// Closest point on the reconstructed bounds to the probe.
    pub nearest: Vec3,
}

/// Outcome of a ray check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastCheck {
    pub hit: bool,
    /// First intersection along the ray, if any.
    pub info: Option<RaycastHit>,
}

impl RaycastCheck {
    const MISS: RaycastCheck = RaycastCheck {
        hit: false,
        info: None,
    };

    /// True when the first thing the ray struck was the reconstructed object.
    pub fn hit_proxy(&self) -> bool {
        matches!(
            self.info,
            Some(RaycastHit {
                collider: HitCollider::Proxy,
                ..
            })
        )
    }
}

pub struct HitValidator<'a, S: SceneRaycaster + ?Sized = NoScene> {
    buffer: &'a TemporalCaptureBuffer,
    scene: &'a S,
    proxy_layer: u32,
}

impl<'a> HitValidator<'a, NoScene> {
    /// Validator that only tests the reconstructed object.
    pub fn new(buffer: &'a TemporalCaptureBuffer) -> Self {
        Self {
            buffer,
            scene: &NoScene,
            proxy_layer: 0,
        }
    }
}

impl<'a, S: SceneRaycaster + ?Sized> HitValidator<'a, S> {
    /// Validator that also lets the host's scene occlude the object.
    pub fn with_scene(buffer: &'a TemporalCaptureBuffer, scene: &'a S) -> Self {
        Self {
            buffer,
            scene,
            proxy_layer: 0,
        }
    }

    /// Layer the reconstructed proxy lives on for ray filtering.
    pub fn proxy_layer(mut self, layer: u32) -> Self {
        self.proxy_layer = layer;
        self
    }

    /// Checks whether `probe_point` was within `tolerance` of the object's
    /// bounds at `viewer_time_estimate`.
    pub fn bounds_check(
        &self,
        viewer_time_estimate: f64,
        probe_point: Vec3,
        tolerance: f32,
    ) -> Result<BoundsCheck, LagCompError> {
        let pose = self.buffer.sample_pose(viewer_time_estimate)?;
        let bounds = Collider::from_capture(&pose, 1.0)?.world_bounds();

        let nearest = bounds.closest_point(probe_point);
        let distance = nearest.distance(probe_point);
        Ok(BoundsCheck {
            matched: distance <= tolerance,
            distance,
            nearest,
        })
    }

    /// Casts from `origin` toward `target_point` against the object as it was
    /// at `viewer_time_estimate`.
    ///
    /// The proxy is inflated by `1 + tolerance_percent` and the ray reaches
    /// twice the origin-to-target distance. Scene colliders in `layer_filter`
    /// can block the proxy. A zero-length ray never hits.
    pub fn raycast_check(
        &self,
        viewer_time_estimate: f64,
        origin: Vec3,
        target_point: Vec3,
        tolerance_percent: f32,
        layer_filter: LayerMask,
    ) -> Result<RaycastCheck, LagCompError> {
        let pose = self.buffer.sample_pose(viewer_time_estimate)?;
        let proxy = Collider::from_capture(&pose, 1.0 + tolerance_percent)?;

        let Some((ray, length)) = Ray::between(origin, target_point) else {
            return Ok(RaycastCheck::MISS);
        };
        let max_distance = length * 2.0;

        let proxy_hit = if layer_filter.contains(self.proxy_layer) {
            proxy
                .raycast(&ray, max_distance)
                .map(|(distance, normal)| RaycastHit {
                    point: ray.at(distance),
                    normal,
                    distance,
                    collider: HitCollider::Proxy,
                })
        } else {
            None
        };
        let scene_hit = self.scene.raycast(&ray, max_distance, layer_filter);

        let info = match (proxy_hit, scene_hit) {
            (Some(p), Some(s)) if s.distance < p.distance => Some(s),
            (Some(p), _) => Some(p),
            (None, s) => s,
        };

        Ok(RaycastCheck {
            hit: info.is_some(),
            info,
        })
    }
}
