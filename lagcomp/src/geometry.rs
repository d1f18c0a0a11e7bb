//! Minimal geometry used to test reconstructed poses.
//!
//! The host's physics engine owns the real scene. This module only knows how
//! to intersect rays with the transient proxies built from captures, and
//! defines [`SceneRaycaster`] so the host can add its own geometry to a test.

use crate::bounds::BoundsSample;
use crate::capture::{PoseCapture, ShapeKind};
use crate::error::LagCompError;
use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::ops::BitOr;

const PARALLEL_EPSILON: f32 = 1e-8;

/// A half-line with a unit-length direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Returns `None` when `direction` has no usable length.
    pub fn new(origin: Vec3, direction: Vec3) -> Option<Self> {
        let direction = direction.try_normalize()?;
        Some(Self { origin, direction })
    }

    /// Ray from `origin` toward `target`, with the distance between them.
    pub fn between(origin: Vec3, target: Vec3) -> Option<(Self, f32)> {
        let delta = target - origin;
        let length = delta.length();
        Self::new(origin, delta).map(|ray| (ray, length))
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

/// Bitmask of collision layers, one bit per layer index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const ALL: LayerMask = LayerMask(u32::MAX);
    pub const NONE: LayerMask = LayerMask(0);

    /// Mask with only `layer` set. Layers outside `0..32` produce an empty mask.
    pub fn layer(layer: u32) -> LayerMask {
        LayerMask(1u32.checked_shl(layer).unwrap_or(0))
    }

    pub fn contains(&self, layer: u32) -> bool {
        self.0 & LayerMask::layer(layer).0 != 0
    }
}

impl BitOr for LayerMask {
    type Output = LayerMask;

    fn bitor(self, rhs: LayerMask) -> LayerMask {
        LayerMask(self.0 | rhs.0)
    }
}

/// What a ray struck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitCollider {
    /// The proxy rebuilt from the sampled capture.
    Proxy,
    /// A host collider, identified by the host's own id.
    Scene(u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
    pub collider: HitCollider,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColliderShape {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
}

/// A posed shape that rays can be tested against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collider {
    pub shape: ColliderShape,
    pub position: Vec3,
    pub rotation: Quat,
}

impl Collider {
    pub fn cuboid(position: Vec3, rotation: Quat, half_extents: Vec3) -> Self {
        Self {
            shape: ColliderShape::Box { half_extents },
            position,
            rotation,
        }
    }

    pub fn ball(position: Vec3, radius: f32) -> Self {
        Self {
            shape: ColliderShape::Sphere { radius },
            position,
            rotation: Quat::IDENTITY,
        }
    }

    /// Rebuilds a collider from a capture, uniformly scaled by `scale`.
    ///
    /// Meshes are approximated by their bounding box.
    pub fn from_capture(capture: &PoseCapture, scale: f32) -> Result<Self, LagCompError> {
        if !(scale.is_finite() && scale > 0.0) || !capture.has_valid_size() {
            return Err(LagCompError::DegenerateShape {
                size: capture.size * scale,
            });
        }

        let shape = match capture.shape_kind {
            ShapeKind::Box | ShapeKind::Mesh => ColliderShape::Box {
                half_extents: capture.size * 0.5 * scale,
            },
            ShapeKind::Sphere => ColliderShape::Sphere {
                radius: capture.size.x * scale,
            },
        };

        Ok(Self {
            shape,
            position: capture.position,
            rotation: capture.rotation.normalize(),
        })
    }

    /// World-space axis-aligned bounds enclosing the collider.
    pub fn world_bounds(&self) -> BoundsSample {
        match self.shape {
            ColliderShape::Box { half_extents } => {
                let basis = Mat3::from_quat(self.rotation);
                let extent = basis.x_axis.abs() * half_extents.x
                    + basis.y_axis.abs() * half_extents.y
                    + basis.z_axis.abs() * half_extents.z;
                BoundsSample::new(self.position, extent)
            }
            ColliderShape::Sphere { radius } => {
                BoundsSample::new(self.position, Vec3::splat(radius))
            }
        }
    }

    /// Distance and surface normal of the first intersection within `max_distance`.
    ///
    /// A ray starting inside the collider hits at distance zero.
    pub fn raycast(&self, ray: &Ray, max_distance: f32) -> Option<(f32, Vec3)> {
        let (distance, normal) = match self.shape {
            ColliderShape::Box { half_extents } => self.raycast_box(ray, half_extents)?,
            ColliderShape::Sphere { radius } => self.raycast_sphere(ray, radius)?,
        };
        (distance <= max_distance).then_some((distance, normal))
    }

    fn raycast_box(&self, ray: &Ray, half_extents: Vec3) -> Option<(f32, Vec3)> {
        let inverse = self.rotation.inverse();
        let origin = inverse * (ray.origin - self.position);
        let direction = inverse * ray.direction;

        let mut t_enter = f32::NEG_INFINITY;
        let mut t_exit = f32::INFINITY;
        let mut enter_normal = Vec3::ZERO;

        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            let h = half_extents[axis];

            if d.abs() < PARALLEL_EPSILON {
                if o.abs() > h {
                    return None;
                }
                continue;
            }

            let mut near = (-h - o) / d;
            let mut far = (h - o) / d;
            let mut sign = -1.0;
            if near > far {
                std::mem::swap(&mut near, &mut far);
                sign = 1.0;
            }

            if near > t_enter {
                t_enter = near;
                enter_normal = Vec3::ZERO;
                enter_normal[axis] = sign;
            }
            t_exit = t_exit.min(far);
            if t_enter > t_exit {
                return None;
            }
        }

        if t_exit < 0.0 {
            return None;
        }
        if t_enter < 0.0 {
            return Some((0.0, -ray.direction));
        }
        Some((t_enter, self.rotation * enter_normal))
    }

    fn raycast_sphere(&self, ray: &Ray, radius: f32) -> Option<(f32, Vec3)> {
        let offset = ray.origin - self.position;
        let b = offset.dot(ray.direction);
        let c = offset.length_squared() - radius * radius;

        if c <= 0.0 {
            return Some((0.0, -ray.direction));
        }
        if b > 0.0 {
            return None;
        }
        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }

        let distance = -b - discriminant.sqrt();
        let normal = (ray.at(distance) - self.position).normalize_or_zero();
        Some((distance, normal))
    }
}

/// The host's live scene, queried alongside the proxy.
pub trait SceneRaycaster {
    /// Nearest hit on any scene collider whose layer is in `layers`.
    fn raycast(&self, ray: &Ray, max_distance: f32, layers: LayerMask) -> Option<RaycastHit>;
}

/// A scene with nothing in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScene;

impl SceneRaycaster for NoScene {
    fn raycast(&self, _ray: &Ray, _max_distance: f32, _layers: LayerMask) -> Option<RaycastHit> {
        None
    }
}

/// A collider registered with a plain list-backed scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneCollider {
    pub id: u32,
    pub layer: u32,
    pub collider: Collider,
}

impl SceneRaycaster for [SceneCollider] {
    fn raycast(&self, ray: &Ray, max_distance: f32, layers: LayerMask) -> Option<RaycastHit> {
        self.iter()
            .filter(|entry| layers.contains(entry.layer))
            .filter_map(|entry| {
                entry
                    .collider
                    .raycast(ray, max_distance)
                    .map(|(distance, normal)| RaycastHit {
                        point: ray.at(distance),
                        normal,
                        distance,
                        collider: HitCollider::Scene(entry.id),
                    })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

impl SceneRaycaster for Vec<SceneCollider> {
    fn raycast(&self, ray: &Ray, max_distance: f32, layers: LayerMask) -> Option<RaycastHit> {
        self.as_slice().raycast(ray, max_distance, layers)
    }
}
