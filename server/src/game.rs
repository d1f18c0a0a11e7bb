//! Authoritative world state: moving targets and static obstacles.

use glam::{Quat, Vec3};
use lagcomp::{BoundsSample, CaptureSource, Collider, PoseCapture, SceneCollider, ShapeKind};
use log::info;
use std::collections::HashMap;

/// Half-size of the cubic arena targets bounce around in.
pub const WORLD_HALF_EXTENT: f32 = 50.0;
/// Layer assigned to static obstacles.
pub const OBSTACLE_LAYER: u32 = 1;

/// A moving object whose history is tracked for lag compensation.
#[derive(Debug, Clone)]
pub struct Target {
    pub id: u32,
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation: Quat,
    /// Yaw rate in radians per second.
    pub spin: f32,
    pub size: Vec3,
    pub shape_kind: ShapeKind,
}

impl Target {
    pub fn new(id: u32, shape_kind: ShapeKind, position: Vec3, size: Vec3) -> Self {
        Self {
            id,
            position,
            velocity: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            spin: 0.0,
            size,
            shape_kind,
        }
    }

    /// Advances the target and bounces it off the arena walls.
    pub fn update_position(&mut self, dt: f32) {
        self.position += self.velocity * dt;
        self.rotation = (Quat::from_rotation_y(self.spin * dt) * self.rotation).normalize();

        let limit = WORLD_HALF_EXTENT;
        for axis in 0..3 {
            if self.position[axis] > limit {
                self.position[axis] = limit;
                self.velocity[axis] = -self.velocity[axis].abs();
            } else if self.position[axis] < -limit {
                self.position[axis] = -limit;
                self.velocity[axis] = self.velocity[axis].abs();
            }
        }
    }

    fn collider(&self) -> Collider {
        match self.shape_kind {
            ShapeKind::Sphere => Collider::ball(self.position, self.size.x),
            ShapeKind::Box | ShapeKind::Mesh => {
                Collider::cuboid(self.position, self.rotation, self.size * 0.5)
            }
        }
    }
}

impl CaptureSource for Target {
    fn current_bounds(&self) -> BoundsSample {
        self.collider().world_bounds()
    }

    fn current_pose(&self, timestamp: f64) -> PoseCapture {
        PoseCapture::new(
            timestamp,
            self.position,
            self.rotation,
            self.size,
            self.shape_kind,
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct World {
    pub tick: u32,
    /// Simulation clock in seconds, advanced by whole ticks.
    pub time: f64,
    pub targets: HashMap<u32, Target>,
    pub obstacles: Vec<SceneCollider>,
    next_target_id: u32,
    next_obstacle_id: u32,
}

impl World {
    pub fn new() -> Self {
        Self {
            next_target_id: 1,
            next_obstacle_id: 1,
            ..Default::default()
        }
    }

    pub fn add_target(
        &mut self,
        shape_kind: ShapeKind,
        position: Vec3,
        size: Vec3,
        velocity: Vec3,
        spin: f32,
    ) -> u32 {
        let id = self.next_target_id;
        self.next_target_id += 1;

        let mut target = Target::new(id, shape_kind, position, size);
        target.velocity = velocity;
        target.spin = spin;

        info!(
            "Added {:?} target {} at ({:.2}, {:.2}, {:.2})",
            shape_kind, id, position.x, position.y, position.z
        );
        self.targets.insert(id, target);
        id
    }

    pub fn remove_target(&mut self, target_id: &u32) -> bool {
        let removed = self.targets.remove(target_id).is_some();
        if removed {
            info!("Removed target {}", target_id);
        }
        removed
    }

    /// Adds a static axis-aligned wall that can block shots.
    pub fn add_obstacle(&mut self, center: Vec3, half_extents: Vec3) -> u32 {
        let id = self.next_obstacle_id;
        self.next_obstacle_id += 1;
        self.obstacles.push(SceneCollider {
            id,
            layer: OBSTACLE_LAYER,
            collider: Collider::cuboid(center, Quat::IDENTITY, half_extents),
        });
        id
    }

    /// Moves every target and advances the clock by one tick.
    pub fn update_physics(&mut self, dt: f64) {
        for target in self.targets.values_mut() {
            target.update_position(dt as f32);
        }
        self.tick += 1;
        self.time += dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_target_creation() {
        let target = Target::new(3, ShapeKind::Box, Vec3::new(1.0, 2.0, 3.0), Vec3::ONE);
        assert_eq!(target.id, 3);
        assert_eq!(target.velocity, Vec3::ZERO);
        assert_eq!(target.rotation, Quat::IDENTITY);
    }

    #[test]
    fn test_target_moves_and_spins() {
        let mut target = Target::new(1, ShapeKind::Box, Vec3::ZERO, Vec3::ONE);
        target.velocity = Vec3::new(10.0, 0.0, 0.0);
        target.spin = std::f32::consts::PI;

        target.update_position(0.5);
        assert_approx_eq!(target.position.x, 5.0, 1e-6);
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        assert!(target.rotation.angle_between(expected) < 1e-3);
    }

    #[test]
    fn test_target_bounces_off_walls() {
        let mut target = Target::new(
            1,
            ShapeKind::Sphere,
            Vec3::new(WORLD_HALF_EXTENT - 1.0, 0.0, 0.0),
            Vec3::ONE,
        );
        target.velocity = Vec3::new(10.0, 0.0, 0.0);

        target.update_position(1.0);
        assert_eq!(target.position.x, WORLD_HALF_EXTENT);
        assert!(target.velocity.x < 0.0);
    }

    #[test]
    fn test_capture_source_reports_pose_and_bounds() {
        let mut target = Target::new(
            1,
            ShapeKind::Box,
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(2.0, 4.0, 2.0),
        );
        target.rotation = Quat::from_rotation_y(0.3);

        let pose = target.current_pose(1.5);
        assert_eq!(pose.timestamp, 1.5);
        assert_eq!(pose.position, target.position);
        assert_eq!(pose.shape_kind, ShapeKind::Box);

        let bounds = target.current_bounds();
        assert_eq!(bounds.center, target.position);
        assert_approx_eq!(bounds.half_extents.y, 2.0, 1e-5);
        assert!(bounds.half_extents.x > 1.0);
    }

    #[test]
    fn test_world_add_remove_and_tick() {
        let mut world = World::new();
        let a = world.add_target(ShapeKind::Box, Vec3::ZERO, Vec3::ONE, Vec3::X, 0.0);
        let b = world.add_target(ShapeKind::Sphere, Vec3::ONE, Vec3::ONE, Vec3::ZERO, 0.0);
        assert_eq!((a, b), (1, 2));

        world.update_physics(0.1);
        assert_eq!(world.tick, 1);
        assert_approx_eq!(world.time, 0.1, 1e-12);
        assert_approx_eq!(world.targets[&a].position.x, 0.1, 1e-6);

        assert!(world.remove_target(&a));
        assert!(!world.remove_target(&a));
        assert_eq!(world.targets.len(), 1);
    }

    #[test]
    fn test_obstacles_live_on_obstacle_layer() {
        let mut world = World::new();
        let id = world.add_obstacle(Vec3::ZERO, Vec3::ONE);
        assert_eq!(id, 1);
        assert_eq!(world.obstacles[0].layer, OBSTACLE_LAYER);
    }
}
