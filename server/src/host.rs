//! Authoritative host loop: advances the world, records history and judges claims

use crate::compensator::LagCompensator;
use crate::game::World;
use crate::history_collider::HistoryCollider;
use crate::viewer_manager::ViewerManager;
use glam::Vec3;
use lagcomp::{
    HitCollider, LagCompError, LagCompensationSettings, LayerMask, Ray, RaycastHit, ShapeKind,
};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};

/// Viewers silent for this long are dropped.
pub const VIEWER_TIMEOUT: Duration = Duration::from_secs(5);

/// What a viewer says it did to a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClaimKind {
    /// The viewer touched or hit the target at `point`.
    Point { point: Vec3 },
    /// The viewer fired from `origin` toward `target`.
    Ray { origin: Vec3, target: Vec3 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitClaim {
    pub viewer_id: u32,
    pub target_id: u32,
    pub kind: ClaimKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    UnknownViewer,
    UnknownTarget,
    /// The reconstructed target was not where the viewer claimed.
    Missed { distance: Option<f32> },
    /// The ray never came near the target's recent path.
    OutsideBroadPhase,
    /// Scene geometry was struck before the target.
    Occluded { obstacle_id: u32 },
    /// The view time could not be reconstructed.
    History(LagCompError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClaimVerdict {
    Confirmed {
        query_time: f64,
        point: Vec3,
    },
    Rejected {
        query_time: Option<f64>,
        reason: RejectReason,
    },
}

impl ClaimVerdict {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ClaimVerdict::Confirmed { .. })
    }
}

/// Requests delivered to the host loop.
#[derive(Debug)]
pub enum HostMessage {
    Join {
        reply: oneshot::Sender<Option<u32>>,
    },
    Leave {
        viewer_id: u32,
    },
    Latency {
        viewer_id: u32,
        rtt: f64,
    },
    /// Current target positions, as a viewer would receive them.
    Snapshot {
        reply: oneshot::Sender<Vec<(u32, Vec3)>>,
    },
    Claim {
        claim: HitClaim,
        reply: oneshot::Sender<ClaimVerdict>,
    },
    Shutdown,
}

#[derive(Debug, Clone)]
struct Tracked {
    compensator: LagCompensator,
    collider: HistoryCollider,
}

/// Owns the world and every target's history; all access happens on the
/// task running [`Host::run`].
pub struct Host {
    world: World,
    tracked: HashMap<u32, Tracked>,
    viewers: ViewerManager,
    settings: LagCompensationSettings,
    tick_duration: Duration,

    host_tx: mpsc::UnboundedSender<HostMessage>,
    host_rx: mpsc::UnboundedReceiver<HostMessage>,
}

impl Host {
    pub fn new(
        settings: LagCompensationSettings,
        tick_duration: Duration,
        max_viewers: usize,
        interpolation_delay: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        settings.validate()?;
        if tick_duration.is_zero() {
            return Err("tick duration must be non-zero".into());
        }

        let (host_tx, host_rx) = mpsc::unbounded_channel();
        info!(
            "Host ready: {:.1}Hz tick, {:.0}ms capture interval, {:.2}s history",
            1.0 / tick_duration.as_secs_f64(),
            settings.capture_interval * 1000.0,
            settings.history_window
        );

        Ok(Host {
            world: World::new(),
            tracked: HashMap::new(),
            viewers: ViewerManager::new(max_viewers, interpolation_delay),
            settings,
            tick_duration,
            host_tx,
            host_rx,
        })
    }

    /// Handle for submitting requests to a running host.
    pub fn sender(&self) -> mpsc::UnboundedSender<HostMessage> {
        self.host_tx.clone()
    }

    pub fn time(&self) -> f64 {
        self.world.time
    }

    pub fn settings(&self) -> &LagCompensationSettings {
        &self.settings
    }

    pub fn compensator(&self, target_id: &u32) -> Option<&LagCompensator> {
        self.tracked.get(target_id).map(|tracked| &tracked.compensator)
    }

    pub fn join_viewer(&mut self) -> Option<u32> {
        self.viewers.add_viewer()
    }

    pub fn leave_viewer(&mut self, viewer_id: u32) -> bool {
        self.viewers.remove_viewer(&viewer_id)
    }

    pub fn record_latency(&mut self, viewer_id: u32, rtt: f64) -> bool {
        self.viewers.record_rtt(viewer_id, rtt)
    }

    /// Adds a target and records its first capture immediately.
    pub fn spawn_target(
        &mut self,
        shape_kind: ShapeKind,
        position: Vec3,
        size: Vec3,
        velocity: Vec3,
        spin: f32,
    ) -> u32 {
        let id = self
            .world
            .add_target(shape_kind, position, size, velocity, spin);

        let mut tracked = Tracked {
            compensator: LagCompensator::new(id, &self.settings),
            collider: HistoryCollider::new(&self.settings),
        };
        if let Some(target) = self.world.targets.get(&id) {
            tracked.compensator.tick(self.world.time, target);
            tracked.collider.tick(self.world.time, target);
        }
        self.tracked.insert(id, tracked);
        id
    }

    pub fn despawn_target(&mut self, target_id: u32) -> bool {
        self.tracked.remove(&target_id);
        self.world.remove_target(&target_id)
    }

    pub fn add_obstacle(&mut self, center: Vec3, half_extents: Vec3) -> u32 {
        self.world.add_obstacle(center, half_extents)
    }

    pub fn snapshot(&self) -> Vec<(u32, Vec3)> {
        let mut positions: Vec<(u32, Vec3)> = self
            .world
            .targets
            .values()
            .map(|target| (target.id, target.position))
            .collect();
        positions.sort_by_key(|(id, _)| *id);
        positions
    }

    /// Advances one fixed tick.
    pub fn step(&mut self) {
        self.step_by(self.tick_duration.as_secs_f64());
    }

    /// Moves the world by `dt` seconds and records whatever captures are due.
    pub fn step_by(&mut self, dt: f64) {
        self.world.update_physics(dt);

        let now = self.world.time;
        for (id, target) in &self.world.targets {
            if let Some(tracked) = self.tracked.get_mut(id) {
                tracked.compensator.tick(now, target);
                tracked.collider.tick(now, target);
            }
        }
    }

    /// Judges a claim against the target's history at the viewer's view time.
    pub fn handle_claim(&mut self, claim: &HitClaim) -> ClaimVerdict {
        let Some(query_time) = self
            .viewers
            .estimate_view_time(&claim.viewer_id, self.world.time)
        else {
            return Self::reject(claim, None, RejectReason::UnknownViewer);
        };
        self.viewers.touch(claim.viewer_id);

        let Some(tracked) = self.tracked.get(&claim.target_id) else {
            return Self::reject(claim, Some(query_time), RejectReason::UnknownTarget);
        };

        let verdict = match claim.kind {
            ClaimKind::Point { point } => {
                match tracked.compensator.bounds_check(query_time, point) {
                    Ok(check) if check.matched => ClaimVerdict::Confirmed {
                        query_time,
                        point: check.nearest,
                    },
                    Ok(check) => Self::reject(
                        claim,
                        Some(query_time),
                        RejectReason::Missed {
                            distance: Some(check.distance),
                        },
                    ),
                    Err(e) => Self::reject(claim, Some(query_time), RejectReason::History(e)),
                }
            }
            ClaimKind::Ray { origin, target } => {
                self.judge_ray(claim, tracked, query_time, origin, target)
            }
        };

        if let ClaimVerdict::Confirmed { point, .. } = &verdict {
            info!(
                "Viewer {} hit target {} at ({:.2}, {:.2}, {:.2}), rewound to {:.3}s",
                claim.viewer_id, claim.target_id, point.x, point.y, point.z, query_time
            );
        }
        verdict
    }

    fn judge_ray(
        &self,
        claim: &HitClaim,
        tracked: &Tracked,
        query_time: f64,
        origin: Vec3,
        target: Vec3,
    ) -> ClaimVerdict {
        let Some((ray, length)) = Ray::between(origin, target) else {
            return Self::reject(
                claim,
                Some(query_time),
                RejectReason::Missed { distance: None },
            );
        };

        // The coarse history only rules shots out if, even right after a bucket
        // eviction, it still reaches back as far as the pose history.
        if self.settings.bounds_span() >= self.settings.history_window {
            let margin = tracked.compensator.max_bounding_radius()
                * (1.0 + tracked.compensator.tolerance_percent());
            if !tracked.collider.may_intersect(&ray, length * 2.0, margin) {
                return Self::reject(claim, Some(query_time), RejectReason::OutsideBroadPhase);
            }
        }

        let check = match tracked.compensator.raycast_check(
            query_time,
            origin,
            target,
            LayerMask::ALL,
            self.world.obstacles.as_slice(),
        ) {
            Ok(check) => check,
            Err(e) => return Self::reject(claim, Some(query_time), RejectReason::History(e)),
        };

        match check.info {
            Some(RaycastHit {
                collider: HitCollider::Proxy,
                point,
                ..
            }) => ClaimVerdict::Confirmed { query_time, point },
            Some(RaycastHit {
                collider: HitCollider::Scene(obstacle_id),
                ..
            }) => Self::reject(
                claim,
                Some(query_time),
                RejectReason::Occluded { obstacle_id },
            ),
            None => Self::reject(
                claim,
                Some(query_time),
                RejectReason::Missed { distance: None },
            ),
        }
    }

    fn reject(claim: &HitClaim, query_time: Option<f64>, reason: RejectReason) -> ClaimVerdict {
        match &reason {
            RejectReason::History(e) => warn!(
                "Rejected claim from viewer {} on target {}: {}",
                claim.viewer_id, claim.target_id, e
            ),
            other => debug!(
                "Rejected claim from viewer {} on target {}: {:?}",
                claim.viewer_id, claim.target_id, other
            ),
        }
        ClaimVerdict::Rejected { query_time, reason }
    }

    /// Applies one request. Returns false when the host should stop.
    pub fn handle_message(&mut self, message: HostMessage) -> bool {
        match message {
            HostMessage::Join { reply } => {
                let viewer_id = self.join_viewer();
                if viewer_id.is_none() {
                    warn!("Viewer rejected: host full");
                }
                let _ = reply.send(viewer_id);
            }
            HostMessage::Leave { viewer_id } => {
                self.leave_viewer(viewer_id);
            }
            HostMessage::Latency { viewer_id, rtt } => {
                if !self.record_latency(viewer_id, rtt) {
                    warn!("Latency report for unknown viewer {}", viewer_id);
                }
            }
            HostMessage::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            HostMessage::Claim { claim, reply } => {
                let verdict = self.handle_claim(&claim);
                let _ = reply.send(verdict);
            }
            HostMessage::Shutdown => {
                info!("Host shutting down");
                return false;
            }
        }
        true
    }

    /// Main loop: one fixed step per tick, requests handled between ticks.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Host started");

        loop {
            tokio::select! {
                message = self.host_rx.recv() => {
                    match message {
                        Some(message) => {
                            if !self.handle_message(message) {
                                break;
                            }
                        }
                        None => break,
                    }
                },

                _ = tick_interval.tick() => {
                    self.step();

                    if self.world.tick % 60 == 0 {
                        for viewer_id in self.viewers.check_timeouts(VIEWER_TIMEOUT) {
                            info!("Viewer {} timed out", viewer_id);
                        }
                        debug!(
                            "Tick {}: t={:.2}s, {} targets, {} viewers",
                            self.world.tick,
                            self.world.time,
                            self.tracked.len(),
                            self.viewers.len()
                        );
                    }
                },
            }
        }

        Ok(())
    }
}
