//! Integration tests for lag compensation components
//!
//! These tests validate cross-component interactions: history recording,
//! rewinding and the host's claim pipeline.

use assert_approx_eq::assert_approx_eq;
use glam::{Quat, Vec3};
use lagcomp::{
    BoundsSample, BucketedBoundsHistory, HitValidator, LagCompError, LagCompensationSettings,
    LayerMask, NoScene, PoseCapture, SettingsError, ShapeKind, TemporalCaptureBuffer,
};
use server::host::{ClaimKind, ClaimVerdict, HitClaim, Host, HostMessage, RejectReason};
use std::time::Duration;
use tokio::sync::oneshot;

fn unit_box(timestamp: f64, x: f32) -> PoseCapture {
    PoseCapture::new(
        timestamp,
        Vec3::new(x, 0.0, 0.0),
        Quat::IDENTITY,
        Vec3::ONE,
        ShapeKind::Box,
    )
}

/// HISTORY TESTS
mod history_tests {
    use super::*;

    /// Interpolating halfway between two captures
    #[test]
    fn sample_between_captures() {
        let mut buffer = TemporalCaptureBuffer::new(1.0, 32);
        for (i, t) in [0.0, 0.1, 0.2].into_iter().enumerate() {
            buffer.insert(unit_box(t, i as f32)).unwrap();
        }

        let sample = buffer.sample(0.15).unwrap();
        assert_approx_eq!(sample.t, 0.5, 1e-9);
        assert_approx_eq!(sample.interpolate().position.x, 1.5, 1e-5);
    }

    /// Old buckets stop contributing to the total once evicted
    #[test]
    fn bucketed_history_forgets_oldest_bucket() {
        let mut history = BucketedBoundsHistory::new(2, 2);
        for i in 0..5 {
            history.insert(BoundsSample::from_center_size(
                Vec3::new(i as f32 * 3.0, 0.0, 0.0),
                Vec3::ONE,
            ));
        }

        assert_eq!(history.bucket_count(), 2);
        assert!(history.buckets().all(|bucket| bucket.member_count <= 2));

        let total = history.total();
        assert_approx_eq!(total.min().x, 5.5, 1e-5);
        assert_approx_eq!(total.max().x, 12.5, 1e-5);
        assert!(!total.contains_point(Vec3::ZERO));
    }

    /// Entries strictly older than newest - window are dropped
    #[test]
    fn window_boundary() {
        let mut buffer = TemporalCaptureBuffer::new(0.5, 32);
        for t in [0.0, 0.2, 0.4, 0.6] {
            buffer.insert(unit_box(t, 0.0)).unwrap();
        }

        let kept: Vec<f64> = buffer.iter().map(|capture| capture.timestamp).collect();
        assert_eq!(kept, vec![0.2, 0.4, 0.6]);
        assert!(matches!(
            buffer.sample(0.1),
            Err(LagCompError::TooOld { .. })
        ));
    }
}

/// VALIDATION TESTS
mod validation_tests {
    use super::*;

    /// A probe inside the rewound bounds matches exactly
    #[test]
    fn bounds_check_inside_matches() {
        let mut buffer = TemporalCaptureBuffer::new(1.0, 32);
        buffer.insert(unit_box(0.0, 0.0)).unwrap();
        buffer.insert(unit_box(0.2, 2.0)).unwrap();

        let check = HitValidator::new(&buffer)
            .bounds_check(0.1, Vec3::new(1.2, 0.3, -0.2), 0.0)
            .unwrap();
        assert!(check.matched);
        assert_eq!(check.distance, 0.0);
    }

    /// One capture is never enough to confirm a hit
    #[test]
    fn raycast_with_single_capture_is_an_error() {
        let mut buffer = TemporalCaptureBuffer::new(1.0, 32);
        buffer.insert(unit_box(0.0, 0.0)).unwrap();

        let result = HitValidator::new(&buffer).raycast_check(
            0.0,
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::ZERO,
            0.5,
            LayerMask::ALL,
        );
        assert_eq!(
            result.unwrap_err(),
            LagCompError::InsufficientHistory { available: 1 }
        );
    }

    /// Rotation is taken into account when rewinding
    #[test]
    fn rewound_rotation_changes_outcome() {
        let mut buffer = TemporalCaptureBuffer::new(1.0, 32);
        let long_bar = |t: f64, rotation: Quat| {
            PoseCapture::new(t, Vec3::ZERO, rotation, Vec3::new(6.0, 1.0, 1.0), ShapeKind::Box)
        };
        buffer.insert(long_bar(0.0, Quat::IDENTITY)).unwrap();
        buffer
            .insert(long_bar(1.0, Quat::from_rotation_y(std::f32::consts::FRAC_PI_2)))
            .unwrap();

        let validator = HitValidator::new(&buffer);
        let origin = Vec3::new(2.5, 0.0, -10.0);
        let aim = Vec3::new(2.5, 0.0, 0.0);

        assert!(validator
            .raycast_check(0.0, origin, aim, 0.0, LayerMask::ALL)
            .unwrap()
            .hit_proxy());
        assert!(!validator
            .raycast_check(1.0, origin, aim, 0.0, LayerMask::ALL)
            .unwrap()
            .hit);
    }
}

/// HOST TESTS
mod host_tests {
    use super::*;

    /// Host at 20Hz with a target moving +x at 10 units/s.
    fn moving_target_host(bounds_limit: usize) -> (Host, u32, u32) {
        let settings = LagCompensationSettings {
            capture_interval: 0.05,
            history_window: 1.0,
            bounds_limit,
            bounds_per_bucket: 2,
            tolerance: 0.0,
            tolerance_percent: 0.0,
            ..Default::default()
        };
        let mut host = Host::new(settings, Duration::from_millis(50), 4, 0.0).unwrap();
        let target_id = host.spawn_target(
            ShapeKind::Box,
            Vec3::ZERO,
            Vec3::ONE,
            Vec3::new(10.0, 0.0, 0.0),
            0.0,
        );
        let viewer_id = host.join_viewer().unwrap();
        // View time lags the host by 100ms.
        host.record_latency(viewer_id, 0.2);

        for _ in 0..20 {
            host.step();
        }
        (host, target_id, viewer_id)
    }

    fn ray_at(viewer_id: u32, target_id: u32, x: f32) -> HitClaim {
        HitClaim {
            viewer_id,
            target_id,
            kind: ClaimKind::Ray {
                origin: Vec3::new(x, 0.0, -20.0),
                target: Vec3::new(x, 0.0, 0.0),
            },
        }
    }

    /// A shot at where the viewer saw the target is accepted, even though
    /// the target has since moved out of the way
    #[test]
    fn claim_on_past_position_is_confirmed() {
        let (mut host, target_id, viewer_id) = moving_target_host(8);
        let now = host.time();
        assert_approx_eq!(now, 1.0, 1e-9);

        match host.handle_claim(&ray_at(viewer_id, target_id, 9.0)) {
            ClaimVerdict::Confirmed { query_time, point } => {
                assert_approx_eq!(query_time, now - 0.1, 1e-9);
                assert_approx_eq!(point.x, 9.0, 1e-3);
            }
            other => panic!("expected confirmation, got {:?}", other),
        }
    }

    /// A shot at the present position is not what the viewer saw
    #[test]
    fn claim_on_current_position_is_rejected() {
        let (mut host, target_id, viewer_id) = moving_target_host(8);

        let verdict = host.handle_claim(&ray_at(viewer_id, target_id, 10.0));
        assert!(matches!(
            verdict,
            ClaimVerdict::Rejected {
                reason: RejectReason::Missed { .. },
                ..
            }
        ));
    }

    /// Point claims use the rewound bounds
    #[test]
    fn point_claims() {
        let (mut host, target_id, viewer_id) = moving_target_host(8);

        let inside = HitClaim {
            viewer_id,
            target_id,
            kind: ClaimKind::Point {
                point: Vec3::new(9.3, 0.2, 0.0),
            },
        };
        assert!(host.handle_claim(&inside).is_confirmed());

        let outside = HitClaim {
            kind: ClaimKind::Point {
                point: Vec3::new(10.0, 0.0, 0.0),
            },
            ..inside
        };
        match host.handle_claim(&outside) {
            ClaimVerdict::Rejected {
                reason: RejectReason::Missed { distance: Some(d) },
                ..
            } => assert_approx_eq!(d, 0.5, 1e-3),
            other => panic!("expected a miss, got {:?}", other),
        }
    }

    /// Obstacles between the shooter and the rewound target block the claim
    #[test]
    fn occluded_claim_is_rejected() {
        let (mut host, target_id, viewer_id) = moving_target_host(8);
        let wall = host.add_obstacle(Vec3::new(9.0, 0.0, -10.0), Vec3::new(2.0, 2.0, 0.5));

        let verdict = host.handle_claim(&ray_at(viewer_id, target_id, 9.0));
        assert!(matches!(
            verdict,
            ClaimVerdict::Rejected {
                reason: RejectReason::Occluded { obstacle_id },
                ..
            } if obstacle_id == wall
        ));
    }

    /// With coarse history spanning the whole window, far-off shots are
    /// rejected before any interpolation
    #[test]
    fn broad_phase_rejects_distant_shots() {
        let (mut host, target_id, viewer_id) = moving_target_host(11);
        assert!(host.settings().bounds_span() >= host.settings().history_window);

        let verdict = host.handle_claim(&ray_at(viewer_id, target_id, 30.0));
        assert!(matches!(
            verdict,
            ClaimVerdict::Rejected {
                reason: RejectReason::OutsideBroadPhase,
                ..
            }
        ));

        assert!(host
            .handle_claim(&ray_at(viewer_id, target_id, 9.0))
            .is_confirmed());
    }

    /// Host at 10Hz capturing every tick, with the given bucket layout.
    fn bucketed_host(bounds_limit: usize, bounds_per_bucket: usize) -> (Host, u32) {
        let settings = LagCompensationSettings {
            capture_interval: 0.1,
            history_window: 1.0,
            bounds_limit,
            bounds_per_bucket,
            tolerance: 0.0,
            tolerance_percent: 0.0,
            ..Default::default()
        };
        let mut host = Host::new(settings, Duration::from_millis(100), 4, 0.0).unwrap();
        let target_id = host.spawn_target(
            ShapeKind::Box,
            Vec3::ZERO,
            Vec3::ONE,
            Vec3::new(10.0, 0.0, 0.0),
            0.0,
        );
        (host, target_id)
    }

    /// Two buckets of five only guarantee half a second of coarse history,
    /// so an old but valid shot must reach the precise check
    #[test]
    fn broad_phase_stays_off_when_buckets_fall_short() {
        let (mut host, target_id) = bucketed_host(2, 5);
        assert!(host.settings().bounds_span() < host.settings().history_window);
        for _ in 0..10 {
            host.step();
        }

        let viewer_id = host.join_viewer().unwrap();
        host.record_latency(viewer_id, 1.6);

        match host.handle_claim(&ray_at(viewer_id, target_id, 2.0)) {
            ClaimVerdict::Confirmed { query_time, point } => {
                assert_approx_eq!(query_time, 0.2, 1e-9);
                assert_approx_eq!(point.x, 2.0, 1e-3);
            }
            other => panic!("expected confirmation, got {:?}", other),
        }
    }

    /// Whatever the bucket layout and however recently a bucket rolled
    /// over, a shot the precise check accepts is never turned away early
    #[test]
    fn broad_phase_never_rejects_precise_hits() {
        for (bounds_limit, bounds_per_bucket) in [(2, 5), (2, 10), (3, 4), (3, 5), (6, 2)] {
            let (mut host, target_id) = bucketed_host(bounds_limit, bounds_per_bucket);
            let mut confirmed = 0;

            for _ in 0..40 {
                host.step();
                let now = host.time();

                for k in 0..=20 {
                    let offset = k as f64 * 0.05;
                    let query_time = now - offset;
                    let compensator = host.compensator(&target_id).unwrap();
                    let Some(pose) = compensator.sample(query_time) else {
                        continue;
                    };
                    let aim = pose.position;
                    let origin = aim + Vec3::new(0.0, 0.0, -20.0);
                    let precise = compensator
                        .raycast_check(query_time, origin, aim, LayerMask::ALL, &NoScene)
                        .unwrap();

                    let viewer_id = host.join_viewer().unwrap();
                    host.record_latency(viewer_id, offset * 2.0);
                    let verdict = host.handle_claim(&HitClaim {
                        viewer_id,
                        target_id,
                        kind: ClaimKind::Ray {
                            origin,
                            target: aim,
                        },
                    });
                    host.leave_viewer(viewer_id);

                    if precise.hit_proxy() {
                        assert!(
                            verdict.is_confirmed(),
                            "{}x{} buckets, t={:.2}s, offset {:.2}s: {:?}",
                            bounds_limit,
                            bounds_per_bucket,
                            now,
                            offset,
                            verdict
                        );
                        confirmed += 1;
                    }
                }
            }
            assert!(confirmed > 0);
        }
    }

    /// A count cap shorter than the window is refused up front
    #[test]
    fn host_refuses_capture_limit_shorter_than_window() {
        let settings = LagCompensationSettings {
            capture_interval: 0.01,
            history_window: 1.0,
            capture_limit: 32,
            ..Default::default()
        };
        let error = Host::new(settings.clone(), Duration::from_millis(10), 4, 0.0)
            .err()
            .unwrap();
        assert_eq!(
            error.downcast_ref::<SettingsError>(),
            Some(&SettingsError::CaptureLimitTooSmall {
                capture_limit: 32,
                required: 101
            })
        );

        let settings = LagCompensationSettings {
            capture_limit: 101,
            ..settings
        };
        assert!(Host::new(settings, Duration::from_millis(10), 4, 0.0).is_ok());
    }

    /// Claims from further back than the history reaches fail closed
    #[test]
    fn claim_older_than_history_is_rejected() {
        let (mut host, target_id, viewer_id) = moving_target_host(8);
        for _ in 0..40 {
            host.record_latency(viewer_id, 10.0);
        }

        let verdict = host.handle_claim(&ray_at(viewer_id, target_id, 9.0));
        assert!(matches!(
            verdict,
            ClaimVerdict::Rejected {
                reason: RejectReason::History(LagCompError::TooOld { .. }),
                ..
            }
        ));
    }

    /// Despawned targets can no longer be claimed
    #[test]
    fn despawned_target_is_unknown() {
        let (mut host, target_id, viewer_id) = moving_target_host(8);
        assert!(host.despawn_target(target_id));

        let verdict = host.handle_claim(&ray_at(viewer_id, target_id, 9.0));
        assert!(matches!(
            verdict,
            ClaimVerdict::Rejected {
                reason: RejectReason::UnknownTarget,
                ..
            }
        ));
    }
}

/// HOST LOOP TESTS
mod host_loop_tests {
    use super::*;
    use tokio::time::sleep;

    /// Drives a running host purely through its message channel
    #[tokio::test]
    async fn host_answers_over_channel() {
        let settings = LagCompensationSettings {
            capture_interval: 0.01,
            history_window: 1.0,
            capture_limit: 128,
            tolerance: 0.1,
            ..Default::default()
        };
        let mut host = Host::new(settings, Duration::from_millis(10), 2, 0.1).unwrap();
        host.spawn_target(
            ShapeKind::Box,
            Vec3::ZERO,
            Vec3::splat(2.0),
            Vec3::new(1.0, 0.0, 0.0),
            0.0,
        );
        let sender = host.sender();
        let handle = tokio::spawn(async move { host.run().await.is_ok() });

        let (reply, joined) = oneshot::channel();
        sender.send(HostMessage::Join { reply }).unwrap();
        let viewer_id = joined.await.unwrap().unwrap();

        sleep(Duration::from_millis(300)).await;

        let (reply, snapshot) = oneshot::channel();
        sender.send(HostMessage::Snapshot { reply }).unwrap();
        let positions = snapshot.await.unwrap();
        assert_eq!(positions.len(), 1);
        let (target_id, seen_at) = positions[0];

        let (reply, verdict) = oneshot::channel();
        sender
            .send(HostMessage::Claim {
                claim: HitClaim {
                    viewer_id,
                    target_id,
                    kind: ClaimKind::Point { point: seen_at },
                },
                reply,
            })
            .unwrap();
        assert!(verdict.await.unwrap().is_confirmed());

        sender.send(HostMessage::Shutdown).unwrap();
        assert!(handle.await.unwrap());
    }
}
