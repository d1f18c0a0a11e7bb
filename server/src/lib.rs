//! # Lag Compensation Host Library
//!
//! This library provides the authoritative host that uses the `lagcomp` crate.
//! It owns the canonical world, records a rolling history of every moving
//! target, and decides whether hit claims made by remote viewers are
//! plausible given what those viewers could see at the time.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The host advances every target at a fixed tick rate. Target positions are
//! only ever changed here; viewers see delayed copies.
//!
//! ### History Recording
//! Each target carries two recorders that are ticked every step:
//! - A [`compensator::LagCompensator`] storing interpolatable pose captures
//! - A [`history_collider::HistoryCollider`] storing coarse bucketed bounds
//!
//! ### Claim Validation
//! A viewer's claim is rewound to the moment that viewer was looking at:
//! - The view time is estimated from smoothed round-trip time and the
//!   viewer's interpolation delay
//! - Ray claims are first tested against the target's whole recent path
//! - The reconstructed proxy is then tested together with static obstacles
//! - Any missing or unusable history rejects the claim
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Targets, static obstacles and the simulation clock.
//!
//! ### Compensator Module (`compensator`)
//! Per-target capture scheduling, pose history and precise checks.
//!
//! ### History Collider Module (`history_collider`)
//! Per-target broad-phase volume built from bucketed bounds.
//!
//! ### Viewer Manager Module (`viewer_manager`)
//! Viewer lifecycle, RTT smoothing and the view-time policy.
//!
//! ### Host Module (`host`)
//! The single-task event loop tying the above together.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use glam::Vec3;
//! use lagcomp::{LagCompensationSettings, ShapeKind};
//! use server::host::Host;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 60Hz host, up to 16 viewers rendering 100ms behind
//!     let mut host = Host::new(
//!         LagCompensationSettings::default(),
//!         Duration::from_millis(16),
//!         16,
//!         0.1,
//!     )?;
//!
//!     host.spawn_target(ShapeKind::Box, Vec3::ZERO, Vec3::ONE, Vec3::X * 5.0, 0.0);
//!
//!     // Viewers talk to the host through `host.sender()`
//!     host.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! ### Single-Threaded Event Loop
//! All state is owned by the task running [`host::Host::run`]. Requests arrive
//! over an unbounded channel and are answered through oneshot replies, so no
//! history is ever read while it is being written.
//!
//! ### Fail Closed
//! A claim is only confirmed when every step succeeds. Unknown viewers,
//! unknown targets, history gaps and degenerate shapes all reject.

pub mod compensator;
pub mod game;
pub mod history_collider;
pub mod host;
pub mod viewer_manager;
