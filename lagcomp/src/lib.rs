//! # Lag Compensation History
//!
//! Server-side history of tracked objects' geometry, used to validate what a
//! remote viewer saw at the moment it acted rather than where objects are now.
//!
//! ## Components
//!
//! ### Coarse bounds (`bounds`)
//! [`BucketedBoundsHistory`] folds per-tick [`BoundsSample`]s into a bounded
//! queue of buckets and keeps the union of everything retained. The union is a
//! broad-phase volume covering the object's recent path.
//!
//! ### Pose captures (`capture`, `buffer`)
//! [`PoseCapture`] is a full reconstructible pose. [`TemporalCaptureBuffer`]
//! stores captures in time order inside a sliding window and samples them at
//! any retained time by binary search and interpolation. Positions and sizes
//! are lerped, rotations slerped along the shortest arc.
//!
//! ### Validation (`validator`, `geometry`)
//! [`HitValidator`] samples a buffer at the viewer's estimated time, rebuilds
//! a transient proxy from the pose and answers point-distance and ray queries.
//! The host can plug its own scene in through [`SceneRaycaster`].
//!
//! ## Threading
//!
//! Everything here is plain owned data with no interior mutability. Each
//! tracked object owns its own history and is written and queried from the
//! simulation thread.
//!
//! ## Failure Handling
//!
//! Operations return [`LagCompError`] instead of logging. A validation that
//! fails for any reason means the claim must be rejected.
//!
//! ## Usage Example
//!
//! ```rust
//! use glam::{Quat, Vec3};
//! use lagcomp::{HitValidator, LayerMask, PoseCapture, ShapeKind, TemporalCaptureBuffer};
//!
//! let mut history = TemporalCaptureBuffer::new(1.0, 32);
//! for tick in 0..3 {
//!     let x = tick as f32;
//!     history
//!         .insert(PoseCapture::new(
//!             tick as f64 * 0.1,
//!             Vec3::new(x, 0.0, 0.0),
//!             Quat::IDENTITY,
//!             Vec3::ONE,
//!             ShapeKind::Box,
//!         ))
//!         .unwrap();
//! }
//!
//! let validator = HitValidator::new(&history);
//! let check = validator
//!     .raycast_check(
//!         0.15,
//!         Vec3::new(1.5, 0.0, -5.0),
//!         Vec3::new(1.5, 0.0, 0.0),
//!         0.0,
//!         LayerMask::ALL,
//!     )
//!     .unwrap();
//! assert!(check.hit_proxy());
//! ```

pub mod bounds;
pub mod buffer;
pub mod capture;
pub mod error;
pub mod geometry;
pub mod settings;
pub mod validator;

pub use bounds::{Bucket, BoundsSample, BucketedBoundsHistory};
pub use buffer::{SampleResult, TemporalCaptureBuffer};
pub use capture::{CaptureSchedule, CaptureSource, PoseCapture, ShapeKind};
pub use error::{LagCompError, SettingsError};
pub use geometry::{
    Collider, ColliderShape, HitCollider, LayerMask, NoScene, Ray, RaycastHit, SceneCollider,
    SceneRaycaster,
};
pub use settings::LagCompensationSettings;
pub use validator::{BoundsCheck, HitValidator, RaycastCheck};
