use glam::Vec3;
use thiserror::Error;

/// Failure outcomes of the history and validation operations.
///
/// Every variant is recoverable. Callers validating a remote claim must treat
/// any of them as a rejection of that claim.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LagCompError {
    /// A capture arrived with a timestamp older than the newest stored entry.
    #[error("capture at {timestamp:.4}s is older than newest entry at {newest:.4}s")]
    OutOfOrderCapture { timestamp: f64, newest: f64 },
    /// The requested time has already been evicted from the history window.
    #[error("requested time {requested:.4}s is older than oldest entry at {oldest:.4}s")]
    TooOld { requested: f64, oldest: f64 },
    /// The requested time is ahead of everything recorded so far.
    #[error("requested time {requested:.4}s is newer than newest entry at {newest:.4}s")]
    TooNew { requested: f64, newest: f64 },
    /// Interpolation needs at least two captures.
    #[error("need at least two captures to sample, have {available}")]
    InsufficientHistory { available: usize },
    /// A collision proxy would have a zero, negative or non-finite size.
    #[error("cannot build a collision proxy from size {size}")]
    DegenerateShape { size: Vec3 },
    /// NaN or infinite timestamps are never stored or sampled.
    #[error("timestamp is not a finite number")]
    NonFiniteTime,
}

/// Rejected [`LagCompensationSettings`](crate::LagCompensationSettings) values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    #[error("{name} must be a positive finite number of seconds, got {value}")]
    NonPositiveDuration { name: &'static str, value: f64 },
    #[error("{name} must be at least 1")]
    ZeroLimit { name: &'static str },
    #[error("{name} must be a finite, non-negative number, got {value}")]
    InvalidTolerance { name: &'static str, value: f32 },
    #[error("proxy layer {0} is out of range (0..32)")]
    LayerOutOfRange(u32),
    /// The count cap would drop captures that are still inside the window.
    #[error("capture_limit {capture_limit} cannot hold the history window, need at least {required}")]
    CaptureLimitTooSmall { capture_limit: usize, required: usize },
}
