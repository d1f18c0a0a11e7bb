use crate::error::SettingsError;
use serde::{Deserialize, Serialize};

/// Tunables for one tracked object's history and for claim validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LagCompensationSettings {
    /// Seconds between pose captures.
    pub capture_interval: f64,
    /// Seconds of pose history kept for sampling.
    pub history_window: f64,
    /// Hard cap on stored pose captures.
    pub capture_limit: usize,
    /// Buckets kept by the coarse bounds history.
    pub bounds_limit: usize,
    /// Bounds samples folded into each bucket.
    pub bounds_per_bucket: usize,
    /// Distance slack for point checks.
    pub tolerance: f32,
    /// Fractional proxy inflation for ray checks (0.5 = 50% larger).
    pub tolerance_percent: f32,
    /// Collision layer the reconstructed proxy lives on.
    pub proxy_layer: u32,
}

impl Default for LagCompensationSettings {
    fn default() -> Self {
        Self {
            capture_interval: 0.1,
            history_window: 1.0,
            capture_limit: 32,
            bounds_limit: 8,
            bounds_per_bucket: 2,
            tolerance: 0.1,
            tolerance_percent: 0.5,
            proxy_layer: 0,
        }
    }
}

impl LagCompensationSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        for (name, value) in [
            ("capture_interval", self.capture_interval),
            ("history_window", self.history_window),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SettingsError::NonPositiveDuration { name, value });
            }
        }

        for (name, value) in [
            ("capture_limit", self.capture_limit),
            ("bounds_limit", self.bounds_limit),
            ("bounds_per_bucket", self.bounds_per_bucket),
        ] {
            if value == 0 {
                return Err(SettingsError::ZeroLimit { name });
            }
        }

        for (name, value) in [
            ("tolerance", self.tolerance),
            ("tolerance_percent", self.tolerance_percent),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SettingsError::InvalidTolerance { name, value });
            }
        }

        if self.proxy_layer >= 32 {
            return Err(SettingsError::LayerOutOfRange(self.proxy_layer));
        }

        let required = self.captures_per_window();
        if self.capture_limit < required {
            return Err(SettingsError::CaptureLimitTooSmall {
                capture_limit: self.capture_limit,
                required,
            });
        }
        Ok(())
    }

    /// Most captures a full history window can contain, both ends included.
    pub fn captures_per_window(&self) -> usize {
        let intervals = (self.history_window / self.capture_interval - 1e-9).ceil();
        intervals.max(0.0) as usize + 1
    }

    /// Seconds of coarse history the bounds buckets are guaranteed to cover.
    ///
    /// Right after the oldest bucket is evicted the newest bucket holds a
    /// single sample, so only `bounds_limit - 1` full buckets are certain.
    pub fn bounds_span(&self) -> f64 {
        (self.bounds_limit.saturating_sub(1) * self.bounds_per_bucket) as f64
            * self.capture_interval
    }
}
