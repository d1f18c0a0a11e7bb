//! Coarse bounding-volume history.
//!
//! [`BucketedBoundsHistory`] keeps a short, fixed-size record of where an
//! object has been by folding consecutive [`BoundsSample`]s into buckets. The
//! union of all retained buckets is a cheap broad-phase volume: any past pose
//! still covered by the history lies inside it.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Slack used by containment tests to absorb center/extent rounding.
pub const BOUNDS_EPSILON: f32 = 1e-4;

/// An axis-aligned bounding volume captured at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsSample {
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl BoundsSample {
    /// Sentinel returned by queries when nothing has been recorded yet.
    pub const EMPTY: BoundsSample = BoundsSample {
        center: Vec3::ZERO,
        half_extents: Vec3::ZERO,
    };

    pub fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents: half_extents.abs(),
        }
    }

    /// Builds bounds from a center and full size, the way engines usually report them.
    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        Self::new(center, size * 0.5)
    }

    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        let lo = min.min(max);
        let hi = min.max(max);
        Self {
            center: (lo + hi) * 0.5,
            half_extents: (hi - lo) * 0.5,
        }
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.half_extents
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.half_extents
    }

    /// Smallest bounds enclosing both `self` and `other`.
    pub fn union(&self, other: &BoundsSample) -> BoundsSample {
        BoundsSample::from_min_max(self.min().min(other.min()), self.max().max(other.max()))
    }

    /// Grows the volume by `margin` on every side.
    pub fn expanded(&self, margin: f32) -> BoundsSample {
        BoundsSample::new(self.center, self.half_extents + Vec3::splat(margin.max(0.0)))
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        let min = self.min() - Vec3::splat(BOUNDS_EPSILON);
        let max = self.max() + Vec3::splat(BOUNDS_EPSILON);
        point.cmpge(min).all() && point.cmple(max).all()
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains(&self, other: &BoundsSample) -> bool {
        self.contains_point(other.min()) && self.contains_point(other.max())
    }

    /// Closest point on or inside the volume to `point`.
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        point.clamp(self.min(), self.max())
    }

    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.closest_point(point).distance(point)
    }
}

/// Union of a run of consecutive samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub bounds: BoundsSample,
    pub member_count: usize,
}

/// Bounded queue of buckets plus the running union of everything retained.
///
/// Only the newest bucket may be partially filled. When a new bucket would
/// exceed `bounds_limit`, the oldest bucket is dropped and its samples stop
/// contributing to [`total`](Self::total).
#[derive(Debug, Clone)]
pub struct BucketedBoundsHistory {
    buckets: VecDeque<Bucket>,
    bounds_limit: usize,
    bounds_per_bucket: usize,
    total: Option<BoundsSample>,
}

impl BucketedBoundsHistory {
    /// Both limits are clamped to at least one.
    pub fn new(bounds_limit: usize, bounds_per_bucket: usize) -> Self {
        let bounds_limit = bounds_limit.max(1);
        Self {
            buckets: VecDeque::with_capacity(bounds_limit),
            bounds_limit,
            bounds_per_bucket: bounds_per_bucket.max(1),
            total: None,
        }
    }

    pub fn insert(&mut self, sample: BoundsSample) {
        match self.buckets.back_mut() {
            Some(tail) if tail.member_count < self.bounds_per_bucket => {
                tail.bounds = tail.bounds.union(&sample);
                tail.member_count += 1;
                self.total = Some(match self.total {
                    Some(total) => total.union(&sample),
                    None => sample,
                });
            }
            _ => {
                if self.buckets.len() >= self.bounds_limit {
                    self.buckets.pop_front();
                }
                self.buckets.push_back(Bucket {
                    bounds: sample,
                    member_count: 1,
                });
                self.recompute_total();
            }
        }
    }

    fn recompute_total(&mut self) {
        self.total = self
            .buckets
            .iter()
            .map(|bucket| bucket.bounds)
            .reduce(|acc, bounds| acc.union(&bounds));
    }

    /// Union of all retained buckets, or [`BoundsSample::EMPTY`] before the first insert.
    pub fn total(&self) -> BoundsSample {
        self.total.unwrap_or(BoundsSample::EMPTY)
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of samples still represented by the retained buckets.
    pub fn sample_count(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.member_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn buckets(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.iter()
    }

    pub fn bounds_limit(&self) -> usize {
        self.bounds_limit
    }

    pub fn bounds_per_bucket(&self) -> usize {
        self.bounds_per_bucket
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.total = None;
    }
}
