//! Synthetic travel estimates used when the maps provider is unavailable.
//!
//! These values keep the pipeline working without geography data. They are
//! not real-world estimates and every proposal built from them is flagged
//! as degraded.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;

/// Band for random matrix cells, in minutes
pub const FALLBACK_BAND_MINUTES: RangeInclusive<u32> = 15..=30;

/// Fixed distance for a fallback segment
pub const FALLBACK_SEGMENT_DISTANCE_KM: f64 = 5.0;

/// Fixed duration for a fallback segment
pub const FALLBACK_SEGMENT_DURATION_MINUTES: i32 = 15;

/// Fallback travel leg
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackLeg {
    pub distance_km: f64,
    pub duration_minutes: i32,
}

impl Default for FallbackLeg {
    fn default() -> Self {
        Self {
            distance_km: FALLBACK_SEGMENT_DISTANCE_KM,
            duration_minutes: FALLBACK_SEGMENT_DURATION_MINUTES,
        }
    }
}

/// Source of fallback values.
///
/// `matrix_cost` is asked once per unordered pair (`from < to`); the
/// estimator mirrors the value to keep the matrix symmetric.
pub trait FallbackSource: Send + Sync {
    fn matrix_cost(&self, from: usize, to: usize) -> f64;

    fn segment(&self, from: &str, to: &str) -> FallbackLeg;

    fn name(&self) -> &str;
}

/// Random matrix cells within `FALLBACK_BAND_MINUTES`, fixed segments
pub struct RandomFallback {
    rng: Mutex<StdRng>,
}

impl RandomFallback {
    pub fn new() -> Self {
        Self { rng: Mutex::new(StdRng::from_entropy()) }
    }

    /// Reproducible sequence for tests and debugging
    pub fn seeded(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }
}

impl Default for RandomFallback {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackSource for RandomFallback {
    fn matrix_cost(&self, _from: usize, _to: usize) -> f64 {
        self.rng.lock().gen_range(FALLBACK_BAND_MINUTES) as f64
    }

    fn segment(&self, _from: &str, _to: &str) -> FallbackLeg {
        FallbackLeg::default()
    }

    fn name(&self) -> &str {
        "RandomFallback"
    }
}

/// Caller-supplied matrix; cells outside it cost `default_cost`
pub struct FixedFallback {
    matrix: Vec<Vec<f64>>,
    default_cost: f64,
    leg: FallbackLeg,
}

impl FixedFallback {
    pub fn from_matrix(matrix: Vec<Vec<f64>>) -> Self {
        Self {
            matrix,
            default_cost: *FALLBACK_BAND_MINUTES.start() as f64,
            leg: FallbackLeg::default(),
        }
    }

    /// Every pair costs the same
    pub fn uniform(cost: f64) -> Self {
        Self {
            matrix: vec![],
            default_cost: cost,
            leg: FallbackLeg::default(),
        }
    }

    pub fn with_leg(mut self, leg: FallbackLeg) -> Self {
        self.leg = leg;
        self
    }
}

impl FallbackSource for FixedFallback {
    fn matrix_cost(&self, from: usize, to: usize) -> f64 {
        self.matrix
            .get(from)
            .and_then(|row| row.get(to))
            .copied()
            .unwrap_or(self.default_cost)
    }

    fn segment(&self, _from: &str, _to: &str) -> FallbackLeg {
        self.leg
    }

    fn name(&self) -> &str {
        "FixedFallback"
    }
}
