//! Distance estimation: N locations → N×N travel-cost matrix.
//!
//! One provider matrix request per call. Any provider failure (missing key,
//! HTTP error, timeout, bad payload) is logged and replaced by the fallback
//! matrix; it never propagates to the caller.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::services::routing::{FallbackSource, MapsProvider, ProviderCell, ProviderMatrix, RouteOptions};
use crate::types::OptimizeFor;

/// Travel-cost matrix consumed by the order optimizer
#[derive(Debug, Clone, PartialEq)]
pub struct TravelMatrix {
    /// Cost [i][j] from location i to location j
    pub costs: Vec<Vec<f64>>,
    pub size: usize,
    /// True when any cell holds a fallback value
    pub degraded: bool,
}

impl TravelMatrix {
    pub fn empty() -> Self {
        Self { costs: vec![], size: 0, degraded: false }
    }

    /// Build from explicit costs (diagonal is forced to zero)
    pub fn from_costs(mut costs: Vec<Vec<f64>>) -> Self {
        let size = costs.len();
        for (i, row) in costs.iter_mut().enumerate() {
            if let Some(cell) = row.get_mut(i) {
                *cell = 0.0;
            }
        }
        Self { costs, size, degraded: false }
    }

    pub fn cost(&self, from: usize, to: usize) -> f64 {
        self.costs[from][to]
    }

    /// Symmetric synthetic matrix with zero diagonal
    pub fn fallback(size: usize, source: &dyn FallbackSource) -> Self {
        let mut costs = vec![vec![0.0; size]; size];
        for i in 0..size {
            for j in (i + 1)..size {
                let cost = source.matrix_cost(i, j);
                costs[i][j] = cost;
                costs[j][i] = cost;
            }
        }
        Self { costs, size, degraded: true }
    }
}

/// Cost of a provider cell for the requested goal.
///
/// `Cost` uses distance: for the supported travel modes the monetary cost
/// of a leg is proportional to its length.
fn goal_cost(cell: ProviderCell, goal: OptimizeFor) -> f64 {
    match goal {
        OptimizeFor::Time => cell.duration_seconds / 60.0,
        OptimizeFor::Distance | OptimizeFor::Cost => cell.distance_meters / 1000.0,
    }
}

/// Convert a provider matrix, filling cells the provider could not route.
///
/// A missing cell takes its mirrored counterpart when that exists,
/// otherwise one fallback value shared by both directions.
fn from_provider(matrix: &ProviderMatrix, goal: OptimizeFor, source: &dyn FallbackSource) -> TravelMatrix {
    let n = matrix.size;
    let mut costs = vec![vec![0.0; n]; n];
    let mut degraded = false;

    for i in 0..n {
        for j in (i + 1)..n {
            match (matrix.cell(i, j), matrix.cell(j, i)) {
                (Some(forward), Some(backward)) => {
                    costs[i][j] = goal_cost(forward, goal);
                    costs[j][i] = goal_cost(backward, goal);
                }
                (Some(cell), None) | (None, Some(cell)) => {
                    let cost = goal_cost(cell, goal);
                    costs[i][j] = cost;
                    costs[j][i] = cost;
                }
                (None, None) => {
                    let cost = source.matrix_cost(i, j);
                    costs[i][j] = cost;
                    costs[j][i] = cost;
                    degraded = true;
                }
            }
        }
    }

    TravelMatrix { costs, size: n, degraded }
}

/// Distance estimator with live/fallback duality
pub struct DistanceEstimator {
    provider: Option<Arc<dyn MapsProvider>>,
    fallback: Arc<dyn FallbackSource>,
    call_timeout: Duration,
}

impl DistanceEstimator {
    pub fn new(
        provider: Option<Arc<dyn MapsProvider>>,
        fallback: Arc<dyn FallbackSource>,
        call_timeout: Duration,
    ) -> Self {
        Self { provider, fallback, call_timeout }
    }

    /// Estimate the travel-cost matrix for `locations`
    pub async fn estimate(
        &self,
        locations: &[String],
        goal: OptimizeFor,
        options: &RouteOptions,
    ) -> TravelMatrix {
        let n = locations.len();
        if n == 0 {
            return TravelMatrix::empty();
        }
        if n == 1 {
            return TravelMatrix::from_costs(vec![vec![0.0]]);
        }

        let Some(provider) = &self.provider else {
            warn!("No maps provider configured, using fallback matrix for {} locations", n);
            return TravelMatrix::fallback(n, self.fallback.as_ref());
        };

        let result = tokio::time::timeout(
            self.call_timeout,
            provider.distance_matrix(locations, options),
        )
        .await;

        match result {
            Ok(Ok(matrix)) if matrix.size == n => {
                let converted = from_provider(&matrix, goal, self.fallback.as_ref());
                if converted.degraded {
                    warn!("{} matrix has unroutable cells, filled with fallback values", provider.name());
                }
                debug!("Distance matrix {}x{} from {} (goal={})", n, n, provider.name(), goal.as_str());
                converted
            }
            Ok(Ok(matrix)) => {
                warn!(
                    "{} returned a {}x{} matrix for {} locations, using fallback matrix",
                    provider.name(), matrix.size, matrix.size, n
                );
                TravelMatrix::fallback(n, self.fallback.as_ref())
            }
            Ok(Err(e)) => {
                warn!("{} distance matrix failed: {:#}. Using fallback matrix.", provider.name(), e);
                TravelMatrix::fallback(n, self.fallback.as_ref())
            }
            Err(_) => {
                warn!(
                    "{} distance matrix timed out after {:?}. Using fallback matrix.",
                    provider.name(), self.call_timeout
                );
                TravelMatrix::fallback(n, self.fallback.as_ref())
            }
        }
    }
}
