//! Visiting order optimization (greedy nearest neighbor).
//!
//! The tour always starts at index 0: the first event of the day stays
//! first. No improvement pass (2-opt etc.) is run afterwards.

use tracing::debug;

use crate::services::distance::TravelMatrix;
use crate::types::OptimizeFor;

/// Nearest neighbor heuristic.
/// Returns a permutation of `0..matrix.size` starting with 0.
///
/// Ties go to the lowest index, so identical matrices always give the same
/// order. `goal` is informational: the matrix already encodes the cost for
/// that goal.
pub fn nearest_neighbor(matrix: &TravelMatrix, goal: OptimizeFor) -> Vec<usize> {
    let n = matrix.size;
    if n == 0 {
        return vec![];
    }

    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);

    visited[0] = true;
    order.push(0);
    let mut current = 0;

    for _ in 1..n {
        let mut best: Option<(usize, f64)> = None;

        for candidate in 0..n {
            if visited[candidate] {
                continue;
            }
            let cost = matrix.cost(current, candidate);
            match best {
                Some((_, best_cost)) if cost >= best_cost => {}
                _ => best = Some((candidate, cost)),
            }
        }

        if let Some((next, _)) = best {
            visited[next] = true;
            order.push(next);
            current = next;
        }
    }

    debug!("Nearest neighbor order for {} stops (goal={}): {:?}", n, goal.as_str(), order);
    order
}
