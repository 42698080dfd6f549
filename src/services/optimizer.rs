//! Route optimization entry point.
//!
//! Wires the distance estimator, order optimizer and segment resolver
//! together per request, persists the resulting proposal, and exposes the
//! proposal lifecycle (get, list, apply, reject).

use anyhow::anyhow;
use chrono::{NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::db::{AppliedSchedule, OptimizationStore};
use crate::error::OptimizationError;
use crate::services::distance::DistanceEstimator;
use crate::services::order::nearest_neighbor;
use crate::services::routing::{FallbackSource, MapsProvider, RouteOptions};
use crate::services::segments::SegmentResolver;
use crate::types::{
    CalendarEvent, OptimizationProposal, OptimizationStatus, OptimizeRouteRequest,
};

/// Fewest located events worth optimizing
pub const MIN_LOCATED_EVENTS: usize = 2;

fn parse_date(date: &str) -> Result<NaiveDate, OptimizationError> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| {
        OptimizationError::validation(format!("Invalid date '{}', expected YYYY-MM-DD", date))
    })
}

/// Keep caller-facing errors, wrap everything else as an optimization failure
fn unexpected(context: &'static str) -> impl FnOnce(OptimizationError) -> OptimizationError {
    move |e| match e {
        OptimizationError::Storage(_) | OptimizationError::Corrupt(_) => {
            let cause = anyhow::Error::new(e).context(context);
            error!("Route optimization failed: {:#}", cause);
            OptimizationError::Failed(cause)
        }
        other => other,
    }
}

pub struct RouteOptimizer {
    store: Arc<dyn OptimizationStore>,
    estimator: DistanceEstimator,
    resolver: SegmentResolver,
}

impl RouteOptimizer {
    pub fn new(
        store: Arc<dyn OptimizationStore>,
        provider: Option<Arc<dyn MapsProvider>>,
        fallback: Arc<dyn FallbackSource>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            store,
            estimator: DistanceEstimator::new(provider.clone(), Arc::clone(&fallback), call_timeout),
            resolver: SegmentResolver::new(provider, fallback, call_timeout),
        }
    }

    /// Optimize the visiting order of a day's events and persist the proposal
    pub async fn optimize_route(
        &self,
        user_id: Uuid,
        request: &OptimizeRouteRequest,
    ) -> Result<OptimizationProposal, OptimizationError> {
        let date = parse_date(&request.date)?;

        let events = self
            .candidate_events(user_id, date, request.event_ids.as_deref())
            .await
            .map_err(unexpected("Failed to load events"))?;

        if events.len() < MIN_LOCATED_EVENTS {
            return Err(OptimizationError::validation(format!(
                "At least {} events with a location are required (found {})",
                MIN_LOCATED_EVENTS,
                events.len()
            )));
        }

        let options = RouteOptions {
            mode: request.mode,
            avoid_tolls: request.avoid_tolls,
            avoid_highways: request.avoid_highways,
        };
        let locations: Vec<String> = events.iter().map(|e| e.location_str().to_string()).collect();

        let matrix = self.estimator.estimate(&locations, request.optimize_for, &options).await;
        let order = nearest_neighbor(&matrix, request.optimize_for);
        if order.len() != events.len() {
            let cause = anyhow!("optimizer returned {} stops for {} events", order.len(), events.len());
            error!("Route optimization failed: {:#}", cause);
            return Err(OptimizationError::Failed(cause));
        }

        let optimized_locations: Vec<String> = order.iter().map(|&i| locations[i].clone()).collect();
        let optimized = self.resolver.resolve(&optimized_locations, &options).await;
        let original = self.resolver.resolve(&locations, &options).await;

        let savings = (original.total_minutes() - optimized.total_minutes()).max(0);

        let proposal = OptimizationProposal {
            id: Uuid::new_v4(),
            user_id,
            date,
            original_order: events.iter().map(|e| e.id).collect(),
            optimized_order: order.iter().map(|&i| events[i].id).collect(),
            total_distance_km: optimized.total_distance_km(),
            total_travel_minutes: optimized.total_minutes(),
            estimated_savings_minutes: savings,
            degraded_estimates: matrix.degraded || optimized.degraded() || original.degraded(),
            segments: optimized.segments,
            mode: request.mode,
            optimize_for: request.optimize_for,
            avoid_tolls: request.avoid_tolls,
            avoid_highways: request.avoid_highways,
            status: OptimizationStatus::Optimized,
            created_at: Utc::now(),
            applied_at: None,
            rejected_at: None,
        };

        self.store
            .create(&proposal)
            .await
            .map_err(unexpected("Failed to store optimization"))?;

        info!(
            "Optimized {} events for {} on {}: {:.1} km, {} min travel, {} min saved{}",
            proposal.optimized_order.len(),
            user_id,
            date,
            proposal.total_distance_km,
            proposal.total_travel_minutes,
            proposal.estimated_savings_minutes,
            if proposal.degraded_estimates { " (degraded estimates)" } else { "" }
        );

        Ok(proposal)
    }

    /// Located events to optimize, in their original order
    async fn candidate_events(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        event_ids: Option<&[Uuid]>,
    ) -> Result<Vec<CalendarEvent>, OptimizationError> {
        let Some(event_ids) = event_ids else {
            let events = self.store.events_for_date(user_id, date).await?;
            let total = events.len();
            let located: Vec<CalendarEvent> = events.into_iter().filter(|e| e.has_location()).collect();
            debug!("{} of {} events on {} have a location", located.len(), total, date);
            return Ok(located);
        };

        let mut seen = HashSet::new();
        let ids: Vec<Uuid> = event_ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let mut found: HashMap<Uuid, CalendarEvent> = self
            .store
            .events_by_ids(user_id, &ids)
            .await?
            .into_iter()
            .map(|e| (e.id, e))
            .collect();

        let mut events = Vec::with_capacity(ids.len());
        for id in ids {
            let event = found
                .remove(&id)
                .ok_or_else(|| OptimizationError::validation(format!("Event {} not found", id)))?;
            if !event.has_location() {
                return Err(OptimizationError::validation(format!("Event {} has no location", id)));
            }
            events.push(event);
        }
        Ok(events)
    }

    pub async fn get(&self, id: Uuid, user_id: Uuid) -> Result<OptimizationProposal, OptimizationError> {
        self.store.get(id, user_id).await?.ok_or(OptimizationError::NotFound)
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        status: Option<OptimizationStatus>,
    ) -> Result<Vec<OptimizationProposal>, OptimizationError> {
        self.store.list(user_id, status).await
    }

    /// Rewrite the day's events per the proposal and mark it applied
    pub async fn apply(&self, id: Uuid, user_id: Uuid) -> Result<AppliedSchedule, OptimizationError> {
        self.store.apply_schedule(id, user_id, Utc::now()).await
    }

    pub async fn reject(&self, id: Uuid, user_id: Uuid) -> Result<OptimizationProposal, OptimizationError> {
        let proposal = self
            .store
            .transition(id, user_id, OptimizationStatus::Rejected, Utc::now())
            .await?;
        info!("Rejected optimization {}", id);
        Ok(proposal)
    }
}
