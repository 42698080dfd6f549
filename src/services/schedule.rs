//! Cascade computation for applying an optimization to calendar events.
//!
//! Walks the optimized order and moves every event after the first so that
//! it starts one travel leg plus `TRAVEL_BUFFER_MINUTES` after the previous
//! event ends. Durations are kept. The first event is never moved; its
//! current end time anchors the cascade, and drift accumulates forward.
//!
//! This module only computes the new times. Writing them (atomically,
//! together with the status change) is the store's job.

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::OptimizationError;
use crate::types::{CalendarEvent, OptimizationProposal};

/// Fixed slack added after every travel leg
pub const TRAVEL_BUFFER_MINUTES: i64 = 15;

/// Metadata key annotating rescheduled events
pub const METADATA_KEY: &str = "routeOptimization";

/// New times for one event
#[derive(Debug, Clone, PartialEq)]
pub struct EventReschedule {
    pub event_id: Uuid,
    pub previous_start: DateTime<Utc>,
    pub previous_end: DateTime<Utc>,
    pub new_start: DateTime<Utc>,
    pub new_end: DateTime<Utc>,
    /// Event metadata with the optimization annotation added
    pub metadata: Value,
}

fn annotate(metadata: &Value, optimization_id: Uuid, event: &CalendarEvent, applied_at: DateTime<Utc>) -> Value {
    let mut map = match metadata {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    map.insert(
        METADATA_KEY.to_string(),
        json!({
            "optimizationId": optimization_id,
            "previousStart": event.start_time,
            "previousEnd": event.end_time,
            "appliedAt": applied_at,
        }),
    );
    Value::Object(map)
}

/// Compute new start/end times for every event after the first.
///
/// `events` may come in any order; they are matched to
/// `proposal.optimized_order` by id. An event that no longer exists makes
/// the whole plan fail.
pub fn plan_schedule(
    proposal: &OptimizationProposal,
    events: &[CalendarEvent],
    applied_at: DateTime<Utc>,
) -> Result<Vec<EventReschedule>, OptimizationError> {
    let order = &proposal.optimized_order;
    if order.is_empty() {
        return Ok(vec![]);
    }
    if proposal.segments.len() + 1 != order.len() {
        return Err(OptimizationError::Corrupt(format!(
            "optimization {} has {} segments for {} events",
            proposal.id,
            proposal.segments.len(),
            order.len()
        )));
    }

    let by_id: HashMap<Uuid, &CalendarEvent> = events.iter().map(|e| (e.id, e)).collect();
    let ordered = order
        .iter()
        .map(|id| {
            by_id.get(id).copied().ok_or_else(|| {
                OptimizationError::validation(format!(
                    "Event {} no longer exists; run the optimization again",
                    id
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut anchor = ordered[0].end_time;
    let mut changes = Vec::with_capacity(ordered.len() - 1);

    for (event, segment) in ordered[1..].iter().zip(&proposal.segments) {
        let buffer = Duration::minutes(segment.duration_minutes as i64 + TRAVEL_BUFFER_MINUTES);
        let new_start = anchor + buffer;
        let new_end = new_start + event.duration();

        changes.push(EventReschedule {
            event_id: event.id,
            previous_start: event.start_time,
            previous_end: event.end_time,
            new_start,
            new_end,
            metadata: annotate(&event.metadata, proposal.id, event, applied_at),
        });

        anchor = new_end;
    }

    Ok(changes)
}
