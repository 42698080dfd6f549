//! In-process store for local runs and tests.
//!
//! Events and proposals share one lock, so an apply observes and rewrites
//! both as a single step.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::db::store::{check_transition_target, day_bounds, AppliedSchedule, OptimizationStore};
use crate::error::OptimizationError;
use crate::services::schedule::plan_schedule;
use crate::types::{CalendarEvent, OptimizationProposal, OptimizationStatus};

#[derive(Default)]
struct State {
    events: HashMap<Uuid, CalendarEvent>,
    proposals: HashMap<Uuid, OptimizationProposal>,
}

impl State {
    fn owned_proposal(&mut self, id: Uuid, user_id: Uuid) -> Result<&mut OptimizationProposal, OptimizationError> {
        self.proposals
            .get_mut(&id)
            .filter(|p| p.user_id == user_id)
            .ok_or(OptimizationError::NotFound)
    }
}

#[derive(Default)]
pub struct MemoryOptimizationStore {
    state: Mutex<State>,
}

impl MemoryOptimizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace an event
    pub fn insert_event(&self, event: CalendarEvent) {
        self.state.lock().events.insert(event.id, event);
    }

    /// Seed events from a JSON array of calendar events
    pub fn load_events_json(&self, json: &str) -> anyhow::Result<usize> {
        let events: Vec<CalendarEvent> = serde_json::from_str(json)?;
        let count = events.len();
        for event in events {
            self.insert_event(event);
        }
        Ok(count)
    }

    #[cfg(test)]
    pub fn remove_event(&self, id: Uuid) -> Option<CalendarEvent> {
        self.state.lock().events.remove(&id)
    }

    #[cfg(test)]
    pub fn event(&self, id: Uuid) -> Option<CalendarEvent> {
        self.state.lock().events.get(&id).cloned()
    }
}

fn finish(proposal: &mut OptimizationProposal, status: OptimizationStatus, at: DateTime<Utc>) {
    proposal.status = status;
    match status {
        OptimizationStatus::Applied => proposal.applied_at = Some(at),
        OptimizationStatus::Rejected => proposal.rejected_at = Some(at),
        OptimizationStatus::Optimized => {}
    }
}

#[async_trait]
impl OptimizationStore for MemoryOptimizationStore {
    async fn events_for_date(&self, user_id: Uuid, date: NaiveDate) -> Result<Vec<CalendarEvent>, OptimizationError> {
        let (from, to) = day_bounds(date);
        let state = self.state.lock();

        let mut events: Vec<CalendarEvent> = state
            .events
            .values()
            .filter(|e| e.user_id == user_id && e.start_time >= from && e.start_time < to)
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.start_time, e.id));
        Ok(events)
    }

    async fn events_by_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<CalendarEvent>, OptimizationError> {
        let state = self.state.lock();
        Ok(ids
            .iter()
            .filter_map(|id| state.events.get(id))
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create(&self, proposal: &OptimizationProposal) -> Result<(), OptimizationError> {
        self.state.lock().proposals.insert(proposal.id, proposal.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid, user_id: Uuid) -> Result<Option<OptimizationProposal>, OptimizationError> {
        let state = self.state.lock();
        Ok(state.proposals.get(&id).filter(|p| p.user_id == user_id).cloned())
    }

    async fn list(
        &self,
        user_id: Uuid,
        status: Option<OptimizationStatus>,
    ) -> Result<Vec<OptimizationProposal>, OptimizationError> {
        let state = self.state.lock();
        let mut items: Vec<OptimizationProposal> = state
            .proposals
            .values()
            .filter(|p| p.user_id == user_id)
            .filter(|p| status.map_or(true, |s| p.status == s))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        Ok(items)
    }

    async fn transition(
        &self,
        id: Uuid,
        user_id: Uuid,
        status: OptimizationStatus,
        at: DateTime<Utc>,
    ) -> Result<OptimizationProposal, OptimizationError> {
        check_transition_target(status)?;

        let mut state = self.state.lock();
        let proposal = state.owned_proposal(id, user_id)?;
        if proposal.status.is_terminal() {
            return Err(OptimizationError::AlreadyProcessed(proposal.status));
        }
        finish(proposal, status, at);
        Ok(proposal.clone())
    }

    async fn apply_schedule(
        &self,
        id: Uuid,
        user_id: Uuid,
        applied_at: DateTime<Utc>,
    ) -> Result<AppliedSchedule, OptimizationError> {
        let mut state = self.state.lock();

        let proposal = state.owned_proposal(id, user_id)?.clone();
        if proposal.status.is_terminal() {
            return Err(OptimizationError::AlreadyProcessed(proposal.status));
        }

        let events: Vec<CalendarEvent> = proposal
            .optimized_order
            .iter()
            .filter_map(|id| state.events.get(id))
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();

        // Nothing is written unless the whole plan succeeds
        let changes = plan_schedule(&proposal, &events, applied_at)?;

        for change in &changes {
            if let Some(event) = state.events.get_mut(&change.event_id) {
                event.start_time = change.new_start;
                event.end_time = change.new_end;
                event.metadata = change.metadata.clone();
                event.sync_pending = true;
            }
        }

        let stored = state.owned_proposal(id, user_id)?;
        finish(stored, OptimizationStatus::Applied, applied_at);
        let proposal = stored.clone();

        info!("Applied optimization {} ({} events rescheduled)", id, changes.len());
        Ok(AppliedSchedule { proposal, changes })
    }

    fn name(&self) -> &str {
        "Memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OptimizeFor, TravelMode, TravelSegment};
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use std::sync::Arc;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn event(user_id: Uuid, start: DateTime<Utc>, location: &str) -> CalendarEvent {
        CalendarEvent {
            id: Uuid::new_v4(),
            user_id,
            title: "Visit".to_string(),
            location: Some(location.to_string()),
            start_time: start,
            end_time: start + Duration::hours(1),
            metadata: json!({}),
            sync_pending: false,
        }
    }

    fn proposal(user_id: Uuid, order: Vec<Uuid>) -> OptimizationProposal {
        let segments = order
            .windows(2)
            .map(|_| TravelSegment {
                from: "X".to_string(),
                to: "Y".to_string(),
                distance_km: 5.0,
                duration_minutes: 15,
                path: String::new(),
            })
            .collect();
        OptimizationProposal {
            id: Uuid::new_v4(),
            user_id,
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            original_order: order.clone(),
            optimized_order: order,
            segments,
            total_distance_km: 5.0,
            total_travel_minutes: 15,
            estimated_savings_minutes: 0,
            mode: TravelMode::Driving,
            optimize_for: OptimizeFor::Time,
            avoid_tolls: false,
            avoid_highways: false,
            degraded_estimates: true,
            status: OptimizationStatus::Optimized,
            created_at: at(7, 0),
            applied_at: None,
            rejected_at: None,
        }
    }

    #[tokio::test]
    async fn test_events_for_date_filters_user_and_day() {
        let store = MemoryOptimizationStore::new();
        let user = Uuid::new_v4();
        let late = event(user, at(15, 0), "B");
        let early = event(user, at(9, 0), "A");
        let other_user = event(Uuid::new_v4(), at(10, 0), "C");
        let next_day = event(user, at(9, 0) + Duration::days(1), "D");
        for e in [&late, &early, &other_user, &next_day] {
            store.insert_event(e.clone());
        }

        let events = store
            .events_for_date(user, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap())
            .await
            .unwrap();

        let ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);
    }

    #[tokio::test]
    async fn test_load_events_json() {
        let store = MemoryOptimizationStore::new();
        let user = Uuid::new_v4();
        let json = format!(
            r#"[{{"id": "{}", "userId": "{}", "title": "Dentist", "location": "Main St 1",
                 "startTime": "2026-03-02T09:00:00Z", "endTime": "2026-03-02T09:30:00Z"}}]"#,
            Uuid::new_v4(),
            user
        );

        assert_eq!(store.load_events_json(&json).unwrap(), 1);
        let events = store
            .events_for_date(user, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap())
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert!(!events[0].sync_pending);
        assert!(store.load_events_json("{").is_err());
    }

    #[tokio::test]
    async fn test_foreign_proposal_is_not_found() {
        let store = MemoryOptimizationStore::new();
        let owner = Uuid::new_v4();
        let p = proposal(owner, vec![]);
        store.create(&p).await.unwrap();

        assert!(store.get(p.id, Uuid::new_v4()).await.unwrap().is_none());
        let err = store
            .transition(p.id, Uuid::new_v4(), OptimizationStatus::Rejected, at(8, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, OptimizationError::NotFound));
    }

    #[tokio::test]
    async fn test_list_newest_date_first_with_status_filter() {
        let store = MemoryOptimizationStore::new();
        let user = Uuid::new_v4();
        let mut older = proposal(user, vec![]);
        older.date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let newer = proposal(user, vec![]);
        store.create(&older).await.unwrap();
        store.create(&newer).await.unwrap();
        store
            .transition(older.id, user, OptimizationStatus::Rejected, at(8, 0))
            .await
            .unwrap();

        let all = store.list(user, None).await.unwrap();
        assert_eq!(all.iter().map(|p| p.id).collect::<Vec<_>>(), vec![newer.id, older.id]);

        let rejected = store.list(user, Some(OptimizationStatus::Rejected)).await.unwrap();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].rejected_at, Some(at(8, 0)));
    }

    #[tokio::test]
    async fn test_apply_rewrites_events_and_flags_sync() {
        let store = MemoryOptimizationStore::new();
        let user = Uuid::new_v4();
        let a = event(user, at(9, 0), "A");
        let b = event(user, at(14, 0), "B");
        store.insert_event(a.clone());
        store.insert_event(b.clone());
        let p = proposal(user, vec![a.id, b.id]);
        store.create(&p).await.unwrap();

        let applied = store.apply_schedule(p.id, user, at(8, 0)).await.unwrap();

        assert_eq!(applied.proposal.status, OptimizationStatus::Applied);
        assert_eq!(applied.proposal.applied_at, Some(at(8, 0)));
        assert_eq!(applied.changes.len(), 1);

        let moved = store.event(b.id).unwrap();
        // 10:00 + 15 travel + 15 buffer
        assert_eq!(moved.start_time, at(10, 30));
        assert!(moved.sync_pending);
        assert_eq!(store.event(a.id).unwrap(), a);
    }

    #[tokio::test]
    async fn test_apply_with_deleted_event_writes_nothing() {
        let store = MemoryOptimizationStore::new();
        let user = Uuid::new_v4();
        let a = event(user, at(9, 0), "A");
        let b = event(user, at(11, 0), "B");
        let c = event(user, at(13, 0), "C");
        for e in [&a, &b, &c] {
            store.insert_event(e.clone());
        }
        let p = proposal(user, vec![a.id, b.id, c.id]);
        store.create(&p).await.unwrap();
        store.remove_event(c.id);

        let err = store.apply_schedule(p.id, user, at(8, 0)).await.unwrap_err();
        assert!(matches!(err, OptimizationError::Validation(_)));

        assert_eq!(store.event(b.id).unwrap(), b);
        let stored = store.get(p.id, user).await.unwrap().unwrap();
        assert_eq!(stored.status, OptimizationStatus::Optimized);
    }

    #[tokio::test]
    async fn test_apply_after_reject_is_precondition_failure() {
        let store = MemoryOptimizationStore::new();
        let user = Uuid::new_v4();
        let p = proposal(user, vec![]);
        store.create(&p).await.unwrap();
        store
            .transition(p.id, user, OptimizationStatus::Rejected, at(8, 0))
            .await
            .unwrap();

        let err = store.apply_schedule(p.id, user, at(9, 0)).await.unwrap_err();
        assert!(matches!(err, OptimizationError::AlreadyProcessed(OptimizationStatus::Rejected)));
    }

    #[tokio::test]
    async fn test_concurrent_apply_only_one_wins() {
        let store = Arc::new(MemoryOptimizationStore::new());
        let user = Uuid::new_v4();
        let a = event(user, at(9, 0), "A");
        let b = event(user, at(14, 0), "B");
        store.insert_event(a.clone());
        store.insert_event(b.clone());
        let p = proposal(user, vec![a.id, b.id]);
        store.create(&p).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.apply_schedule(p.id, user, at(8, 0)).await })
            })
            .collect();

        let mut wins = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(OptimizationError::AlreadyProcessed(OptimizationStatus::Applied)) => rejected += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(rejected, 7);
        // Cascade applied exactly once
        assert_eq!(store.event(b.id).unwrap().start_time, at(10, 30));
    }
}
