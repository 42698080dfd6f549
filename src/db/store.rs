//! Optimization store: the engine's only shared mutable resource.
//!
//! Every read and write is scoped to the owning user. A proposal owned by
//! somebody else is reported exactly like a missing one.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::queries;
use crate::error::OptimizationError;
use crate::services::schedule::{plan_schedule, EventReschedule};
use crate::types::{CalendarEvent, OptimizationProposal, OptimizationStatus};

/// Result of a successful apply
#[derive(Debug, Clone)]
pub struct AppliedSchedule {
    pub proposal: OptimizationProposal,
    pub changes: Vec<EventReschedule>,
}

/// UTC bounds `[start, end)` of a calendar day
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

/// Storage trait for events and optimization proposals
#[async_trait]
pub trait OptimizationStore: Send + Sync {
    /// User's events starting on `date` (UTC), in start order
    async fn events_for_date(&self, user_id: Uuid, date: NaiveDate) -> Result<Vec<CalendarEvent>, OptimizationError>;

    /// User's events among `ids`, in no particular order
    async fn events_by_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<CalendarEvent>, OptimizationError>;

    async fn create(&self, proposal: &OptimizationProposal) -> Result<(), OptimizationError>;

    async fn get(&self, id: Uuid, user_id: Uuid) -> Result<Option<OptimizationProposal>, OptimizationError>;

    /// Newest date first
    async fn list(
        &self,
        user_id: Uuid,
        status: Option<OptimizationStatus>,
    ) -> Result<Vec<OptimizationProposal>, OptimizationError>;

    /// Move an `optimized` proposal to a terminal status.
    ///
    /// Fails with `NotFound` or `AlreadyProcessed`; never a silent no-op.
    async fn transition(
        &self,
        id: Uuid,
        user_id: Uuid,
        status: OptimizationStatus,
        at: DateTime<Utc>,
    ) -> Result<OptimizationProposal, OptimizationError>;

    /// Rewrite event times per the proposal and mark it `applied`, as one
    /// atomic unit. Concurrent calls on the same proposal are serialized;
    /// at most one succeeds.
    async fn apply_schedule(
        &self,
        id: Uuid,
        user_id: Uuid,
        applied_at: DateTime<Utc>,
    ) -> Result<AppliedSchedule, OptimizationError>;

    /// Get store name for logging
    fn name(&self) -> &str;
}

pub(crate) fn check_transition_target(status: OptimizationStatus) -> Result<(), OptimizationError> {
    if status.is_terminal() {
        Ok(())
    } else {
        Err(OptimizationError::validation(format!(
            "Cannot move an optimization to status '{}'",
            status
        )))
    }
}

/// PostgreSQL-backed store
pub struct PgOptimizationStore {
    pool: PgPool,
}

impl PgOptimizationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Explain why a conditional update matched no row
    async fn unmatched_reason(&self, id: Uuid, user_id: Uuid) -> OptimizationError {
        match queries::optimization::get_optimization_status(&self.pool, id, user_id).await {
            Ok(None) => OptimizationError::NotFound,
            Ok(Some(status)) => match status.parse() {
                Ok(status) => OptimizationError::AlreadyProcessed(status),
                Err(e) => OptimizationError::Corrupt(e),
            },
            Err(e) => OptimizationError::Storage(e),
        }
    }
}

#[async_trait]
impl OptimizationStore for PgOptimizationStore {
    async fn events_for_date(&self, user_id: Uuid, date: NaiveDate) -> Result<Vec<CalendarEvent>, OptimizationError> {
        let (from, to) = day_bounds(date);
        Ok(queries::event::list_events_between(&self.pool, user_id, from, to).await?)
    }

    async fn events_by_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<CalendarEvent>, OptimizationError> {
        Ok(queries::event::get_events_by_ids(&self.pool, user_id, ids).await?)
    }

    async fn create(&self, proposal: &OptimizationProposal) -> Result<(), OptimizationError> {
        queries::optimization::insert_optimization(&self.pool, proposal).await?;
        Ok(())
    }

    async fn get(&self, id: Uuid, user_id: Uuid) -> Result<Option<OptimizationProposal>, OptimizationError> {
        queries::optimization::get_optimization(&self.pool, id, user_id)
            .await?
            .map(OptimizationProposal::try_from)
            .transpose()
    }

    async fn list(
        &self,
        user_id: Uuid,
        status: Option<OptimizationStatus>,
    ) -> Result<Vec<OptimizationProposal>, OptimizationError> {
        queries::optimization::list_optimizations(&self.pool, user_id, status)
            .await?
            .into_iter()
            .map(OptimizationProposal::try_from)
            .collect()
    }

    async fn transition(
        &self,
        id: Uuid,
        user_id: Uuid,
        status: OptimizationStatus,
        at: DateTime<Utc>,
    ) -> Result<OptimizationProposal, OptimizationError> {
        check_transition_target(status)?;

        match queries::optimization::finish_optimization(&self.pool, id, user_id, status, at).await? {
            Some(row) => OptimizationProposal::try_from(row),
            None => Err(self.unmatched_reason(id, user_id).await),
        }
    }

    async fn apply_schedule(
        &self,
        id: Uuid,
        user_id: Uuid,
        applied_at: DateTime<Utc>,
    ) -> Result<AppliedSchedule, OptimizationError> {
        // Dropping `tx` on any early return rolls everything back
        let mut tx = self.pool.begin().await?;

        let row = queries::optimization::lock_optimization(&mut tx, id, user_id)
            .await?
            .ok_or(OptimizationError::NotFound)?;
        let proposal = OptimizationProposal::try_from(row)?;
        if proposal.status.is_terminal() {
            return Err(OptimizationError::AlreadyProcessed(proposal.status));
        }

        let events = queries::event::lock_events_by_ids(&mut tx, user_id, &proposal.optimized_order).await?;
        let changes = plan_schedule(&proposal, &events, applied_at)?;

        for change in &changes {
            if !queries::event::update_event_schedule(&mut tx, user_id, change).await? {
                return Err(OptimizationError::validation(format!(
                    "Event {} no longer exists; run the optimization again",
                    change.event_id
                )));
            }
            debug!(
                "Event {} moved {} -> {}",
                change.event_id, change.previous_start, change.new_start
            );
        }

        let row = queries::optimization::finish_optimization(
            &mut *tx,
            id,
            user_id,
            OptimizationStatus::Applied,
            applied_at,
        )
        .await?
        .ok_or(OptimizationError::AlreadyProcessed(OptimizationStatus::Applied))?;

        tx.commit().await?;

        let proposal = OptimizationProposal::try_from(row)?;
        info!("Applied optimization {} ({} events rescheduled)", id, changes.len());
        Ok(AppliedSchedule { proposal, changes })
    }

    fn name(&self) -> &str {
        "PostgreSQL"
    }
}
