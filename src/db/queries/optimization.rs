//! Route optimization queries
//!
//! Orders and segments are stored as JSONB and decoded into typed values
//! here; nothing outside this module sees the raw column shapes.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::OptimizationError;
use crate::types::{OptimizationProposal, OptimizationStatus, TravelSegment};

const OPTIMIZATION_COLUMNS: &str = r#"
    id, user_id, date, original_order, optimized_order, segments,
    total_distance_km, total_travel_minutes, estimated_savings_minutes,
    mode, optimize_for, avoid_tolls, avoid_highways, degraded_estimates,
    status, created_at, applied_at, rejected_at
"#;

/// Raw `route_optimizations` row
#[derive(Debug, Clone, FromRow)]
pub struct OptimizationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub original_order: Json<Vec<Uuid>>,
    pub optimized_order: Json<Vec<Uuid>>,
    pub segments: Json<Vec<TravelSegment>>,
    pub total_distance_km: f64,
    pub total_travel_minutes: i32,
    pub estimated_savings_minutes: i32,
    pub mode: String,
    pub optimize_for: String,
    pub avoid_tolls: bool,
    pub avoid_highways: bool,
    pub degraded_estimates: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub applied_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
}

impl TryFrom<OptimizationRow> for OptimizationProposal {
    type Error = OptimizationError;

    fn try_from(row: OptimizationRow) -> Result<Self, Self::Error> {
        let corrupt = |e: String| OptimizationError::Corrupt(format!("optimization {}: {}", row.id, e));

        let status = row.status.parse().map_err(corrupt)?;
        let mode = row.mode.parse().map_err(corrupt)?;
        let optimize_for = row.optimize_for.parse().map_err(corrupt)?;

        let optimized_order = row.optimized_order.0;
        let segments = row.segments.0;
        if !optimized_order.is_empty() && segments.len() + 1 != optimized_order.len() {
            return Err(corrupt(format!(
                "{} segments for {} events",
                segments.len(),
                optimized_order.len()
            )));
        }

        Ok(OptimizationProposal {
            id: row.id,
            user_id: row.user_id,
            date: row.date,
            original_order: row.original_order.0,
            optimized_order,
            segments,
            total_distance_km: row.total_distance_km,
            total_travel_minutes: row.total_travel_minutes,
            estimated_savings_minutes: row.estimated_savings_minutes,
            mode,
            optimize_for,
            avoid_tolls: row.avoid_tolls,
            avoid_highways: row.avoid_highways,
            degraded_estimates: row.degraded_estimates,
            status,
            created_at: row.created_at,
            applied_at: row.applied_at,
            rejected_at: row.rejected_at,
        })
    }
}

/// Insert a new optimization
pub async fn insert_optimization(pool: &PgPool, proposal: &OptimizationProposal) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO route_optimizations (
            id, user_id, date, original_order, optimized_order, segments,
            total_distance_km, total_travel_minutes, estimated_savings_minutes,
            mode, optimize_for, avoid_tolls, avoid_highways, degraded_estimates,
            status, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        "#,
    )
    .bind(proposal.id)
    .bind(proposal.user_id)
    .bind(proposal.date)
    .bind(Json(&proposal.original_order))
    .bind(Json(&proposal.optimized_order))
    .bind(Json(&proposal.segments))
    .bind(proposal.total_distance_km)
    .bind(proposal.total_travel_minutes)
    .bind(proposal.estimated_savings_minutes)
    .bind(proposal.mode.as_str())
    .bind(proposal.optimize_for.as_str())
    .bind(proposal.avoid_tolls)
    .bind(proposal.avoid_highways)
    .bind(proposal.degraded_estimates)
    .bind(proposal.status.as_str())
    .bind(proposal.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get an optimization owned by `user_id`
pub async fn get_optimization(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
) -> Result<Option<OptimizationRow>, sqlx::Error> {
    let query = format!(
        "SELECT {OPTIMIZATION_COLUMNS} FROM route_optimizations WHERE id = $1 AND user_id = $2"
    );

    sqlx::query_as::<_, OptimizationRow>(&query)
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Get and lock an optimization for the rest of the transaction
pub async fn lock_optimization(
    conn: &mut PgConnection,
    id: Uuid,
    user_id: Uuid,
) -> Result<Option<OptimizationRow>, sqlx::Error> {
    let query = format!(
        "SELECT {OPTIMIZATION_COLUMNS} FROM route_optimizations WHERE id = $1 AND user_id = $2 FOR UPDATE"
    );

    sqlx::query_as::<_, OptimizationRow>(&query)
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
}

/// List a user's optimizations, newest date first
pub async fn list_optimizations(
    pool: &PgPool,
    user_id: Uuid,
    status: Option<OptimizationStatus>,
) -> Result<Vec<OptimizationRow>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT {OPTIMIZATION_COLUMNS}
        FROM route_optimizations
        WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
        ORDER BY date DESC, created_at DESC
        "#
    );

    sqlx::query_as::<_, OptimizationRow>(&query)
        .bind(user_id)
        .bind(status.map(OptimizationStatus::as_str))
        .fetch_all(pool)
        .await
}

/// Move an `optimized` row to a terminal status.
///
/// Conditional on the current status, so two racing callers cannot both
/// succeed. Returns `None` when no row matched.
pub async fn finish_optimization<'c, E>(
    executor: E,
    id: Uuid,
    user_id: Uuid,
    status: OptimizationStatus,
    at: DateTime<Utc>,
) -> Result<Option<OptimizationRow>, sqlx::Error>
where
    E: sqlx::PgExecutor<'c>,
{
    let query = format!(
        r#"
        UPDATE route_optimizations
        SET status = $3,
            applied_at = CASE WHEN $3 = 'applied' THEN $4 ELSE applied_at END,
            rejected_at = CASE WHEN $3 = 'rejected' THEN $4 ELSE rejected_at END
        WHERE id = $1 AND user_id = $2 AND status = 'optimized'
        RETURNING {OPTIMIZATION_COLUMNS}
        "#
    );

    sqlx::query_as::<_, OptimizationRow>(&query)
        .bind(id)
        .bind(user_id)
        .bind(status.as_str())
        .bind(at)
        .fetch_optional(executor)
        .await
}

/// Current status of an optimization owned by `user_id`
pub async fn get_optimization_status(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT status FROM route_optimizations WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}
