//! Calendar event queries

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::services::schedule::EventReschedule;
use crate::types::CalendarEvent;

const EVENT_COLUMNS: &str = r#"
    id, user_id, title, location, start_time, end_time, metadata, sync_pending
"#;

/// List a user's events starting within `[from, to)`, in start order
pub async fn list_events_between(
    pool: &PgPool,
    user_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<CalendarEvent>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT {EVENT_COLUMNS}
        FROM calendar_events
        WHERE user_id = $1 AND start_time >= $2 AND start_time < $3
        ORDER BY start_time ASC, id ASC
        "#
    );

    sqlx::query_as::<_, CalendarEvent>(&query)
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await
}

/// Get a user's events by id (other users' events are silently skipped)
pub async fn get_events_by_ids(
    pool: &PgPool,
    user_id: Uuid,
    ids: &[Uuid],
) -> Result<Vec<CalendarEvent>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT {EVENT_COLUMNS}
        FROM calendar_events
        WHERE user_id = $1 AND id = ANY($2)
        "#
    );

    sqlx::query_as::<_, CalendarEvent>(&query)
        .bind(user_id)
        .bind(ids)
        .fetch_all(pool)
        .await
}

/// Same as `get_events_by_ids`, locking the rows for the transaction
pub async fn lock_events_by_ids(
    conn: &mut PgConnection,
    user_id: Uuid,
    ids: &[Uuid],
) -> Result<Vec<CalendarEvent>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT {EVENT_COLUMNS}
        FROM calendar_events
        WHERE user_id = $1 AND id = ANY($2)
        ORDER BY id
        FOR UPDATE
        "#
    );

    sqlx::query_as::<_, CalendarEvent>(&query)
        .bind(user_id)
        .bind(ids)
        .fetch_all(&mut *conn)
        .await
}

/// Write new times and metadata, flagging the event for calendar re-sync
pub async fn update_event_schedule(
    conn: &mut PgConnection,
    user_id: Uuid,
    change: &EventReschedule,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE calendar_events
        SET start_time = $3,
            end_time = $4,
            metadata = $5,
            sync_pending = TRUE
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(change.event_id)
    .bind(user_id)
    .bind(change.new_start)
    .bind(change.new_end)
    .bind(&change.metadata)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}
