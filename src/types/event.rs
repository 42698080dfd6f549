//! Calendar event types
//!
//! Events are owned by the calendar service. The optimizer only reads them
//! and rewrites their start/end times when a proposal is applied.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Calendar event as stored in `calendar_events`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Free-form annotations (JSON object)
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Set when the event must be pushed to external calendars again
    #[serde(default)]
    pub sync_pending: bool,
}

impl CalendarEvent {
    /// Whether the event has a usable location
    pub fn has_location(&self) -> bool {
        self.location
            .as_deref()
            .map(|l| !l.trim().is_empty())
            .unwrap_or(false)
    }

    /// Trimmed location string, empty if none
    pub fn location_str(&self) -> &str {
        self.location.as_deref().map(str::trim).unwrap_or("")
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(location: Option<&str>) -> CalendarEvent {
        CalendarEvent {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Dentist".to_string(),
            location: location.map(str::to_string),
            start_time: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2026, 3, 2, 9, 45, 0).unwrap(),
            metadata: serde_json::json!({}),
            sync_pending: false,
        }
    }

    #[test]
    fn test_has_location() {
        assert!(event(Some("Av. Paulista 1000, São Paulo")).has_location());
        assert!(!event(Some("   ")).has_location());
        assert!(!event(None).has_location());
    }

    #[test]
    fn test_location_str_is_trimmed() {
        assert_eq!(event(Some("  Rua Augusta 500 ")).location_str(), "Rua Augusta 500");
        assert_eq!(event(None).location_str(), "");
    }

    #[test]
    fn test_duration() {
        assert_eq!(event(None).duration(), Duration::minutes(45));
    }
}
