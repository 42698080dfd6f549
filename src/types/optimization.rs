//! Route optimization types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Travel mode passed to the maps provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    #[default]
    Driving,
    Walking,
    Transit,
    Bicycling,
}

impl TravelMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            TravelMode::Driving => "driving",
            TravelMode::Walking => "walking",
            TravelMode::Transit => "transit",
            TravelMode::Bicycling => "bicycling",
        }
    }
}

impl FromStr for TravelMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "driving" => Ok(TravelMode::Driving),
            "walking" => Ok(TravelMode::Walking),
            "transit" => Ok(TravelMode::Transit),
            "bicycling" => Ok(TravelMode::Bicycling),
            other => Err(format!("unknown travel mode '{}'", other)),
        }
    }
}

/// Which cost the distance matrix encodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizeFor {
    #[default]
    Time,
    Distance,
    Cost,
}

impl OptimizeFor {
    pub const fn as_str(self) -> &'static str {
        match self {
            OptimizeFor::Time => "time",
            OptimizeFor::Distance => "distance",
            OptimizeFor::Cost => "cost",
        }
    }
}

impl FromStr for OptimizeFor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "time" => Ok(OptimizeFor::Time),
            "distance" => Ok(OptimizeFor::Distance),
            "cost" => Ok(OptimizeFor::Cost),
            other => Err(format!("unknown optimization goal '{}'", other)),
        }
    }
}

/// Proposal lifecycle: `Optimized` → `Applied` | `Rejected`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationStatus {
    Optimized,
    Applied,
    Rejected,
}

impl OptimizationStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            OptimizationStatus::Optimized => "optimized",
            OptimizationStatus::Applied => "applied",
            OptimizationStatus::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, OptimizationStatus::Optimized)
    }
}

impl fmt::Display for OptimizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "optimized" => Ok(OptimizationStatus::Optimized),
            "applied" => Ok(OptimizationStatus::Applied),
            "rejected" => Ok(OptimizationStatus::Rejected),
            other => Err(format!("unknown optimization status '{}'", other)),
        }
    }
}

/// Travel between two consecutive stops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelSegment {
    /// Origin location (free text, not an event id)
    pub from: String,
    pub to: String,
    pub distance_km: f64,
    pub duration_minutes: i32,
    /// Encoded polyline, empty when unavailable
    #[serde(default)]
    pub path: String,
}

/// Persisted, reviewable optimization result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationProposal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub original_order: Vec<Uuid>,
    pub optimized_order: Vec<Uuid>,
    /// `optimized_order.len() - 1` legs
    pub segments: Vec<TravelSegment>,
    pub total_distance_km: f64,
    pub total_travel_minutes: i32,
    pub estimated_savings_minutes: i32,
    pub mode: TravelMode,
    pub optimize_for: OptimizeFor,
    pub avoid_tolls: bool,
    pub avoid_highways: bool,
    /// True when any travel figure came from fallback estimates
    pub degraded_estimates: bool,
    pub status: OptimizationStatus,
    pub created_at: DateTime<Utc>,
    pub applied_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
}

/// Request to optimize a day's route
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRouteRequest {
    /// Day to optimize, `YYYY-MM-DD`
    pub date: String,
    /// Explicit event selection; all located events of the day when absent
    #[serde(default)]
    pub event_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub mode: TravelMode,
    #[serde(default)]
    pub optimize_for: OptimizeFor,
    #[serde(default)]
    pub avoid_tolls: bool,
    #[serde(default)]
    pub avoid_highways: bool,
}

/// Request to list optimizations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOptimizationsRequest {
    #[serde(default)]
    pub status: Option<OptimizationStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOptimizationsResponse {
    pub items: Vec<OptimizationProposal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOptimizationResponse {
    pub message: String,
    pub optimization: OptimizationProposal,
    pub rescheduled_events: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectOptimizationResponse {
    pub message: String,
    pub optimization: OptimizationProposal,
}
