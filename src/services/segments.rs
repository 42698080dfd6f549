//! Segment resolution: ordered locations → consecutive travel segments.
//!
//! Each leg is resolved independently. A failed or unroutable leg gets a
//! fallback segment; it never aborts the whole resolution.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::services::routing::{FallbackSource, MapsProvider, ProviderLeg, RouteOptions};
use crate::types::TravelSegment;

/// Resolved segments plus how many legs used fallback values
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentResolution {
    pub segments: Vec<TravelSegment>,
    pub fallback_legs: usize,
}

impl SegmentResolution {
    pub fn degraded(&self) -> bool {
        self.fallback_legs > 0
    }

    pub fn total_distance_km(&self) -> f64 {
        self.segments.iter().map(|s| s.distance_km).sum()
    }

    pub fn total_minutes(&self) -> i32 {
        self.segments.iter().map(|s| s.duration_minutes).sum()
    }
}

fn live_segment(from: &str, to: &str, leg: ProviderLeg) -> TravelSegment {
    TravelSegment {
        from: from.to_string(),
        to: to.to_string(),
        distance_km: (leg.distance_meters / 1000.0).max(0.0),
        duration_minutes: (leg.duration_seconds / 60.0).ceil().max(0.0) as i32,
        path: leg.polyline,
    }
}

/// Segment resolver with live/fallback duality
pub struct SegmentResolver {
    provider: Option<Arc<dyn MapsProvider>>,
    fallback: Arc<dyn FallbackSource>,
    call_timeout: Duration,
}

impl SegmentResolver {
    pub fn new(
        provider: Option<Arc<dyn MapsProvider>>,
        fallback: Arc<dyn FallbackSource>,
        call_timeout: Duration,
    ) -> Self {
        Self { provider, fallback, call_timeout }
    }

    fn fallback_segment(&self, from: &str, to: &str) -> TravelSegment {
        let leg = self.fallback.segment(from, to);
        TravelSegment {
            from: from.to_string(),
            to: to.to_string(),
            distance_km: leg.distance_km,
            duration_minutes: leg.duration_minutes,
            path: String::new(),
        }
    }

    /// Resolve `locations.len() - 1` segments, in order
    pub async fn resolve(&self, locations: &[String], options: &RouteOptions) -> SegmentResolution {
        let mut segments = Vec::with_capacity(locations.len().saturating_sub(1));
        let mut fallback_legs = 0;

        for pair in locations.windows(2) {
            let (from, to) = (pair[0].as_str(), pair[1].as_str());
            match self.resolve_leg(from, to, options).await {
                Some(segment) => segments.push(segment),
                None => {
                    fallback_legs += 1;
                    segments.push(self.fallback_segment(from, to));
                }
            }
        }

        if fallback_legs > 0 {
            debug!("{} of {} segments used fallback values", fallback_legs, segments.len());
        }

        SegmentResolution { segments, fallback_legs }
    }

    async fn resolve_leg(&self, from: &str, to: &str, options: &RouteOptions) -> Option<TravelSegment> {
        let provider = self.provider.as_ref()?;

        match tokio::time::timeout(self.call_timeout, provider.directions(from, to, options)).await {
            Ok(Ok(Some(leg))) => Some(live_segment(from, to, leg)),
            Ok(Ok(None)) => {
                warn!("{} found no route {} -> {}, using fallback segment", provider.name(), from, to);
                None
            }
            Ok(Err(e)) => {
                warn!("{} directions {} -> {} failed: {:#}. Using fallback segment.", provider.name(), from, to, e);
                None
            }
            Err(_) => {
                warn!(
                    "{} directions {} -> {} timed out after {:?}. Using fallback segment.",
                    provider.name(), from, to, self.call_timeout
                );
                None
            }
        }
    }
}
