//! Maps provider abstraction for travel matrices and directions
//!
//! Uses a Google-Maps-compatible HTTP API in production. When no API key is
//! configured there is no provider at all and callers fall back to
//! synthetic estimates (see `fallback`).

mod fallback;
mod google;

pub use fallback::{
    FallbackLeg, FallbackSource, FixedFallback, RandomFallback, FALLBACK_BAND_MINUTES,
    FALLBACK_SEGMENT_DISTANCE_KM, FALLBACK_SEGMENT_DURATION_MINUTES,
};
pub use google::{GoogleMapsClient, MapsConfig};

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::types::TravelMode;

/// Routing preferences passed through to the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteOptions {
    pub mode: TravelMode,
    pub avoid_tolls: bool,
    pub avoid_highways: bool,
}

impl RouteOptions {
    /// Value for the provider's `avoid` parameter, if any
    pub fn avoid_param(&self) -> Option<String> {
        let mut avoid = Vec::new();
        if self.avoid_tolls {
            avoid.push("tolls");
        }
        if self.avoid_highways {
            avoid.push("highways");
        }
        if avoid.is_empty() {
            None
        } else {
            Some(avoid.join("|"))
        }
    }
}

/// One origin/destination cell as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderCell {
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

/// Raw provider matrix; `None` where the provider had no route
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderMatrix {
    pub cells: Vec<Vec<Option<ProviderCell>>>,
    pub size: usize,
}

impl ProviderMatrix {
    pub fn cell(&self, from: usize, to: usize) -> Option<ProviderCell> {
        self.cells.get(from).and_then(|row| row.get(to)).copied().flatten()
    }
}

/// First leg of the first route returned for an origin/destination pair
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderLeg {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    /// Encoded polyline of the route overview
    pub polyline: String,
}

/// Maps provider trait for abstraction (Google Maps, test doubles)
#[async_trait]
pub trait MapsProvider: Send + Sync {
    /// One matrix request covering all `locations` as origins and destinations
    async fn distance_matrix(&self, locations: &[String], options: &RouteOptions) -> Result<ProviderMatrix>;

    /// Directions between two locations; `Ok(None)` when no route exists
    async fn directions(&self, from: &str, to: &str, options: &RouteOptions) -> Result<Option<ProviderLeg>>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Create the maps provider from configuration.
///
/// A missing API key is not an error: the engine then runs in fallback mode
/// for every request.
pub fn create_maps_provider(config: Option<MapsConfig>) -> Option<Arc<dyn MapsProvider>> {
    let Some(config) = config else {
        info!("Maps API key not configured, travel estimates will use fallback values");
        return None;
    };

    match GoogleMapsClient::new(config) {
        Ok(client) => {
            info!("Maps provider initialized: {}", client.name());
            Some(Arc::new(client))
        }
        Err(e) => {
            warn!("Failed to initialize maps provider: {:#}. Falling back to estimates.", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avoid_param_none_by_default() {
        assert_eq!(RouteOptions::default().avoid_param(), None);
    }

    #[test]
    fn test_avoid_param_combines_flags() {
        let options = RouteOptions {
            mode: TravelMode::Driving,
            avoid_tolls: true,
            avoid_highways: true,
        };
        assert_eq!(options.avoid_param().as_deref(), Some("tolls|highways"));

        let options = RouteOptions { avoid_tolls: false, ..options };
        assert_eq!(options.avoid_param().as_deref(), Some("highways"));
    }

    #[test]
    fn test_provider_matrix_cell_out_of_range_is_none() {
        let matrix = ProviderMatrix {
            cells: vec![vec![None, Some(ProviderCell { distance_meters: 1000.0, duration_seconds: 60.0 })]],
            size: 1,
        };
        assert!(matrix.cell(0, 0).is_none());
        assert!(matrix.cell(0, 1).is_some());
        assert!(matrix.cell(3, 0).is_none());
    }

    #[test]
    fn test_create_maps_provider_without_key() {
        assert!(create_maps_provider(None).is_none());
    }

    #[test]
    fn test_create_maps_provider_with_key() {
        let provider = create_maps_provider(Some(MapsConfig::new("test-key"))).unwrap();
        assert_eq!(provider.name(), "GoogleMaps");
    }
}
