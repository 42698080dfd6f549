//! Google Maps compatible client
//!
//! Distance Matrix API: https://developers.google.com/maps/documentation/distance-matrix
//! Directions API: https://developers.google.com/maps/documentation/directions

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{MapsProvider, ProviderCell, ProviderLeg, ProviderMatrix, RouteOptions};

/// Maps client configuration
#[derive(Debug, Clone)]
pub struct MapsConfig {
    /// API root, e.g. "https://maps.googleapis.com/maps/api"
    pub base_url: String,
    pub api_key: String,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
}

impl MapsConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://maps.googleapis.com/maps/api";
    pub const DEFAULT_TIMEOUT_SECONDS: u64 = 5;

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            timeout_seconds: Self::DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

/// Maps HTTP client
pub struct GoogleMapsClient {
    client: Client,
    config: MapsConfig,
}

impl GoogleMapsClient {
    pub fn new(config: MapsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    fn matrix_query(&self, locations: &[String], options: &RouteOptions) -> Vec<(&'static str, String)> {
        let joined = locations.join("|");
        let mut query = vec![
            ("origins", joined.clone()),
            ("destinations", joined),
            ("mode", options.mode.as_str().to_string()),
        ];
        if let Some(avoid) = options.avoid_param() {
            query.push(("avoid", avoid));
        }
        query.push(("key", self.config.api_key.clone()));
        query
    }

    fn directions_query(&self, from: &str, to: &str, options: &RouteOptions) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("origin", from.to_string()),
            ("destination", to.to_string()),
            ("mode", options.mode.as_str().to_string()),
        ];
        if let Some(avoid) = options.avoid_param() {
            query.push(("avoid", avoid));
        }
        query.push(("key", self.config.api_key.clone()));
        query
    }
}

#[async_trait]
impl MapsProvider for GoogleMapsClient {
    async fn distance_matrix(&self, locations: &[String], options: &RouteOptions) -> Result<ProviderMatrix> {
        let n = locations.len();
        if n == 0 {
            return Ok(ProviderMatrix { cells: vec![], size: 0 });
        }

        let url = format!("{}/distancematrix/json", self.config.base_url);
        debug!("Requesting distance matrix for {} locations", n);

        let response = self.client
            .get(&url)
            .query(&self.matrix_query(locations, options))
            .send()
            .await
            .map_err(|e| e.without_url())
            .context("Failed to send distance matrix request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Distance matrix returned error {}: {}", status, body);
        }

        let matrix_response: DistanceMatrixResponse = response
            .json()
            .await
            .map_err(|e| e.without_url())
            .context("Failed to parse distance matrix response")?;

        matrix_response.into_matrix(n)
    }

    async fn directions(&self, from: &str, to: &str, options: &RouteOptions) -> Result<Option<ProviderLeg>> {
        let url = format!("{}/directions/json", self.config.base_url);
        debug!("Requesting directions {} -> {}", from, to);

        let response = self.client
            .get(&url)
            .query(&self.directions_query(from, to, options))
            .send()
            .await
            .map_err(|e| e.without_url())
            .context("Failed to send directions request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Directions returned error {}: {}", status, body);
        }

        let directions: DirectionsResponse = response
            .json()
            .await
            .map_err(|e| e.without_url())
            .context("Failed to parse directions response")?;

        directions.into_first_leg()
    }

    fn name(&self) -> &str {
        "GoogleMaps"
    }
}

// Provider API types

#[derive(Debug, Deserialize)]
struct ValueField {
    value: f64,
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    /// Meters
    #[serde(default)]
    distance: Option<ValueField>,
    /// Seconds
    #[serde(default)]
    duration: Option<ValueField>,
}

impl DistanceMatrixResponse {
    fn into_matrix(self, n: usize) -> Result<ProviderMatrix> {
        if self.status != "OK" {
            anyhow::bail!(
                "Distance matrix status {}: {}",
                self.status,
                self.error_message.unwrap_or_default()
            );
        }
        if self.rows.len() != n {
            anyhow::bail!("Distance matrix returned {} rows, expected {}", self.rows.len(), n);
        }

        let mut cells = Vec::with_capacity(n);
        for (i, row) in self.rows.into_iter().enumerate() {
            if row.elements.len() != n {
                anyhow::bail!(
                    "Distance matrix row {} has {} elements, expected {}",
                    i, row.elements.len(), n
                );
            }
            let converted = row.elements
                .into_iter()
                .enumerate()
                .map(|(j, element)| match (element.status.as_str(), element.distance, element.duration) {
                    ("OK", Some(distance), Some(duration)) => Some(ProviderCell {
                        distance_meters: distance.value,
                        duration_seconds: duration.value,
                    }),
                    _ => {
                        if i != j {
                            warn!("No route for matrix cell {} -> {} ({})", i, j, element.status);
                        }
                        None
                    }
                })
                .collect();
            cells.push(converted);
        }

        Ok(ProviderMatrix { cells, size: n })
    }
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    legs: Vec<DirectionsLeg>,
    #[serde(default)]
    overview_polyline: Option<OverviewPolyline>,
}

#[derive(Debug, Deserialize)]
struct DirectionsLeg {
    distance: ValueField,
    duration: ValueField,
}

#[derive(Debug, Deserialize)]
struct OverviewPolyline {
    points: String,
}

impl DirectionsResponse {
    fn into_first_leg(self) -> Result<Option<ProviderLeg>> {
        match self.status.as_str() {
            "OK" => {}
            "ZERO_RESULTS" => return Ok(None),
            other => anyhow::bail!(
                "Directions status {}: {}",
                other,
                self.error_message.unwrap_or_default()
            ),
        }

        let Some(route) = self.routes.into_iter().next() else {
            return Ok(None);
        };
        let polyline = route.overview_polyline.map(|p| p.points).unwrap_or_default();

        Ok(route.legs.into_iter().next().map(|leg| ProviderLeg {
            distance_meters: leg.distance.value,
            duration_seconds: leg.duration.value,
            polyline,
        }))
    }
}
