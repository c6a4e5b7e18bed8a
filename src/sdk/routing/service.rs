use async_trait::async_trait;
use std::sync::Arc;

use super::error::{RouteError, RoutingError};
use super::route::{Directions, RouteInfo, TravelMode};
use crate::sdk::geo::Coordinate;

#[async_trait]
pub trait RoutingProvider: Send + Sync {
    /// Geocodes a place description to a coordinate.
    async fn geocode(&self, place: &str) -> Result<Coordinate, RoutingError>;

    /// Route between two points for the given travel mode.
    async fn directions(
        &self,
        start: Coordinate,
        end: Coordinate,
        mode: TravelMode,
    ) -> Result<Directions, RoutingError>;
}

/// Single-shot route computation with the error kinds the controller acts on.
#[derive(Clone)]
pub struct RouteService {
    provider: Arc<dyn RoutingProvider>,
}

impl RouteService {
    pub fn new(provider: Arc<dyn RoutingProvider>) -> Self {
        Self { provider }
    }

    pub async fn compute_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TravelMode,
    ) -> Result<RouteInfo, RouteError> {
        if origin == destination {
            log::debug!("Origin and destination are identical, zero-length route");
            return Ok(RouteInfo {
                distance_km: 0.0,
                duration_min: 0.0,
                path: vec![origin, destination],
            });
        }
        log::debug!("Computing {} route {} -> {}", mode, origin, destination);
        let directions = self
            .provider
            .directions(origin, destination, mode)
            .await
            .map_err(|e| {
                log::warn!("Routing {} -> {} failed: {}", origin, destination, e);
                RouteError::classify(e, origin, destination)
            })?;

        if directions.path.is_empty() {
            return Err(RouteError::NoRouteFound {
                origin,
                destination,
            });
        }
        if !directions.distance_m.is_finite() || !directions.duration_s.is_finite() {
            return Err(RouteError::ProviderUnavailable(
                "route summary is not a number".to_string(),
            ));
        }
        Ok(directions.into())
    }

    /// Resolves a place description through the same provider.
    pub async fn resolve_place(&self, place: &str) -> Result<Coordinate, RoutingError> {
        self.provider.geocode(place).await
    }
}
