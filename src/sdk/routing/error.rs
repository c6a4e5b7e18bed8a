use serde::Deserialize;
use thiserror::Error;

use crate::sdk::geo::{Coordinate, CoordinateError};

/// Body of an ORS error response: `{"error": {"code": .., "message": ..}}`.
#[derive(Deserialize, Debug)]
pub struct OrsErrorPayload {
    pub error: OrsErrorDetail,
}

#[derive(Deserialize, Debug)]
pub struct OrsErrorDetail {
    pub code: u32,
    #[serde(default)]
    pub message: String,
}

/// ORS code for "could not find routable point within radius".
pub const ORS_UNROUTABLE_POINT: u32 = 2010;
/// ORS code for "route could not be found between points".
pub const ORS_ROUTE_NOT_FOUND: u32 = 2009;
/// ORS code for "request exceeds a server limit" (e.g. maximum distance).
pub const ORS_LIMIT_EXCEEDED: u32 = 2004;
/// ORS code for "parameter value invalid".
pub const ORS_INVALID_PARAMETER: u32 = 2003;

/// Failure of a single call into a routing or geocoding provider.
#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("Point is not on the routable road network")]
    UnroutablePoint,

    #[error("No geocode results for {0:?}")]
    PlaceNotFound(String),

    /// ORS answered with its structured `error` object.
    #[error("ORS error {code}: {message}")]
    ApiError { code: u32, message: String },

    /// Non-success status whose body is not an ORS error object.
    #[error("Provider returned {0}")]
    RawApiError(String),

    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Response is not valid JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Provider returned an invalid coordinate: {0}")]
    BadCoordinate(#[from] CoordinateError),

    #[error("Unexpected response shape: {0}")]
    UnexpectedResponse(String),
}

/// Outcome of a route computation as seen by the navigation controller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouteError {
    #[error("No route found from {origin} to {destination}")]
    NoRouteFound {
        origin: Coordinate,
        destination: Coordinate,
    },

    #[error("Routing provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
}

impl RouteError {
    pub fn classify(err: RoutingError, origin: Coordinate, destination: Coordinate) -> Self {
        match err {
            RoutingError::UnroutablePoint => RouteError::NoRouteFound {
                origin,
                destination,
            },
            RoutingError::ApiError { code, .. }
                if matches!(
                    code,
                    ORS_UNROUTABLE_POINT | ORS_ROUTE_NOT_FOUND | ORS_LIMIT_EXCEEDED
                ) =>
            {
                RouteError::NoRouteFound {
                    origin,
                    destination,
                }
            }
            RoutingError::ApiError { code, message } if code == ORS_INVALID_PARAMETER => {
                RouteError::InvalidCoordinates(message)
            }
            RoutingError::BadCoordinate(e) => RouteError::InvalidCoordinates(e.to_string()),
            other => RouteError::ProviderUnavailable(other.to_string()),
        }
    }
}
