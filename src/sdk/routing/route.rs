use serde::Serialize;
use std::{fmt, str::FromStr};

use crate::sdk::geo::{BoundingBox, Coordinate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum TravelMode {
    #[default]
    Driving,
    Walking,
    Cycling,
}

impl TravelMode {
    /// The ORS profile name for this mode.
    pub fn profile(&self) -> &'static str {
        match self {
            TravelMode::Driving => "driving-car",
            TravelMode::Walking => "foot-walking",
            TravelMode::Cycling => "cycling-regular",
        }
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TravelMode::Driving => "driving",
            TravelMode::Walking => "walking",
            TravelMode::Cycling => "cycling",
        };
        f.write_str(name)
    }
}

impl FromStr for TravelMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "driving" | "driving-car" | "car" => Ok(TravelMode::Driving),
            "walking" | "foot-walking" | "foot" => Ok(TravelMode::Walking),
            "cycling" | "cycling-regular" | "bike" => Ok(TravelMode::Cycling),
            other => Err(format!("Unknown travel mode: {}", other)),
        }
    }
}

/// Raw provider answer, in the provider's units.
#[derive(Debug, Clone, PartialEq)]
pub struct Directions {
    pub distance_m: f64,
    pub duration_s: f64,
    pub path: Vec<Coordinate>,
}

/// A computed route, replaced wholesale on every computation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteInfo {
    pub distance_km: f64,
    pub duration_min: f64,
    pub path: Vec<Coordinate>,
}

impl From<Directions> for RouteInfo {
    fn from(d: Directions) -> Self {
        Self {
            distance_km: d.distance_m / 1000.0,
            duration_min: d.duration_s / 60.0,
            path: d.path,
        }
    }
}

impl RouteInfo {
    /// Region to fit the whole route in a viewport.
    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::around(&self.path)
    }

    /// Bounds with the edge padding the map surface uses (1/20 of the span).
    pub fn viewport(&self) -> Option<BoundingBox> {
        self.bounds().map(|b| b.padded(0.05))
    }
}
