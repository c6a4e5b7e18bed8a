use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinateError {
    #[error("Expected \"lat,lon\" but got {0:?}")]
    Malformed(String),

    #[error("Not a number: {0:?}")]
    NotANumber(String),

    #[error("Latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("Longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
}

/// A WGS84 position. Always finite and within range once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate", into = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Serialize, Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = CoordinateError;
    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.latitude, raw.longitude)
    }
}

impl From<Coordinate> for RawCoordinate {
    fn from(c: Coordinate) -> Self {
        RawCoordinate {
            latitude: c.latitude,
            longitude: c.longitude,
        }
    }
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::LatitudeOutOfRange(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Builds a coordinate from an ORS style `[lon, lat]` pair.
    pub fn from_lon_lat(pair: [f64; 2]) -> Result<Self, CoordinateError> {
        Self::new(pair[1], pair[0])
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn to_lon_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }

    /// Linear interpolation toward `other`, `t` clamped to [0, 1].
    ///
    /// Longitude takes the short way round, so a marker crossing the
    /// antimeridian does not sweep across the whole map.
    pub fn lerp(&self, other: &Coordinate, t: f64) -> Coordinate {
        let t = t.clamp(0.0, 1.0);
        if t >= 1.0 {
            return *other;
        }
        let mut dlon = other.longitude - self.longitude;
        if dlon > 180.0 {
            dlon -= 360.0;
        } else if dlon < -180.0 {
            dlon += 360.0;
        }
        let mut lon = self.longitude + dlon * t;
        if lon > 180.0 {
            lon -= 360.0;
        } else if lon < -180.0 {
            lon += 360.0;
        }
        Coordinate {
            latitude: self.latitude + (other.latitude - self.latitude) * t,
            longitude: lon,
        }
    }

    /// Initial great-circle bearing toward `other`, in degrees [0, 360).
    pub fn bearing_to(&self, other: &Coordinate) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let dlon = (other.longitude - self.longitude).to_radians();
        let y = dlon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
        normalize_degrees(y.atan2(x).to_degrees())
    }
}

/// Wraps into [0, 360). `rem_euclid` rounds tiny negatives up to 360.0.
fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// Strict `"lat,lon"` parsing: exactly two comma separated decimal numbers,
/// surrounding whitespace allowed.
impl FromStr for Coordinate {
    type Err = CoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
            return Err(CoordinateError::Malformed(s.to_string()));
        }
        let parse = |p: &str| -> Result<f64, CoordinateError> {
            let value: f64 = p
                .parse()
                .map_err(|_| CoordinateError::NotANumber(p.to_string()))?;
            if value.is_finite() {
                Ok(value)
            } else {
                Err(CoordinateError::NotANumber(p.to_string()))
            }
        };
        Coordinate::new(parse(parts[0])?, parse(parts[1])?)
    }
}

/// Direction of travel reported with a fix.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Heading {
    Degrees(f64),
    #[default]
    Unknown,
}

impl Heading {
    /// Normalises into [0, 360). Non-finite input is `Unknown`.
    pub fn from_degrees(degrees: f64) -> Self {
        if degrees.is_finite() {
            Heading::Degrees(normalize_degrees(degrees))
        } else {
            Heading::Unknown
        }
    }

    /// Location providers report a missing heading as absent or negative.
    pub fn from_provider(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() && v >= 0.0 => Heading::from_degrees(v),
            _ => Heading::Unknown,
        }
    }

    pub fn degrees(&self) -> Option<f64> {
        match self {
            Heading::Degrees(d) => Some(*d),
            Heading::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn around<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Coordinate>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = BoundingBox {
            south: first.latitude,
            west: first.longitude,
            north: first.latitude,
            east: first.longitude,
        };
        for c in iter {
            bbox.south = bbox.south.min(c.latitude);
            bbox.north = bbox.north.max(c.latitude);
            bbox.west = bbox.west.min(c.longitude);
            bbox.east = bbox.east.max(c.longitude);
        }
        Some(bbox)
    }

    /// Grows each edge by `fraction` of the box span, clamped to valid range.
    pub fn padded(&self, fraction: f64) -> Self {
        let dlat = (self.north - self.south) * fraction;
        let dlon = (self.east - self.west) * fraction;
        BoundingBox {
            south: (self.south - dlat).max(-90.0),
            west: (self.west - dlon).max(-180.0),
            north: (self.north + dlat).min(90.0),
            east: (self.east + dlon).min(180.0),
        }
    }

    pub fn center(&self) -> Coordinate {
        Coordinate {
            latitude: (self.south + self.north) / 2.0,
            longitude: (self.west + self.east) / 2.0,
        }
    }
}
