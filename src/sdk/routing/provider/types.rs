//! Response bodies of the Pelias geocoder and the ORS GeoJSON directions endpoint.

use serde::Deserialize;

#[derive(Deserialize)]
pub struct GeoResponse {
    pub features: Vec<Feature>,
}
#[derive(Deserialize)]
pub struct Feature {
    pub geometry: Geometry,
}
#[derive(Deserialize)]
pub struct Geometry {
    pub coordinates: [f64; 2],
}

/// Body of `/v2/directions/{profile}/geojson`.
#[derive(Deserialize)]
pub struct DirectionsResponse {
    pub features: Vec<RouteFeature>,
}
#[derive(Deserialize)]
pub struct RouteFeature {
    pub geometry: LineGeometry,
    pub properties: RouteProperties,
}
#[derive(Deserialize)]
pub struct LineGeometry {
    pub coordinates: Vec<[f64; 2]>,
}
#[derive(Deserialize)]
pub struct RouteProperties {
    pub summary: DirectionsSummary,
}
// ORS leaves out zero-valued summary fields.
#[derive(Deserialize, Clone, Copy, Default)]
pub struct DirectionsSummary {
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub duration: f64,
}
