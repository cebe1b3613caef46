//! Geographic inclusion predicates for narrowing a station catalog.

use haversine::{distance, Location as HaversineLocation, Units};

/// A geographic area that can decide whether a point lies inside it.
///
/// Coordinates are decimal degrees, latitude in `[-90, 90]` and longitude in
/// `[-180, 180]`.
pub trait Region {
    fn contains(&self, latitude: f64, longitude: f64) -> bool;
}

impl<F: Fn(f64, f64) -> bool> Region for F {
    fn contains(&self, latitude: f64, longitude: f64) -> bool {
        self(latitude, longitude)
    }
}

/// A latitude/longitude box; bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Region for BoundingBox {
    fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.min_lat
            && latitude <= self.max_lat
            && longitude >= self.min_lon
            && longitude <= self.max_lon
    }
}

/// All points within `radius_km` (great-circle distance) of a center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Radius {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
}

impl Radius {
    /// Great-circle distance from the center in kilometers.
    pub fn distance_km(&self, latitude: f64, longitude: f64) -> f64 {
        distance(
            HaversineLocation {
                latitude: self.latitude,
                longitude: self.longitude,
            },
            HaversineLocation {
                latitude,
                longitude,
            },
            Units::Kilometers,
        )
    }
}

impl Region for Radius {
    fn contains(&self, latitude: f64, longitude: f64) -> bool {
        self.distance_km(latitude, longitude) <= self.radius_km
    }
}

/// A simple polygon given by its vertices as `(latitude, longitude)` pairs.
///
/// The ring is closed implicitly. Containment uses the even-odd rule in plain
/// lat/lon space, so polygons crossing the antimeridian must be split.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    vertices: Vec<(f64, f64)>,
}

impl Polygon {
    /// Returns `None` for fewer than three vertices.
    pub fn new(vertices: Vec<(f64, f64)>) -> Option<Self> {
        (vertices.len() >= 3).then_some(Self { vertices })
    }

    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }
}

impl Region for Polygon {
    fn contains(&self, latitude: f64, longitude: f64) -> bool {
        let n = self.vertices.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (lat_i, lon_i) = self.vertices[i];
            let (lat_j, lon_j) = self.vertices[j];
            if (lat_i > latitude) != (lat_j > latitude) {
                let crossing = lon_i + (latitude - lat_i) / (lat_j - lat_i) * (lon_j - lon_i);
                if longitude < crossing {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}
