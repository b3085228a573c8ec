use chrono::{DateTime, Utc};
use geo::{Distance, Haversine, Point};
use serde::Serialize;

/// A validated fix. Coordinates are degrees and always within range.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GeoPoint {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// None means unknown, not perfect
    pub accuracy_meters: Option<f64>,
}

impl GeoPoint {
    pub fn new(timestamp: DateTime<Utc>, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            accuracy_meters: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        valid_lat_lon(self.latitude, self.longitude)
    }

    /// Great-circle distance in meters
    pub fn dist_to(&self, other: &GeoPoint) -> f64 {
        Haversine::distance(
            Point::new(self.longitude, self.latitude),
            Point::new(other.longitude, other.latitude),
        )
    }
}

pub fn valid_lat_lon(lat: f64, lon: f64) -> bool {
    lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon)
}

/// A position in the raster space of the renderer
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ScreenPt {
    pub x: f64,
    pub y: f64,
}

impl ScreenPt {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Bounds {
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = Self {
            min_lat: first.latitude,
            max_lat: first.latitude,
            min_lon: first.longitude,
            max_lon: first.longitude,
        };
        for pt in &points[1..] {
            bounds.min_lat = bounds.min_lat.min(pt.latitude);
            bounds.max_lat = bounds.max_lat.max(pt.latitude);
            bounds.min_lon = bounds.min_lon.min(pt.longitude);
            bounds.max_lon = bounds.max_lon.max(pt.longitude);
        }
        Some(bounds)
    }

    /// (latitude, longitude)
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// Grows each side by `fraction` of the extent. A zero extent (everything at one spot) is
    /// treated as `min_extent` degrees first, so the result always has some area.
    pub fn padded(&self, fraction: f64, min_extent: f64) -> Self {
        let lat_range = (self.max_lat - self.min_lat).max(min_extent);
        let lon_range = (self.max_lon - self.min_lon).max(min_extent);
        let (center_lat, center_lon) = self.center();
        let half_lat = lat_range * (0.5 + fraction);
        let half_lon = lon_range * (0.5 + fraction);
        Self {
            min_lat: (center_lat - half_lat).max(-90.0),
            max_lat: (center_lat + half_lat).min(90.0),
            min_lon: (center_lon - half_lon).max(-180.0),
            max_lon: (center_lon + half_lon).min(180.0),
        }
    }
}
