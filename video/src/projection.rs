use std::f64::consts::PI;

use model::{Bounds, Projection, ScreenPt, Trajectory};

const TILE_SIZE: f64 = 256.0;
/// Web Mercator is undefined at the poles
const MAX_LATITUDE: f64 = 85.051_128_78;
const MARGIN: f64 = 0.1;
/// In degrees, so a trajectory that never moves still gets a sensible view
const MIN_EXTENT: f64 = 0.001;

/// Web Mercator, scaled and translated so some bounds fill a canvas. The scale is expressed as a
/// (usually fractional) slippy-map zoom level over 256-pixel tiles.
#[derive(Clone, Debug, PartialEq)]
pub struct WebMercator {
    zoom_level: f64,
    /// World pixel at the canvas origin
    origin_x: f64,
    origin_y: f64,
}

impl WebMercator {
    /// Fits the trajectory, plus a margin, onto a `width` by `height` canvas. `zoom` above 1
    /// shrinks the margin and zooms in past the path's extent.
    pub fn fit(trajectory: &Trajectory, width: u32, height: u32, zoom: f64) -> Self {
        let bounds = trajectory.bounds().unwrap_or(Bounds {
            min_lat: 0.0,
            max_lat: 0.0,
            min_lon: 0.0,
            max_lon: 0.0,
        });
        Self::fit_bounds(&bounds, width, height, zoom)
    }

    pub fn fit_bounds(bounds: &Bounds, width: u32, height: u32, zoom: f64) -> Self {
        let padded = bounds.padded(MARGIN / zoom, MIN_EXTENT / zoom);

        // Unit Mercator coordinates; y grows southward
        let (x1, y1) = unit(padded.max_lat, padded.min_lon);
        let (x2, y2) = unit(padded.min_lat, padded.max_lon);
        let span_x = (x2 - x1).max(f64::EPSILON);
        let span_y = (y2 - y1).max(f64::EPSILON);

        let world_size = (width as f64 / span_x).min(height as f64 / span_y);
        let zoom_level = (world_size / TILE_SIZE).log2();

        let center_x = (x1 + x2) / 2.0 * world_size;
        let center_y = (y1 + y2) / 2.0 * world_size;
        Self {
            zoom_level,
            origin_x: center_x - width as f64 / 2.0,
            origin_y: center_y - height as f64 / 2.0,
        }
    }

    pub fn zoom_level(&self) -> f64 {
        self.zoom_level
    }

    fn world_size(&self) -> f64 {
        TILE_SIZE * self.zoom_level.exp2()
    }
}

impl Projection for WebMercator {
    fn project(&self, latitude: f64, longitude: f64) -> ScreenPt {
        let (x, y) = unit(latitude, longitude);
        let size = self.world_size();
        ScreenPt::new(x * size - self.origin_x, y * size - self.origin_y)
    }
}

/// Both in [0, 1], from the northwest corner
fn unit(latitude: f64, longitude: f64) -> (f64, f64) {
    let lat = latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (longitude + 180.0) / 360.0;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0;
    (x, y)
}
