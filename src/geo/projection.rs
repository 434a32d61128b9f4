//! Map projection and coordinate transformation.
//!
//! Spherical Mercator with an explicit scale, geographic center and pixel
//! translate. Each map instance owns its own projection; nothing here is
//! global.

use geo_types::Coord;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_4;

/// Latitude limit of the Mercator projection in degrees.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Mercator projection state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapProjection {
    /// Pixels per radian
    pub scale: f64,
    /// Geographic point (lon, lat in degrees) mapped to `translate`
    pub center: Coord<f64>,
    /// Pixel position of `center`
    pub translate: Coord<f64>,
}

impl Default for MapProjection {
    fn default() -> Self {
        Self {
            scale: 1.0,
            center: Coord { x: 0.0, y: 0.0 },
            translate: Coord { x: 480.0, y: 250.0 },
        }
    }
}

impl MapProjection {
    /// Creates a projection with the given scale, center and translate.
    pub fn new(scale: f64, center: Coord<f64>, translate: Coord<f64>) -> Self {
        Self {
            scale,
            center,
            translate,
        }
    }

    /// Unscaled Mercator coordinates (radians) of a lon/lat position.
    ///
    /// Y grows northwards; latitudes are clamped to [`MAX_LATITUDE`].
    pub fn raw(coord: Coord<f64>) -> Coord<f64> {
        let lat = coord.y.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        Coord {
            x: coord.x.to_radians(),
            y: (FRAC_PI_4 + lat / 2.0).tan().ln(),
        }
    }

    /// Inverse of [`raw`](Self::raw).
    pub fn raw_inverse(raw: Coord<f64>) -> Coord<f64> {
        Coord {
            x: raw.x.to_degrees(),
            y: (2.0 * raw.y.exp().atan() - 2.0 * FRAC_PI_4).to_degrees(),
        }
    }

    /// Converts geographic coordinates (lon, lat) to a canvas position.
    ///
    /// Canvas Y grows downwards.
    pub fn geo_to_screen(&self, coord: Coord<f64>) -> Coord<f64> {
        let point = Self::raw(coord);
        let center = Self::raw(self.center);
        Coord {
            x: self.translate.x + self.scale * (point.x - center.x),
            y: self.translate.y - self.scale * (point.y - center.y),
        }
    }

    /// Converts a canvas position back to geographic coordinates (lon, lat).
    pub fn screen_to_geo(&self, pos: Coord<f64>) -> Coord<f64> {
        let center = Self::raw(self.center);
        Self::raw_inverse(Coord {
            x: center.x + (pos.x - self.translate.x) / self.scale,
            y: center.y - (pos.y - self.translate.y) / self.scale,
        })
    }

    /// Returns the visible geographic bounds of a `width` x `height` canvas
    /// as (min_lon, min_lat, max_lon, max_lat).
    pub fn visible_bounds(&self, width: f64, height: f64) -> (f64, f64, f64, f64) {
        let top_left = self.screen_to_geo(Coord { x: 0.0, y: 0.0 });
        let bottom_right = self.screen_to_geo(Coord {
            x: width,
            y: height,
        });

        (
            top_left.x.min(bottom_right.x),
            top_left.y.min(bottom_right.y),
            top_left.x.max(bottom_right.x),
            top_left.y.max(bottom_right.y),
        )
    }
}
