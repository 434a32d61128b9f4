//! Fitting the projection to the extent of loaded geometry.

use super::feature::FeatureRef;
use super::projection::MapProjection;
use crate::config::{CanvasSize, ExtentOptions, FocalCenter};
use crate::error::{MapError, MapResult};
use geo_types::{Coord, Geometry, Polygon};

/// Axis-aligned bounding box accumulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Coord<f64>,
    pub max: Coord<f64>,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: Coord {
                x: f64::INFINITY,
                y: f64::INFINITY,
            },
            max: Coord {
                x: f64::NEG_INFINITY,
                y: f64::NEG_INFINITY,
            },
        }
    }
}

impl Bounds {
    pub fn extend(&mut self, coord: Coord<f64>) {
        self.min.x = self.min.x.min(coord.x);
        self.min.y = self.min.y.min(coord.y);
        self.max.x = self.max.x.max(coord.x);
        self.max.y = self.max.y.max(coord.y);
    }

    /// Returns true if no coordinate was added.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Coord<f64> {
        Coord {
            x: (self.min.x + self.max.x) / 2.0,
            y: (self.min.y + self.max.y) / 2.0,
        }
    }
}

/// Calls `f` for every coordinate of `geometry`.
pub fn for_each_coord(geometry: &Geometry<f64>, f: &mut impl FnMut(Coord<f64>)) {
    match geometry {
        Geometry::Point(p) => f(p.0),
        Geometry::Line(l) => {
            f(l.start);
            f(l.end);
        }
        Geometry::LineString(ls) => ls.0.iter().copied().for_each(&mut *f),
        Geometry::Polygon(p) => polygon_coords(p, f),
        Geometry::MultiPoint(mp) => mp.0.iter().for_each(|p| f(p.0)),
        Geometry::MultiLineString(mls) => {
            for ls in &mls.0 {
                ls.0.iter().copied().for_each(&mut *f);
            }
        }
        Geometry::MultiPolygon(mp) => {
            for p in &mp.0 {
                polygon_coords(p, f);
            }
        }
        Geometry::GeometryCollection(gc) => {
            for g in &gc.0 {
                for_each_coord(g, f);
            }
        }
        Geometry::Rect(r) => {
            f(r.min());
            f(r.max());
        }
        Geometry::Triangle(t) => t.to_array().into_iter().for_each(&mut *f),
    }
}

fn polygon_coords(polygon: &Polygon<f64>, f: &mut impl FnMut(Coord<f64>)) {
    polygon.exterior().0.iter().copied().for_each(&mut *f);
    for ring in polygon.interiors() {
        ring.0.iter().copied().for_each(&mut *f);
    }
}

/// Scale that fits a `width` x `height` box (in unit-scale projected
/// units) into `canvas`, filling `fill` of it.
///
/// The focal center bias tightens the fit as the focal point moves towards
/// an edge, so off-center geometry is not clipped on the near side.
pub fn fit_scale(
    width: f64,
    height: f64,
    canvas: CanvasSize,
    focal_center: FocalCenter,
    fill: f64,
) -> f64 {
    let (bias_x, bias_y) = focal_center.bias();
    fill / f64::max(
        width / canvas.width / bias_x,
        height / canvas.height / bias_y,
    )
}

/// Fits `projection` to the union of the features' geometry.
///
/// Center becomes the midpoint of the geographic bounding box, translate the
/// canvas center. On error the projection is left unchanged.
pub fn compute_extent(
    features: &[FeatureRef],
    canvas: CanvasSize,
    focal_center: FocalCenter,
    options: ExtentOptions,
    projection: &mut MapProjection,
) -> MapResult<()> {
    let neutral = MapProjection {
        scale: 1.0,
        ..*projection
    };
    let mut projected = Bounds::default();
    let mut geographic = Bounds::default();

    for feature in features {
        let feature = feature.borrow();
        if let Some(geometry) = &feature.geometry {
            for_each_coord(geometry, &mut |coord| {
                projected.extend(neutral.geo_to_screen(coord));
                geographic.extend(coord);
            });
        }
    }

    if geographic.is_empty() {
        return Err(MapError::DegenerateExtent(format!(
            "none of {} features has coordinates",
            features.len()
        )));
    }

    let scale = fit_scale(
        projected.width(),
        projected.height(),
        canvas,
        focal_center,
        options.fill,
    );
    if !scale.is_finite() || scale <= 0.0 {
        return Err(MapError::DegenerateExtent(format!(
            "cannot fit {}x{} into {}x{} canvas",
            projected.width(),
            projected.height(),
            canvas.width,
            canvas.height
        )));
    }

    *projection = MapProjection::new(
        scale,
        geographic.center(),
        Coord {
            x: canvas.width / 2.0,
            y: canvas.height / 2.0,
        },
    );
    log::info!(
        "Fitted extent of {} features: scale {:.3}, center ({:.4}, {:.4})",
        features.len(),
        projection.scale,
        projection.center.x,
        projection.center.y
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Feature;
    use geo_types::{point, polygon};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_fit_scale_centered() {
        let scale = fit_scale(
            200.0,
            100.0,
            CanvasSize::new(800.0, 400.0),
            FocalCenter::default(),
            0.95,
        );
        assert!(close(scale, 3.8));
    }

    #[test]
    fn test_fit_scale_off_center_is_tighter() {
        let scale = fit_scale(
            200.0,
            100.0,
            CanvasSize::new(800.0, 400.0),
            FocalCenter::new(0.25, 0.5),
            0.95,
        );
        assert!(close(scale, 1.9));
    }

    #[test]
    fn test_compute_extent_fits_canvas() {
        let features = vec![
            Feature::new(
                Some(Geometry::Polygon(polygon![
                    (x: 9.5, y: 46.4),
                    (x: 19.5, y: 46.4),
                    (x: 19.5, y: 49.0),
                    (x: 9.5, y: 49.0),
                    (x: 9.5, y: 46.4),
                ])),
                Default::default(),
            )
            .into_ref(),
            Feature::default().into_ref(),
        ];
        let canvas = CanvasSize::new(800.0, 400.0);
        let mut projection = MapProjection::default();

        compute_extent(
            &features,
            canvas,
            FocalCenter::default(),
            ExtentOptions::default(),
            &mut projection,
        )
        .unwrap();

        assert!(close(projection.center.x, 14.5));
        assert!(close(projection.center.y, 47.7));
        assert_eq!(projection.translate, Coord { x: 400.0, y: 200.0 });

        let west = projection.geo_to_screen(Coord { x: 9.5, y: 47.7 });
        let east = projection.geo_to_screen(Coord { x: 19.5, y: 47.7 });
        let north = projection.geo_to_screen(Coord { x: 14.5, y: 49.0 });
        let south = projection.geo_to_screen(Coord { x: 14.5, y: 46.4 });
        let width = east.x - west.x;
        let height = south.y - north.y;
        // Wide region: the horizontal axis binds
        assert!((width - 0.95 * 800.0).abs() < 1e-6);
        assert!(height < 0.95 * 400.0);
    }

    #[test]
    fn test_compute_extent_without_coordinates_fails() {
        let features = vec![Feature::default().into_ref()];
        let mut projection = MapProjection::default();
        let before = projection;
        let result = compute_extent(
            &features,
            CanvasSize::default(),
            FocalCenter::default(),
            ExtentOptions::default(),
            &mut projection,
        );
        assert!(matches!(result, Err(MapError::DegenerateExtent(_))));
        assert_eq!(projection, before);
    }

    #[test]
    fn test_compute_extent_single_point_fails() {
        let features = vec![Feature::new(
            Some(Geometry::Point(point!(x: 1.0, y: 2.0))),
            Default::default(),
        )
        .into_ref()];
        let mut projection = MapProjection::default();
        let result = compute_extent(
            &features,
            CanvasSize::default(),
            FocalCenter::default(),
            ExtentOptions::default(),
            &mut projection,
        );
        assert!(matches!(result, Err(MapError::DegenerateExtent(_))));
    }

    #[test]
    fn test_bounds() {
        let mut bounds = Bounds::default();
        assert!(bounds.is_empty());
        bounds.extend(Coord { x: -1.0, y: 2.0 });
        bounds.extend(Coord { x: 3.0, y: -2.0 });
        assert_eq!(bounds.width(), 4.0);
        assert_eq!(bounds.height(), 4.0);
        assert_eq!(bounds.center(), Coord { x: 1.0, y: 0.0 });
    }
}
