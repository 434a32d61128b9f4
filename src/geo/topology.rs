//! TopoJSON topology decoding.
//!
//! A topology bundles several named object collections that share a single
//! arc table. Objects are expanded into standalone features on demand; arc
//! coordinates are decoded once when the topology is parsed.

use super::feature::{Feature, Properties};
use crate::error::{MapError, MapResult};
use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// Returns true if `document` is a TopoJSON topology.
pub fn is_topology(document: &Value) -> bool {
    document.get("type").and_then(Value::as_str) == Some("Topology")
}

#[derive(Debug, Deserialize)]
struct RawTopology {
    #[serde(default)]
    transform: Option<Transform>,
    #[serde(default)]
    arcs: Vec<Vec<Vec<f64>>>,
    #[serde(default)]
    objects: IndexMap<String, TopoObject>,
}

/// Quantization transform (`scale`, `translate`) of a topology.
#[derive(Debug, Clone, Copy, Deserialize)]
struct Transform {
    scale: [f64; 2],
    translate: [f64; 2],
}

impl Transform {
    fn apply(&self, x: f64, y: f64) -> Coord<f64> {
        Coord {
            x: x * self.scale[0] + self.translate[0],
            y: y * self.scale[1] + self.translate[1],
        }
    }
}

/// A geometry object; `shape` is None for a null geometry (`"type": null`).
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "Value")]
struct TopoObject {
    shape: Option<TopoShape>,
    id: Option<Value>,
    properties: Option<Properties>,
}

impl TryFrom<Value> for TopoObject {
    type Error = serde_json::Error;

    fn try_from(mut value: Value) -> Result<Self, Self::Error> {
        let id = value
            .get_mut("id")
            .map(Value::take)
            .filter(|id| !id.is_null());
        let properties = match value.get_mut("properties").map(Value::take) {
            None | Some(Value::Null) => None,
            Some(properties) => Some(serde_json::from_value(properties)?),
        };
        let shape = if matches!(value.get("type"), None | Some(Value::Null)) {
            None
        } else {
            Some(serde_json::from_value(value)?)
        };
        Ok(Self {
            shape,
            id,
            properties,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum TopoShape {
    Point { coordinates: Vec<f64> },
    MultiPoint { coordinates: Vec<Vec<f64>> },
    LineString { arcs: Vec<i64> },
    MultiLineString { arcs: Vec<Vec<i64>> },
    Polygon { arcs: Vec<Vec<i64>> },
    MultiPolygon { arcs: Vec<Vec<Vec<i64>>> },
    GeometryCollection { geometries: Vec<TopoObject> },
}

/// A parsed topology with decoded arcs.
#[derive(Debug, Clone)]
pub struct Topology {
    transform: Option<Transform>,
    arcs: Vec<Vec<Coord<f64>>>,
    objects: IndexMap<String, TopoObject>,
}

impl Topology {
    /// Parses a topology document.
    pub fn from_value(document: Value) -> MapResult<Self> {
        let raw: RawTopology = serde_json::from_value(document)
            .map_err(|e| MapError::Parse(format!("Failed to parse topology: {}", e)))?;

        let arcs = raw
            .arcs
            .iter()
            .map(|arc| decode_arc(arc, raw.transform.as_ref()))
            .collect();

        Ok(Self {
            transform: raw.transform,
            arcs,
            objects: raw.objects,
        })
    }

    /// Names of all objects, in document order.
    pub fn object_names(&self) -> Vec<String> {
        self.objects.keys().cloned().collect()
    }

    /// Expands the named object into features.
    ///
    /// A GeometryCollection object yields one feature per member; any other
    /// object yields a single feature. Returns `Ok(None)` if the topology has
    /// no object of that name.
    pub fn features(&self, name: &str) -> MapResult<Option<Vec<Feature>>> {
        let Some(object) = self.objects.get(name) else {
            return Ok(None);
        };

        let features = match &object.shape {
            Some(TopoShape::GeometryCollection { geometries }) => geometries
                .iter()
                .map(|member| self.feature(member))
                .collect::<MapResult<Vec<_>>>()?,
            _ => vec![self.feature(object)?],
        };
        Ok(Some(features))
    }

    fn feature(&self, object: &TopoObject) -> MapResult<Feature> {
        let geometry = match &object.shape {
            Some(shape) => Some(self.geometry(shape)?),
            None => None,
        };
        Ok(Feature::new(
            geometry,
            object.properties.clone().unwrap_or_default(),
        )
        .with_id(object.id.clone()))
    }

    fn geometry(&self, shape: &TopoShape) -> MapResult<Geometry<f64>> {
        Ok(match shape {
            TopoShape::Point { coordinates } => Geometry::Point(Point(self.position(coordinates))),
            TopoShape::MultiPoint { coordinates } => Geometry::MultiPoint(MultiPoint::new(
                coordinates.iter().map(|c| Point(self.position(c))).collect(),
            )),
            TopoShape::LineString { arcs } => Geometry::LineString(self.stitch(arcs)?),
            TopoShape::MultiLineString { arcs } => Geometry::MultiLineString(MultiLineString::new(
                arcs.iter()
                    .map(|line| self.stitch(line))
                    .collect::<MapResult<_>>()?,
            )),
            TopoShape::Polygon { arcs } => Geometry::Polygon(self.polygon(arcs)?),
            TopoShape::MultiPolygon { arcs } => Geometry::MultiPolygon(MultiPolygon::new(
                arcs.iter()
                    .map(|rings| self.polygon(rings))
                    .collect::<MapResult<_>>()?,
            )),
            TopoShape::GeometryCollection { geometries } => {
                Geometry::GeometryCollection(GeometryCollection(
                    geometries
                        .iter()
                        .filter_map(|member| member.shape.as_ref())
                        .map(|shape| self.geometry(shape))
                        .collect::<MapResult<_>>()?,
                ))
            }
        })
    }

    fn polygon(&self, rings: &[Vec<i64>]) -> MapResult<Polygon<f64>> {
        let mut rings = rings.iter().map(|ring| self.stitch(ring));
        let exterior = match rings.next() {
            Some(ring) => ring?,
            None => LineString::new(Vec::new()),
        };
        let interiors = rings.collect::<MapResult<Vec<_>>>()?;
        Ok(Polygon::new(exterior, interiors))
    }

    /// Joins the referenced arcs into one line.
    ///
    /// Negative indices (`!i`) reference arc `i` reversed. Consecutive arcs
    /// share their junction point, which is kept once.
    fn stitch(&self, refs: &[i64]) -> MapResult<LineString<f64>> {
        let mut coords: Vec<Coord<f64>> = Vec::new();
        for &index in refs {
            let (arc_index, reversed) = if index < 0 {
                ((!index) as usize, true)
            } else {
                (index as usize, false)
            };
            let arc = self.arcs.get(arc_index).ok_or_else(|| {
                MapError::Topology(format!(
                    "arc {} referenced but only {} arcs present",
                    arc_index,
                    self.arcs.len()
                ))
            })?;

            coords.pop();
            if reversed {
                coords.extend(arc.iter().rev());
            } else {
                coords.extend(arc.iter());
            }
        }
        Ok(LineString::new(coords))
    }

    fn position(&self, position: &[f64]) -> Coord<f64> {
        let x = position.first().copied().unwrap_or(0.0);
        let y = position.get(1).copied().unwrap_or(0.0);
        match &self.transform {
            Some(transform) => transform.apply(x, y),
            None => Coord { x, y },
        }
    }
}

/// Decodes one arc, undoing delta encoding when the topology is quantized.
fn decode_arc(arc: &[Vec<f64>], transform: Option<&Transform>) -> Vec<Coord<f64>> {
    let (mut x, mut y) = (0.0, 0.0);
    arc.iter()
        .map(|position| {
            let dx = position.first().copied().unwrap_or(0.0);
            let dy = position.get(1).copied().unwrap_or(0.0);
            match transform {
                Some(transform) => {
                    x += dx;
                    y += dy;
                    transform.apply(x, y)
                }
                None => Coord { x: dx, y: dy },
            }
        })
        .collect()
}
