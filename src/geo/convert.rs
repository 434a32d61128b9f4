//! Conversion of GeoJSON documents and shapefiles into features.

use super::feature::{Feature, Properties};
use crate::error::{MapError, MapResult};
use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use geojson::{feature::Id, GeoJson, Position, Value};
use shapefile::dbase::FieldValue;
use std::io::Cursor;

/// Converts a parsed GeoJSON document into features.
///
/// A FeatureCollection yields one feature per member; a single Feature or
/// bare Geometry yields a one-element list.
pub fn features_from_geojson(geojson: GeoJson) -> Vec<Feature> {
    match geojson {
        GeoJson::FeatureCollection(fc) => fc.features.into_iter().map(convert_feature).collect(),
        GeoJson::Feature(f) => vec![convert_feature(f)],
        GeoJson::Geometry(g) => vec![Feature::new(convert_geometry(&g.value), Properties::new())],
    }
}

fn convert_feature(feature: geojson::Feature) -> Feature {
    let id = feature.id.map(|id| match id {
        Id::String(s) => serde_json::Value::String(s),
        Id::Number(n) => serde_json::Value::Number(n),
    });

    Feature::new(
        feature.geometry.as_ref().and_then(|g| convert_geometry(&g.value)),
        feature.properties.unwrap_or_default(),
    )
    .with_id(id)
}

fn coord(position: &Position) -> Coord<f64> {
    Coord {
        x: position.first().copied().unwrap_or(0.0),
        y: position.get(1).copied().unwrap_or(0.0),
    }
}

fn line(positions: &[Position]) -> LineString<f64> {
    LineString::new(positions.iter().map(coord).collect())
}

fn polygon(rings: &[Vec<Position>]) -> Option<Polygon<f64>> {
    let (exterior, holes) = rings.split_first()?;
    Some(Polygon::new(line(exterior), holes.iter().map(|h| line(h)).collect()))
}

/// Converts a GeoJSON geometry value. Returns None for empty polygons.
pub(crate) fn convert_geometry(value: &Value) -> Option<Geometry<f64>> {
    match value {
        Value::Point(c) => Some(Geometry::Point(Point(coord(c)))),
        Value::MultiPoint(points) => Some(Geometry::MultiPoint(MultiPoint::new(
            points.iter().map(|c| Point(coord(c))).collect(),
        ))),
        Value::LineString(coords) => Some(Geometry::LineString(line(coords))),
        Value::MultiLineString(lines) => Some(Geometry::MultiLineString(MultiLineString::new(
            lines.iter().map(|l| line(l)).collect(),
        ))),
        Value::Polygon(rings) => polygon(rings).map(Geometry::Polygon),
        Value::MultiPolygon(polygons) => Some(Geometry::MultiPolygon(MultiPolygon::new(
            polygons.iter().filter_map(|rings| polygon(rings)).collect(),
        ))),
        Value::GeometryCollection(geometries) => Some(Geometry::GeometryCollection(
            GeometryCollection(
                geometries
                    .iter()
                    .filter_map(|g| convert_geometry(&g.value))
                    .collect(),
            ),
        )),
    }
}

/// Loads features from a shapefile (.shp bytes plus optional .dbf bytes).
///
/// Every dbf column becomes a property of the corresponding feature.
/// Null shapes are kept as features without geometry so attribute rows stay
/// aligned.
pub fn features_from_shapefile(
    shp_bytes: &[u8],
    dbf_bytes: Option<&[u8]>,
) -> MapResult<Vec<Feature>> {
    let mut shape_reader = shapefile::ShapeReader::new(Cursor::new(shp_bytes))
        .map_err(|e| MapError::Parse(format!("Failed to read shapefile: {}", e)))?;

    let records = match dbf_bytes {
        Some(bytes) => Some(read_dbf(bytes)?),
        None => None,
    };

    let mut features = Vec::new();
    for (idx, result) in shape_reader.iter_shapes().enumerate() {
        let shape: shapefile::Shape =
            result.map_err(|e| MapError::Parse(format!("Failed to read shape: {}", e)))?;

        let properties = records
            .as_ref()
            .and_then(|records| records.get(idx).cloned())
            .unwrap_or_default();

        features.push(Feature::new(convert_shape(&shape), properties));
    }

    Ok(features)
}

fn read_dbf(bytes: &[u8]) -> MapResult<Vec<Properties>> {
    let mut reader = shapefile::dbase::Reader::new(Cursor::new(bytes))
        .map_err(|e| MapError::Parse(format!("Failed to read dbf: {}", e)))?;
    let field_names: Vec<String> = reader
        .fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect();
    let records: Vec<shapefile::dbase::Record> = reader
        .read()
        .map_err(|e| MapError::Parse(format!("Failed to read dbf records: {}", e)))?;

    Ok(records
        .iter()
        .map(|record| {
            field_names
                .iter()
                .filter_map(|name| {
                    record
                        .get(name)
                        .map(|value| (name.clone(), field_value_to_json(value)))
                })
                .collect()
        })
        .collect())
}

fn field_value_to_json(value: &FieldValue) -> serde_json::Value {
    use serde_json::Value as Json;

    let number = |n: f64| {
        serde_json::Number::from_f64(n)
            .map(Json::Number)
            .unwrap_or(Json::Null)
    };

    match value {
        FieldValue::Character(Some(s)) => Json::String(s.trim().to_string()),
        FieldValue::Numeric(Some(n)) => number(*n),
        FieldValue::Float(Some(n)) => number(f64::from(*n)),
        FieldValue::Double(n) => number(*n),
        FieldValue::Integer(n) => Json::from(*n),
        FieldValue::Logical(Some(b)) => Json::Bool(*b),
        _ => Json::Null,
    }
}

fn to_coords(points: &[shapefile::Point]) -> LineString<f64> {
    points.iter().map(|p| Coord { x: p.x, y: p.y }).collect()
}

fn convert_shape(shape: &shapefile::Shape) -> Option<Geometry<f64>> {
    match shape {
        shapefile::Shape::Point(p) => Some(Geometry::Point(Point::new(p.x, p.y))),
        shapefile::Shape::Multipoint(mp) => Some(Geometry::MultiPoint(
            mp.points().iter().map(|p| Point::new(p.x, p.y)).collect(),
        )),
        shapefile::Shape::Polyline(pl) => {
            let parts = pl.parts();
            if parts.len() == 1 {
                Some(Geometry::LineString(to_coords(&parts[0])))
            } else {
                Some(Geometry::MultiLineString(MultiLineString::new(
                    parts.iter().map(|part| to_coords(part)).collect(),
                )))
            }
        }
        shapefile::Shape::Polygon(poly) => {
            use shapefile::PolygonRing;

            // Outer rings start a new polygon; inner rings are holes of the
            // most recent outer ring.
            let mut polygons: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();
            for ring in poly.rings() {
                let coords = to_coords(ring.points());
                match ring {
                    PolygonRing::Outer(_) => polygons.push((coords, Vec::new())),
                    PolygonRing::Inner(_) => {
                        if let Some((_, holes)) = polygons.last_mut() {
                            holes.push(coords);
                        }
                    }
                }
            }

            match polygons.len() {
                0 => None,
                1 => polygons
                    .pop()
                    .map(|(exterior, holes)| Geometry::Polygon(Polygon::new(exterior, holes))),
                _ => Some(Geometry::MultiPolygon(MultiPolygon::new(
                    polygons
                        .into_iter()
                        .map(|(exterior, holes)| Polygon::new(exterior, holes))
                        .collect(),
                ))),
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> GeoJson {
        text.parse().unwrap()
    }

    #[test]
    fn test_feature_collection() {
        let features = features_from_geojson(parse(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","id":"w","properties":{"name":"Wien"},
                 "geometry":{"type":"Point","coordinates":[16.37,48.21]}},
                {"type":"Feature","properties":null,
                 "geometry":{"type":"LineString","coordinates":[[0,0],[1,1]]}}
            ]}"#,
        ));

        assert_eq!(features.len(), 2);
        assert_eq!(features[0].id, Some(serde_json::json!("w")));
        assert_eq!(features[0].properties["name"], "Wien");
        assert_eq!(
            features[0].geometry,
            Some(Geometry::Point(Point::new(16.37, 48.21)))
        );
        assert!(features[1].properties.is_empty());
    }

    #[test]
    fn test_bare_geometry_wrapped() {
        let features = features_from_geojson(parse(
            r#"{"type":"Polygon","coordinates":[
                [[0,0],[2,0],[2,2],[0,0]],
                [[0.5,0.5],[1,0.5],[1,1],[0.5,0.5]]
            ]}"#,
        ));
        assert_eq!(features.len(), 1);
        match &features[0].geometry {
            Some(Geometry::Polygon(p)) => {
                assert_eq!(p.exterior().0.len(), 4);
                assert_eq!(p.interiors().len(), 1);
            }
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_feature_without_geometry() {
        let features = features_from_geojson(parse(
            r#"{"type":"Feature","geometry":null,"properties":{"id":3}}"#,
        ));
        assert_eq!(features.len(), 1);
        assert!(features[0].geometry.is_none());
    }

    /// Writes polygon shapes with NAME and POP columns into in-memory
    /// .shp and .dbf buffers.
    fn write_shapefile(rows: &[(shapefile::Polygon, &str, f64)]) -> (Vec<u8>, Vec<u8>) {
        use shapefile::dbase::{FieldName, Record, TableWriterBuilder};

        let mut shp = Cursor::new(Vec::new());
        let mut shx = Cursor::new(Vec::new());
        let mut dbf = Cursor::new(Vec::new());
        {
            let shapes = shapefile::ShapeWriter::with_shx(&mut shp, &mut shx);
            let table = TableWriterBuilder::new()
                .add_character_field(FieldName::try_from("NAME").unwrap(), 20)
                .add_numeric_field(FieldName::try_from("POP").unwrap(), 10, 0)
                .build_with_dest(&mut dbf);
            let mut writer = shapefile::Writer::new(shapes, table);
            for (polygon, name, pop) in rows {
                let mut record = Record::default();
                record.insert("NAME".to_string(), FieldValue::Character(Some(name.to_string())));
                record.insert("POP".to_string(), FieldValue::Numeric(Some(*pop)));
                writer.write_shape_and_record(polygon, &record).unwrap();
            }
        }
        (shp.into_inner(), dbf.into_inner())
    }

    fn square(x: f64, y: f64, size: f64) -> Vec<shapefile::Point> {
        vec![
            shapefile::Point::new(x, y),
            shapefile::Point::new(x, y + size),
            shapefile::Point::new(x + size, y + size),
            shapefile::Point::new(x + size, y),
            shapefile::Point::new(x, y),
        ]
    }

    #[test]
    fn test_shapefile_with_attributes() {
        use shapefile::PolygonRing;

        let holed = shapefile::Polygon::with_rings(vec![
            PolygonRing::Outer(square(0.0, 0.0, 4.0)),
            PolygonRing::Inner(square(1.0, 1.0, 1.0)),
        ]);
        let islands = shapefile::Polygon::with_rings(vec![
            PolygonRing::Outer(square(10.0, 0.0, 1.0)),
            PolygonRing::Outer(square(20.0, 0.0, 1.0)),
        ]);
        let (shp, dbf) = write_shapefile(&[(holed, "Lake", 120.0), (islands, "Isles", 7.0)]);

        let features = features_from_shapefile(&shp, Some(&dbf)).unwrap();
        assert_eq!(features.len(), 2);

        assert_eq!(features[0].properties["NAME"], "Lake");
        assert_eq!(features[0].properties["POP"].as_f64(), Some(120.0));
        match &features[0].geometry {
            Some(Geometry::Polygon(p)) => {
                assert_eq!(p.exterior().0.len(), 5);
                assert_eq!(p.interiors().len(), 1);
            }
            other => panic!("unexpected geometry {:?}", other),
        }

        assert_eq!(features[1].properties["NAME"], "Isles");
        match &features[1].geometry {
            Some(Geometry::MultiPolygon(mp)) => {
                assert_eq!(mp.0.len(), 2);
                assert!(mp.0.iter().all(|p| p.interiors().is_empty()));
            }
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_shapefile_without_dbf_has_no_properties() {
        let polygon = shapefile::Polygon::new(shapefile::PolygonRing::Outer(square(0.0, 0.0, 1.0)));
        let (shp, _) = write_shapefile(&[(polygon, "Only", 1.0)]);

        let features = features_from_shapefile(&shp, None).unwrap();
        assert_eq!(features.len(), 1);
        assert!(features[0].properties.is_empty());
        assert!(matches!(features[0].geometry, Some(Geometry::Polygon(_))));
    }

    #[test]
    fn test_invalid_shapefile_is_parse_error() {
        let result = features_from_shapefile(b"not a shapefile", None);
        assert!(matches!(result, Err(MapError::Parse(_))));
    }
}
