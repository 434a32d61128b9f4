//! Geometry ingestion: payload parsing into named layers.

use crate::error::{MapError, MapResult};
use crate::geo::{
    features_from_geojson, features_from_shapefile, is_topology, Feature, FeatureRef, LayerStore,
    Topology,
};
use geojson::GeoJson;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A loaded geometry source, ready for parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryPayload {
    /// GeoJSON Feature, FeatureCollection or Geometry, or a TopoJSON topology
    Json(Value),
    /// Shapefile geometry with optional attribute table
    Shapefile { shp: Vec<u8>, dbf: Option<Vec<u8>> },
}

impl GeometryPayload {
    /// Parses a JSON document.
    pub fn parse(text: &str) -> MapResult<Self> {
        Ok(GeometryPayload::Json(serde_json::from_str(text)?))
    }
}

impl From<Value> for GeometryPayload {
    fn from(document: Value) -> Self {
        GeometryPayload::Json(document)
    }
}

/// Options for one geometry load.
///
/// Unset fields fall back to the map configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryOptions {
    /// Topology objects to extract (all when unset), or the layer name for
    /// a single-layer payload
    pub layer_names: Option<Vec<String>>,
    /// Property normalized into the canonical key
    pub key_field: Option<String>,
    /// Position at which to insert the loaded layers (appended when unset)
    pub index: Option<usize>,
}

impl GeometryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects topology objects, or names a single-layer payload.
    pub fn layers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.layer_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn key_field(mut self, key_field: impl Into<String>) -> Self {
        self.key_field = Some(key_field.into());
        self
    }

    pub fn at_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

/// A parsed layer that has not been added to a store yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLayer {
    pub name: String,
    pub features: Vec<Feature>,
}

/// Splits a payload into named layers and normalizes feature keys.
///
/// Topology objects that are requested but absent are skipped. Single-layer
/// payloads take the first requested name, or `generate_name()` when none
/// was given.
pub fn extract_layers(
    payload: GeometryPayload,
    options: &GeometryOptions,
    key_field: &str,
    generate_name: impl FnOnce() -> String,
) -> MapResult<Vec<ParsedLayer>> {
    let single_name = || {
        options
            .layer_names
            .as_ref()
            .and_then(|names| names.first().cloned())
            .unwrap_or_else(generate_name)
    };

    let mut layers = match payload {
        GeometryPayload::Json(document) if is_topology(&document) => {
            let topology = Topology::from_value(document)?;
            let names = options
                .layer_names
                .clone()
                .unwrap_or_else(|| topology.object_names());

            let mut layers = Vec::with_capacity(names.len());
            for name in names {
                match topology.features(&name)? {
                    Some(features) => layers.push(ParsedLayer { name, features }),
                    None => log::debug!("Topology has no object '{}', skipping", name),
                }
            }
            layers
        }
        GeometryPayload::Json(document) => {
            let geojson = GeoJson::from_json_value(document)
                .map_err(|e| MapError::Parse(format!("Failed to parse GeoJSON: {}", e)))?;
            vec![ParsedLayer {
                name: single_name(),
                features: features_from_geojson(geojson),
            }]
        }
        GeometryPayload::Shapefile { shp, dbf } => vec![ParsedLayer {
            name: single_name(),
            features: features_from_shapefile(&shp, dbf.as_deref())?,
        }],
    };

    for layer in &mut layers {
        for feature in &mut layer.features {
            feature.normalize_key(key_field);
        }
    }
    Ok(layers)
}

/// Adds parsed layers to the store and returns their names.
///
/// With an `index`, layers are inserted consecutively starting there;
/// otherwise they are appended (replacing same-named layers in place).
pub fn store_layers(
    store: &mut LayerStore,
    layers: Vec<ParsedLayer>,
    index: Option<usize>,
) -> Vec<String> {
    let mut names = Vec::with_capacity(layers.len());
    for (offset, layer) in layers.into_iter().enumerate() {
        let features: Vec<FeatureRef> = layer.features.into_iter().map(Feature::into_ref).collect();
        match index {
            Some(index) => store.insert_layer_at(index + offset, &layer.name, features),
            None => store.append_layer(&layer.name, features),
        }
        names.push(layer.name);
    }
    names
}
