//! Geographic features, layers and projection.
//!
//! This module provides the feature model, the ordered layer store, parsers
//! for GeoJSON, TopoJSON and shapefile sources, and the Mercator projection
//! together with extent fitting.

mod convert;
mod extent;
mod feature;
mod layer;
mod projection;
mod topology;

pub use convert::{features_from_geojson, features_from_shapefile};
pub use extent::{compute_extent, fit_scale, for_each_coord, Bounds};
pub use feature::{value_text, Feature, FeatureRef, MatchField, Properties};
pub use layer::{Layer, LayerStore};
pub use projection::{MapProjection, MAX_LATITUDE};
pub use topology::{is_topology, Topology};
