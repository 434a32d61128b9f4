#![warn(clippy::all)]

//! mapmap-core - the data side of a thematic map.
//!
//! Loads vector geometry (GeoJSON, TopoJSON, shapefiles) into an ordered
//! layer store, joins tabular data onto it by key, resolves selectors to
//! features and fits a Mercator projection. Loads run concurrently but are
//! applied in the order they were requested.
//!
//! Rendering is left to the caller, which reads layers through
//! [`ThematicMap::with_store`] and projects with [`ThematicMap::project`].

pub mod config;
pub mod error;
pub mod geo;
pub mod identify;
pub mod ingest;
pub mod map;
pub mod sequence;
pub mod source;

pub use config::{CanvasSize, ConfigOverrides, ExtentOptions, FocalCenter, MapConfig};
pub use error::{MapError, MapResult};
pub use geo::{Feature, FeatureRef, Layer, LayerStore, MapProjection, MatchField, Properties};
pub use identify::{PropertyResolver, Resolution, Resolver, Selector};
pub use ingest::{DataSource, GeometryOptions, GeometryPayload, RecordSet};
pub use map::{DerivedLayer, ExtentState, ThematicMap};
pub use sequence::{Sequencer, Ticket};
pub use source::SourceLoader;

#[cfg(not(target_arch = "wasm32"))]
pub use source::FsLoader;

#[cfg(target_arch = "wasm32")]
pub use source::FetchLoader;
