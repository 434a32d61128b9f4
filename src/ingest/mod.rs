//! Geometry and data ingestion.
//!
//! Parsing and merging are plain synchronous functions; the map runs them
//! on its sequencers' turns.

mod data;
mod geometry;

pub use data::{apply_transform, merge_records, DataSource, RecordSet, TransformFn};
pub use geometry::{extract_layers, store_layers, GeometryOptions, GeometryPayload, ParsedLayer};
