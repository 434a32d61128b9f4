//! Feature identification.
//!
//! A [`Selector`] names a layer, a single feature, a predicate or a property
//! value; a [`Resolver`] turns it into the matching features of a
//! [`LayerStore`](crate::geo::LayerStore).

mod resolver;
mod selector;

pub use resolver::{match_fields, match_prefix, PropertyResolver, Resolver};
pub use selector::{PredicateFn, PropertyMatch, Resolution, Selector};
