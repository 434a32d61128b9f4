//! Selectors: caller-side descriptions of "which features".

use crate::error::{MapError, MapResult};
use crate::geo::{FeatureRef, MatchField, Properties};
use std::rc::Rc;

/// Predicate over a feature's properties.
pub type PredicateFn = Rc<dyn Fn(&Properties) -> bool>;

/// A value matched against a non-empty list of fields.
///
/// Only built through [`Selector::property_match`].
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMatch {
    value: String,
    fields: Vec<MatchField>,
}

impl PropertyMatch {
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Fields in priority order; never empty.
    pub fn fields(&self) -> &[MatchField] {
        &self.fields
    }
}

/// Which feature(s) an operation applies to.
#[derive(Clone, Default)]
pub enum Selector {
    /// The map's current selection (every feature when nothing is selected)
    #[default]
    None,
    /// A layer by name, falling back to property matching
    LayerName(String),
    /// Features whose given fields match the value, in field priority order
    PropertyMatch(PropertyMatch),
    /// Features whose properties satisfy the predicate
    Predicate(PredicateFn),
    /// One specific feature
    Feature(FeatureRef),
}

impl Selector {
    /// Selects a layer, or features whose identifying fields match `name`.
    pub fn name(name: impl Into<String>) -> Self {
        Selector::LayerName(name.into())
    }

    /// Selects features whose `fields` match `value`.
    ///
    /// Fails if no field is given.
    pub fn property_match(value: impl Into<String>, fields: Vec<MatchField>) -> MapResult<Self> {
        if fields.is_empty() {
            return Err(MapError::InvalidSelector(
                "property match needs at least one field".to_string(),
            ));
        }
        Ok(Selector::PropertyMatch(PropertyMatch {
            value: value.into(),
            fields,
        }))
    }

    /// Selects features for which `predicate` returns true.
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&Properties) -> bool + 'static,
    {
        Selector::Predicate(Rc::new(predicate))
    }

    /// Label of the selector used in logs.
    pub fn label(&self) -> String {
        match self {
            Selector::None => "current selection".to_string(),
            Selector::LayerName(name) => name.clone(),
            Selector::PropertyMatch(matcher) => matcher.value.clone(),
            Selector::Predicate(_) => "predicate".to_string(),
            Selector::Feature(_) => "feature".to_string(),
        }
    }
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        Selector::LayerName(name.to_string())
    }
}

impl From<String> for Selector {
    fn from(name: String) -> Self {
        Selector::LayerName(name)
    }
}

impl From<FeatureRef> for Selector {
    fn from(feature: FeatureRef) -> Self {
        Selector::Feature(feature)
    }
}

impl std::fmt::Debug for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::None => f.write_str("None"),
            Selector::LayerName(name) => f.debug_tuple("LayerName").field(name).finish(),
            Selector::PropertyMatch(matcher) => {
                f.debug_tuple("PropertyMatch").field(matcher).finish()
            }
            Selector::Predicate(_) => f.write_str("Predicate(..)"),
            Selector::Feature(feature) => {
                f.debug_tuple("Feature").field(&feature.as_ptr()).finish()
            }
        }
    }
}

/// Result of resolving a selector.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A single feature (from a feature selector)
    Feature(FeatureRef),
    /// Zero or more features
    Features(Vec<FeatureRef>),
}

impl Resolution {
    pub fn empty() -> Self {
        Resolution::Features(Vec::new())
    }

    /// Number of resolved features.
    pub fn len(&self) -> usize {
        match self {
            Resolution::Feature(_) => 1,
            Resolution::Features(features) => features.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattens the resolution into a list.
    pub fn into_features(self) -> Vec<FeatureRef> {
        match self {
            Resolution::Feature(feature) => vec![feature],
            Resolution::Features(features) => features,
        }
    }
}
