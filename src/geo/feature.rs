//! Map features and their normalized lookup keys.

use geo_types::Geometry;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Property bag of a feature.
pub type Properties = Map<String, Value>;

/// Shared handle to a feature owned by a [`LayerStore`](super::LayerStore).
///
/// Resolvers and renderers hold clones of this handle; the feature itself is
/// never copied.
pub type FeatureRef = Rc<RefCell<Feature>>;

/// Field a property lookup compares against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchField {
    /// The normalized key derived at load time.
    CanonicalKey,
    /// A named entry of the property bag.
    Property(String),
}

impl MatchField {
    /// Shorthand for `MatchField::Property(name.into())`.
    pub fn property(name: impl Into<String>) -> Self {
        MatchField::Property(name.into())
    }
}

impl From<&str> for MatchField {
    fn from(name: &str) -> Self {
        MatchField::Property(name.to_string())
    }
}

/// A geographic feature with its attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feature {
    /// Feature-level identifier from the source document, if any
    pub id: Option<Value>,
    /// Geometry (None for features the source left without geometry)
    pub geometry: Option<Geometry<f64>>,
    /// User properties, including merged data attributes
    pub properties: Properties,
    /// Lower-cased lookup key, kept outside `properties`
    canonical_key: Option<String>,
}

impl Feature {
    /// Creates a feature from a geometry and its properties.
    pub fn new(geometry: Option<Geometry<f64>>, properties: Properties) -> Self {
        Self {
            id: None,
            geometry,
            properties,
            canonical_key: None,
        }
    }

    /// Sets the feature-level identifier.
    pub fn with_id(mut self, id: Option<Value>) -> Self {
        self.id = id;
        self
    }

    /// Wraps the feature into a shared handle.
    pub fn into_ref(self) -> FeatureRef {
        Rc::new(RefCell::new(self))
    }

    /// Returns the normalized lookup key, if the key field was present.
    pub fn canonical_key(&self) -> Option<&str> {
        self.canonical_key.as_deref()
    }

    /// Derives the canonical key from `properties[key_field]`.
    ///
    /// The key is always computed from the untouched source property, so
    /// calling this repeatedly yields the same key.
    pub fn normalize_key(&mut self, key_field: &str) {
        self.canonical_key = self
            .properties
            .get(key_field)
            .and_then(value_text)
            .map(|text| text.to_lowercase());
    }

    /// Returns the text of `field` used for property matching.
    pub fn field_text(&self, field: &MatchField) -> Option<String> {
        match field {
            MatchField::CanonicalKey => self.canonical_key.clone(),
            MatchField::Property(name) => self.properties.get(name).and_then(value_text),
        }
    }

    /// Shallow-merges `record` into the property bag.
    ///
    /// Fields in `record` overwrite existing ones; others stay untouched.
    pub fn merge_properties(&mut self, record: &Properties) {
        for (name, value) in record {
            self.properties.insert(name.clone(), value.clone());
        }
    }
}

/// Stringifies a property value for key comparison.
///
/// Strings are used verbatim, integral numbers drop their fraction, and
/// null/composite values have no key text.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().map(|f| {
                    if f.fract() == 0.0 && f.abs() < 1e15 {
                        format!("{}", f as i64)
                    } else {
                        f.to_string()
                    }
                })
            }
        }
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
