//! Resolution of selectors against a layer store.

use super::selector::{Resolution, Selector};
use crate::error::{MapError, MapResult};
use crate::geo::{FeatureRef, LayerStore, MatchField};

/// Strategy that turns a selector into features.
///
/// Any `Fn(&LayerStore, &Selector) -> Resolution` is a resolver, so callers
/// can replace the default matching wholesale.
pub trait Resolver {
    fn resolve(&self, store: &LayerStore, selector: &Selector) -> Resolution;
}

impl<F> Resolver for F
where
    F: Fn(&LayerStore, &Selector) -> Resolution,
{
    fn resolve(&self, store: &LayerStore, selector: &Selector) -> Resolution {
        self(store, selector)
    }
}

/// Default resolver: layers first, then property values in priority order.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyResolver {
    fields: Vec<MatchField>,
}

impl Default for PropertyResolver {
    fn default() -> Self {
        Self {
            fields: vec![MatchField::CanonicalKey],
        }
    }
}

impl PropertyResolver {
    /// Creates a resolver that matches `fields`, highest priority first.
    pub fn new(fields: Vec<MatchField>) -> MapResult<Self> {
        if fields.is_empty() {
            return Err(MapError::InvalidSelector(
                "resolver needs at least one field to match".to_string(),
            ));
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[MatchField] {
        &self.fields
    }
}

impl Resolver for PropertyResolver {
    fn resolve(&self, store: &LayerStore, selector: &Selector) -> Resolution {
        match selector {
            Selector::Feature(feature) => Resolution::Feature(feature.clone()),
            Selector::Predicate(predicate) => Resolution::Features(
                store
                    .features()
                    .filter(|feature| predicate(&feature.borrow().properties))
                    .cloned()
                    .collect(),
            ),
            Selector::LayerName(name) => match store.get_ignore_case(name) {
                Some(layer) => Resolution::Features(layer.features().to_vec()),
                None => Resolution::Features(match_fields(store, name, &self.fields)),
            },
            Selector::PropertyMatch(matcher) => {
                Resolution::Features(match_fields(store, matcher.value(), matcher.fields()))
            }
            Selector::None => Resolution::Features(store.features().cloned().collect()),
        }
    }
}

/// Collects features whose field text equals `value`, ignoring case.
///
/// Fields are scanned in priority order, each across all layers; results are
/// concatenated without short-circuiting or de-duplication.
pub fn match_fields(store: &LayerStore, value: &str, fields: &[MatchField]) -> Vec<FeatureRef> {
    let wanted = value.to_lowercase();
    let mut matches = Vec::new();
    for field in fields {
        matches.extend(
            store
                .features()
                .filter(|feature| {
                    feature
                        .borrow()
                        .field_text(field)
                        .is_some_and(|text| text.to_lowercase() == wanted)
                })
                .cloned(),
        );
    }
    matches
}

/// Collects features whose `field` text starts with `prefix`, ignoring case.
pub fn match_prefix(features: &[FeatureRef], prefix: &str, field: &MatchField) -> Vec<FeatureRef> {
    let prefix = prefix.to_lowercase();
    features
        .iter()
        .filter(|feature| {
            feature
                .borrow()
                .field_text(field)
                .is_some_and(|text| text.to_lowercase().starts_with(&prefix))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{Feature, Properties};
    use serde_json::{json, Value};
    use std::rc::Rc;

    fn feature(properties: Value) -> FeatureRef {
        let mut feature = Feature::new(None, properties.as_object().cloned().unwrap_or_default());
        feature.normalize_key("id");
        feature.into_ref()
    }

    #[test]
    fn test_feature_selector_returns_same_feature() {
        let store = LayerStore::new();
        let f = feature(json!({}));
        match PropertyResolver::default().resolve(&store, &Selector::Feature(f.clone())) {
            Resolution::Feature(resolved) => assert!(Rc::ptr_eq(&resolved, &f)),
            other => panic!("unexpected resolution {:?}", other),
        }
    }

    #[test]
    fn test_predicate_scans_layer_then_feature_order() {
        let mut store = LayerStore::new();
        let a = feature(json!({"pop": 5}));
        let b = feature(json!({"pop": 1}));
        let c = feature(json!({"pop": 9}));
        store.append_layer("one", vec![a.clone(), b]);
        store.append_layer("two", vec![c.clone()]);

        let large = Selector::predicate(|p: &Properties| {
            p.get("pop").and_then(Value::as_i64).unwrap_or(0) > 2
        });
        let resolved = PropertyResolver::default()
            .resolve(&store, &large)
            .into_features();
        assert_eq!(resolved.len(), 2);
        assert!(Rc::ptr_eq(&resolved[0], &a));
        assert!(Rc::ptr_eq(&resolved[1], &c));

        let none = Selector::predicate(|_: &Properties| false);
        assert!(matches!(
            PropertyResolver::default().resolve(&store, &none),
            Resolution::Features(ref v) if v.is_empty()
        ));
    }

    #[test]
    fn test_layer_name_has_priority_over_property() {
        let mut store = LayerStore::new();
        let district = feature(json!({"id": "vienna"}));
        store.append_layer("cities", vec![district]);
        let v1 = feature(json!({}));
        let v2 = feature(json!({}));
        store.append_layer("vienna", vec![v1.clone(), v2.clone()]);

        let resolved = PropertyResolver::default()
            .resolve(&store, &Selector::name("Vienna"))
            .into_features();
        assert_eq!(resolved.len(), 2);
        assert!(Rc::ptr_eq(&resolved[0], &v1));
        assert!(Rc::ptr_eq(&resolved[1], &v2));
    }

    #[test]
    fn test_name_falls_back_to_canonical_key() {
        let mut store = LayerStore::new();
        let part1 = feature(json!({"id": "Tyrol"}));
        let part2 = feature(json!({"id": "TYROL"}));
        let other = feature(json!({"id": "Salzburg"}));
        store.append_layer("north", vec![part1.clone(), other]);
        store.append_layer("south", vec![part2.clone()]);

        let resolved = PropertyResolver::default()
            .resolve(&store, &Selector::name("tyrol"))
            .into_features();
        assert_eq!(resolved.len(), 2);
        assert!(Rc::ptr_eq(&resolved[0], &part1));
        assert!(Rc::ptr_eq(&resolved[1], &part2));
    }

    #[test]
    fn test_property_priority_is_union_not_short_circuit() {
        let mut store = LayerStore::new();
        let by_alt = feature(json!({"name": "Wien", "altName": "Vienna"}));
        let by_name = feature(json!({"name": "Vienna"}));
        store.append_layer("cities", vec![by_alt.clone(), by_name.clone()]);

        let resolver =
            PropertyResolver::new(vec!["name".into(), "altName".into()]).unwrap();
        let resolved = resolver
            .resolve(&store, &Selector::name("vienna"))
            .into_features();

        assert_eq!(resolved.len(), 2);
        // "name" matches come before "altName" matches, regardless of store order
        assert!(Rc::ptr_eq(&resolved[0], &by_name));
        assert!(Rc::ptr_eq(&resolved[1], &by_alt));
    }

    #[test]
    fn test_duplicates_across_fields_are_kept() {
        let mut store = LayerStore::new();
        let both = feature(json!({"name": "Graz", "altName": "graz"}));
        store.append_layer("cities", vec![both]);

        let resolver =
            PropertyResolver::new(vec!["name".into(), "altName".into()]).unwrap();
        assert_eq!(resolver.resolve(&store, &Selector::name("GRAZ")).len(), 2);
    }

    #[test]
    fn test_miss_is_empty_not_error() {
        let mut store = LayerStore::new();
        store.append_layer("cities", vec![feature(json!({"id": "linz"}))]);
        let resolved = PropertyResolver::default().resolve(&store, &Selector::name("paris"));
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_property_match_skips_layer_lookup() {
        let mut store = LayerStore::new();
        store.append_layer("linz", vec![feature(json!({}))]);
        let city = feature(json!({"name": "Linz"}));
        store.append_layer("cities", vec![city.clone()]);

        let selector = Selector::property_match("linz", vec!["name".into()]).unwrap();
        let resolved = PropertyResolver::default()
            .resolve(&store, &selector)
            .into_features();
        assert_eq!(resolved.len(), 1);
        assert!(Rc::ptr_eq(&resolved[0], &city));
    }

    #[test]
    fn test_unkeyed_features_never_match_key() {
        let mut store = LayerStore::new();
        store.append_layer("l", vec![feature(json!({"name": "x"}))]);
        assert!(match_fields(&store, "x", &[MatchField::CanonicalKey]).is_empty());
    }

    #[test]
    fn test_closure_is_a_resolver() {
        let mut store = LayerStore::new();
        store.append_layer("a", vec![feature(json!({})), feature(json!({}))]);
        let first_only = |store: &LayerStore, _: &Selector| {
            Resolution::Features(store.features().take(1).cloned().collect())
        };
        assert_eq!(first_only.resolve(&store, &Selector::None).len(), 1);
    }

    #[test]
    fn test_prefix_match() {
        let a = feature(json!({"name": "Salzburg"}));
        let b = feature(json!({"name": "Sankt Pölten"}));
        let c = feature(json!({"name": "Graz"}));
        let hits = match_prefix(&[a.clone(), b, c], "sal", &"name".into());
        assert_eq!(hits.len(), 1);
        assert!(Rc::ptr_eq(&hits[0], &a));
    }

    #[test]
    fn test_empty_field_list_rejected() {
        assert!(matches!(
            PropertyResolver::new(vec![]),
            Err(MapError::InvalidSelector(_))
        ));
    }
}
