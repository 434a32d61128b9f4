//! Named, ordered layers of features.

use super::feature::FeatureRef;
use indexmap::IndexMap;

/// A named, ordered collection of features.
#[derive(Debug, Clone, Default)]
pub struct Layer {
    name: String,
    features: Vec<FeatureRef>,
}

impl Layer {
    pub fn new(name: impl Into<String>, features: Vec<FeatureRef>) -> Self {
        Self {
            name: name.into(),
            features,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Features in load order.
    pub fn features(&self) -> &[FeatureRef] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Insertion-ordered mapping from layer name to layer.
///
/// Iteration follows first-insertion order unless a layer was explicitly
/// placed with [`insert_layer_at`](Self::insert_layer_at). Mutations are
/// expected to happen on a sequencer's turn, never from independent
/// callbacks.
#[derive(Debug, Clone, Default)]
pub struct LayerStore {
    layers: IndexMap<String, Layer>,
}

impl LayerStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a layer at the end, or replaces the content of an existing
    /// layer of the same name while keeping its position.
    pub fn append_layer(&mut self, name: &str, features: Vec<FeatureRef>) {
        match self.layers.get_mut(name) {
            Some(layer) => {
                log::debug!("Replacing layer '{}' ({} features)", name, features.len());
                layer.features = features;
            }
            None => {
                log::debug!("Adding layer '{}' ({} features)", name, features.len());
                self.layers
                    .insert(name.to_string(), Layer::new(name, features));
            }
        }
    }

    /// Adds or replaces a layer and moves it to `index`.
    ///
    /// Indices past the end place the layer last.
    pub fn insert_layer_at(&mut self, index: usize, name: &str, features: Vec<FeatureRef>) {
        match self.layers.get_index_of(name) {
            Some(current) => {
                let target = index.min(self.layers.len() - 1);
                self.layers[current].features = features;
                self.layers.move_index(current, target);
                log::debug!("Replaced layer '{}' and moved it to {}", name, target);
            }
            None => {
                let target = index.min(self.layers.len());
                self.layers
                    .shift_insert(target, name.to_string(), Layer::new(name, features));
                log::debug!("Inserted layer '{}' at {}", name, target);
            }
        }
    }

    /// Layer names in iteration order.
    pub fn keys(&self) -> Vec<String> {
        self.layers.keys().cloned().collect()
    }

    /// Looks up a layer by its exact name.
    pub fn get(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name)
    }

    /// Looks up a layer by name, ignoring case.
    ///
    /// An exact match wins over a case-insensitive one.
    pub fn get_ignore_case(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name).or_else(|| {
            let wanted = name.to_lowercase();
            self.layers
                .values()
                .find(|layer| layer.name.to_lowercase() == wanted)
        })
    }

    /// Returns true if a layer with this exact name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    /// Iterates over layers in store order.
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    /// Iterates over every feature, layer by layer.
    pub fn features(&self) -> impl Iterator<Item = &FeatureRef> {
        self.layers.values().flat_map(|layer| layer.features.iter())
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Total number of features across all layers.
    pub fn feature_count(&self) -> usize {
        self.layers.values().map(Layer::len).sum()
    }
}
