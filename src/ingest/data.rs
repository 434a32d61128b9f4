//! Data ingestion: keyed record sets and their merge onto features.

use crate::error::{MapError, MapResult};
use crate::geo::{value_text, LayerStore, Properties};
use futures_util::future::LocalBoxFuture;
use indexmap::IndexMap;
use serde_json::Value;
use std::future::Future;
use std::rc::Rc;

/// Transformation applied to every feature's properties.
///
/// Returned fields are merged into the properties; `None` leaves the
/// feature unchanged.
pub type TransformFn = Rc<dyn Fn(&Properties) -> Option<Properties>>;

/// Tabular records keyed by lower-cased key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    records: IndexMap<String, Properties>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregates rows by the text of `key_field`.
    ///
    /// Rows without a usable key are dropped. Rows sharing a key are merged
    /// shallowly, later rows overwriting earlier fields.
    pub fn from_rows(rows: impl IntoIterator<Item = Properties>, key_field: &str) -> Self {
        let mut set = Self::new();
        let mut skipped = 0usize;
        for row in rows {
            match row.get(key_field).and_then(value_text) {
                Some(key) => set.insert(&key, row),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            log::debug!("Dropped {} rows without '{}' value", skipped, key_field);
        }
        set
    }

    /// Reads records from JSON.
    ///
    /// Accepts an array of row objects keyed by `key_field`, or an object
    /// that already maps keys to attribute objects.
    pub fn from_json(document: Value, key_field: &str) -> MapResult<Self> {
        match document {
            Value::Array(rows) => {
                let rows = rows
                    .into_iter()
                    .enumerate()
                    .map(|(idx, row)| match row {
                        Value::Object(row) => Ok(row),
                        other => Err(MapError::Parse(format!(
                            "row {} is not an object: {}",
                            idx, other
                        ))),
                    })
                    .collect::<MapResult<Vec<_>>>()?;
                Ok(Self::from_rows(rows, key_field))
            }
            Value::Object(entries) => {
                let mut set = Self::new();
                for (key, attributes) in entries {
                    match attributes {
                        Value::Object(attributes) => set.insert(&key, attributes),
                        other => {
                            return Err(MapError::Parse(format!(
                                "record '{}' is not an object: {}",
                                key, other
                            )))
                        }
                    }
                }
                Ok(set)
            }
            other => Err(MapError::Parse(format!(
                "expected an array or object of records, got {}",
                other
            ))),
        }
    }

    /// Adds a record, merging into an existing one with the same key.
    pub fn insert(&mut self, key: &str, attributes: Properties) {
        let entry = self.records.entry(key.to_lowercase()).or_default();
        for (name, value) in attributes {
            entry.insert(name, value);
        }
    }

    /// Looks up a record, ignoring the case of `key`.
    pub fn get(&self, key: &str) -> Option<&Properties> {
        self.records.get(&key.to_lowercase())
    }

    /// Keys in first-seen order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A data load request.
pub enum DataSource {
    /// Records to join onto features by canonical key
    Records(LocalBoxFuture<'static, MapResult<RecordSet>>),
    /// Transformation of every feature's current properties
    Transform(TransformFn),
}

impl DataSource {
    /// Wraps a future that produces a record set.
    pub fn records<F>(load: F) -> Self
    where
        F: Future<Output = MapResult<RecordSet>> + 'static,
    {
        DataSource::Records(Box::pin(load))
    }

    /// Wraps a property transformation.
    pub fn transform<F>(transform: F) -> Self
    where
        F: Fn(&Properties) -> Option<Properties> + 'static,
    {
        DataSource::Transform(Rc::new(transform))
    }
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Records(_) => f.write_str("DataSource::Records(..)"),
            DataSource::Transform(_) => f.write_str("DataSource::Transform(..)"),
        }
    }
}

/// Merges records onto features whose canonical key matches.
///
/// Returns the number of features that received a record.
pub fn merge_records(store: &LayerStore, records: &RecordSet) -> usize {
    let mut merged = 0;
    for feature in store.features() {
        let mut feature = feature.borrow_mut();
        let record = feature.canonical_key().and_then(|key| records.get(key));
        if let Some(record) = record {
            feature.merge_properties(record);
            merged += 1;
        }
    }
    log::info!(
        "Merged {} records onto {} of {} features",
        records.len(),
        merged,
        store.feature_count()
    );
    merged
}

/// Applies `transform` to every feature's properties.
///
/// Returns the number of features that were changed.
pub fn apply_transform(
    store: &LayerStore,
    transform: &dyn Fn(&Properties) -> Option<Properties>,
) -> usize {
    let mut changed = 0;
    for feature in store.features() {
        let update = transform(&feature.borrow().properties);
        if let Some(update) = update {
            feature.borrow_mut().merge_properties(&update);
            changed += 1;
        }
    }
    log::debug!("Transform updated {} features", changed);
    changed
}
