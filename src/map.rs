//! The thematic map: one layer store and projection fed by two sequencers.
//!
//! Geometry loads run on the geometry sequencer, data loads and queries on
//! the data sequencer. Every geometry load chains the data sequencer behind
//! it, so data submitted after a geometry load always sees its layers.

use crate::config::{CanvasSize, ExtentOptions, FocalCenter, MapConfig};
use crate::error::MapResult;
use crate::geo::{
    compute_extent, value_text, FeatureRef, LayerStore, MapProjection, MatchField, Properties,
};
use crate::identify::{match_fields, match_prefix, PropertyResolver, Resolution, Resolver, Selector};
use crate::ingest::{
    apply_transform, extract_layers, merge_records, store_layers, DataSource, GeometryOptions,
    GeometryPayload,
};
use crate::sequence::{Ready, Sequencer, Ticket};
use futures_util::future;
use futures_util::task::LocalSpawn;
use geo_types::Coord;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

/// State of the projection fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtentState {
    /// Fitted automatically by the next successful geometry load
    Pending,
    /// Fitted automatically; later loads keep the projection
    Computed,
    /// Set through [`ThematicMap::extent`]; never fitted automatically
    Pinned,
}

/// A layer computed from already loaded features.
#[derive(Debug, Clone)]
pub struct DerivedLayer {
    pub name: String,
    pub features: Vec<FeatureRef>,
    /// Position to insert at (appended when unset)
    pub index: Option<usize>,
}

impl DerivedLayer {
    pub fn new(name: impl Into<String>, features: Vec<FeatureRef>) -> Self {
        Self {
            name: name.into(),
            features,
            index: None,
        }
    }

    pub fn at_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

struct MapState {
    store: LayerStore,
    projection: MapProjection,
    config: MapConfig,
    resolver: Rc<dyn Resolver>,
    selected: Option<Selector>,
    extent: ExtentState,
    layer_counter: usize,
}

impl MapState {
    fn resolve(&self, selector: &Selector) -> Resolution {
        match (selector, &self.selected) {
            (Selector::None, Some(selected)) => self.resolver.resolve(&self.store, selected),
            _ => self.resolver.resolve(&self.store, selector),
        }
    }

    /// Fits the projection to all loaded geometry, once.
    fn auto_extent(&mut self) {
        if self.extent != ExtentState::Pending {
            return;
        }
        let features: Vec<FeatureRef> = self.store.features().cloned().collect();
        match compute_extent(
            &features,
            self.config.canvas,
            self.config.focal_center,
            self.config.extent,
            &mut self.projection,
        ) {
            Ok(()) => self.extent = ExtentState::Computed,
            Err(e) => log::warn!("Automatic extent not fitted yet: {}", e),
        }
    }
}

/// A thematic map instance.
pub struct ThematicMap {
    state: Rc<RefCell<MapState>>,
    geometry: Sequencer,
    data: Sequencer,
}

impl ThematicMap {
    /// Creates a map whose loads are spawned on `spawner`.
    pub fn new(spawner: Rc<dyn LocalSpawn>, config: MapConfig) -> Self {
        let state = MapState {
            store: LayerStore::new(),
            projection: MapProjection::default(),
            config,
            resolver: Rc::new(PropertyResolver::default()),
            selected: None,
            extent: ExtentState::Pending,
            layer_counter: 0,
        };
        Self {
            state: Rc::new(RefCell::new(state)),
            geometry: Sequencer::new("geometry", spawner.clone()),
            data: Sequencer::new("data", spawner),
        }
    }

    /// Creates a map that spawns its loads on the browser's event loop.
    #[cfg(target_arch = "wasm32")]
    pub fn for_web(config: MapConfig) -> Self {
        Self::new(Rc::new(crate::sequence::WasmSpawner), config)
    }

    // --- Loading -----------------------------------------------------------

    /// Loads geometry and adds its layers to the store on the load's turn.
    ///
    /// Resolves with the names of the stored layers. The first successful
    /// load fits the projection unless the extent has been pinned.
    pub fn load_geometry<F>(&self, load: F, options: GeometryOptions) -> Ticket<Vec<String>>
    where
        F: Future<Output = MapResult<GeometryPayload>> + 'static,
    {
        let state = self.state.clone();
        let ticket = self.geometry.submit_with(load, move |result| {
            let payload = result?;
            let mut guard = state.borrow_mut();
            let state = &mut *guard;

            let key_field = options
                .key_field
                .clone()
                .unwrap_or_else(|| state.config.key_field.clone());
            let counter = &mut state.layer_counter;
            let layers = extract_layers(payload, &options, &key_field, || {
                let name = format!("layer-{}", counter);
                *counter += 1;
                name
            })?;

            let names = store_layers(&mut state.store, layers, options.index);
            log::info!(
                "Stored layers {:?} ({} layers, {} features in total)",
                names,
                state.store.len(),
                state.store.feature_count()
            );
            state.auto_extent();
            Ok(names)
        });
        self.chain_data();
        ticket
    }

    /// Adds layers computed from the current store on the geometry sequencer.
    pub fn derive_layers<F>(&self, derive: F) -> Ticket<Vec<String>>
    where
        F: FnOnce(&LayerStore) -> Vec<DerivedLayer> + 'static,
    {
        let state = self.state.clone();
        let ticket = self
            .geometry
            .submit_with(future::ready(Ok(())), move |result: MapResult<()>| {
                result?;
                let mut state = state.borrow_mut();
                let derived = derive(&state.store);
                let mut names = Vec::with_capacity(derived.len());
                for layer in derived {
                    match layer.index {
                        Some(index) => {
                            state
                                .store
                                .insert_layer_at(index, &layer.name, layer.features)
                        }
                        None => state.store.append_layer(&layer.name, layer.features),
                    }
                    names.push(layer.name);
                }
                log::debug!("Derived layers {:?}", names);
                state.auto_extent();
                Ok(names)
            });
        self.chain_data();
        ticket
    }

    /// Merges records or applies a transform on the data sequencer.
    ///
    /// Resolves with the number of features that were updated.
    pub fn load_data(&self, source: DataSource) -> Ticket<usize> {
        let state = self.state.clone();
        match source {
            DataSource::Records(load) => self.data.submit_with(load, move |result| {
                let records = result?;
                Ok(merge_records(&state.borrow().store, &records))
            }),
            DataSource::Transform(transform) => self.data.submit_with(
                future::ready(Ok(())),
                move |result: MapResult<()>| {
                    result?;
                    Ok(apply_transform(&state.borrow().store, transform.as_ref()))
                },
            ),
        }
    }

    /// Orders the data sequencer behind everything submitted for geometry.
    fn chain_data(&self) {
        let _ = self.data.after(self.geometry.ready());
    }

    // --- Identification ----------------------------------------------------

    /// Replaces the default resolver's field priority list.
    pub fn identify(&self, fields: Vec<MatchField>) -> MapResult<()> {
        let resolver = PropertyResolver::new(fields)?;
        self.set_resolver(resolver);
        Ok(())
    }

    /// Replaces the resolution strategy.
    pub fn set_resolver<R>(&self, resolver: R)
    where
        R: Resolver + 'static,
    {
        self.state.borrow_mut().resolver = Rc::new(resolver);
    }

    /// Sets the current selection; `Selector::None` clears it.
    pub fn select(&self, selector: Selector) {
        log::debug!("Selecting {}", selector.label());
        self.state.borrow_mut().selected = match selector {
            Selector::None => None,
            selector => Some(selector),
        };
    }

    pub fn selected(&self) -> Option<Selector> {
        self.state.borrow().selected.clone()
    }

    /// Resolves a selector against the store as it is now.
    pub fn resolve(&self, selector: &Selector) -> Resolution {
        self.state.borrow().resolve(selector)
    }

    /// Resolves a selector once all earlier loads have been applied.
    pub fn resolve_when_ready(&self, selector: Selector) -> Ticket<Vec<FeatureRef>> {
        let state = self.state.clone();
        self.data
            .submit_with(future::ready(Ok(())), move |result: MapResult<()>| {
                result?;
                Ok(state.borrow().resolve(&selector).into_features())
            })
    }

    /// Features whose `field` equals `value`, ignoring case.
    pub fn search(&self, value: &str, field: MatchField) -> Vec<FeatureRef> {
        match_fields(&self.state.borrow().store, value, &[field])
    }

    /// Features of the current selection whose `property` starts with
    /// `prefix`, once all earlier loads have been applied.
    pub fn suggest(&self, prefix: &str, property: &str) -> Ticket<Vec<FeatureRef>> {
        let state = self.state.clone();
        let prefix = prefix.to_string();
        let field = MatchField::property(property);
        self.data
            .submit_with(future::ready(Ok(())), move |result: MapResult<()>| {
                result?;
                let features = state.borrow().resolve(&Selector::None).into_features();
                Ok(match_prefix(&features, &prefix, &field))
            })
    }

    /// Properties of the selected features, keyed by the text of `property`.
    ///
    /// Features without the property are left out; later features win on
    /// equal values.
    pub fn get_data(
        &self,
        property: &str,
        selector: Selector,
    ) -> Ticket<IndexMap<String, Properties>> {
        let state = self.state.clone();
        let property = property.to_string();
        self.data
            .submit_with(future::ready(Ok(())), move |result: MapResult<()>| {
                result?;
                let mut data = IndexMap::new();
                for feature in state.borrow().resolve(&selector).into_features() {
                    let feature = feature.borrow();
                    if let Some(key) = feature.properties.get(&property).and_then(value_text) {
                        data.insert(key, feature.properties.clone());
                    }
                }
                Ok(data)
            })
    }

    /// Runs `f` on the store once all earlier loads have been applied.
    pub fn then<R, F>(&self, f: F) -> Ticket<R>
    where
        R: 'static,
        F: FnOnce(&LayerStore) -> R + 'static,
    {
        let state = self.state.clone();
        self.data
            .submit_with(future::ready(Ok(())), move |result: MapResult<()>| {
                result?;
                Ok(f(&state.borrow().store))
            })
    }

    // --- Extent and projection ---------------------------------------------

    /// Fits the projection to the selected features.
    ///
    /// Pins the extent immediately, so pending geometry loads no longer fit
    /// it automatically. The fit itself runs on the geometry sequencer.
    pub fn extent(
        &self,
        selector: Selector,
        options: Option<ExtentOptions>,
    ) -> Ticket<MapProjection> {
        self.state.borrow_mut().extent = ExtentState::Pinned;
        let state = self.state.clone();
        self.geometry
            .submit_with(future::ready(Ok(())), move |result: MapResult<()>| {
                result?;
                let mut guard = state.borrow_mut();
                let state = &mut *guard;
                let features = state.resolve(&selector).into_features();
                let options = options.unwrap_or(state.config.extent);
                compute_extent(
                    &features,
                    state.config.canvas,
                    state.config.focal_center,
                    options,
                    &mut state.projection,
                )?;
                Ok(state.projection)
            })
    }

    pub fn extent_state(&self) -> ExtentState {
        self.state.borrow().extent
    }

    /// Sets the focal center used by later extent fits.
    pub fn set_focal_center(&self, x: f64, y: f64) {
        self.state.borrow_mut().config.focal_center = FocalCenter::new(x, y);
    }

    /// Sets the canvas size used by later extent fits.
    pub fn resize(&self, width: f64, height: f64) {
        self.state.borrow_mut().config.canvas = CanvasSize::new(width, height);
    }

    /// Projects a lon/lat coordinate to canvas pixels.
    pub fn project(&self, coord: Coord<f64>) -> Coord<f64> {
        self.state.borrow().projection.geo_to_screen(coord)
    }

    /// Inverts a canvas position to lon/lat.
    pub fn invert(&self, point: Coord<f64>) -> Coord<f64> {
        self.state.borrow().projection.screen_to_geo(point)
    }

    pub fn projection(&self) -> MapProjection {
        self.state.borrow().projection
    }

    // --- Accessors ---------------------------------------------------------

    pub fn config(&self) -> MapConfig {
        self.state.borrow().config.clone()
    }

    /// Layer names in render order.
    pub fn layer_names(&self) -> Vec<String> {
        self.state.borrow().store.keys()
    }

    /// Runs `f` on the store as it is now.
    pub fn with_store<R>(&self, f: impl FnOnce(&LayerStore) -> R) -> R {
        f(&self.state.borrow().store)
    }

    /// Completes once every geometry operation submitted so far is applied.
    pub fn geometry_ready(&self) -> Ready {
        self.geometry.ready()
    }

    /// Completes once every data operation submitted so far is applied.
    pub fn data_ready(&self) -> Ready {
        self.data.ready()
    }

    /// Returns true when no load or query is waiting for its turn.
    pub fn is_idle(&self) -> bool {
        self.geometry.is_idle() && self.data.is_idle()
    }
}

impl std::fmt::Debug for ThematicMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ThematicMap")
            .field("layers", &state.store.keys())
            .field("extent", &state.extent)
            .field("geometry", &self.geometry)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}
