//! Source loaders: turn a location into geometry payloads or record sets.
//!
//! On native targets locations are file paths ([`FsLoader`]); in the browser
//! they are URLs fetched with `window.fetch` ([`FetchLoader`]). Loaders only
//! produce futures; submitting them to a map's sequencers is up to the caller.

use crate::error::{MapError, MapResult};
use crate::ingest::{GeometryPayload, RecordSet};
use futures_util::future::{FutureExt, LocalBoxFuture};
use serde_json::Value;

/// Asynchronous access to raw source bytes.
pub trait SourceLoader {
    /// Loads the raw bytes at `location`.
    fn load_bytes(&self, location: &str) -> LocalBoxFuture<'static, MapResult<Vec<u8>>>;

    /// Loads and parses a JSON document.
    fn load_json(&self, location: &str) -> LocalBoxFuture<'static, MapResult<Value>> {
        let bytes = self.load_bytes(location);
        async move { Ok(serde_json::from_slice(&bytes.await?)?) }.boxed_local()
    }

    /// Loads a geometry source.
    ///
    /// A `.shp` location is read as a shapefile together with the `.dbf`
    /// next to it, if there is one; anything else is read as JSON.
    fn load_geometry(&self, location: &str) -> LocalBoxFuture<'static, MapResult<GeometryPayload>> {
        match shapefile_stem(location) {
            Some(stem) => {
                let shp = self.load_bytes(location);
                let dbf = self.load_bytes(&format!("{}.dbf", stem));
                let location = location.to_string();
                async move {
                    let shp = shp.await?;
                    let dbf = match dbf.await {
                        Ok(dbf) => Some(dbf),
                        Err(e) => {
                            log::debug!("No attribute table for {}: {}", location, e);
                            None
                        }
                    };
                    Ok(GeometryPayload::Shapefile { shp, dbf })
                }
                .boxed_local()
            }
            None => self.load_json(location).map(|r| r.map(GeometryPayload::Json)).boxed_local(),
        }
    }

    /// Loads a record set keyed by `key_field`.
    fn load_records(
        &self,
        location: &str,
        key_field: &str,
    ) -> LocalBoxFuture<'static, MapResult<RecordSet>> {
        let document = self.load_json(location);
        let key_field = key_field.to_string();
        async move { RecordSet::from_json(document.await?, &key_field) }.boxed_local()
    }
}

/// Location without its `.shp` extension, if it names a shapefile.
fn shapefile_stem(location: &str) -> Option<&str> {
    let split = location.len().checked_sub(4)?;
    let (stem, extension) = (location.get(..split)?, location.get(split..)?);
    extension.eq_ignore_ascii_case(".shp").then_some(stem)
}

/// Loads sources from the local file system.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Default)]
pub struct FsLoader {
    root: Option<std::path::PathBuf>,
}

#[cfg(not(target_arch = "wasm32"))]
impl FsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves relative locations against `root`.
    pub fn with_root(root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl SourceLoader for FsLoader {
    fn load_bytes(&self, location: &str) -> LocalBoxFuture<'static, MapResult<Vec<u8>>> {
        let path = match &self.root {
            Some(root) => root.join(location),
            None => std::path::PathBuf::from(location),
        };
        let result = std::fs::read(&path)
            .map_err(|e| MapError::Fetch(format!("{}: {}", path.display(), e)));
        if let Ok(bytes) = &result {
            log::debug!("Read {} bytes from {}", bytes.len(), path.display());
        }
        futures_util::future::ready(result).boxed_local()
    }
}

/// Loads sources over HTTP with the browser's `fetch`.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Default)]
pub struct FetchLoader;

#[cfg(target_arch = "wasm32")]
impl SourceLoader for FetchLoader {
    fn load_bytes(&self, location: &str) -> LocalBoxFuture<'static, MapResult<Vec<u8>>> {
        fetch_bytes(location.to_string()).boxed_local()
    }
}

#[cfg(target_arch = "wasm32")]
async fn fetch_bytes(url: String) -> MapResult<Vec<u8>> {
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;
    use web_sys::{Request, RequestInit, RequestMode, Response};

    let window =
        web_sys::window().ok_or_else(|| MapError::Fetch("No window object".to_string()))?;

    let init = RequestInit::new();
    init.set_method("GET");
    init.set_mode(RequestMode::Cors);
    let request = Request::new_with_str_and_init(&url, &init).map_err(js_error)?;

    let response: Response = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(js_error)?
        .dyn_into()
        .map_err(js_error)?;
    if !response.ok() {
        return Err(MapError::Fetch(format!(
            "{} returned HTTP {}",
            url,
            response.status()
        )));
    }

    let buffer = JsFuture::from(response.array_buffer().map_err(js_error)?)
        .await
        .map_err(js_error)?;
    let bytes = js_sys::Uint8Array::new(&buffer).to_vec();
    log::debug!("Fetched {} bytes from {}", bytes.len(), url);
    Ok(bytes)
}

#[cfg(target_arch = "wasm32")]
fn js_error(value: wasm_bindgen::JsValue) -> MapError {
    use wasm_bindgen::JsCast;
    let message = match value.dyn_ref::<js_sys::Error>() {
        Some(error) => String::from(error.message()),
        None => format!("{:?}", value),
    };
    MapError::Fetch(message)
}
