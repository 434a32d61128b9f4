//! Map configuration.
//!
//! Plain serde structs with defaults. Partial JSON documents fill the missing
//! fields from the defaults; per-call option structs override single fields.

use crate::error::MapResult;
use serde::{Deserialize, Serialize};

/// Canvas size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

impl CanvasSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Point of the canvas (as fractions of width/height) the map is fitted
/// around.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocalCenter {
    pub x: f64,
    pub y: f64,
}

impl Default for FocalCenter {
    fn default() -> Self {
        Self { x: 0.5, y: 0.5 }
    }
}

impl FocalCenter {
    /// Creates a focal center, clamping both fractions to [0, 1].
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: x.clamp(0.0, 1.0),
            y: y.clamp(0.0, 1.0),
        }
    }

    /// Extent tightening factors `(1 - 2|0.5 - x|, 1 - 2|0.5 - y|)`.
    ///
    /// 1.0 at the canvas center, approaching 0 towards an edge.
    pub fn bias(&self) -> (f64, f64) {
        (
            1.0 - 2.0 * (0.5 - self.x).abs(),
            1.0 - 2.0 * (0.5 - self.y).abs(),
        )
    }
}

/// Options for fitting the projection to geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtentOptions {
    /// Fraction of the canvas the fitted geometry may fill
    pub fill: f64,
}

impl Default for ExtentOptions {
    fn default() -> Self {
        Self { fill: 0.95 }
    }
}

/// Configuration of one map instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Property normalized into each feature's canonical key
    pub key_field: String,
    /// Focal center used when fitting the extent
    pub focal_center: FocalCenter,
    /// Canvas the projection is fitted to
    pub canvas: CanvasSize,
    /// Extent fitting options
    pub extent: ExtentOptions,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            key_field: "id".to_string(),
            focal_center: FocalCenter::default(),
            canvas: CanvasSize::default(),
            extent: ExtentOptions::default(),
        }
    }
}

impl MapConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a (possibly partial) JSON configuration.
    pub fn from_json(json: &str) -> MapResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        log::debug!("Loaded map configuration: {:?}", config);
        Ok(config)
    }

    /// Serializes the configuration to JSON.
    pub fn to_json(&self) -> MapResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Applies every override that is set.
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(key_field) = &overrides.key_field {
            self.key_field = key_field.clone();
        }
        if let Some(focal_center) = overrides.focal_center {
            self.focal_center = focal_center;
        }
        if let Some(canvas) = overrides.canvas {
            self.canvas = canvas;
        }
        if let Some(fill) = overrides.extent_fill {
            self.extent.fill = fill;
        }
    }
}

/// Field-by-field overrides for [`MapConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    pub key_field: Option<String>,
    pub focal_center: Option<FocalCenter>,
    pub canvas: Option<CanvasSize>,
    pub extent_fill: Option<f64>,
}
