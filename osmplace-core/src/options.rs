//! Resolved importer options.
//!
//! The CLI (or any other frontend) resolves its configuration into this
//! struct; the core never reads the environment itself.

use std::path::PathBuf;

use crate::coord::DEFAULT_SCALE;

/// Target projection: latitude/longitude passthrough.
pub const PROJ_LATLONG: i32 = 0;
/// Target projection: spherical Mercator.
pub const PROJ_SPHERE_MERC: i32 = 1;

/// Options consumed by the import pipeline. Negative `projection` values
/// are EPSG codes served by an external transform.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    pub projection: i32,
    pub flat_node_path: Option<PathBuf>,
    /// Decimal scale for fixed-point coordinate storage.
    pub scale: i32,
    /// Open existing data for incremental updates instead of creating.
    pub append: bool,
    pub style_path: PathBuf,
    /// Maximum linestring length in target-projection units; `None`
    /// selects the projection-dependent default.
    pub split_at: Option<f64>,
}

impl ImportOptions {
    pub fn new(style_path: impl Into<PathBuf>) -> Self {
        Self {
            projection: PROJ_SPHERE_MERC,
            flat_node_path: None,
            scale: DEFAULT_SCALE,
            append: false,
            style_path: style_path.into(),
            split_at: None,
        }
    }
}
