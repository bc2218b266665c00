//! Facade crate for the osmplace importer.
//!
//! Re-exports the domain types and the import subsystems so applications
//! can depend on a single crate.

#![forbid(unsafe_code)]

pub use osmplace_core::{
    Coordinate, FixedPoint, ImportOptions, Node, ObjectMeta, ObjectType, OsmId, Relation,
    RelMember, Tag, TagList, Way, DEFAULT_SCALE, PROJ_LATLONG, PROJ_SPHERE_MERC,
};

pub use osmplace_import::{
    flatnode::{CacheError, PersistentNodeCache, RamNodes, SparseRamCache},
    geometry::{GeometryBuilder, ProjectionError, Reprojection},
    output::{CopyWriter, SinkError, TableTarget},
    pipeline::{ImportError, Importer},
    style::{GazetteerStyle, StyleError, StyleFlags},
};
