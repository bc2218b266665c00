//! Core domain types for the osmplace importer.
//!
//! These models carry OSM objects and coordinates between the importer's
//! subsystems. Validation lives close to the types so downstream
//! components can rely on the invariants documented here.

#![forbid(unsafe_code)]

mod coord;
mod ids;
mod object;
mod options;
mod tags;

pub use coord::{Coordinate, FixedPoint, DEFAULT_SCALE};
pub use ids::{ObjectType, OsmId};
pub use object::{Node, ObjectMeta, RelMember, Relation, Way};
pub use options::{ImportOptions, PROJ_LATLONG, PROJ_SPHERE_MERC};
pub use tags::{Tag, TagList};
