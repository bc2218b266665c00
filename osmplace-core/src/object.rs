//! OSM objects as they flow through the importer.

use crate::{Coordinate, ObjectType, OsmId, TagList};

/// Optional OSM attributes echoed into the output when the style
/// requests them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectMeta {
    pub version: Option<i32>,
    /// Seconds since the Unix epoch.
    pub timestamp: Option<i64>,
    pub changeset: Option<i64>,
    pub uid: Option<i64>,
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: OsmId,
    pub coord: Coordinate,
    pub tags: TagList,
    pub meta: ObjectMeta,
}

impl Node {
    pub fn new(id: OsmId, coord: Coordinate, tags: TagList) -> Self {
        Self {
            id,
            coord,
            tags,
            meta: ObjectMeta::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Way {
    pub id: OsmId,
    pub nodes: Vec<OsmId>,
    pub tags: TagList,
    pub meta: ObjectMeta,
}

impl Way {
    pub fn new(id: OsmId, nodes: Vec<OsmId>, tags: TagList) -> Self {
        Self {
            id,
            nodes,
            tags,
            meta: ObjectMeta::default(),
        }
    }

    /// First and last node reference are the same id.
    pub fn is_closed(&self) -> bool {
        self.nodes.len() > 2 && self.nodes.first() == self.nodes.last()
    }
}

/// A relation member reference with its role string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelMember {
    pub mtype: ObjectType,
    pub id: OsmId,
    pub role: String,
}

impl RelMember {
    pub fn new(mtype: ObjectType, id: OsmId, role: impl Into<String>) -> Self {
        Self {
            mtype,
            id,
            role: role.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub id: OsmId,
    pub members: Vec<RelMember>,
    pub tags: TagList,
    pub meta: ObjectMeta,
}

impl Relation {
    pub fn new(id: OsmId, members: Vec<RelMember>, tags: TagList) -> Self {
        Self {
            id,
            members,
            tags,
            meta: ObjectMeta::default(),
        }
    }

    /// The relation's `type` tag, when present.
    pub fn rel_type(&self) -> Option<&str> {
        self.tags.get("type")
    }

    pub fn way_members(&self) -> impl Iterator<Item = &RelMember> {
        self.members
            .iter()
            .filter(|m| m.mtype == ObjectType::Way)
    }
}
