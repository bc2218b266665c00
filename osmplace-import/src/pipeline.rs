//! The import driver: nodes into the caches, ways and relations through
//! classification and geometry assembly, rows out through the COPY
//! writer.
//!
//! The driver is strictly sequential. Output row order follows input
//! stream order; a single object emits its rows in main-tag declaration
//! order, non-fallback entries first.

use std::collections::HashMap;
use std::io::Write;

use log::debug;
use thiserror::Error;

use osmplace_core::{Coordinate, ImportOptions, Node, ObjectType, OsmId, Relation, Way};

use crate::flatnode::{CacheError, PersistentNodeCache, RamNodes, SparseRamCache};
use crate::geometry::{GeometryBuilder, MemberNodes, ProjectionError, Reprojection};
use crate::output::{CopyWriter, SinkError, TableTarget};
use crate::style::{ClassifiedPlace, GazetteerStyle, ObjectRow, StyleError};

/// Default capacity of the in-memory node cache backing the create-mode
/// fast path, in nodes.
const RAM_CACHE_NODES: usize = 4 << 20;

/// Errors that abort the import run.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Style(#[from] StyleError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Counts of processed objects and emitted rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub nodes: u64,
    pub ways: u64,
    pub relations: u64,
    pub rows: u64,
}

/// One import run over an OSM object stream.
pub struct Importer<W: Write> {
    style: GazetteerStyle,
    cache: Option<PersistentNodeCache>,
    ram: SparseRamCache,
    builder: GeometryBuilder,
    writer: CopyWriter<W>,
    table: TableTarget,
    place: ClassifiedPlace,
    /// Node reference lists of the ways seen so far; relations assemble
    /// their member geometry from this.
    ways: HashMap<OsmId, Vec<OsmId>>,
    summary: ImportSummary,
}

impl<W: Write> Importer<W> {
    /// Set up an import: load the style, resolve the projection and open
    /// (or create) the flat-node cache.
    pub fn new(options: &ImportOptions, sink: W) -> Result<Self, ImportError> {
        let style = GazetteerStyle::from_file(&options.style_path)?;
        Self::with_style(options, style, sink)
    }

    /// Like [`Importer::new`] with an already-compiled style, for callers
    /// that build their rules programmatically.
    pub fn with_style(
        options: &ImportOptions,
        style: GazetteerStyle,
        sink: W,
    ) -> Result<Self, ImportError> {
        let projection = Reprojection::from_id(options.projection)?;
        Self::with_projection(options, style, projection, sink)
    }

    /// Full control over the target projection, needed for EPSG targets
    /// served by an external transform.
    pub fn with_projection(
        options: &ImportOptions,
        style: GazetteerStyle,
        projection: Reprojection,
        sink: W,
    ) -> Result<Self, ImportError> {
        let cache = match &options.flat_node_path {
            Some(path) if options.append => {
                Some(PersistentNodeCache::open_append(path, options.scale)?)
            }
            Some(path) => Some(PersistentNodeCache::create(path, options.scale)?),
            None => None,
        };
        Ok(Self {
            style,
            cache,
            ram: SparseRamCache::new(RAM_CACHE_NODES),
            builder: GeometryBuilder::new(projection, options.split_at),
            writer: CopyWriter::new(sink),
            table: TableTarget::new("place", "place_id"),
            place: ClassifiedPlace::new(),
            ways: HashMap::new(),
            summary: ImportSummary::default(),
        })
    }

    pub fn summary(&self) -> ImportSummary {
        self.summary
    }

    /// Store the node's coordinate and emit a point row when its tags
    /// classify into at least one main tag.
    pub fn add_node(&mut self, node: &Node) -> Result<(), ImportError> {
        self.summary.nodes += 1;
        if !node.coord.is_valid() {
            debug!("node {} has no usable location, skipped", node.id);
            return Ok(());
        }

        self.ram.set(node.id, node.coord);
        if let Some(cache) = &mut self.cache {
            cache.set(node.id, node.coord)?;
        }

        if node.tags.is_empty() {
            return Ok(());
        }
        self.style.process_tags(&node.tags, &mut self.place);
        if self.place.main_tags().is_empty() {
            return Ok(());
        }

        let wkb = self.builder.wkb_node(node.coord);
        let row = ObjectRow {
            otype: ObjectType::Node,
            id: node.id,
            tags: &node.tags,
            meta: &node.meta,
        };
        if self
            .place
            .copy_out(&self.style, row, &wkb, &self.table, &mut self.writer)?
        {
            self.summary.rows += 1;
        }
        Ok(())
    }

    /// Emit an area row for a closed way, split linestring rows
    /// otherwise. The way's node references are retained for later
    /// relation assembly.
    pub fn add_way(&mut self, way: &Way) -> Result<(), ImportError> {
        self.summary.ways += 1;
        self.ways.insert(way.id, way.nodes.clone());

        if way.tags.is_empty() {
            return Ok(());
        }
        self.style.process_tags(&way.tags, &mut self.place);
        if self.place.main_tags().is_empty() {
            return Ok(());
        }

        let wkbs: Vec<Vec<u8>> = if way.is_closed() {
            let nodes = self.aligned_nodes(&way.nodes)?;
            let wkb = self.builder.wkb_polygon(&nodes);
            if wkb.is_empty() {
                Vec::new()
            } else {
                vec![wkb]
            }
        } else {
            let coords = match &mut self.cache {
                Some(cache) => cache.get_list(&way.nodes, Some(&self.ram as &dyn RamNodes))?,
                None => way
                    .nodes
                    .iter()
                    .filter_map(|&id| self.ram.get(id))
                    .collect(),
            };
            let locations: Vec<Option<Coordinate>> = coords.into_iter().map(Some).collect();
            self.builder.wkb_split_line(&locations)
        };

        let row = ObjectRow {
            otype: ObjectType::Way,
            id: way.id,
            tags: &way.tags,
            meta: &way.meta,
        };
        for wkb in &wkbs {
            if self
                .place
                .copy_out(&self.style, row, wkb, &self.table, &mut self.writer)?
            {
                self.summary.rows += 1;
            }
        }
        Ok(())
    }

    /// Relations dispatch on their `type` tag: `multipolygon` and
    /// `boundary` assemble areas, `waterway` assembles chained lines,
    /// anything else is skipped.
    pub fn add_relation(&mut self, rel: &Relation) -> Result<(), ImportError> {
        self.summary.relations += 1;

        let as_area = matches!(rel.rel_type(), Some("multipolygon") | Some("boundary"));
        let as_line = rel.rel_type() == Some("waterway");
        if !as_area && !as_line {
            return Ok(());
        }

        self.style.process_tags(&rel.tags, &mut self.place);
        if self.place.main_tags().is_empty() {
            return Ok(());
        }

        let members = self.member_nodes(rel)?;
        let wkbs: Vec<Vec<u8>> = if as_area {
            let wkb = self.builder.wkb_multipolygon(&members);
            if wkb.is_empty() {
                Vec::new()
            } else {
                vec![wkb]
            }
        } else {
            self.builder.wkb_multiline(&members)
        };

        let row = ObjectRow {
            otype: ObjectType::Relation,
            id: rel.id,
            tags: &rel.tags,
            meta: &rel.meta,
        };
        for wkb in &wkbs {
            if self
                .place
                .copy_out(&self.style, row, wkb, &self.table, &mut self.writer)?
            {
                self.summary.rows += 1;
            }
        }
        Ok(())
    }

    /// Flush the sink and close the flat-node cache.
    pub fn finish(mut self) -> Result<ImportSummary, ImportError> {
        self.writer.flush()?;
        if let Some(cache) = self.cache.take() {
            cache.close()?;
        }
        Ok(self.summary)
    }

    /// Materialise locations aligned with the given node ids.
    fn aligned_nodes(
        &mut self,
        ids: &[OsmId],
    ) -> Result<Vec<(OsmId, Option<Coordinate>)>, CacheError> {
        let mut nodes = Vec::with_capacity(ids.len());
        for &id in ids {
            let coord = match self.ram.get(id) {
                Some(coord) => Some(coord),
                None => match &mut self.cache {
                    Some(cache) => cache.get(id)?,
                    None => None,
                },
            };
            nodes.push((id, coord));
        }
        Ok(nodes)
    }

    fn member_nodes(&mut self, rel: &Relation) -> Result<Vec<MemberNodes>, CacheError> {
        let mut members = Vec::new();
        for member in rel.way_members() {
            let Some(node_ids) = self.ways.get(&member.id).cloned() else {
                debug!(
                    "relation {} references way {} outside the input stream",
                    rel.id, member.id
                );
                continue;
            };
            let nodes = self.aligned_nodes(&node_ids)?;
            members.push(MemberNodes {
                way_id: member.id,
                nodes,
            });
        }
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osmplace_core::{RelMember, TagList, PROJ_LATLONG};
    use rstest::{fixture, rstest};

    use crate::style::StyleEntry;

    fn entry(keys: &[&str], values: &[(&str, &str)]) -> StyleEntry {
        let mut map = serde_json::Map::new();
        for (value, expr) in values {
            map.insert(
                (*value).to_owned(),
                serde_json::Value::String((*expr).to_owned()),
            );
        }
        StyleEntry {
            keys: keys.iter().map(|k| (*k).to_owned()).collect(),
            values: map,
        }
    }

    #[fixture]
    fn style() -> GazetteerStyle {
        GazetteerStyle::from_entries(&[
            entry(&["amenity", "waterway", "landuse", "boundary"], &[("", "main")]),
            entry(&["name"], &[("", "name")]),
        ])
        .expect("valid test style")
    }

    fn options() -> ImportOptions {
        let mut options = ImportOptions::new("unused-style.json");
        options.projection = PROJ_LATLONG;
        options
    }

    fn tags(pairs: &[(&str, &str)]) -> TagList {
        pairs.iter().copied().collect()
    }

    fn node(id: OsmId, lon: f64, lat: f64, pairs: &[(&str, &str)]) -> Node {
        Node::new(id, Coordinate::new(lon, lat), tags(pairs))
    }

    fn import_rows(style: GazetteerStyle, feed: impl FnOnce(&mut Importer<&mut Vec<u8>>)) -> String {
        let mut out = Vec::new();
        {
            let mut importer =
                Importer::with_style(&options(), style, &mut out).expect("set up importer");
            feed(&mut importer);
            importer.finish().expect("finish import");
        }
        String::from_utf8(out).expect("COPY text is UTF-8")
    }

    #[rstest]
    fn node_emits_one_row_per_main_tag(style: GazetteerStyle) {
        let text = import_rows(style, |importer| {
            importer
                .add_node(&node(1, 12.3, 3.0, &[("amenity", "restaurant"), ("name", "Foobar")]))
                .expect("add node");
        });
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("1\tN\tamenity\trestaurant\t\"name\"=>\"Foobar\"\t15\t\\N\t\\N\t"));
    }

    #[rstest]
    fn untagged_objects_emit_nothing(style: GazetteerStyle) {
        let text = import_rows(style, |importer| {
            importer.add_node(&node(1, 0.0, 0.0, &[])).expect("add node");
            importer
                .add_node(&node(2, 0.0, 0.0, &[("surface", "gravel")]))
                .expect("add node");
        });
        assert!(text.is_empty());
    }

    #[rstest]
    fn open_way_emits_a_linestring_row(style: GazetteerStyle) {
        let text = import_rows(style, |importer| {
            importer.add_node(&node(1, 0.0, 0.0, &[])).expect("node");
            importer.add_node(&node(2, 1.0, 0.0, &[])).expect("node");
            importer
                .add_way(&Way::new(8, vec![1, 2], tags(&[("waterway", "stream")])))
                .expect("way");
        });
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("8\tW\twaterway\tstream\t"));
    }

    #[rstest]
    fn closed_way_emits_an_area_row(style: GazetteerStyle) {
        let text = import_rows(style, |importer| {
            importer.add_node(&node(1, 0.0, 0.0, &[])).expect("node");
            importer.add_node(&node(2, 1.0, 0.0, &[])).expect("node");
            importer.add_node(&node(3, 1.0, 1.0, &[])).expect("node");
            importer
                .add_way(&Way::new(9, vec![1, 2, 3, 1], tags(&[("landuse", "forest")])))
                .expect("way");
        });
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        // hex WKB of a multipolygon starts with the endianness marker and
        // the SRID-flagged type word
        let geom = lines[0].rsplit('\t').next().expect("geometry column");
        assert!(geom.starts_with("0106000020"));
    }

    #[rstest]
    fn relation_without_interesting_type_is_skipped(style: GazetteerStyle) {
        let text = import_rows(style, |importer| {
            importer
                .add_relation(&Relation::new(
                    5,
                    Vec::new(),
                    tags(&[("type", "route"), ("amenity", "parking")]),
                ))
                .expect("relation");
        });
        assert!(text.is_empty());
    }

    #[rstest]
    fn multipolygon_relation_assembles_member_ways(style: GazetteerStyle) {
        let text = import_rows(style, |importer| {
            for (id, lon, lat) in [
                (1, 0.0, 0.0),
                (2, 4.0, 0.0),
                (3, 4.0, 4.0),
                (4, 0.0, 4.0),
            ] {
                importer.add_node(&node(id, lon, lat, &[])).expect("node");
            }
            importer
                .add_way(&Way::new(21, vec![1, 2, 3], TagList::new()))
                .expect("way");
            importer
                .add_way(&Way::new(22, vec![3, 4, 1], TagList::new()))
                .expect("way");
            importer
                .add_relation(&Relation::new(
                    30,
                    vec![
                        RelMember::new(ObjectType::Way, 21, "outer"),
                        RelMember::new(ObjectType::Way, 22, "outer"),
                    ],
                    tags(&[("type", "multipolygon"), ("landuse", "forest")]),
                ))
                .expect("relation");
        });
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("30\tR\tlanduse\tforest\t"));
    }

    #[rstest]
    fn broken_multipolygon_is_absorbed(style: GazetteerStyle) {
        let text = import_rows(style, |importer| {
            importer.add_node(&node(1, 0.0, 0.0, &[])).expect("node");
            importer.add_node(&node(2, 4.0, 0.0, &[])).expect("node");
            importer
                .add_way(&Way::new(21, vec![1, 2], TagList::new()))
                .expect("way");
            importer
                .add_relation(&Relation::new(
                    31,
                    vec![RelMember::new(ObjectType::Way, 21, "outer")],
                    tags(&[("type", "multipolygon"), ("landuse", "forest")]),
                ))
                .expect("relation");
        });
        assert!(text.is_empty());
    }

    #[rstest]
    fn waterway_relation_chains_members(style: GazetteerStyle) {
        let text = import_rows(style, |importer| {
            for (id, lon) in [(1, 0.0), (2, 1.0), (3, 2.0), (4, 3.0)] {
                importer.add_node(&node(id, lon, 0.0, &[])).expect("node");
            }
            importer
                .add_way(&Way::new(41, vec![1, 2], TagList::new()))
                .expect("way");
            importer
                .add_way(&Way::new(42, vec![2, 3], TagList::new()))
                .expect("way");
            importer
                .add_way(&Way::new(43, vec![3, 4], TagList::new()))
                .expect("way");
            importer
                .add_relation(&Relation::new(
                    50,
                    vec![
                        RelMember::new(ObjectType::Way, 41, ""),
                        RelMember::new(ObjectType::Way, 42, ""),
                        RelMember::new(ObjectType::Way, 43, ""),
                    ],
                    tags(&[("type", "waterway"), ("waterway", "river")]),
                ))
                .expect("relation");
        });
        let lines: Vec<_> = text.lines().collect();
        // one chained component, one row
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("50\tR\twaterway\triver\t"));
    }
}
