//! Geometry assembly: projected points, split linestrings, areas from
//! closed ways, and multipolygon/multiline assembly from relations.
//!
//! Invalid geometry is never fatal: assembly failures come back as empty
//! results so one broken object cannot poison a run. Fatal errors are
//! reserved for the I/O layers.

use geo::Coord;
use log::debug;

use osmplace_core::{Coordinate, OsmId};

mod projection;
mod rings;
mod wkb;

pub use projection::{EpsgTransform, ProjectionError, Reprojection, EARTH_CIRCUMFERENCE};

/// A relation member way with its node ids and whatever locations the
/// flat-node cache could materialise.
#[derive(Debug, Clone)]
pub struct MemberNodes {
    pub way_id: OsmId,
    pub nodes: Vec<(OsmId, Option<Coordinate>)>,
}

pub(crate) const NOCONN: usize = usize::MAX;

/// Connection slots wiring member ways together at shared endpoint
/// nodes. `left` belongs to the way's first node, `right` to its last.
pub(crate) struct Conn {
    pub left: usize,
    pub right: usize,
    /// Index into the caller's way slice.
    pub way: usize,
    pub done: bool,
}

/// Pair up way endpoints by node id. Only adjacent equal ids in the
/// sorted endpoint list pair, and a consumed pair resets the scan, so at
/// a junction of three ways one endpoint stays unconnected and
/// terminates its chain there.
pub(crate) fn build_conns(ways: &[MemberNodes]) -> Vec<Conn> {
    let mut endpoints: Vec<(OsmId, usize, bool)> = Vec::new();
    let mut conns: Vec<Conn> = Vec::new();
    for (i, way) in ways.iter().enumerate() {
        if way.nodes.len() > 1 {
            endpoints.push((way.nodes[0].0, conns.len(), true));
            endpoints.push((way.nodes[way.nodes.len() - 1].0, conns.len(), false));
            conns.push(Conn {
                left: NOCONN,
                right: NOCONN,
                way: i,
                done: false,
            });
        }
    }
    endpoints.sort_unstable();

    let mut prev: Option<(OsmId, usize, bool)> = None;
    for &pt in &endpoints {
        if let Some(p) = prev {
            if p.0 == pt.0 {
                if p.2 {
                    conns[p.1].left = pt.1;
                } else {
                    conns[p.1].right = pt.1;
                }
                if pt.2 {
                    conns[pt.1].left = p.1;
                } else {
                    conns[pt.1].right = p.1;
                }
                prev = None;
                continue;
            }
        }
        prev = Some(pt);
    }
    conns
}

/// Append a way's nodes to a chain, optionally reversed, dropping the
/// first node when it repeats the chain's current tail.
pub(crate) fn append_way(
    chain: &mut Vec<(OsmId, Option<Coordinate>)>,
    way: &MemberNodes,
    forward: bool,
    skip_first: bool,
) {
    let skip = usize::from(skip_first);
    if forward {
        chain.extend(way.nodes.iter().skip(skip).copied());
    } else {
        chain.extend(way.nodes.iter().rev().skip(skip).copied());
    }
}

/// Assembles output geometries for one import run.
///
/// WKB buffers are built fresh per geometry but the chain scratch buffer
/// is reused across relations to bound peak memory.
#[derive(Debug)]
pub struct GeometryBuilder {
    projection: Reprojection,
    split_at: f64,
    chain_scratch: Vec<(OsmId, Option<Coordinate>)>,
}

impl GeometryBuilder {
    /// `split_at` of `None` selects the projection default: no splitting
    /// for latlong targets, 100 km otherwise.
    pub fn new(projection: Reprojection, split_at: Option<f64>) -> Self {
        let split_at = split_at.unwrap_or_else(|| projection.default_split_at());
        Self {
            projection,
            split_at,
            chain_scratch: Vec::new(),
        }
    }

    pub fn srid(&self) -> i32 {
        self.projection.srid()
    }

    pub fn projection(&self) -> &Reprojection {
        &self.projection
    }

    /// Projected point geometry.
    pub fn wkb_node(&self, coord: Coordinate) -> Vec<u8> {
        wkb::wkb_point(self.srid(), self.projection.reproject(coord))
    }

    /// Split a node sequence into linestrings no longer than the
    /// configured distance, measured in the target SRS. Missing
    /// locations and coincident consecutive points are skipped; a
    /// trailing fragment shorter than two points is dropped.
    pub fn wkb_split_line(&self, locations: &[Option<Coordinate>]) -> Vec<Vec<u8>> {
        self.split_to_wkbs(locations.iter().copied())
    }

    /// Area from a closed way: a single-polygon multipolygon, or empty
    /// when the way is open, degenerate or missing locations.
    pub fn wkb_polygon(&self, nodes: &[(OsmId, Option<Coordinate>)]) -> Vec<u8> {
        if nodes.len() < 4 || nodes.first().map(|n| n.0) != nodes.last().map(|n| n.0) {
            return Vec::new();
        }
        let mut points: Vec<Coord<f64>> = Vec::with_capacity(nodes.len());
        for (_, coord) in nodes {
            let Some(coord) = *coord else {
                return Vec::new();
            };
            let p = self.projection.reproject(coord);
            if points.last() != Some(&p) {
                points.push(p);
            }
        }
        if points.first() != points.last() {
            let first = points[0];
            points.push(first);
        }
        if points.len() < 4 {
            return Vec::new();
        }
        if rings::signed_area(&points) < 0.0 {
            points.reverse();
        }
        wkb::wkb_multipolygon(self.srid(), &[(points, Vec::new())])
    }

    /// Multipolygon from a relation's member ways; empty when the rings
    /// do not assemble.
    pub fn wkb_multipolygon(&self, ways: &[MemberNodes]) -> Vec<u8> {
        match rings::assemble_rings(ways, &self.projection) {
            Ok(polygons) if !polygons.is_empty() => {
                wkb::wkb_multipolygon(self.srid(), &polygons)
            }
            Ok(_) => Vec::new(),
            Err(err) => {
                debug!("area assembly failed: {err}");
                Vec::new()
            }
        }
    }

    /// Chain a relation's member ways into lines and split each chain.
    /// Open chains are walked first from their unconnected ends; the
    /// ways left over form pure rings and are walked until the chain
    /// returns to its start.
    pub fn wkb_multiline(&mut self, ways: &[MemberNodes]) -> Vec<Vec<u8>> {
        let mut conns = build_conns(ways);
        let mut out = Vec::new();
        let mut chain = std::mem::take(&mut self.chain_scratch);

        for start in 0..conns.len() {
            if conns[start].done || (conns[start].left != NOCONN && conns[start].right != NOCONN) {
                continue;
            }
            chain.clear();
            let mut prev = NOCONN;
            let mut cur = start;
            while cur != NOCONN {
                let (left, right, way_idx) = {
                    let conn = &conns[cur];
                    (conn.left, conn.right, conn.way)
                };
                let skip_first = prev != NOCONN;
                let forward = left == prev;
                prev = cur;
                append_way(&mut chain, &ways[way_idx], forward, skip_first);
                cur = if forward { right } else { left };
                conns[prev].done = true;
            }
            out.extend(self.split_to_wkbs(chain.iter().map(|(_, c)| *c)));
        }

        if conns.iter().any(|conn| !conn.done) {
            for start in 0..conns.len() {
                if conns[start].done {
                    continue;
                }
                chain.clear();
                let mut prev = conns[start].left;
                let mut cur = start;
                let mut skip_first = false;
                loop {
                    let (left, right, way_idx) = {
                        let conn = &conns[cur];
                        (conn.left, conn.right, conn.way)
                    };
                    let forward = left == prev;
                    prev = cur;
                    append_way(&mut chain, &ways[way_idx], forward, skip_first);
                    cur = if forward { right } else { left };
                    conns[prev].done = true;
                    skip_first = true;
                    if cur == start {
                        break;
                    }
                }
                out.extend(self.split_to_wkbs(chain.iter().map(|(_, c)| *c)));
            }
        }

        self.chain_scratch = chain;
        out
    }

    fn split_to_wkbs(&self, locations: impl Iterator<Item = Option<Coordinate>>) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        let mut segment: Vec<Coord<f64>> = Vec::new();
        let mut dist = 0.0;
        let mut prev_pt: Option<Coord<f64>> = None;

        for loc in locations {
            let Some(loc) = loc else { continue };
            let this_pt = self.projection.reproject(loc);
            if let Some(prev) = prev_pt {
                if prev == this_pt {
                    continue;
                }
                let delta = distance(prev, this_pt);
                if dist + delta > self.split_at {
                    // Interpolate enough intermediate points to keep
                    // every emitted piece within the limit.
                    let splits = ((dist + delta) / self.split_at).floor() as usize;
                    let mut ipoint = this_pt;
                    for j in 0..splits {
                        let frac = ((j + 1) as f64 * self.split_at - dist) / delta;
                        ipoint = interpolate(this_pt, prev, frac);
                        segment.push(ipoint);
                        out.push(wkb::wkb_linestring(self.srid(), &segment));
                        segment.clear();
                        segment.push(ipoint);
                    }
                    if this_pt == ipoint {
                        dist = 0.0;
                        segment.clear();
                    } else {
                        dist = distance(this_pt, ipoint);
                    }
                } else {
                    dist += delta;
                }
            }
            segment.push(this_pt);
            prev_pt = Some(this_pt);
        }

        if segment.len() > 1 {
            out.push(wkb::wkb_linestring(self.srid(), &segment));
        }
        out
    }
}

fn distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

fn interpolate(p1: Coord<f64>, p2: Coord<f64>, frac: f64) -> Coord<f64> {
    Coord {
        x: frac * (p1.x - p2.x) + p2.x,
        y: frac * (p1.y - p2.y) + p2.y,
    }
}
