//! Closed-ring assembly for area geometries.
//!
//! Member ways are chained end-to-end into closed rings; the rings are
//! then classified into outer shells and the holes they contain. Any
//! way that cannot be wired into a closed ring invalidates the whole
//! area, which the caller absorbs into an empty geometry.

use geo::Coord;
use thiserror::Error;

use super::projection::Reprojection;
use super::wkb::PolygonRings;
use super::{append_way, build_conns, MemberNodes, NOCONN};

#[derive(Debug, Error)]
pub(super) enum RingError {
    #[error("area relation has no usable member ways")]
    NoRings,
    #[error("member ways do not close into rings")]
    OpenRing,
    #[error("ring is degenerate")]
    DegenerateRing,
    #[error("ring references a node without a location")]
    MissingLocation,
}

/// Chain the member ways into closed rings and classify them into
/// outer/inner groups. Rings come back closed (first point repeated)
/// with outers counter-clockwise and inners clockwise.
pub(super) fn assemble_rings(
    ways: &[MemberNodes],
    projection: &Reprojection,
) -> Result<Vec<PolygonRings>, RingError> {
    let mut conns = build_conns(ways);
    if conns.is_empty() {
        return Err(RingError::NoRings);
    }
    if conns
        .iter()
        .any(|conn| conn.left == NOCONN || conn.right == NOCONN)
    {
        return Err(RingError::OpenRing);
    }

    let mut rings = Vec::new();
    let mut chain: Vec<(i64, Option<osmplace_core::Coordinate>)> = Vec::new();

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
        rings.push(ring_points(&chain, projection)?);
    }

    Ok(group_rings(rings))
}

/// Project a chained node list into a closed ring point list.
fn ring_points(
    chain: &[(i64, Option<osmplace_core::Coordinate>)],
    projection: &Reprojection,
) -> Result<Vec<Coord<f64>>, RingError> {
    let mut points: Vec<Coord<f64>> = Vec::with_capacity(chain.len() + 1);
    for (_, coord) in chain {
        let coord = coord.ok_or(RingError::MissingLocation)?;
        let p = projection.reproject(coord);
        if points.last() != Some(&p) {
            points.push(p);
        }
    }
    // The walk ends where it started, so the closing point is only
    // missing when the start/end node pair collapsed in deduplication.
    if points.first() != points.last() {
        points.push(points[0]);
    }
    if points.len() < 4 {
        return Err(RingError::DegenerateRing);
    }
    Ok(points)
}

/// Sort rings by size and nest each one inside the first outer ring that
/// contains it; everything else becomes a new outer shell.
fn group_rings(mut rings: Vec<Vec<Coord<f64>>>) -> Vec<PolygonRings> {
    rings.sort_by(|a, b| {
        signed_area(b)
            .abs()
            .partial_cmp(&signed_area(a).abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut polygons: Vec<PolygonRings> = Vec::new();
    for mut ring in rings {
        let area = signed_area(&ring);
        let container = polygons
            .iter()
            .position(|(outer, _)| contains(outer, ring[0]));
        match container {
            Some(i) => {
                // Holes run clockwise.
                if area > 0.0 {
                    ring.reverse();
                }
                polygons[i].1.push(ring);
            }
            None => {
                // Shells run counter-clockwise.
                if area < 0.0 {
                    ring.reverse();
                }
                polygons.push((ring, Vec::new()));
            }
        }
    }
    polygons
}

pub(super) fn signed_area(ring: &[Coord<f64>]) -> f64 {
    let mut sum = 0.0;
    for pair in ring.windows(2) {
        sum += pair[0].x * pair[1].y - pair[1].x * pair[0].y;
    }
    sum / 2.0
}

/// Even-odd ray cast; points exactly on the boundary are unspecified.
fn contains(ring: &[Coord<f64>], p: Coord<f64>) -> bool {
    let mut inside = false;
    for pair in ring.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Coord<f64>> {
        vec![
            Coord { x: x0, y: y0 },
            Coord { x: x0 + size, y: y0 },
            Coord { x: x0 + size, y: y0 + size },
            Coord { x: x0, y: y0 + size },
            Coord { x: x0, y: y0 },
        ]
    }

    #[test]
    fn signed_area_is_positive_counter_clockwise() {
        assert!(signed_area(&square(0.0, 0.0, 1.0)) > 0.0);
        let mut cw = square(0.0, 0.0, 1.0);
        cw.reverse();
        assert!(signed_area(&cw) < 0.0);
    }

    #[test]
    fn contains_distinguishes_inside_and_outside() {
        let ring = square(0.0, 0.0, 2.0);
        assert!(contains(&ring, Coord { x: 1.0, y: 1.0 }));
        assert!(!contains(&ring, Coord { x: 3.0, y: 1.0 }));
    }

    #[test]
    fn hole_nests_inside_its_shell() {
        let outer = square(0.0, 0.0, 10.0);
        let inner = square(4.0, 4.0, 1.0);
        let grouped = group_rings(vec![inner, outer]);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].1.len(), 1);
        // Orientation got normalised.
        assert!(signed_area(&grouped[0].0) > 0.0);
        assert!(signed_area(&grouped[0].1[0]) < 0.0);
    }

    #[test]
    fn disjoint_rings_become_separate_shells() {
        let grouped = group_rings(vec![square(0.0, 0.0, 1.0), square(5.0, 5.0, 1.0)]);
        assert_eq!(grouped.len(), 2);
        assert!(grouped.iter().all(|(_, inners)| inners.is_empty()));
    }
}
