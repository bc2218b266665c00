//! EWKB encoding: little-endian well-known binary with the PostGIS SRID
//! extension on the outermost geometry.

use byteorder::{LittleEndian, WriteBytesExt};
use geo::Coord;

const LITTLE_ENDIAN_MARKER: u8 = 0x01;
const SRID_FLAG: u32 = 0x2000_0000;

const TYPE_POINT: u32 = 1;
const TYPE_LINESTRING: u32 = 2;
const TYPE_POLYGON: u32 = 3;
const TYPE_MULTIPOLYGON: u32 = 6;

/// One polygon: an outer ring plus any holes. Rings are closed (first
/// point repeated at the end).
pub(super) type PolygonRings = (Vec<Coord<f64>>, Vec<Vec<Coord<f64>>>);

fn header(out: &mut Vec<u8>, geom_type: u32, srid: Option<i32>) {
    out.push(LITTLE_ENDIAN_MARKER);
    match srid {
        Some(srid) => {
            // Vec writes cannot fail.
            let _ = out.write_u32::<LittleEndian>(geom_type | SRID_FLAG);
            let _ = out.write_u32::<LittleEndian>(srid as u32);
        }
        None => {
            let _ = out.write_u32::<LittleEndian>(geom_type);
        }
    }
}

fn write_coord(out: &mut Vec<u8>, p: Coord<f64>) {
    let _ = out.write_f64::<LittleEndian>(p.x);
    let _ = out.write_f64::<LittleEndian>(p.y);
}

fn write_ring(out: &mut Vec<u8>, ring: &[Coord<f64>]) {
    let _ = out.write_u32::<LittleEndian>(ring.len() as u32);
    for &p in ring {
        write_coord(out, p);
    }
}

pub(super) fn wkb_point(srid: i32, p: Coord<f64>) -> Vec<u8> {
    let mut out = Vec::with_capacity(25);
    header(&mut out, TYPE_POINT, Some(srid));
    write_coord(&mut out, p);
    out
}

pub(super) fn wkb_linestring(srid: i32, points: &[Coord<f64>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(13 + points.len() * 16);
    header(&mut out, TYPE_LINESTRING, Some(srid));
    write_ring(&mut out, points);
    out
}

pub(super) fn wkb_multipolygon(srid: i32, polygons: &[PolygonRings]) -> Vec<u8> {
    let mut out = Vec::new();
    header(&mut out, TYPE_MULTIPOLYGON, Some(srid));
    let _ = out.write_u32::<LittleEndian>(polygons.len() as u32);
    for (outer, inners) in polygons {
        header(&mut out, TYPE_POLYGON, None);
        let _ = out.write_u32::<LittleEndian>(1 + inners.len() as u32);
        write_ring(&mut out, outer);
        for inner in inners {
            write_ring(&mut out, inner);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_layout() {
        let wkb = wkb_point(4326, Coord { x: 1.0, y: 2.0 });
        assert_eq!(wkb.len(), 25);
        assert_eq!(wkb[0], 0x01);
        // type word with the SRID flag
        assert_eq!(&wkb[1..5], &[0x01, 0x00, 0x00, 0x20]);
        // srid 4326 = 0x10E6
        assert_eq!(&wkb[5..9], &[0xE6, 0x10, 0x00, 0x00]);
        assert_eq!(&wkb[9..17], &1.0f64.to_le_bytes());
        assert_eq!(&wkb[17..25], &2.0f64.to_le_bytes());
    }

    #[test]
    fn linestring_counts_points() {
        let pts = [
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 1.0, y: 0.0 },
            Coord { x: 1.0, y: 1.0 },
        ];
        let wkb = wkb_linestring(900_913, &pts);
        assert_eq!(&wkb[1..5], &[0x02, 0x00, 0x00, 0x20]);
        assert_eq!(&wkb[9..13], &3u32.to_le_bytes());
        assert_eq!(wkb.len(), 13 + 3 * 16);
    }

    #[test]
    fn multipolygon_nests_unprefixed_polygons() {
        let square = vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 1.0, y: 0.0 },
            Coord { x: 1.0, y: 1.0 },
            Coord { x: 0.0, y: 1.0 },
            Coord { x: 0.0, y: 0.0 },
        ];
        let wkb = wkb_multipolygon(4326, &[(square, Vec::new())]);
        assert_eq!(&wkb[1..5], &[0x06, 0x00, 0x00, 0x20]);
        // one polygon
        assert_eq!(&wkb[9..13], &1u32.to_le_bytes());
        // nested polygon header carries no SRID flag
        assert_eq!(wkb[13], 0x01);
        assert_eq!(&wkb[14..18], &[0x03, 0x00, 0x00, 0x00]);
        // one ring of five points
        assert_eq!(&wkb[18..22], &1u32.to_le_bytes());
        assert_eq!(&wkb[22..26], &5u32.to_le_bytes());
    }
}
