//! On-disk behaviour of the persistent flat-node cache across create
//! and append runs.

use std::collections::BTreeMap;

use proptest::prelude::*;
use tempfile::tempdir;

use osmplace_core::{Coordinate, DEFAULT_SCALE};
use osmplace_import::flatnode::{
    PersistentNodeCache, RamNodes, SparseRamCache, HEADER_BYTES, READ_BLOCK_RECORDS, RECORD_BYTES,
};

const EPS: f64 = 1.0 / DEFAULT_SCALE as f64;

fn assert_coord(actual: Coordinate, lon: f64, lat: f64) {
    assert!(
        (actual.lon - lon).abs() <= EPS && (actual.lat - lat).abs() <= EPS,
        "expected ({lon}, {lat}), got ({}, {})",
        actual.lon,
        actual.lat
    );
}

#[test]
fn create_then_append_round_trip() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("flat.nodes");

    {
        let mut cache = PersistentNodeCache::create(&path, DEFAULT_SCALE).expect("create");
        cache.set(42, Coordinate::new(2.0, 1.0)).expect("set");
        cache.close().expect("close");
    }

    let mut cache = PersistentNodeCache::open_append(&path, DEFAULT_SCALE).expect("reopen");
    let got = cache.get(42).expect("get").expect("node 42 present");
    assert_coord(got, 2.0, 1.0);
    assert!(cache.get(43).expect("get").is_none());
}

#[test]
fn unwritten_ids_inside_the_initialised_range_are_absent() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("flat.nodes");

    {
        let mut cache = PersistentNodeCache::create(&path, DEFAULT_SCALE).expect("create");
        cache.set(5000, Coordinate::new(10.0, 20.0)).expect("set");
        cache.close().expect("close");
    }

    let mut cache = PersistentNodeCache::open_append(&path, DEFAULT_SCALE).expect("reopen");
    assert!(cache.max_initialised_id() >= 5000);
    assert!(cache.get(100).expect("get").is_none());
    assert!(cache.get(4999).expect("get").is_none());
    assert!(cache.get(5000).expect("get").is_some());
}

#[test]
fn reads_during_create_see_pending_writes() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("flat.nodes");

    let mut cache = PersistentNodeCache::create(&path, DEFAULT_SCALE).expect("create");
    cache.set(7, Coordinate::new(1.5, -2.5)).expect("set");
    // The write block has not been flushed yet; the read path must make
    // it visible before loading.
    let got = cache.get(7).expect("get").expect("node 7 present");
    assert_coord(got, 1.5, -2.5);
}

#[test]
fn append_expansion_keeps_the_file_block_aligned() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("flat.nodes");

    {
        let mut cache = PersistentNodeCache::create(&path, DEFAULT_SCALE).expect("create");
        cache.set(10, Coordinate::new(1.0, 1.0)).expect("set");
        cache.close().expect("close");
    }

    let mut cache = PersistentNodeCache::open_append(&path, DEFAULT_SCALE).expect("reopen");
    let far = 3_000_000;
    cache.set(far, Coordinate::new(-3.0, 4.0)).expect("set far");
    let max = cache.max_initialised_id();
    assert!(max >= far);
    // Everything between the old range and the new node reads absent.
    assert!(cache.get(2_000_000).expect("get").is_none());
    let got = cache.get(far).expect("get").expect("far node present");
    assert_coord(got, -3.0, 4.0);
    cache.close().expect("close");

    let len = std::fs::metadata(&path).expect("stat").len();
    let records = (max + 1) as u64;
    assert_eq!(records % READ_BLOCK_RECORDS as u64, 0);
    assert_eq!(len, HEADER_BYTES + records * RECORD_BYTES);
}

#[test]
fn create_mode_skipped_blocks_read_absent() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("flat.nodes");

    let mut cache = PersistentNodeCache::create(&path, DEFAULT_SCALE).expect("create");
    cache.set(5, Coordinate::new(5.0, 5.0)).expect("set");
    // Jump two write blocks ahead; the gap must be sentinel-filled.
    cache.set(2_000_003, Coordinate::new(6.0, 6.0)).expect("set");
    assert!(cache.get(1_500_000).expect("get").is_none());
    assert_coord(cache.get(5).expect("get").expect("node 5"), 5.0, 5.0);
    assert_coord(
        cache.get(2_000_003).expect("get").expect("far node"),
        6.0,
        6.0,
    );
}

#[test]
fn get_list_merges_ram_hits_and_compacts_misses() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("flat.nodes");

    let mut cache = PersistentNodeCache::create(&path, DEFAULT_SCALE).expect("create");
    cache.set(1, Coordinate::new(1.0, 0.0)).expect("set");
    cache.set(2, Coordinate::new(2.0, 0.0)).expect("set");
    cache.set(4, Coordinate::new(4.0, 0.0)).expect("set");

    let mut ram = SparseRamCache::new(16);
    ram.set(3, Coordinate::new(3.0, 0.0));

    let coords = cache
        .get_list(&[1, 2, 3, 4, 999_999], Some(&ram as &dyn RamNodes))
        .expect("get_list");
    // Four hits, compacted to the front in input order; the never-written
    // id drops out.
    let lons: Vec<i64> = coords.iter().map(|c| c.lon.round() as i64).collect();
    assert_eq!(lons, [1, 2, 3, 4]);
}

#[test]
fn get_list_without_misses_skips_the_file() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("flat.nodes");

    let mut cache = PersistentNodeCache::create(&path, DEFAULT_SCALE).expect("create");
    let mut ram = SparseRamCache::new(16);
    ram.set(10, Coordinate::new(1.0, 2.0));
    ram.set(11, Coordinate::new(3.0, 4.0));

    let coords = cache
        .get_list(&[10, 11], Some(&ram as &dyn RamNodes))
        .expect("get_list");
    assert_eq!(coords.len(), 2);
    // Nothing was initialised on disk for these ids.
    assert_eq!(cache.max_initialised_id(), -1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn create_mode_round_trips_monotone_writes(
        ids in prop::collection::btree_set(0i64..200_000, 1..40),
    ) {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("flat.nodes");

        let expected: BTreeMap<i64, Coordinate> = ids
            .iter()
            .map(|&id| {
                let lon = (id % 360 - 180) as f64 + 0.25;
                let lat = (id % 170 - 85) as f64 + 0.5;
                (id, Coordinate::new(lon, lat))
            })
            .collect();

        {
            let mut cache = PersistentNodeCache::create(&path, DEFAULT_SCALE).expect("create");
            for (&id, coord) in &expected {
                cache.set(id, *coord).expect("set");
            }
            cache.close().expect("close");
        }

        let mut cache = PersistentNodeCache::open_append(&path, DEFAULT_SCALE).expect("reopen");
        for (&id, coord) in &expected {
            let got = cache.get(id).expect("get").expect("written id present");
            prop_assert!((got.lon - coord.lon).abs() <= EPS);
            prop_assert!((got.lat - coord.lat).abs() <= EPS);
        }
    }

    #[test]
    fn append_mode_round_trips_arbitrary_writes(
        writes in prop::collection::vec((0i64..50_000, -180.0f64..180.0, -85.0f64..85.0), 1..40),
    ) {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("flat.nodes");
        {
            let cache = PersistentNodeCache::create(&path, DEFAULT_SCALE).expect("create");
            cache.close().expect("close");
        }

        let mut cache = PersistentNodeCache::open_append(&path, DEFAULT_SCALE).expect("reopen");
        let mut expected: BTreeMap<i64, (f64, f64)> = BTreeMap::new();
        for &(id, lon, lat) in &writes {
            cache.set(id, Coordinate::new(lon, lat)).expect("set");
            expected.insert(id, (lon, lat));
        }
        for (&id, &(lon, lat)) in &expected {
            let got = cache.get(id).expect("get").expect("written id present");
            prop_assert!((got.lon - lon).abs() <= EPS);
            prop_assert!((got.lat - lat).abs() <= EPS);
        }
    }
}
