//! File-level persistence tests for .bhmap artifacts.

use std::fs;

use bhitti_map::io::{
    FORMAT_VERSION, HEADER_SIZE, RECORD_SIZE, artifact_path, load_map, load_or_empty, save_map,
};
use bhitti_map::{EvictionPolicy, MapPolicy, PersistenceError, Point3D, SpatialMap};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

fn populated_map(policy: MapPolicy, n: usize, seed: u64) -> SpatialMap {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut map = SpatialMap::new(policy).unwrap();
    for _ in 0..n {
        let point = Point3D::new(
            rng.gen_range(-5.0..5.0),
            rng.gen_range(-1.0..2.0),
            rng.gen_range(-5.0..5.0),
            rng.gen_range(0.0..=1.0),
        );
        map.insert(point, 0.0);
    }
    map
}

fn positions(map: &SpatialMap) -> Vec<[u32; 4]> {
    map.iter()
        .map(|p| {
            [
                p.x.to_bits(),
                p.y.to_bits(),
                p.z.to_bits(),
                p.confidence.to_bits(),
            ]
        })
        .collect()
}

#[test]
fn test_round_trip_is_bit_exact() {
    let dir = TempDir::new().unwrap();
    let policy = MapPolicy::raw().with_max_points(2_000);
    let map = populated_map(policy.clone(), 3_000, 1);
    let path = artifact_path(dir.path(), &policy.artifact);

    save_map(&map.snapshot(), &path).unwrap();
    let loaded = load_map(&path, &policy).unwrap();

    assert_eq!(loaded.len(), map.len());
    assert_eq!(positions(&loaded), positions(&map));
    assert!(loaded.version() >= map.version());
    assert!(loaded.is_consistent());

    let size = fs::metadata(&path).unwrap().len() as usize;
    assert_eq!(size, HEADER_SIZE + map.len() * RECORD_SIZE);
}

#[test]
fn test_round_trip_empty_map() {
    let dir = TempDir::new().unwrap();
    let policy = MapPolicy::partial();
    let path = artifact_path(dir.path(), &policy.artifact);

    save_map(&SpatialMap::new(policy.clone()).unwrap().snapshot(), &path).unwrap();
    let loaded = load_map(&path, &policy).unwrap();
    assert!(loaded.is_empty());
}

#[test]
fn test_save_replaces_previous_artifact() {
    let dir = TempDir::new().unwrap();
    let policy = MapPolicy::partial();
    let path = artifact_path(dir.path(), &policy.artifact);

    save_map(&populated_map(policy.clone(), 500, 2).snapshot(), &path).unwrap();
    let second = populated_map(policy.clone(), 10, 3);
    save_map(&second.snapshot(), &path).unwrap();

    let loaded = load_map(&path, &policy).unwrap();
    assert_eq!(positions(&loaded), positions(&second));

    // No temporary file left behind
    let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_load_into_smaller_policy_evicts() {
    let dir = TempDir::new().unwrap();
    let big = MapPolicy::raw().with_max_points(1_000);
    let map = populated_map(big.clone(), 1_000, 4);
    let path = artifact_path(dir.path(), "export");
    save_map(&map.snapshot(), &path).unwrap();

    let small = MapPolicy::raw()
        .with_max_points(100)
        .with_eviction(EvictionPolicy::OldestFirst);
    let loaded = load_map(&path, &small).unwrap();
    assert_eq!(loaded.len(), 100);

    // Oldest-first keeps the newest 100 observations
    let expected = positions(&map)[map.len() - 100..].to_vec();
    assert_eq!(positions(&loaded), expected);
}

#[test]
fn test_missing_artifact_is_never_saved() {
    let dir = TempDir::new().unwrap();
    let path = artifact_path(dir.path(), "absent");
    assert_eq!(
        load_map(&path, &MapPolicy::partial()).unwrap_err(),
        PersistenceError::NeverSaved
    );
}

#[test]
fn test_corrupt_artifacts() {
    let dir = TempDir::new().unwrap();
    let policy = MapPolicy::partial();
    let path = artifact_path(dir.path(), &policy.artifact);
    save_map(&populated_map(policy.clone(), 50, 5).snapshot(), &path).unwrap();
    let good = fs::read(&path).unwrap();

    // Truncated inside the point data
    fs::write(&path, &good[..good.len() - 3]).unwrap();
    assert!(matches!(
        load_map(&path, &policy),
        Err(PersistenceError::Corrupt(_))
    ));

    // Wrong magic
    let mut bad = good.clone();
    bad[0] = b'X';
    fs::write(&path, &bad).unwrap();
    assert!(matches!(
        load_map(&path, &policy),
        Err(PersistenceError::Corrupt(_))
    ));

    // Future format version
    let mut bad = good.clone();
    bad[5] = FORMAT_VERSION + 1;
    fs::write(&path, &bad).unwrap();
    assert_eq!(
        load_map(&path, &policy).unwrap_err(),
        PersistenceError::VersionMismatch {
            expected: FORMAT_VERSION,
            found: FORMAT_VERSION + 1,
        }
    );

    // Zero-length file
    fs::write(&path, b"").unwrap();
    assert_eq!(
        load_map(&path, &policy).unwrap_err(),
        PersistenceError::NeverSaved
    );
}

#[test]
fn test_load_or_empty_falls_back() {
    let dir = TempDir::new().unwrap();
    let policy = MapPolicy::partial();
    let path = artifact_path(dir.path(), &policy.artifact);
    fs::write(&path, b"not a map at all, just some text").unwrap();

    let (map, error) = load_or_empty(&path, &policy).unwrap();
    assert!(map.is_empty());
    assert!(matches!(error, Some(PersistenceError::Corrupt(_))));

    let (map, error) = load_or_empty(&artifact_path(dir.path(), "absent"), &policy).unwrap();
    assert!(map.is_empty());
    assert_eq!(error, Some(PersistenceError::NeverSaved));

    // An invalid policy is a caller error, not a fallback
    let invalid = MapPolicy::partial().with_max_points(0);
    assert!(load_or_empty(&path, &invalid).is_err());
}
