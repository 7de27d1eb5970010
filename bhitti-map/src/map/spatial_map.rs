//! Bounded, deduplicated point map.
//!
//! Points are keyed by the grid cell that contains them. A cell holds at most
//! one point: a new observation replaces the stored one only when it is
//! strictly more confident. When the map is full, a new cell displaces the
//! victim chosen by the map's [`EvictionPolicy`].
//!
//! All operations are amortized O(log n) or better. Ordered reads are a
//! single O(n) walk of the insertion-order index.

use std::collections::HashMap;

use crate::config::{EvictionPolicy, MapPolicy, SettingsError};
use crate::core::{Bounds3, CellKey, Point3D};

use super::columns::ColumnIndex;
use super::eviction::EvictionIndex;
use super::order::InsertionOrder;
use super::snapshot::MapSnapshot;

/// Stale index entries tolerated before an index is compacted
const COMPACT_SLACK: usize = 64;

/// Result of inserting a single point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InsertOutcome {
    /// Stored in a previously empty cell
    Inserted,
    /// Stored in a new cell after evicting the given point
    InsertedWithEviction(Point3D),
    /// Replaced a less confident point in the same cell
    Replaced(Point3D),
    /// Cell already holds a point at least as confident
    Discarded,
    /// Below the confidence threshold or not a finite point
    Rejected,
}

impl InsertOutcome {
    /// True if the point is now stored
    pub fn is_stored(&self) -> bool {
        matches!(
            self,
            InsertOutcome::Inserted
                | InsertOutcome::InsertedWithEviction(_)
                | InsertOutcome::Replaced(_)
        )
    }
}

/// Counters for a batch of insertions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InsertStats {
    /// Points stored in new cells
    pub inserted: usize,
    /// Points that replaced a weaker point in their cell
    pub replaced: usize,
    /// Points dropped in favor of an existing point
    pub discarded: usize,
    /// Points failing the threshold or finiteness check
    pub rejected: usize,
    /// Points evicted to stay within capacity
    pub evicted: usize,
}

impl InsertStats {
    /// Account for one outcome
    #[inline]
    pub fn record(&mut self, outcome: &InsertOutcome) {
        match outcome {
            InsertOutcome::Inserted => self.inserted += 1,
            InsertOutcome::InsertedWithEviction(_) => {
                self.inserted += 1;
                self.evicted += 1;
            }
            InsertOutcome::Replaced(_) => self.replaced += 1,
            InsertOutcome::Discarded => self.discarded += 1,
            InsertOutcome::Rejected => self.rejected += 1,
        }
    }

    /// Merge another batch into this one
    pub fn merge(&mut self, other: &InsertStats) {
        self.inserted += other.inserted;
        self.replaced += other.replaced;
        self.discarded += other.discarded;
        self.rejected += other.rejected;
        self.evicted += other.evicted;
    }

    /// Points that changed the map
    pub fn accepted(&self) -> usize {
        self.inserted + self.replaced
    }

    /// Points offered
    pub fn total(&self) -> usize {
        self.inserted + self.replaced + self.discarded + self.rejected
    }
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    point: Point3D,
    seq: u64,
}

/// Bounded point map with per-cell deduplication.
#[derive(Clone, Debug)]
pub struct SpatialMap {
    policy: MapPolicy,
    slots: HashMap<CellKey, Slot>,
    eviction: EvictionIndex,
    order: InsertionOrder,
    columns: ColumnIndex,
    next_seq: u64,
    version: u64,
}

impl SpatialMap {
    /// Create an empty map for a validated policy.
    pub fn new(policy: MapPolicy) -> Result<Self, SettingsError> {
        policy.validate()?;
        Ok(Self {
            eviction: EvictionIndex::new(policy.eviction),
            order: InsertionOrder::new(),
            slots: HashMap::with_capacity(policy.max_points.min(4096)),
            columns: ColumnIndex::new(),
            policy,
            next_seq: 0,
            version: 0,
        })
    }

    /// Policy the map was built with
    pub fn policy(&self) -> &MapPolicy {
        &self.policy
    }

    /// Grid cell size (meters)
    #[inline]
    pub fn resolution(&self) -> f32 {
        self.policy.resolution
    }

    /// Maximum number of stored points
    #[inline]
    pub fn capacity(&self) -> usize {
        self.policy.max_points
    }

    /// Eviction strategy
    pub fn eviction(&self) -> EvictionPolicy {
        self.policy.eviction
    }

    /// Stored point count
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if no points are stored
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// True if the next new cell will evict
    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.policy.max_points
    }

    /// Incremented by every change
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Cell key for a point at this map's resolution
    #[inline]
    pub fn key_for(&self, point: &Point3D) -> Option<CellKey> {
        CellKey::of(point, self.policy.resolution)
    }

    /// Point stored in a cell
    pub fn get(&self, key: &CellKey) -> Option<&Point3D> {
        self.slots.get(key).map(|slot| &slot.point)
    }

    /// Point stored in the cell containing a world position
    pub fn point_at(&self, x: f32, y: f32, z: f32) -> Option<&Point3D> {
        let key = CellKey::from_position(x, y, z, self.policy.resolution)?;
        self.get(&key)
    }

    /// True if the cell holds a point
    pub fn contains_key(&self, key: &CellKey) -> bool {
        self.slots.contains_key(key)
    }

    /// True if the cell containing `point` holds a point
    pub fn contains_point(&self, point: &Point3D) -> bool {
        self.key_for(point)
            .is_some_and(|key| self.slots.contains_key(&key))
    }

    /// Stored points with their cells, in arbitrary order
    pub fn cells(&self) -> impl Iterator<Item = (&CellKey, &Point3D)> {
        self.slots.iter().map(|(key, slot)| (key, &slot.point))
    }

    /// Stored points, oldest observation first
    pub fn iter(&self) -> impl Iterator<Item = Point3D> + '_ {
        let slots = &self.slots;
        self.order
            .live(move |key, seq| slots.get(key).is_some_and(|slot| slot.seq == seq))
            .filter_map(move |key| slots.get(&key).map(|slot| slot.point))
    }

    /// Stored points collected in insertion order
    pub fn points_in_order(&self) -> Vec<Point3D> {
        let mut ordered = Vec::with_capacity(self.slots.len());
        ordered.extend(self.iter());
        ordered
    }

    /// Bounding box of the stored points
    pub fn bounds(&self) -> Option<Bounds3> {
        Bounds3::from_points(self.slots.values().map(|slot| &slot.point))
    }

    /// Number of occupied ground-plane columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Points stored in a ground-plane column
    pub fn column_points(&self, column: (i32, i32)) -> u32 {
        self.columns.count(column)
    }

    /// Occupied ground-plane columns with their point counts
    pub fn occupied_columns(&self) -> impl Iterator<Item = ((i32, i32), u32)> + '_ {
        self.columns.iter()
    }

    /// Insert one point.
    ///
    /// The point is rejected if it is not finite, its confidence is outside
    /// [0, 1], or it is below `min_confidence`. An occupied cell keeps the
    /// stored point unless the new one is strictly more confident.
    pub fn insert(&mut self, point: Point3D, min_confidence: f32) -> InsertOutcome {
        if !point.is_finite()
            || !(0.0..=1.0).contains(&point.confidence)
            || point.confidence < min_confidence
        {
            return InsertOutcome::Rejected;
        }
        let Some(key) = self.key_for(&point) else {
            return InsertOutcome::Rejected;
        };

        if let Some(slot) = self.slots.get_mut(&key) {
            if point.confidence <= slot.point.confidence {
                return InsertOutcome::Discarded;
            }
            let previous = slot.point;
            let seq = self.next_seq;
            self.next_seq += 1;
            slot.point = point;
            slot.seq = seq;
            self.eviction.push(key, seq, point.confidence);
            self.order.push(key, seq);
            self.version += 1;
            self.maybe_compact();
            return InsertOutcome::Replaced(previous);
        }

        let evicted = if self.is_full() {
            self.evict_one()
        } else {
            None
        };
        if self.is_full() {
            // Index lost track of a live slot; refuse rather than overgrow
            log::warn!(
                "[{}] No eviction candidate with {} points stored",
                self.policy.name,
                self.slots.len()
            );
            return InsertOutcome::Discarded;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots.insert(key, Slot { point, seq });
        self.eviction.push(key, seq, point.confidence);
        self.order.push(key, seq);
        self.columns.add(key.column());
        self.version += 1;
        self.maybe_compact();

        match evicted {
            Some(victim) => InsertOutcome::InsertedWithEviction(victim),
            None => InsertOutcome::Inserted,
        }
    }

    /// Insert a batch, all against the same threshold.
    pub fn insert_batch<I>(&mut self, points: I, min_confidence: f32) -> InsertStats
    where
        I: IntoIterator<Item = Point3D>,
    {
        let mut stats = InsertStats::default();
        for point in points {
            let outcome = self.insert(point, min_confidence);
            stats.record(&outcome);
        }
        stats
    }

    /// Remove the point stored in a cell
    pub fn remove(&mut self, key: &CellKey) -> Option<Point3D> {
        let slot = self.slots.remove(key)?;
        self.columns.remove(key.column());
        self.version += 1;
        self.maybe_compact();
        Some(slot.point)
    }

    /// Remove every point. The version keeps increasing.
    pub fn clear(&mut self) {
        self.slots = HashMap::new();
        self.eviction = EvictionIndex::new(self.policy.eviction);
        self.order = InsertionOrder::new();
        self.columns = ColumnIndex::new();
        self.version += 1;
    }

    /// Immutable copy for readers
    pub fn snapshot(&self) -> MapSnapshot {
        MapSnapshot::new(self.version, &self.policy, self.points_in_order())
    }

    /// Raise the version to at least `floor`
    pub(crate) fn raise_version(&mut self, floor: u64) {
        self.version = self.version.max(floor);
    }

    /// Full structural self-check. O(n), meant for tests and debugging.
    pub fn is_consistent(&self) -> bool {
        if self.slots.len() > self.policy.max_points {
            return false;
        }
        if self.columns.total() != self.slots.len() {
            return false;
        }
        if self.eviction.len() < self.slots.len() || self.order.len() < self.slots.len() {
            return false;
        }
        self.slots.iter().all(|(key, slot)| {
            self.key_for(&slot.point) == Some(*key)
                && slot.seq < self.next_seq
                && slot.point.confidence.is_finite()
        })
    }

    fn evict_one(&mut self) -> Option<Point3D> {
        let mut victim = self.pop_victim();
        if victim.is_none() && !self.slots.is_empty() {
            self.rebuild_eviction();
            victim = self.pop_victim();
        }
        let key = victim?;
        let slot = self.slots.remove(&key)?;
        self.columns.remove(key.column());
        log::trace!(
            "[{}] Evicted {:?} (confidence {:.2})",
            self.policy.name,
            key,
            slot.point.confidence
        );
        Some(slot.point)
    }

    fn pop_victim(&mut self) -> Option<CellKey> {
        let slots = &self.slots;
        self.eviction
            .pop_victim(|key, seq| slots.get(key).is_some_and(|slot| slot.seq == seq))
    }

    fn maybe_compact(&mut self) {
        let bound = 2 * self.slots.len() + COMPACT_SLACK;
        if self.eviction.len() > bound {
            self.rebuild_eviction();
        }
        if self.order.len() > bound {
            let slots = &self.slots;
            self.order
                .compact(|key, seq| slots.get(key).is_some_and(|slot| slot.seq == seq));
        }
    }

    fn rebuild_eviction(&mut self) {
        let live = self
            .slots
            .iter()
            .map(|(key, slot)| (*key, slot.seq, slot.point.confidence));
        self.eviction.rebuild(live);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial(max_points: usize) -> SpatialMap {
        SpatialMap::new(
            MapPolicy::partial()
                .with_max_points(max_points)
                .with_resolution(0.05),
        )
        .unwrap()
    }

    fn weakest(max_points: usize) -> SpatialMap {
        SpatialMap::new(
            MapPolicy::partial()
                .with_max_points(max_points)
                .with_resolution(0.05)
                .with_eviction(EvictionPolicy::LowestConfidenceFirst),
        )
        .unwrap()
    }

    /// Points spaced one cell apart along X
    fn spaced(i: usize, confidence: f32) -> Point3D {
        Point3D::new(i as f32 * 0.1 + 0.01, 0.01, 0.01, confidence)
    }

    #[test]
    fn test_invalid_policy_rejected() {
        assert!(SpatialMap::new(MapPolicy::partial().with_max_points(0)).is_err());
        assert!(SpatialMap::new(MapPolicy::partial().with_resolution(0.0)).is_err());
    }

    #[test]
    fn test_threshold() {
        let mut map = partial(10);
        assert_eq!(map.insert(spaced(0, 0.44), 0.45), InsertOutcome::Rejected);
        assert_eq!(map.insert(spaced(0, 0.45), 0.45), InsertOutcome::Inserted);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_malformed_points_rejected() {
        let mut map = partial(10);
        assert_eq!(
            map.insert(Point3D::new(f32::NAN, 0.0, 0.0, 0.9), 0.0),
            InsertOutcome::Rejected
        );
        assert_eq!(
            map.insert(Point3D::new(0.0, f32::INFINITY, 0.0, 0.9), 0.0),
            InsertOutcome::Rejected
        );
        assert_eq!(
            map.insert(Point3D::new(0.0, 0.0, 0.0, 1.5), 0.0),
            InsertOutcome::Rejected
        );
        // Representable but outside the i32 key range
        assert_eq!(
            map.insert(Point3D::new(1e12, 0.0, 0.0, 0.9), 0.0),
            InsertOutcome::Rejected
        );
        assert!(map.is_empty());
    }

    #[test]
    fn test_dedup_keeps_most_confident() {
        let mut map = partial(10);
        let a = Point3D::new(1.02, 1.02, 1.02, 0.5);
        let b = Point3D::new(1.021, 1.021, 1.021, 0.3);
        let c = Point3D::new(1.019, 1.022, 1.02, 0.9);
        // All three quantize to the same cell
        assert_eq!(map.key_for(&a), map.key_for(&c));

        assert_eq!(map.insert(a, 0.0), InsertOutcome::Inserted);
        assert_eq!(map.insert(b, 0.0), InsertOutcome::Discarded);
        assert_eq!(map.len(), 1);
        assert_eq!(map.point_at(1.02, 1.02, 1.02).unwrap().confidence, 0.5);

        assert_eq!(map.insert(c, 0.0), InsertOutcome::Replaced(a));
        assert_eq!(map.len(), 1);
        assert_eq!(map.point_at(1.02, 1.02, 1.02).unwrap().confidence, 0.9);
    }

    #[test]
    fn test_equal_confidence_keeps_existing() {
        let mut map = partial(10);
        let first = Point3D::new(0.01, 0.01, 0.01, 0.6);
        let second = Point3D::new(0.02, 0.02, 0.02, 0.6);
        map.insert(first, 0.0);
        assert_eq!(map.insert(second, 0.0), InsertOutcome::Discarded);
        assert_eq!(map.point_at(0.0, 0.0, 0.0), Some(&first));
    }

    #[test]
    fn test_bound_oldest_first() {
        let mut map = partial(5);
        for i in 0..5 {
            map.insert(spaced(i, 0.5), 0.0);
        }
        assert!(map.is_full());

        let outcome = map.insert(spaced(5, 0.5), 0.0);
        assert_eq!(outcome, InsertOutcome::InsertedWithEviction(spaced(0, 0.5)));
        assert_eq!(map.len(), 5);
        assert!(map.get(&map.key_for(&spaced(0, 0.5)).unwrap()).is_none());
        assert!(map.is_consistent());
    }

    #[test]
    fn test_replacement_refreshes_age() {
        let mut map = partial(3);
        map.insert(spaced(0, 0.5), 0.0);
        map.insert(spaced(1, 0.5), 0.0);
        map.insert(spaced(2, 0.5), 0.0);
        // Re-observe cell 0 with better confidence
        map.insert(spaced(0, 0.8), 0.0);

        let outcome = map.insert(spaced(3, 0.5), 0.0);
        assert_eq!(outcome, InsertOutcome::InsertedWithEviction(spaced(1, 0.5)));
        assert!(map.get(&map.key_for(&spaced(0, 0.8)).unwrap()).is_some());
    }

    #[test]
    fn test_bound_lowest_confidence_first() {
        let mut map = weakest(3);
        map.insert(spaced(0, 0.9), 0.0);
        map.insert(spaced(1, 0.4), 0.0);
        map.insert(spaced(2, 0.7), 0.0);

        let outcome = map.insert(spaced(3, 0.6), 0.0);
        assert_eq!(outcome, InsertOutcome::InsertedWithEviction(spaced(1, 0.4)));

        let mut confidences: Vec<f32> = map.cells().map(|(_, p)| p.confidence).collect();
        confidences.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(confidences, vec![0.6, 0.7, 0.9]);
    }

    #[test]
    fn test_weakest_uses_current_confidence_after_replace() {
        let mut map = weakest(2);
        map.insert(spaced(0, 0.3), 0.0);
        map.insert(spaced(1, 0.5), 0.0);
        // Cell 0 upgraded: its stale 0.3 entry must not make it the victim
        map.insert(spaced(0, 0.95), 0.0);

        let outcome = map.insert(spaced(2, 0.6), 0.0);
        assert_eq!(outcome, InsertOutcome::InsertedWithEviction(spaced(1, 0.5)));
    }

    #[test]
    fn test_capacity_under_churn() {
        let mut map = partial(50);
        for round in 0..20 {
            for i in 0..200 {
                let confidence = 0.1 + (round as f32) * 0.04;
                map.insert(spaced(i % 80, confidence.min(1.0)), 0.0);
            }
            assert!(map.len() <= 50);
            assert!(map.is_consistent());
        }
        // Stale entries are compacted away
        assert!(map.eviction.len() <= 2 * map.len() + COMPACT_SLACK);
        assert!(map.order.len() <= 2 * map.len() + COMPACT_SLACK);
    }

    #[test]
    fn test_order_survives_churn_and_compaction() {
        use rand::{Rng, SeedableRng, rngs::StdRng};

        let mut map = partial(40);
        // Independent record of each cell's latest stored observation
        let mut latest: HashMap<CellKey, (u64, Point3D)> = HashMap::new();
        let mut rng = StdRng::seed_from_u64(7);
        let mut tick = 0u64;

        for step in 0..3000 {
            let cell = rng.gen_range(0..120);
            let point = spaced(cell, rng.gen_range(0.0..1.0));
            let key = map.key_for(&point).unwrap();
            match map.insert(point, 0.0) {
                InsertOutcome::Inserted | InsertOutcome::Replaced(_) => {
                    latest.insert(key, (tick, point));
                }
                InsertOutcome::InsertedWithEviction(victim) => {
                    latest.remove(&map.key_for(&victim).unwrap());
                    latest.insert(key, (tick, point));
                }
                _ => {}
            }
            tick += 1;
            if step % 97 == 0 {
                let gone = map.key_for(&spaced(rng.gen_range(0..120), 0.5)).unwrap();
                if map.remove(&gone).is_some() {
                    latest.remove(&gone);
                }
            }

            if step % 250 == 0 {
                let mut expected: Vec<(u64, Point3D)> = latest.values().copied().collect();
                expected.sort_by_key(|(t, _)| *t);
                let expected: Vec<Point3D> = expected.into_iter().map(|(_, p)| p).collect();
                assert_eq!(map.points_in_order(), expected);
                assert_eq!(map.snapshot().points(), expected.as_slice());
            }
            assert!(map.order.len() <= 2 * map.len() + COMPACT_SLACK);
        }
        assert!(map.is_consistent());
    }

    #[test]
    fn test_insert_batch_stats() {
        let mut map = partial(2);
        let stats = map.insert_batch(
            vec![
                spaced(0, 0.5),
                spaced(0, 0.4),
                spaced(0, 0.6),
                spaced(1, 0.2),
                spaced(2, 0.5),
                spaced(3, 0.5),
            ],
            0.3,
        );
        assert_eq!(stats.inserted, 3);
        assert_eq!(stats.replaced, 1);
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.evicted, 1);
        assert_eq!(stats.total(), 6);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_columns_track_points() {
        let mut map = partial(10);
        map.insert(Point3D::new(0.01, 0.01, 0.01, 0.5), 0.0);
        map.insert(Point3D::new(0.01, 1.01, 0.01, 0.5), 0.0);
        map.insert(Point3D::new(1.01, 0.01, 0.01, 0.5), 0.0);
        assert_eq!(map.column_count(), 2);
        assert_eq!(map.column_points((0, 0)), 2);

        let key = map.key_for(&Point3D::new(0.01, 1.01, 0.01, 0.5)).unwrap();
        map.remove(&key);
        assert_eq!(map.column_points((0, 0)), 1);
        assert!(map.is_consistent());
    }

    #[test]
    fn test_clear() {
        let mut map = partial(10);
        for i in 0..5 {
            map.insert(spaced(i, 0.5), 0.0);
        }
        let before = map.version();
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.column_count(), 0);
        assert!(map.version() > before);
        assert!(map.bounds().is_none());

        // Usable after clear
        assert_eq!(map.insert(spaced(0, 0.5), 0.0), InsertOutcome::Inserted);
    }

    #[test]
    fn test_snapshot_is_ordered_and_independent() {
        let mut map = partial(10);
        for i in [3usize, 1, 2] {
            map.insert(spaced(i, 0.5), 0.0);
        }
        let snapshot = map.snapshot();
        map.insert(spaced(7, 0.5), 0.0);

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.points()[0], spaced(3, 0.5));
        assert_eq!(snapshot.points()[2], spaced(2, 0.5));
        assert_eq!(map.iter().last(), Some(spaced(7, 0.5)));
        assert!(map.contains_point(&spaced(1, 0.9)));
        assert!(snapshot.version() < map.version());
    }

    #[test]
    fn test_version_unchanged_by_rejections() {
        let mut map = partial(10);
        map.insert(spaced(0, 0.5), 0.0);
        let version = map.version();
        map.insert(spaced(0, 0.4), 0.0);
        map.insert(spaced(1, 0.1), 0.45);
        assert_eq!(map.version(), version);
    }
}
