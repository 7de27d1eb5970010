//! Insertion order of the stored observations.
//!
//! Every insert or replacement appends `(key, seq)`. Entries whose slot has
//! since been replaced, evicted or removed go stale and are skipped while
//! walking. Compaction filters in place, so the queue stays sorted by `seq`
//! and an ordered walk never needs a sort.

use std::collections::VecDeque;

use crate::core::CellKey;

#[derive(Clone, Debug, Default)]
pub(crate) struct InsertionOrder {
    entries: VecDeque<(CellKey, u64)>,
}

impl InsertionOrder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record an observation; `seq` must exceed every earlier one
    #[inline]
    pub(crate) fn push(&mut self, key: CellKey, seq: u64) {
        self.entries.push_back((key, seq));
    }

    /// Entries including stale ones
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Live keys, oldest observation first
    pub(crate) fn live<'a, F>(&'a self, is_live: F) -> impl Iterator<Item = CellKey> + 'a
    where
        F: Fn(&CellKey, u64) -> bool + 'a,
    {
        self.entries
            .iter()
            .filter(move |(key, seq)| is_live(key, *seq))
            .map(|(key, _)| *key)
    }

    /// Drop stale entries, keeping order
    pub(crate) fn compact<F>(&mut self, is_live: F)
    where
        F: Fn(&CellKey, u64) -> bool,
    {
        self.entries.retain(|(key, seq)| is_live(key, *seq));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn key(i: i32) -> CellKey {
        CellKey::new(i, 0, 0)
    }

    #[test]
    fn test_live_skips_superseded_entries() {
        let mut order = InsertionOrder::new();
        order.push(key(1), 0);
        order.push(key(2), 1);
        order.push(key(1), 2);
        order.push(key(3), 3);

        // key 1 re-observed at seq 2, key 3 evicted
        let live: HashMap<CellKey, u64> = [(key(1), 2), (key(2), 1)].into_iter().collect();
        let is_live = |k: &CellKey, seq: u64| live.get(k) == Some(&seq);
        let keys: Vec<CellKey> = order.live(is_live).collect();
        assert_eq!(keys, vec![key(2), key(1)]);

        order.compact(is_live);
        assert_eq!(order.len(), 2);
        assert_eq!(order.live(is_live).collect::<Vec<_>>(), vec![key(2), key(1)]);
    }
}
