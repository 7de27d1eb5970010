//! Eviction ordering for a full map.
//!
//! Both orders use lazy invalidation: replacing or evicting a point does not
//! search the index. Each entry carries the sequence number of the
//! observation it was pushed for, and an entry is live only while the map
//! slot still holds that sequence. Stale entries are skipped on pop and
//! dropped when the owner compacts the index.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use crate::config::EvictionPolicy;
use crate::core::CellKey;

/// Entry in the insertion-order queue
#[derive(Clone, Copy, Debug)]
struct QueueEntry {
    key: CellKey,
    seq: u64,
}

/// Entry in the confidence heap. Ordered by confidence, then age.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct HeapEntry {
    rank: u32,
    seq: u64,
    key: CellKey,
}

/// Total order over confidences in [0, 1].
///
/// For non-negative finite floats the IEEE bit pattern is monotonic, so the
/// bits can be compared as integers. Negative zero is folded onto zero.
#[inline]
fn confidence_rank(confidence: f32) -> u32 {
    if confidence <= 0.0 {
        0
    } else {
        confidence.to_bits()
    }
}

/// Victim selection index
#[derive(Clone, Debug)]
pub(crate) enum EvictionIndex {
    /// Oldest observation first
    Oldest(VecDeque<QueueEntry>),
    /// Lowest confidence first
    Weakest(BinaryHeap<Reverse<HeapEntry>>),
}

impl EvictionIndex {
    pub(crate) fn new(policy: EvictionPolicy) -> Self {
        match policy {
            EvictionPolicy::OldestFirst => EvictionIndex::Oldest(VecDeque::new()),
            EvictionPolicy::LowestConfidenceFirst => EvictionIndex::Weakest(BinaryHeap::new()),
        }
    }

    /// Record an observation now held by `key`
    #[inline]
    pub(crate) fn push(&mut self, key: CellKey, seq: u64, confidence: f32) {
        match self {
            EvictionIndex::Oldest(queue) => queue.push_back(QueueEntry { key, seq }),
            EvictionIndex::Weakest(heap) => heap.push(Reverse(HeapEntry {
                rank: confidence_rank(confidence),
                seq,
                key,
            })),
        }
    }

    /// Pop the next live victim. `is_live(key, seq)` reports whether the map
    /// slot still holds that observation.
    pub(crate) fn pop_victim<F>(&mut self, is_live: F) -> Option<CellKey>
    where
        F: Fn(&CellKey, u64) -> bool,
    {
        match self {
            EvictionIndex::Oldest(queue) => {
                while let Some(entry) = queue.pop_front() {
                    if is_live(&entry.key, entry.seq) {
                        return Some(entry.key);
                    }
                }
                None
            }
            EvictionIndex::Weakest(heap) => {
                while let Some(Reverse(entry)) = heap.pop() {
                    if is_live(&entry.key, entry.seq) {
                        return Some(entry.key);
                    }
                }
                None
            }
        }
    }

    /// Entries including stale ones
    pub(crate) fn len(&self) -> usize {
        match self {
            EvictionIndex::Oldest(queue) => queue.len(),
            EvictionIndex::Weakest(heap) => heap.len(),
        }
    }

    /// Rebuild from the live `(key, seq, confidence)` set.
    pub(crate) fn rebuild<I>(&mut self, live: I)
    where
        I: IntoIterator<Item = (CellKey, u64, f32)>,
    {
        match self {
            EvictionIndex::Oldest(queue) => {
                let mut entries: Vec<QueueEntry> = live
                    .into_iter()
                    .map(|(key, seq, _)| QueueEntry { key, seq })
                    .collect();
                entries.sort_unstable_by_key(|e| e.seq);
                *queue = entries.into();
            }
            EvictionIndex::Weakest(heap) => {
                let entries: Vec<Reverse<HeapEntry>> = live
                    .into_iter()
                    .map(|(key, seq, confidence)| {
                        Reverse(HeapEntry {
                            rank: confidence_rank(confidence),
                            seq,
                            key,
                        })
                    })
                    .collect();
                *heap = BinaryHeap::from(entries);
            }
        }
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
    fn test_confidence_rank_is_monotonic() {
        let values = [0.0f32, 1e-6, 0.1, 0.3, 0.5, 0.9, 1.0];
        for pair in values.windows(2) {
            assert!(confidence_rank(pair[0]) < confidence_rank(pair[1]));
        }
        assert_eq!(confidence_rank(-0.0), confidence_rank(0.0));
    }

    #[test]
    fn test_oldest_skips_stale_entries() {
        let mut index = EvictionIndex::new(EvictionPolicy::OldestFirst);
        index.push(key(1), 0, 0.5);
        index.push(key(2), 1, 0.5);
        // key 1 re-observed: its seq-0 entry is stale
        index.push(key(1), 2, 0.9);

        let live: HashMap<CellKey, u64> = [(key(1), 2), (key(2), 1)].into_iter().collect();
        let victim = index.pop_victim(|k, seq| live.get(k) == Some(&seq));
        assert_eq!(victim, Some(key(2)));
    }

    #[test]
    fn test_weakest_orders_by_confidence_then_age() {
        let mut index = EvictionIndex::new(EvictionPolicy::LowestConfidenceFirst);
        index.push(key(1), 0, 0.7);
        index.push(key(2), 1, 0.4);
        index.push(key(3), 2, 0.4);

        let victim = index.pop_victim(|_, _| true);
        assert_eq!(victim, Some(key(2)));
        let victim = index.pop_victim(|_, _| true);
        assert_eq!(victim, Some(key(3)));
        let victim = index.pop_victim(|_, _| true);
        assert_eq!(victim, Some(key(1)));
        assert_eq!(index.pop_victim(|_, _| true), None);
    }

    #[test]
    fn test_rebuild_drops_stale() {
        let mut index = EvictionIndex::new(EvictionPolicy::OldestFirst);
        for i in 0..10 {
            index.push(key(0), i, 0.5);
        }
        assert_eq!(index.len(), 10);
        index.rebuild([(key(0), 9, 0.5)]);
        assert_eq!(index.len(), 1);
    }
}
