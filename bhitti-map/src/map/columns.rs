//! Ground-plane column occupancy.
//!
//! Counts stored points per (X, Z) column so the overlay and the info tool
//! can report covered floor area without scanning the map.

use std::collections::HashMap;

/// Per-column point counts
#[derive(Clone, Debug, Default)]
pub(crate) struct ColumnIndex {
    counts: HashMap<(i32, i32), u32>,
}

impl ColumnIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn add(&mut self, column: (i32, i32)) {
        *self.counts.entry(column).or_insert(0) += 1;
    }

    #[inline]
    pub(crate) fn remove(&mut self, column: (i32, i32)) {
        if let Some(count) = self.counts.get_mut(&column) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&column);
            }
        }
    }

    /// Points stored in a column
    pub(crate) fn count(&self, column: (i32, i32)) -> u32 {
        self.counts.get(&column).copied().unwrap_or(0)
    }

    /// Number of occupied columns
    pub(crate) fn len(&self) -> usize {
        self.counts.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = ((i32, i32), u32)> + '_ {
        self.counts.iter().map(|(column, count)| (*column, *count))
    }

    /// Sum over all columns
    pub(crate) fn total(&self) -> usize {
        self.counts.values().map(|&c| c as usize).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_remove() {
        let mut columns = ColumnIndex::new();
        columns.add((1, 2));
        columns.add((1, 2));
        columns.add((0, 0));
        assert_eq!(columns.len(), 2);
        assert_eq!(columns.count((1, 2)), 2);

        columns.remove((1, 2));
        columns.remove((1, 2));
        assert_eq!(columns.count((1, 2)), 0);
        assert_eq!(columns.len(), 1);
        assert_eq!(columns.total(), 1);

        // Removing an absent column is a no-op
        columns.remove((9, 9));
        assert_eq!(columns.len(), 1);
    }
}
