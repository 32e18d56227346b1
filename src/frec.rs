//! Frequency-ranked adjacency lists.
//!
//! A [`FrecTable`] keeps `(count, target)` entries sorted by descending count together with
//! a position index, so lookups are O(1) and an increment only moves the touched entry
//! forward past the entries it now outranks. Frequently seen targets migrate to the front
//! in small steps instead of triggering a full re-sort, which also keeps weighted sampling
//! short on average: the heaviest entries are scanned first.

use std::hash::Hash;

use rand::Rng;
use rustc_hash::FxHashMap;

use crate::error::{Result, WeaveError};

/// Occurrence count type stored in link tables.
pub type Count = u32;

/// Self-organizing frequency table keyed by `K`.
#[derive(Debug, Clone)]
pub struct FrecTable<K> {
    entries: Vec<(Count, K)>,
    index: FxHashMap<K, usize>,
    total: u64,
}

impl<K> Default for FrecTable<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: FxHashMap::default(),
            total: 0,
        }
    }
}

impl<K: Copy + Eq + Hash> FrecTable<K> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one more occurrence of `target`.
    ///
    /// An entry already at [`Count::MAX`] stays there and the total is left untouched, so
    /// the total always equals the sum of the entries.
    pub fn add(&mut self, target: K) {
        match self.index.get(&target).copied() {
            None => {
                self.index.insert(target, self.entries.len());
                self.entries.push((1, target));
            }
            Some(pos) => {
                let Some(next) = self.entries[pos].0.checked_add(1) else {
                    return;
                };
                self.entries[pos].0 = next;
                self.promote(pos);
            }
        }
        self.total += 1;
    }

    /// Moves the entry at `pos` directly behind the nearest preceding entry whose count is
    /// at least its own, or to the head when there is none.
    fn promote(&mut self, pos: usize) {
        let count = self.entries[pos].0;
        let mut dest = pos;
        while dest > 0 && self.entries[dest - 1].0 < count {
            dest -= 1;
        }
        if dest == pos {
            return;
        }
        self.entries[dest..=pos].rotate_right(1);
        for (offset, (_, key)) in self.entries[dest..=pos].iter().enumerate() {
            self.index.insert(*key, dest + offset);
        }
    }

    /// Appends an entry restored from storage.
    ///
    /// Entries must arrive in stored order: the table refuses duplicates and counts that would
    /// break the descending order, rather than re-sorting.
    pub fn push_sorted(&mut self, count: Count, target: K) -> Result<()> {
        if count == 0 {
            return Err(WeaveError::Corrupt("link count of zero".into()));
        }
        if self.entries.last().is_some_and(|&(last, _)| last < count) {
            return Err(WeaveError::Corrupt(format!(
                "link counts out of order ({count} after {})",
                self.entries.last().map_or(0, |e| e.0)
            )));
        }
        if self.index.contains_key(&target) {
            return Err(WeaveError::Corrupt("duplicate link target".into()));
        }
        self.index.insert(target, self.entries.len());
        self.entries.push((count, target));
        self.total += u64::from(count);
        Ok(())
    }

    /// Count recorded for `target`, zero when absent.
    #[must_use]
    pub fn count(&self, target: &K) -> Count {
        self.index
            .get(target)
            .map_or(0, |&pos| self.entries[pos].0)
    }

    /// Share of the total mass held by `target`.
    #[must_use]
    pub fn frequency(&self, target: &K) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        f64::from(self.count(target)) / self.total as f64
    }

    /// `true` when `target` has an entry.
    #[must_use]
    pub fn contains(&self, target: &K) -> bool {
        self.index.contains_key(target)
    }

    /// Sum of all entry counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of distinct targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when no occurrence has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in rank order (descending count).
    pub fn iter(&self) -> impl Iterator<Item = (Count, K)> + '_ {
        self.entries.iter().copied()
    }

    /// Most frequent target; ties resolve to the entry that reached the count first.
    #[must_use]
    pub fn top(&self) -> Option<K> {
        self.entries.first().map(|&(_, key)| key)
    }

    /// Draws a target with probability proportional to its count, or `None` when empty.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<K> {
        if self.total == 0 {
            return None;
        }
        let mut remaining = rng.gen_range(0..self.total);
        for &(count, key) in &self.entries {
            let count = u64::from(count);
            if remaining < count {
                return Some(key);
            }
            remaining -= count;
        }
        None
    }

    /// Overlap score in `[0, 1]` between two tables.
    ///
    /// Each target in the union contributes `2·√(f1·f2)/(f1+f2)` weighted by `√(f1²+f2²)`,
    /// where `f1`, `f2` are its fractional counts in each table. Identical distributions score
    /// one, disjoint ones zero.
    #[must_use]
    pub fn similarity(a: &Self, b: &Self) -> f64 {
        if a.total == 0 || b.total == 0 {
            return 0.0;
        }
        let (total_a, total_b) = (a.total as f64, b.total as f64);
        let mut weighted = 0.0;
        let mut weights = 0.0;
        let mut accumulate = |f1: f64, f2: f64| {
            let weight = f1.hypot(f2);
            let score = if f1 > 0.0 && f2 > 0.0 {
                2.0 * (f1 * f2).sqrt() / (f1 + f2)
            } else {
                0.0
            };
            weighted += weight * score;
            weights += weight;
        };
        for &(count, key) in &a.entries {
            let f1 = f64::from(count) / total_a;
            let f2 = f64::from(b.count(&key)) / total_b;
            accumulate(f1, f2);
        }
        for &(count, key) in &b.entries {
            if !a.contains(&key) {
                accumulate(0.0, f64::from(count) / total_b);
            }
        }
        if weights > 0.0 {
            weighted / weights
        } else {
            0.0
        }
    }

    /// Checks the structural invariants of the table.
    pub fn check_invariants(&self) -> Result<()> {
        if self.index.len() != self.entries.len() {
            return Err(WeaveError::Internal("index size mismatch".into()));
        }
        for (pos, &(_, key)) in self.entries.iter().enumerate() {
            if self.index.get(&key) != Some(&pos) {
                return Err(WeaveError::Internal("stale index position".into()));
            }
        }
        if self.entries.windows(2).any(|pair| pair[0].0 < pair[1].0) {
            return Err(WeaveError::Internal("entries not in descending order".into()));
        }
        let sum: u64 = self.entries.iter().map(|&(count, _)| u64::from(count)).sum();
        if sum != self.total {
            return Err(WeaveError::Internal("total does not match entries".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn table(keys: &[u32]) -> FrecTable<u32> {
        let mut table = FrecTable::new();
        for &key in keys {
            table.add(key);
        }
        table
    }

    #[test]
    fn increments_move_entries_forward() {
        let table = table(&[1, 2, 3, 3, 3, 2]);
        let ranked: Vec<(Count, u32)> = table.iter().collect();
        assert_eq!(ranked, vec![(3, 3), (2, 2), (1, 1)]);
        assert_eq!(table.total(), 6);
        assert_eq!(table.len(), 3);
        table.check_invariants().expect("invariants hold");
    }

    #[test]
    fn promotion_stops_behind_equal_counts() {
        let table = table(&[1, 2, 2, 1]);
        // 1 reaches count 2 after 2 did, so it stays behind it.
        assert_eq!(table.top(), Some(2));
        assert_eq!(table.iter().collect::<Vec<_>>(), vec![(2, 2), (2, 1)]);
    }

    #[test]
    fn invariants_hold_under_random_adds() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut table = FrecTable::new();
        for _ in 0..2_000 {
            let key: u32 = rng.gen_range(0..40);
            table.add(key);
            if key % 7 == 0 {
                table.check_invariants().expect("invariants hold");
            }
        }
        table.check_invariants().expect("invariants hold");
        assert_eq!(table.total(), 2_000);
    }

    #[test]
    fn sampling_only_returns_recorded_targets() {
        let table = table(&[5, 5, 5, 9]);
        let mut rng = StdRng::seed_from_u64(3);
        let mut fives = 0;
        for _ in 0..4_000 {
            let picked = table.sample(&mut rng).expect("non-empty");
            assert!(picked == 5 || picked == 9);
            if picked == 5 {
                fives += 1;
            }
        }
        assert!((2_700..3_300).contains(&fives), "got {fives} fives");
    }

    #[test]
    fn sampling_empty_table_yields_none() {
        let table: FrecTable<u32> = FrecTable::new();
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(table.sample(&mut rng), None);
        assert_eq!(table.top(), None);
    }

    #[test]
    fn similarity_bounds() {
        let a = table(&[1, 1, 2, 3]);
        let b = table(&[7, 8]);
        assert!((FrecTable::similarity(&a, &a) - 1.0).abs() < 1e-12);
        assert_eq!(FrecTable::similarity(&a, &b), 0.0);
        let scaled = table(&[1, 1, 2, 3, 1, 1, 2, 3]);
        assert!((FrecTable::similarity(&a, &scaled) - 1.0).abs() < 1e-12);
        let partial = table(&[1, 2]);
        let score = FrecTable::similarity(&a, &partial);
        assert!(score > 0.0 && score < 1.0);
        assert!((score - FrecTable::similarity(&partial, &a)).abs() < 1e-12);
    }

    #[test]
    fn sampling_never_returns_unrecorded_targets() {
        let mut rng = StdRng::seed_from_u64(29);
        let mut table = FrecTable::new();
        for _ in 0..500 {
            // Skewed keys so the tail holds many single-count entries.
            let key: u32 = rng.gen_range(0..8) * rng.gen_range(0..8);
            table.add(key);
        }
        let mut seen = FxHashMap::default();
        for _ in 0..20_000 {
            let picked = table.sample(&mut rng).expect("non-empty");
            assert!(table.count(&picked) > 0, "sampled unrecorded target {picked}");
            *seen.entry(picked).or_insert(0u32) += 1;
        }
        assert_eq!(seen.len(), table.len());
    }

    #[test]
    fn restored_table_keeps_similarity() {
        let mut rng = StdRng::seed_from_u64(41);
        let mut a = FrecTable::new();
        let mut b = FrecTable::new();
        for _ in 0..1_000 {
            a.add(rng.gen_range(0u32..30));
            b.add(rng.gen_range(10u32..50));
        }
        let rebuild = |source: &FrecTable<u32>| {
            let mut restored = FrecTable::new();
            for (count, key) in source.iter() {
                restored.push_sorted(count, key).expect("stored order");
            }
            restored
        };
        let (ra, rb) = (rebuild(&a), rebuild(&b));
        assert_eq!(ra.total(), a.total());
        ra.check_invariants().expect("invariants hold");
        let built = FrecTable::similarity(&a, &b);
        assert!(built > 0.0 && built < 1.0);
        assert!((FrecTable::similarity(&ra, &rb) - built).abs() < 1e-12);
        assert!((FrecTable::similarity(&a, &rb) - built).abs() < 1e-12);
    }

    #[test]
    fn saturated_count_keeps_total_consistent() {
        let mut table = FrecTable::new();
        table.push_sorted(Count::MAX, 1u32).expect("restore");
        table.add(1);
        table.add(2);
        assert_eq!(table.count(&1), Count::MAX);
        assert_eq!(table.total(), u64::from(Count::MAX) + 1);
        table.check_invariants().expect("invariants hold");
    }

    #[test]
    fn push_sorted_rejects_bad_order_and_duplicates() {
        let mut table = FrecTable::new();
        table.push_sorted(4, 1u32).expect("first");
        table.push_sorted(4, 2).expect("equal count");
        assert!(table.push_sorted(5, 3).is_err());
        assert!(table.push_sorted(1, 1).is_err());
        assert!(table.push_sorted(0, 9).is_err());
        assert_eq!(table.total(), 8);
        table.check_invariants().expect("invariants hold");
    }
}
