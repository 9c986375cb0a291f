use std::collections::{BTreeMap, BTreeSet};

use ordered_float::OrderedFloat;

use tpccore::graph::event::VertexId;

/// Values that absorb another value where two intervals overlap.
pub trait Combine: Clone {
    fn combine(&mut self, other: &Self);
}

impl<T: Ord + Clone> Combine for BTreeSet<T> {
    fn combine(&mut self, other: &Self) {
        self.extend(other.iter().cloned());
    }
}

/// A map from disjoint half-open intervals to values.
///
/// # Description
///
/// Inserting `[lo, hi)` splits the segments it touches; where it overlaps an
/// existing segment the two values are combined, where it covers a gap the
/// inserted value is stored as is.
///
#[derive(Clone, Debug, PartialEq)]
pub struct IntervalMap<K: Ord + Copy, V> {
    segments: BTreeMap<K, (K, V)>,
}

impl<K: Ord + Copy, V> Default for IntervalMap<K, V> {
    fn default() -> Self {
        IntervalMap { segments: BTreeMap::new() }
    }
}

impl<K: Ord + Copy, V: Combine> IntervalMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, lo: K, hi: K, value: V) {
        if lo >= hi {
            return;
        }

        let mut touched = Vec::new();
        for (start, (end, _)) in self.segments.range(..hi).rev() {
            if *end <= lo {
                break;
            }
            touched.push(*start);
        }
        touched.reverse();

        let mut pieces: Vec<(K, K, V)> = Vec::new();
        let mut cursor = lo;
        for start in touched {
            let Some((end, old)) = self.segments.remove(&start) else {
                continue;
            };
            if start < lo {
                pieces.push((start, lo, old.clone()));
            }
            if cursor < start {
                pieces.push((cursor, start, value.clone()));
            }
            let mut both = old.clone();
            both.combine(&value);
            let from = if start > lo { start } else { lo };
            let to = if end < hi { end } else { hi };
            pieces.push((from, to, both));
            if end > hi {
                pieces.push((hi, end, old));
            }
            cursor = to;
        }
        if cursor < hi {
            pieces.push((cursor, hi, value));
        }

        for (start, end, v) in pieces {
            self.segments.insert(start, (end, v));
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments as (lo, hi, value) in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (K, K, &V)> + '_ {
        self.segments.iter().map(|(lo, (hi, v))| (*lo, *hi, v))
    }

    /// Value of the segment containing `key`.
    pub fn get(&self, key: K) -> Option<&V> {
        let (_, (end, v)) = self.segments.range(..=key).next_back()?;
        if key < *end { Some(v) } else { None }
    }

    /// Segments intersecting `[lo, hi)`.
    pub fn overlapping(&self, lo: K, hi: K) -> Vec<(K, K, &V)> {
        let mut out: Vec<(K, K, &V)> = self
            .segments
            .range(..hi)
            .rev()
            .take_while(|(_, (end, _))| *end > lo)
            .map(|(start, (end, v))| (*start, *end, v))
            .collect();
        out.reverse();
        out
    }

    /// Smallest lower and largest upper bound.
    pub fn bounds(&self) -> Option<(K, K)> {
        let lo = *self.segments.keys().next()?;
        let (hi, _) = self.segments.values().next_back()?;
        Some((lo, *hi))
    }
}

impl<K: Ord + Copy, V: Combine> Combine for IntervalMap<K, V> {
    fn combine(&mut self, other: &Self) {
        for (lo, hi, v) in other.iter() {
            self.insert(lo, hi, v.clone());
        }
    }
}

/// Blob ids per wire-in-plane interval.
pub type IndexCoverage = IntervalMap<i32, BTreeSet<VertexId>>;

/// Time interval crossed with wire-in-plane interval, tagged with blob ids.
pub type Coverage = IntervalMap<OrderedFloat<f64>, IndexCoverage>;

/// Record a blob's footprint, `[t0, t1)` by `[lo, hi)`, in a coverage.
pub fn cover(coverage: &mut Coverage, time: (f64, f64), index: (i32, i32), blob: VertexId) {
    let mut inner = IndexCoverage::new();
    inner.insert(index.0, index.1, BTreeSet::from([blob]));
    coverage.insert(OrderedFloat(time.0), OrderedFloat(time.1), inner);
}

/// All blob ids present anywhere in a coverage.
pub fn members(coverage: &Coverage) -> BTreeSet<VertexId> {
    coverage
        .iter()
        .flat_map(|(_, _, inner)| inner.iter().flat_map(|(_, _, ids)| ids.iter().copied()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[u32]) -> BTreeSet<u32> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_insert_splits_and_combines() {
        let mut m: IntervalMap<i32, BTreeSet<u32>> = IntervalMap::new();
        m.insert(0, 10, set(&[1]));
        m.insert(5, 15, set(&[2]));
        let segs: Vec<(i32, i32, BTreeSet<u32>)> = m.iter().map(|(a, b, v)| (a, b, v.clone())).collect();
        assert_eq!(
            segs,
            vec![(0, 5, set(&[1])), (5, 10, set(&[1, 2])), (10, 15, set(&[2]))]
        );
        assert_eq!(m.get(7), Some(&set(&[1, 2])));
        assert_eq!(m.get(15), None);
        assert_eq!(m.bounds(), Some((0, 15)));
    }

    #[test]
    fn test_insert_fills_gaps() {
        let mut m: IntervalMap<i32, BTreeSet<u32>> = IntervalMap::new();
        m.insert(2, 4, set(&[1]));
        m.insert(6, 8, set(&[1]));
        m.insert(0, 10, set(&[3]));
        let segs: Vec<(i32, i32)> = m.iter().map(|(a, b, _)| (a, b)).collect();
        assert_eq!(segs, vec![(0, 2), (2, 4), (4, 6), (6, 8), (8, 10)]);
        assert_eq!(m.get(5), Some(&set(&[3])));
        assert_eq!(m.get(3), Some(&set(&[1, 3])));
        assert_eq!(m.overlapping(3, 7).len(), 3);
    }

    #[test]
    fn test_empty_interval_ignored() {
        let mut m: IntervalMap<i32, BTreeSet<u32>> = IntervalMap::new();
        m.insert(4, 4, set(&[1]));
        assert!(m.is_empty());
    }

    #[test]
    fn test_nested_coverage() {
        let mut cov = Coverage::new();
        cover(&mut cov, (0.0, 4.0), (3, 7), VertexId::new(1));
        cover(&mut cov, (0.0, 4.0), (5, 9), VertexId::new(2));
        cover(&mut cov, (4.0, 8.0), (5, 9), VertexId::new(3));
        assert_eq!(cov.len(), 2);
        let first = cov.get(OrderedFloat(1.0)).unwrap();
        assert_eq!(first.get(6).unwrap().len(), 2);
        assert_eq!(members(&cov).len(), 3);
    }
}
