use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::deghost::projection::{Cell, Projection2D};

/// How a reference projection relates to a target projection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum CoverageRelation {
    BothEmpty,
    RefEqTar,
    RefCoversTar,
    TarCoversRef,
    Other,
}

impl CoverageRelation {
    /// The relation seen with reference and target swapped.
    pub fn swapped(self) -> Self {
        match self {
            CoverageRelation::RefCoversTar => CoverageRelation::TarCoversRef,
            CoverageRelation::TarCoversRef => CoverageRelation::RefCoversTar,
            other => other,
        }
    }
}

/// Live cells of `proj` that are not dead in `other`.
fn live_mask(proj: &Projection2D, other: &Projection2D, cut: f64) -> BTreeMap<Cell, f64> {
    proj.live_cells(cut)
        .filter(|(cell, _)| !other.is_dead(*cell))
        .collect()
}

/// Compare the live cell sets of two projections.
///
/// Cells dead on either side are ignored on both. An empty side is covered
/// by a populated one.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use tpcimg::deghost::judge::{judge_coverage, CoverageRelation};
/// use tpcimg::deghost::projection::Projection2D;
///
/// let small = Projection2D::from_cells(8, 16, &BTreeMap::from([((3, 7), 5.0)]), Default::default());
/// let large = Projection2D::from_cells(8, 16, &BTreeMap::from([((3, 7), 5.0), ((4, 8), 2.0)]), Default::default());
/// assert_eq!(judge_coverage(&small, &large, 1e11), CoverageRelation::TarCoversRef);
/// ```
pub fn judge_coverage(reference: &Projection2D, target: &Projection2D, cut: f64) -> CoverageRelation {
    let rmask = live_mask(reference, target, cut);
    let tmask = live_mask(target, reference, cut);

    match (rmask.is_empty(), tmask.is_empty()) {
        (true, true) => return CoverageRelation::BothEmpty,
        (true, false) => return CoverageRelation::TarCoversRef,
        (false, true) => return CoverageRelation::RefCoversTar,
        _ => {}
    }

    let ref_only = rmask.keys().any(|c| !tmask.contains_key(c));
    let tar_only = tmask.keys().any(|c| !rmask.contains_key(c));
    match (ref_only, tar_only) {
        (false, false) => CoverageRelation::RefEqTar,
        (true, false) => CoverageRelation::RefCoversTar,
        (false, true) => CoverageRelation::TarCoversRef,
        (true, true) => CoverageRelation::Other,
    }
}

/// Tolerant comparison: the larger side covers the smaller one when the
/// share of the smaller side's cells and the share of its charge missing
/// from the larger side stay under cuts that loosen with the smaller side's
/// dead fraction. Sides of equal size are ordered by live charge.
///
/// # Arguments
///
/// * `reference` - Reference projection.
/// * `target` - Target projection.
/// * `cut` - Live charge cut, see [`Projection2D::live_cells`].
/// * `alt` - (count offset, count slope, charge offset, charge slope).
///
pub fn judge_coverage_alt(reference: &Projection2D, target: &Projection2D, cut: f64, alt: [f64; 4]) -> CoverageRelation {
    let rmask = live_mask(reference, target, cut);
    let tmask = live_mask(target, reference, cut);

    match (rmask.is_empty(), tmask.is_empty()) {
        (true, true) => return CoverageRelation::BothEmpty,
        (true, false) => return CoverageRelation::TarCoversRef,
        (false, true) => return CoverageRelation::RefCoversTar,
        _ => {}
    }
    if rmask.len() == tmask.len() && rmask.keys().all(|c| tmask.contains_key(c)) {
        return CoverageRelation::RefEqTar;
    }

    let rsum: f64 = rmask.values().sum();
    let tsum: f64 = tmask.values().sum();
    let ref_smaller = match rmask.len().cmp(&tmask.len()) {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal if rsum < tsum => true,
        Ordering::Equal if rsum > tsum => false,
        Ordering::Equal => return CoverageRelation::Other,
    };
    let (small, large, small_proj) = if ref_smaller {
        (&rmask, &tmask, reference)
    } else {
        (&tmask, &rmask, target)
    };

    let missing: Vec<f64> = small
        .iter()
        .filter(|(c, _)| !large.contains_key(*c))
        .map(|(_, q)| *q)
        .collect();
    let count_frac = missing.len() as f64 / small.len() as f64;
    let small_charge = if ref_smaller { rsum } else { tsum };
    let charge_frac = if small_charge > 0.0 {
        missing.iter().sum::<f64>() / small_charge
    } else {
        0.0
    };

    let ndead = small_proj.dead.len() as f64;
    let dead_frac = ndead / (ndead + small.len() as f64);

    let covered = count_frac < alt[0] + alt[1] * dead_frac && charge_frac < alt[2] + alt[3] * dead_frac;
    match (covered, ref_smaller) {
        (false, _) => CoverageRelation::Other,
        (true, true) => CoverageRelation::TarCoversRef,
        (true, false) => CoverageRelation::RefCoversTar,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    const CUT: f64 = 1e11;
    const ALT: [f64; 4] = [0.05, 0.33, 0.15, 0.33];

    fn proj(cells: &[((usize, usize), f64)], dead: &[(usize, usize)]) -> Projection2D {
        let map: BTreeMap<Cell, f64> = cells.iter().copied().collect();
        let dead: FxHashSet<Cell> = dead.iter().copied().collect();
        Projection2D::from_cells(16, 16, &map, dead)
    }

    #[test]
    fn test_relations() {
        let a = proj(&[((3, 7), 5.0)], &[]);
        let b = proj(&[((3, 7), 5.0), ((4, 8), 2.0)], &[]);
        let c = proj(&[((9, 9), 1.0)], &[]);
        let empty = Projection2D::empty(16, 16);

        assert_eq!(judge_coverage(&a, &a, CUT), CoverageRelation::RefEqTar);
        assert_eq!(judge_coverage(&a, &b, CUT), CoverageRelation::TarCoversRef);
        assert_eq!(judge_coverage(&b, &a, CUT), CoverageRelation::RefCoversTar);
        assert_eq!(judge_coverage(&a, &c, CUT), CoverageRelation::Other);
        assert_eq!(judge_coverage(&empty, &empty, CUT), CoverageRelation::BothEmpty);
        assert_eq!(judge_coverage(&empty, &a, CUT), CoverageRelation::TarCoversRef);
    }

    #[test]
    fn test_dead_cells_are_masked() {
        // (4, 8) is dead in a, so it does not distinguish b from a
        let a = proj(&[((3, 7), 5.0), ((4, 8), -1e12)], &[(4, 8)]);
        let b = proj(&[((3, 7), 5.0), ((4, 8), 2.0)], &[]);
        assert_eq!(judge_coverage(&a, &b, CUT), CoverageRelation::RefEqTar);
    }

    #[test]
    fn test_symmetry() {
        let ps = [
            proj(&[((3, 7), 5.0)], &[]),
            proj(&[((3, 7), 5.0), ((4, 8), 2.0)], &[]),
            proj(&[((9, 9), 1.0)], &[]),
            Projection2D::empty(16, 16),
        ];
        for a in &ps {
            for b in &ps {
                assert_eq!(judge_coverage(a, b, CUT), judge_coverage(b, a, CUT).swapped());
                assert_eq!(judge_coverage_alt(a, b, CUT, ALT), judge_coverage_alt(b, a, CUT, ALT).swapped());
            }
        }
    }

    #[test]
    fn test_alt_tolerates_small_misses() {
        let large: Vec<((usize, usize), f64)> = (0..11).map(|i| ((i, 1), 10.0)).collect();
        let mut small: Vec<((usize, usize), f64)> = (0..9).map(|i| ((i, 1), 10.0)).collect();
        small.push(((12, 1), 1.0));
        let large = proj(&large, &[]);
        let small = proj(&small, &[]);

        assert_eq!(judge_coverage(&large, &small, CUT), CoverageRelation::Other);
        // 1 of 10 cells missing is above 0.05 without dead cells
        assert_eq!(judge_coverage_alt(&large, &small, CUT, ALT), CoverageRelation::Other);
        let loose = [0.2, 0.0, 0.15, 0.0];
        assert_eq!(judge_coverage_alt(&large, &small, CUT, loose), CoverageRelation::RefCoversTar);
        assert_eq!(judge_coverage_alt(&small, &large, CUT, loose), CoverageRelation::TarCoversRef);
    }
}
