use itertools::Itertools;

use crate::data::geometry::WirePlaneId;
use crate::data::measurement::Measurement;
use crate::data::slice::Slice;

/// Signal of one plane summed over a set of channels.
#[derive(Clone, Debug, PartialEq)]
pub struct Measure {
    pub ident: i32,
    pub plane: WirePlaneId,
    pub channels: Vec<i32>,
    pub value: Measurement,
}

impl Measure {
    pub fn new(ident: i32, plane: WirePlaneId, channels: Vec<i32>, value: Measurement) -> Self {
        let channels = channels.into_iter().sorted_unstable().dedup().collect();
        Measure { ident, plane, channels, value }
    }

    /// Build a measure whose value is the slice activity summed over `channels`.
    /// Channels without activity contribute nothing.
    pub fn summed(ident: i32, plane: WirePlaneId, channels: Vec<i32>, slice: &Slice) -> Self {
        let mut measure = Measure::new(ident, plane, channels, Measurement::default());
        measure.value = measure.channels.iter().filter_map(|ch| slice.charge(*ch)).sum();
        measure
    }

    /// Smallest channel identity, `i32::MAX` for an empty measure.
    pub fn ordering_key(&self) -> i32 {
        self.channels.first().copied().unwrap_or(i32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::geometry::WirePlaneLayer;
    use rustc_hash::FxHashMap;

    #[test]
    fn test_summed_measure() {
        let mut activity = FxHashMap::default();
        activity.insert(4, Measurement::new(3.0, 3.0));
        activity.insert(2, Measurement::new(1.0, 4.0));
        let slice = Slice::new(0, 0, 0.0, 4.0, activity);
        let plane = WirePlaneId::new(WirePlaneLayer::V, 0, 0);
        let m = Measure::summed(1, plane, vec![4, 2, 9], &slice);
        assert_eq!(m.ordering_key(), 2);
        assert!((m.value.value - 4.0).abs() < 1e-12);
        assert!((m.value.uncertainty - 5.0).abs() < 1e-12);
    }
}
