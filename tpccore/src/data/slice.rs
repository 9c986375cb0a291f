use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::data::measurement::Measurement;

/// A time window of one frame and the channel activity observed in it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    pub ident: i32,
    pub frame: i32,
    pub start: f64,
    pub span: f64,
    activity: FxHashMap<i32, Measurement>,
}

impl Slice {
    /// Creates a new `Slice`.
    ///
    /// # Arguments
    ///
    /// * `ident` - Slice identity.
    /// * `frame` - Identity of the parent frame.
    /// * `start` - Start time.
    /// * `span` - Duration of the window.
    /// * `activity` - Charge per channel identity.
    ///
    /// # Examples
    ///
    /// ```
    /// use rustc_hash::FxHashMap;
    /// use tpccore::data::measurement::Measurement;
    /// use tpccore::data::slice::Slice;
    ///
    /// let mut activity = FxHashMap::default();
    /// activity.insert(7, Measurement::new(5.0, 1.0));
    /// let slice = Slice::new(0, 0, 8.0, 4.0, activity);
    /// assert_eq!(slice.index(), 2);
    /// assert_eq!(slice.charge(7).unwrap().value, 5.0);
    /// ```
    pub fn new(ident: i32, frame: i32, start: f64, span: f64, activity: FxHashMap<i32, Measurement>) -> Self {
        Slice { ident, frame, start, span, activity }
    }

    pub fn activity(&self) -> &FxHashMap<i32, Measurement> {
        &self.activity
    }

    pub fn charge(&self, channel: i32) -> Option<&Measurement> {
        self.activity.get(&channel)
    }

    pub fn end(&self) -> f64 {
        self.start + self.span
    }

    /// Slice number within the frame, the start time in units of span.
    pub fn index(&self) -> i64 {
        if self.span <= 0.0 {
            return 0;
        }
        (self.start / self.span).round() as i64
    }
}
