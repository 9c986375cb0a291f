use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// A central value with its uncertainty.
///
/// # Description
///
/// Used for channel activity, measure signals and blob charge. Adding two
/// measurements sums the central values and combines the uncertainties in
/// quadrature, which is what summing independent channel signals requires.
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub uncertainty: f64,
}

impl Measurement {
    /// Creates a new `Measurement`.
    ///
    /// # Arguments
    ///
    /// * `value` - The central value.
    /// * `uncertainty` - The (one sigma) uncertainty.
    ///
    /// # Examples
    ///
    /// ```
    /// use tpccore::data::measurement::Measurement;
    ///
    /// let m = Measurement::new(10.0, 3.0) + Measurement::new(20.0, 4.0);
    /// assert_eq!(m.value, 30.0);
    /// assert!((m.uncertainty - 5.0).abs() < 1e-12);
    /// ```
    pub fn new(value: f64, uncertainty: f64) -> Self {
        Measurement { value, uncertainty }
    }

    /// A measurement with zero uncertainty.
    pub fn exact(value: f64) -> Self {
        Measurement { value, uncertainty: 0.0 }
    }

    /// Variance, the squared uncertainty.
    pub fn variance(&self) -> f64 {
        self.uncertainty * self.uncertainty
    }

    /// Return a copy with the central value replaced.
    pub fn with_value(&self, value: f64) -> Self {
        Measurement { value, uncertainty: self.uncertainty }
    }

    /// Return a copy with the uncertainty replaced.
    pub fn with_uncertainty(&self, uncertainty: f64) -> Self {
        Measurement { value: self.value, uncertainty }
    }
}

impl Add for Measurement {
    type Output = Measurement;

    fn add(self, rhs: Measurement) -> Measurement {
        Measurement {
            value: self.value + rhs.value,
            uncertainty: self.uncertainty.hypot(rhs.uncertainty),
        }
    }
}

impl AddAssign for Measurement {
    fn add_assign(&mut self, rhs: Measurement) {
        *self = *self + rhs;
    }
}

impl Sum for Measurement {
    fn sum<I: Iterator<Item = Measurement>>(iter: I) -> Self {
        iter.fold(Measurement::default(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Measurement> for Measurement {
    fn sum<I: Iterator<Item = &'a Measurement>>(iter: I) -> Self {
        iter.fold(Measurement::default(), |acc, m| acc + *m)
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+/-{}", self.value, self.uncertainty)
    }
}
