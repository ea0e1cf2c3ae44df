//! Convertibility scores for overload resolution.
//!
//! A [`Convertible`] measures how well one host value fits one declared
//! native parameter. Scores are relative, higher is better, and zero
//! disqualifies the candidate outright.
//!
//! Scores of several parameters combine multiplicatively: any `NONE`
//! collapses the product to zero, an all-exact candidate scores exactly 1.0,
//! and every lossy conversion pulls the product strictly below any
//! candidate that avoids it. A product of penalties never reaches zero on
//! its own; it bottoms out at [`Convertible::FLOOR`].

use std::fmt;
use std::ops::{Mul, MulAssign};

use ordered_float::OrderedFloat;

/// How well a host value converts to a declared native type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Convertible(pub OrderedFloat<f64>);

impl Convertible {
    /// No viable conversion.
    pub const NONE: Convertible = Convertible(OrderedFloat(0.0));
    /// Exact type match.
    pub const EXACT: Convertible = Convertible(OrderedFloat(1.0));
    /// Only the constness differs.
    pub const CONST_MISMATCH: Convertible = Convertible(OrderedFloat(0.99));
    /// Integer value passed to a floating point parameter.
    pub const INT_TO_FLOAT: Convertible = Convertible(OrderedFloat(0.5));
    /// Floating point value passed to an integer parameter (lossy).
    pub const FLOAT_TO_INT: Convertible = Convertible(OrderedFloat(0.5));
    /// Signed value passed to an unsigned parameter.
    pub const SIGNED_TO_UNSIGNED: Convertible = Convertible(OrderedFloat(0.5));

    /// Lowest score of a candidate that is not disqualified.
    pub const FLOOR: Convertible = Convertible(OrderedFloat(f64::MIN_POSITIVE));

    /// Penalty for each single-base inheritance step of an upcast.
    pub const UPCAST_STEP: f64 = 0.9;

    /// Score for passing an object `depth` inheritance steps below the
    /// parameter's declared type.
    pub fn upcast(depth: u32) -> Self {
        Convertible(OrderedFloat(Self::UPCAST_STEP.powi(depth as i32)))
    }

    /// The raw score.
    pub fn score(self) -> f64 {
        self.0.into_inner()
    }

    /// True if this score disqualifies the candidate.
    pub fn is_none(self) -> bool {
        self.0.into_inner() <= 0.0
    }

    /// True for an exact match.
    pub fn is_exact(self) -> bool {
        self == Self::EXACT
    }

    /// Combine per-parameter scores.
    ///
    /// An empty parameter list is an exact match.
    pub fn aggregate<I: IntoIterator<Item = Convertible>>(scores: I) -> Self {
        let mut total = Self::EXACT;
        for score in scores {
            if score.is_none() {
                return Self::NONE;
            }
            total = (total * score).max(Self::FLOOR);
        }
        total
    }

    /// Score of a whole array: its worst element. An empty array is exact.
    pub fn worst<I: IntoIterator<Item = Convertible>>(scores: I) -> Self {
        scores.into_iter().min().unwrap_or(Self::EXACT)
    }
}

impl Mul for Convertible {
    type Output = Convertible;

    fn mul(self, rhs: Convertible) -> Convertible {
        Convertible(OrderedFloat(self.score() * rhs.score()))
    }
}

impl MulAssign for Convertible {
    fn mul_assign(&mut self, rhs: Convertible) {
        *self = *self * rhs;
    }
}

impl Default for Convertible {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Debug for Convertible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::NONE {
            write!(f, "Convertible::NONE")
        } else if *self == Self::EXACT {
            write!(f, "Convertible::EXACT")
        } else {
            write!(f, "Convertible({})", self.score())
        }
    }
}

impl fmt::Display for Convertible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.score())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_values() {
        assert_eq!(Convertible::EXACT.score(), 1.0);
        assert_eq!(Convertible::INT_TO_FLOAT.score(), 0.5);
        assert_eq!(Convertible::FLOAT_TO_INT.score(), 0.5);
        assert_eq!(Convertible::SIGNED_TO_UNSIGNED.score(), 0.5);
        assert_eq!(Convertible::CONST_MISMATCH.score(), 0.99);
        assert_eq!(Convertible::NONE.score(), 0.0);
    }

    #[test]
    fn any_none_disqualifies() {
        let total = Convertible::aggregate([
            Convertible::EXACT,
            Convertible::NONE,
            Convertible::EXACT,
        ]);
        assert!(total.is_none());
    }

    #[test]
    fn all_exact_beats_one_lossy() {
        let exact = Convertible::aggregate([Convertible::EXACT; 4]);
        let lossy = Convertible::aggregate([
            Convertible::EXACT,
            Convertible::CONST_MISMATCH,
            Convertible::EXACT,
        ]);
        assert!(exact > lossy);
        assert!(exact.is_exact());
    }

    #[test]
    fn fewer_penalties_win() {
        let one = Convertible::aggregate([Convertible::INT_TO_FLOAT, Convertible::EXACT]);
        let two = Convertible::aggregate([Convertible::INT_TO_FLOAT, Convertible::FLOAT_TO_INT]);
        assert!(one > two);
    }

    #[test]
    fn const_mismatch_beats_numeric_penalty() {
        assert!(Convertible::CONST_MISMATCH > Convertible::INT_TO_FLOAT);
    }

    #[test]
    fn upcast_decays_with_depth() {
        assert!(Convertible::upcast(1) > Convertible::upcast(2));
        assert!(Convertible::upcast(1) < Convertible::EXACT);
        assert_eq!(Convertible::upcast(0), Convertible::EXACT);
    }

    #[test]
    fn long_penalty_chains_stay_viable() {
        let total = Convertible::aggregate(std::iter::repeat_n(Convertible::INT_TO_FLOAT, 2000));
        assert!(!total.is_none());
        assert_eq!(total, Convertible::FLOOR);
    }

    #[test]
    fn worst_element_scores_an_array() {
        let scores = [Convertible::EXACT, Convertible::INT_TO_FLOAT, Convertible::EXACT];
        assert_eq!(Convertible::worst(scores), Convertible::INT_TO_FLOAT);
        assert!(Convertible::worst([Convertible::EXACT, Convertible::NONE]).is_none());
        assert_eq!(Convertible::worst([]), Convertible::EXACT);
    }

    #[test]
    fn empty_aggregate_is_exact() {
        assert_eq!(Convertible::aggregate([]), Convertible::EXACT);
    }
}
