//! Allen's thirteen interval relations, generalized to endpoints with
//! inclusion flags.
//!
//! Two intervals *meet* when their endpoint values touch with exactly one of
//! the two inclusion flags set: the union is contiguous but no point is
//! shared. Touching with both flags set shares a point (an overlap); with
//! neither set a one-point hole remains (before/after).

use std::cmp::Ordering;

use crate::algebra::{cmp_high, cmp_low};
use crate::models::BoundedInterval;

/// One of Allen's thirteen relations, from the perspective of the first
/// interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Relation {
    Before,
    Meets,
    Overlaps,
    FinishedBy,
    Contains,
    Starts,
    Equals,
    StartedBy,
    During,
    Finishes,
    OverlappedBy,
    MetBy,
    After,
}

impl Relation {
    /// The relation seen from the other interval's perspective.
    pub fn inverse(self) -> Relation {
        match self {
            Relation::Before => Relation::After,
            Relation::Meets => Relation::MetBy,
            Relation::Overlaps => Relation::OverlappedBy,
            Relation::FinishedBy => Relation::Finishes,
            Relation::Contains => Relation::During,
            Relation::Starts => Relation::StartedBy,
            Relation::Equals => Relation::Equals,
            Relation::StartedBy => Relation::Starts,
            Relation::During => Relation::Contains,
            Relation::Finishes => Relation::FinishedBy,
            Relation::OverlappedBy => Relation::Overlaps,
            Relation::MetBy => Relation::Meets,
            Relation::After => Relation::Before,
        }
    }
}

/// Determine how `a` relates to `b`.
pub fn relate<T, A, B>(a: &A, b: &B) -> Relation
where
    T: Ord + Clone,
    A: BoundedInterval<T>,
    B: BoundedInterval<T>,
{
    match (cmp_low(a, b), cmp_high(a, b)) {
        (Ordering::Equal, Ordering::Equal) => Relation::Equals,
        (Ordering::Equal, Ordering::Less) => Relation::Starts,
        (Ordering::Equal, Ordering::Greater) => Relation::StartedBy,
        (Ordering::Greater, Ordering::Equal) => Relation::Finishes,
        (Ordering::Less, Ordering::Equal) => Relation::FinishedBy,
        (Ordering::Greater, Ordering::Less) => Relation::During,
        (Ordering::Less, Ordering::Greater) => Relation::Contains,
        (Ordering::Less, Ordering::Less) => leftward(a, b),
        (Ordering::Greater, Ordering::Greater) => leftward(b, a).inverse(),
    }
}

/// Relation of `a` to `b` given `a` starts and ends before `b` does:
/// one of `Before`, `Meets`, `Overlaps`.
fn leftward<T, A, B>(a: &A, b: &B) -> Relation
where
    T: Ord + Clone,
    A: BoundedInterval<T>,
    B: BoundedInterval<T>,
{
    match a.high().cmp(b.low()) {
        Ordering::Less => Relation::Before,
        Ordering::Greater => Relation::Overlaps,
        Ordering::Equal => {
            if a.high_inc() && b.low_inc() {
                Relation::Overlaps
            } else if a.high_inc() != b.low_inc() {
                Relation::Meets
            } else {
                Relation::Before
            }
        }
    }
}
