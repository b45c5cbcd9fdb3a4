use std::fmt;
use std::ops::{Range, RangeInclusive};
use std::rc::Rc;

use crate::errors::CollectionError;

/// Access to the four endpoint fields every interval is made of.
///
/// An interval denotes the set `{ x : low ⊑ x ⊑ high }` over a totally
/// ordered endpoint domain `T`, where `⊑` tightens to `<` on the side whose
/// inclusion flag is `false`.
///
/// Implementors must uphold two invariants:
///
/// * `low <= high`
/// * if `low == high`, both inclusion flags are `true` (a point interval);
///   the empty set is not representable.
pub trait BoundedInterval<T>
where
    T: Ord + Clone,
{
    fn low(&self) -> &T;
    fn high(&self) -> &T;
    fn low_inc(&self) -> bool;
    fn high_inc(&self) -> bool;

    /// `true` when `low == high` (both endpoints then included).
    fn is_point(&self) -> bool {
        self.low() == self.high()
    }
}

impl<T, I> BoundedInterval<T> for Rc<I>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    fn low(&self) -> &T {
        (**self).low()
    }

    fn high(&self) -> &T {
        (**self).high()
    }

    fn low_inc(&self) -> bool {
        (**self).low_inc()
    }

    fn high_inc(&self) -> bool {
        (**self).high_inc()
    }
}

impl<T, I> BoundedInterval<T> for &I
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    fn low(&self) -> &T {
        (**self).low()
    }

    fn high(&self) -> &T {
        (**self).high()
    }

    fn low_inc(&self) -> bool {
        (**self).low_inc()
    }

    fn high_inc(&self) -> bool {
        (**self).high_inc()
    }
}

/// The concrete interval value type: two endpoints plus their inclusion
/// flags. Immutable after construction; edits are modelled as remove + add
/// at the collection level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Iv<T> {
    low: T,
    high: T,
    low_inc: bool,
    high_inc: bool,
}

impl<T> Iv<T>
where
    T: Ord + Clone,
{
    /// Construct an interval from all four fields.
    ///
    /// Fails with [`CollectionError::InvalidArgument`] when `low > high`, or
    /// when `low == high` with either endpoint excluded (the empty set is
    /// not constructible).
    pub fn new(low: T, high: T, low_inc: bool, high_inc: bool) -> Result<Self, CollectionError> {
        if low > high {
            return Err(CollectionError::InvalidArgument(
                "low endpoint must not exceed high endpoint".to_string(),
            ));
        }
        if low == high && !(low_inc && high_inc) {
            return Err(CollectionError::InvalidArgument(
                "an interval with equal endpoints must include both".to_string(),
            ));
        }
        Ok(Iv {
            low,
            high,
            low_inc,
            high_inc,
        })
    }

    /// `[low, high]`
    pub fn closed(low: T, high: T) -> Result<Self, CollectionError> {
        Self::new(low, high, true, true)
    }

    /// `(low, high)`
    pub fn open(low: T, high: T) -> Result<Self, CollectionError> {
        Self::new(low, high, false, false)
    }

    /// `(low, high]`
    pub fn lower_open(low: T, high: T) -> Result<Self, CollectionError> {
        Self::new(low, high, false, true)
    }

    /// `[low, high)`
    pub fn upper_open(low: T, high: T) -> Result<Self, CollectionError> {
        Self::new(low, high, true, false)
    }

    /// The degenerate interval `{value}`.
    pub fn point(value: T) -> Self {
        Iv {
            low: value.clone(),
            high: value,
            low_inc: true,
            high_inc: true,
        }
    }

    /// Copy the endpoint fields of any interval into an owned `Iv`.
    pub fn of<I>(interval: &I) -> Self
    where
        I: BoundedInterval<T>,
    {
        Iv {
            low: interval.low().clone(),
            high: interval.high().clone(),
            low_inc: interval.low_inc(),
            high_inc: interval.high_inc(),
        }
    }
}

impl<T> BoundedInterval<T> for Iv<T>
where
    T: Ord + Clone,
{
    fn low(&self) -> &T {
        &self.low
    }

    fn high(&self) -> &T {
        &self.high
    }

    fn low_inc(&self) -> bool {
        self.low_inc
    }

    fn high_inc(&self) -> bool {
        self.high_inc
    }
}

/// `start..end` is the half-open interval `[start, end)`.
///
/// Only meaningful for non-empty ranges; a range with `start >= end` denotes
/// no valid interval and must not be handed to a collection.
impl<T> BoundedInterval<T> for Range<T>
where
    T: Ord + Clone,
{
    fn low(&self) -> &T {
        &self.start
    }

    fn high(&self) -> &T {
        &self.end
    }

    fn low_inc(&self) -> bool {
        true
    }

    fn high_inc(&self) -> bool {
        false
    }
}

/// `start..=end` is the closed interval `[start, end]`.
impl<T> BoundedInterval<T> for RangeInclusive<T>
where
    T: Ord + Clone,
{
    fn low(&self) -> &T {
        self.start()
    }

    fn high(&self) -> &T {
        self.end()
    }

    fn low_inc(&self) -> bool {
        true
    }

    fn high_inc(&self) -> bool {
        true
    }
}

impl<T> fmt::Display for Iv<T>
where
    T: Ord + Clone + fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{},{}{}",
            if self.low_inc { '[' } else { '(' },
            self.low,
            self.high,
            if self.high_inc { ']' } else { ')' },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(1, 3, true, true)]
    #[case(1, 3, false, false)]
    #[case(5, 5, true, true)]
    fn test_valid_construction(
        #[case] low: i32,
        #[case] high: i32,
        #[case] low_inc: bool,
        #[case] high_inc: bool,
    ) {
        let iv = Iv::new(low, high, low_inc, high_inc).unwrap();
        assert_eq!(*iv.low(), low);
        assert_eq!(*iv.high(), high);
        assert_eq!(iv.low_inc(), low_inc);
        assert_eq!(iv.high_inc(), high_inc);
    }

    #[rstest]
    #[case(3, 1, true, true)]
    #[case(5, 5, false, true)]
    #[case(5, 5, true, false)]
    #[case(5, 5, false, false)]
    fn test_rejected_construction(
        #[case] low: i32,
        #[case] high: i32,
        #[case] low_inc: bool,
        #[case] high_inc: bool,
    ) {
        assert!(Iv::new(low, high, low_inc, high_inc).is_err());
    }

    #[rstest]
    fn test_point() {
        let p = Iv::point(7);
        assert!(p.is_point());
        assert!(p.low_inc() && p.high_inc());
    }

    #[rstest]
    fn test_range_adapters() {
        let r = 2..9;
        assert_eq!(*r.low(), 2);
        assert_eq!(*r.high(), 9);
        assert!(r.low_inc());
        assert!(!r.high_inc());

        let ri = 2..=9;
        assert!(ri.low_inc() && ri.high_inc());
    }

    #[rstest]
    fn test_display() {
        assert_eq!(Iv::closed(1, 3).unwrap().to_string(), "[1,3]");
        assert_eq!(Iv::open(5, 7).unwrap().to_string(), "(5,7)");
        assert_eq!(Iv::lower_open(5, 7).unwrap().to_string(), "(5,7]");
        assert_eq!(Iv::upper_open(5, 7).unwrap().to_string(), "[5,7)");
    }
}
