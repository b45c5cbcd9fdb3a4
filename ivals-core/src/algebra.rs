//! Endpoint-inclusion-aware comparators and predicates.
//!
//! Everything in the library reduces interval geometry to the comparators in
//! this module. The total interval order is the lexicographic comparison of
//! `(low, ¬low_inc, high, high_inc)`: at a tied low value an included low
//! lies further left than an excluded one, and the rule flips at the high
//! endpoint.

use std::cmp::Ordering;

use crate::models::{BoundedInterval, Iv};

/// Compare the low endpoints of `a` and `b`.
///
/// At equal values the included low orders first.
pub fn cmp_low<T, A, B>(a: &A, b: &B) -> Ordering
where
    T: Ord + Clone,
    A: BoundedInterval<T>,
    B: BoundedInterval<T>,
{
    a.low()
        .cmp(b.low())
        .then_with(|| b.low_inc().cmp(&a.low_inc()))
}

/// Compare the high endpoints of `a` and `b`.
///
/// At equal values the excluded high orders first.
pub fn cmp_high<T, A, B>(a: &A, b: &B) -> Ordering
where
    T: Ord + Clone,
    A: BoundedInterval<T>,
    B: BoundedInterval<T>,
{
    a.high()
        .cmp(b.high())
        .then_with(|| a.high_inc().cmp(&b.high_inc()))
}

/// The total interval order: low endpoint first, high endpoint as
/// tie-breaker. Equal intervals (all four fields) compare `Equal`; any
/// remaining ties are the caller's to break (collections use insertion
/// order via stable sorting).
pub fn cmp<T, A, B>(a: &A, b: &B) -> Ordering
where
    T: Ord + Clone,
    A: BoundedInterval<T>,
    B: BoundedInterval<T>,
{
    cmp_low(a, b).then_with(|| cmp_high(a, b))
}

/// The interval order with both components reversed.
pub fn cmp_reversed<T, A, B>(a: &A, b: &B) -> Ordering
where
    T: Ord + Clone,
    A: BoundedInterval<T>,
    B: BoundedInterval<T>,
{
    cmp(a, b).reverse()
}

/// Compare `a`'s low endpoint against `b`'s high endpoint as positions on
/// the line.
///
/// `Greater` means `a` begins strictly after `b` ends, so the two cannot
/// intersect from that side. At equal endpoint values the positions
/// coincide only when both endpoints are included.
pub fn cmp_low_high<T, A, B>(a: &A, b: &B) -> Ordering
where
    T: Ord + Clone,
    A: BoundedInterval<T>,
    B: BoundedInterval<T>,
{
    match a.low().cmp(b.high()) {
        Ordering::Equal => {
            if a.low_inc() && b.high_inc() {
                Ordering::Equal
            } else {
                Ordering::Greater
            }
        }
        ord => ord,
    }
}

/// Compare `a`'s high endpoint against `b`'s low endpoint; the mirror of
/// [`cmp_low_high`].
pub fn cmp_high_low<T, A, B>(a: &A, b: &B) -> Ordering
where
    T: Ord + Clone,
    A: BoundedInterval<T>,
    B: BoundedInterval<T>,
{
    cmp_low_high(b, a).reverse()
}

/// Compare `i`'s low endpoint against the point `p` as positions on the
/// line. `Greater` at a tied value when the low is excluded.
pub fn cmp_low_point<T, I>(i: &I, p: &T) -> Ordering
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    match i.low().cmp(p) {
        Ordering::Equal => {
            if i.low_inc() {
                Ordering::Equal
            } else {
                Ordering::Greater
            }
        }
        ord => ord,
    }
}

/// Compare `i`'s high endpoint against the point `p` as positions on the
/// line. `Less` at a tied value when the high is excluded.
pub fn cmp_high_point<T, I>(i: &I, p: &T) -> Ordering
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    match i.high().cmp(p) {
        Ordering::Equal => {
            if i.high_inc() {
                Ordering::Equal
            } else {
                Ordering::Less
            }
        }
        ord => ord,
    }
}

/// Does `i` contain the point `p`?
pub fn overlaps_point<T, I>(i: &I, p: &T) -> bool
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    let above_low = match p.cmp(i.low()) {
        Ordering::Greater => true,
        Ordering::Equal => i.low_inc(),
        Ordering::Less => false,
    };
    let below_high = match p.cmp(i.high()) {
        Ordering::Less => true,
        Ordering::Equal => i.high_inc(),
        Ordering::Greater => false,
    };
    above_low && below_high
}

/// Do `a` and `b` share at least one point?
pub fn overlaps<T, A, B>(a: &A, b: &B) -> bool
where
    T: Ord + Clone,
    A: BoundedInterval<T>,
    B: BoundedInterval<T>,
{
    cmp_low_high(a, b) <= Ordering::Equal && cmp_low_high(b, a) <= Ordering::Equal
}

/// Does `a` contain every point of `b`? Not necessarily strictly; equal
/// intervals contain each other.
pub fn contains_interval<T, A, B>(a: &A, b: &B) -> bool
where
    T: Ord + Clone,
    A: BoundedInterval<T>,
    B: BoundedInterval<T>,
{
    cmp_low(a, b) <= Ordering::Equal && cmp_high(a, b) >= Ordering::Equal
}

/// Does `a` contain `b` with room on both sides of the endpoint order?
pub fn strictly_contains<T, A, B>(a: &A, b: &B) -> bool
where
    T: Ord + Clone,
    A: BoundedInterval<T>,
    B: BoundedInterval<T>,
{
    cmp_low(a, b) == Ordering::Less && cmp_high(a, b) == Ordering::Greater
}

/// Structural equality on all four endpoint fields.
pub fn interval_equals<T, A, B>(a: &A, b: &B) -> bool
where
    T: Ord + Clone,
    A: BoundedInterval<T>,
    B: BoundedInterval<T>,
{
    cmp_low(a, b) == Ordering::Equal && cmp_high(a, b) == Ordering::Equal
}

/// The smallest interval containing both `a` and `b`. Inclusion flags are
/// OR-combined at tied endpoint values.
pub fn join<T, A, B>(a: &A, b: &B) -> Iv<T>
where
    T: Ord + Clone,
    A: BoundedInterval<T>,
    B: BoundedInterval<T>,
{
    let (low, low_inc) = match a.low().cmp(b.low()) {
        Ordering::Less => (a.low().clone(), a.low_inc()),
        Ordering::Greater => (b.low().clone(), b.low_inc()),
        Ordering::Equal => (a.low().clone(), a.low_inc() || b.low_inc()),
    };
    let (high, high_inc) = match a.high().cmp(b.high()) {
        Ordering::Greater => (a.high().clone(), a.high_inc()),
        Ordering::Less => (b.high().clone(), b.high_inc()),
        Ordering::Equal => (a.high().clone(), a.high_inc() || b.high_inc()),
    };
    // the join of two valid intervals is always constructible
    Iv::new(low, high, low_inc, high_inc).expect("join endpoints stay ordered")
}

/// The smallest interval containing every interval yielded by `iter`, or
/// `None` for an empty stream.
pub fn span_of<T, It>(iter: It) -> Option<Iv<T>>
where
    T: Ord + Clone,
    It: IntoIterator,
    It::Item: BoundedInterval<T>,
{
    let mut iter = iter.into_iter();
    let first = iter.next()?;
    let mut span = Iv::of(&first);
    for i in iter {
        span = join(&span, &i);
    }
    Some(span)
}
