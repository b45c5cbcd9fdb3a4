//! The uniform gap scan every index's `gaps`/`find_gaps` is built on.
//!
//! Walking a low-sorted interval stream, the scan keeps the interval whose
//! high endpoint reaches furthest right. A gap opens whenever the next
//! interval starts strictly beyond that frontier, and its closure flags are
//! the flanking endpoints' flags inverted: the gap after `[1,3]` starts open
//! at 3, the gap before `(5,7)` ends closed at 5. Touching endpoints with
//! exactly one inclusion meet without a gap; two excluded endpoints at the
//! same value leave a one-point gap.

use std::cmp::Ordering;
use std::marker::PhantomData;
use std::rc::Rc;

use ivals_core::algebra::cmp_high;
use ivals_core::models::{BoundedInterval, Iv};

/// Lazy gap iterator over a stream sorted by the interval order.
pub struct GapScan<'a, I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    inner: Box<dyn Iterator<Item = Rc<I>> + 'a>,
    frontier: Option<Rc<I>>,
    _endpoint: PhantomData<T>,
}

impl<'a, I, T> GapScan<'a, I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    pub fn new(sorted: Box<dyn Iterator<Item = Rc<I>> + 'a>) -> Self {
        GapScan {
            inner: sorted,
            frontier: None,
            _endpoint: PhantomData,
        }
    }
}

/// The gap between `frontier`'s high and `next`'s low, if one exists.
fn gap_between<I, T>(frontier: &I, next: &I) -> Option<Iv<T>>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    let open = match next.low().cmp(frontier.high()) {
        Ordering::Greater => true,
        // both endpoints excluded leave exactly the shared value uncovered
        Ordering::Equal => !next.low_inc() && !frontier.high_inc(),
        Ordering::Less => false,
    };
    if !open {
        return None;
    }
    let gap = Iv::new(
        frontier.high().clone(),
        next.low().clone(),
        !frontier.high_inc(),
        !next.low_inc(),
    )
    .expect("flank endpoints are ordered");
    Some(gap)
}

impl<'a, I, T> Iterator for GapScan<'a, I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    type Item = Iv<T>;

    fn next(&mut self) -> Option<Self::Item> {
        for interval in self.inner.by_ref() {
            let gap = self
                .frontier
                .as_ref()
                .and_then(|f| gap_between(f, &interval));

            let extends = match &self.frontier {
                Some(f) => cmp_high(&interval, f) == Ordering::Greater,
                None => true,
            };
            if extends {
                self.frontier = Some(interval);
            }

            if gap.is_some() {
                return gap;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn iv(low: i32, high: i32, li: bool, hi: bool) -> Rc<Iv<i32>> {
        Rc::new(Iv::new(low, high, li, hi).unwrap())
    }

    fn gaps_of(intervals: Vec<Rc<Iv<i32>>>) -> Vec<Iv<i32>> {
        GapScan::new(Box::new(intervals.into_iter())).collect()
    }

    #[rstest]
    fn test_single_gap_inverts_closure() {
        let gaps = gaps_of(vec![iv(1, 3, true, true), iv(5, 7, false, false)]);
        assert_eq!(gaps, vec![Iv::new(3, 5, false, true).unwrap()]);
    }

    #[rstest]
    fn test_meeting_intervals_leave_no_gap() {
        let gaps = gaps_of(vec![iv(0, 3, true, false), iv(3, 5, true, true)]);
        assert_eq!(gaps, vec![]);
    }

    #[rstest]
    fn test_double_exclusion_leaves_point_gap() {
        let gaps = gaps_of(vec![iv(0, 3, true, false), iv(3, 5, false, true)]);
        assert_eq!(gaps, vec![Iv::point(3)]);
    }

    #[rstest]
    fn test_contained_interval_does_not_reset_frontier() {
        // (2,4) sits inside [0,10]; the gap is measured from the frontier
        let gaps = gaps_of(vec![
            iv(0, 10, true, true),
            iv(2, 4, false, false),
            iv(12, 13, true, true),
        ]);
        assert_eq!(gaps, vec![Iv::open(10, 12).unwrap()]);
    }

    #[rstest]
    fn test_welding_schedule() {
        let mut runs: Vec<Rc<Iv<i32>>> = [
            (0, 30),
            (50, 60),
            (100, 150),
            (200, 210),
            (20, 40),
            (60, 100),
            (120, 130),
            (160, 190),
        ]
        .iter()
        .map(|&(a, b)| iv(a, b, true, false))
        .collect();
        runs.sort_by(|a, b| ivals_core::algebra::cmp(a, b));

        let gaps = gaps_of(runs);
        let expected: Vec<Iv<i32>> = [(40, 50), (150, 160), (190, 200)]
            .iter()
            .map(|&(a, b)| Iv::upper_open(a, b).unwrap())
            .collect();
        assert_eq!(gaps, expected);
    }

    #[rstest]
    fn test_no_gaps_on_short_streams() {
        assert_eq!(gaps_of(vec![]), vec![]);
        assert_eq!(gaps_of(vec![iv(1, 3, true, true)]), vec![]);
    }
}
