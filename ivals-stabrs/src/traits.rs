use std::rc::Rc;

use ivals_core::CollectionError;
use ivals_core::algebra::{
    cmp_high, cmp_low, contains_interval, interval_equals, overlaps, overlaps_point, span_of,
};
use ivals_core::models::{BoundedInterval, Iv};
use ivals_core::sweep::{max_depth_sweep, sort_intervals};

use crate::events::EventListener;
use crate::gaps::GapScan;

/// Asymptotic cost class of [`IntervalCollection::count`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speed {
    Constant,
    Log,
    Linear,
}

/// Lazy sequence of interval handles borrowed from a collection.
pub type IvIter<'a, I> = Box<dyn Iterator<Item = Rc<I>> + 'a>;

/// Lazy sequence of computed gap intervals.
pub type GapIter<'a, T> = Box<dyn Iterator<Item = Iv<T>> + 'a>;

/// The operation surface shared by every interval index.
///
/// A collection owns its intervals by reference identity: handles are
/// `Rc<I>`, membership and removal compare with `Rc::ptr_eq`, and intervals
/// are never cloned on the way in or out. Structural (all-four-fields)
/// equality appears only in [`find_equals`](Self::find_equals).
///
/// Capability flags parameterize what `add` accepts: a reference duplicate
/// into a no-duplicates collection, an overlap into a no-overlaps
/// collection, or a containment into a no-containments collection is
/// rejected softly (`Ok(false)`, no event). Only mutations on a read-only
/// collection raise [`CollectionError::ReadOnlyViolation`].
///
/// The default method bodies are linear reference implementations over
/// [`iter`](Self::iter); indexes override the ones their structure can
/// answer faster.
pub trait IntervalCollection<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    // --- capability flags ---

    /// May two stored intervals share a point? Implied by either of the
    /// flags below.
    fn allows_overlaps(&self) -> bool;

    /// May a stored interval strictly contain another?
    fn allows_containments(&self) -> bool;

    /// May the same `Rc` handle be stored twice?
    fn allows_reference_duplicates(&self) -> bool;

    fn is_read_only(&self) -> bool;

    fn supports_sorted_enumeration(&self) -> bool {
        false
    }

    fn supports_indexing(&self) -> bool {
        false
    }

    fn supports_neighbourhood(&self) -> bool {
        false
    }

    // --- value queries ---

    /// Number of stored references, counting duplicates.
    fn count(&self) -> usize;

    fn count_speed(&self) -> Speed;

    fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// An arbitrary stored interval.
    fn choose(&self) -> Result<Rc<I>, CollectionError> {
        self.iter().next().ok_or(CollectionError::EmptyCollection)
    }

    /// All stored intervals, in no particular order.
    fn iter<'a>(&'a self) -> IvIter<'a, I>;

    // --- structural queries ---

    /// The smallest interval containing every stored interval.
    fn span(&self) -> Result<Iv<T>, CollectionError> {
        span_of(self.iter()).ok_or(CollectionError::EmptyCollection)
    }

    /// A stored interval attaining the span's low endpoint.
    fn lowest_interval(&self) -> Result<Rc<I>, CollectionError> {
        self.iter()
            .min_by(|a, b| cmp_low(a, b))
            .ok_or(CollectionError::EmptyCollection)
    }

    /// A stored interval attaining the span's high endpoint.
    fn highest_interval(&self) -> Result<Rc<I>, CollectionError> {
        self.iter()
            .max_by(|a, b| cmp_high(a, b))
            .ok_or(CollectionError::EmptyCollection)
    }

    /// Every stored interval sharing the lowest low endpoint.
    fn lowest_intervals(&self) -> Result<Vec<Rc<I>>, CollectionError> {
        let lowest = self.lowest_interval()?;
        Ok(self
            .iter()
            .filter(|i| cmp_low(i, &lowest) == std::cmp::Ordering::Equal)
            .collect())
    }

    /// Every stored interval sharing the highest high endpoint.
    fn highest_intervals(&self) -> Result<Vec<Rc<I>>, CollectionError> {
        let highest = self.highest_interval()?;
        Ok(self
            .iter()
            .filter(|i| cmp_high(i, &highest) == std::cmp::Ordering::Equal)
            .collect())
    }

    /// Largest number of stored intervals covering any single point; 0 for
    /// an empty collection.
    fn maximum_depth(&self) -> usize {
        let all: Vec<Rc<I>> = self.iter().collect();
        max_depth_sweep(&all)
    }

    // --- search ---

    /// All stored intervals structurally equal to `query`.
    fn find_equals<'a>(&'a self, query: &Iv<T>) -> IvIter<'a, I>
    where
        I: 'a,
        T: 'a,
    {
        let query = query.clone();
        Box::new(self.iter().filter(move |i| interval_equals(i, &query)))
    }

    /// All stored intervals containing the point (a stabbing query).
    fn find_overlaps_point<'a>(&'a self, point: &T) -> IvIter<'a, I>
    where
        I: 'a,
        T: 'a,
    {
        let point = point.clone();
        Box::new(self.iter().filter(move |i| overlaps_point(i, &point)))
    }

    /// All stored intervals sharing at least one point with `query`.
    fn find_overlaps<'a>(&'a self, query: &Iv<T>) -> IvIter<'a, I>
    where
        I: 'a,
        T: 'a,
    {
        let query = query.clone();
        Box::new(self.iter().filter(move |i| overlaps(i, &query)))
    }

    /// Some stored interval containing the point, if any.
    fn find_overlap_point(&self, point: &T) -> Option<Rc<I>> {
        self.find_overlaps_point(point).next()
    }

    /// Some stored interval overlapping `query`, if any.
    fn find_overlap(&self, query: &Iv<T>) -> Option<Rc<I>> {
        self.find_overlaps(query).next()
    }

    fn count_overlaps_point(&self, point: &T) -> usize {
        self.find_overlaps_point(point).count()
    }

    fn count_overlaps(&self, query: &Iv<T>) -> usize {
        self.find_overlaps(query).count()
    }

    // --- gap queries ---

    /// The uncovered stretches between stored intervals, inside the span.
    /// Each gap meets its flanking intervals with inverted closure; nothing
    /// is reported left of the first or right of the last interval.
    fn gaps<'a>(&'a self) -> GapIter<'a, T>
    where
        I: 'a,
        T: 'a,
    {
        let mut all: Vec<Rc<I>> = self.iter().collect();
        sort_intervals(&mut all);
        Box::new(GapScan::new(Box::new(all.into_iter())))
    }

    /// The gaps entirely contained in `query`.
    fn find_gaps<'a>(&'a self, query: &Iv<T>) -> GapIter<'a, T>
    where
        I: 'a,
        T: 'a,
    {
        let query = query.clone();
        Box::new(self.gaps().filter(move |g| contains_interval(&query, g)))
    }

    // --- mutation ---

    /// Store another reference. `Ok(false)` when a capability flag forbids
    /// the interval; `ReadOnlyViolation` when the collection is read-only.
    /// On acceptance fires `ItemsAdded` then `Changed`.
    fn add(&mut self, interval: Rc<I>) -> Result<bool, CollectionError>;

    /// Iterated [`add`](Self::add): rejected intervals are skipped, already
    /// accepted ones stay. Returns the number accepted.
    fn add_all(&mut self, intervals: Vec<Rc<I>>) -> Result<usize, CollectionError> {
        let mut accepted = 0;
        for interval in intervals {
            if self.add(interval)? {
                accepted += 1;
            }
        }
        Ok(accepted)
    }

    /// Remove one reference-equal occurrence. Structurally equal but
    /// distinct objects never match. On a hit fires `ItemsRemoved` then
    /// `Changed`.
    fn remove(&mut self, interval: &Rc<I>) -> Result<bool, CollectionError>;

    /// Empty the collection. Fires `Cleared` then `Changed` only when
    /// something was stored; clearing an empty collection is silent.
    fn clear(&mut self) -> Result<(), CollectionError>;

    // --- events ---

    /// Register an observer. Notifications are synchronous, inside the
    /// mutating call; listeners must not mutate the collection reentrantly.
    fn on_event(&mut self, listener: EventListener<I>);
}

/// Extra surface for indexes whose storage is itself a sorted view.
///
/// The uniqueness guarantees (no stored interval inside another, highs
/// non-decreasing along the order) hold for the containment-free family;
/// [`EndpointSortedList`](crate::EndpointSortedList) shares the operations
/// without those guarantees.
pub trait SortedIntervalCollection<I, T>: IntervalCollection<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    /// The stored intervals in interval order; restartable.
    fn sorted<'a>(&'a self) -> IvIter<'a, I>;

    /// Exact reverse of [`sorted`](Self::sorted).
    fn sorted_backwards<'a>(&'a self) -> IvIter<'a, I>;

    /// Skip the leading run that ends before `point`. With
    /// `include_overlaps` the sequence starts at the first interval whose
    /// high reaches `point`; without, at the first whose low lies strictly
    /// beyond it.
    fn enumerate_from_point<'a>(&'a self, point: &T, include_overlaps: bool) -> IvIter<'a, I>;

    /// Mirror of [`enumerate_from_point`](Self::enumerate_from_point),
    /// walking the order backwards from `point`.
    fn enumerate_backwards_from_point<'a>(
        &'a self,
        point: &T,
        include_overlaps: bool,
    ) -> IvIter<'a, I>;

    /// Tail of the sorted order starting at this reference; empty when the
    /// object is absent. `include` keeps the interval itself in the output.
    fn enumerate_from<'a>(&'a self, interval: &Rc<I>, include: bool) -> IvIter<'a, I>;

    /// Head of the sorted order ending at this reference, backwards.
    fn enumerate_backwards_from<'a>(&'a self, interval: &Rc<I>, include: bool) -> IvIter<'a, I>;

    /// Sorted order from position `index`. Negative indexes clamp to the
    /// start; `index >= count` yields nothing.
    fn enumerate_from_index<'a>(&'a self, index: isize) -> IvIter<'a, I>;

    /// Sorted order walked backwards from position `index` down to 0.
    /// Negative indexes yield nothing; `index >= count` starts at the end.
    fn enumerate_backwards_from_index<'a>(&'a self, index: isize) -> IvIter<'a, I>;

    /// Sorted position of this reference: non-negative on a hit, the one's
    /// complement of the insertion point on a miss.
    fn index_of(&self, interval: &Rc<I>) -> isize;
}

/// The (previous, overlap, next) triple around a point or query interval.
#[derive(Debug, Clone)]
pub struct Neighbourhood<I> {
    /// Last interval lying entirely before.
    pub previous: Option<Rc<I>>,
    /// The interval containing the point (unique in an overlap-free
    /// collection), or one overlapping the query.
    pub overlap: Option<Rc<I>>,
    /// First interval lying entirely after.
    pub next: Option<Rc<I>>,
}

impl<I> Neighbourhood<I> {
    pub fn empty() -> Self {
        Neighbourhood {
            previous: None,
            overlap: None,
            next: None,
        }
    }
}

/// Neighbourhood queries; meaningful only for overlap-free indexes, where
/// at most one stored interval can contain a point.
pub trait NeighbourhoodCollection<I, T>: SortedIntervalCollection<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    fn neighbourhood_point(&self, point: &T) -> Neighbourhood<I>;

    fn neighbourhood(&self, query: &Iv<T>) -> Neighbourhood<I>;
}
