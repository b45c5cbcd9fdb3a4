use std::cmp::Ordering;
use std::marker::PhantomData;
use std::rc::Rc;

use fxhash::FxHashSet;

use ivals_core::CollectionError;
use ivals_core::algebra::{
    cmp, cmp_high_low, cmp_high_point, cmp_low, cmp_low_high, cmp_low_point, overlaps_point,
};
use ivals_core::models::{BoundedInterval, Iv};
use ivals_core::sweep::sort_intervals;

use crate::events::{EventListener, EventSource};
use crate::traits::{IntervalCollection, IvIter, SortedIntervalCollection, Speed};

/// A dense array of interval handles kept in interval order.
///
/// The simplest index: constant-time counting and indexing, binary-searched
/// lookups, linear adds and removes that shift the tail. Containments and
/// overlaps are welcome; the same reference twice is not. The sorted storage
/// is what the containment-free tree indexes enumerate against, and the
/// `find`/`find_first`/`find_last` primitives follow the one's-complement
/// miss convention: a negative result `r` means the query was absent and
/// `!r` is where it would be inserted.
#[derive(Debug)]
pub struct EndpointSortedList<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    intervals: Vec<Rc<I>>,
    read_only: bool,
    events: EventSource<I>,
    _endpoint: PhantomData<T>,
}

impl<I, T> EndpointSortedList<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    /// An empty, mutable list.
    pub fn new() -> Self {
        EndpointSortedList {
            intervals: Vec::new(),
            read_only: false,
            events: EventSource::default(),
            _endpoint: PhantomData,
        }
    }

    /// Build from a batch of handles. Reference duplicates in the input are
    /// kept once; value-equal distinct objects are all kept, in input
    /// order. `read_only` freezes the list against later mutation.
    pub fn from_intervals(intervals: Vec<Rc<I>>, read_only: bool) -> Self {
        let mut seen: FxHashSet<*const I> = FxHashSet::default();
        let mut intervals: Vec<Rc<I>> = intervals
            .into_iter()
            .filter(|i| seen.insert(Rc::as_ptr(i)))
            .collect();
        sort_intervals(&mut intervals);
        EndpointSortedList {
            intervals,
            read_only,
            events: EventSource::default(),
            _endpoint: PhantomData,
        }
    }

    /// First position whose interval does not order before `query`.
    fn lower_bound(&self, query: &Iv<T>) -> usize {
        self.intervals
            .partition_point(|i| cmp(i, query) == Ordering::Less)
    }

    /// First position past the run of intervals structurally equal to
    /// `query`.
    fn upper_bound(&self, query: &Iv<T>) -> usize {
        self.intervals
            .partition_point(|i| cmp(i, query) != Ordering::Greater)
    }

    /// Position of the first interval structurally equal to `query`, or the
    /// one's complement of the insertion point.
    pub fn find_first(&self, query: &Iv<T>) -> isize {
        let lower = self.lower_bound(query);
        match self.intervals.get(lower) {
            Some(i) if cmp(i, query) == Ordering::Equal => lower as isize,
            _ => !(lower as isize),
        }
    }

    /// Position of the last interval structurally equal to `query`, or the
    /// one's complement of the insertion point.
    pub fn find_last(&self, query: &Iv<T>) -> isize {
        let upper = self.upper_bound(query);
        if upper > 0 && cmp(&self.intervals[upper - 1], query) == Ordering::Equal {
            (upper - 1) as isize
        } else {
            !(upper as isize)
        }
    }

    /// Binary search for `query` by the interval order; the first of an
    /// equal run on a hit.
    pub fn find(&self, query: &Iv<T>) -> isize {
        self.find_first(query)
    }

    /// The handle at `index`; constant time.
    pub fn get(&self, index: usize) -> Result<Rc<I>, CollectionError> {
        self.intervals
            .get(index)
            .cloned()
            .ok_or_else(|| CollectionError::InvalidArgument(format!("index {index} out of range")))
    }

    /// The positions in `[first..=last]` as a lazy sequence; used by the
    /// bracketing searches above.
    pub fn enumerate_range<'a>(&'a self, first: usize, last: usize) -> IvIter<'a, I> {
        let last = last.min(self.intervals.len().saturating_sub(1));
        if first > last || self.intervals.is_empty() {
            return Box::new(std::iter::empty());
        }
        Box::new(self.intervals[first..=last].iter().cloned())
    }

    /// Where this exact reference sits, resolving within its run of
    /// structurally equal neighbours.
    fn position_of(&self, interval: &Rc<I>) -> Result<usize, usize> {
        let query = Iv::of(interval.as_ref());
        let lower = self.lower_bound(&query);
        let upper = self.upper_bound(&query);
        for at in lower..upper {
            if Rc::ptr_eq(&self.intervals[at], interval) {
                return Ok(at);
            }
        }
        Err(lower)
    }
}

impl<I, T> Default for EndpointSortedList<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I, T> IntervalCollection<I, T> for EndpointSortedList<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    fn allows_overlaps(&self) -> bool {
        true
    }

    fn allows_containments(&self) -> bool {
        true
    }

    fn allows_reference_duplicates(&self) -> bool {
        false
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn supports_sorted_enumeration(&self) -> bool {
        true
    }

    fn supports_indexing(&self) -> bool {
        true
    }

    fn count(&self) -> usize {
        self.intervals.len()
    }

    fn count_speed(&self) -> Speed {
        Speed::Constant
    }

    fn choose(&self) -> Result<Rc<I>, CollectionError> {
        self.intervals
            .first()
            .cloned()
            .ok_or(CollectionError::EmptyCollection)
    }

    fn iter<'a>(&'a self) -> IvIter<'a, I> {
        Box::new(self.intervals.iter().cloned())
    }

    fn lowest_interval(&self) -> Result<Rc<I>, CollectionError> {
        self.intervals
            .first()
            .cloned()
            .ok_or(CollectionError::EmptyCollection)
    }

    fn lowest_intervals(&self) -> Result<Vec<Rc<I>>, CollectionError> {
        let first = self.lowest_interval()?;
        Ok(self
            .intervals
            .iter()
            .take_while(|i| cmp_low(*i, &first) == Ordering::Equal)
            .cloned()
            .collect())
    }

    fn find_equals<'a>(&'a self, query: &Iv<T>) -> IvIter<'a, I>
    where
        I: 'a,
        T: 'a,
    {
        let lower = self.lower_bound(query);
        let upper = self.upper_bound(query);
        Box::new(self.intervals[lower..upper].iter().cloned())
    }

    fn find_overlaps_point<'a>(&'a self, point: &T) -> IvIter<'a, I>
    where
        I: 'a,
        T: 'a,
    {
        let point = point.clone();
        // candidates start at or before the point; the list is low-sorted
        let end = self
            .intervals
            .partition_point(|i| cmp_low_point(i, &point) != Ordering::Greater);
        Box::new(
            self.intervals[..end]
                .iter()
                .filter(move |i| overlaps_point(*i, &point))
                .cloned(),
        )
    }

    fn find_overlaps<'a>(&'a self, query: &Iv<T>) -> IvIter<'a, I>
    where
        I: 'a,
        T: 'a,
    {
        let query = query.clone();
        let end = self
            .intervals
            .partition_point(|i| cmp_low_high(i, &query) != Ordering::Greater);
        Box::new(
            self.intervals[..end]
                .iter()
                .filter(move |i| cmp_high_low(*i, &query) != Ordering::Less)
                .cloned(),
        )
    }

    fn add(&mut self, interval: Rc<I>) -> Result<bool, CollectionError> {
        if self.read_only {
            return Err(CollectionError::ReadOnlyViolation);
        }
        match self.position_of(&interval) {
            Ok(_) => Ok(false),
            Err(_) => {
                // insert after the equal run so ties keep arrival order
                let at = self.upper_bound(&Iv::of(interval.as_ref()));
                self.intervals.insert(at, interval.clone());
                self.events.fire_added(vec![interval]);
                Ok(true)
            }
        }
    }

    fn remove(&mut self, interval: &Rc<I>) -> Result<bool, CollectionError> {
        if self.read_only {
            return Err(CollectionError::ReadOnlyViolation);
        }
        match self.position_of(interval) {
            Ok(at) => {
                let removed = self.intervals.remove(at);
                self.events.fire_removed(vec![removed]);
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    fn clear(&mut self) -> Result<(), CollectionError> {
        if self.read_only {
            return Err(CollectionError::ReadOnlyViolation);
        }
        if !self.intervals.is_empty() {
            let count = self.intervals.len();
            self.intervals.clear();
            self.events.fire_cleared(count);
        }
        Ok(())
    }

    fn on_event(&mut self, listener: EventListener<I>) {
        self.events.subscribe(listener);
    }
}

impl<I, T> SortedIntervalCollection<I, T> for EndpointSortedList<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    fn sorted<'a>(&'a self) -> IvIter<'a, I> {
        Box::new(self.intervals.iter().cloned())
    }

    fn sorted_backwards<'a>(&'a self) -> IvIter<'a, I> {
        Box::new(self.intervals.iter().rev().cloned())
    }

    fn enumerate_from_point<'a>(&'a self, point: &T, include_overlaps: bool) -> IvIter<'a, I> {
        let point = point.clone();
        Box::new(
            self.intervals
                .iter()
                .skip_while(move |i| {
                    if include_overlaps {
                        cmp_high_point(*i, &point) == Ordering::Less
                    } else {
                        cmp_low_point(*i, &point) != Ordering::Greater
                    }
                })
                .cloned(),
        )
    }

    fn enumerate_backwards_from_point<'a>(
        &'a self,
        point: &T,
        include_overlaps: bool,
    ) -> IvIter<'a, I> {
        let point = point.clone();
        Box::new(
            self.intervals
                .iter()
                .rev()
                .skip_while(move |i| {
                    if include_overlaps {
                        cmp_low_point(*i, &point) == Ordering::Greater
                    } else {
                        cmp_high_point(*i, &point) != Ordering::Less
                    }
                })
                .cloned(),
        )
    }

    fn enumerate_from<'a>(&'a self, interval: &Rc<I>, include: bool) -> IvIter<'a, I> {
        match self.position_of(interval) {
            Ok(at) => {
                let from = if include { at } else { at + 1 };
                Box::new(self.intervals[from..].iter().cloned())
            }
            Err(_) => Box::new(std::iter::empty()),
        }
    }

    fn enumerate_backwards_from<'a>(&'a self, interval: &Rc<I>, include: bool) -> IvIter<'a, I> {
        match self.position_of(interval) {
            Ok(at) => {
                let until = if include { at + 1 } else { at };
                Box::new(self.intervals[..until].iter().rev().cloned())
            }
            Err(_) => Box::new(std::iter::empty()),
        }
    }

    fn enumerate_from_index<'a>(&'a self, index: isize) -> IvIter<'a, I> {
        let from = index.max(0) as usize;
        if from >= self.intervals.len() {
            return Box::new(std::iter::empty());
        }
        Box::new(self.intervals[from..].iter().cloned())
    }

    fn enumerate_backwards_from_index<'a>(&'a self, index: isize) -> IvIter<'a, I> {
        if index < 0 || self.intervals.is_empty() {
            return Box::new(std::iter::empty());
        }
        let from = (index as usize).min(self.intervals.len() - 1);
        Box::new(self.intervals[..=from].iter().rev().cloned())
    }

    fn index_of(&self, interval: &Rc<I>) -> isize {
        match self.position_of(interval) {
            Ok(at) => at as isize,
            Err(insertion) => !(insertion as isize),
        }
    }
}

impl<'a, I, T> IntoIterator for &'a EndpointSortedList<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    type Item = &'a Rc<I>;
    type IntoIter = std::slice::Iter<'a, Rc<I>>;

    fn into_iter(self) -> std::slice::Iter<'a, Rc<I>> {
        self.intervals.iter()
    }
}
