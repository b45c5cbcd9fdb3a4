use std::cmp::Ordering;
use std::marker::PhantomData;
use std::rc::Rc;

use log::debug;

use ivals_core::CollectionError;
use ivals_core::algebra::{cmp_high, cmp_high_low, cmp_low_high, strictly_contains};
use ivals_core::models::{BoundedInterval, Iv};
use ivals_core::sweep::{max_depth_sweep, sort_intervals};

use crate::events::{EventListener, EventSource};
use crate::traits::{IntervalCollection, IvIter, Speed};

/// One peeled layer: interval handles in interval order, plus for each slot
/// the offset of its contained sub-range in the next layer. `pointers` has
/// one trailing sentinel, so slot `j`'s children occupy
/// `pointers[j]..pointers[j + 1]`.
#[derive(Debug)]
struct Layer<I> {
    intervals: Vec<Rc<I>>,
    pointers: Vec<usize>,
}

/// The layered containment list: a static, read-only stabbing index.
///
/// Built by repeatedly peeling the longest left-to-right non-containment
/// subsequence off the sorted input: what remains is strictly contained in
/// the peeled layer and forms the next one. Within a layer both lows and
/// highs are non-decreasing, so a stab binary-searches for the first slot
/// still reaching the query, emits slots while they start early enough,
/// and descends into each emitted slot's recorded child range.
///
/// Reference duplicates, containments and overlaps are all accepted at
/// build time; every mutation afterwards fails with `ReadOnlyViolation`.
#[derive(Debug)]
pub struct LayeredContainmentList<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    layers: Vec<Layer<I>>,
    count: usize,
    depth: usize,
    span: Option<Iv<T>>,
    events: EventSource<I>,
    _endpoint: PhantomData<T>,
}

impl<I, T> LayeredContainmentList<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    /// Build the layers from a batch of handles.
    pub fn build(intervals: Vec<Rc<I>>) -> Self {
        let mut intervals = intervals;
        sort_intervals(&mut intervals);

        let count = intervals.len();
        let depth = max_depth_sweep(&intervals);
        let span = ivals_core::algebra::span_of(intervals.iter().cloned());

        // peel pass: each layer keeps the greedy non-containment
        // subsequence of its input and defers the rest; `block_starts`
        // records, per kept slot, where its contained block begins in the
        // deferred list
        struct Peel<I> {
            kept: Vec<Rc<I>>,
            block_starts: Vec<usize>,
        }
        let mut peels: Vec<Peel<I>> = Vec::new();
        let mut kept_masks: Vec<Vec<bool>> = Vec::new();
        while !intervals.is_empty() {
            let mut kept: Vec<Rc<I>> = Vec::new();
            let mut block_starts: Vec<usize> = Vec::new();
            let mut deferred: Vec<Rc<I>> = Vec::new();
            let mut mask: Vec<bool> = Vec::with_capacity(intervals.len());

            for interval in intervals {
                match kept.last() {
                    Some(last) if strictly_contains(last, &interval) => {
                        mask.push(false);
                        deferred.push(interval);
                    }
                    _ => {
                        mask.push(true);
                        block_starts.push(deferred.len());
                        kept.push(interval);
                    }
                }
            }
            block_starts.push(deferred.len());

            peels.push(Peel { kept, block_starts });
            kept_masks.push(mask);
            intervals = deferred;
        }

        // pointer pass: a deferred block maps to the slots the next peel
        // kept out of it, so translate block starts through the next
        // layer's kept-prefix counts
        let mut layers: Vec<Layer<I>> = Vec::with_capacity(peels.len());
        for (at, peel) in peels.into_iter().enumerate() {
            let pointers = match kept_masks.get(at + 1) {
                Some(mask) => {
                    let mut prefix = vec![0usize; mask.len() + 1];
                    for (i, &was_kept) in mask.iter().enumerate() {
                        prefix[i + 1] = prefix[i] + usize::from(was_kept);
                    }
                    peel.block_starts.iter().map(|&s| prefix[s]).collect()
                }
                None => vec![0; peel.block_starts.len()],
            };
            layers.push(Layer {
                intervals: peel.kept,
                pointers,
            });
        }

        debug!(
            "layered containment list: {} intervals over {} layers",
            count,
            layers.len(),
        );

        LayeredContainmentList {
            layers,
            count,
            depth,
            span,
            events: EventSource::default(),
            _endpoint: PhantomData,
        }
    }

    /// Number of layers the input peeled into.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// First slot in `[start, end)` of `layer` whose high endpoint reaches
    /// the query's low; highs are non-decreasing within a layer.
    fn first_reaching(&self, layer: usize, start: usize, end: usize, query: &Iv<T>) -> usize {
        let slots = &self.layers[layer].intervals[start..end];
        start + slots.partition_point(|i| cmp_high_low(i, query) == Ordering::Less)
    }
}

impl<I, T> IntervalCollection<I, T> for LayeredContainmentList<I, T>
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
        true
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn count(&self) -> usize {
        self.count
    }

    fn count_speed(&self) -> Speed {
        Speed::Constant
    }

    fn choose(&self) -> Result<Rc<I>, CollectionError> {
        self.layers
            .first()
            .and_then(|l| l.intervals.first())
            .cloned()
            .ok_or(CollectionError::EmptyCollection)
    }

    fn iter<'a>(&'a self) -> IvIter<'a, I> {
        Box::new(self.layers.iter().flat_map(|l| l.intervals.iter().cloned()))
    }

    fn span(&self) -> Result<Iv<T>, CollectionError> {
        self.span.clone().ok_or(CollectionError::EmptyCollection)
    }

    fn lowest_interval(&self) -> Result<Rc<I>, CollectionError> {
        self.choose()
    }

    fn highest_interval(&self) -> Result<Rc<I>, CollectionError> {
        self.layers
            .first()
            .and_then(|l| l.intervals.last())
            .cloned()
            .ok_or(CollectionError::EmptyCollection)
    }

    fn highest_intervals(&self) -> Result<Vec<Rc<I>>, CollectionError> {
        let highest = self.highest_interval()?;
        // deeper layers are strictly contained, so ties live in layer 0
        let tail: Vec<Rc<I>> = self.layers[0]
            .intervals
            .iter()
            .rev()
            .take_while(|i| cmp_high(*i, &highest) == Ordering::Equal)
            .cloned()
            .collect();
        Ok(tail.into_iter().rev().collect())
    }

    fn maximum_depth(&self) -> usize {
        self.depth
    }

    fn find_overlaps_point<'a>(&'a self, point: &T) -> IvIter<'a, I>
    where
        I: 'a,
        T: 'a,
    {
        self.find_overlaps(&Iv::point(point.clone()))
    }

    fn find_overlaps<'a>(&'a self, query: &Iv<T>) -> IvIter<'a, I>
    where
        I: 'a,
        T: 'a,
    {
        Box::new(IterFind::new(self, query.clone()))
    }

    fn add(&mut self, _interval: Rc<I>) -> Result<bool, CollectionError> {
        Err(CollectionError::ReadOnlyViolation)
    }

    fn remove(&mut self, _interval: &Rc<I>) -> Result<bool, CollectionError> {
        Err(CollectionError::ReadOnlyViolation)
    }

    fn clear(&mut self) -> Result<(), CollectionError> {
        Err(CollectionError::ReadOnlyViolation)
    }

    fn on_event(&mut self, listener: EventListener<I>) {
        // registered for contract uniformity; a read-only structure never
        // fires
        self.events.subscribe(listener);
    }
}

/// Lazy overlap query over the layers, emitting each hit once.
///
/// Keeps a stack of `(layer, next slot, end)` frames: parent slots push a
/// frame for their child range before yielding, so contained hits surface
/// right after their container.
pub struct IterFind<'a, I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    inner: &'a LayeredContainmentList<I, T>,
    query: Iv<T>,
    frames: Vec<(usize, usize, usize)>,
}

impl<'a, I, T> IterFind<'a, I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    fn new(inner: &'a LayeredContainmentList<I, T>, query: Iv<T>) -> Self {
        let mut frames = Vec::new();
        if let Some(layer) = inner.layers.first() {
            let end = layer.intervals.len();
            let first = inner.first_reaching(0, 0, end, &query);
            frames.push((0, first, end));
        }
        IterFind {
            inner,
            query,
            frames,
        }
    }
}

impl<'a, I, T> Iterator for IterFind<'a, I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    type Item = Rc<I>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(&(layer_at, slot, end)) = self.frames.last() {
            if slot >= end {
                self.frames.pop();
                continue;
            }
            let layer = &self.inner.layers[layer_at];
            let interval = &layer.intervals[slot];
            // slots are low-sorted: once one starts past the query, the
            // rest of the frame does too
            if cmp_low_high(interval, &self.query) == Ordering::Greater {
                self.frames.pop();
                continue;
            }
            let top = self.frames.len() - 1;
            self.frames[top].1 += 1;

            let child_start = layer.pointers[slot];
            let child_end = layer.pointers[slot + 1];
            if child_start < child_end {
                let below = layer_at + 1;
                let first = self
                    .inner
                    .first_reaching(below, child_start, child_end, &self.query);
                self.frames.push((below, first, child_end));
            }
            return Some(interval.clone());
        }
        None
    }
}
