use std::cmp::Ordering;
use std::marker::PhantomData;
use std::rc::Rc;

use ivals_core::CollectionError;
use ivals_core::algebra::{
    cmp, cmp_high_low, cmp_high_point, cmp_low_high, cmp_low_point, join, overlaps, overlaps_point,
};
use ivals_core::models::{BoundedInterval, Iv};

use crate::events::{EventListener, EventSource};
use crate::gaps::GapScan;
use crate::traits::{
    GapIter, IntervalCollection, IvIter, Neighbourhood, NeighbourhoodCollection,
    SortedIntervalCollection, Speed,
};

const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Node<I> {
    interval: Rc<I>,
    left: usize,
    right: usize,
    // parent and the thread links are back references into the arena,
    // never owning
    parent: usize,
    prev: usize,
    next: usize,
    height: i32,
}

/// The doubly-linked finite interval tree: an AVL tree on the interval
/// order whose nodes are additionally threaded into a prev/next list
/// matching that order.
///
/// No two stored intervals may share a point, so the sorted order, the
/// order of lows and the order of highs all coincide. That makes every
/// sorted enumeration a plain linked-list walk and gives the
/// one-descent `(previous, overlap, next)` neighbourhood query its
/// O(log n) bound. Adds that would overlap anything present are rejected
/// with `Ok(false)`.
///
/// Nodes live in a dense arena indexed by `usize`; removal swaps the last
/// slot in, so the arena never fragments.
#[derive(Debug)]
pub struct FiniteIntervalTree<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    nodes: Vec<Node<I>>,
    root: usize,
    head: usize,
    tail: usize,
    events: EventSource<I>,
    _endpoint: PhantomData<T>,
}

impl<I, T> FiniteIntervalTree<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    pub fn new() -> Self {
        FiniteIntervalTree {
            nodes: Vec::new(),
            root: NIL,
            head: NIL,
            tail: NIL,
            events: EventSource::default(),
            _endpoint: PhantomData,
        }
    }

    /// Build from a batch of handles; overlapping latecomers are dropped,
    /// exactly as iterated `add` would.
    pub fn from_intervals(intervals: Vec<Rc<I>>) -> Self {
        let mut tree = Self::new();
        for interval in intervals {
            // overlap rejections surface as false, never as an error
            let _ = tree.add_quiet(interval);
        }
        tree
    }

    fn height_of(&self, id: usize) -> i32 {
        if id == NIL { 0 } else { self.nodes[id].height }
    }

    fn balance_of(&self, id: usize) -> i32 {
        self.height_of(self.nodes[id].left) - self.height_of(self.nodes[id].right)
    }

    fn update_height(&mut self, id: usize) {
        let h = 1 + self
            .height_of(self.nodes[id].left)
            .max(self.height_of(self.nodes[id].right));
        self.nodes[id].height = h;
    }

    /// Point `parent`'s child slot (or the root) at `child`.
    fn replace_child(&mut self, parent: usize, was: usize, now: usize) {
        if parent == NIL {
            self.root = now;
        } else if self.nodes[parent].left == was {
            self.nodes[parent].left = now;
        } else {
            self.nodes[parent].right = now;
        }
        if now != NIL {
            self.nodes[now].parent = parent;
        }
    }

    fn rotate_left(&mut self, x: usize) {
        let y = self.nodes[x].right;
        let inner = self.nodes[y].left;
        self.nodes[x].right = inner;
        if inner != NIL {
            self.nodes[inner].parent = x;
        }
        self.replace_child(self.nodes[x].parent, x, y);
        self.nodes[y].left = x;
        self.nodes[x].parent = y;
        self.update_height(x);
        self.update_height(y);
    }

    fn rotate_right(&mut self, x: usize) {
        let y = self.nodes[x].left;
        let inner = self.nodes[y].right;
        self.nodes[x].left = inner;
        if inner != NIL {
            self.nodes[inner].parent = x;
        }
        self.replace_child(self.nodes[x].parent, x, y);
        self.nodes[y].right = x;
        self.nodes[x].parent = y;
        self.update_height(x);
        self.update_height(y);
    }

    /// Restore heights and the AVL balance on the path from `id` to the
    /// root.
    fn rebalance_up(&mut self, mut id: usize) {
        while id != NIL {
            self.update_height(id);
            let balance = self.balance_of(id);
            if balance > 1 {
                let left = self.nodes[id].left;
                if self.balance_of(left) < 0 {
                    self.rotate_left(left);
                }
                self.rotate_right(id);
                id = self.nodes[id].parent;
            } else if balance < -1 {
                let right = self.nodes[id].right;
                if self.balance_of(right) > 0 {
                    self.rotate_right(right);
                }
                self.rotate_left(id);
                id = self.nodes[id].parent;
            }
            id = self.nodes[id].parent;
        }
    }

    /// `add` without events, shared by the bulk constructor.
    fn add_quiet(&mut self, interval: Rc<I>) -> bool {
        let mut cur = self.root;
        let mut parent = NIL;
        let mut went_left = false;
        let mut prev = NIL;
        let mut next = NIL;
        while cur != NIL {
            parent = cur;
            match cmp(&interval, &self.nodes[cur].interval) {
                Ordering::Less => {
                    next = cur;
                    went_left = true;
                    cur = self.nodes[cur].left;
                }
                Ordering::Greater => {
                    prev = cur;
                    went_left = false;
                    cur = self.nodes[cur].right;
                }
                // a structural twin shares every point
                Ordering::Equal => return false,
            }
        }
        if prev != NIL && overlaps(&interval, &self.nodes[prev].interval) {
            return false;
        }
        if next != NIL && overlaps(&interval, &self.nodes[next].interval) {
            return false;
        }

        let id = self.nodes.len();
        self.nodes.push(Node {
            interval,
            left: NIL,
            right: NIL,
            parent,
            prev,
            next,
            height: 1,
        });
        if parent == NIL {
            self.root = id;
        } else if went_left {
            self.nodes[parent].left = id;
        } else {
            self.nodes[parent].right = id;
        }
        if prev != NIL {
            self.nodes[prev].next = id;
        } else {
            self.head = id;
        }
        if next != NIL {
            self.nodes[next].prev = id;
        } else {
            self.tail = id;
        }
        self.rebalance_up(parent);
        true
    }

    /// The node holding exactly this reference, if stored.
    fn find_node(&self, interval: &Rc<I>) -> usize {
        let mut cur = self.root;
        while cur != NIL {
            match cmp(interval, &self.nodes[cur].interval) {
                Ordering::Less => cur = self.nodes[cur].left,
                Ordering::Greater => cur = self.nodes[cur].right,
                Ordering::Equal => {
                    return if Rc::ptr_eq(interval, &self.nodes[cur].interval) {
                        cur
                    } else {
                        NIL
                    };
                }
            }
        }
        NIL
    }

    /// Leftmost node satisfying a predicate that is monotone along the
    /// sorted order.
    fn first_satisfying(&self, pred: impl Fn(&Rc<I>) -> bool) -> usize {
        let mut cur = self.root;
        let mut best = NIL;
        while cur != NIL {
            if pred(&self.nodes[cur].interval) {
                best = cur;
                cur = self.nodes[cur].left;
            } else {
                cur = self.nodes[cur].right;
            }
        }
        best
    }

    /// Rightmost node satisfying a predicate that is monotone (true, then
    /// false) along the sorted order.
    fn last_satisfying(&self, pred: impl Fn(&Rc<I>) -> bool) -> usize {
        let mut cur = self.root;
        let mut best = NIL;
        while cur != NIL {
            if pred(&self.nodes[cur].interval) {
                best = cur;
                cur = self.nodes[cur].right;
            } else {
                cur = self.nodes[cur].left;
            }
        }
        best
    }

    /// Detach `target` (which has at most one child) from the tree and
    /// compact the arena. Returns the node the rebalance must start from.
    fn splice(&mut self, target: usize) -> usize {
        let child = if self.nodes[target].left != NIL {
            self.nodes[target].left
        } else {
            self.nodes[target].right
        };
        let parent = self.nodes[target].parent;
        self.replace_child(parent, target, child);
        parent
    }

    /// Drop the detached node at `slot`, moving the last arena slot into
    /// it and fixing every reference to the moved node.
    fn compact(&mut self, slot: usize) {
        let last = self.nodes.len() - 1;
        if slot == last {
            self.nodes.pop();
            return;
        }
        self.nodes.swap_remove(slot);
        let moved = &self.nodes[slot];
        let (parent, left, right, prev, next) =
            (moved.parent, moved.left, moved.right, moved.prev, moved.next);
        if parent == NIL {
            self.root = slot;
        } else if self.nodes[parent].left == last {
            self.nodes[parent].left = slot;
        } else {
            self.nodes[parent].right = slot;
        }
        if left != NIL {
            self.nodes[left].parent = slot;
        }
        if right != NIL {
            self.nodes[right].parent = slot;
        }
        if prev != NIL {
            self.nodes[prev].next = slot;
        } else {
            self.head = slot;
        }
        if next != NIL {
            self.nodes[next].prev = slot;
        } else {
            self.tail = slot;
        }
    }

    fn thread_iter<'a>(&'a self, from: usize, forward: bool) -> ThreadIter<'a, I, T> {
        ThreadIter {
            tree: self,
            cur: from,
            forward,
        }
    }
}

impl<I, T> Default for FiniteIntervalTree<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Sorted walk along the thread links; constant work per step.
pub struct ThreadIter<'a, I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    tree: &'a FiniteIntervalTree<I, T>,
    cur: usize,
    forward: bool,
}

impl<'a, I, T> Iterator for ThreadIter<'a, I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    type Item = Rc<I>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur == NIL {
            return None;
        }
        let node = &self.tree.nodes[self.cur];
        self.cur = if self.forward { node.next } else { node.prev };
        Some(node.interval.clone())
    }
}

impl<I, T> IntervalCollection<I, T> for FiniteIntervalTree<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    fn allows_overlaps(&self) -> bool {
        false
    }

    fn allows_containments(&self) -> bool {
        false
    }

    fn allows_reference_duplicates(&self) -> bool {
        false
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn supports_sorted_enumeration(&self) -> bool {
        true
    }

    fn supports_indexing(&self) -> bool {
        true
    }

    fn supports_neighbourhood(&self) -> bool {
        true
    }

    fn count(&self) -> usize {
        self.nodes.len()
    }

    fn count_speed(&self) -> Speed {
        Speed::Constant
    }

    fn choose(&self) -> Result<Rc<I>, CollectionError> {
        if self.root == NIL {
            return Err(CollectionError::EmptyCollection);
        }
        Ok(self.nodes[self.root].interval.clone())
    }

    fn iter<'a>(&'a self) -> IvIter<'a, I> {
        Box::new(self.thread_iter(self.head, true))
    }

    fn span(&self) -> Result<Iv<T>, CollectionError> {
        if self.head == NIL {
            return Err(CollectionError::EmptyCollection);
        }
        Ok(join(
            &self.nodes[self.head].interval,
            &self.nodes[self.tail].interval,
        ))
    }

    fn lowest_interval(&self) -> Result<Rc<I>, CollectionError> {
        if self.head == NIL {
            return Err(CollectionError::EmptyCollection);
        }
        Ok(self.nodes[self.head].interval.clone())
    }

    fn highest_interval(&self) -> Result<Rc<I>, CollectionError> {
        if self.tail == NIL {
            return Err(CollectionError::EmptyCollection);
        }
        Ok(self.nodes[self.tail].interval.clone())
    }

    fn lowest_intervals(&self) -> Result<Vec<Rc<I>>, CollectionError> {
        // disjoint intervals cannot share a low endpoint
        Ok(vec![self.lowest_interval()?])
    }

    fn highest_intervals(&self) -> Result<Vec<Rc<I>>, CollectionError> {
        Ok(vec![self.highest_interval()?])
    }

    fn maximum_depth(&self) -> usize {
        usize::from(!self.nodes.is_empty())
    }

    fn find_overlaps_point<'a>(&'a self, point: &T) -> IvIter<'a, I>
    where
        I: 'a,
        T: 'a,
    {
        Box::new(self.find_overlap_point(point).into_iter())
    }

    fn find_overlaps<'a>(&'a self, query: &Iv<T>) -> IvIter<'a, I>
    where
        I: 'a,
        T: 'a,
    {
        let query = query.clone();
        let first = self.first_satisfying(|i| cmp_high_low(i, &query) != Ordering::Less);
        Box::new(
            self.thread_iter(first, true)
                .take_while(move |i| cmp_low_high(i, &query) != Ordering::Greater),
        )
    }

    fn find_overlap_point(&self, point: &T) -> Option<Rc<I>> {
        let mut cur = self.root;
        while cur != NIL {
            let interval = &self.nodes[cur].interval;
            if overlaps_point(interval, point) {
                return Some(interval.clone());
            }
            cur = if cmp_low_point(interval, point) == Ordering::Greater {
                self.nodes[cur].left
            } else {
                self.nodes[cur].right
            };
        }
        None
    }

    fn count_overlaps_point(&self, point: &T) -> usize {
        usize::from(self.find_overlap_point(point).is_some())
    }

    fn gaps<'a>(&'a self) -> GapIter<'a, T>
    where
        I: 'a,
        T: 'a,
    {
        Box::new(GapScan::new(self.sorted()))
    }

    fn add(&mut self, interval: Rc<I>) -> Result<bool, CollectionError> {
        if self.add_quiet(interval.clone()) {
            self.events.fire_added(vec![interval]);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn remove(&mut self, interval: &Rc<I>) -> Result<bool, CollectionError> {
        let mut id = self.find_node(interval);
        if id == NIL {
            return Ok(false);
        }
        let removed = self.nodes[id].interval.clone();

        if self.nodes[id].left != NIL && self.nodes[id].right != NIL {
            // two children: adopt the successor's payload and order slot,
            // then splice the successor instead
            let successor = self.nodes[id].next;
            self.nodes[id].interval = self.nodes[successor].interval.clone();
            let after = self.nodes[successor].next;
            self.nodes[id].next = after;
            if after != NIL {
                self.nodes[after].prev = id;
            } else {
                self.tail = id;
            }
            id = successor;
        } else {
            let (prev, next) = (self.nodes[id].prev, self.nodes[id].next);
            if prev != NIL {
                self.nodes[prev].next = next;
            } else {
                self.head = next;
            }
            if next != NIL {
                self.nodes[next].prev = prev;
            } else {
                self.tail = prev;
            }
        }

        let from = self.splice(id);
        self.rebalance_up(from);
        self.compact(id);
        self.events.fire_removed(vec![removed]);
        Ok(true)
    }

    fn clear(&mut self) -> Result<(), CollectionError> {
        if !self.nodes.is_empty() {
            let count = self.nodes.len();
            self.nodes.clear();
            self.root = NIL;
            self.head = NIL;
            self.tail = NIL;
            self.events.fire_cleared(count);
        }
        Ok(())
    }

    fn on_event(&mut self, listener: EventListener<I>) {
        self.events.subscribe(listener);
    }
}

impl<I, T> SortedIntervalCollection<I, T> for FiniteIntervalTree<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    fn sorted<'a>(&'a self) -> IvIter<'a, I> {
        Box::new(self.thread_iter(self.head, true))
    }

    fn sorted_backwards<'a>(&'a self) -> IvIter<'a, I> {
        Box::new(self.thread_iter(self.tail, false))
    }

    fn enumerate_from_point<'a>(&'a self, point: &T, include_overlaps: bool) -> IvIter<'a, I> {
        let from = if include_overlaps {
            self.first_satisfying(|i| cmp_high_point(i, point) != Ordering::Less)
        } else {
            self.first_satisfying(|i| cmp_low_point(i, point) == Ordering::Greater)
        };
        Box::new(self.thread_iter(from, true))
    }

    fn enumerate_backwards_from_point<'a>(
        &'a self,
        point: &T,
        include_overlaps: bool,
    ) -> IvIter<'a, I> {
        let from = if include_overlaps {
            self.last_satisfying(|i| cmp_low_point(i, point) != Ordering::Greater)
        } else {
            self.last_satisfying(|i| cmp_high_point(i, point) == Ordering::Less)
        };
        Box::new(self.thread_iter(from, false))
    }

    fn enumerate_from<'a>(&'a self, interval: &Rc<I>, include: bool) -> IvIter<'a, I> {
        let node = self.find_node(interval);
        if node == NIL {
            return Box::new(std::iter::empty());
        }
        let from = if include { node } else { self.nodes[node].next };
        Box::new(self.thread_iter(from, true))
    }

    fn enumerate_backwards_from<'a>(&'a self, interval: &Rc<I>, include: bool) -> IvIter<'a, I> {
        let node = self.find_node(interval);
        if node == NIL {
            return Box::new(std::iter::empty());
        }
        let from = if include { node } else { self.nodes[node].prev };
        Box::new(self.thread_iter(from, false))
    }

    fn enumerate_from_index<'a>(&'a self, index: isize) -> IvIter<'a, I> {
        Box::new(self.thread_iter(self.head, true).skip(index.max(0) as usize))
    }

    fn enumerate_backwards_from_index<'a>(&'a self, index: isize) -> IvIter<'a, I> {
        if index < 0 || self.nodes.is_empty() {
            return Box::new(std::iter::empty());
        }
        let from_end = self.nodes.len() - 1 - (index as usize).min(self.nodes.len() - 1);
        Box::new(self.thread_iter(self.tail, false).skip(from_end))
    }

    fn index_of(&self, interval: &Rc<I>) -> isize {
        let mut position = 0isize;
        let mut cur = self.head;
        while cur != NIL {
            let stored = &self.nodes[cur].interval;
            match cmp(stored, interval) {
                Ordering::Less => position += 1,
                Ordering::Equal => {
                    return if Rc::ptr_eq(stored, interval) {
                        position
                    } else {
                        !position
                    };
                }
                Ordering::Greater => break,
            }
            cur = self.nodes[cur].next;
        }
        !position
    }
}

impl<I, T> NeighbourhoodCollection<I, T> for FiniteIntervalTree<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    fn neighbourhood_point(&self, point: &T) -> Neighbourhood<I> {
        let first = self.first_satisfying(|i| cmp_high_point(i, point) != Ordering::Less);
        if first == NIL {
            // everything ends before the point
            return Neighbourhood {
                previous: (self.tail != NIL).then(|| self.nodes[self.tail].interval.clone()),
                overlap: None,
                next: None,
            };
        }
        let node = &self.nodes[first];
        let previous = (node.prev != NIL).then(|| self.nodes[node.prev].interval.clone());
        if overlaps_point(&node.interval, point) {
            Neighbourhood {
                previous,
                overlap: Some(node.interval.clone()),
                next: (node.next != NIL).then(|| self.nodes[node.next].interval.clone()),
            }
        } else {
            Neighbourhood {
                previous,
                overlap: None,
                next: Some(node.interval.clone()),
            }
        }
    }

    fn neighbourhood(&self, query: &Iv<T>) -> Neighbourhood<I> {
        let first = self.first_satisfying(|i| cmp_high_low(i, query) != Ordering::Less);
        if first == NIL {
            return Neighbourhood {
                previous: (self.tail != NIL).then(|| self.nodes[self.tail].interval.clone()),
                overlap: None,
                next: None,
            };
        }
        let node = &self.nodes[first];
        let previous = (node.prev != NIL).then(|| self.nodes[node.prev].interval.clone());
        if overlaps(&node.interval, query) {
            // skip past the run of overlapping intervals to the true next
            let mut after = node.next;
            while after != NIL && overlaps(&self.nodes[after].interval, query) {
                after = self.nodes[after].next;
            }
            Neighbourhood {
                previous,
                overlap: Some(node.interval.clone()),
                next: (after != NIL).then(|| self.nodes[after].interval.clone()),
            }
        } else {
            Neighbourhood {
                previous,
                overlap: None,
                next: Some(node.interval.clone()),
            }
        }
    }
}
