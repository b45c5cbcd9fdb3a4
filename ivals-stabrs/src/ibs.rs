use std::cmp::Ordering;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::rc::Rc;

use fxhash::{FxHashMap, FxHashSet};
use log::debug;

use ivals_core::CollectionError;
use ivals_core::algebra::{cmp_high, cmp_low, interval_equals, overlaps, overlaps_point};
use ivals_core::models::{BoundedInterval, Iv};
use ivals_core::sweep::endpoint_values;

use crate::events::{EventListener, EventSource};
use crate::traits::{IntervalCollection, IvIter, Speed};

const NIL: usize = usize::MAX;

/// A multiset of interval handles keyed on reference identity. Stores each
/// distinct `Rc` once with an occurrence count, so reference duplicates
/// keep O(1) membership tests.
#[derive(Debug)]
struct RefBag<I> {
    items: FxHashMap<*const I, (Rc<I>, usize)>,
    len: usize,
}

impl<I> Default for RefBag<I> {
    fn default() -> Self {
        RefBag {
            items: FxHashMap::default(),
            len: 0,
        }
    }
}

impl<I> RefBag<I> {
    fn insert(&mut self, interval: &Rc<I>) {
        self.items
            .entry(Rc::as_ptr(interval))
            .or_insert_with(|| (interval.clone(), 0))
            .1 += 1;
        self.len += 1;
    }

    /// Remove one occurrence; `false` when the reference is absent.
    fn remove(&mut self, interval: &Rc<I>) -> bool {
        let key = Rc::as_ptr(interval);
        match self.items.get_mut(&key) {
            Some((_, n)) => {
                *n -= 1;
                if *n == 0 {
                    self.items.remove(&key);
                }
                self.len -= 1;
                true
            }
            None => false,
        }
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Every occurrence, duplicates included.
    fn iter(&self) -> impl Iterator<Item = &Rc<I>> + '_ {
        self.items
            .values()
            .flat_map(|(rc, n)| std::iter::repeat(rc).take(*n))
    }
}

#[derive(Debug)]
struct Node<I, T> {
    key: T,
    left: usize,
    right: usize,
    parent: usize,
    height: i32,
    /// Intervals registered here whose low lies strictly left of the key.
    less: RefBag<I>,
    /// Intervals with an endpoint value at the key.
    equal: RefBag<I>,
    /// Intervals registered here whose high lies strictly right of the key.
    greater: RefBag<I>,
    /// Depth change at the key itself: included lows minus excluded highs.
    delta_at: i64,
    /// Depth change just past the key: excluded lows minus included highs.
    delta_after: i64,
    /// Subtree total of both deltas.
    sum: i64,
    /// Largest prefix sum within the subtree; the root's value is the
    /// collection's maximum depth.
    max: i64,
}

/// The interval binary search tree: an AVL tree keyed on the endpoint
/// values present in the collection, the most capable of the indexes.
///
/// Every interval is registered along the search paths of its two endpoint
/// values, at each visited node whose key falls inside the interval's value
/// range: `equal` when the key matches an endpoint, `less`/`greater` when
/// the interval continues past the key on that side. A stabbing descent
/// emits `less` turning left, `greater` turning right and all three at a
/// key hit, so every answer is found in one root-to-leaf walk. Registration
/// depends only on which nodes the two search paths visit, which rotations
/// preserve, so rebalancing never rewrites the bags.
///
/// Depth bookkeeping rides on the same nodes: each endpoint node carries
/// the +1/−1 sweep deltas split into an at-key and past-key slot, and every
/// node aggregates its subtree's delta total and maximum prefix sum.
/// Overlaps, containments and reference duplicates are all accepted.
#[derive(Debug)]
pub struct IntervalBinarySearchTree<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    nodes: Vec<Node<I, T>>,
    root: usize,
    count: usize,
    events: EventSource<I>,
    _endpoint: PhantomData<T>,
}

impl<I, T> IntervalBinarySearchTree<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    pub fn new() -> Self {
        IntervalBinarySearchTree {
            nodes: Vec::new(),
            root: NIL,
            count: 0,
            events: EventSource::default(),
            _endpoint: PhantomData,
        }
    }

    /// Build from a batch of handles. With `pre_construct` the endpoint
    /// tree is laid out balanced in one pass before any interval is
    /// registered; otherwise the batch is added incrementally.
    pub fn from_intervals(intervals: Vec<Rc<I>>, pre_construct: bool) -> Self {
        let mut tree = Self::new();
        if pre_construct {
            let keys = endpoint_values(&intervals);
            debug!(
                "pre-constructing interval binary search tree: {} intervals, {} endpoint keys",
                intervals.len(),
                keys.len(),
            );
            tree.root = tree.build_balanced(&keys, NIL);
            for interval in intervals {
                tree.register(&interval);
                tree.apply_deltas(&interval, 1);
                tree.count += 1;
            }
            tree.refresh_all(tree.root);
        } else {
            for interval in intervals {
                tree.insert_quiet(interval);
            }
        }
        tree
    }

    fn build_balanced(&mut self, keys: &[T], parent: usize) -> usize {
        if keys.is_empty() {
            return NIL;
        }
        let mid = keys.len() / 2;
        let id = self.push_node(keys[mid].clone(), parent);
        let left = self.build_balanced(&keys[..mid], id);
        let right = self.build_balanced(&keys[mid + 1..], id);
        self.nodes[id].left = left;
        self.nodes[id].right = right;
        self.nodes[id].height = 1 + self.height_of(left).max(self.height_of(right));
        id
    }

    fn push_node(&mut self, key: T, parent: usize) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node {
            key,
            left: NIL,
            right: NIL,
            parent,
            height: 1,
            less: RefBag::default(),
            equal: RefBag::default(),
            greater: RefBag::default(),
            delta_at: 0,
            delta_after: 0,
            sum: 0,
            max: 0,
        });
        id
    }

    fn height_of(&self, id: usize) -> i32 {
        if id == NIL { 0 } else { self.nodes[id].height }
    }

    fn sum_of(&self, id: usize) -> i64 {
        if id == NIL { 0 } else { self.nodes[id].sum }
    }

    fn max_of(&self, id: usize) -> i64 {
        if id == NIL { 0 } else { self.nodes[id].max }
    }

    fn balance_of(&self, id: usize) -> i32 {
        self.height_of(self.nodes[id].left) - self.height_of(self.nodes[id].right)
    }

    /// Recompute height and the depth aggregates from the children.
    fn refresh(&mut self, id: usize) {
        let (left, right) = (self.nodes[id].left, self.nodes[id].right);
        let node = &self.nodes[id];
        let at = self.sum_of(left) + node.delta_at;
        let after = at + node.delta_after;
        let max = self
            .max_of(left)
            .max(at)
            .max(after + self.max_of(right));
        let sum = after + self.sum_of(right);
        let height = 1 + self.height_of(left).max(self.height_of(right));
        let node = &mut self.nodes[id];
        node.sum = sum;
        node.max = max;
        node.height = height;
    }

    fn refresh_up(&mut self, mut id: usize) {
        while id != NIL {
            self.refresh(id);
            id = self.nodes[id].parent;
        }
    }

    fn refresh_all(&mut self, id: usize) {
        if id == NIL {
            return;
        }
        let (left, right) = (self.nodes[id].left, self.nodes[id].right);
        self.refresh_all(left);
        self.refresh_all(right);
        self.refresh(id);
    }

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
        self.refresh(x);
        self.refresh(y);
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
        self.refresh(x);
        self.refresh(y);
    }

    fn rebalance_up(&mut self, mut id: usize) {
        while id != NIL {
            self.refresh(id);
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

    /// Find the node keyed `value`, inserting it if absent.
    fn ensure_key(&mut self, value: &T) {
        let mut cur = self.root;
        let mut parent = NIL;
        let mut went_left = false;
        while cur != NIL {
            match value.cmp(&self.nodes[cur].key) {
                Ordering::Equal => return,
                Ordering::Less => {
                    parent = cur;
                    went_left = true;
                    cur = self.nodes[cur].left;
                }
                Ordering::Greater => {
                    parent = cur;
                    went_left = false;
                    cur = self.nodes[cur].right;
                }
            }
        }
        let id = self.push_node(value.clone(), parent);
        if parent == NIL {
            self.root = id;
        } else if went_left {
            self.nodes[parent].left = id;
        } else {
            self.nodes[parent].right = id;
        }
        self.rebalance_up(parent);
    }

    fn find_key(&self, value: &T) -> usize {
        let mut cur = self.root;
        while cur != NIL {
            match value.cmp(&self.nodes[cur].key) {
                Ordering::Equal => return cur,
                Ordering::Less => cur = self.nodes[cur].left,
                Ordering::Greater => cur = self.nodes[cur].right,
            }
        }
        NIL
    }

    /// Visit every node on the search paths of both endpoint values whose
    /// key lies inside the interval's value range.
    fn walk_registrations(&self, interval: &impl BoundedInterval<T>, mut visit: impl FnMut(usize)) {
        let low = interval.low();
        let high = interval.high();
        // shared prefix until the paths diverge
        let mut cur = self.root;
        while cur != NIL {
            let key = &self.nodes[cur].key;
            if high < key {
                cur = self.nodes[cur].left;
            } else if low > key {
                cur = self.nodes[cur].right;
            } else {
                break;
            }
        }
        if cur == NIL {
            return;
        }
        visit(cur);
        let split = &self.nodes[cur];
        // low branch: keys in [low, split.key)
        let mut down = split.left;
        while down != NIL {
            let key = &self.nodes[down].key;
            if low > key {
                down = self.nodes[down].right;
            } else {
                visit(down);
                if low == key {
                    break;
                }
                down = self.nodes[down].left;
            }
        }
        // high branch: keys in (split.key, high]
        let mut down = split.right;
        while down != NIL {
            let key = &self.nodes[down].key;
            if high < key {
                down = self.nodes[down].left;
            } else {
                visit(down);
                if high == key {
                    break;
                }
                down = self.nodes[down].right;
            }
        }
    }

    /// Add the interval to the bags demanded by its endpoints at every
    /// registration node.
    fn register(&mut self, interval: &Rc<I>) {
        let mut hits = Vec::new();
        self.walk_registrations(interval, |id| hits.push(id));
        for id in hits {
            let key = &self.nodes[id].key;
            let at_endpoint = interval.low() == key || interval.high() == key;
            let past_left = interval.low() < key;
            let past_right = interval.high() > key;
            let node = &mut self.nodes[id];
            if at_endpoint {
                node.equal.insert(interval);
            }
            if past_left {
                node.less.insert(interval);
            }
            if past_right {
                node.greater.insert(interval);
            }
        }
    }

    /// Mirror of [`register`]; returns the nodes whose bags all drained.
    fn deregister(&mut self, interval: &Rc<I>) -> Vec<T> {
        let mut hits = Vec::new();
        self.walk_registrations(interval, |id| hits.push(id));
        let mut drained = Vec::new();
        for id in hits {
            let key = self.nodes[id].key.clone();
            let at_endpoint = *interval.low() == key || *interval.high() == key;
            let past_left = *interval.low() < key;
            let past_right = *interval.high() > key;
            let node = &mut self.nodes[id];
            if at_endpoint {
                node.equal.remove(interval);
            }
            if past_left {
                node.less.remove(interval);
            }
            if past_right {
                node.greater.remove(interval);
            }
            if node.less.is_empty() && node.equal.is_empty() && node.greater.is_empty() {
                drained.push(key);
            }
        }
        drained
    }

    /// Apply the sweep deltas of one interval occurrence at its endpoint
    /// nodes, signed +1 on insert and −1 on removal.
    fn apply_deltas(&mut self, interval: &impl BoundedInterval<T>, sign: i64) {
        let low_node = self.find_key(interval.low());
        if interval.low_inc() {
            self.nodes[low_node].delta_at += sign;
        } else {
            self.nodes[low_node].delta_after += sign;
        }
        let high_node = self.find_key(interval.high());
        if interval.high_inc() {
            self.nodes[high_node].delta_after -= sign;
        } else {
            self.nodes[high_node].delta_at -= sign;
        }
    }

    fn insert_quiet(&mut self, interval: Rc<I>) {
        self.ensure_key(interval.low());
        self.ensure_key(interval.high());
        self.register(&interval);
        self.apply_deltas(&interval, 1);
        let low_node = self.find_key(interval.low());
        self.refresh_up(low_node);
        let high_node = self.find_key(interval.high());
        self.refresh_up(high_node);
        self.count += 1;
    }

    /// Delete the node keyed `value` once its bags are empty.
    fn splice_key(&mut self, value: &T) {
        let mut id = self.find_key(value);
        if id == NIL {
            return;
        }
        if self.nodes[id].left != NIL && self.nodes[id].right != NIL {
            // lift the successor's key, bags and deltas into this slot
            let mut successor = self.nodes[id].right;
            while self.nodes[successor].left != NIL {
                successor = self.nodes[successor].left;
            }
            let key = self.nodes[successor].key.clone();
            let less = std::mem::take(&mut self.nodes[successor].less);
            let equal = std::mem::take(&mut self.nodes[successor].equal);
            let greater = std::mem::take(&mut self.nodes[successor].greater);
            let (delta_at, delta_after) = (
                self.nodes[successor].delta_at,
                self.nodes[successor].delta_after,
            );
            let node = &mut self.nodes[id];
            node.key = key;
            node.less = less;
            node.equal = equal;
            node.greater = greater;
            node.delta_at = delta_at;
            node.delta_after = delta_after;
            id = successor;
        }
        let child = if self.nodes[id].left != NIL {
            self.nodes[id].left
        } else {
            self.nodes[id].right
        };
        let parent = self.nodes[id].parent;
        self.replace_child(parent, id, child);
        self.rebalance_up(parent);
        self.compact(id);
    }

    /// Drop the detached node at `slot`, moving the last arena slot in and
    /// fixing references to it.
    fn compact(&mut self, slot: usize) {
        let last = self.nodes.len() - 1;
        if slot == last {
            self.nodes.pop();
            return;
        }
        self.nodes.swap_remove(slot);
        let moved = &self.nodes[slot];
        let (parent, left, right) = (moved.parent, moved.left, moved.right);
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
    }

    /// Dedup-and-expand buffer shared by the query walks: each distinct
    /// reference is buffered once per stored occurrence.
    fn buffer_bag(
        bag: &RefBag<I>,
        keep: impl Fn(&Rc<I>) -> bool,
        seen: &mut FxHashSet<*const I>,
        buffer: &mut VecDeque<Rc<I>>,
    ) {
        for (ptr, (rc, occurrences)) in &bag.items {
            if keep(rc) && seen.insert(*ptr) {
                for _ in 0..*occurrences {
                    buffer.push_back(rc.clone());
                }
            }
        }
    }

    /// Stabbing descent for a point query.
    fn stab(&self, point: &T) -> VecDeque<Rc<I>> {
        let mut seen = FxHashSet::default();
        let mut buffer = VecDeque::new();
        let keep = |rc: &Rc<I>| overlaps_point(rc, point);
        let mut cur = self.root;
        while cur != NIL {
            let node = &self.nodes[cur];
            match point.cmp(&node.key) {
                Ordering::Less => {
                    Self::buffer_bag(&node.less, keep, &mut seen, &mut buffer);
                    cur = node.left;
                }
                Ordering::Greater => {
                    Self::buffer_bag(&node.greater, keep, &mut seen, &mut buffer);
                    cur = node.right;
                }
                Ordering::Equal => {
                    Self::buffer_bag(&node.less, keep, &mut seen, &mut buffer);
                    Self::buffer_bag(&node.equal, keep, &mut seen, &mut buffer);
                    Self::buffer_bag(&node.greater, keep, &mut seen, &mut buffer);
                    break;
                }
            }
        }
        buffer
    }

    /// Range walk: the stabbing descent at the query's low value picks up
    /// everything reaching in from the left; the pruned in-order scan over
    /// keys inside the query picks up everything starting within it.
    fn range(&self, query: &Iv<T>) -> VecDeque<Rc<I>> {
        let mut seen = FxHashSet::default();
        let mut buffer = VecDeque::new();
        let keep = |rc: &Rc<I>| overlaps(rc, query);

        let mut cur = self.root;
        while cur != NIL {
            let node = &self.nodes[cur];
            match query.low().cmp(&node.key) {
                Ordering::Less => {
                    Self::buffer_bag(&node.less, keep, &mut seen, &mut buffer);
                    cur = node.left;
                }
                Ordering::Greater => {
                    Self::buffer_bag(&node.greater, keep, &mut seen, &mut buffer);
                    cur = node.right;
                }
                Ordering::Equal => {
                    Self::buffer_bag(&node.less, keep, &mut seen, &mut buffer);
                    Self::buffer_bag(&node.equal, keep, &mut seen, &mut buffer);
                    Self::buffer_bag(&node.greater, keep, &mut seen, &mut buffer);
                    break;
                }
            }
        }

        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if id == NIL {
                continue;
            }
            let node = &self.nodes[id];
            if node.key >= *query.low() && node.key <= *query.high() {
                Self::buffer_bag(&node.equal, keep, &mut seen, &mut buffer);
                stack.push(node.left);
                stack.push(node.right);
            } else if node.key < *query.low() {
                stack.push(node.right);
            } else {
                stack.push(node.left);
            }
        }
        buffer
    }
}

impl<I, T> Default for IntervalBinarySearchTree<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    fn default() -> Self {
        Self::new()
    }
}

/// In-order walk over the stored intervals, each emitted at its low
/// endpoint's node.
pub struct IterAll<'a, I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    tree: &'a IntervalBinarySearchTree<I, T>,
    stack: Vec<usize>,
    buffer: VecDeque<Rc<I>>,
}

impl<'a, I, T> IterAll<'a, I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    fn new(tree: &'a IntervalBinarySearchTree<I, T>) -> Self {
        let mut iter = IterAll {
            tree,
            stack: Vec::new(),
            buffer: VecDeque::new(),
        };
        iter.push_left(tree.root);
        iter
    }

    fn push_left(&mut self, mut id: usize) {
        while id != NIL {
            self.stack.push(id);
            id = self.tree.nodes[id].left;
        }
    }
}

impl<'a, I, T> Iterator for IterAll<'a, I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    type Item = Rc<I>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(item);
            }
            let id = self.stack.pop()?;
            let node = &self.tree.nodes[id];
            for (_, (rc, occurrences)) in &node.equal.items {
                if rc.low() == &node.key {
                    for _ in 0..*occurrences {
                        self.buffer.push_back(rc.clone());
                    }
                }
            }
            self.push_left(node.right);
        }
    }
}

impl<I, T> IntervalCollection<I, T> for IntervalBinarySearchTree<I, T>
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
        false
    }

    fn count(&self) -> usize {
        self.count
    }

    fn count_speed(&self) -> Speed {
        Speed::Constant
    }

    fn choose(&self) -> Result<Rc<I>, CollectionError> {
        if self.root == NIL {
            return Err(CollectionError::EmptyCollection);
        }
        let node = &self.nodes[self.root];
        node.equal
            .iter()
            .chain(node.less.iter())
            .chain(node.greater.iter())
            .next()
            .cloned()
            .ok_or_else(|| {
                CollectionError::CorruptState("reachable node with no registrations".to_string())
            })
    }

    fn iter<'a>(&'a self) -> IvIter<'a, I> {
        Box::new(IterAll::new(self))
    }

    fn lowest_interval(&self) -> Result<Rc<I>, CollectionError> {
        Ok(self.lowest_intervals()?.remove(0))
    }

    fn highest_interval(&self) -> Result<Rc<I>, CollectionError> {
        Ok(self.highest_intervals()?.remove(0))
    }

    fn lowest_intervals(&self) -> Result<Vec<Rc<I>>, CollectionError> {
        if self.root == NIL {
            return Err(CollectionError::EmptyCollection);
        }
        let mut id = self.root;
        while self.nodes[id].left != NIL {
            id = self.nodes[id].left;
        }
        let node = &self.nodes[id];
        // the leftmost key is some interval's low endpoint
        let candidates: Vec<&Rc<I>> = node
            .equal
            .items
            .values()
            .filter(|(rc, _)| rc.low() == &node.key)
            .map(|(rc, _)| rc)
            .collect();
        let best = candidates
            .iter()
            .copied()
            .min_by(|a, b| cmp_low(*a, *b))
            .ok_or_else(|| {
                CollectionError::CorruptState("leftmost key lost its low endpoints".to_string())
            })?;
        let mut lowest = Vec::new();
        for (rc, occurrences) in node.equal.items.values() {
            if cmp_low(rc, best) == Ordering::Equal {
                for _ in 0..*occurrences {
                    lowest.push(rc.clone());
                }
            }
        }
        Ok(lowest)
    }

    fn highest_intervals(&self) -> Result<Vec<Rc<I>>, CollectionError> {
        if self.root == NIL {
            return Err(CollectionError::EmptyCollection);
        }
        let mut id = self.root;
        while self.nodes[id].right != NIL {
            id = self.nodes[id].right;
        }
        let node = &self.nodes[id];
        let best = node
            .equal
            .items
            .values()
            .filter(|(rc, _)| rc.high() == &node.key)
            .map(|(rc, _)| rc)
            .max_by(|a, b| cmp_high(*a, *b))
            .ok_or_else(|| {
                CollectionError::CorruptState("rightmost key lost its high endpoints".to_string())
            })?
            .clone();
        let mut highest = Vec::new();
        for (rc, occurrences) in node.equal.items.values() {
            if cmp_high(rc, &best) == Ordering::Equal {
                for _ in 0..*occurrences {
                    highest.push(rc.clone());
                }
            }
        }
        Ok(highest)
    }

    fn maximum_depth(&self) -> usize {
        if self.root == NIL {
            0
        } else {
            self.nodes[self.root].max.max(0) as usize
        }
    }

    fn find_equals<'a>(&'a self, query: &Iv<T>) -> IvIter<'a, I>
    where
        I: 'a,
        T: 'a,
    {
        let node = self.find_key(query.low());
        if node == NIL {
            return Box::new(std::iter::empty());
        }
        let query = query.clone();
        Box::new(
            self.nodes[node]
                .equal
                .iter()
                .filter(move |rc| interval_equals(*rc, &query))
                .cloned(),
        )
    }

    fn find_overlaps_point<'a>(&'a self, point: &T) -> IvIter<'a, I>
    where
        I: 'a,
        T: 'a,
    {
        Box::new(self.stab(point).into_iter())
    }

    fn find_overlaps<'a>(&'a self, query: &Iv<T>) -> IvIter<'a, I>
    where
        I: 'a,
        T: 'a,
    {
        Box::new(self.range(query).into_iter())
    }

    fn add(&mut self, interval: Rc<I>) -> Result<bool, CollectionError> {
        self.insert_quiet(interval.clone());
        self.events.fire_added(vec![interval]);
        Ok(true)
    }

    fn remove(&mut self, interval: &Rc<I>) -> Result<bool, CollectionError> {
        let low_node = self.find_key(interval.low());
        if low_node == NIL || !self.nodes[low_node].equal.items.contains_key(&Rc::as_ptr(interval))
        {
            return Ok(false);
        }
        self.apply_deltas(interval, -1);
        let drained = self.deregister(interval);
        let low_node = self.find_key(interval.low());
        self.refresh_up(low_node);
        let high_node = self.find_key(interval.high());
        self.refresh_up(high_node);
        for key in &drained {
            self.splice_key(key);
        }
        self.count -= 1;
        self.events.fire_removed(vec![interval.clone()]);
        Ok(true)
    }

    fn clear(&mut self) -> Result<(), CollectionError> {
        if self.count > 0 {
            let count = self.count;
            self.nodes.clear();
            self.root = NIL;
            self.count = 0;
            self.events.fire_cleared(count);
        }
        Ok(())
    }

    fn on_event(&mut self, listener: EventListener<I>) {
        self.events.subscribe(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    fn iv(low: i32, high: i32, li: bool, hi: bool) -> Rc<Iv<i32>> {
        Rc::new(Iv::new(low, high, li, hi).unwrap())
    }

    /// The article example: A..H with E duplicated by value.
    #[fixture]
    fn article() -> Vec<Rc<Iv<i32>>> {
        vec![
            iv(9, 19, true, true),           // A
            iv(2, 7, true, true),            // B
            iv(1, 3, true, false),           // C
            iv(17, 20, false, true),         // D
            iv(8, 12, true, true),           // E1
            iv(8, 12, true, true),           // E2
            Rc::new(Iv::point(18)),          // F
            iv(i32::MIN, 17, true, true),    // G
            iv(5, 10, false, false),         // H
        ]
    }

    fn lows_at(tree: &IntervalBinarySearchTree<Iv<i32>, i32>, point: i32) -> Vec<i32> {
        let mut lows: Vec<i32> = tree.find_overlaps_point(&point).map(|i| *i.low()).collect();
        lows.sort();
        lows
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_article_stabbing(article: Vec<Rc<Iv<i32>>>, #[case] pre_construct: bool) {
        let tree = IntervalBinarySearchTree::from_intervals(article, pre_construct);
        assert_eq!(tree.count(), 9);

        // stab 10: A, E1, E2, G
        assert_eq!(lows_at(&tree, 10), vec![i32::MIN, 8, 8, 9]);
        // stab 18: A, D, F
        assert_eq!(lows_at(&tree, 18), vec![9, 17, 18]);
        // stab 0: G only
        assert_eq!(lows_at(&tree, 0), vec![i32::MIN]);
    }

    #[rstest]
    fn test_article_depth_and_span(article: Vec<Rc<Iv<i32>>>) {
        let tree = IntervalBinarySearchTree::from_intervals(article, true);
        assert_eq!(tree.maximum_depth(), 5);
        assert_eq!(
            tree.span().unwrap(),
            Iv::new(i32::MIN, 20, true, true).unwrap()
        );
    }

    #[rstest]
    fn test_incremental_matches_bulk(article: Vec<Rc<Iv<i32>>>) {
        let bulk = IntervalBinarySearchTree::from_intervals(article.clone(), true);
        let mut incremental = IntervalBinarySearchTree::new();
        for interval in article {
            assert_eq!(incremental.add(interval).unwrap(), true);
        }
        assert_eq!(bulk.count(), incremental.count());
        assert_eq!(bulk.maximum_depth(), incremental.maximum_depth());
        for p in [-1, 0, 1, 5, 8, 10, 12, 17, 18, 19, 20, 21] {
            assert_eq!(lows_at(&bulk, p), lows_at(&incremental, p), "stab at {p}");
        }
    }

    #[rstest]
    fn test_open_endpoints_respected() {
        let tree =
            IntervalBinarySearchTree::from_intervals(vec![iv(5, 10, false, false)], false);
        assert_eq!(tree.count_overlaps_point(&5), 0);
        assert_eq!(tree.count_overlaps_point(&10), 0);
        assert_eq!(tree.count_overlaps_point(&7), 1);
        assert_eq!(tree.maximum_depth(), 1);
    }

    #[rstest]
    fn test_reference_duplicates_counted() {
        let shared = iv(3, 6, true, true);
        let mut tree = IntervalBinarySearchTree::new();
        assert!(tree.add(shared.clone()).unwrap());
        assert!(tree.add(shared.clone()).unwrap());
        assert_eq!(tree.count(), 2);
        assert_eq!(tree.count_overlaps_point(&4), 2);
        assert_eq!(tree.maximum_depth(), 2);

        assert!(tree.remove(&shared).unwrap());
        assert_eq!(tree.count(), 1);
        assert_eq!(tree.count_overlaps_point(&4), 1);
        assert!(tree.remove(&shared).unwrap());
        assert!(!tree.remove(&shared).unwrap());
        assert!(tree.is_empty());
        assert_eq!(tree.nodes.len(), 0);
    }

    #[rstest]
    fn test_remove_is_reference_based(article: Vec<Rc<Iv<i32>>>) {
        let mut tree = IntervalBinarySearchTree::from_intervals(article.clone(), false);
        let twin = iv(9, 19, true, true);
        assert_eq!(tree.remove(&twin).unwrap(), false);
        assert_eq!(tree.remove(&article[0]).unwrap(), true);
        assert_eq!(tree.count(), 8);
        assert_eq!(lows_at(&tree, 18), vec![17, 18]);
    }

    #[rstest]
    fn test_removal_drains_nodes(article: Vec<Rc<Iv<i32>>>) {
        let mut tree = IntervalBinarySearchTree::from_intervals(article.clone(), false);
        for interval in &article {
            assert_eq!(tree.remove(interval).unwrap(), true);
        }
        assert!(tree.is_empty());
        assert_eq!(tree.nodes.len(), 0);
        assert_eq!(tree.maximum_depth(), 0);
        assert_eq!(tree.find_overlaps_point(&10).count(), 0);
    }

    #[rstest]
    fn test_range_query(article: Vec<Rc<Iv<i32>>>) {
        let tree = IntervalBinarySearchTree::from_intervals(article, true);
        // [11,16] overlaps A, E1, E2, G
        let mut lows: Vec<i32> = tree
            .find_overlaps(&Iv::closed(11, 16).unwrap())
            .map(|i| *i.low())
            .collect();
        lows.sort();
        assert_eq!(lows, vec![i32::MIN, 8, 8, 9]);

        // (19,20] touches only D
        assert_eq!(tree.count_overlaps(&Iv::lower_open(19, 20).unwrap()), 1);

        // far right of everything
        assert_eq!(tree.count_overlaps(&Iv::closed(30, 40).unwrap()), 0);
    }

    #[rstest]
    fn test_find_equals(article: Vec<Rc<Iv<i32>>>) {
        let tree = IntervalBinarySearchTree::from_intervals(article, true);
        assert_eq!(tree.find_equals(&Iv::closed(8, 12).unwrap()).count(), 2);
        assert_eq!(tree.find_equals(&Iv::upper_open(8, 12).unwrap()).count(), 0);
        assert_eq!(tree.find_equals(&Iv::closed(2, 7).unwrap()).count(), 1);
    }

    #[rstest]
    fn test_iter_yields_every_occurrence(article: Vec<Rc<Iv<i32>>>) {
        let tree = IntervalBinarySearchTree::from_intervals(article.clone(), true);
        let mut seen: Vec<i32> = tree.iter().map(|i| *i.low()).collect();
        seen.sort();
        let mut expected: Vec<i32> = article.iter().map(|i| *i.low()).collect();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[rstest]
    fn test_lowest_and_highest(article: Vec<Rc<Iv<i32>>>) {
        let tree = IntervalBinarySearchTree::from_intervals(article, true);
        assert_eq!(*tree.lowest_interval().unwrap().low(), i32::MIN);
        assert_eq!(*tree.highest_interval().unwrap().high(), 20);
        assert_eq!(tree.lowest_intervals().unwrap().len(), 1);
        assert_eq!(tree.highest_intervals().unwrap().len(), 1);
    }

    #[rstest]
    fn test_empty_tree() {
        let tree: IntervalBinarySearchTree<Iv<i32>, i32> = IntervalBinarySearchTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.maximum_depth(), 0);
        assert_eq!(tree.find_overlaps_point(&3).count(), 0);
        assert_eq!(tree.span(), Err(CollectionError::EmptyCollection));
        assert_eq!(tree.choose(), Err(CollectionError::EmptyCollection));
    }

    #[rstest]
    fn test_gaps(article: Vec<Rc<Iv<i32>>>) {
        let tree = IntervalBinarySearchTree::from_intervals(article, true);
        // G bridges everything up to 17 and D finishes the span
        assert_eq!(tree.gaps().count(), 0);

        let mut sparse = IntervalBinarySearchTree::new();
        sparse
            .add_all(vec![iv(0, 3, true, true), iv(7, 9, false, false)])
            .unwrap();
        assert_eq!(
            sparse.gaps().collect::<Vec<_>>(),
            vec![Iv::new(3, 7, false, true).unwrap()]
        );
    }
}
