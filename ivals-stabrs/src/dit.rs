use std::collections::VecDeque;
use std::marker::PhantomData;
use std::rc::Rc;

use ivals_core::CollectionError;
use ivals_core::algebra::{cmp_high, cmp_high_low, cmp_low, cmp_low_high, join, overlaps, overlaps_point};
use ivals_core::models::{BoundedInterval, Iv};

use crate::events::{EventListener, EventSource};
use crate::traits::{IntervalCollection, IvIter, Speed};

const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Node<I, T> {
    /// The split value this node routes around.
    split: T,
    /// Stored intervals whose value range contains the split.
    covering: Vec<Rc<I>>,
    left: usize,
    right: usize,
    parent: usize,
    height: i32,
    /// Interval with the furthest-right high endpoint in this subtree.
    max_high: Option<Rc<I>>,
    /// Interval with the furthest-left low endpoint in this subtree.
    min_low: Option<Rc<I>>,
}

/// The dynamic interval tree: an AVL tree keyed on split values, each node
/// holding the intervals that cover its split.
///
/// Routing is by value range: an interval entirely left of a split descends
/// left, entirely right descends right, and one covering the split stays at
/// the node. Rotations pull coverers up to the new subtree root when its
/// split falls inside them, which keeps every interval at the highest node
/// it covers on its search path. The `max_high`/`min_low` subtree fields
/// prune range queries to the `O(log n + k)` bound.
///
/// Overlaps, containments and reference duplicates are all accepted.
#[derive(Debug)]
pub struct DynamicIntervalTree<I, T>
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

impl<I, T> DynamicIntervalTree<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    pub fn new() -> Self {
        DynamicIntervalTree {
            nodes: Vec::new(),
            root: NIL,
            count: 0,
            events: EventSource::default(),
            _endpoint: PhantomData,
        }
    }

    pub fn from_intervals(intervals: Vec<Rc<I>>) -> Self {
        let mut tree = Self::new();
        for interval in intervals {
            tree.insert_quiet(interval);
        }
        tree
    }

    fn height_of(&self, id: usize) -> i32 {
        if id == NIL { 0 } else { self.nodes[id].height }
    }

    fn balance_of(&self, id: usize) -> i32 {
        self.height_of(self.nodes[id].left) - self.height_of(self.nodes[id].right)
    }

    /// Recompute height and the subtree extremes from the node's own
    /// coverers and its children.
    fn refresh(&mut self, id: usize) {
        let (left, right) = (self.nodes[id].left, self.nodes[id].right);
        let height = 1 + self.height_of(left).max(self.height_of(right));

        let mut max_high: Option<Rc<I>> = None;
        let mut min_low: Option<Rc<I>> = None;
        let consider = |candidate: &Rc<I>, max_high: &mut Option<Rc<I>>, min_low: &mut Option<Rc<I>>| {
            match max_high {
                Some(best) if cmp_high(candidate, best) <= std::cmp::Ordering::Equal => {}
                _ => *max_high = Some(candidate.clone()),
            }
            match min_low {
                Some(best) if cmp_low(candidate, best) >= std::cmp::Ordering::Equal => {}
                _ => *min_low = Some(candidate.clone()),
            }
        };
        for candidate in &self.nodes[id].covering {
            consider(candidate, &mut max_high, &mut min_low);
        }
        for child in [left, right] {
            if child == NIL {
                continue;
            }
            if let Some(candidate) = &self.nodes[child].max_high {
                consider(candidate, &mut max_high, &mut min_low);
            }
            if let Some(candidate) = &self.nodes[child].min_low {
                consider(candidate, &mut max_high, &mut min_low);
            }
        }

        let node = &mut self.nodes[id];
        node.height = height;
        node.max_high = max_high;
        node.min_low = min_low;
    }

    fn refresh_up(&mut self, mut id: usize) {
        while id != NIL {
            self.refresh(id);
            id = self.nodes[id].parent;
        }
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

    /// Coverers of the demoted node whose range reaches the promoted
    /// node's split move up with it, so they stay on every search path
    /// that can reach them.
    fn pull_up(&mut self, from: usize, to: usize) {
        let split = self.nodes[to].split.clone();
        let mut moved = Vec::new();
        let covering = &mut self.nodes[from].covering;
        let mut at = 0;
        while at < covering.len() {
            let interval = &covering[at];
            if *interval.low() <= split && split <= *interval.high() {
                moved.push(covering.swap_remove(at));
            } else {
                at += 1;
            }
        }
        self.nodes[to].covering.extend(moved);
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
        self.pull_up(x, y);
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
        self.pull_up(x, y);
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

    fn insert_quiet(&mut self, interval: Rc<I>) {
        let mut cur = self.root;
        let mut parent = NIL;
        let mut went_left = false;
        while cur != NIL {
            let split = &self.nodes[cur].split;
            if interval.high() < split {
                parent = cur;
                went_left = true;
                cur = self.nodes[cur].left;
            } else if interval.low() > split {
                parent = cur;
                went_left = false;
                cur = self.nodes[cur].right;
            } else {
                // covers the split
                self.nodes[cur].covering.push(interval);
                self.refresh_up(cur);
                self.count += 1;
                return;
            }
        }
        let id = self.nodes.len();
        self.nodes.push(Node {
            split: interval.low().clone(),
            covering: vec![interval],
            left: NIL,
            right: NIL,
            parent,
            height: 1,
            max_high: None,
            min_low: None,
        });
        if parent == NIL {
            self.root = id;
        } else if went_left {
            self.nodes[parent].left = id;
        } else {
            self.nodes[parent].right = id;
        }
        self.refresh(id);
        self.rebalance_up(parent);
        self.count += 1;
    }

    /// Splice a drained node with at most one child; a drained node with
    /// two children stays as a pure routing node.
    fn try_splice(&mut self, id: usize) {
        if !self.nodes[id].covering.is_empty()
            || (self.nodes[id].left != NIL && self.nodes[id].right != NIL)
        {
            return;
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

    /// Range walk pruned by the subtree extremes.
    fn collect_overlaps(&self, query: &Iv<T>) -> VecDeque<Rc<I>> {
        let mut found = VecDeque::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if id == NIL {
                continue;
            }
            let node = &self.nodes[id];
            let reachable = match (&node.max_high, &node.min_low) {
                (Some(max_high), Some(min_low)) => {
                    cmp_high_low(max_high, query) >= std::cmp::Ordering::Equal
                        && cmp_low_high(min_low, query) <= std::cmp::Ordering::Equal
                }
                _ => false,
            };
            if !reachable {
                continue;
            }
            for interval in &node.covering {
                if overlaps(interval, query) {
                    found.push_back(interval.clone());
                }
            }
            stack.push(node.left);
            stack.push(node.right);
        }
        found
    }
}

impl<I, T> Default for DynamicIntervalTree<I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Walk over every stored interval, node by node.
pub struct IterAll<'a, I, T>
where
    T: Ord + Clone,
    I: BoundedInterval<T>,
{
    tree: &'a DynamicIntervalTree<I, T>,
    stack: Vec<usize>,
    buffer: VecDeque<Rc<I>>,
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
            self.buffer.extend(node.covering.iter().cloned());
            if node.left != NIL {
                self.stack.push(node.left);
            }
            if node.right != NIL {
                self.stack.push(node.right);
            }
        }
    }
}

impl<I, T> IntervalCollection<I, T> for DynamicIntervalTree<I, T>
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

    fn iter<'a>(&'a self) -> IvIter<'a, I> {
        let stack = if self.root == NIL { Vec::new() } else { vec![self.root] };
        Box::new(IterAll {
            tree: self,
            stack,
            buffer: VecDeque::new(),
        })
    }

    fn span(&self) -> Result<Iv<T>, CollectionError> {
        let (lowest, highest) = (self.lowest_interval()?, self.highest_interval()?);
        Ok(join(&lowest, &highest))
    }

    fn lowest_interval(&self) -> Result<Rc<I>, CollectionError> {
        if self.root == NIL {
            return Err(CollectionError::EmptyCollection);
        }
        self.nodes[self.root]
            .min_low
            .clone()
            .ok_or_else(|| CollectionError::CorruptState("root lost its extremes".to_string()))
    }

    fn highest_interval(&self) -> Result<Rc<I>, CollectionError> {
        if self.root == NIL {
            return Err(CollectionError::EmptyCollection);
        }
        self.nodes[self.root]
            .max_high
            .clone()
            .ok_or_else(|| CollectionError::CorruptState("root lost its extremes".to_string()))
    }

    fn find_overlaps_point<'a>(&'a self, point: &T) -> IvIter<'a, I>
    where
        I: 'a,
        T: 'a,
    {
        let mut found = VecDeque::new();
        let mut cur = self.root;
        while cur != NIL {
            let node = &self.nodes[cur];
            for interval in &node.covering {
                if overlaps_point(interval, point) {
                    found.push_back(interval.clone());
                }
            }
            cur = match point.cmp(&node.split) {
                std::cmp::Ordering::Less => node.left,
                std::cmp::Ordering::Greater => node.right,
                // nothing beside the coverers can reach the split itself
                std::cmp::Ordering::Equal => break,
            };
        }
        Box::new(found.into_iter())
    }

    fn find_overlaps<'a>(&'a self, query: &Iv<T>) -> IvIter<'a, I>
    where
        I: 'a,
        T: 'a,
    {
        Box::new(self.collect_overlaps(query).into_iter())
    }

    fn add(&mut self, interval: Rc<I>) -> Result<bool, CollectionError> {
        self.insert_quiet(interval.clone());
        self.events.fire_added(vec![interval]);
        Ok(true)
    }

    fn remove(&mut self, interval: &Rc<I>) -> Result<bool, CollectionError> {
        let mut cur = self.root;
        while cur != NIL {
            let node = &self.nodes[cur];
            if interval.high() < &node.split {
                cur = node.left;
            } else if interval.low() > &node.split {
                cur = node.right;
            } else {
                // covers this split, so it can only be stored here
                let found = node
                    .covering
                    .iter()
                    .position(|stored| Rc::ptr_eq(stored, interval));
                match found {
                    Some(at) => {
                        self.nodes[cur].covering.swap_remove(at);
                        self.refresh_up(cur);
                        self.try_splice(cur);
                        self.count -= 1;
                        self.events.fire_removed(vec![interval.clone()]);
                        return Ok(true);
                    }
                    None => return Ok(false),
                }
            }
        }
        Ok(false)
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
