use std::collections::HashMap;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rstest::*;

use ivals::core::algebra::{contains_interval, overlaps, overlaps_point, strictly_contains};
use ivals::core::relations::{Relation, relate};
use ivals::core::sweep::max_depth_sweep;
use ivals::core::{BoundedInterval, CollectionError, Iv};
use ivals::stabrs::{
    DynamicIntervalTree, EndpointSortedList, FiniteIntervalTree, IntervalBinarySearchTree,
    IntervalCollection, LayeredContainmentList, NeighbourhoodCollection,
    SortedIntervalCollection,
};

type Handle = Rc<Iv<i32>>;

fn iv(low: i32, high: i32, li: bool, hi: bool) -> Handle {
    Rc::new(Iv::new(low, high, li, hi).unwrap())
}

fn closed(low: i32, high: i32) -> Handle {
    iv(low, high, true, true)
}

fn meeting(low: i32, high: i32) -> Handle {
    iv(low, high, true, false)
}

#[fixture]
fn article() -> Vec<Handle> {
    vec![
        closed(9, 19),                // A
        closed(2, 7),                 // B
        iv(1, 3, true, false),        // C
        iv(17, 20, false, true),      // D
        closed(8, 12),                // E1
        closed(8, 12),                // E2
        Rc::new(Iv::point(18)),       // F
        closed(i32::MIN, 17),         // G, low unbounded in the article
        iv(5, 10, false, false),      // H
    ]
}

/// Endpoint values themselves plus probes just outside them.
fn probe_points(stored: &[Handle]) -> Vec<i32> {
    let mut probes = Vec::new();
    for interval in stored {
        for value in [*interval.low(), *interval.high()] {
            probes.push(value);
            probes.push(value.saturating_add(1));
            probes.push(value.saturating_sub(1));
        }
    }
    probes.sort();
    probes.dedup();
    probes
}

fn occurrences(handles: impl Iterator<Item = Handle>) -> HashMap<*const Iv<i32>, usize> {
    let mut counts = HashMap::new();
    for handle in handles {
        *counts.entry(Rc::as_ptr(&handle)).or_insert(0) += 1;
    }
    counts
}

/// The universal invariants every index must satisfy after any sequence of
/// operations, cross-checked against linear reference computations.
fn check_invariants(coll: &dyn IntervalCollection<Iv<i32>, i32>) {
    let stored: Vec<Handle> = coll.iter().collect();
    assert_eq!(coll.count(), stored.len());
    assert_eq!(coll.is_empty(), stored.is_empty());

    match coll.span() {
        Ok(span) => {
            assert!(!stored.is_empty());
            for interval in &stored {
                assert!(contains_interval(&span, interval));
            }
            let lowest = coll.lowest_intervals().unwrap();
            assert!(!lowest.is_empty());
            for interval in &lowest {
                assert_eq!(interval.low(), span.low());
                assert_eq!(interval.low_inc(), span.low_inc());
            }
        }
        Err(error) => {
            assert_eq!(error, CollectionError::EmptyCollection);
            assert!(stored.is_empty());
        }
    }

    assert_eq!(coll.maximum_depth(), max_depth_sweep(&stored));

    for point in probe_points(&stored) {
        let expected: Vec<&Handle> = stored
            .iter()
            .filter(|i| overlaps_point(*i, &point))
            .collect();
        assert_eq!(coll.count_overlaps_point(&point), expected.len());
        assert_eq!(
            occurrences(coll.find_overlaps_point(&point)),
            occurrences(expected.iter().map(|i| (*i).clone())),
            "stab at {point}"
        );
        match coll.find_overlap_point(&point) {
            Some(hit) => {
                assert!(overlaps_point(&hit, &point));
                assert!(stored.iter().any(|i| Rc::ptr_eq(i, &hit)));
            }
            None => assert!(expected.is_empty()),
        }
    }

    // a few windows over the occupied range
    if let Ok(span) = coll.span() {
        let (lo, hi) = (*span.low(), *span.high());
        let windows = [
            Iv::closed(lo.saturating_add(1), hi.saturating_sub(1)),
            Iv::closed(lo, lo.saturating_add(2)),
            Iv::closed(hi.saturating_sub(2), hi),
        ];
        for window in windows.into_iter().flatten() {
            let expected: Vec<Handle> = stored
                .iter()
                .filter(|i| overlaps(*i, &window))
                .cloned()
                .collect();
            assert_eq!(coll.count_overlaps(&window), expected.len());
            assert_eq!(
                occurrences(coll.find_overlaps(&window)),
                occurrences(expected.into_iter()),
            );
        }
    }

    // capability flags bind what may be stored
    if !coll.allows_overlaps() {
        for (at, a) in stored.iter().enumerate() {
            for b in &stored[at + 1..] {
                assert!(!overlaps(a, b));
            }
        }
    }
    if !coll.allows_containments() {
        for a in &stored {
            for b in &stored {
                assert!(!strictly_contains(a, b));
            }
        }
    }
    if !coll.allows_reference_duplicates() {
        let mut pointers: Vec<*const Iv<i32>> = stored.iter().map(Rc::as_ptr).collect();
        pointers.sort();
        pointers.dedup();
        assert_eq!(pointers.len(), stored.len());
    }

    // gaps are disjoint from the collection, sit inside the span, and meet
    // their flanking intervals with inverted closure
    let gaps: Vec<Iv<i32>> = coll.gaps().collect();
    if let Ok(span) = coll.span() {
        for gap in &gaps {
            assert!(contains_interval(&span, gap));
            for interval in &stored {
                assert!(!overlaps(gap, interval));
            }
            assert!(
                stored
                    .iter()
                    .any(|i| relate(i.as_ref(), gap) == Relation::Meets)
            );
            assert!(
                stored
                    .iter()
                    .any(|i| relate(gap, i.as_ref()) == Relation::Meets)
            );
        }
    } else {
        assert!(gaps.is_empty());
    }
    for gap in coll.find_gaps(&Iv::closed(-50, 50).unwrap()) {
        assert!(contains_interval(&Iv::closed(-50, 50).unwrap(), &gap));
        for interval in &stored {
            assert!(!overlaps(&gap, interval));
        }
    }
}

// --- S1: two disjoint intervals, every overlap-allowing index ---

fn s1_check(coll: &dyn IntervalCollection<Iv<i32>, i32>) {
    let expected = [0usize, 1, 1, 1, 0, 0, 1, 0, 0];
    for (point, want) in (0..=8).zip(expected) {
        assert_eq!(coll.count_overlaps_point(&point), want, "stab at {point}");
    }
    assert_eq!(coll.maximum_depth(), 1);
    let gaps: Vec<Iv<i32>> = coll.gaps().collect();
    assert_eq!(gaps, vec![Iv::new(3, 5, false, true).unwrap()]);
    check_invariants(coll);
}

#[rstest]
fn test_s1_every_index() {
    let input = || vec![closed(1, 3), iv(5, 7, false, false)];

    s1_check(&EndpointSortedList::from_intervals(input(), false));
    s1_check(&LayeredContainmentList::build(input()));
    s1_check(&IntervalBinarySearchTree::from_intervals(input(), true));
    s1_check(&IntervalBinarySearchTree::from_intervals(input(), false));
    s1_check(&DynamicIntervalTree::from_intervals(input()));
    // the two intervals are disjoint, so even the overlap-free tree takes
    // them
    s1_check(&FiniteIntervalTree::from_intervals(input()));
}

// --- S2: the article set on the fully-capable indexes ---

fn s2_check(coll: &dyn IntervalCollection<Iv<i32>, i32>, input: &[Handle]) {
    assert_eq!(
        coll.span().unwrap(),
        Iv::closed(i32::MIN, 20).unwrap()
    );
    assert_eq!(coll.maximum_depth(), 5);

    let lows = |point: i32| {
        let mut lows: Vec<i32> = coll.find_overlaps_point(&point).map(|i| *i.low()).collect();
        lows.sort();
        lows
    };
    // A, E1, E2, G
    assert_eq!(lows(10), vec![i32::MIN, 8, 8, 9]);
    // A, D, F
    assert_eq!(lows(18), vec![9, 17, 18]);
    // G alone
    assert_eq!(lows(0), vec![i32::MIN]);

    let hits = occurrences(coll.find_overlaps_point(&10));
    for wanted in [&input[0], &input[4], &input[5], &input[7]] {
        assert_eq!(hits.get(&Rc::as_ptr(wanted)), Some(&1));
    }
    check_invariants(coll);
}

#[rstest]
fn test_s2_article(article: Vec<Handle>) {
    s2_check(
        &IntervalBinarySearchTree::from_intervals(article.clone(), true),
        &article,
    );
    s2_check(
        &IntervalBinarySearchTree::from_intervals(article.clone(), false),
        &article,
    );
    s2_check(&DynamicIntervalTree::from_intervals(article.clone()), &article);
}

// --- S3: one hundred meeting slots in the overlap-free tree ---

#[rstest]
fn test_s3_meeting_chain() {
    const SLOT: i32 = 15;
    let slots: Vec<Handle> = (0..100).map(|k| meeting(k * SLOT, (k + 1) * SLOT)).collect();
    let tree = FiniteIntervalTree::from_intervals(slots.clone());
    assert_eq!(tree.count(), 100);

    let sorted: Vec<Handle> = tree.sorted().collect();
    for (stored, given) in sorted.iter().zip(&slots) {
        assert!(Rc::ptr_eq(stored, given));
    }
    assert_eq!(tree.gaps().count(), 0);

    for k in 1..99 {
        let hood = tree.neighbourhood_point(&(k * SLOT));
        assert!(Rc::ptr_eq(hood.previous.as_ref().unwrap(), &slots[(k - 1) as usize]));
        assert!(Rc::ptr_eq(hood.overlap.as_ref().unwrap(), &slots[k as usize]));
        assert!(Rc::ptr_eq(hood.next.as_ref().unwrap(), &slots[(k + 1) as usize]));
    }
    check_invariants(&tree);
}

/// The competing reading of the boundary neighbourhood: when the point is
/// covered, report no `next` component at all. The implemented behaviour is
/// "first interval starting after the point" (asserted above), which makes
/// `next` symmetric with `previous` instead of conditional on `overlap`.
/// This pins down the alternative so the choice stays visible.
#[rstest]
#[ignore = "documents the rejected reading: next suppressed whenever the point is covered"]
fn test_s3_meeting_chain_covered_boundary_suppresses_next() {
    const SLOT: i32 = 15;
    let slots: Vec<Handle> = (0..100).map(|k| meeting(k * SLOT, (k + 1) * SLOT)).collect();
    let tree = FiniteIntervalTree::from_intervals(slots.clone());

    for k in 1..99 {
        let hood = tree.neighbourhood_point(&(k * SLOT));
        assert!(Rc::ptr_eq(hood.previous.as_ref().unwrap(), &slots[(k - 1) as usize]));
        assert!(Rc::ptr_eq(hood.overlap.as_ref().unwrap(), &slots[k as usize]));
        assert!(hood.next.is_none());
    }
}

// --- S4: the all-contained ladder in the layered containment list ---

#[rstest]
fn test_s4_ladder() {
    let ladder: Vec<Handle> = (0..10).map(|k| closed(k, 20 - k)).collect();
    let lcl = LayeredContainmentList::build(ladder.clone());
    assert_eq!(lcl.count(), 10);
    assert_eq!(lcl.maximum_depth(), 10);
    assert_eq!(lcl.layer_count(), 10);
    assert_eq!(lcl.find_overlaps_point(&10).count(), 10);
    check_invariants(&lcl);
}

// --- S5: welds and paint runs in the dynamic interval tree ---

#[rstest]
fn test_s5_welding() {
    let runs: Vec<Handle> = [
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
    .map(|&(a, b)| meeting(a, b))
    .collect();
    let tree = DynamicIntervalTree::from_intervals(runs);
    let gaps: Vec<Iv<i32>> = tree.gaps().collect();
    let expected: Vec<Iv<i32>> = [(40, 50), (150, 160), (190, 200)]
        .iter()
        .map(|&(a, b)| Iv::upper_open(a, b).unwrap())
        .collect();
    assert_eq!(gaps, expected);
    check_invariants(&tree);
}

// --- S6: enumeration stability across remove and re-add ---

#[rstest]
fn test_s6_stability() {
    let input: Vec<Handle> = (0..20).map(|k| closed(k * 3, k * 3 + 4)).collect();

    let mut list = EndpointSortedList::new();
    list.add_all(input.clone()).unwrap();
    let target = input[7].clone();
    assert!(list.remove(&target).unwrap());
    assert!(list.add(target.clone()).unwrap());

    let fresh = EndpointSortedList::from_intervals(input.clone(), false);
    let after: Vec<*const Iv<i32>> = list.sorted().map(|i| Rc::as_ptr(&i)).collect();
    let reference: Vec<*const Iv<i32>> = fresh.sorted().map(|i| Rc::as_ptr(&i)).collect();
    assert_eq!(after, reference);
    assert_eq!(list.index_of(&target), 7);
}

// --- round-trips and idempotence ---

#[rstest]
fn test_add_remove_round_trip(article: Vec<Handle>) {
    let mut tree = IntervalBinarySearchTree::from_intervals(article.clone(), false);
    let before = occurrences(tree.iter());
    let extra = closed(4, 16);
    assert!(tree.add(extra.clone()).unwrap());
    assert!(tree.remove(&extra).unwrap());
    assert_eq!(occurrences(tree.iter()), before);
    check_invariants(&tree);
}

#[rstest]
fn test_bulk_equals_incremental(article: Vec<Handle>) {
    let bulk = IntervalBinarySearchTree::from_intervals(article.clone(), true);
    let mut incremental = IntervalBinarySearchTree::new();
    incremental.add_all(article.clone()).unwrap();

    assert_eq!(bulk.count(), incremental.count());
    assert_eq!(bulk.maximum_depth(), incremental.maximum_depth());
    assert_eq!(bulk.span().unwrap(), incremental.span().unwrap());
    assert_eq!(occurrences(bulk.iter()), occurrences(incremental.iter()));
}

#[rstest]
fn test_clear_is_idempotent() {
    use std::cell::RefCell;

    let mut tree = DynamicIntervalTree::from_intervals(vec![closed(1, 5), closed(2, 9)]);
    let fired: Rc<RefCell<usize>> = Rc::default();
    let sink = fired.clone();
    tree.on_event(Rc::new(move |_| *sink.borrow_mut() += 1));

    tree.clear().unwrap();
    assert!(tree.is_empty());
    assert_eq!(*fired.borrow(), 2); // Cleared then Changed

    tree.clear().unwrap();
    assert_eq!(*fired.borrow(), 2);
}

// --- add semantics and events ---

#[rstest]
fn test_rejected_add_fires_no_event() {
    use std::cell::RefCell;

    let mut tree = FiniteIntervalTree::from_intervals(vec![meeting(0, 10)]);
    let fired: Rc<RefCell<usize>> = Rc::default();
    let sink = fired.clone();
    tree.on_event(Rc::new(move |_| *sink.borrow_mut() += 1));

    assert_eq!(tree.add(meeting(5, 15)).unwrap(), false);
    assert_eq!(*fired.borrow(), 0);

    assert_eq!(tree.add(meeting(10, 20)).unwrap(), true);
    assert_eq!(*fired.borrow(), 2); // ItemsAdded then Changed
}

#[rstest]
fn test_add_all_keeps_accepted_prefix() {
    let mut tree = FiniteIntervalTree::new();
    let accepted = tree
        .add_all(vec![meeting(0, 10), meeting(5, 15), meeting(10, 20)])
        .unwrap();
    assert_eq!(accepted, 2);
    assert_eq!(tree.count(), 2);
    let lows: Vec<i32> = tree.sorted().map(|i| *i.low()).collect();
    assert_eq!(lows, vec![0, 10]);
}

// --- boundary behaviours ---

#[rstest]
fn test_empty_collections() {
    let esl: EndpointSortedList<Iv<i32>, i32> = EndpointSortedList::new();
    let dlfit: FiniteIntervalTree<Iv<i32>, i32> = FiniteIntervalTree::new();
    let lcl: LayeredContainmentList<Iv<i32>, i32> = LayeredContainmentList::build(vec![]);
    let ibs: IntervalBinarySearchTree<Iv<i32>, i32> = IntervalBinarySearchTree::new();
    let dit: DynamicIntervalTree<Iv<i32>, i32> = DynamicIntervalTree::new();

    let all: [&dyn IntervalCollection<Iv<i32>, i32>; 5] = [&esl, &dlfit, &lcl, &ibs, &dit];
    for coll in all {
        assert!(coll.is_empty());
        assert_eq!(coll.count(), 0);
        assert_eq!(coll.maximum_depth(), 0);
        assert_eq!(coll.span(), Err(CollectionError::EmptyCollection));
        assert_eq!(coll.choose(), Err(CollectionError::EmptyCollection));
        assert!(coll.lowest_interval().is_err());
        assert!(coll.highest_interval().is_err());
        assert_eq!(coll.find_overlaps_point(&0).count(), 0);
        assert_eq!(coll.find_overlap_point(&0), None);
        assert_eq!(coll.gaps().count(), 0);
        check_invariants(coll);
    }
}

#[rstest]
#[case(true, true)]
#[case(true, false)]
#[case(false, true)]
#[case(false, false)]
fn test_single_interval_endpoint_inclusion(#[case] low_inc: bool, #[case] high_inc: bool) {
    let single = iv(3, 8, low_inc, high_inc);
    let tree = IntervalBinarySearchTree::from_intervals(vec![single], false);
    assert_eq!(tree.count_overlaps_point(&3) == 1, low_inc);
    assert_eq!(tree.count_overlaps_point(&8) == 1, high_inc);
    assert_eq!(tree.count_overlaps_point(&5), 1);
    check_invariants(&tree);
}

// --- randomized cross-index agreement, seeded for reproducibility ---

fn random_intervals(rng: &mut StdRng, count: usize) -> Vec<Handle> {
    (0..count)
        .map(|_| {
            let low = rng.random_range(-60..60);
            let length = rng.random_range(0..25);
            if length == 0 {
                Rc::new(Iv::point(low))
            } else {
                iv(low, low + length, rng.random_bool(0.5), rng.random_bool(0.5))
            }
        })
        .collect()
}

#[rstest]
fn test_random_invariants_across_indexes() {
    let mut rng = StdRng::seed_from_u64(0x1517);
    for round in 0..8 {
        let input = random_intervals(&mut rng, 60);

        check_invariants(&EndpointSortedList::from_intervals(input.clone(), false));
        check_invariants(&LayeredContainmentList::build(input.clone()));
        check_invariants(&IntervalBinarySearchTree::from_intervals(input.clone(), true));
        check_invariants(&IntervalBinarySearchTree::from_intervals(
            input.clone(),
            false,
        ));
        check_invariants(&DynamicIntervalTree::from_intervals(input.clone()));

        // the overlap-free tree keeps whatever subset it accepted
        let dlfit = FiniteIntervalTree::from_intervals(input);
        check_invariants(&dlfit);
        assert!(dlfit.count() > 0, "round {round} accepted nothing");
    }
}

#[rstest]
fn test_random_mutation_churn() {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    let input = random_intervals(&mut rng, 80);

    let mut ibs = IntervalBinarySearchTree::from_intervals(input.clone(), false);
    let mut dit = DynamicIntervalTree::from_intervals(input.clone());
    let mut esl = EndpointSortedList::from_intervals(input.clone(), false);

    let mut live = input;
    while live.len() > 40 {
        let at = rng.random_range(0..live.len());
        let victim = live.swap_remove(at);
        assert!(ibs.remove(&victim).unwrap());
        assert!(dit.remove(&victim).unwrap());
        assert!(esl.remove(&victim).unwrap());
    }
    check_invariants(&ibs);
    check_invariants(&dit);
    check_invariants(&esl);

    let refill = random_intervals(&mut rng, 20);
    ibs.add_all(refill.clone()).unwrap();
    dit.add_all(refill.clone()).unwrap();
    esl.add_all(refill).unwrap();
    check_invariants(&ibs);
    check_invariants(&dit);
    check_invariants(&esl);
}

// --- sorted sub-contract across its implementors ---

#[rstest]
fn test_sorted_contract_agreement() {
    let slots: Vec<Handle> = (0..12).map(|k| meeting(k * 10, k * 10 + 7)).collect();

    let mut esl = EndpointSortedList::new();
    esl.add_all(slots.clone()).unwrap();
    let dlfit = FiniteIntervalTree::from_intervals(slots.clone());

    let sorted: [&dyn SortedIntervalCollection<Iv<i32>, i32>; 2] = [&esl, &dlfit];
    for coll in sorted {
        let forward: Vec<i32> = coll.sorted().map(|i| *i.low()).collect();
        let mut backward: Vec<i32> = coll.sorted_backwards().map(|i| *i.low()).collect();
        backward.reverse();
        assert_eq!(forward, backward);
        // restartable
        assert_eq!(coll.sorted().count(), 12);
        assert_eq!(coll.sorted().count(), 12);

        assert_eq!(coll.enumerate_from_point(&35, true).count(), 9);
        assert_eq!(coll.enumerate_from_point(&35, false).count(), 8);
        assert_eq!(coll.enumerate_from_index(-5).count(), 12);
        assert_eq!(coll.enumerate_from_index(20).count(), 0);
        assert_eq!(coll.enumerate_backwards_from_index(-1).count(), 0);
        assert_eq!(coll.enumerate_backwards_from_index(100).count(), 12);

        assert_eq!(coll.index_of(&slots[5]), 5);
        let twin = meeting(50, 57);
        assert_eq!(coll.index_of(&twin), !5);
        assert_eq!(coll.enumerate_from(&twin, true).count(), 0);
        assert_eq!(coll.enumerate_from(&slots[5], false).count(), 6);
    }
}
