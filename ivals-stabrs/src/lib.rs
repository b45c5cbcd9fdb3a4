//! # ivals-stabrs
//!
//! The interval collection indexes: every structure that answers stabbing,
//! range, containment, gap and sorted-enumeration queries over a set of
//! interval handles.
//!
//! ## Design Philosophy
//!
//! All indexes implement the one [`IntervalCollection`] contract and differ
//! only in capability flags and trade-offs. Callers hold `Rc` handles;
//! collections share those references and never clone an interval.
//!
//! ## Main Components
//!
//! - **`EndpointSortedList`**: dense sorted array, binary-searched lookups
//! - **`FiniteIntervalTree`**: overlap-free threaded AVL tree with
//!   neighbourhood queries
//! - **`LayeredContainmentList`**: static layered arrays for stabbing under
//!   heavy containment
//! - **`IntervalBinarySearchTree`**: endpoint-keyed AVL tree supporting
//!   every capability
//! - **`DynamicIntervalTree`**: split-keyed AVL tree with subtree extremes
//! - **`GapScan`**: the shared gap computation
//!
//! ## Example
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use ivals_core::Iv;
//! use ivals_stabrs::{IntervalBinarySearchTree, IntervalCollection};
//!
//! let meetings = vec![
//!     Rc::new(Iv::upper_open(9, 11).unwrap()),
//!     Rc::new(Iv::upper_open(10, 12).unwrap()),
//! ];
//! let tree = IntervalBinarySearchTree::from_intervals(meetings, true);
//!
//! assert_eq!(tree.count_overlaps_point(&10), 2);
//! assert_eq!(tree.maximum_depth(), 2);
//! ```

pub mod dit;
pub mod dlfit;
pub mod esl;
pub mod events;
pub mod gaps;
pub mod ibs;
pub mod lcl;
pub mod traits;

// re-exports
pub use self::dit::DynamicIntervalTree;
pub use self::dlfit::FiniteIntervalTree;
pub use self::esl::EndpointSortedList;
pub use self::events::{CollectionEvent, EventListener, EventSource};
pub use self::gaps::GapScan;
pub use self::ibs::IntervalBinarySearchTree;
pub use self::lcl::LayeredContainmentList;
pub use self::traits::{
    GapIter, IntervalCollection, IvIter, Neighbourhood, NeighbourhoodCollection,
    SortedIntervalCollection, Speed,
};
