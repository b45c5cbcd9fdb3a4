//! # ivals-core
//!
//! Core library for ivals: the interval model, the endpoint-inclusion-aware
//! algebra every index relies on, Allen's interval relations, and the
//! endpoint sweep.
//!
//! ## Main Components
//!
//! - **`models`**: the [`BoundedInterval`](models::BoundedInterval) accessor
//!   trait and the concrete [`Iv`](models::Iv) value type
//! - **`algebra`**: total comparators and overlap/containment predicates
//! - **`relations`**: Allen's thirteen relations over flagged endpoints
//! - **`sweep`**: stable sorting, endpoint streams and the max-depth scan
//! - **`errors`**: the shared failure taxonomy

pub mod algebra;
pub mod errors;
pub mod models;
pub mod relations;
pub mod sweep;

// re-exports
pub use self::errors::CollectionError;
pub use self::models::{BoundedInterval, Iv};
pub use self::relations::Relation;
