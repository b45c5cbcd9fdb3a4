//! Umbrella crate for the ivals workspace. Enable the `core` and `stabrs`
//! features (both on by default) and import everything through one name.

#[cfg(feature = "core")]
#[doc(inline)]
pub use ivals_core as core;

#[cfg(feature = "stabrs")]
#[doc(inline)]
pub use ivals_stabrs as stabrs;
