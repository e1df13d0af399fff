//! Collection diffing.
//!
//! ## Entry point
//!
//! ```ignore
//! use embedx_core::diff::collection::{diff_collection, Pair};
//!
//! let (changesets, valid) = diff_collection(&relation, inputs, &current, key_of, build)?;
//! ```
//!
//! ## Guarantees
//!
//! - **Ordering**: aligned results follow input order; deletions of
//!   unclaimed current entities come last, in current order.
//! - **One-to-one**: a current entity is paired with at most one input item.
//! - **No short-circuit**: every pair is built, so every nested error is kept.

pub mod collection;

pub use collection::{canonical_key, diff_collection, Pair};
