//! # PropSync Testkit
//!
//! Test utilities for PropSync.
//!
//! This crate provides:
//! - Storage fixtures that record, fail or live in temp directories
//! - Merge counters and tracing setup for tests
//! - Property-based test generators using proptest
//! - Fuzz targets for the codec and the sync pipeline
//! - Stress helpers that drive one scope from several threads
//!
//! ## Usage
//!
//! ```rust,ignore
//! use propsync_testkit::prelude::*;
//!
//! #[test]
//! fn counts_merges() {
//!     let store = Store::new(Payload::new());
//!     let merges = MergeCounter::attach(&store);
//!     store.merge(&Payload::new().with("a", 1));
//!     assert_eq!(merges.count(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod fuzz;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::fuzz::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use propsync_core::{Payload, Store, Value};
}

pub use fixtures::*;
pub use fuzz::*;
pub use generators::*;
pub use stress::*;
