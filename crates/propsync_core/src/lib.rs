//! # PropSync Core
//!
//! Keeps a component-scoped state store in step with host-supplied
//! properties.
//!
//! This crate provides:
//! - [`Store`], an observable store of named fields
//! - Change detection ([`changed`]) and write-once filtering ([`filter`])
//! - [`SyncPipeline`], which merges changed inputs and derived values
//! - [`SyncContext`], [`Provider`], [`Scope`] and [`Reader`] for scoped access
//! - Optional persistence through any [`StorageBackend`]
//!
//! ## Design Principles
//!
//! - The host owns the cadence: nothing happens until [`Scope::evaluate`]
//! - A stream merges only when its payload differs from the last one merged
//! - Write-once fields are synced on the first cycle, then frozen
//! - Subscribers run without any engine lock held
//! - Persistence failures degrade to in-memory state, never to errors
//!
//! ## Example
//!
//! ```rust
//! use propsync_core::{Derived, ScopeConfig, SyncContext};
//! use propsync_codec::{Payload, Value};
//!
//! let ctx = SyncContext::builder()
//!     .name("Counter")
//!     .initializer(|_| Payload::new().with("count", 0))
//!     .derive(|inputs, _| match inputs.get("base").and_then(Value::as_integer) {
//!         Some(base) => Derived::Merge(Payload::new().with("doubled", base * 2)),
//!         None => Derived::Skip,
//!     })
//!     .build();
//!
//! let scope = ctx.provider().mount(ScopeConfig::new());
//! scope.evaluate(&Payload::new().with("base", 3));
//!
//! let reader = ctx.reader();
//! let doubled = scope.enter(|| reader.select(|s| s.get("doubled").cloned())).unwrap();
//! assert_eq!(doubled, Some(Value::Integer(6)));
//! ```
//!
//! [`StorageBackend`]: propsync_storage::StorageBackend

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod detect;
mod error;
mod gate;
mod persist;
mod pipeline;
mod store;

pub use config::{MergeFn, MigrateFn, PartializeFn, PersistOptions, ScopeConfig};
pub use context::{
    ContextId, InitFn, Provider, Reader, Scope, SyncContext, SyncContextBuilder, Watch,
};
pub use detect::{changed, same_field};
pub use error::{CoreError, CoreResult};
pub use gate::{filter, WriteOnceSet};
pub use persist::{persistable_fields, HydrationOutcome, HydrationSubscription, PersistHandle};
pub use pipeline::{
    CycleReport, DeriveContext, DeriveFn, Derived, PipelinePhase, SyncPipeline, SyncStats,
};
pub use store::{Listener, Store, Subscription, WeakStore};

// Re-export the value types every caller needs.
pub use propsync_codec::{Node, NodeType, Opaque, Payload, Value};
