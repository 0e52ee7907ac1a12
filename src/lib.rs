//! Building blocks for controllers that keep stored resource records in sync
//! with a locally computed desired state.
//!
//! - [`syncer`]: owner-aware create-or-update, removal and external syncers
//!   reporting structured outcomes and events.
//! - [`merge`]: schema-driven structural merge with per-type strategies,
//!   including the pod spec table [`merge::POD_SPEC`].
//! - [`rate_limiter`], [`beat`], [`predicate`] and [`net`]: reconcile loop
//!   plumbing.

pub mod beat;
pub mod config;
pub mod events;
pub mod merge;
pub mod meta;
pub mod net;
pub mod observability;
pub mod predicate;
pub mod rate_limiter;
pub mod resources;
pub mod store;
pub mod syncer;

pub use events::{EventRecorder, EventType};
pub use meta::{Object, ObjectKey, ObjectMeta, Resource, TypeMeta};
pub use store::{MemoryStore, ObjectStore, StoreError};
pub use syncer::{Operation, Outcome, SyncContext, SyncError, SyncResult, Syncer, sync};
