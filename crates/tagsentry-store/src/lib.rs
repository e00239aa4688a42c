#![deny(missing_docs)]

//! # tagsentry-store — In-Memory Reference Stores
//!
//! The transactional record stores the reconciliation engine runs on:
//! a generic thread-safe [`Store`], the [`ResourceCatalog`], the
//! [`PolicyStore`], and the [`WorkflowStore`].
//!
//! Durable storage mechanics (schema migrations, pooling) are an external
//! concern; these stores are the in-memory reference backend plus a JSON
//! [`StoreSnapshot`] seam for handing records to a durable one. The
//! concurrency contract the engine relies on lives here:
//!
//! - same-identity writes serialize through the store's write lock, and
//! - workflow transitions are compare-and-set on status at commit time
//!   via [`Store::try_update`].

pub mod catalog;
pub mod policies;
pub mod snapshot;
pub mod store;
pub mod workflows;

// Re-export primary types.
pub use catalog::{ResourceCatalog, StatusSummary};
pub use policies::PolicyStore;
pub use snapshot::StoreSnapshot;
pub use store::Store;
pub use workflows::{WorkflowFilter, WorkflowStats, WorkflowStore};
